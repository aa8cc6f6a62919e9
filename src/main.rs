mod debug_report;

use digester::{Options, parse_verbose_with};
use std::io::{self, IsTerminal, Read};

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    match parse_verbose_with(&config.input, &config.options) {
        Ok(res) => debug_report::print_run(&config.label, &res, config.color),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

struct CliConfig {
    input: String,
    label: String,
    options: Options,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut path: Option<String> = None;
    let mut options = Options::default();
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("digester {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--no-namespaces" => options.namespace_aware = false,
            "--raw-text" => options.trim_text = false,
            "--" => {
                if let Some(rest) = args.next() {
                    set_path(&mut path, rest)?;
                }
                break;
            }
            "-" => set_path(&mut path, arg)?,
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => set_path(&mut path, arg)?,
        }
    }

    let (input, label) = match path.as_deref() {
        None | Some("-") => (read_stdin_input()?, "<stdin>".to_string()),
        Some(file) => {
            let input = std::fs::read_to_string(file).map_err(|err| format!("error: cannot read '{file}': {err}"))?;
            (input, file.to_string())
        }
    };

    if input.trim().is_empty() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    Ok(CliConfig { input, label, options, color })
}

fn set_path(path: &mut Option<String>, value: String) -> Result<(), String> {
    if path.is_some() {
        return Err("error: input provided multiple times".to_string());
    }
    *path = Some(value);
    Ok(())
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "digester {version}

Maps an XML document onto a generic object tree and reports what fired.

Usage:
  digester [OPTIONS] [FILE]

  Reads stdin when FILE is omitted or '-'.

Options:
  --no-namespaces            Keep prefixed names, do not resolve namespaces.
  --raw-text                 Store body text untrimmed.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  The document could not be mapped.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
