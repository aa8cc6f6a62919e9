use digester::{Bean, DynamicBean, Object, ParseResultVerbose, Value};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

const MAX_TEXT: usize = 60;

pub fn print_run(label: &str, res: &ParseResultVerbose, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Digesting: {label}"), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Tree ━━━", ansi::GRAY));
    match &res.root {
        Some(root) => print_object(root, 1, &palette),
        None => println!("{}", palette.dim("  Empty document")),
    }

    println!("\n{}", palette.paint("━━━ Elements ━━━", ansi::GRAY));
    for (name, count) in &res.details.element_counts {
        println!("  {} {}", palette.paint(name, ansi::BLUE), palette.dim(format!("× {count}")));
    }
    if !res.details.deepest_path.is_empty() {
        println!("  {} {}", palette.dim("deepest:"), palette.paint(&res.details.deepest_path, ansi::YELLOW));
    }

    let m = &res.metrics;
    println!("\n{}", palette.paint("━━━ Dispatch ━━━", ansi::GRAY));
    println!(
        "  Elements: {}  │  Matched: {} ({:.0}%)  │  Max depth: {}",
        palette.paint(m.elements.to_string(), ansi::GREEN),
        palette.paint(m.matched_elements.to_string(), ansi::GREEN),
        m.match_ratio() * 100.0,
        palette.paint(m.max_depth.to_string(), ansi::YELLOW),
    );
    println!(
        "  {} begin {}  body {}  end {}  finish {}",
        palette.dim("calls:"),
        m.begin_calls,
        m.body_calls,
        m.end_calls,
        m.finish_calls,
    );

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!("  Total: {}", palette.paint(format!("{:?}", m.elapsed), ansi::GREEN));
    println!();
}

fn print_object(object: &Object, depth: usize, palette: &ansi::Palette) {
    let indent = "  ".repeat(depth);
    let printed = object.with::<DynamicBean, _>(|bean| {
        let props: Vec<String> = bean
            .properties()
            .iter()
            .filter(|(name, _)| name.as_str() != "text")
            .map(|(name, value)| format!("{}={}", palette.paint(name, ansi::CYAN), fmt_value(value)))
            .collect();
        let text =
            bean.get("text").map(|t| palette.dim(format!(" \"{}\"", preview(&t.to_string())))).unwrap_or_default();
        println!("{indent}{}{}{text}", palette.bold(bean.type_name()), fmt_props(&props));
        bean.children().to_vec()
    });

    match printed {
        Some(children) => {
            for child in &children {
                match child.as_object() {
                    Some(child) => print_object(child, depth + 1, palette),
                    None => println!("{indent}  {}", fmt_value(child)),
                }
            }
        }
        None => println!("{indent}{}", palette.paint(object.type_name(), ansi::BLUE)),
    }
}

fn fmt_props(props: &[String]) -> String {
    if props.is_empty() { String::new() } else { format!(" {}", props.join(" ")) }
}

fn fmt_value(value: &Value) -> String {
    format!("\"{}\"", preview(&value.to_string()))
}

fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > MAX_TEXT {
        format!("{}…", flat.chars().take(MAX_TEXT).collect::<String>())
    } else {
        flat
    }
}
