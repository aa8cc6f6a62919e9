//! Event source: drives a [`Digester`] from `quick-xml`.
//!
//! The reader is configured not to trim text, so the dispatcher sees body
//! text exactly as written. Empty elements become a start and an end event,
//! character and predefined entity references are resolved, and namespace
//! prefixes are resolved through the digester's own prefix bookkeeping when
//! [`Options::namespace_aware`](crate::Options) is set.

use crate::bean::Value;
use crate::error::DigestError;
use crate::{Attribute, Attributes, Digester, Position};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::Read;
use std::path::Path;

impl Digester {
    /// Parse a complete document and return the root object.
    ///
    /// On error the per-parse state is cleared and any matcher decorator a
    /// rule left installed is removed, so the digester can be reused.
    pub fn parse_str(&mut self, xml: &str) -> Result<Option<Value>, DigestError> {
        let namespace_aware = self.options().namespace_aware;
        match XmlSource::new(xml, namespace_aware).run(self) {
            Ok(()) => Ok(self.root().cloned()),
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    pub fn parse_reader(&mut self, mut reader: impl Read) -> Result<Option<Value>, DigestError> {
        let mut xml = String::new();
        reader.read_to_string(&mut xml)?;
        self.parse_str(&xml)
    }

    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<Option<Value>, DigestError> {
        let xml = std::fs::read_to_string(path)?;
        self.parse_str(&xml)
    }
}

/// A resolved element name.
struct ElementName {
    namespace_uri: String,
    local_name: String,
    qname: String,
}

struct XmlSource<'a> {
    xml: &'a str,
    line_starts: Vec<usize>,
    namespace_aware: bool,
    /// Names of open elements plus the prefixes each one declared.
    open: Vec<(ElementName, Vec<String>)>,
}

impl<'a> XmlSource<'a> {
    fn new(xml: &'a str, namespace_aware: bool) -> Self {
        let line_starts = std::iter::once(0).chain(xml.match_indices('\n').map(|(idx, _)| idx + 1)).collect();
        XmlSource { xml, line_starts, namespace_aware, open: Vec::new() }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset).max(1);
        let start = self.line_starts[line - 1];
        let column = self.xml.get(start..offset.min(self.xml.len())).map_or(0, |s| s.chars().count()) + 1;
        Position { line, column }
    }

    fn syntax(&self, offset: usize, message: impl Into<String>) -> DigestError {
        DigestError::Syntax { position: Some(self.position(offset)), message: message.into() }
    }

    fn run(mut self, digester: &mut Digester) -> Result<(), DigestError> {
        let mut reader = Reader::from_str(self.xml);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();

        digester.set_position(Some(self.position(0)));
        digester.start_document();
        loop {
            let offset = reader.buffer_position() as usize;
            let event = reader.read_event_into(&mut buf).map_err(|e| self.syntax(offset, e.to_string()))?;
            digester.set_position(Some(self.position(offset)));
            match event {
                Event::Start(e) => self.start(digester, &e, offset)?,
                Event::Empty(e) => {
                    self.start(digester, &e, offset)?;
                    self.end(digester, offset)?;
                }
                Event::End(_) => self.end(digester, offset)?,
                Event::Text(e) => {
                    let raw = std::str::from_utf8(e.as_ref()).map_err(|e| self.syntax(offset, e.to_string()))?;
                    let text = quick_xml::escape::unescape(raw).map_err(|e| self.syntax(offset, e.to_string()))?;
                    digester.characters(&text);
                }
                Event::CData(e) => {
                    let text = std::str::from_utf8(e.as_ref()).map_err(|e| self.syntax(offset, e.to_string()))?;
                    digester.characters(text);
                }
                Event::GeneralRef(e) => {
                    let name = std::str::from_utf8(e.as_ref()).map_err(|e| self.syntax(offset, e.to_string()))?;
                    let resolved = resolve_reference(name)
                        .ok_or_else(|| self.syntax(offset, format!("unknown entity '&{name};'")))?;
                    digester.characters(&resolved);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some((name, _)) = self.open.last() {
            return Err(self.syntax(self.xml.len(), format!("unexpected end of document inside <{}>", name.qname)));
        }
        digester.end_document()
    }

    fn start(&mut self, digester: &mut Digester, e: &BytesStart<'_>, offset: usize) -> Result<(), DigestError> {
        let qname =
            std::str::from_utf8(e.name().as_ref()).map_err(|err| self.syntax(offset, err.to_string()))?.to_string();

        let mut raw = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.syntax(offset, err.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(|err| self.syntax(offset, err.to_string()))?;
            let value = std::str::from_utf8(&attr.value).map_err(|err| self.syntax(offset, err.to_string()))?;
            let value = quick_xml::escape::unescape(value).map_err(|err| self.syntax(offset, err.to_string()))?;
            raw.push((key.to_string(), value.into_owned()));
        }

        let mut declared = Vec::new();
        let mut attributes = Attributes::new();
        if self.namespace_aware {
            for (key, value) in &raw {
                let prefix = if key == "xmlns" { Some("") } else { key.strip_prefix("xmlns:") };
                if let Some(prefix) = prefix {
                    digester.start_prefix_mapping(prefix, value);
                    declared.push(prefix.to_string());
                }
            }
            for (key, value) in raw {
                if key == "xmlns" || key.starts_with("xmlns:") {
                    continue;
                }
                let (namespace_uri, local_name) = match key.split_once(':') {
                    Some((prefix, local)) => (self.resolve_prefix(digester, prefix, offset)?, local.to_string()),
                    None => (String::new(), key.clone()),
                };
                attributes.push(Attribute { namespace_uri, local_name, qname: key, value });
            }
        } else {
            for (key, value) in raw {
                attributes.push(Attribute { namespace_uri: String::new(), local_name: key.clone(), qname: key, value });
            }
        }

        let name = if self.namespace_aware {
            let (prefix, local) = qname.split_once(':').unwrap_or(("", qname.as_str()));
            let namespace_uri = if prefix.is_empty() {
                digester.find_namespace_uri("").unwrap_or_default().to_string()
            } else {
                self.resolve_prefix(digester, prefix, offset)?
            };
            ElementName { namespace_uri, local_name: local.to_string(), qname: qname.clone() }
        } else {
            ElementName { namespace_uri: String::new(), local_name: String::new(), qname }
        };

        let started = digester.start_element(&name.namespace_uri, &name.local_name, &name.qname, &attributes);
        self.open.push((name, declared));
        started
    }

    fn end(&mut self, digester: &mut Digester, offset: usize) -> Result<(), DigestError> {
        let (name, declared) = self.open.pop().ok_or_else(|| self.syntax(offset, "end tag without start tag"))?;
        digester.end_element(&name.namespace_uri, &name.local_name, &name.qname)?;
        for prefix in declared.iter().rev() {
            digester.end_prefix_mapping(prefix);
        }
        Ok(())
    }

    fn resolve_prefix(&self, digester: &Digester, prefix: &str, offset: usize) -> Result<String, DigestError> {
        if prefix == "xml" {
            return Ok("http://www.w3.org/XML/1998/namespace".to_string());
        }
        digester
            .find_namespace_uri(prefix)
            .map(str::to_string)
            .ok_or_else(|| self.syntax(offset, format!("unbound namespace prefix '{prefix}'")))
    }
}

/// `amp`, `#60`, `#x3C` -> replacement text.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse::<u32>().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    quick_xml::escape::resolve_predefined_entity(name).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;
    use crate::test_support::Recorder;

    fn recorded(xml: &str, pattern: &str, options: Options) -> Vec<String> {
        let mut digester = Digester::with_options(options);
        let (rule, log) = Recorder::new("r");
        digester.add_rule(pattern, rule).unwrap();
        digester.parse_str(xml).unwrap();
        let log = log.borrow().clone();
        log
    }

    #[test]
    fn empty_elements_start_and_end() {
        let log = recorded("<a><b x='1'/></a>", "a/b", Options::default());
        assert_eq!(log, vec!["r.begin(b)", "r.attr(x=1)", "r.body(b, \"\")", "r.end(b)", "r.finish"]);
    }

    #[test]
    fn text_references_and_cdata_are_resolved() {
        let log = recorded("<a>x &amp; y &#x41;&#66;<![CDATA[<raw>]]></a>", "a", Options::default());
        assert!(log.contains(&"r.body(a, \"x & y AB<raw>\")".to_string()), "{log:?}");
    }

    #[test]
    fn attribute_values_are_unescaped() {
        let log = recorded("<a t='&lt;b&gt; &quot;q&quot;'/>", "a", Options::default());
        assert!(log.contains(&"r.attr(t=<b> \"q\")".to_string()), "{log:?}");
    }

    #[test]
    fn namespaces_resolve_and_xmlns_is_hidden() {
        let xml = r#"<c:root xmlns:c="urn:c" xmlns="urn:default"><item c:id="7" plain="p"/></c:root>"#;
        let log = recorded(xml, "root/item", Options::default());
        assert!(log.contains(&"r.ns(urn:default)".to_string()), "{log:?}");
        assert!(log.contains(&"r.attr(id=7)".to_string()), "{log:?}");
        assert!(log.contains(&"r.attr(plain=p)".to_string()), "{log:?}");
        assert!(!log.iter().any(|l| l.contains("xmlns")), "{log:?}");
    }

    #[test]
    fn namespace_unaware_uses_qualified_names() {
        let xml = r#"<c:root xmlns:c="urn:c"><c:item/></c:root>"#;
        let options = Options { namespace_aware: false, ..Options::default() };
        let log = recorded(xml, "c:root/c:item", options);
        assert_eq!(log.first().map(String::as_str), Some("r.begin(c:item)"));
    }

    #[test]
    fn unbound_prefix_is_a_syntax_error() {
        let mut digester = Digester::new();
        let err = digester.parse_str("<a><x:b/></a>").unwrap_err();
        assert!(matches!(err, DigestError::Syntax { .. }), "{err}");
        assert!(err.to_string().contains("unbound namespace prefix 'x'"), "{err}");
    }

    #[test]
    fn syntax_errors_report_line_and_column() {
        let mut digester = Digester::new();
        let err = digester.parse_str("<a>\n  <b></c>\n</a>").unwrap_err();
        match err {
            DigestError::Syntax { position: Some(pos), .. } => assert_eq!(pos.line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncated_document_is_rejected() {
        let mut digester = Digester::new();
        assert!(digester.parse_str("<a><b>").is_err());
    }

    #[test]
    fn positions_count_lines_and_chars() {
        let source = XmlSource::new("ab\ncé\nx", true);
        assert_eq!(source.position(0), Position { line: 1, column: 1 });
        assert_eq!(source.position(3), Position { line: 2, column: 1 });
        assert_eq!(source.position(6), Position { line: 2, column: 3 });
        assert_eq!(source.position(7), Position { line: 3, column: 1 });
    }

    #[test]
    fn references() {
        assert_eq!(resolve_reference("amp").as_deref(), Some("&"));
        assert_eq!(resolve_reference("#x263A").as_deref(), Some("\u{263A}"));
        assert_eq!(resolve_reference("#10").as_deref(), Some("\n"));
        assert_eq!(resolve_reference("nbsp"), None);
    }

    #[test]
    fn parse_reader_and_file() {
        use std::io::Write;

        let mut digester = Digester::new();
        digester.push(Value::from("preset"));
        let root = digester.parse_reader("<a/>".as_bytes()).unwrap();
        assert_eq!(root, Some(Value::from("preset")));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<a><b/></a>").unwrap();
        let mut digester = Digester::new();
        let (rule, log) = Recorder::new("r");
        digester.add_rule("a/b", rule).unwrap();
        digester.parse_file(file.path()).unwrap();
        assert!(log.borrow().contains(&"r.begin(b)".to_string()));

        let missing = digester.parse_file(file.path().with_extension("missing")).unwrap_err();
        assert!(matches!(missing, DigestError::Io(_)));
    }
}
