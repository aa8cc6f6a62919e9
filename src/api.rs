use crate::bean::{DynamicBean, Object, Value};
use crate::engine::{GlobMatcher, ParseMetrics, RegexRules};
use crate::error::{DigestError, RuleError};
use crate::rules::{FactoryCreateRule, LinkRule, ObjectCreationFactory, SetPropertiesRule};
use crate::{Attributes, Digester, Rule};
use std::collections::BTreeMap;
use std::time::Duration;

/// Type name of the sentinel bean the generic mapping hangs the document
/// element on.
const DOCUMENT: &str = "#document";

/// Options that affect parsing behavior.
#[derive(Debug, Clone)]
pub struct Options {
    /// Resolve namespace prefixes in the bundled event source.
    pub namespace_aware: bool,
    /// Trim body text before the generic mapping stores it.
    pub trim_text: bool,
    /// Record one [`ElementTrace`](crate::ElementTrace) per start tag.
    pub collect_trace: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { namespace_aware: true, trim_text: true, collect_trace: false }
    }
}

/// Result from [`parse`] and [`parse_with`].
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// The document element as a [`DynamicBean`], `None` for an empty document.
    pub root: Option<Object>,
    /// Time spent between start and end of document.
    pub elapsed: Duration,
}

/// Summary computed from the per-element trace.
#[derive(Debug, Clone, Default)]
pub struct ParseDetails {
    /// Occurrences per element name.
    pub element_counts: BTreeMap<String, usize>,
    /// First of the most deeply nested paths.
    pub deepest_path: String,
}

/// Result from [`parse_verbose`] and [`parse_verbose_with`].
#[derive(Debug, Clone)]
pub struct ParseResultVerbose {
    pub root: Option<Object>,
    pub metrics: ParseMetrics,
    pub details: ParseDetails,
}

// --- Generic mapping ---------------------------------------------------------

/// Builds a [`DynamicBean`] named after the current element.
struct ElementFactory;

impl ObjectCreationFactory for ElementFactory {
    fn create_object(&self, digester: &Digester, _attributes: &Attributes) -> Result<Value, RuleError> {
        let path = digester.match_path();
        let name = path.rsplit('/').next().unwrap_or(path);
        Ok(Value::Object(Object::new(DynamicBean::new(name))))
    }
}

/// Stores non-blank body text as property `text`.
struct TextRule {
    trim: bool,
}

impl Rule for TextRule {
    fn name(&self) -> &str {
        "TextRule"
    }

    fn body(&self, digester: &mut Digester, _ns: &str, _name: &str, text: &str) -> Result<(), RuleError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let text = if self.trim { text.trim() } else { text };
        let target = digester.peek().cloned().ok_or(RuleError::NothingOnStack("TextRule"))?;
        digester.invoker().set_property(&target, "text", Value::from(text))?;
        Ok(())
    }
}

/// Install the generic mapping on `digester`: every element becomes a
/// [`DynamicBean`] carrying its attributes as properties and its text as
/// `text`, and is handed to its parent through `addChild`.
///
/// The document element needs a parent object on the stack before parsing.
pub fn generic_rules(digester: &mut Digester, options: &Options) -> Result<(), DigestError> {
    digester.set_rules(RegexRules::new(GlobMatcher));
    digester.add_rule("*", FactoryCreateRule::with_factory(ElementFactory))?;
    digester.add_rule("*", SetPropertiesRule::new())?;
    digester.add_rule("*", TextRule { trim: options.trim_text })?;
    digester.add_rule("*", LinkRule::set_next("addChild"))?;
    Ok(())
}

fn run(xml: &str, options: &Options) -> Result<(Option<Object>, ParseMetrics), DigestError> {
    let mut digester = Digester::with_options(options.clone());
    generic_rules(&mut digester, options)?;

    let document = Object::new(DynamicBean::new(DOCUMENT));
    digester.push(Value::Object(document.clone()));
    digester.parse_str(xml)?;

    let root = document
        .with::<DynamicBean, _>(|doc| doc.children().first().and_then(Value::as_object).cloned())
        .flatten();
    Ok((root, digester.metrics().clone()))
}

/// Map `xml` onto a [`DynamicBean`] tree with default [`Options`].
///
/// # Example
/// ```
/// use digester::{DynamicBean, Value, parse};
///
/// let out = parse(r#"<book id="7"><title>Dune</title></book>"#).unwrap();
/// let root = out.root.unwrap();
/// let id = root.with::<DynamicBean, _>(|b| b.get("id").cloned()).flatten();
/// assert_eq!(id, Some(Value::from("7")));
/// ```
pub fn parse(xml: &str) -> Result<ParseResult, DigestError> {
    parse_with(xml, &Options::default())
}

pub fn parse_with(xml: &str, options: &Options) -> Result<ParseResult, DigestError> {
    let (root, metrics) = run(xml, options)?;
    Ok(ParseResult { root, elapsed: metrics.elapsed })
}

pub fn parse_verbose(xml: &str) -> Result<ParseResultVerbose, DigestError> {
    parse_verbose_with(xml, &Options::default())
}

/// Like [`parse_with`], always collecting the per-element trace, and
/// returning the metrics with a small summary.
pub fn parse_verbose_with(xml: &str, options: &Options) -> Result<ParseResultVerbose, DigestError> {
    let options = Options { collect_trace: true, ..options.clone() };
    let (root, metrics) = run(xml, &options)?;

    let mut details = ParseDetails::default();
    let mut deepest = 0;
    for entry in &metrics.trace {
        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        *details.element_counts.entry(name.to_string()).or_default() += 1;
        if entry.depth > deepest {
            deepest = entry.depth;
            details.deepest_path = entry.path.clone();
        }
    }

    Ok(ParseResultVerbose { root, metrics, details })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::Bean;

    fn bean<R>(object: &Object, f: impl FnOnce(&DynamicBean) -> R) -> R {
        object.with::<DynamicBean, _>(f).expect("generic mapping builds DynamicBeans")
    }

    #[test]
    fn parse_builds_generic_tree() {
        let xml = r#"<catalog name="main">
            <book id="1"><title> Dune </title></book>
            <book id="2"/>
        </catalog>"#;
        let res = parse(xml).unwrap();
        let root = res.root.unwrap();

        assert_eq!(bean(&root, |b| b.type_name().to_string()), "catalog");
        assert_eq!(bean(&root, |b| b.get("name").cloned()), Some(Value::from("main")));
        assert_eq!(bean(&root, |b| b.get("text").cloned()), None, "whitespace-only text is dropped");

        let books: Vec<Object> = bean(&root, |b| b.children().iter().filter_map(Value::as_object).cloned().collect());
        assert_eq!(books.len(), 2);
        assert_eq!(bean(&books[1], |b| b.get("id").cloned()), Some(Value::from("2")));

        let title = bean(&books[0], |b| b.children()[0].clone());
        let title = title.as_object().unwrap();
        assert_eq!(bean(title, |b| b.get("text").cloned()), Some(Value::from("Dune")));
    }

    #[test]
    fn untrimmed_text_is_kept_as_written() {
        let options = Options { trim_text: false, ..Options::default() };
        let root = parse_with("<a> x </a>", &options).unwrap().root.unwrap();
        assert_eq!(bean(&root, |b| b.get("text").cloned()), Some(Value::from(" x ")));
    }

    #[test]
    fn parse_verbose_includes_metrics_and_details() {
        let res = parse_verbose("<a><b><c/></b><b/></a>").unwrap();

        assert_eq!(res.metrics.elements, 4);
        assert_eq!(res.metrics.matched_elements, 4);
        assert_eq!(res.metrics.max_depth, 3);
        assert_eq!(res.metrics.trace.len(), 4);
        assert_eq!(res.details.deepest_path, "a/b/c");
        assert_eq!(res.details.element_counts.get("b"), Some(&2));
        assert!(res.root.is_some());
    }

    #[test]
    fn syntax_errors_surface() {
        let err = parse("<a><b></a>").unwrap_err();
        assert!(matches!(err, DigestError::Syntax { .. }), "{err}");
    }
}
