//! Captured XML subtrees, as produced by [`NodeCreateRule`](crate::rules::NodeCreateRule).

use crate::Attributes;

/// A minimal element/text tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element { namespace_uri: String, name: String, attributes: Attributes, children: Vec<XmlNode> },
    Text(String),
    /// Children of an element without the element itself.
    Fragment(Vec<XmlNode>),
}

impl XmlNode {
    pub fn element(namespace_uri: &str, name: &str, attributes: Attributes) -> Self {
        XmlNode::Element {
            namespace_uri: namespace_uri.to_string(),
            name: name.to_string(),
            attributes,
            children: Vec::new(),
        }
    }

    pub fn fragment() -> Self {
        XmlNode::Fragment(Vec::new())
    }

    /// Element name, `#text` or `#fragment`.
    pub fn name(&self) -> &str {
        match self {
            XmlNode::Element { name, .. } => name,
            XmlNode::Text(_) => "#text",
            XmlNode::Fragment(_) => "#fragment",
        }
    }

    pub fn children(&self) -> &[XmlNode] {
        match self {
            XmlNode::Element { children, .. } | XmlNode::Fragment(children) => children,
            XmlNode::Text(_) => &[],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            XmlNode::Element { attributes, .. } => attributes.get(name),
            _ => None,
        }
    }

    /// Append a child; adjacent text is merged. Text nodes ignore children.
    pub fn append(&mut self, child: XmlNode) {
        let children = match self {
            XmlNode::Element { children, .. } | XmlNode::Fragment(children) => children,
            XmlNode::Text(_) => return,
        };
        if let (Some(XmlNode::Text(last)), XmlNode::Text(more)) = (children.last_mut(), &child) {
            last.push_str(more);
            return;
        }
        children.push(child);
    }

    /// Concatenated text of this node and all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element { children, .. } | XmlNode::Fragment(children) => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Builds an [`XmlNode`] from the events inside one element.
#[derive(Debug)]
pub(crate) struct NodeBuilder {
    /// Open elements below the root; the root itself is `open[0]`.
    open: Vec<XmlNode>,
}

impl NodeBuilder {
    pub(crate) fn new(root: XmlNode) -> Self {
        NodeBuilder { open: vec![root] }
    }

    /// Nesting depth below the captured root.
    pub(crate) fn depth(&self) -> usize {
        self.open.len() - 1
    }

    pub(crate) fn start_element(&mut self, namespace_uri: &str, name: &str, attributes: Attributes) {
        self.open.push(XmlNode::element(namespace_uri, name, attributes));
    }

    pub(crate) fn characters(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(top) = self.open.last_mut() {
            top.append(XmlNode::Text(text.to_string()));
        }
    }

    /// Close a nested element. Returns `false` when there is nothing nested
    /// to close, meaning the end tag belongs to the captured root.
    pub(crate) fn end_element(&mut self) -> bool {
        if self.open.len() <= 1 {
            return false;
        }
        if let Some(done) = self.open.pop() {
            if let Some(parent) = self.open.last_mut() {
                parent.append(done);
            }
        }
        true
    }

    pub(crate) fn finish(mut self) -> XmlNode {
        while self.end_element() {}
        self.open.pop().unwrap_or_else(XmlNode::fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_nests_and_merges_text() {
        let mut b = NodeBuilder::new(XmlNode::element("", "p", Attributes::new().with("class", "x")));
        b.characters("Hello ");
        b.start_element("", "b", Attributes::new());
        b.characters("big");
        b.characters(" world");
        assert_eq!(b.depth(), 1);
        assert!(b.end_element());
        b.characters("!");
        assert!(!b.end_element());

        let node = b.finish();
        assert_eq!(node.name(), "p");
        assert_eq!(node.attribute("class"), Some("x"));
        assert_eq!(node.children().len(), 3);
        assert_eq!(node.children()[1].text_content(), "big world");
        assert_eq!(node.text_content(), "Hello big world!");
    }

    #[test]
    fn fragment_has_no_name_of_its_own() {
        let mut b = NodeBuilder::new(XmlNode::fragment());
        b.start_element("", "a", Attributes::new());
        b.end_element();
        b.start_element("", "b", Attributes::new());
        let node = b.finish();
        assert_eq!(node.name(), "#fragment");
        let names: Vec<&str> = node.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
