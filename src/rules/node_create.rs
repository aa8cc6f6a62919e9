use crate::error::RuleError;
use crate::node::XmlNode;
use crate::{Attributes, Digester, Rule};

/// Captures the matched element's subtree as an [`XmlNode`].
///
/// While capturing, events inside the element bypass rule matching and build
/// the node instead. At the element's end tag the node is pushed onto the
/// object stack (as `Value::Node`), so rules at the same element can link
/// it; this rule's `end` pops it again.
#[derive(Debug, Clone, Copy)]
pub struct NodeCreateRule {
    fragment: bool,
}

impl NodeCreateRule {
    /// The element itself, with attributes and content.
    pub fn element() -> Self {
        NodeCreateRule { fragment: false }
    }

    /// Only the element's content.
    pub fn fragment() -> Self {
        NodeCreateRule { fragment: true }
    }
}

impl Rule for NodeCreateRule {
    fn name(&self) -> &str {
        "NodeCreateRule"
    }

    fn begin(&self, digester: &mut Digester, ns: &str, name: &str, attributes: &Attributes) -> Result<(), RuleError> {
        let root = if self.fragment { XmlNode::fragment() } else { XmlNode::element(ns, name, attributes.clone()) };
        digester.begin_node_capture(root);
        Ok(())
    }

    fn end(&self, digester: &mut Digester, _ns: &str, _name: &str) -> Result<(), RuleError> {
        digester.pop();
        Ok(())
    }
}
