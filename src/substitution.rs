//! Attribute and body-text substitution.
//!
//! A [`Substitutor`] installed on the digester sees every attribute list
//! before `begin` and every body text before `body`.

use crate::Attributes;
use std::collections::HashMap;

pub trait Substitutor {
    fn substitute_attributes(&self, attributes: &Attributes) -> Attributes;
    fn substitute_body(&self, text: &str) -> String;
}

/// Expands `${name}` references from a variable map.
///
/// Unknown variables are left as written. Substitution is single-pass: a
/// value containing `${...}` is not expanded again.
#[derive(Debug, Clone, Default)]
pub struct VariableSubstitutor {
    variables: HashMap<String, String>,
    attributes: bool,
    body: bool,
}

impl VariableSubstitutor {
    /// Substitute in both attributes and body text.
    pub fn new(variables: HashMap<String, String>) -> Self {
        VariableSubstitutor { variables, attributes: true, body: true }
    }

    pub fn attributes_only(mut self) -> Self {
        self.body = false;
        self
    }

    pub fn body_only(mut self) -> Self {
        self.attributes = false;
        self
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.variables.insert(name.to_string(), value.to_string());
    }

    pub fn expand(&self, text: &str) -> String {
        if !text.contains("${") {
            return text.to_string();
        }
        regex!(r"\$\{([^}]+)\}")
            .replace_all(text, |caps: &regex::Captures| match self.variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl Substitutor for VariableSubstitutor {
    fn substitute_attributes(&self, attributes: &Attributes) -> Attributes {
        if self.attributes { attributes.map_values(|v| self.expand(v)) } else { attributes.clone() }
    }

    fn substitute_body(&self, text: &str) -> String {
        if self.body { self.expand(text) } else { text.to_string() }
    }
}
