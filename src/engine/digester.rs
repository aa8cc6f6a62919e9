use super::matcher::Rules;
use super::metrics::{ElementTrace, ParseMetrics};
use super::rules_base::RulesBase;
use super::stack::{NamedStacks, Stack};
use crate::api::Options;
use crate::bean::{Bean, BeanInvoker, ClassRegistry, Invoker, Value};
use crate::error::{DigestError, EmptyStackError, Phase, RuleError};
use crate::node::{NodeBuilder, XmlNode};
use crate::rules::{
    BeanPropertySetterRule, CallMethodRule, CallParamRule, FactoryCreateRule, LinkRule, NodeCreateRule,
    ObjectCreateRule, ObjectCreationFactory, ObjectParamRule, PathCallParamRule, SetNestedPropertiesRule,
    SetPropertiesRule, SetPropertyRule,
};
use crate::substitution::Substitutor;
use crate::{Attributes, Position, Rule, RuleRef};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// Event dispatcher and owner of all per-parse state.
///
/// One digester handles one document at a time. `root` survives
/// [`end_document`](Digester::end_document); call [`reset`](Digester::reset)
/// (or build a new digester) before reusing it for an unrelated document.
pub struct Digester {
    rules: Box<dyn Rules>,

    stack: Stack<Value>,
    params: Stack<Vec<Value>>,
    named: NamedStacks,
    root: Option<Value>,

    /// `"a/b/c"` for the open elements; `path_marks` holds the length to
    /// truncate back to on each end tag.
    match_path: String,
    path_marks: Vec<usize>,
    matches: Vec<Vec<RuleRef>>,
    body_text: String,
    body_texts: Vec<String>,
    node_builder: Option<NodeBuilder>,

    namespaces: HashMap<String, Vec<String>>,
    entities: HashMap<String, String>,
    position: Option<Position>,

    substitutor: Option<Box<dyn Substitutor>>,
    invoker: Rc<dyn Invoker>,
    classes: ClassRegistry,
    factories: HashMap<String, Rc<dyn ObjectCreationFactory>>,

    options: Options,
    metrics: ParseMetrics,
    started: Option<Instant>,
}

impl Default for Digester {
    fn default() -> Self {
        Digester::new()
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Digester")
            .field("match_path", &self.match_path)
            .field("stack", &self.stack)
            .field("params", &self.params.len())
            .field("root", &self.root)
            .field("classes", &self.classes)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn element_name<'a>(local_name: &'a str, qname: &'a str) -> &'a str {
    if local_name.is_empty() { qname } else { local_name }
}

impl Digester {
    pub fn new() -> Self {
        Digester::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Digester {
            rules: Box::new(RulesBase::new()),
            stack: Stack::new(),
            params: Stack::new(),
            named: NamedStacks::default(),
            root: None,
            match_path: String::new(),
            path_marks: Vec::new(),
            matches: Vec::new(),
            body_text: String::new(),
            body_texts: Vec::new(),
            node_builder: None,
            namespaces: HashMap::new(),
            entities: HashMap::new(),
            position: None,
            substitutor: None,
            invoker: Rc::new(BeanInvoker),
            classes: ClassRegistry::new(),
            factories: HashMap::new(),
            options,
            metrics: ParseMetrics::default(),
            started: None,
        }
    }

    /// Digester using `rules` as its matcher.
    pub fn with_rules(rules: impl Rules + 'static) -> Self {
        let mut digester = Digester::new();
        digester.set_rules(rules);
        digester
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn metrics(&self) -> &ParseMetrics {
        &self.metrics
    }

    // --- Matcher -------------------------------------------------------------

    pub fn rules(&self) -> &dyn Rules {
        self.rules.as_ref()
    }

    pub fn rules_mut(&mut self) -> &mut dyn Rules {
        self.rules.as_mut()
    }

    /// Replace the matcher. The new one keeps the current rule namespace.
    pub fn set_rules(&mut self, rules: impl Rules + 'static) {
        self.replace_rules(Box::new(rules));
    }

    /// Replace the matcher and hand back the previous one.
    pub fn replace_rules(&mut self, mut rules: Box<dyn Rules>) -> Box<dyn Rules> {
        if rules.namespace_uri().is_none() {
            rules.set_namespace_uri(self.rules.namespace_uri());
        }
        std::mem::replace(&mut self.rules, rules)
    }

    /// Namespace tag for rules registered from now on (`None` = any).
    pub fn set_rule_namespace_uri(&mut self, namespace_uri: Option<&str>) {
        self.rules.set_namespace_uri(namespace_uri);
    }

    /// Wrap the current matcher with a temporary decorator.
    ///
    /// Decorators must hand the wrapped matcher back from
    /// [`Rules::take_decorated`] and are removed in LIFO order with
    /// [`remove_rules_decorator`](Digester::remove_rules_decorator).
    pub fn install_rules_decorator(&mut self, wrap: impl FnOnce(Box<dyn Rules>) -> Box<dyn Rules>) {
        let current = std::mem::replace(&mut self.rules, Box::new(RulesBase::new()));
        self.rules = wrap(current);
    }

    /// Remove the innermost decorator. Returns `false` when the current
    /// matcher is not a decorator.
    pub fn remove_rules_decorator(&mut self) -> bool {
        match self.rules.take_decorated() {
            Some(inner) => {
                self.rules = inner;
                true
            }
            None => false,
        }
    }

    fn unwind_rules_decorators(&mut self) {
        while self.remove_rules_decorator() {
            log::debug!(target: "digester", "removed a leftover matcher decorator");
        }
    }

    pub fn add_rule(&mut self, pattern: &str, rule: impl Rule + 'static) -> Result<(), DigestError> {
        self.add_rule_ref(pattern, Rc::new(rule))
    }

    /// Register an already shared rule, e.g. one instance under several patterns.
    pub fn add_rule_ref(&mut self, pattern: &str, rule: RuleRef) -> Result<(), DigestError> {
        log::debug!(target: "digester", "add {} for '{}'", rule.name(), pattern);
        self.rules.add(pattern, rule)?;
        Ok(())
    }

    // --- Collaborators -------------------------------------------------------

    pub fn invoker(&self) -> Rc<dyn Invoker> {
        self.invoker.clone()
    }

    pub fn set_invoker(&mut self, invoker: impl Invoker + 'static) {
        self.invoker = Rc::new(invoker);
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn classes_mut(&mut self) -> &mut ClassRegistry {
        &mut self.classes
    }

    pub fn register_class<T: Bean + Default>(&mut self, name: &str) {
        self.classes.register::<T>(name);
    }

    pub fn register_factory(&mut self, name: &str, factory: impl ObjectCreationFactory + 'static) {
        self.factories.insert(name.to_string(), Rc::new(factory));
    }

    pub fn factory(&self, name: &str) -> Option<Rc<dyn ObjectCreationFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn set_substitutor(&mut self, substitutor: impl Substitutor + 'static) {
        self.substitutor = Some(Box::new(substitutor));
    }

    pub fn clear_substitutor(&mut self) {
        self.substitutor = None;
    }

    // --- Object stack --------------------------------------------------------

    /// Push onto the object stack. The first object pushed onto an empty
    /// stack becomes the root.
    pub fn push(&mut self, value: impl Into<Value>) {
        let value = value.into();
        if self.stack.is_empty() {
            self.root = Some(value.clone());
        }
        log::trace!(target: "digester::stack", "push {} (depth {})", value.kind(), self.stack.len() + 1);
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        let popped = self.stack.pop();
        if popped.is_none() {
            log::warn!(target: "digester::stack", "pop on empty object stack at '{}'", self.match_path);
        }
        popped
    }

    pub fn peek(&self) -> Option<&Value> {
        self.peek_at(0)
    }

    /// `n` levels below the top.
    pub fn peek_at(&self, n: usize) -> Option<&Value> {
        let found = self.stack.peek_at(n);
        if found.is_none() {
            log::warn!(target: "digester::stack", "peek({n}) beyond object stack depth {}", self.stack.len());
        }
        found
    }

    pub fn count(&self) -> usize {
        self.stack.len()
    }

    /// The first object pushed during the current (or last) parse.
    pub fn root(&self) -> Option<&Value> {
        self.root.as_ref()
    }

    pub fn take_root(&mut self) -> Option<Value> {
        self.root.take()
    }

    // --- Parameter stack -----------------------------------------------------

    pub fn push_params(&mut self, frame: Vec<Value>) {
        self.params.push(frame);
    }

    pub fn pop_params(&mut self) -> Option<Vec<Value>> {
        let popped = self.params.pop();
        if popped.is_none() {
            log::warn!(target: "digester::stack", "pop on empty parameter stack at '{}'", self.match_path);
        }
        popped
    }

    pub fn peek_params(&self) -> Option<&[Value]> {
        self.peek_params_at(0)
    }

    pub fn peek_params_at(&self, n: usize) -> Option<&[Value]> {
        self.params.peek_at(n).map(Vec::as_slice)
    }

    pub fn peek_params_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.params.peek_at_mut(0)
    }

    /// Store `value` in slot `index` of the top parameter frame.
    pub fn set_param(&mut self, index: usize, value: Value) -> Result<(), RuleError> {
        let frame = self.params.peek_at_mut(0).ok_or(RuleError::NoParameterFrame)?;
        let len = frame.len();
        let slot = frame.get_mut(index).ok_or(RuleError::ParamIndex { index, len })?;
        *slot = value;
        Ok(())
    }

    // --- Named stacks --------------------------------------------------------

    pub fn push_named(&mut self, name: &str, value: impl Into<Value>) {
        self.named.push(name, value.into());
    }

    /// Unlike the object stack, popping an empty named stack is an error.
    pub fn pop_named(&mut self, name: &str) -> Result<Value, EmptyStackError> {
        self.named.pop(name)
    }

    pub fn peek_named(&self, name: &str) -> Option<&Value> {
        self.named.peek(name, 0)
    }

    pub fn peek_named_at(&self, name: &str, n: usize) -> Option<&Value> {
        self.named.peek(name, n)
    }

    pub fn peek_named_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.named.peek_mut(name, 0)
    }

    pub fn is_empty_named(&self, name: &str) -> bool {
        self.named.is_empty(name)
    }

    pub fn named_stacks(&self) -> &NamedStacks {
        &self.named
    }

    // --- Document state ------------------------------------------------------

    /// Path of the currently open elements, e.g. `"catalog/book"`.
    pub fn match_path(&self) -> &str {
        &self.match_path
    }

    /// Number of currently open (dispatched) elements.
    pub fn depth(&self) -> usize {
        self.matches.len()
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Called by event sources before each event.
    pub fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
    }

    pub fn start_prefix_mapping(&mut self, prefix: &str, namespace_uri: &str) {
        log::trace!(target: "digester", "prefix '{prefix}' -> '{namespace_uri}'");
        self.namespaces.entry(prefix.to_string()).or_default().push(namespace_uri.to_string());
    }

    pub fn end_prefix_mapping(&mut self, prefix: &str) {
        let Some(uris) = self.namespaces.get_mut(prefix) else {
            log::warn!(target: "digester", "end of unknown prefix mapping '{prefix}'");
            return;
        };
        uris.pop();
        if uris.is_empty() {
            self.namespaces.remove(prefix);
        }
    }

    /// URI currently bound to `prefix` (`""` is the default namespace).
    pub fn find_namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix)?.last().map(String::as_str)
    }

    /// Map a public identifier to a local location.
    pub fn register_entity(&mut self, public_id: &str, location: &str) {
        self.entities.insert(public_id.to_string(), location.to_string());
    }

    /// Registered location for `public_id`, else the system identifier.
    pub fn resolve_entity(&self, public_id: Option<&str>, system_id: Option<&str>) -> Option<String> {
        public_id
            .and_then(|id| self.entities.get(id).cloned())
            .or_else(|| system_id.filter(|s| !s.is_empty()).map(str::to_string))
    }

    pub(crate) fn begin_node_capture(&mut self, root: XmlNode) {
        self.node_builder = Some(NodeBuilder::new(root));
    }

    /// Whether element events are currently going into a captured subtree.
    pub fn is_capturing(&self) -> bool {
        self.node_builder.is_some()
    }

    /// Drop per-parse state: path, text buffers and all stacks. Keeps `root`,
    /// the rules and every collaborator.
    pub fn clear(&mut self) {
        self.match_path.clear();
        self.path_marks.clear();
        self.matches.clear();
        self.body_text.clear();
        self.body_texts.clear();
        self.node_builder = None;
        self.stack.clear();
        self.params.clear();
        self.named.clear();
    }

    /// Everything [`clear`](Digester::clear) does, plus root, namespace
    /// bindings, position, metrics and any matcher decorator left installed.
    pub fn reset(&mut self) {
        self.unwind_rules_decorators();
        self.clear();
        self.root = None;
        self.namespaces.clear();
        self.position = None;
        self.metrics = ParseMetrics::default();
        self.started = None;
    }

    /// Cleanup after a failed parse. Root is kept for inspection.
    pub(crate) fn abort(&mut self) {
        self.unwind_rules_decorators();
        self.clear();
        self.namespaces.clear();
        self.started = None;
    }

    // --- Events --------------------------------------------------------------

    pub fn start_document(&mut self) {
        log::debug!(target: "digester", "start document");
        self.metrics = ParseMetrics::default();
        self.started = Some(Instant::now());
    }

    pub fn start_element(
        &mut self,
        namespace_uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &Attributes,
    ) -> Result<(), DigestError> {
        let name = element_name(local_name, qname);
        if let Some(builder) = self.node_builder.as_mut() {
            builder.start_element(namespace_uri, name, attributes.clone());
            return Ok(());
        }

        self.body_texts.push(std::mem::take(&mut self.body_text));
        self.path_marks.push(self.match_path.len());
        if !self.match_path.is_empty() {
            self.match_path.push('/');
        }
        self.match_path.push_str(name);
        log::debug!(target: "digester", "start '{}'", self.match_path);

        let matched = self.rules.match_rules(namespace_uri, &self.match_path, name, attributes);
        self.matches.push(matched.clone());
        self.record_element(&matched);
        if matched.is_empty() {
            return Ok(());
        }

        let substituted;
        let attributes = match &self.substitutor {
            Some(substitutor) => {
                substituted = substitutor.substitute_attributes(attributes);
                &substituted
            }
            None => attributes,
        };
        for rule in &matched {
            log::trace!(target: "digester::rules", "{}.begin() at '{}'", rule.name(), self.match_path);
            self.metrics.begin_calls += 1;
            rule.begin(self, namespace_uri, name, attributes).map_err(|e| self.rule_failed(rule, Phase::Begin, e))?;
        }
        Ok(())
    }

    pub fn characters(&mut self, text: &str) {
        match self.node_builder.as_mut() {
            Some(builder) => builder.characters(text),
            None => self.body_text.push_str(text),
        }
    }

    pub fn end_element(&mut self, namespace_uri: &str, local_name: &str, qname: &str) -> Result<(), DigestError> {
        let name = element_name(local_name, qname);
        if let Some(builder) = self.node_builder.as_mut() {
            if builder.end_element() {
                return Ok(());
            }
            if let Some(builder) = self.node_builder.take() {
                self.push(Value::from(builder.finish()));
            }
        }

        let matched = self.matches.pop().ok_or_else(|| DigestError::Unbalanced { name: name.to_string() })?;
        log::debug!(target: "digester", "end '{}'", self.match_path);

        let text = std::mem::take(&mut self.body_text);
        if !matched.is_empty() {
            let text = match &self.substitutor {
                Some(substitutor) => substitutor.substitute_body(&text),
                None => text,
            };
            for rule in &matched {
                log::trace!(target: "digester::rules", "{}.body() at '{}'", rule.name(), self.match_path);
                self.metrics.body_calls += 1;
                rule.body(self, namespace_uri, name, &text).map_err(|e| self.rule_failed(rule, Phase::Body, e))?;
            }
        }
        self.body_text = self.body_texts.pop().unwrap_or_default();

        for rule in matched.iter().rev() {
            log::trace!(target: "digester::rules", "{}.end() at '{}'", rule.name(), self.match_path);
            self.metrics.end_calls += 1;
            rule.end(self, namespace_uri, name).map_err(|e| self.rule_failed(rule, Phase::End, e))?;
        }

        if let Some(mark) = self.path_marks.pop() {
            self.match_path.truncate(mark);
        }
        Ok(())
    }

    /// Call `finish` on every registered rule, then clear per-parse state.
    pub fn end_document(&mut self) -> Result<(), DigestError> {
        if self.stack.len() > 1 {
            log::warn!(target: "digester::stack", "document ended with {} objects on the stack", self.stack.len());
        }
        let finished = self.finish_rules();
        if let Some(started) = self.started.take() {
            self.metrics.elapsed = started.elapsed();
        }
        log::debug!(target: "digester", "end document");
        self.clear();
        finished
    }

    fn finish_rules(&mut self) -> Result<(), DigestError> {
        let mut finished: Vec<RuleRef> = Vec::new();
        for rule in self.rules.rules() {
            // one instance registered under several patterns still finishes once
            if finished.iter().any(|seen| Rc::ptr_eq(seen, &rule)) {
                continue;
            }
            finished.push(rule.clone());
            self.metrics.finish_calls += 1;
            rule.finish(self).map_err(|e| self.rule_failed(&rule, Phase::Finish, e))?;
        }
        Ok(())
    }

    fn record_element(&mut self, matched: &[RuleRef]) {
        let depth = self.matches.len();
        self.metrics.elements += 1;
        if !matched.is_empty() {
            self.metrics.matched_elements += 1;
        }
        self.metrics.max_depth = self.metrics.max_depth.max(depth);
        if self.options.collect_trace {
            self.metrics.trace.push(ElementTrace {
                path: self.match_path.clone(),
                depth,
                rules: matched.iter().map(|r| r.name().to_string()).collect(),
            });
        }
    }

    fn rule_failed(&self, rule: &RuleRef, phase: Phase, source: RuleError) -> DigestError {
        log::error!(target: "digester", "{}.{}() failed at '{}': {}", rule.name(), phase, self.match_path, source);
        DigestError::Rule {
            rule: rule.name().to_string(),
            phase,
            path: self.match_path.clone(),
            position: self.position,
            source,
        }
    }
}

// --- Registration shortcuts --------------------------------------------------

impl Digester {
    pub fn add_object_create(&mut self, pattern: &str, class_name: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, ObjectCreateRule::new(class_name))
    }

    /// Like [`add_object_create`](Digester::add_object_create), letting
    /// `attribute` override the class name.
    pub fn add_object_create_with(
        &mut self,
        pattern: &str,
        class_name: &str,
        attribute: &str,
    ) -> Result<(), DigestError> {
        self.add_rule(pattern, ObjectCreateRule::new(class_name).attribute_override(attribute))
    }

    pub fn add_factory_create(
        &mut self,
        pattern: &str,
        factory: impl ObjectCreationFactory + 'static,
        ignore_create_exceptions: bool,
    ) -> Result<(), DigestError> {
        let rule = FactoryCreateRule::with_factory(factory).ignore_create_exceptions(ignore_create_exceptions);
        self.add_rule(pattern, rule)
    }

    pub fn add_set_properties(&mut self, pattern: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, SetPropertiesRule::new())
    }

    pub fn add_set_nested_properties(&mut self, pattern: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, SetNestedPropertiesRule::new())
    }

    pub fn add_set_property(&mut self, pattern: &str, name_attr: &str, value_attr: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, SetPropertyRule::new(name_attr, value_attr))
    }

    pub fn add_bean_property_setter(&mut self, pattern: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, BeanPropertySetterRule::new())
    }

    pub fn add_set_next(&mut self, pattern: &str, method: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, LinkRule::set_next(method))
    }

    pub fn add_set_root(&mut self, pattern: &str, method: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, LinkRule::set_root(method))
    }

    pub fn add_set_top(&mut self, pattern: &str, method: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, LinkRule::set_top(method))
    }

    /// `param_count == 0` passes the element's body text as the only argument.
    pub fn add_call_method(&mut self, pattern: &str, method: &str, param_count: usize) -> Result<(), DigestError> {
        self.add_rule(pattern, CallMethodRule::new(method, param_count))
    }

    pub fn add_call_param(&mut self, pattern: &str, index: usize) -> Result<(), DigestError> {
        self.add_rule(pattern, CallParamRule::body(index))
    }

    pub fn add_call_param_attribute(
        &mut self,
        pattern: &str,
        index: usize,
        attribute: &str,
    ) -> Result<(), DigestError> {
        self.add_rule(pattern, CallParamRule::attribute(index, attribute))
    }

    pub fn add_call_param_stack(&mut self, pattern: &str, index: usize, stack_index: usize) -> Result<(), DigestError> {
        self.add_rule(pattern, CallParamRule::stack(index, stack_index))
    }

    pub fn add_call_param_path(&mut self, pattern: &str, index: usize) -> Result<(), DigestError> {
        self.add_rule(pattern, PathCallParamRule::new(index))
    }

    pub fn add_object_param(
        &mut self,
        pattern: &str,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), DigestError> {
        self.add_rule(pattern, ObjectParamRule::new(index, value))
    }

    pub fn add_node_create(&mut self, pattern: &str) -> Result<(), DigestError> {
        self.add_rule(pattern, NodeCreateRule::element())
    }
}
