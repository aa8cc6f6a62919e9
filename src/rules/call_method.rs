use super::private_stack;
use crate::bean::{Value, ValueType};
use crate::error::RuleError;
use crate::{Attributes, Digester, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arguments {
    /// The element's body text is the only argument.
    BodyText,
    /// No arguments at all.
    None,
    /// A frame of this many slots on the parameter stack.
    Frame(usize),
}

/// Calls a method on a stack object when the element ends.
///
/// With `param_count > 0`, `begin` pushes a frame of `Null`s that nested
/// [`CallParamRule`](super::CallParamRule)s fill in; `end` pops it and
/// invokes. A one-slot frame that stayed `Null` skips the call. With
/// `param_count == 0` the element's body text is the single argument.
///
/// The target is `peek(offset)` for a non-negative offset and
/// `peek(count + offset)` for a negative one, so `-1` is the root.
#[derive(Debug, Clone)]
pub struct CallMethodRule {
    method: String,
    arguments: Arguments,
    param_types: Vec<ValueType>,
    target_offset: isize,
    texts: String,
}

impl CallMethodRule {
    pub fn new(method: &str, param_count: usize) -> Self {
        let arguments = if param_count == 0 { Arguments::BodyText } else { Arguments::Frame(param_count) };
        CallMethodRule {
            method: method.to_string(),
            arguments,
            param_types: Vec::new(),
            target_offset: 0,
            texts: private_stack("call-method-text"),
        }
    }

    /// Call `method()` with no arguments.
    pub fn no_args(method: &str) -> Self {
        CallMethodRule { arguments: Arguments::None, ..CallMethodRule::new(method, 0) }
    }

    /// Coerce arguments to `types` instead of the target's declared signature.
    pub fn param_types(mut self, types: &[ValueType]) -> Self {
        self.param_types = types.to_vec();
        self
    }

    pub fn target_offset(mut self, offset: isize) -> Self {
        self.target_offset = offset;
        self
    }

    fn target(&self, digester: &Digester) -> Result<Value, RuleError> {
        let depth = digester.count();
        let index = if self.target_offset >= 0 {
            Some(self.target_offset as usize)
        } else {
            depth.checked_sub(self.target_offset.unsigned_abs())
        };
        index
            .and_then(|idx| digester.peek_at(idx))
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or(RuleError::NoCallTarget { offset: self.target_offset, depth })
    }
}

impl Rule for CallMethodRule {
    fn name(&self) -> &str {
        "CallMethodRule"
    }

    fn begin(
        &self,
        digester: &mut Digester,
        _ns: &str,
        _name: &str,
        _attributes: &Attributes,
    ) -> Result<(), RuleError> {
        if let Arguments::Frame(count) = self.arguments {
            digester.push_params(vec![Value::Null; count]);
        }
        Ok(())
    }

    fn body(&self, digester: &mut Digester, _ns: &str, _name: &str, text: &str) -> Result<(), RuleError> {
        if self.arguments == Arguments::BodyText {
            digester.push_named(&self.texts, text.trim());
        }
        Ok(())
    }

    fn end(&self, digester: &mut Digester, _ns: &str, _name: &str) -> Result<(), RuleError> {
        let args = match self.arguments {
            Arguments::Frame(count) => {
                let frame = digester.pop_params().ok_or(RuleError::NoParameterFrame)?;
                if count == 1 && frame.first().is_none_or(Value::is_null) {
                    log::debug!(
                        target: "digester::rules",
                        "[CallMethodRule] {}: parameter never set, call skipped",
                        self.method
                    );
                    return Ok(());
                }
                frame
            }
            Arguments::BodyText => vec![digester.pop_named(&self.texts)?],
            Arguments::None => Vec::new(),
        };

        let target = self.target(digester)?;
        let kind = target.kind();
        log::debug!(target: "digester::rules", "[CallMethodRule] {kind}.{}({} args)", self.method, args.len());
        digester.invoker().invoke(&target, &self.method, args, &self.param_types)?;
        Ok(())
    }
}
