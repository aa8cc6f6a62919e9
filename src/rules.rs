//! Standard rule library.
//!
//! Each rule keeps only configuration on `self`. Anything that must survive
//! from `begin` to `end` of one element occurrence goes on the digester's
//! stacks, so a single instance can match at several depths at once:
//!
//! | Rule                        | begin                     | body                | end                          |
//! |-----------------------------|---------------------------|---------------------|------------------------------|
//! | [`ObjectCreateRule`]        | instantiate + push        |                     | pop                          |
//! | [`FactoryCreateRule`]       | factory create + push     |                     | pop (unless creation failed) |
//! | [`SetPropertiesRule`]       | attributes -> properties  |                     |                              |
//! | [`SetNestedPropertiesRule`] | install child decorator   | remove decorator    |                              |
//! | [`SetPropertyRule`]         | one name/value attr pair  |                     |                              |
//! | [`BeanPropertySetterRule`]  |                           | stash trimmed text  | text -> property             |
//! | [`CallMethodRule`]          | push param frame          | stash text (0 args) | pop frame + invoke           |
//! | [`CallParamRule`]           | attribute / stack slot    | stash trimmed text  | text -> slot                 |
//! | [`ObjectParamRule`]         | fixed value -> slot       |                     |                              |
//! | [`PathCallParamRule`]       | match path -> slot        |                     |                              |
//! | [`LinkRule`]                | link (if fire_on_begin)   |                     | link                         |
//! | [`NodeCreateRule`]          | start subtree capture     |                     | pop captured node            |

#[path = "rules/call_method.rs"]
mod call_method;
#[path = "rules/call_param.rs"]
mod call_param;
#[path = "rules/factory_create.rs"]
mod factory_create;
#[path = "rules/link.rs"]
mod link;
#[path = "rules/node_create.rs"]
mod node_create;
#[path = "rules/object_create.rs"]
mod object_create;
#[path = "rules/properties.rs"]
mod properties;
#[path = "rules/set_nested_properties.rs"]
mod set_nested_properties;


pub use call_method::CallMethodRule;
pub use call_param::{CallParamRule, ObjectParamRule, PathCallParamRule};
pub use factory_create::{FactoryCreateRule, ObjectCreationFactory};
pub use link::{LinkRule, LinkTarget};
pub use node_create::NodeCreateRule;
pub use object_create::ObjectCreateRule;
pub use properties::{BeanPropertySetterRule, SetPropertiesRule, SetPropertyRule};
pub use set_nested_properties::SetNestedPropertiesRule;

use crate::Digester;
use crate::bean::Value;
use crate::error::RuleError;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_STACK_ID: AtomicUsize = AtomicUsize::new(0);

/// Name of a private named stack for one rule instance.
fn private_stack(kind: &str) -> String {
    format!("#{kind}-{}", NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed))
}

/// Clone of the top object, or an error naming the rule that needed it.
fn top(digester: &Digester, rule: &'static str) -> Result<Value, RuleError> {
    digester.peek().cloned().ok_or(RuleError::NothingOnStack(rule))
}
