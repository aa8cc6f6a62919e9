//! Matching and dispatch engine.
//!
//! This module is the hub for the parts that turn a stream of element events
//! into rule callbacks. The pieces live in focused submodules under
//! `src/engine/`, while the public paths stay flat (`crate::Digester`,
//! `crate::RulesBase`, ...).
//!
//! ## How the parts work together
//!
//! ```text
//! start_element(ns, name, attrs)
//!     │  push body text, extend match path "a/b" -> "a/b/c"
//!     v
//! Rules::match_rules(ns, "a/b/c")          (matcher.rs + rules_base.rs,
//!     │                                     extended_rules.rs, regex_rules.rs,
//!     │                                     defaults.rs)
//!     v
//! matches.push(list); rule.begin(..) for each, in order   (digester.rs)
//!     .
//!     .  characters(..) accumulate body text
//!     .
//! end_element(ns, name)
//!     │  list = matches.pop()
//!     │  rule.body(text) in order, rule.end() in reverse order
//!     v  truncate match path, restore parent's body text
//! end_document(): rule.finish() for every registered rule, clear stacks
//! ```
//!
//! ## Responsibilities by module
//!
//! - `matcher.rs`: the [`Rules`] strategy trait, [`RuleEntry`] and pattern
//!   validation shared by all matchers.
//! - `rules_base.rs`: exact and `*/suffix` matching, longest suffix wins.
//! - `extended_rules.rs`: universal (`!`), direct-child (`/?`), ancestor
//!   (`/*`) and catch-all (`*`) patterns on top of the base semantics.
//! - `regex_rules.rs`: every pattern accepted by a pluggable string matcher.
//! - `defaults.rs`: decorator returning default rules when nothing matched.
//! - `stack.rs`: the object, parameter and named stacks.
//! - `digester.rs`: the event dispatcher itself.
//! - `metrics.rs`: per-parse counters and optional per-element trace.
//!
//! ## Invariants
//!
//! - `matches.len()` equals the number of currently open elements, and so
//!   does the number of segments in the match path.
//! - A matcher returns rules in registration order; the dispatcher alone
//!   reverses them for `end`.

#[path = "engine/defaults.rs"]
mod defaults;
#[path = "engine/digester.rs"]
mod digester;
#[path = "engine/extended_rules.rs"]
mod extended_rules;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/regex_rules.rs"]
mod regex_rules;
#[path = "engine/rules_base.rs"]
mod rules_base;
#[path = "engine/stack.rs"]
mod stack;

pub use defaults::WithDefaultsRulesWrapper;
pub use digester::Digester;
pub use extended_rules::ExtendedBaseRules;
pub use matcher::{RuleEntry, Rules};
pub use metrics::{ElementTrace, ParseMetrics};
pub use regex_rules::{CompiledMatcher, GlobMatcher, RegexMatcher, RegexRules, StringMatcher};
pub use rules_base::RulesBase;
pub use stack::{NamedStacks, Stack};

#[cfg(test)]
pub(crate) use matcher::validate_pattern;
