//! Per-parse metrics.
//!
//! Counters are always collected; they are plain integer increments on the
//! dispatch path. The per-element trace allocates and is only recorded when
//! [`Options::collect_trace`](crate::Options) is set.
//!
//! Metrics are reset by `start_document` and [`Digester::reset`](crate::Digester::reset),
//! so after a parse they describe that parse only.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct ParseMetrics {
    /// Elapsed time between `start_document` and `end_document`.
    pub elapsed: Duration,
    /// Start tags dispatched (captured `NodeCreateRule` content excluded).
    pub elements: usize,
    /// Start tags for which the matcher returned at least one rule.
    pub matched_elements: usize,
    pub begin_calls: usize,
    pub body_calls: usize,
    pub end_calls: usize,
    pub finish_calls: usize,
    /// Deepest nesting seen.
    pub max_depth: usize,
    /// One entry per dispatched start tag, in document order.
    pub trace: Vec<ElementTrace>,
}

impl ParseMetrics {
    /// Share of elements that matched at least one rule.
    pub fn match_ratio(&self) -> f64 {
        if self.elements == 0 { 0.0 } else { self.matched_elements as f64 / self.elements as f64 }
    }
}

/// Which rules fired for one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTrace {
    pub path: String,
    pub depth: usize,
    pub rules: Vec<String>,
}
