//! Cache keys for report metrics.

use std::fmt;

/// Cacheable report metric.
///
/// Model-backed metrics carry the model id so that every model variant
/// gets its own cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricKey {
    /// Analyst target consensus.
    TargetConsensus,
    /// News sentiment digest.
    Sentiment,
    /// Fundamental summary for a model id.
    Fundamental(String),
    /// Entry plan for a model id.
    Entry(String),
}

impl MetricKey {
    /// Store key for this metric.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::TargetConsensus => "target-consensus".to_string(),
            Self::Sentiment => "sentiment".to_string(),
            Self::Fundamental(model_id) => format!("fundamental:{model_id}"),
            Self::Entry(model_id) => format!("entry:{model_id}"),
        }
    }

    /// Metric family name, used as a low-cardinality metrics label.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::TargetConsensus => "target-consensus",
            Self::Sentiment => "sentiment",
            Self::Fundamental(_) => "fundamental",
            Self::Entry(_) => "entry",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}
