//! Report Types
//!
//! Value objects produced by the analysis models and merged by the
//! report assembler, plus the cache keys they are stored under.

mod keys;
mod types;

pub use keys::MetricKey;
pub use types::{
    AnalysisReport, EntryPlan, FundamentalSummary, LiveReport, NewsSignal, ReportMode,
    ReportOptions, SentimentDigest, TargetConsensus,
};
