//! Report value types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::symbol::Symbol;

/// How a report was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Every metric recomputed, cache untouched.
    Fresh,
    /// Metrics served from the cache when fresh.
    Cached,
    /// Live provider data merged into the cached build.
    Live,
}

impl ReportMode {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Cached => "cached",
            Self::Live => "live",
        }
    }
}

/// Analyst price-target consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConsensus {
    /// Mean analyst target.
    pub mean_target: Decimal,
    /// Highest analyst target.
    pub high_target: Decimal,
    /// Lowest analyst target.
    pub low_target: Decimal,
    /// Number of contributing analysts.
    pub analyst_count: u32,
    /// Consensus rating (`buy`, `hold`, ...).
    pub rating: String,
    /// Upside from the reference price to the mean target, in percent.
    pub upside_pct: f64,
}

/// One news item or social signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSignal {
    /// Publisher or feed name.
    pub source: String,
    /// Headline or message text.
    pub text: String,
    /// Source confidence in `[0, 1]`.
    pub confidence: f64,
}

impl NewsSignal {
    /// Create a signal, clamping confidence into `[0, 1]`.
    #[must_use]
    pub fn new(source: impl Into<String>, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }
}

/// Aggregated sentiment over a set of signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentDigest {
    /// Weighted score in `[-1, 1]`.
    pub score: f64,
    /// `bullish`, `neutral` or `bearish`.
    pub label: String,
    /// Number of signals scored.
    pub signal_count: usize,
    /// Up to five representative headlines.
    pub headlines: Vec<String>,
    /// Distinct sources, sorted.
    pub sources: Vec<String>,
}

/// Output of a fundamental valuation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSummary {
    /// Model id.
    pub model_id: String,
    /// Human-readable model name.
    pub model_label: String,
    /// Estimated fair value per share.
    pub fair_value: Decimal,
    /// `(fair_value - price) / fair_value`, in percent.
    pub margin_of_safety_pct: f64,
    /// Quality score in `[0, 100]`.
    pub quality_score: f64,
    /// `undervalued`, `fair` or `overvalued`.
    pub verdict: String,
    /// Free-form model notes.
    pub notes: Vec<String>,
}

/// Output of an entry/exit planning model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPlan {
    /// Model id.
    pub model_id: String,
    /// Human-readable model name.
    pub model_label: String,
    /// Suggested entry.
    pub entry_price: Decimal,
    /// Protective stop.
    pub stop_loss: Decimal,
    /// Profit target.
    pub take_profit: Decimal,
    /// Reward divided by risk.
    pub risk_reward: f64,
    /// Free-form model notes.
    pub notes: Vec<String>,
}

/// Per-request report options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Fundamental model id; registry default when `None` or unknown.
    pub fundamental_model: Option<String>,
    /// Entry model id; registry default when `None` or unknown.
    pub entry_model: Option<String>,
    /// Caller-supplied signals used when sentiment is computed.
    #[serde(default)]
    pub signals: Vec<NewsSignal>,
    /// Price used in live mode when the provider has none.
    pub fallback_price: Option<Decimal>,
}

impl ReportOptions {
    /// Select a fundamental model.
    #[must_use]
    pub fn with_fundamental_model(mut self, id: impl Into<String>) -> Self {
        self.fundamental_model = Some(id.into());
        self
    }

    /// Select an entry model.
    #[must_use]
    pub fn with_entry_model(mut self, id: impl Into<String>) -> Self {
        self.entry_model = Some(id.into());
        self
    }

    /// Set caller-supplied signals.
    #[must_use]
    pub fn with_signals(mut self, signals: Vec<NewsSignal>) -> Self {
        self.signals = signals;
        self
    }

    /// Set the live-mode fallback price.
    #[must_use]
    pub const fn with_fallback_price(mut self, price: Decimal) -> Self {
        self.fallback_price = Some(price);
        self
    }
}

/// Merged analysis report for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Symbol.
    pub symbol: Symbol,
    /// Spot price used for this build. Never cached.
    pub current_price: Decimal,
    /// Analyst consensus.
    pub target_consensus: TargetConsensus,
    /// Sentiment digest.
    pub sentiment: SentimentDigest,
    /// Summary from the selected fundamental model.
    pub fundamentals: FundamentalSummary,
    /// Plan from the selected entry model.
    pub entry_plan: EntryPlan,
    /// Every registered fundamental model, computed fresh.
    pub fundamental_comparison: Vec<FundamentalSummary>,
    /// Every registered entry model, computed fresh.
    pub entry_comparison: Vec<EntryPlan>,
    /// Assembly mode.
    pub mode: ReportMode,
}

/// Live report plus the warnings raised while building it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReport {
    /// The merged report.
    pub report: AnalysisReport,
    /// Degradations encountered (provider failures, fallbacks).
    pub warnings: Vec<String>,
}
