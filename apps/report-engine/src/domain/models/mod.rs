//! Analysis Models
//!
//! Deterministic models that turn `(symbol, price)` or `(symbol, signals)`
//! into report metrics. The cache only relies on a model's `id()` and on
//! its output; the formulas here are intentionally simple.
//!
//! # Models
//!
//! - Fundamental: [`DcfCoreModel`] (`dcf-core`), [`QualityFactorsModel`] (`quality-factors`)
//! - Entry: [`MomentumBreakoutModel`] (`momentum-breakout`), [`PullbackValueModel`] (`pullback-value`)
//! - Sentiment: [`KeywordSentimentEngine`]
//! - Consensus: [`SyntheticConsensusEstimator`]

mod consensus;
mod entry;
mod fundamental;
mod sentiment;

pub use consensus::{SyntheticConsensusEstimator, rating_for_upside, upside_pct};
pub use entry::{MomentumBreakoutModel, PullbackValueModel};
pub use fundamental::{DcfCoreModel, QualityFactorsModel};
pub use sentiment::KeywordSentimentEngine;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Serialize;

use crate::domain::report::{EntryPlan, FundamentalSummary, NewsSignal, SentimentDigest, TargetConsensus};
use crate::domain::symbol::Symbol;

// =============================================================================
// Model Traits
// =============================================================================

/// Fundamental valuation model.
pub trait FundamentalModel: Send + Sync {
    /// Stable id, used in cache keys.
    fn id(&self) -> &str;

    /// Display name.
    fn label(&self) -> &str;

    /// Evaluate the symbol at `price`.
    fn evaluate(&self, symbol: &Symbol, price: Decimal) -> FundamentalSummary;
}

/// Entry/exit planning model.
pub trait EntryModel: Send + Sync {
    /// Stable id, used in cache keys.
    fn id(&self) -> &str;

    /// Display name.
    fn label(&self) -> &str;

    /// Build a plan for the symbol at `price`.
    fn plan(&self, symbol: &Symbol, price: Decimal) -> EntryPlan;
}

/// Turns news signals into a sentiment digest.
pub trait SentimentEngine: Send + Sync {
    /// Digest `signals` for `symbol`. Empty input yields a neutral digest.
    fn digest(&self, symbol: &Symbol, signals: &[NewsSignal]) -> SentimentDigest;
}

/// Produces a target consensus when no analyst data is available.
pub trait ConsensusEstimator: Send + Sync {
    /// Estimate the consensus for `symbol` at `price`.
    fn estimate(&self, symbol: &Symbol, price: Decimal) -> TargetConsensus;
}

// =============================================================================
// Registry
// =============================================================================

/// Id and label of a registered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Model id.
    pub id: String,
    /// Display name.
    pub label: String,
}

/// Read-only set of models shared by every report build.
///
/// The first registered fundamental and entry model are the defaults.
pub struct ModelRegistry {
    fundamentals: Vec<Box<dyn FundamentalModel>>,
    entries: Vec<Box<dyn EntryModel>>,
    sentiment: Box<dyn SentimentEngine>,
    consensus: Box<dyn ConsensusEstimator>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("fundamentals", &self.fundamental_models())
            .field("entries", &self.entry_models())
            .finish_non_exhaustive()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ModelRegistry {
    /// Create a registry with one default model of each kind.
    #[must_use]
    pub fn new(
        default_fundamental: Box<dyn FundamentalModel>,
        default_entry: Box<dyn EntryModel>,
        sentiment: Box<dyn SentimentEngine>,
        consensus: Box<dyn ConsensusEstimator>,
    ) -> Self {
        Self {
            fundamentals: vec![default_fundamental],
            entries: vec![default_entry],
            sentiment,
            consensus,
        }
    }

    /// Registry with every built-in model.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(DcfCoreModel),
            Box::new(MomentumBreakoutModel),
            Box::new(KeywordSentimentEngine::default()),
            Box::new(SyntheticConsensusEstimator),
        )
        .with_fundamental(Box::new(QualityFactorsModel))
        .with_entry(Box::new(PullbackValueModel))
    }

    /// Register an additional fundamental model.
    #[must_use]
    pub fn with_fundamental(mut self, model: Box<dyn FundamentalModel>) -> Self {
        self.fundamentals.push(model);
        self
    }

    /// Register an additional entry model.
    #[must_use]
    pub fn with_entry(mut self, model: Box<dyn EntryModel>) -> Self {
        self.entries.push(model);
        self
    }

    /// Resolve a fundamental model by id, falling back to the default.
    #[must_use]
    pub fn fundamental(&self, id: Option<&str>) -> &dyn FundamentalModel {
        id.and_then(|id| self.fundamentals.iter().find(|m| m.id() == id))
            .unwrap_or(&self.fundamentals[0])
            .as_ref()
    }

    /// Resolve an entry model by id, falling back to the default.
    #[must_use]
    pub fn entry(&self, id: Option<&str>) -> &dyn EntryModel {
        id.and_then(|id| self.entries.iter().find(|m| m.id() == id))
            .unwrap_or(&self.entries[0])
            .as_ref()
    }

    /// Whether a fundamental model with this id is registered.
    #[must_use]
    pub fn has_fundamental(&self, id: &str) -> bool {
        self.fundamentals.iter().any(|m| m.id() == id)
    }

    /// Whether an entry model with this id is registered.
    #[must_use]
    pub fn has_entry(&self, id: &str) -> bool {
        self.entries.iter().any(|m| m.id() == id)
    }

    /// All fundamental models, in registration order.
    pub fn fundamentals(&self) -> impl Iterator<Item = &dyn FundamentalModel> {
        self.fundamentals.iter().map(|m| m.as_ref())
    }

    /// All entry models, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &dyn EntryModel> {
        self.entries.iter().map(|m| m.as_ref())
    }

    /// Sentiment engine.
    #[must_use]
    pub fn sentiment(&self) -> &dyn SentimentEngine {
        self.sentiment.as_ref()
    }

    /// Consensus estimator.
    #[must_use]
    pub fn consensus(&self) -> &dyn ConsensusEstimator {
        self.consensus.as_ref()
    }

    /// Ids and labels of the fundamental models.
    #[must_use]
    pub fn fundamental_models(&self) -> Vec<ModelInfo> {
        self.fundamentals()
            .map(|m| ModelInfo {
                id: m.id().to_string(),
                label: m.label().to_string(),
            })
            .collect()
    }

    /// Ids and labels of the entry models.
    #[must_use]
    pub fn entry_models(&self) -> Vec<ModelInfo> {
        self.entries()
            .map(|m| ModelInfo {
                id: m.id().to_string(),
                label: m.label().to_string(),
            })
            .collect()
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Deterministic value in `[0, 1)` for a symbol and a salt.
pub(crate) fn seeded_unit(symbol: &Symbol, salt: u64) -> f64 {
    // SplitMix64 finalizer over the symbol seed.
    let mut z = symbol
        .seed()
        .wrapping_add(salt.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;

    #[allow(clippy::cast_precision_loss)]
    let unit = (z >> 11) as f64 / (1_u64 << 53) as f64;
    unit
}

/// Deterministic placeholder price for a symbol with no quote, in `[20, 500)`.
#[must_use]
pub fn synthetic_price(symbol: &Symbol) -> Decimal {
    to_price(seeded_unit(symbol, 0).mul_add(480.0, 20.0))
}

pub(crate) fn to_price(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO).round_dp(2)
}

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
