//! Consensus estimation.

use rust_decimal::Decimal;

use super::{ConsensusEstimator, round2, seeded_unit, to_f64, to_price};
use crate::domain::report::TargetConsensus;
use crate::domain::symbol::Symbol;

impl TargetConsensus {
    /// Recompute `upside_pct` against a reference price.
    #[must_use]
    pub fn with_reference_price(mut self, price: Decimal) -> Self {
        self.upside_pct = upside_pct(self.mean_target, price);
        self
    }
}

/// Percent upside from `price` to `target`. Zero when `price` is not positive.
#[must_use]
pub fn upside_pct(target: Decimal, price: Decimal) -> f64 {
    let price = to_f64(price);
    if price <= 0.0 {
        return 0.0;
    }
    round2((to_f64(target) - price) / price * 100.0)
}

/// Rating implied by an upside percentage.
#[must_use]
pub fn rating_for_upside(upside_pct: f64) -> &'static str {
    if upside_pct >= 30.0 {
        "strong_buy"
    } else if upside_pct >= 15.0 {
        "buy"
    } else if upside_pct <= -5.0 {
        "sell"
    } else {
        "hold"
    }
}

/// Derives a plausible analyst consensus from the symbol and price when no
/// provider data is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticConsensusEstimator;

impl ConsensusEstimator for SyntheticConsensusEstimator {
    fn estimate(&self, symbol: &Symbol, price: Decimal) -> TargetConsensus {
        let base = to_f64(price).max(0.0);
        let drift = seeded_unit(symbol, 31).mul_add(0.30, -0.05);
        let spread = seeded_unit(symbol, 32);

        let mean = to_price(base * (1.0 + drift));
        let high = to_price(base * (1.0 + drift) * spread.mul_add(0.10, 1.15));
        let low = to_price(base * (1.0 + drift) * spread.mul_add(-0.10, 0.80));

        #[allow(clippy::cast_possible_truncation)]
        let analyst_count = 5 + (symbol.seed() % 30) as u32;
        let upside = upside_pct(mean, price);

        TargetConsensus {
            mean_target: mean,
            high_target: high,
            low_target: low,
            analyst_count,
            rating: rating_for_upside(upside).to_string(),
            upside_pct: upside,
        }
    }
}
