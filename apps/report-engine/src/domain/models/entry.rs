//! Entry/exit planning models.

use rust_decimal::Decimal;

use super::{EntryModel, round2, seeded_unit, to_f64, to_price};
use crate::domain::report::EntryPlan;
use crate::domain::symbol::Symbol;

/// Daily volatility proxy in `[2%, 6%)`, stable per symbol.
fn volatility(symbol: &Symbol) -> f64 {
    seeded_unit(symbol, 21).mul_add(0.04, 0.02)
}

fn risk_reward(entry: f64, stop: f64, target: f64) -> f64 {
    let risk = entry - stop;
    if risk <= 0.0 {
        return 0.0;
    }
    round2((target - entry) / risk)
}

/// Buy a breakout above the current price, stop two volatility units
/// below, target four above.
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentumBreakoutModel;

impl MomentumBreakoutModel {
    /// Model id.
    pub const ID: &'static str = "momentum-breakout";
}

impl EntryModel for MomentumBreakoutModel {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Momentum Breakout"
    }

    fn plan(&self, symbol: &Symbol, price: Decimal) -> EntryPlan {
        let price = to_f64(price).max(0.0);
        let vol = volatility(symbol);

        let entry = price * (1.0 + vol / 2.0);
        let stop = entry * vol.mul_add(-2.0, 1.0);
        let target = entry * vol.mul_add(4.0, 1.0);

        EntryPlan {
            model_id: Self::ID.to_string(),
            model_label: self.label().to_string(),
            entry_price: to_price(entry),
            stop_loss: to_price(stop),
            take_profit: to_price(target),
            risk_reward: risk_reward(entry, stop, target),
            notes: vec![
                format!("Volatility {:.2}%", vol * 100.0),
                "Enter on close above breakout level".to_string(),
            ],
        }
    }
}

/// Buy a pullback below the current price, target a move back above it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PullbackValueModel;

impl PullbackValueModel {
    /// Model id.
    pub const ID: &'static str = "pullback-value";
}

impl EntryModel for PullbackValueModel {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Pullback Value"
    }

    fn plan(&self, symbol: &Symbol, price: Decimal) -> EntryPlan {
        let price = to_f64(price).max(0.0);
        let vol = volatility(symbol);

        let entry = price * (1.0 - vol);
        let stop = entry * vol.mul_add(-1.5, 1.0);
        let target = price * vol.mul_add(2.0, 1.0);

        EntryPlan {
            model_id: Self::ID.to_string(),
            model_label: self.label().to_string(),
            entry_price: to_price(entry),
            stop_loss: to_price(stop),
            take_profit: to_price(target),
            risk_reward: risk_reward(entry, stop, target),
            notes: vec![
                format!("Volatility {:.2}%", vol * 100.0),
                "Scale in on a pullback to support".to_string(),
            ],
        }
    }
}
