//! Fundamental valuation models.

use rust_decimal::Decimal;

use super::{FundamentalModel, round2, seeded_unit, to_f64, to_price};
use crate::domain::report::FundamentalSummary;
use crate::domain::symbol::Symbol;

/// Margin of safety (percent) beyond which a symbol is called undervalued
/// or overvalued.
const VERDICT_BAND_PCT: f64 = 15.0;

const TERMINAL_GROWTH: f64 = 0.025;
const PROJECTION_YEARS: i32 = 5;

fn margin_of_safety_pct(fair_value: f64, price: f64) -> f64 {
    if fair_value <= 0.0 {
        return 0.0;
    }
    round2((fair_value - price) / fair_value * 100.0)
}

fn verdict(margin_pct: f64) -> &'static str {
    if margin_pct >= VERDICT_BAND_PCT {
        "undervalued"
    } else if margin_pct <= -VERDICT_BAND_PCT {
        "overvalued"
    } else {
        "fair"
    }
}

// =============================================================================
// DCF
// =============================================================================

/// Five-year discounted cash flow with a Gordon terminal value.
///
/// Free-cash-flow yield, growth and discount rate are derived from the
/// symbol so a symbol always gets the same assumptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcfCoreModel;

impl DcfCoreModel {
    /// Model id.
    pub const ID: &'static str = "dcf-core";
}

impl FundamentalModel for DcfCoreModel {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Discounted Cash Flow"
    }

    fn evaluate(&self, symbol: &Symbol, price: Decimal) -> FundamentalSummary {
        let price = to_f64(price).max(0.0);
        let fcf_yield = seeded_unit(symbol, 1).mul_add(0.04, 0.03);
        let growth = seeded_unit(symbol, 2).mul_add(0.10, 0.02);
        let discount = seeded_unit(symbol, 3).mul_add(0.04, 0.08);

        let fcf = price * fcf_yield;
        let explicit: f64 = (1..=PROJECTION_YEARS)
            .map(|year| fcf * (1.0 + growth).powi(year) / (1.0 + discount).powi(year))
            .sum();
        let final_fcf = fcf * (1.0 + growth).powi(PROJECTION_YEARS);
        let terminal = final_fcf * (1.0 + TERMINAL_GROWTH) / (discount - TERMINAL_GROWTH)
            / (1.0 + discount).powi(PROJECTION_YEARS);
        let fair_value = explicit + terminal;

        let margin = margin_of_safety_pct(fair_value, price);
        // Cash generation relative to the cost of capital.
        let quality = round2((fcf_yield / discount * 100.0).clamp(0.0, 100.0));

        FundamentalSummary {
            model_id: Self::ID.to_string(),
            model_label: self.label().to_string(),
            fair_value: to_price(fair_value),
            margin_of_safety_pct: margin,
            quality_score: quality,
            verdict: verdict(margin).to_string(),
            notes: vec![
                format!("FCF yield {:.2}%", fcf_yield * 100.0),
                format!("Growth {:.2}% for {PROJECTION_YEARS}y", growth * 100.0),
                format!("Discount rate {:.2}%", discount * 100.0),
            ],
        }
    }
}

// =============================================================================
// Quality factors
// =============================================================================

/// Quality-factor model: return on equity, margins and leverage drive a
/// score that scales the price into a fair value.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityFactorsModel;

impl QualityFactorsModel {
    /// Model id.
    pub const ID: &'static str = "quality-factors";
}

impl FundamentalModel for QualityFactorsModel {
    fn id(&self) -> &str {
        Self::ID
    }

    fn label(&self) -> &str {
        "Quality Factors"
    }

    fn evaluate(&self, symbol: &Symbol, price: Decimal) -> FundamentalSummary {
        let price = to_f64(price).max(0.0);
        let roe = seeded_unit(symbol, 11).mul_add(0.25, 0.05);
        let net_margin = seeded_unit(symbol, 12).mul_add(0.30, 0.05);
        let debt_to_equity = seeded_unit(symbol, 13).mul_add(1.5, 0.1);

        let quality = round2(
            debt_to_equity
                .mul_add(-15.0, roe.mul_add(200.0, net_margin * 100.0))
                .clamp(0.0, 100.0),
        );
        let fair_value = price * (quality / 100.0).mul_add(0.6, 0.7);
        let margin = margin_of_safety_pct(fair_value, price);

        FundamentalSummary {
            model_id: Self::ID.to_string(),
            model_label: self.label().to_string(),
            fair_value: to_price(fair_value),
            margin_of_safety_pct: margin,
            quality_score: quality,
            verdict: verdict(margin).to_string(),
            notes: vec![
                format!("ROE {:.1}%", roe * 100.0),
                format!("Net margin {:.1}%", net_margin * 100.0),
                format!("Debt/equity {debt_to_equity:.2}"),
            ],
        }
    }
}
