//! Keyword sentiment engine.

use std::collections::BTreeSet;

use super::{SentimentEngine, round2};
use crate::domain::report::{NewsSignal, SentimentDigest};
use crate::domain::symbol::Symbol;

const MAX_HEADLINES: usize = 5;
const LABEL_THRESHOLD: f64 = 0.15;

const POSITIVE: &[&str] = &[
    "beat", "beats", "bullish", "buy", "gain", "gains", "growth", "jump", "jumps", "outperform",
    "rally", "record", "rise", "rises", "strong", "surge", "surges", "upgrade", "upgraded",
];

const NEGATIVE: &[&str] = &[
    "bearish", "cut", "cuts", "decline", "downgrade", "downgraded", "drop", "drops", "fall",
    "falls", "lawsuit", "loss", "miss", "misses", "plunge", "probe", "sell", "slump", "weak",
];

/// Scores each signal by counting positive and negative keywords and
/// averages the scores weighted by signal confidence.
#[derive(Debug, Clone)]
pub struct KeywordSentimentEngine {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for KeywordSentimentEngine {
    fn default() -> Self {
        Self::new(POSITIVE.iter().copied(), NEGATIVE.iter().copied())
    }
}

impl KeywordSentimentEngine {
    /// Create an engine with custom keyword lists (matched case-insensitively).
    pub fn new<'a>(
        positive: impl IntoIterator<Item = &'a str>,
        negative: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            positive: positive.into_iter().map(str::to_lowercase).collect(),
            negative: negative.into_iter().map(str::to_lowercase).collect(),
        }
    }

    /// Score a single text in `[-1, 1]`.
    #[must_use]
    pub fn score_text(&self, text: &str) -> f64 {
        let mut positive = 0_u32;
        let mut negative = 0_u32;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            if self.positive.contains(&word) {
                positive += 1;
            } else if self.negative.contains(&word) {
                negative += 1;
            }
        }

        let total = positive + negative;
        if total == 0 {
            return 0.0;
        }
        (f64::from(positive) - f64::from(negative)) / f64::from(total)
    }
}

fn label(score: f64) -> &'static str {
    if score >= LABEL_THRESHOLD {
        "bullish"
    } else if score <= -LABEL_THRESHOLD {
        "bearish"
    } else {
        "neutral"
    }
}

impl SentimentEngine for KeywordSentimentEngine {
    fn digest(&self, _symbol: &Symbol, signals: &[NewsSignal]) -> SentimentDigest {
        let (weighted, weight) = signals.iter().fold((0.0, 0.0), |(sum, weight), signal| {
            (
                self.score_text(&signal.text).mul_add(signal.confidence, sum),
                weight + signal.confidence,
            )
        });
        let score = if weight > 0.0 {
            round2(weighted / weight)
        } else {
            0.0
        };

        let sources: BTreeSet<&str> = signals.iter().map(|s| s.source.as_str()).collect();

        SentimentDigest {
            score,
            label: label(score).to_string(),
            signal_count: signals.len(),
            headlines: signals
                .iter()
                .take(MAX_HEADLINES)
                .map(|s| s.text.clone())
                .collect(),
            sources: sources.into_iter().map(str::to_string).collect(),
        }
    }
}
