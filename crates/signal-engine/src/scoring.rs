use serde::{Deserialize, Serialize};
use technical_indicators::IndicatorFrame;

use market_core::{ScoreRegime, SignalAction, SignalStrength, TriggeredRule};

use crate::rules::{default_rules, Rule};

/// Multiplicative factors applied to the raw score by market regime.
/// Negative scores are the buy side, positive scores the sell side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeMultipliers {
    pub uptrend_buy: f64,
    pub uptrend_sell: f64,
    pub downtrend_buy: f64,
    pub downtrend_sell: f64,
    pub sideways: f64,
}

impl Default for RegimeMultipliers {
    fn default() -> Self {
        Self {
            uptrend_buy: 1.5,
            uptrend_sell: 0.5,
            downtrend_buy: 0.5,
            downtrend_sell: 1.5,
            sideways: 0.7,
        }
    }
}

impl RegimeMultipliers {
    /// Factor for a raw score in the given regime.
    pub fn factor(&self, regime: ScoreRegime, score: f64) -> f64 {
        match regime {
            ScoreRegime::Uptrend => {
                if score < 0.0 {
                    self.uptrend_buy
                } else if score > 0.0 {
                    self.uptrend_sell
                } else {
                    1.0
                }
            }
            ScoreRegime::Downtrend => {
                if score < 0.0 {
                    self.downtrend_buy
                } else if score > 0.0 {
                    self.downtrend_sell
                } else {
                    1.0
                }
            }
            ScoreRegime::Sideways => self.sideways,
            ScoreRegime::Neutral => 1.0,
        }
    }
}

/// Configuration of the scoring engine: thresholds, regime multipliers
/// and the rule list. Persisted as the `config_data` payload of a
/// `scoring` configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub buy_strong_threshold: f64,
    pub buy_medium_threshold: f64,
    pub sell_medium_threshold: f64,
    pub sell_strong_threshold: f64,
    pub context_multipliers: RegimeMultipliers,
    pub rules: Vec<Rule>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            buy_strong_threshold: -75.0,
            buy_medium_threshold: -25.0,
            sell_medium_threshold: 25.0,
            sell_strong_threshold: 75.0,
            context_multipliers: RegimeMultipliers::default(),
            rules: default_rules(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        for rule in &self.rules {
            rule.condition
                .validate()
                .map_err(|e| format!("rule {}: {e}", rule.name))?;
        }
        Ok(())
    }
}

/// Action, strength and adjusted score for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedSignal {
    pub action: SignalAction,
    pub strength: SignalStrength,
    pub adjusted_score: f64,
    pub description: String,
}

/// Evaluates the configured rules over a bar and maps scores to signals.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score bar `index`: the sum of weights of enabled rules whose
    /// condition holds, plus a row per fired rule.
    pub fn calculate(&self, frame: &IndicatorFrame, index: usize) -> (f64, Vec<TriggeredRule>) {
        let mut total = 0.0;
        let mut fired = Vec::new();

        if index >= frame.len() {
            return (total, fired);
        }

        for rule in &self.config.rules {
            if !rule.enabled {
                continue;
            }
            if rule.condition.eval(frame, index) {
                total += rule.weight;
                fired.push(TriggeredRule {
                    name: rule.name.clone(),
                    description: rule.description.clone(),
                    weight: rule.weight,
                });
            }
        }

        (total, fired)
    }

    /// Apply the regime multiplier and map the adjusted score onto an
    /// action and strength band.
    pub fn map_signal(&self, score: f64, regime: ScoreRegime) -> MappedSignal {
        let cfg = &self.config;
        let adjusted = score * cfg.context_multipliers.factor(regime, score);

        let (action, strength, label) = if adjusted <= cfg.buy_strong_threshold {
            (SignalAction::Buy, SignalStrength::VeryStrong, "Strong buy")
        } else if adjusted <= cfg.buy_medium_threshold {
            (SignalAction::Buy, SignalStrength::Medium, "Moderate buy")
        } else if adjusted >= cfg.sell_strong_threshold {
            (SignalAction::Sell, SignalStrength::VeryStrong, "Strong sell")
        } else if adjusted >= cfg.sell_medium_threshold {
            (SignalAction::Sell, SignalStrength::Medium, "Moderate sell")
        } else {
            (SignalAction::Hold, SignalStrength::Weak, "Watch")
        };

        MappedSignal {
            action,
            strength,
            adjusted_score: adjusted,
            description: format!("{label} (score: {adjusted:.2})"),
        }
    }
}
