use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use market_core::{Bar, MarketError, SignalMetadata, TradingSignal};
pub use market_core::SignalSummary;
use technical_indicators::{IndicatorEngine, IndicatorFrame};

use crate::context::{derive_context, ichimoku_regime};
use crate::scoring::ScoringEngine;

/// Run-level analysis parameters. Persisted as the `config_data` payload
/// of an `analysis` configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_score_threshold: f64,
    pub lookback_days: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_score_threshold: 10.0,
            lookback_days: 60,
            start_date: None,
            end_date: None,
        }
    }
}

/// Combines indicator computation, scoring and context derivation into
/// materialized trading signals.
#[derive(Debug, Clone, Default)]
pub struct SignalEngine {
    indicator_engine: IndicatorEngine,
    scoring_engine: ScoringEngine,
}

impl SignalEngine {
    pub fn new(indicator_engine: IndicatorEngine, scoring_engine: ScoringEngine) -> Self {
        Self {
            indicator_engine,
            scoring_engine,
        }
    }

    pub fn indicator_engine(&self) -> &IndicatorEngine {
        &self.indicator_engine
    }

    pub fn scoring_engine(&self) -> &ScoringEngine {
        &self.scoring_engine
    }

    /// Compute indicators and scan every bar for signals.
    pub fn generate_signals(
        &self,
        bars: &[Bar],
        min_score_threshold: f64,
    ) -> Result<Vec<TradingSignal>, MarketError> {
        let frame = self.indicator_engine.compute(bars)?;
        Ok(self.scan_frame(&frame, 0, min_score_threshold))
    }

    /// Scan a precomputed frame from `start_index` onward. Bars whose
    /// absolute raw score stays under the threshold are skipped.
    pub fn scan_frame(
        &self,
        frame: &IndicatorFrame,
        start_index: usize,
        min_score_threshold: f64,
    ) -> Vec<TradingSignal> {
        let mut signals = Vec::new();
        let indicator_config = self.indicator_engine.config();

        for index in start_index..frame.len() {
            let (score, triggered_rules) = self.scoring_engine.calculate(frame, index);
            if score.abs() < min_score_threshold {
                continue;
            }

            let regime = ichimoku_regime(frame, index, indicator_config);
            let mapped = self.scoring_engine.map_signal(score, regime);
            let context = derive_context(frame, index);
            let bar = match frame.bar(index) {
                Some(bar) => bar,
                None => continue,
            };

            signals.push(TradingSignal {
                symbol: bar.symbol.clone(),
                time: bar.time,
                action: mapped.action,
                strength: mapped.strength,
                score: mapped.adjusted_score,
                description: mapped.description,
                indicators: frame.snapshot(index),
                triggered_rules,
                context,
                metadata: SignalMetadata {
                    bar_index: index,
                    total_data_points: frame.len(),
                    min_score_threshold,
                },
            });
        }

        tracing::debug!(
            signals = signals.len(),
            from = start_index,
            bars = frame.len(),
            "signal scan complete"
        );
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CmpOp, Condition, Operand, Rule, RuleVar};
    use crate::scoring::ScoringConfig;
    use chrono::{Duration, TimeZone, Utc};
    use market_core::{DataSource, SignalAction, SignalStrength};
    use technical_indicators::IndicatorConfig;

    fn uptrend_bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + 0.5 * i as f64;
                Bar {
                    symbol: "ACB".into(),
                    time: start + Duration::days(i as i64),
                    open: close - 0.1,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 1_000,
                    source: DataSource::Ssi,
                }
            })
            .collect()
    }

    fn engine_with_rules(rules: Vec<Rule>) -> SignalEngine {
        SignalEngine::new(
            IndicatorEngine::new(IndicatorConfig::default()),
            ScoringEngine::new(ScoringConfig {
                rules,
                ..ScoringConfig::default()
            }),
        )
    }

    #[test]
    fn below_threshold_emits_nothing() {
        let engine = engine_with_rules(vec![Rule::new(
            "tiny",
            5.0,
            Condition::compare(
                Operand::var(RuleVar::Close),
                CmpOp::Gt,
                Operand::constant(0.0),
            ),
            "Always on, small weight",
        )]);

        let signals = engine.generate_signals(&uptrend_bars(60), 10.0).unwrap();
        assert!(signals.is_empty());
    }

    #[test]
    fn emitted_signal_carries_snapshot_and_rules() {
        let engine = engine_with_rules(vec![Rule::new(
            "close_above_long_ma",
            30.0,
            Condition::compare(
                Operand::var(RuleVar::Close),
                CmpOp::Gt,
                Operand::var(RuleVar::MaLong),
            ),
            "Close above the long MA",
        )]);

        let bars = uptrend_bars(60);
        let signals = engine.generate_signals(&bars, 10.0).unwrap();
        assert!(!signals.is_empty());

        let last = signals.last().unwrap();
        assert_eq!(last.symbol, "ACB");
        assert_eq!(last.action, SignalAction::Sell);
        assert_eq!(last.strength, SignalStrength::Medium);
        assert_eq!(last.triggered_rules.len(), 1);
        assert_eq!(last.triggered_rules[0].name, "close_above_long_ma");
        assert!(last.indicators.moving_averages.ma_long.is_some());
        assert_eq!(last.metadata.total_data_points, bars.len());
    }

    #[test]
    fn scan_frame_respects_start_index() {
        let engine = engine_with_rules(vec![Rule::new(
            "always",
            30.0,
            Condition::compare(
                Operand::var(RuleVar::Close),
                CmpOp::Gt,
                Operand::constant(0.0),
            ),
            "Always fires",
        )]);

        let bars = uptrend_bars(60);
        let frame = engine.indicator_engine().compute(&bars).unwrap();
        let signals = engine.scan_frame(&frame, 55, 10.0);
        assert_eq!(signals.len(), 5);
        assert!(signals.iter().all(|s| s.metadata.bar_index >= 55));
    }

    #[test]
    fn summary_counts_by_action_and_strength() {
        let engine = engine_with_rules(vec![Rule::new(
            "close_above_long_ma",
            30.0,
            Condition::compare(
                Operand::var(RuleVar::Close),
                CmpOp::Gt,
                Operand::var(RuleVar::MaLong),
            ),
            "Close above the long MA",
        )]);

        let signals = engine.generate_signals(&uptrend_bars(60), 10.0).unwrap();
        let summary = SignalSummary::from_signals(&signals);

        assert_eq!(summary.total_signals, signals.len() as i64);
        assert_eq!(summary.sell_signals, signals.len() as i64);
        assert_eq!(summary.buy_signals, 0);
        assert!(summary.avg_score > 0.0);
        assert!(summary.max_score >= summary.min_score);
    }
}
