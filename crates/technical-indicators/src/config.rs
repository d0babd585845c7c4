use serde::{Deserialize, Serialize};

/// Parameters for every computed indicator. Persisted as the
/// `config_data` payload of an `indicator` configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    // Moving averages
    pub ma_short: usize,
    pub ma_medium: usize,
    pub ma_long: usize,

    // RSI
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,

    // MACD
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,

    // Bollinger Bands
    pub bb_period: usize,
    pub bb_std: f64,

    // Volume
    pub volume_avg_period: usize,
    pub volume_spike_multiplier: f64,

    // Ichimoku
    pub ichimoku_tenkan: usize,
    pub ichimoku_kijun: usize,
    pub ichimoku_senkou_b: usize,

    // OBV
    pub obv_divergence_lookback: usize,

    // Squeeze
    pub squeeze_lookback: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_short: 9,
            ma_medium: 20,
            ma_long: 50,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std: 2.0,
            volume_avg_period: 20,
            volume_spike_multiplier: 1.8,
            ichimoku_tenkan: 9,
            ichimoku_kijun: 26,
            ichimoku_senkou_b: 52,
            obv_divergence_lookback: 30,
            squeeze_lookback: 120,
        }
    }
}

impl IndicatorConfig {
    /// Fewest bars a frame needs before any computation is attempted.
    pub fn min_data_points(&self) -> usize {
        self.ichimoku_senkou_b.max(self.ma_long).max(self.bb_period)
    }
}
