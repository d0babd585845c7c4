pub mod config;
pub mod frame;
pub mod indicators;


pub use config::IndicatorConfig;
pub use frame::IndicatorFrame;

use market_core::{Bar, MarketError};

/// Pure indicator computation over an ascending OHLCV frame.
///
/// Deterministic and referentially transparent: identical bars and config
/// always produce identical columns.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Compute every configured indicator column.
    ///
    /// Fails when the frame is shorter than the longest configured window
    /// (senkou B, long MA or Bollinger period, whichever is largest).
    pub fn compute(&self, bars: &[Bar]) -> Result<IndicatorFrame, MarketError> {
        let min = self.config.min_data_points();
        if bars.len() < min {
            return Err(MarketError::InsufficientData(format!(
                "need at least {min} bars, got {}",
                bars.len()
            )));
        }
        Ok(IndicatorFrame::compute(bars, &self.config))
    }
}
