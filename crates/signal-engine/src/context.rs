//! Market context derivation: bucketed regime tags attached to every
//! emitted signal, plus the Ichimoku regime that feeds the scoring
//! multiplier.

use market_core::{
    IchimokuRegime, PricePosition, RsiZone, ScoreRegime, SignalContext, Trend, VolatilityBucket,
    VolumeBucket,
};
use technical_indicators::{IndicatorConfig, IndicatorFrame};

/// Derive the per-bar context tags. Tags whose indicators have not warmed
/// up stay `None`.
pub fn derive_context(frame: &IndicatorFrame, index: usize) -> SignalContext {
    let mut ctx = SignalContext::default();
    let Some(bar) = frame.bar(index) else {
        return ctx;
    };
    let close = bar.close;

    if let (Some(short), Some(long)) = (frame.ma_short[index], frame.ma_long[index]) {
        ctx.trend = Some(if short > long {
            Trend::Uptrend
        } else if short < long {
            Trend::Downtrend
        } else {
            Trend::Sideways
        });
    }

    if let Some(width) = frame.bb_width[index] {
        ctx.volatility = Some(if width > 0.10 {
            VolatilityBucket::High
        } else if width < 0.05 {
            VolatilityBucket::Low
        } else {
            VolatilityBucket::Medium
        });
    }

    if let Some(spike) = frame.volume_spike[index] {
        ctx.volume = Some(if spike > 2.0 {
            VolumeBucket::VeryHigh
        } else if spike > 1.5 {
            VolumeBucket::High
        } else if spike < 0.5 {
            VolumeBucket::Low
        } else {
            VolumeBucket::Normal
        });
    }

    if let Some(rsi) = frame.rsi[index] {
        ctx.rsi_zone = Some(if rsi > 70.0 {
            RsiZone::Overbought
        } else if rsi < 30.0 {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        });
    }

    if let (Some(tenkan), Some(kijun), Some(senkou_a), Some(senkou_b)) = (
        frame.tenkan[index],
        frame.kijun[index],
        frame.senkou_a[index],
        frame.senkou_b[index],
    ) {
        ctx.ichimoku = Some(if tenkan > kijun && close > senkou_a.max(senkou_b) {
            IchimokuRegime::Bullish
        } else if tenkan < kijun && close < senkou_a.min(senkou_b) {
            IchimokuRegime::Bearish
        } else {
            IchimokuRegime::Neutral
        });
    }

    if let (Some(short), Some(medium), Some(long)) = (
        frame.ma_short[index],
        frame.ma_medium[index],
        frame.ma_long[index],
    ) {
        ctx.price_position = Some(if close > short && short > medium && medium > long {
            PricePosition::StrongAboveAll
        } else if close > short && close > long {
            PricePosition::AboveKeyMas
        } else if close < short && short < medium && medium < long {
            PricePosition::StrongBelowAll
        } else if close < short && close < long {
            PricePosition::BelowKeyMas
        } else {
            PricePosition::Mixed
        });
    }

    ctx
}

/// Ichimoku regime with the lagging confirmation (`close[i − kijun]`).
///
/// Strong uptrend needs price above the cloud, a green cloud, tenkan over
/// kijun and the lagging close confirmation; the strong downtrend is the
/// exact mirror. Price inside the cloud reads as sideways; anything else
/// is neutral.
pub fn ichimoku_regime(
    frame: &IndicatorFrame,
    index: usize,
    config: &IndicatorConfig,
) -> ScoreRegime {
    if index < config.ichimoku_senkou_b {
        return ScoreRegime::Neutral;
    }
    let (Some(bar), Some(tenkan), Some(kijun), Some(senkou_a), Some(senkou_b)) = (
        frame.bar(index),
        frame.tenkan[index],
        frame.kijun[index],
        frame.senkou_a[index],
        frame.senkou_b[index],
    ) else {
        return ScoreRegime::Neutral;
    };
    let close = bar.close;

    let Some(lagged_close) = index
        .checked_sub(config.ichimoku_kijun)
        .and_then(|i| frame.bar(i))
        .map(|b| b.close)
    else {
        return ScoreRegime::Neutral;
    };

    let above_cloud = close > senkou_a && close > senkou_b;
    let below_cloud = close < senkou_a && close < senkou_b;
    let cloud_green = senkou_a > senkou_b;
    let tenkan_above = tenkan > kijun;
    let chikou_ok = close > lagged_close;

    if above_cloud && cloud_green && tenkan_above && chikou_ok {
        ScoreRegime::Uptrend
    } else if below_cloud && !cloud_green && !tenkan_above && !chikou_ok {
        ScoreRegime::Downtrend
    } else if (close > senkou_a && close < senkou_b) || (close < senkou_a && close > senkou_b) {
        ScoreRegime::Sideways
    } else {
        ScoreRegime::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use market_core::{Bar, DataSource};

    fn frame_from_closes(closes: &[f64], volumes: &[i64]) -> IndicatorFrame {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "ACB".into(),
                time: start + Duration::days(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: volumes.get(i).copied().unwrap_or(1_000),
                source: DataSource::Ssi,
            })
            .collect();
        IndicatorFrame::compute(&bars, &IndicatorConfig::default())
    }

    #[test]
    fn uptrend_context_reads_bullish() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + 0.5 * i as f64).collect();
        let frame = frame_from_closes(&closes, &[]);
        let last = frame.len() - 1;

        let ctx = derive_context(&frame, last);
        assert_eq!(ctx.trend, Some(Trend::Uptrend));
        assert_eq!(ctx.rsi_zone, Some(RsiZone::Overbought));
        assert_eq!(ctx.price_position, Some(PricePosition::StrongAboveAll));
        assert_eq!(ctx.ichimoku, Some(IchimokuRegime::Bullish));
    }

    #[test]
    fn short_history_leaves_tags_unset() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + 0.5 * i as f64).collect();
        let frame = frame_from_closes(&closes, &[]);
        let ctx = derive_context(&frame, 29);
        assert!(ctx.price_position.is_none());
        assert!(ctx.ichimoku.is_none());
        // Short windows that did fill still produce tags.
        assert!(ctx.rsi_zone.is_some());
    }

    #[test]
    fn volume_buckets_follow_spike_ratio() {
        let closes = vec![10.0; 40];
        let mut volumes = vec![1_000i64; 40];
        volumes[39] = 5_000;
        let frame = frame_from_closes(&closes, &volumes);
        let ctx = derive_context(&frame, 39);
        assert_eq!(ctx.volume, Some(VolumeBucket::VeryHigh));
    }

    #[test]
    fn ichimoku_regime_confirms_steady_uptrend() {
        let closes: Vec<f64> = (0..150).map(|i| 100.0 + 0.5 * i as f64).collect();
        let frame = frame_from_closes(&closes, &[]);
        let config = IndicatorConfig::default();
        assert_eq!(
            ichimoku_regime(&frame, frame.len() - 1, &config),
            ScoreRegime::Uptrend
        );
    }

    #[test]
    fn ichimoku_regime_confirms_steady_downtrend() {
        let closes: Vec<f64> = (0..150).map(|i| 200.0 - 0.5 * i as f64).collect();
        let frame = frame_from_closes(&closes, &[]);
        let config = IndicatorConfig::default();
        assert_eq!(
            ichimoku_regime(&frame, frame.len() - 1, &config),
            ScoreRegime::Downtrend
        );
    }

    #[test]
    fn ichimoku_regime_neutral_without_warmup() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 0.5 * i as f64).collect();
        let frame = frame_from_closes(&closes, &[]);
        let config = IndicatorConfig::default();
        assert_eq!(ichimoku_regime(&frame, 30, &config), ScoreRegime::Neutral);
    }
}
