use market_core::{
    Bar, IchimokuSnapshot, IndicatorSnapshot, MomentumSnapshot, MovingAverageSnapshot,
    PriceSnapshot, VolatilitySnapshot, VolumeSnapshot,
};

use crate::config::IndicatorConfig;
use crate::indicators::{
    ewm_mean, obv, rolling_max, rolling_mean, rolling_min, rolling_std, rsi, shift_forward,
};

/// OHLCV bars plus every derived indicator column, all aligned by index.
/// Columns hold `None` until their window has filled.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    bars: Vec<Bar>,

    pub ma_short: Vec<Option<f64>>,
    pub ma_medium: Vec<Option<f64>>,
    pub ma_long: Vec<Option<f64>>,

    pub rsi: Vec<Option<f64>>,

    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_hist: Vec<Option<f64>>,

    pub bb_upper: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub bb_width: Vec<Option<f64>>,

    pub volume_avg: Vec<Option<f64>>,
    pub volume_spike: Vec<Option<f64>>,

    pub tenkan: Vec<Option<f64>>,
    pub kijun: Vec<Option<f64>>,
    pub senkou_a: Vec<Option<f64>>,
    pub senkou_b: Vec<Option<f64>>,

    pub obv: Vec<Option<f64>>,
    pub obv_ma: Vec<Option<f64>>,
}

impl IndicatorFrame {
    /// Compute every column for the given ascending bars.
    pub fn compute(bars: &[Bar], config: &IndicatorConfig) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let volumes_i: Vec<i64> = bars.iter().map(|b| b.volume).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

        let ma_short = rolling_mean(&closes, config.ma_short);
        let ma_medium = rolling_mean(&closes, config.ma_medium);
        let ma_long = rolling_mean(&closes, config.ma_long);

        let rsi_col = rsi(&closes, config.rsi_period);

        // MACD: span EMAs are defined from the first sample.
        let ema_fast = ewm_mean(&closes, config.macd_fast);
        let ema_slow = ewm_mean(&closes, config.macd_slow);
        let macd_raw: Vec<f64> = ema_fast
            .iter()
            .zip(&ema_slow)
            .map(|(f, s)| f - s)
            .collect();
        let signal_raw = ewm_mean(&macd_raw, config.macd_signal);
        let macd: Vec<Option<f64>> = macd_raw.iter().copied().map(Some).collect();
        let macd_signal: Vec<Option<f64>> = signal_raw.iter().copied().map(Some).collect();
        let macd_hist: Vec<Option<f64>> = macd_raw
            .iter()
            .zip(&signal_raw)
            .map(|(m, s)| Some(m - s))
            .collect();

        // Bollinger Bands around the medium SMA window.
        let bb_mid = rolling_mean(&closes, config.bb_period);
        let bb_std = rolling_std(&closes, config.bb_period);
        let mut bb_upper = vec![None; closes.len()];
        let mut bb_lower = vec![None; closes.len()];
        let mut bb_width = vec![None; closes.len()];
        for i in 0..closes.len() {
            if let (Some(mid), Some(sd)) = (bb_mid[i], bb_std[i]) {
                let upper = mid + config.bb_std * sd;
                let lower = mid - config.bb_std * sd;
                bb_upper[i] = Some(upper);
                bb_lower[i] = Some(lower);
                if mid != 0.0 {
                    bb_width[i] = Some((upper - lower) / mid);
                }
            }
        }

        let volume_avg = rolling_mean(&volumes, config.volume_avg_period);
        let volume_spike: Vec<Option<f64>> = volume_avg
            .iter()
            .enumerate()
            .map(|(i, avg)| match avg {
                Some(a) if *a > 0.0 => Some(volumes[i] / a),
                _ => None,
            })
            .collect();

        let tenkan = midpoint(&highs, &lows, config.ichimoku_tenkan);
        let kijun = midpoint(&highs, &lows, config.ichimoku_kijun);
        let span_a_src: Vec<Option<f64>> = tenkan
            .iter()
            .zip(&kijun)
            .map(|(t, k)| match (t, k) {
                (Some(t), Some(k)) => Some((t + k) / 2.0),
                _ => None,
            })
            .collect();
        let senkou_a = shift_forward(&span_a_src, config.ichimoku_kijun);
        let span_b_src = midpoint(&highs, &lows, config.ichimoku_senkou_b);
        let senkou_b = shift_forward(&span_b_src, config.ichimoku_kijun);

        let obv_raw = obv(&closes, &volumes_i);
        let obv_ma = rolling_mean(&obv_raw, config.ma_medium);
        let obv_col: Vec<Option<f64>> = obv_raw.iter().copied().map(Some).collect();

        Self {
            bars: bars.to_vec(),
            ma_short,
            ma_medium,
            ma_long,
            rsi: rsi_col,
            macd,
            macd_signal,
            macd_hist,
            bb_upper,
            bb_lower,
            bb_width,
            volume_avg,
            volume_spike,
            tenkan,
            kijun,
            senkou_a,
            senkou_b,
            obv: obv_col,
            obv_ma,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn bar(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Typed snapshot of every indicator at `index`.
    pub fn snapshot(&self, index: usize) -> IndicatorSnapshot {
        let Some(bar) = self.bars.get(index) else {
            return IndicatorSnapshot::default();
        };

        IndicatorSnapshot {
            price: PriceSnapshot {
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            },
            moving_averages: MovingAverageSnapshot {
                ma_short: self.ma_short[index],
                ma_medium: self.ma_medium[index],
                ma_long: self.ma_long[index],
            },
            momentum: MomentumSnapshot {
                rsi: self.rsi[index],
                macd: self.macd[index],
                macd_signal: self.macd_signal[index],
                macd_hist: self.macd_hist[index],
            },
            volatility: VolatilitySnapshot {
                bb_upper: self.bb_upper[index],
                bb_lower: self.bb_lower[index],
                bb_width: self.bb_width[index],
            },
            volume: VolumeSnapshot {
                volume_avg: self.volume_avg[index],
                volume_spike: self.volume_spike[index],
                obv: self.obv[index],
                obv_ma: self.obv_ma[index],
            },
            ichimoku: IchimokuSnapshot {
                tenkan: self.tenkan[index],
                kijun: self.kijun[index],
                senkou_a: self.senkou_a[index],
                senkou_b: self.senkou_b[index],
            },
        }
    }
}

/// High/low midpoint over a full window.
fn midpoint(highs: &[f64], lows: &[f64], period: usize) -> Vec<Option<f64>> {
    let max = rolling_max(highs, period);
    let min = rolling_min(lows, period);
    max.into_iter()
        .zip(min)
        .map(|(h, l)| match (h, l) {
            (Some(h), Some(l)) => Some((h + l) / 2.0),
            _ => None,
        })
        .collect()
}
