//! Rolling-window primitives. Every function returns a column aligned to
//! the input: index `i` of the output describes index `i` of the input,
//! with `None` until the window has enough samples.

/// Simple moving average over a full window.
pub fn rolling_mean(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }

    let mut sum: f64 = data[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..data.len() {
        sum += data[i] - data[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// Rolling sample standard deviation (n − 1 denominator).
pub fn rolling_std(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period < 2 || data.len() < period {
        return out;
    }

    for i in period - 1..data.len() {
        let window = &data[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let var =
            window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period as f64 - 1.0);
        out[i] = Some(var.sqrt());
    }
    out
}

/// Rolling maximum over a full window.
pub fn rolling_max(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }
    for i in period - 1..data.len() {
        let max = data[i + 1 - period..=i]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        out[i] = Some(max);
    }
    out
}

/// Rolling minimum over a full window.
pub fn rolling_min(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }
    for i in period - 1..data.len() {
        let min = data[i + 1 - period..=i]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        out[i] = Some(min);
    }
    out
}

/// Exponentially weighted mean with `α = 2/(span + 1)` and the standard
/// bias correction, so early values average the available history instead
/// of over-weighting the seed. Defined from the first sample.
pub fn ewm_mean(data: &[f64], span: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len());
    if data.is_empty() || span == 0 {
        return out;
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;
    let mut num = 0.0;
    let mut den = 0.0;
    for &x in data {
        num = x + decay * num;
        den = 1.0 + decay * den;
        out.push(num / den);
    }
    out
}

/// RSI over close diffs using window averages of gains and losses:
/// `100 − 100/(1 + gain/loss)`. A window with zero losses and positive
/// gains saturates at 100; a fully flat window has no defined value.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let mut gains = vec![0.0; closes.len()];
    let mut losses = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    for i in period..closes.len() {
        let window = i + 1 - period..=i;
        let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window].iter().sum::<f64>() / period as f64;

        out[i] = if avg_loss > 0.0 {
            let rs = avg_gain / avg_loss;
            Some(100.0 - 100.0 / (1.0 + rs))
        } else if avg_gain > 0.0 {
            Some(100.0)
        } else {
            None
        };
    }
    out
}

/// On-balance volume: running sum of `sign(Δclose) · volume`. The first
/// bar has no delta and contributes zero.
pub fn obv(closes: &[f64], volumes: &[i64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }

    let mut running = 0.0;
    out.push(running);
    for i in 1..closes.len() {
        if closes[i] > closes[i - 1] {
            running += volumes[i] as f64;
        } else if closes[i] < closes[i - 1] {
            running -= volumes[i] as f64;
        }
        out.push(running);
    }
    out
}

/// Shift a column forward by `k`: the output at `i` is the input at `i − k`.
pub fn shift_forward(col: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; col.len()];
    for i in k..col.len() {
        out[i] = col[i - k];
    }
    out
}
