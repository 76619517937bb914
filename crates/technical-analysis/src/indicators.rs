/// Return val if it is finite, otherwise return default.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

/// Simple Moving Average, aligned to the input: the first `period - 1`
/// slots are None.
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let mut window_sum: f64 = data[..period].iter().sum();
    result[period - 1] = Some(finite_or(window_sum / period as f64, 0.0));
    for i in period..data.len() {
        window_sum += data[i] - data[i - period];
        result[i] = Some(finite_or(window_sum / period as f64, 0.0));
    }
    result
}

/// Exponential Moving Average. Seeded with the SMA of the first `period`
/// elements and padded so the output length matches the input length
/// (MACD relies on this).
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.is_empty() {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Not enough data for a full SMA seed -- fall back to a running EMA
    // seeded with the first value.
    if data.len() < period {
        let mut result = Vec::with_capacity(data.len());
        result.push(data[0]);
        for i in 1..data.len() {
            let prev = result[i - 1];
            result.push(finite_or((data[i] - prev) * multiplier + prev, prev));
        }
        return result;
    }

    let mut result = Vec::with_capacity(data.len());
    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;
    let seed = finite_or(seed, 0.0);
    for _ in 0..period {
        result.push(seed);
    }
    for i in period..data.len() {
        let prev = result[i - 1];
        result.push(finite_or((data[i] - prev) * multiplier + prev, prev));
    }
    result
}

/// Relative Strength Index over a plain rolling mean of gains and losses,
/// aligned to the input: the first `period` slots are None.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    for i in period..=gains.len() {
        let window = &gains[i - period..i];
        let avg_gain: f64 = window.iter().sum::<f64>() / period as f64;
        let window = &losses[i - period..i];
        let avg_loss: f64 = window.iter().sum::<f64>() / period as f64;

        let value = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        };
        // gains[i-1] pairs with data[i], so the value lands on index i
        result[i] = Some(finite_or(value, 50.0));
    }
    result
}

/// MACD (12/26 EMA difference) with its signal line (9-period EMA of the
/// MACD line), both aligned to the input length.
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
}

pub fn macd(data: &[f64], fast: usize, slow: usize, signal: usize) -> MacdResult {
    if fast == 0 || slow == 0 || signal == 0 || data.is_empty() {
        return MacdResult {
            macd_line: vec![],
            signal_line: vec![],
        };
    }

    let ema_fast = ema(data, fast);
    let ema_slow = ema(data, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&macd_line, signal);

    MacdResult {
        macd_line,
        signal_line,
    }
}
