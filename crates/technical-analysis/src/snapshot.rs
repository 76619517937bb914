use analysis_core::Candle;
use chrono::{DateTime, Utc};

use crate::indicators::{macd, rsi, sma};

/// One fully-computed indicator row for the analyst's data table.
#[derive(Debug, Clone)]
pub struct IndicatorRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
}

/// Compute SMA-20, SMA-50, RSI-14 and MACD(12,26,9) over the closing
/// prices and return the last `n` rows for which every indicator is
/// available. Rows with an incomplete indicator window are dropped.
pub fn indicator_snapshot(candles: &[Candle], n: usize) -> Vec<IndicatorRow> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let sma_20 = sma(&closes, 20);
    let sma_50 = sma(&closes, 50);
    let rsi_14 = rsi(&closes, 14);
    let macd_result = macd(&closes, 12, 26, 9);

    let mut rows = Vec::new();
    for (i, candle) in candles.iter().enumerate() {
        let (Some(s20), Some(s50), Some(r)) = (sma_20[i], sma_50[i], rsi_14[i]) else {
            continue;
        };
        let macd_val = macd_result.macd_line[i];
        let signal_val = macd_result.signal_line[i];
        if !macd_val.is_finite() || !signal_val.is_finite() {
            continue;
        }
        rows.push(IndicatorRow {
            timestamp: candle.timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            sma_20: s20,
            sma_50: s50,
            rsi: r,
            macd: macd_val,
            macd_signal: signal_val,
        });
    }

    let skip = rows.len().saturating_sub(n);
    rows.split_off(skip)
}

/// Latest computable RSI and MACD values for a closing series, used by the
/// realtime market-data snapshot.
pub fn latest_indicators(closes: &[f64]) -> (Option<f64>, Option<f64>) {
    let last_rsi = rsi(closes, 14).into_iter().flatten().last();
    let last_macd = macd(closes, 12, 26, 9).macd_line.last().copied();
    (last_rsi, last_macd)
}
