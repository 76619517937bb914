use analysis_core::Candle;
use chrono::{Duration, Utc};

use crate::indicators::*;
use crate::snapshot::indicator_snapshot;

fn sample_prices() -> Vec<f64> {
    vec![
        44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03, 45.61,
        46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
    ]
}

fn sample_candles(len: usize) -> Vec<Candle> {
    let start = Utc::now() - Duration::minutes(15 * len as i64);
    (0..len)
        .map(|i| {
            // Gentle oscillation so gains and losses both occur
            let close = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1;
            Candle {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: close - 0.2,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1_000.0 + i as f64,
            }
        })
        .collect()
}

#[test]
fn sma_basic() {
    let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let result = sma(&data, 3);

    assert_eq!(result.len(), 5);
    assert!(result[0].is_none());
    assert!(result[1].is_none());
    assert!((result[2].unwrap() - 2.0).abs() < 1e-9);
    assert!((result[3].unwrap() - 3.0).abs() < 1e-9);
    assert!((result[4].unwrap() - 4.0).abs() < 1e-9);
}

#[test]
fn sma_insufficient_data() {
    let data = vec![1.0, 2.0];
    assert!(sma(&data, 5).iter().all(Option::is_none));
}

#[test]
fn ema_matches_input_length() {
    let prices = sample_prices();
    let result = ema(&prices, 12);
    assert_eq!(result.len(), prices.len());

    // Seeded with the SMA of the first window
    let seed: f64 = prices[..12].iter().sum::<f64>() / 12.0;
    assert!((result[0] - seed).abs() < 1e-9);
}

#[test]
fn ema_tracks_uptrend() {
    let data: Vec<f64> = (1..=10).map(|i| i as f64).collect();
    let result = ema(&data, 3);
    for window in result.windows(2).skip(3) {
        assert!(window[1] > window[0]);
    }
}

#[test]
fn rsi_bounded() {
    let prices = sample_prices();
    let result = rsi(&prices, 14);

    assert_eq!(result.len(), prices.len());
    assert!(result[..14].iter().all(Option::is_none));
    for value in result.into_iter().flatten() {
        assert!((0.0..=100.0).contains(&value));
    }
}

#[test]
fn rsi_all_gains_is_100() {
    let data: Vec<f64> = (1..=20).map(|i| i as f64).collect();
    let result = rsi(&data, 14);
    assert!((result[14].unwrap() - 100.0).abs() < 1e-9);
}

#[test]
fn macd_alignment() {
    let candles = sample_candles(60);
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let result = macd(&closes, 12, 26, 9);

    assert_eq!(result.macd_line.len(), closes.len());
    assert_eq!(result.signal_line.len(), closes.len());
    assert!(result.macd_line.iter().all(|v| v.is_finite()));
    assert!(result.signal_line.iter().all(|v| v.is_finite()));
}

#[test]
fn snapshot_drops_incomplete_rows() {
    // With exactly 50 candles only the final row has a full SMA-50 window.
    let candles = sample_candles(50);
    let rows = indicator_snapshot(&candles, 10);
    assert_eq!(rows.len(), 1);
}

#[test]
fn snapshot_last_ten_rows_are_complete() {
    let candles = sample_candles(100);
    let rows = indicator_snapshot(&candles, 10);

    assert_eq!(rows.len(), 10);
    for row in &rows {
        assert!(row.sma_20.is_finite());
        assert!(row.sma_50.is_finite());
        assert!(row.rsi.is_finite());
        assert!(row.macd.is_finite());
        assert!(row.macd_signal.is_finite());
    }

    // Rows come back in chronological order, ending at the latest candle.
    assert_eq!(
        rows.last().unwrap().timestamp,
        candles.last().unwrap().timestamp
    );
    assert!(rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}
