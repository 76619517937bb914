use analysis_core::{AnalysisError, Candle};
use chrono::DateTime;
use reqwest::Client;

const BASE_URL: &str = "https://api.binance.com";

/// Fetch spot klines for a canonical symbol.
pub async fn fetch_klines(
    client: &Client,
    symbol: &str,
    interval: &str,
    limit: u32,
) -> Result<Vec<Candle>, AnalysisError> {
    let url = format!("{BASE_URL}/api/v3/klines");
    let limit = limit.to_string();
    let response = client
        .get(&url)
        .query(&[
            ("symbol", symbol),
            ("interval", interval),
            ("limit", limit.as_str()),
        ])
        .send()
        .await
        .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AnalysisError::ApiError(format!(
            "Binance klines HTTP {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        )));
    }

    let raw: serde_json::Value = response
        .json()
        .await
        .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

    parse_klines(&raw)
}

/// Binance returns klines as positional arrays:
/// `[open_time, open, high, low, close, volume, close_time, ...]` with
/// the numeric fields encoded as strings.
pub fn parse_klines(raw: &serde_json::Value) -> Result<Vec<Candle>, AnalysisError> {
    let rows = raw
        .as_array()
        .ok_or_else(|| AnalysisError::ApiError("klines response is not an array".to_string()))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row
            .as_array()
            .ok_or_else(|| AnalysisError::ApiError("kline row is not an array".to_string()))?;
        if fields.len() < 6 {
            return Err(AnalysisError::ApiError(format!(
                "kline row has {} fields, expected at least 6",
                fields.len()
            )));
        }

        let open_time = fields[0]
            .as_i64()
            .ok_or_else(|| AnalysisError::ApiError("kline open time missing".to_string()))?;
        let timestamp = DateTime::from_timestamp_millis(open_time)
            .ok_or_else(|| AnalysisError::ApiError("kline open time out of range".to_string()))?;

        candles.push(Candle {
            timestamp,
            open: string_field(&fields[1])?,
            high: string_field(&fields[2])?,
            low: string_field(&fields[3])?,
            close: string_field(&fields[4])?,
            volume: string_field(&fields[5])?,
        });
    }
    Ok(candles)
}

fn string_field(value: &serde_json::Value) -> Result<f64, AnalysisError> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_f64())
        .ok_or_else(|| AnalysisError::ApiError(format!("non-numeric kline field: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_kline_rows() {
        let raw = json!([
            [1700000000000i64, "37000.1", "37100.0", "36900.5", "37050.2", "120.5", 1700000899999i64],
            [1700000900000i64, "37050.2", "37200.0", "37000.0", "37150.0", "98.2", 1700001799999i64],
        ]);

        let candles = parse_klines(&raw).unwrap();
        assert_eq!(candles.len(), 2);
        assert!((candles[0].open - 37000.1).abs() < 1e-9);
        assert!((candles[0].close - 37050.2).abs() < 1e-9);
        assert!((candles[1].volume - 98.2).abs() < 1e-9);
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(parse_klines(&json!({"not": "an array"})).is_err());
        assert!(parse_klines(&json!([[1700000000000i64, "37000.1"]])).is_err());
    }
}
