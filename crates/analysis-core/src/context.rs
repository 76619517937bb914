use std::collections::HashMap;

use crate::types::Candle;

/// The single carrier handed to analyst formatters.
///
/// Built once per analysis run and never mutated by an analyst. The chief
/// analyst's context carries only the four sub-analyst string outputs, no
/// raw market data.
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub target_symbol: String,

    /// Kline series per canonical symbol (technical analyst input)
    pub kline_data: HashMap<String, Vec<Candle>>,

    /// Market-sentiment inputs (market analyst)
    pub global_market_data: Option<serde_json::Value>,
    pub fear_greed_index: Option<serde_json::Value>,
    pub trending_coins: Option<Vec<serde_json::Value>>,
    pub major_coins_performance: Option<Vec<serde_json::Value>>,

    /// Macro inputs (macro analyst)
    pub macro_data: Option<serde_json::Value>,

    /// Sub-analyst outputs (chief analyst input only)
    pub technical_analysis: Option<String>,
    pub sentiment_analysis: Option<String>,
    pub fundamental_analysis_result: Option<String>,
    pub macro_analysis_result: Option<String>,
}

impl AnalysisContext {
    pub fn new(target_symbol: impl Into<String>) -> Self {
        Self {
            target_symbol: target_symbol.into(),
            ..Default::default()
        }
    }

    /// True iff the target symbol has a non-empty kline series.
    pub fn has_kline_data(&self) -> bool {
        self.kline_data
            .get(&self.target_symbol)
            .map(|series| !series.is_empty())
            .unwrap_or(false)
    }

    pub fn has_market_data(&self) -> bool {
        self.global_market_data.is_some()
    }

    /// Kline series for the target symbol (empty slice when absent).
    pub fn target_klines(&self) -> &[Candle] {
        self.kline_data
            .get(&self.target_symbol)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn kline_presence() {
        let mut ctx = AnalysisContext::new("BTCUSDT");
        assert!(!ctx.has_kline_data());

        ctx.kline_data.insert("BTCUSDT".to_string(), vec![]);
        assert!(!ctx.has_kline_data());

        ctx.kline_data
            .insert("BTCUSDT".to_string(), vec![candle(50_000.0)]);
        assert!(ctx.has_kline_data());
        assert_eq!(ctx.target_klines().len(), 1);
    }

    #[test]
    fn other_symbol_does_not_count() {
        let mut ctx = AnalysisContext::new("ETHUSDT");
        ctx.kline_data
            .insert("BTCUSDT".to_string(), vec![candle(50_000.0)]);
        assert!(!ctx.has_kline_data());
        assert!(ctx.target_klines().is_empty());
    }
}
