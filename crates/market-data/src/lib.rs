mod binance;
mod coingecko;
mod fear_greed;

pub use binance::parse_klines;

use analysis_core::{AnalysisError, Candle};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::Client;
use std::time::Duration;

const CACHE_TTL_SECS: i64 = 300;

struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

impl<T: Clone> CacheEntry<T> {
    fn fresh(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    fn get(&self) -> Option<T> {
        let age = (Utc::now() - self.cached_at).num_seconds();
        (age < CACHE_TTL_SECS).then(|| self.data.clone())
    }
}

/// Pull-based market data source: Binance klines, CoinGecko global /
/// trending / major-coin stats, alternative.me fear & greed. Every
/// response is cached for five minutes.
pub struct MarketDataService {
    client: Client,
    kline_interval: String,
    kline_cache: DashMap<String, CacheEntry<Vec<Candle>>>,
    blob_cache: DashMap<String, CacheEntry<serde_json::Value>>,
}

impl MarketDataService {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            kline_interval: std::env::var("KLINE_INTERVAL").unwrap_or_else(|_| "15m".to_string()),
            kline_cache: DashMap::new(),
            blob_cache: DashMap::new(),
        }
    }

    pub fn kline_interval(&self) -> &str {
        &self.kline_interval
    }

    /// Latest klines for a canonical symbol (cached, 5-min TTL).
    pub async fn collect_kline_data(&self, symbol: &str) -> Result<Vec<Candle>, AnalysisError> {
        if let Some(entry) = self.kline_cache.get(symbol) {
            if let Some(data) = entry.get() {
                return Ok(data);
            }
        }

        let candles = binance::fetch_klines(&self.client, symbol, &self.kline_interval, 100).await?;
        self.kline_cache
            .insert(symbol.to_string(), CacheEntry::fresh(candles.clone()));
        Ok(candles)
    }

    /// Global market totals and BTC/ETH dominance (cached).
    pub async fn collect_global_market_data(&self) -> Result<serde_json::Value, AnalysisError> {
        self.cached_blob("global", coingecko::fetch_global(&self.client))
            .await
    }

    /// Top trending search coins (cached).
    pub async fn collect_trending_data(&self) -> Result<Vec<serde_json::Value>, AnalysisError> {
        let blob = self
            .cached_blob("trending", coingecko::fetch_trending(&self.client))
            .await?;
        Ok(blob.as_array().cloned().unwrap_or_default())
    }

    /// Price / 24h-change / volume snapshot of the major coins (cached).
    pub async fn collect_major_coins(&self) -> Result<Vec<serde_json::Value>, AnalysisError> {
        let blob = self
            .cached_blob("major_coins", coingecko::fetch_major_coins(&self.client))
            .await?;
        Ok(blob.as_array().cloned().unwrap_or_default())
    }

    /// Crypto fear & greed index (cached).
    pub async fn get_fear_greed_index(&self) -> Result<serde_json::Value, AnalysisError> {
        self.cached_blob("fear_greed", fear_greed::fetch(&self.client))
            .await
    }

    async fn cached_blob<F>(&self, key: &str, fetch: F) -> Result<serde_json::Value, AnalysisError>
    where
        F: std::future::Future<Output = Result<serde_json::Value, AnalysisError>>,
    {
        if let Some(entry) = self.blob_cache.get(key) {
            if let Some(data) = entry.get() {
                return Ok(data);
            }
        }

        let blob = fetch.await?;
        self.blob_cache
            .insert(key.to_string(), CacheEntry::fresh(blob.clone()));
        Ok(blob)
    }

    pub fn cache_stats(&self) -> serde_json::Value {
        serde_json::json!({
            "kline_entries": self.kline_cache.len(),
            "blob_entries": self.blob_cache.len(),
            "ttl_seconds": CACHE_TTL_SECS,
        })
    }
}

impl Default for MarketDataService {
    fn default() -> Self {
        Self::new()
    }
}
