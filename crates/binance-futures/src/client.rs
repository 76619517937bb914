use anyhow::{anyhow, Context, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const BASE_URL: &str = "https://fapi.binance.com";

/// Recv-window sent with every signed request (milliseconds).
const RECV_WINDOW: u64 = 5000;

/// Low-level USDT-M futures REST client with HMAC-SHA256 request signing.
/// The API key travels as the `X-MBX-APIKEY` header; the secret is used
/// only for signing and is never logged.
#[derive(Clone)]
pub struct FuturesClient {
    client: reqwest::Client,
    secret: String,
    base_url: String,
}

impl FuturesClient {
    pub fn new(api_key: String, secret: String) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            "X-MBX-APIKEY",
            HeaderValue::from_str(&api_key).context("API key contains invalid characters")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            secret,
            base_url: BASE_URL.to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("BINANCE_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("BINANCE_API_KEY not set"))?;
        let secret = std::env::var("BINANCE_API_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("BINANCE_API_SECRET not set"))?;
        Self::new(api_key, secret)
    }

    /// HMAC-SHA256 hex signature of `query`.
    pub fn sign(secret: &str, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Append timestamp, recvWindow and signature to `params`.
    fn signed_query(&self, params: &str) -> String {
        let ts = Self::timestamp_ms();
        let base = if params.is_empty() {
            format!("timestamp={ts}&recvWindow={RECV_WINDOW}")
        } else {
            format!("{params}&timestamp={ts}&recvWindow={RECV_WINDOW}")
        };
        let sig = Self::sign(&self.secret, &base);
        format!("{base}&signature={sig}")
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("failed to parse {path} response"))?;

        if !status.is_success() {
            anyhow::bail!("Binance GET {path} returned {status}: {body}");
        }
        Ok(body)
    }

    /// GET /fapi/v2/account (signed) — wallet totals and margin state.
    pub async fn account_information(&self) -> Result<serde_json::Value> {
        self.signed_get("/fapi/v2/account", "").await
    }

    /// GET /fapi/v2/balance (signed) — per-asset balances.
    pub async fn account_balances(&self) -> Result<serde_json::Value> {
        self.signed_get("/fapi/v2/balance", "").await
    }

    /// GET /fapi/v2/positionRisk (signed) — all position slots.
    pub async fn position_risk(&self) -> Result<serde_json::Value> {
        self.signed_get("/fapi/v2/positionRisk", "").await
    }

    /// POST /fapi/v1/order (signed).
    pub async fn place_order(
        &self,
        symbol: &str,
        side: &str,
        quantity: f64,
        order_type: &str,
        price: Option<f64>,
    ) -> Result<serde_json::Value> {
        let mut params = format!(
            "symbol={}&side={}&type={}&quantity={}",
            symbol,
            side.to_uppercase(),
            order_type.to_uppercase(),
            quantity
        );
        if let Some(price) = price {
            params.push_str(&format!("&price={price}&timeInForce=GTC"));
        }

        tracing::info!(symbol, side, order_type, quantity, "submitting futures order");

        let url = format!(
            "{}/fapi/v1/order?{}",
            self.base_url,
            self.signed_query(&params)
        );
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("POST /fapi/v1/order request failed")?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .context("failed to parse order response")?;

        if !status.is_success() {
            anyhow::bail!("Binance order returned {status}: {body}");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Known-answer vector from the Binance signed-endpoint documentation.
    #[test]
    fn signature_known_answer() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            FuturesClient::sign(secret, query),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn signed_query_appends_signature() {
        let client = FuturesClient::new("key".to_string(), "secret".to_string()).unwrap();
        let query = client.signed_query("symbol=BTCUSDT");
        assert!(query.starts_with("symbol=BTCUSDT&timestamp="));
        assert!(query.contains("&recvWindow=5000&signature="));
    }

    #[tokio::test]
    #[ignore] // Only run with valid credentials
    async fn live_account_information() {
        let client = FuturesClient::from_env().unwrap();
        let account = client.account_information().await.unwrap();
        assert!(account["totalWalletBalance"].is_string());
    }
}
