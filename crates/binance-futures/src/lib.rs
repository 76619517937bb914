mod client;

pub use client::FuturesClient;

use serde_json::{json, Value};

/// Brokerage facade used by the trader role and the account capabilities.
///
/// Every method returns a JSON envelope — `{"success": true, ...}` or
/// `{"error": "..."}` — so callers can embed the result in prompts and
/// chat replies without error plumbing.
pub struct TradingBroker {
    client: Option<FuturesClient>,
}

impl TradingBroker {
    /// Build from `BINANCE_API_KEY` / `BINANCE_API_SECRET`. Missing keys
    /// leave the broker in an unavailable state instead of failing boot.
    pub fn from_env() -> Self {
        match FuturesClient::from_env() {
            Ok(client) => {
                tracing::info!("Binance USDT-M futures client configured");
                Self {
                    client: Some(client),
                }
            }
            Err(e) => {
                tracing::warn!("futures trading unavailable: {e}");
                Self { client: None }
            }
        }
    }

    pub fn with_client(client: FuturesClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    /// Wallet totals plus the USDT asset breakdown.
    pub async fn get_account_balance(&self) -> Value {
        let Some(client) = &self.client else {
            return json!({"error": "合约客户端未初始化"});
        };

        let account = match client.account_information().await {
            Ok(v) => v,
            Err(e) => return json!({"error": format!("获取余额失败: {e}")}),
        };
        let balances = match client.account_balances().await {
            Ok(v) => v,
            Err(e) => return json!({"error": format!("获取余额失败: {e}")}),
        };

        let usdt_balance = balances
            .as_array()
            .into_iter()
            .flatten()
            .find(|b| b["asset"].as_str() == Some("USDT"))
            .map(|b| {
                json!({
                    "balance": num_field(&b["balance"]),
                    "available_balance": num_field(&b["availableBalance"]),
                })
            });

        json!({
            "success": true,
            "account_type": "USDT永续合约",
            "total_wallet_balance": num_field(&account["totalWalletBalance"]),
            "available_balance": num_field(&account["availableBalance"]),
            "total_unrealized_profit": num_field(&account["totalUnrealizedProfit"]),
            "total_margin_balance": num_field(&account["totalMarginBalance"]),
            "usdt_balance": usdt_balance,
        })
    }

    /// Open positions only (`positionAmt != 0`).
    pub async fn get_current_positions(&self) -> Value {
        let Some(client) = &self.client else {
            return json!({"error": "合约客户端未初始化"});
        };

        let raw = match client.position_risk().await {
            Ok(v) => v,
            Err(e) => return json!({"error": format!("获取持仓失败: {e}")}),
        };

        let positions = filter_active_positions(&raw);
        json!({
            "success": true,
            "position_count": positions.len(),
            "positions": positions,
        })
    }

    /// Place a futures order; the brokerage response is passed through.
    pub async fn place_futures_order(
        &self,
        symbol: &str,
        side: &str,
        quantity: f64,
        order_type: &str,
        price: Option<f64>,
    ) -> Value {
        let Some(client) = &self.client else {
            return json!({"error": "合约客户端未初始化"});
        };

        match client
            .place_order(symbol, side, quantity, order_type, price)
            .await
        {
            Ok(v) => v,
            Err(e) => json!({"error": format!("下单失败: {e}")}),
        }
    }
}

/// Extract the active positions from a raw positionRisk response.
pub fn filter_active_positions(raw: &Value) -> Vec<Value> {
    raw.as_array()
        .into_iter()
        .flatten()
        .filter_map(|pos| {
            let amount = num_field(&pos["positionAmt"]);
            if amount == 0.0 {
                return None;
            }
            Some(json!({
                "symbol": pos["symbol"],
                "position_side": pos["positionSide"],
                "position_amt": amount,
                "entry_price": num_field(&pos["entryPrice"]),
                "mark_price": num_field(&pos["markPrice"]),
                "unrealized_profit": num_field(&pos["unRealizedProfit"]),
                "leverage": num_field(&pos["leverage"]) as i64,
                "liquidation_price": num_field(&pos["liquidationPrice"]),
            }))
        })
        .collect()
}

/// Binance encodes most numerics as strings; accept both.
fn num_field(value: &Value) -> f64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_flat_positions() {
        let raw = serde_json::json!([
            {"symbol": "BTCUSDT", "positionAmt": "0.000", "entryPrice": "0.0",
             "markPrice": "37000.0", "unRealizedProfit": "0.0", "leverage": "20",
             "liquidationPrice": "0", "positionSide": "BOTH"},
            {"symbol": "ETHUSDT", "positionAmt": "-1.500", "entryPrice": "2000.0",
             "markPrice": "1980.0", "unRealizedProfit": "30.0", "leverage": "10",
             "liquidationPrice": "2500.0", "positionSide": "BOTH"},
        ]);

        let positions = filter_active_positions(&raw);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0]["symbol"], "ETHUSDT");
        assert!((positions[0]["position_amt"].as_f64().unwrap() + 1.5).abs() < 1e-9);
        assert_eq!(positions[0]["leverage"], 10);
    }

    #[tokio::test]
    async fn unavailable_broker_returns_error_maps() {
        let broker = TradingBroker { client: None };
        assert!(broker.get_account_balance().await["error"].is_string());
        assert!(broker.get_current_positions().await["error"].is_string());
        assert!(
            broker
                .place_futures_order("BTCUSDT", "BUY", 0.01, "MARKET", None)
                .await["error"]
                .is_string()
        );
    }
}
