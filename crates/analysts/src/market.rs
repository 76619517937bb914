use std::sync::Arc;

use analysis_core::AnalysisContext;
use llm_client::LlmClient;

use crate::{prompts, roles};

/// Market analyst: global totals, fear & greed, dominance, trending and
/// major-coin performance.
pub struct MarketAnalyst {
    llm: Arc<dyn LlmClient>,
}

impl MarketAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Reads the market-sentiment fields of the context.
    pub async fn analyze(&self, ctx: &AnalysisContext) -> String {
        let user_message = format_market_sentiment_message(
            ctx.global_market_data.as_ref(),
            ctx.fear_greed_index.as_ref(),
            ctx.trending_coins.as_deref(),
            ctx.major_coins_performance.as_deref(),
        );

        match self
            .llm
            .call(prompts::MARKET_ANALYST, Some(&user_message), roles::MARKET)
            .await
        {
            Ok(report) => report,
            Err(e) => format!("❌ 市场情绪分析失败: {e}"),
        }
    }
}

pub fn format_market_sentiment_message(
    global_data: Option<&serde_json::Value>,
    fear_greed: Option<&serde_json::Value>,
    trending: Option<&[serde_json::Value]>,
    major_coins: Option<&[serde_json::Value]>,
) -> String {
    let mut parts = vec!["请基于以下多维度数据分析当前加密货币市场情绪：\n".to_string()];

    parts.push("=== 全球市场数据 ===".to_string());
    parts.push(format_global_data(global_data));
    parts.push(String::new());

    parts.push("=== 恐贪指数 ===".to_string());
    match fear_greed {
        Some(index) => {
            parts.push(format!(
                "当前指数: {} ({})",
                index["value"],
                index["classification"].as_str().unwrap_or("未知")
            ));
            parts.push(format!(
                "数据源: {}",
                index["source"].as_str().unwrap_or("未知")
            ));
        }
        None => parts.push("❌ 恐贪指数数据暂时不可用".to_string()),
    }
    parts.push(String::new());

    parts.push("=== BTC/ETH主导率 ===".to_string());
    match global_data.and_then(|g| g.get("market_cap_percentage")) {
        Some(dominance) => {
            let btc = dominance["btc"].as_f64().unwrap_or(0.0);
            let eth = dominance["eth"].as_f64().unwrap_or(0.0);
            parts.push(format!("BTC主导率: {btc:.2}%"));
            parts.push(format!("ETH主导率: {eth:.2}%"));
            if btc > 50.0 {
                parts.push("分析：BTC主导地位强势，市场相对保守".to_string());
            } else if btc < 40.0 {
                parts.push("分析：山寨币活跃，市场风险偏好上升".to_string());
            }
        }
        None => parts.push("❌ 主导率数据暂时不可用".to_string()),
    }
    parts.push(String::new());

    parts.push("=== 热门搜索趋势 ===".to_string());
    parts.push(format_trending(trending));
    parts.push(String::new());

    parts.push("=== 主流币种表现 ===".to_string());
    parts.push(format_major_coins(major_coins));
    parts.push(String::new());

    parts.push("请提供客观专业的市场情绪评估，重点关注多个指标之间的相互验证。".to_string());
    parts.join("\n")
}

fn format_global_data(global_data: Option<&serde_json::Value>) -> String {
    let Some(data) = global_data else {
        return "❌ 暂无全球市场数据".to_string();
    };

    [
        format!(
            "总市值: ${:.0}",
            data["total_market_cap_usd"].as_f64().unwrap_or(0.0)
        ),
        format!(
            "24H成交量: ${:.0}",
            data["total_volume_24h_usd"].as_f64().unwrap_or(0.0)
        ),
        format!(
            "24H市值变化: {:.2}%",
            data["market_cap_change_percentage_24h_usd"]
                .as_f64()
                .unwrap_or(0.0)
        ),
        format!(
            "活跃加密货币: {}",
            data["active_cryptocurrencies"].as_i64().unwrap_or(0)
        ),
    ]
    .join("\n")
}

fn format_trending(trending: Option<&[serde_json::Value]>) -> String {
    let coins = trending.unwrap_or(&[]);
    if coins.is_empty() {
        return "❌ 暂无热门币种数据".to_string();
    }

    coins
        .iter()
        .take(5)
        .map(|coin| {
            format!(
                "{} ({}) [排名#{}]",
                coin["name"].as_str().unwrap_or("Unknown"),
                coin["symbol"].as_str().unwrap_or("").to_uppercase(),
                coin["market_cap_rank"].as_i64().map_or("?".to_string(), |r| r.to_string()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_major_coins(major_coins: Option<&[serde_json::Value]>) -> String {
    let coins = major_coins.unwrap_or(&[]);
    if coins.is_empty() {
        return "❌ 暂无主流币种数据".to_string();
    }

    coins
        .iter()
        .map(|coin| {
            format!(
                "{} ({}): ${:.2} ({:+.2}%) 成交量:${:.0}",
                coin["name"].as_str().unwrap_or("Unknown"),
                coin["symbol"].as_str().unwrap_or("").to_uppercase(),
                coin["current_price"].as_f64().unwrap_or(0.0),
                coin["price_change_24h"].as_f64().unwrap_or(0.0),
                coin["total_volume"].as_f64().unwrap_or(0.0),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn btc_dominance_verdicts() {
        let strong = json!({"market_cap_percentage": {"btc": 54.2, "eth": 17.1}});
        let message = format_market_sentiment_message(Some(&strong), None, None, None);
        assert!(message.contains("BTC主导地位强势"));

        let alt = json!({"market_cap_percentage": {"btc": 38.0, "eth": 20.0}});
        let message = format_market_sentiment_message(Some(&alt), None, None, None);
        assert!(message.contains("山寨币活跃"));

        let neutral = json!({"market_cap_percentage": {"btc": 45.0, "eth": 18.0}});
        let message = format_market_sentiment_message(Some(&neutral), None, None, None);
        assert!(!message.contains("分析："));
    }

    #[test]
    fn missing_sections_are_labelled() {
        let message = format_market_sentiment_message(None, None, None, None);
        assert!(message.contains("❌ 暂无全球市场数据"));
        assert!(message.contains("❌ 恐贪指数数据暂时不可用"));
        assert!(message.contains("❌ 暂无热门币种数据"));
        assert!(message.contains("❌ 暂无主流币种数据"));
    }

    #[test]
    fn trending_caps_at_five() {
        let coins: Vec<_> = (0..8)
            .map(|i| json!({"name": format!("Coin{i}"), "symbol": "c", "market_cap_rank": i}))
            .collect();
        let message = format_market_sentiment_message(None, None, Some(&coins), None);
        assert!(message.contains("Coin4"));
        assert!(!message.contains("Coin5"));
    }
}
