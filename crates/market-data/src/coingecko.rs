use analysis_core::AnalysisError;
use reqwest::Client;
use serde_json::json;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const MAJOR_COIN_IDS: &str = "bitcoin,ethereum,binancecoin,solana";

async fn get_json(client: &Client, url: &str) -> Result<serde_json::Value, AnalysisError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AnalysisError::ApiError(format!(
            "CoinGecko HTTP {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AnalysisError::ApiError(e.to_string()))
}

/// Global totals, flattened to the fields the market analyst reads.
pub async fn fetch_global(client: &Client) -> Result<serde_json::Value, AnalysisError> {
    let raw = get_json(client, &format!("{BASE_URL}/global")).await?;
    let data = &raw["data"];

    Ok(json!({
        "total_market_cap_usd": data["total_market_cap"]["usd"],
        "total_volume_24h_usd": data["total_volume"]["usd"],
        "market_cap_change_percentage_24h_usd": data["market_cap_change_percentage_24h_usd"],
        "active_cryptocurrencies": data["active_cryptocurrencies"],
        "market_cap_percentage": data["market_cap_percentage"],
    }))
}

/// Trending search coins, one flat object per coin.
pub async fn fetch_trending(client: &Client) -> Result<serde_json::Value, AnalysisError> {
    let raw = get_json(client, &format!("{BASE_URL}/search/trending")).await?;
    let coins: Vec<serde_json::Value> = raw["coins"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|entry| {
                    let item = &entry["item"];
                    json!({
                        "name": item["name"],
                        "symbol": item["symbol"],
                        "market_cap_rank": item["market_cap_rank"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(serde_json::Value::Array(coins))
}

/// Price snapshot of the major coins.
pub async fn fetch_major_coins(client: &Client) -> Result<serde_json::Value, AnalysisError> {
    let url = format!(
        "{BASE_URL}/coins/markets?vs_currency=usd&ids={MAJOR_COIN_IDS}&order=market_cap_desc"
    );
    let raw = get_json(client, &url).await?;
    let coins: Vec<serde_json::Value> = raw
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|coin| {
                    json!({
                        "symbol": coin["symbol"],
                        "name": coin["name"],
                        "current_price": coin["current_price"],
                        "price_change_24h": coin["price_change_percentage_24h"],
                        "total_volume": coin["total_volume"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(serde_json::Value::Array(coins))
}
