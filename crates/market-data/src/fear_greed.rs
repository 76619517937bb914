use analysis_core::AnalysisError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const URL: &str = "https://api.alternative.me/fng/";

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngData>,
}

#[derive(Debug, Deserialize)]
struct FngData {
    value: String,
    value_classification: String,
    timestamp: String,
}

/// Crypto fear & greed index from alternative.me.
pub async fn fetch(client: &Client) -> Result<serde_json::Value, AnalysisError> {
    let response = client
        .get(URL)
        .send()
        .await
        .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AnalysisError::ApiError(format!(
            "alternative.me HTTP {}",
            response.status()
        )));
    }

    let body: FngResponse = response
        .json()
        .await
        .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

    let latest = body
        .data
        .first()
        .ok_or_else(|| AnalysisError::ApiError("fear & greed response empty".to_string()))?;

    let value: i64 = latest
        .value
        .parse()
        .map_err(|_| AnalysisError::ApiError("fear & greed value not numeric".to_string()))?;

    Ok(json!({
        "value": value,
        "classification": latest.value_classification,
        "timestamp": latest.timestamp,
        "source": "Alternative.me",
    }))
}
