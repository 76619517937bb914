use std::time::Duration;

use analysis_core::AnalysisError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::LlmClient;

const BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 4096;

/// Anthropic messages-API client.
#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Self {
        let model =
            std::env::var("CLAUDE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn call(
        &self,
        system_prompt: &str,
        user_message: Option<&str>,
        agent_name: &str,
    ) -> Result<String, AnalysisError> {
        let body = match user_message {
            Some(user) => json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "system": system_prompt,
                "messages": [{"role": "user", "content": user}],
            }),
            None => json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "messages": [{"role": "user", "content": system_prompt}],
            }),
        };

        tracing::debug!(agent = agent_name, model = %self.model, "calling Claude");

        let response = self
            .client
            .post(format!("{BASE_URL}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::LlmError(format!(
                "Claude HTTP {status}: {body}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::LlmError(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AnalysisError::LlmError(
                "Claude returned empty content".to_string(),
            ));
        }
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "claude"
    }
}
