use std::time::Duration;

use analysis_core::AnalysisError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::LlmClient;

const BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";
const DEFAULT_MODEL: &str = "doubao-1-5-pro-32k-250115";

/// Doubao (Volcengine Ark) client — OpenAI-compatible chat completions.
#[derive(Clone)]
pub struct DoubaoClient {
    client: Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl DoubaoClient {
    pub fn new(api_key: String) -> Self {
        let model =
            std::env::var("DOUBAO_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
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
impl LlmClient for DoubaoClient {
    async fn call(
        &self,
        system_prompt: &str,
        user_message: Option<&str>,
        agent_name: &str,
    ) -> Result<String, AnalysisError> {
        let messages = match user_message {
            Some(user) => json!([
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user},
            ]),
            // Single-prompt mode: the caller packed everything into one text
            None => json!([{"role": "user", "content": system_prompt}]),
        };

        tracing::debug!(agent = agent_name, model = %self.model, "calling Doubao");

        let response = self
            .client
            .post(format!("{BASE_URL}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| AnalysisError::LlmError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::LlmError(format!(
                "Doubao HTTP {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::LlmError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AnalysisError::LlmError("Doubao returned no choices".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "doubao"
    }
}
