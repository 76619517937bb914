use std::collections::HashMap;
use std::sync::Arc;

use crate::{ClaudeClient, DoubaoClient, LlmClient};

/// All configured LLM backends, keyed by provider name.
///
/// Analyst roles are bound to a provider name in configuration; an unknown
/// or unconfigured provider falls back to the default.
#[derive(Clone, Default)]
pub struct LlmProviders {
    clients: HashMap<String, Arc<dyn LlmClient>>,
    default_provider: String,
}

impl LlmProviders {
    /// Build from `DOUBAO_API_KEY` / `CLAUDE_API_KEY`. Missing keys just
    /// leave that provider out; the first available one becomes the
    /// default.
    pub fn from_env() -> Self {
        let mut clients: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();

        if let Ok(key) = std::env::var("DOUBAO_API_KEY") {
            if !key.trim().is_empty() {
                clients.insert("doubao".to_string(), Arc::new(DoubaoClient::new(key)));
                tracing::info!("Doubao LLM client configured");
            }
        }
        if let Ok(key) = std::env::var("CLAUDE_API_KEY") {
            if !key.trim().is_empty() {
                clients.insert("claude".to_string(), Arc::new(ClaudeClient::new(key)));
                tracing::info!("Claude LLM client configured");
            }
        }

        let default_provider = if clients.contains_key("doubao") {
            "doubao".to_string()
        } else {
            "claude".to_string()
        };

        if clients.is_empty() {
            tracing::warn!("no LLM provider configured (set DOUBAO_API_KEY or CLAUDE_API_KEY)");
        }

        Self {
            clients,
            default_provider,
        }
    }

    /// Registry for tests and manual wiring.
    pub fn with_client(mut self, name: &str, client: Arc<dyn LlmClient>) -> Self {
        if self.clients.is_empty() {
            self.default_provider = name.to_string();
        }
        self.clients.insert(name.to_string(), client);
        self
    }

    /// Resolve the client for a configured provider name, falling back to
    /// the default provider.
    pub fn for_provider(&self, provider: &str) -> Option<Arc<dyn LlmClient>> {
        self.clients
            .get(provider)
            .or_else(|| self.clients.get(&self.default_provider))
            .cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
