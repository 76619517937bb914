mod claude;
mod doubao;
mod providers;

pub use claude::ClaudeClient;
pub use doubao::DoubaoClient;
pub use providers::LlmProviders;

use analysis_core::AnalysisError;
use async_trait::async_trait;

/// Backend-agnostic interface for the LLM transports.
///
/// Every analyst role calls exactly this: a system prompt, an optional
/// user message (None means the system prompt carries the full request),
/// and the role name for logging.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn call(
        &self,
        system_prompt: &str,
        user_message: Option<&str>,
        agent_name: &str,
    ) -> Result<String, AnalysisError>;

    fn provider_name(&self) -> &'static str;
}

/// Placeholder client used when a role's provider is not configured;
/// every call fails so the role degrades to its `❌` reply.
pub struct UnconfiguredLlm;

#[async_trait]
impl LlmClient for UnconfiguredLlm {
    async fn call(
        &self,
        _system_prompt: &str,
        _user_message: Option<&str>,
        agent_name: &str,
    ) -> Result<String, AnalysisError> {
        Err(AnalysisError::LlmError(format!(
            "{agent_name}: LLM客户端未初始化"
        )))
    }

    fn provider_name(&self) -> &'static str {
        "unconfigured"
    }
}
