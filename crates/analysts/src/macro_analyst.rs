use std::sync::Arc;

use llm_client::LlmClient;

use crate::{prompts, roles};

/// Macro analyst: free-form assessment of the global environment. No
/// per-call inputs beyond the prompt template.
pub struct MacroAnalyst {
    llm: Arc<dyn LlmClient>,
}

impl MacroAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn analyze(&self) -> String {
        match self.llm.call(prompts::MACRO_ANALYST, None, roles::MACRO).await {
            Ok(report) => report,
            Err(e) => format!("❌ 宏观分析失败: {e}"),
        }
    }
}
