use std::sync::Arc;

use analysis_core::AnalysisContext;
use llm_client::LlmClient;

use crate::{prompts, roles};

/// Fundamental analyst: project standing and long-term value.
pub struct FundamentalAnalyst {
    llm: Arc<dyn LlmClient>,
}

impl FundamentalAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn analyze(&self, ctx: &AnalysisContext) -> String {
        let user_message = format!(
            "请分析{symbol}的基本面情况：\n基于当前价格表现、成交量和市场地位进行分析。\n\n币种: {symbol}",
            symbol = ctx.target_symbol
        );

        match self
            .llm
            .call(
                prompts::FUNDAMENTAL_ANALYST,
                Some(&user_message),
                roles::FUNDAMENTAL,
            )
            .await
        {
            Ok(report) => report,
            Err(e) => format!("❌ 基本面分析失败: {e}"),
        }
    }
}
