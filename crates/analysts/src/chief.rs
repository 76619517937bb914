use std::sync::Arc;

use analysis_core::AnalysisContext;
use llm_client::LlmClient;

use crate::{prompts, roles};

/// Chief analyst: synthesizes the four sub-analyst reports. Consumes only
/// their string outputs, never raw market data.
pub struct ChiefAnalyst {
    llm: Arc<dyn LlmClient>,
}

impl ChiefAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn analyze(&self, ctx: &AnalysisContext) -> String {
        let user_message = format_chief_message(
            &ctx.target_symbol,
            ctx.technical_analysis.as_deref(),
            ctx.sentiment_analysis.as_deref(),
            ctx.fundamental_analysis_result.as_deref(),
            ctx.macro_analysis_result.as_deref(),
        );

        match self
            .llm
            .call(prompts::CHIEF_ANALYST, Some(&user_message), roles::CHIEF)
            .await
        {
            Ok(report) => report,
            Err(e) => format!("❌ 首席分析师综合分析失败: {e}"),
        }
    }
}

pub fn format_chief_message(
    symbol: &str,
    technical: Option<&str>,
    sentiment: Option<&str>,
    fundamental: Option<&str>,
    macro_report: Option<&str>,
) -> String {
    [
        format!("请整合以下四个专业代理的分析报告，提供针对{symbol}的全面投资建议：\n"),
        "=== 技术分析师报告 ===".to_string(),
        technical.unwrap_or("暂无技术分析").to_string(),
        "\n=== 市场分析师报告 ===".to_string(),
        sentiment.unwrap_or("暂无市场分析").to_string(),
        "\n=== 基本面分析师报告 ===".to_string(),
        fundamental.unwrap_or("暂无基本面分析").to_string(),
        "\n=== 宏观分析师报告 ===".to_string(),
        macro_report.unwrap_or("暂无宏观分析").to_string(),
        format!("\n请基于技术面、市场情绪、基本面和宏观面的综合分析，提供针对{symbol}的全面投资建议。"),
        "注意平衡各方观点，给出客观专业的结论，重点关注各维度分析的一致性和分歧点。".to_string(),
        format!("请提供具体、可操作的{symbol}投资建议，避免空泛的表述。"),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_four_sections_present() {
        let message = format_chief_message(
            "BTCUSDT",
            Some("tech report"),
            Some("sentiment report"),
            None,
            Some("macro report"),
        );

        assert!(message.contains("=== 技术分析师报告 ==="));
        assert!(message.contains("tech report"));
        assert!(message.contains("=== 市场分析师报告 ==="));
        assert!(message.contains("=== 基本面分析师报告 ==="));
        assert!(message.contains("暂无基本面分析"));
        assert!(message.contains("=== 宏观分析师报告 ==="));
        assert!(message.contains("macro report"));
    }
}
