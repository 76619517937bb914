use std::collections::BTreeMap;
use std::sync::Arc;

use binance_futures::TradingBroker;
use database::Store;
use llm_client::LlmClient;
use serde_json::json;

use crate::{prompts, roles};

/// Per-symbol outputs collected by the comprehensive-analysis pipeline.
#[derive(Debug, Clone, Default)]
pub struct SymbolAnalysis {
    pub technical: String,
    pub fundamental: String,
    pub chief: String,
}

/// The research package handed to the trader.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResults {
    /// Input-order symbol list; the first entry is the trade focus.
    pub symbols: Vec<String>,
    pub symbol_analyses: BTreeMap<String, SymbolAnalysis>,
    pub sentiment_analysis: String,
    pub macro_analysis: String,
    pub research_summary: String,
}

/// Perpetual-futures trader: account-aware strategy proposals on top of
/// the research department's output.
pub struct TraderAnalyst {
    llm: Arc<dyn LlmClient>,
    broker: Arc<TradingBroker>,
    store: Store,
}

impl TraderAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, broker: Arc<TradingBroker>, store: Store) -> Self {
        Self { llm, broker, store }
    }

    /// Build the trading prompt from the research package plus live
    /// account state and recent chief-analyst records, then ask the LLM
    /// for a decision.
    pub async fn conduct_trading_analysis(
        &self,
        research: &AnalysisResults,
        question: &str,
    ) -> String {
        let account_balance = self.broker.get_account_balance().await;
        let current_positions = self.broker.get_current_positions().await;
        let recent_research = self.recent_chief_analysis(10).await;

        let primary_symbol = research
            .symbols
            .first()
            .map(String::as_str)
            .unwrap_or("BTCUSDT");

        let prompt = format_trading_prompt(
            research,
            question,
            &account_balance,
            &current_positions,
            &recent_research,
            primary_symbol,
        );

        match self.llm.call(&prompt, None, roles::TRADER).await {
            Ok(response) => format!("💼 永续交易员分析报告\n\n{response}"),
            Err(e) => format!("❌ 交易分析生成失败: {e}"),
        }
    }

    /// Account snapshot used by the account-status capability.
    pub async fn account_info(&self) -> serde_json::Value {
        json!({
            "balance": self.broker.get_account_balance().await,
            "positions": self.broker.get_current_positions().await,
            "trading_available": self.broker.is_available(),
        })
    }

    async fn recent_chief_analysis(&self, limit: i64) -> Vec<serde_json::Value> {
        match self
            .store
            .get_analysis_records(Some("chief_analysis"), Some(roles::CHIEF), limit)
            .await
        {
            Ok(records) => records
                .into_iter()
                .map(|record| {
                    let preview: String = record.content.chars().take(200).collect();
                    json!({
                        "timestamp": record.timestamp.to_rfc3339(),
                        "symbol": record.symbol,
                        "summary": record.summary,
                        "content_preview": preview,
                    })
                })
                .collect(),
            Err(e) => {
                tracing::warn!("failed to load chief analysis history: {e}");
                Vec::new()
            }
        }
    }
}

pub fn format_trading_prompt(
    research: &AnalysisResults,
    question: &str,
    account_balance: &serde_json::Value,
    current_positions: &serde_json::Value,
    recent_research: &[serde_json::Value],
    primary_symbol: &str,
) -> String {
    let primary_name = analysis_core::display_symbol(primary_symbol);
    let balance_json = serde_json::to_string_pretty(account_balance).unwrap_or_default();
    let positions_json = serde_json::to_string_pretty(current_positions).unwrap_or_default();
    let history_json = serde_json::to_string_pretty(recent_research).unwrap_or_default();

    format!(
        "{system}

你当前的任务：基于研究部门的多币种分析报告，重点针对 {primary_symbol} 制定合约交易策略。

=== 研究部门综合报告 ===
{summary}

=== 可用交易工具 ===
{tools}

=== 当前账户状态 ===
余额信息: {balance_json}
当前持仓: {positions_json}

=== 历史交易参考 ===
{history_json}

=== 用户问题 ===
{question}

=== 交易决策要求 ===
1. **交易方向**：
   - LONG {primary_name}：看多，建议开多单
   - SHORT {primary_name}：看空，建议开空单
   - CLOSE_LONG：平多仓
   - CLOSE_SHORT：平空仓
   - HOLD：观望，暂不交易

2. **具体交易参数**（如果建议交易）：
   - 建议仓位大小（占总资金百分比）
   - 建议杠杆倍数
   - 入场点位
   - 止损点位
   - 止盈点位

3. **风险提示**：
   - 主要风险因素
   - 需要关注的市场变化

4. **执行建议**：
   - 是否需要立即执行，还是等待更好的入场时机

请提供专业、具体、可执行的交易建议。",
        system = prompts::TRADER,
        summary = research.research_summary,
        tools = trading_tools_description(),
    )
}

fn trading_tools_description() -> &'static str {
    "\
**币安USDT永续合约交易工具**

1. **账户余额查询** (get_account_balance)
   - 总钱包余额、可用余额、未实现盈亏、保证金余额

2. **持仓信息查询** (get_current_positions)
   - 持仓币种和方向、持仓数量和入场价、标记价格、未实现盈亏、杠杆倍数、强平价格

3. **市价开仓/平仓**
   - 支持做多(LONG)和做空(SHORT)，市价单和限价单，可设置杠杆倍数

4. **风险管理**
   - 止损单(Stop Loss)、止盈单(Take Profit)、仓位大小控制"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_research_and_account_state() {
        let mut research = AnalysisResults::default();
        research.symbols = vec!["ETHUSDT".to_string()];
        research.research_summary = "综合看多 ETH".to_string();

        let prompt = format_trading_prompt(
            &research,
            "现在能开仓吗",
            &json!({"success": true, "available_balance": 1234.5}),
            &json!({"success": true, "positions": [], "position_count": 0}),
            &[],
            "ETHUSDT",
        );

        assert!(prompt.contains("综合看多 ETH"));
        assert!(prompt.contains("LONG ETH"));
        assert!(prompt.contains("1234.5"));
        assert!(prompt.contains("现在能开仓吗"));
        assert!(prompt.contains("HOLD"));
        assert!(prompt.contains("CLOSE_LONG"));
    }
}
