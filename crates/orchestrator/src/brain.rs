use std::sync::Arc;

use analysis_core::ChatRole;
use analysts::roles;
use chrono::Local;
use llm_client::LlmClient;

use crate::config::{RuntimeConfig, SystemConfig};
use crate::parser::parse_directive;
use crate::registry::CapabilityRegistry;
use crate::session::SessionStore;

/// Standby-mode instructions for the dispatcher persona.
const MASTER_PROMPT: &str = "\
你是加密货币交易系统的智能主脑，当前处于待机模式。

## 工作模式
- **待机状态**: 系统已启动但不主动分析
- **Telegram控制**: 所有分析和交易通过Telegram用户命令触发
- **按需响应**: 只在收到明确指令时才执行相应操作
- **动态监控**: 监控币种完全根据用户输入动态添加和移除

## 自然语言理解能力
你需要理解用户的各种表达方式并转换为标准交易对格式：

**币种识别**：
- 比特币/BTC/大饼 → BTCUSDT
- 以太坊/ETH/姨太 → ETHUSDT
- 狗狗币/DOGE/狗币 → DOGEUSDT
- 索拉纳/SOL → SOLUSDT
- 其他币种同理，统一转换为 {币种代码}USDT 格式

**指令理解**：
- \"分析\"/\"看看\"/\"怎么样\" 默认指技术分析 (technical_analysis)
- \"全面分析\"/\"综合分析\" → 多分析师协作分析 (comprehensive_analysis)
- \"市场情绪\"/\"市场怎么样\" → 市场情绪分析 (market_sentiment_analysis)
- \"基本面\"/\"项目分析\" → 基本面分析 (fundamental_analysis)
- \"宏观\"/\"大环境\" → 宏观分析 (macro_analysis)
- \"监控\"/\"盯着\" → 开始币种监控 (start_symbol_monitor)
- \"停止监控\"/\"别盯了\" → 停止币种监控 (stop_symbol_monitor)

## 工作原则
1. **按需服务**：只在收到用户明确请求时执行操作
2. **智能决策**：根据用户请求选择合适的能力组合
3. **风险优先**：任何交易决策都要优先考虑风险控制
4. **透明执行**：清晰说明你的思考过程和调用的能力
5. **资源优化**：宏观分析每日限一次，避免重复调用

## 响应格式
- 首先说明你的理解和计划
- 然后调用相应的function
- 最后总结结果并给出建议";

/// Translates free-form user text into capability calls and a composed
/// reply: one LLM call, then line-by-line `FUNCTION_CALL:` dispatch.
pub struct MasterBrain {
    llm: Arc<dyn LlmClient>,
    session: Arc<SessionStore>,
    registry: Arc<CapabilityRegistry>,
    system_config: SystemConfig,
    runtime: Arc<RuntimeConfig>,
}

impl MasterBrain {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        session: Arc<SessionStore>,
        registry: Arc<CapabilityRegistry>,
        system_config: SystemConfig,
        runtime: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            llm,
            session,
            registry,
            system_config,
            runtime,
        }
    }

    /// Handle one user request end to end: context assembly, LLM call,
    /// directive dispatch, session persistence.
    pub async fn process_request(
        &self,
        request: &str,
        chat_id: &str,
        extra_context: &[(String, String)],
    ) -> String {
        let context_info = self.prepare_context(extra_context);
        let response = self
            .call_llm_with_functions(request, chat_id, &context_info)
            .await;

        if let Err(e) = self
            .session
            .add_message(chat_id, ChatRole::User, request, None)
            .await
        {
            tracing::warn!(chat_id, "failed to persist user message: {e}");
        }
        if let Err(e) = self
            .session
            .add_message(chat_id, ChatRole::Assistant, &response, None)
            .await
        {
            tracing::warn!(chat_id, "failed to persist assistant message: {e}");
        }

        response
    }

    /// Standby heartbeat: the system does not trade autonomously; all
    /// actions are user-initiated through the command surface.
    pub fn heartbeat_decision(&self, market_conditions: &serde_json::Value) -> String {
        format!(
            "🧠 系统待机中...

📊 市场监控正常：
- 币种: {}
- 价格: ${}
- 状态: 数据收集正常

📱 请通过Telegram机器人发送指令进行分析或交易操作。",
            market_conditions["symbol"].as_str().unwrap_or("N/A"),
            market_conditions["latest_price"]
                .as_f64()
                .map_or("N/A".to_string(), |p| format!("{p:.2}")),
        )
    }

    fn prepare_context(&self, extra: &[(String, String)]) -> String {
        let primary = self.runtime.primary_symbols();
        let monitored = if primary.is_empty() {
            "无(等待用户添加)".to_string()
        } else {
            primary
                .iter()
                .map(|s| analysis_core::display_symbol(s))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut lines = vec![
            format!("系统时间: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
            format!("监控币种: {monitored}"),
            format!("系统模式: {}", self.system_config.mode),
        ];
        lines.extend(extra.iter().map(|(k, v)| format!("{k}: {v}")));
        lines.join("\n")
    }

    async fn call_llm_with_functions(
        &self,
        request: &str,
        chat_id: &str,
        context_info: &str,
    ) -> String {
        let system_prompt = format!(
            "{MASTER_PROMPT}

可用的函数调用:
{catalogue}

如果需要调用函数，请用以下格式：
FUNCTION_CALL: function_name(param1=value1, param2=value2)

注意：字符串参数要用引号，数组参数用方括号。",
            catalogue = self.registry.catalogue(),
        );

        let history = self.session.get_history(chat_id, 10).await;
        let history_block = if history.is_empty() {
            String::new()
        } else {
            let lines = history
                .iter()
                .map(|entry| format!("{}: {}", entry.role.as_str(), entry.content))
                .collect::<Vec<_>>()
                .join("\n");
            format!("## 对话历史\n{lines}\n\n")
        };

        let user_message = format!(
            "{history_block}## 当前上下文\n{context_info}\n\n## 用户请求\n{request}\n\n请智能分析并执行相应操作。"
        );

        tracing::info!(
            chat_id,
            history_len = history.len(),
            "master brain calling LLM"
        );

        let response = match self
            .llm
            .call(&system_prompt, Some(&user_message), roles::MASTER_BRAIN)
            .await
        {
            Ok(response) => response,
            Err(e) => return format!("❌ LLM调用失败: {e}"),
        };

        self.process_function_calls(&response).await
    }

    /// Replace each `FUNCTION_CALL:` line with its dispatch result;
    /// everything else passes through.
    pub async fn process_function_calls(&self, response: &str) -> String {
        let mut processed = Vec::new();

        for line in response.split('\n') {
            let trimmed = line.trim();
            let Some(call_text) = trimmed.strip_prefix("FUNCTION_CALL:") else {
                processed.push(line.to_string());
                continue;
            };
            let call_text = call_text.trim();

            let result = self.execute_function_call(call_text).await;
            tracing::info!(call = call_text, result_len = result.len(), "directive executed");

            if result.is_empty() {
                // Empty non-error result: keep the directive line visible
                processed.push(line.to_string());
            } else {
                processed.push(result);
            }
        }

        processed.join("\n")
    }

    async fn execute_function_call(&self, call_text: &str) -> String {
        let Some(call) = parse_directive(call_text) else {
            return format!("❌ 执行失败: 无法解析函数调用 {call_text}");
        };

        match self.registry.invoke(&call.name, call.args).await {
            Some(result) => result,
            None => format!("❌ 未知的函数调用: {call_text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ArgValue;
    use crate::registry::{ArgMap, CapabilityDescriptor};
    use analysis_core::AnalysisError;
    use async_trait::async_trait;
    use database::Store;
    use serde_json::json;

    struct ScriptedLlm(String);

    #[async_trait]
    impl llm_client::LlmClient for ScriptedLlm {
        async fn call(
            &self,
            _system: &str,
            _user: Option<&str>,
            _agent: &str,
        ) -> Result<String, AnalysisError> {
            Ok(self.0.clone())
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    async fn brain_with(reply: &str) -> MasterBrain {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let llm: Arc<dyn llm_client::LlmClient> = Arc::new(ScriptedLlm(reply.to_string()));
        let session = Arc::new(SessionStore::new(store, Arc::clone(&llm)));

        let mut registry = CapabilityRegistry::new();
        registry.register(CapabilityDescriptor::new(
            "technical_analysis",
            "执行技术分析",
            json!({"type": "object", "properties": {"symbol": {"type": "string"}}, "required": ["symbol"]}),
            |args: ArgMap| async move {
                let symbol = args
                    .get("symbol")
                    .and_then(ArgValue::as_str)
                    .unwrap_or("?");
                format!("SMA20/RSI/MACD 报告: {symbol}")
            },
        ));
        registry.register(CapabilityDescriptor::new(
            "noop",
            "返回空结果",
            json!({"type": "object", "properties": {}}),
            |_args: ArgMap| async move { String::new() },
        ));

        MasterBrain::new(
            llm,
            session,
            Arc::new(registry),
            SystemConfig::default(),
            Arc::new(RuntimeConfig::load("/nonexistent/dynamic.toml")),
        )
    }

    #[tokio::test]
    async fn directive_lines_are_replaced_with_results() {
        let brain = brain_with("").await;
        let reply = "我来分析一下。\nFUNCTION_CALL: technical_analysis(symbol=\"BTCUSDT\")\n以上是结果。";

        let processed = brain.process_function_calls(reply).await;
        assert_eq!(
            processed,
            "我来分析一下。\nSMA20/RSI/MACD 报告: BTCUSDT\n以上是结果。"
        );
    }

    #[tokio::test]
    async fn unknown_function_yields_error_line() {
        let brain = brain_with("").await;
        let processed = brain
            .process_function_calls("FUNCTION_CALL: does_not_exist(x=1)")
            .await;
        assert_eq!(processed, "❌ 未知的函数调用: does_not_exist(x=1)");
    }

    #[tokio::test]
    async fn empty_result_keeps_directive_line() {
        let brain = brain_with("").await;
        let processed = brain.process_function_calls("FUNCTION_CALL: noop()").await;
        assert_eq!(processed, "FUNCTION_CALL: noop()");
    }

    #[tokio::test]
    async fn full_request_persists_both_rounds() {
        let brain = brain_with("FUNCTION_CALL: technical_analysis(symbol=\"ETHUSDT\")").await;
        let reply = brain.process_request("分析 ETH", "chat-1", &[]).await;
        assert!(reply.contains("SMA20/RSI/MACD 报告: ETHUSDT"));

        let history = brain.session.get_history("chat-1", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[0].content, "分析 ETH");
        assert_eq!(history[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn heartbeat_is_static_standby() {
        let brain = brain_with("").await;
        let status = brain.heartbeat_decision(&json!({"symbol": "BTCUSDT", "latest_price": 50000.0}));
        assert!(status.contains("系统待机中"));
        assert!(status.contains("BTCUSDT"));
    }
}
