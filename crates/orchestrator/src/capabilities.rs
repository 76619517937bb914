//! The closed capability set the master brain may dispatch.
//!
//! Handlers close over a `Weak` reference to the controller (which owns
//! the registry), so there is no ownership cycle. Every handler folds its
//! failures into a `❌ …` string.

use std::sync::{Arc, Weak};

use serde_json::json;

use crate::controller::Controller;
use crate::parser::ArgValue;
use crate::registry::{ArgMap, CapabilityDescriptor, CapabilityRegistry};

const OFFLINE: &str = "❌ 系统已停止";

fn str_arg(args: &ArgMap, key: &str) -> Option<String> {
    args.get(key).and_then(ArgValue::as_str).map(str::to_string)
}

fn list_arg(args: &ArgMap, key: &str) -> Option<Vec<String>> {
    args.get(key).map(ArgValue::as_list)
}

fn symbol_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "symbol": {"type": "string", "description": "交易对，如BTCUSDT"}
        },
        "required": ["symbol"]
    })
}

fn empty_schema() -> serde_json::Value {
    json!({"type": "object", "properties": {}})
}

macro_rules! capability {
    ($registry:expr, $weak:expr, $name:literal, $desc:literal, $schema:expr, |$controller:ident, $args:ident| $body:expr) => {
        let weak = Weak::clone($weak);
        $registry.register(CapabilityDescriptor::new(
            $name,
            $desc,
            $schema,
            move |$args: ArgMap| {
                let weak = weak.clone();
                async move {
                    let Some($controller) = weak.upgrade() else {
                        return OFFLINE.to_string();
                    };
                    let _ = &$args;
                    $body
                }
            },
        ));
    };
}

pub fn build_registry(controller: &Arc<Controller>) -> CapabilityRegistry {
    let weak = &Arc::downgrade(controller);
    let mut registry = CapabilityRegistry::new();

    capability!(registry, weak, "technical_analysis", "执行技术分析", symbol_schema(), |c, args| {
        match str_arg(&args, "symbol") {
            Some(symbol) => c.technical_report(&symbol).await,
            None => "❌ 缺少symbol参数".to_string(),
        }
    });

    capability!(registry, weak, "market_sentiment_analysis", "分析市场情绪", empty_schema(), |c, _args| {
        c.market_sentiment_report().await
    });

    capability!(registry, weak, "fundamental_analysis", "执行基本面分析", symbol_schema(), |c, args| {
        match str_arg(&args, "symbol") {
            Some(symbol) => c.fundamental_report(&symbol).await,
            None => "❌ 缺少symbol参数".to_string(),
        }
    });

    capability!(registry, weak, "macro_analysis", "执行宏观分析（每日限一次）", empty_schema(), |c, _args| {
        c.macro_report().await
    });

    capability!(
        registry,
        weak,
        "comprehensive_analysis",
        "执行多分析师协作的完整分析",
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "分析问题或主题"},
                "symbols": {"type": "array", "items": {"type": "string"}, "description": "要分析的交易对列表"}
            },
            "required": ["question"]
        }),
        |c, args| {
            let Some(question) = str_arg(&args, "question") else {
                return "❌ 缺少question参数".to_string();
            };
            let symbols = list_arg(&args, "symbols").unwrap_or_default();
            c.comprehensive_analysis(&question, symbols).await
        }
    );

    capability!(registry, weak, "get_account_status", "获取交易账户状态", empty_schema(), |c, _args| {
        let info = c.account_info().await;
        serde_json::to_string_pretty(&info).unwrap_or_else(|e| format!("❌ 序列化失败: {e}"))
    });

    capability!(registry, weak, "get_current_positions", "获取当前持仓信息", empty_schema(), |c, _args| {
        let positions = c.current_positions().await;
        serde_json::to_string_pretty(&positions).unwrap_or_else(|e| format!("❌ 序列化失败: {e}"))
    });

    capability!(
        registry,
        weak,
        "trading_analysis",
        "执行交易分析和策略制定",
        json!({
            "type": "object",
            "properties": {
                "analysis_results": {"type": "string", "description": "基础分析结果"},
                "question": {"type": "string", "description": "交易相关问题"}
            },
            "required": ["analysis_results", "question"]
        }),
        |c, args| {
            let (Some(analysis_results), Some(question)) =
                (str_arg(&args, "analysis_results"), str_arg(&args, "question"))
            else {
                return "❌ 缺少analysis_results或question参数".to_string();
            };
            c.trading_analysis_from_text(&analysis_results, &question).await
        }
    );

    capability!(
        registry,
        weak,
        "get_market_data",
        "获取实时市场数据（价格、RSI、MACD等）",
        json!({
            "type": "object",
            "properties": {
                "symbol": {"type": "string", "description": "交易对，如BTCUSDT（单个）"},
                "symbols": {"type": "array", "items": {"type": "string"}, "description": "交易对列表（多个）"}
            }
        }),
        |c, args| {
            let symbols = match (str_arg(&args, "symbol"), list_arg(&args, "symbols")) {
                (Some(symbol), _) => vec![symbol],
                (None, Some(symbols)) if !symbols.is_empty() => symbols,
                _ => return "❌ 缺少symbol或symbols参数".to_string(),
            };
            c.market_snapshot(&symbols).await
        }
    );

    capability!(
        registry,
        weak,
        "manual_trigger_analysis",
        "手动触发特定币种的完整分析",
        symbol_schema(),
        |c, args| {
            if let Some(symbol) = str_arg(&args, "symbol") {
                return c.manual_analysis(&symbol).await;
            }
            match list_arg(&args, "symbols") {
                Some(symbols) if !symbols.is_empty() => {
                    let mut results = Vec::new();
                    for symbol in symbols {
                        let result = c.manual_analysis(&symbol).await;
                        results.push(format!("{symbol}: {result}"));
                    }
                    results.join("\n")
                }
                _ => "❌ 未找到有效的symbol或symbols参数".to_string(),
            }
        }
    );

    capability!(
        registry,
        weak,
        "send_telegram_notification",
        "发送Telegram通知",
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "通知消息内容"}
            },
            "required": ["message"]
        }),
        |c, args| {
            match str_arg(&args, "message") {
                Some(message) => c.send_notification(&message).await,
                None => "❌ 缺少message参数".to_string(),
            }
        }
    );

    capability!(registry, weak, "get_system_status", "获取系统运行状态", empty_schema(), |c, _args| {
        c.system_status_json().await
    });

    capability!(
        registry,
        weak,
        "set_monitoring_symbols",
        "设置动态监控币种列表",
        json!({
            "type": "object",
            "properties": {
                "primary_symbols": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "主要监控币种列表，如[\"BTCUSDT\", \"ETHUSDT\"]"
                },
                "secondary_symbols": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "次要监控币种列表，如[\"SOLUSDT\"]"
                }
            },
            "required": ["primary_symbols"]
        }),
        |c, args| {
            let Some(primary) = list_arg(&args, "primary_symbols") else {
                return "❌ 缺少primary_symbols参数".to_string();
            };
            let secondary = list_arg(&args, "secondary_symbols").unwrap_or_default();
            c.set_monitoring_symbols(primary, secondary)
        }
    );

    capability!(registry, weak, "get_monitoring_symbols", "获取当前监控币种列表", empty_schema(), |c, _args| {
        c.monitoring_symbols_json()
    });

    capability!(
        registry,
        weak,
        "set_heartbeat_interval",
        "设置心跳监控间隔时间",
        json!({
            "type": "object",
            "properties": {
                "interval_seconds": {"type": "number", "description": "心跳间隔秒数，如300表示5分钟"}
            },
            "required": ["interval_seconds"]
        }),
        |c, args| {
            match args.get("interval_seconds").and_then(ArgValue::as_f64) {
                Some(interval) => c.set_heartbeat_interval(interval),
                None => "❌ 缺少interval_seconds参数".to_string(),
            }
        }
    );

    capability!(registry, weak, "get_heartbeat_settings", "获取当前心跳设置", empty_schema(), |c, _args| {
        c.heartbeat_settings_json()
    });

    capability!(
        registry,
        weak,
        "start_symbol_monitor",
        "开始监控指定币种，定时执行技术分析",
        json!({
            "type": "object",
            "properties": {
                "symbol": {"type": "string", "description": "交易对，如BTCUSDT"},
                "interval_minutes": {"type": "number", "description": "监控间隔（分钟），默认30分钟"}
            },
            "required": ["symbol"]
        }),
        |c, args| {
            let Some(symbol) = str_arg(&args, "symbol") else {
                return "❌ 缺少symbol参数".to_string();
            };
            let interval = args
                .get("interval_minutes")
                .and_then(ArgValue::as_u64)
                .unwrap_or(30);
            c.start_symbol_monitor(&symbol, interval).message
        }
    );

    capability!(registry, weak, "stop_symbol_monitor", "停止监控指定币种", symbol_schema(), |c, args| {
        match str_arg(&args, "symbol") {
            Some(symbol) => c.stop_symbol_monitor(&symbol).message,
            None => "❌ 缺少symbol参数".to_string(),
        }
    });

    capability!(registry, weak, "get_symbol_monitors_status", "获取所有币种监控状态", empty_schema(), |c, _args| {
        c.monitors_status_json()
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoleProviders, RuntimeConfig, SystemConfig};
    use analysis_core::AnalysisError;
    use async_trait::async_trait;
    use binance_futures::TradingBroker;
    use database::Store;
    use llm_client::{LlmClient, LlmProviders};
    use market_data::MarketDataService;

    struct MockLlm;

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn call(
            &self,
            _system: &str,
            _user: Option<&str>,
            _agent: &str,
        ) -> Result<String, AnalysisError> {
            Ok("分析结论".to_string())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    async fn test_controller(tag: &str) -> Arc<Controller> {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let providers = LlmProviders::default().with_client("mock", Arc::new(MockLlm));
        let config_path = std::env::temp_dir().join(format!(
            "coinsentinel-caps-{tag}-{}.toml",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&config_path);

        let controller = Controller::new(
            SystemConfig::default(),
            Arc::new(RuntimeConfig::load(config_path)),
            store,
            Arc::new(MarketDataService::new()),
            Arc::new(TradingBroker::from_env()),
            providers,
            RoleProviders::default(),
        );
        Controller::init_brain(&controller, "mock");
        controller
    }

    // The registry is a closed set: exactly the documented capability
    // names, no more, no fewer.
    #[tokio::test]
    async fn registry_is_the_documented_closed_set() {
        let controller = test_controller("closed-set").await;
        let registry = controller.capabilities().unwrap();

        let expected = vec![
            "technical_analysis",
            "market_sentiment_analysis",
            "fundamental_analysis",
            "macro_analysis",
            "comprehensive_analysis",
            "get_account_status",
            "get_current_positions",
            "trading_analysis",
            "get_market_data",
            "manual_trigger_analysis",
            "send_telegram_notification",
            "get_system_status",
            "set_monitoring_symbols",
            "get_monitoring_symbols",
            "set_heartbeat_interval",
            "get_heartbeat_settings",
            "start_symbol_monitor",
            "stop_symbol_monitor",
            "get_symbol_monitors_status",
        ];
        assert_eq!(registry.names(), expected);
    }

    #[tokio::test]
    async fn heartbeat_interval_is_range_checked() {
        let controller = test_controller("heartbeat").await;
        let registry = controller.capabilities().unwrap();

        let mut args = ArgMap::new();
        args.insert(
            "interval_seconds".to_string(),
            ArgValue::Str("30".to_string()),
        );
        let result = registry
            .invoke("set_heartbeat_interval", args)
            .await
            .unwrap();
        assert_eq!(result, "❌ 心跳间隔不能少于60秒");

        let mut args = ArgMap::new();
        args.insert(
            "interval_seconds".to_string(),
            ArgValue::Str("7200".to_string()),
        );
        let result = registry
            .invoke("set_heartbeat_interval", args)
            .await
            .unwrap();
        assert_eq!(result, "❌ 心跳间隔不能超过1小时");

        let mut args = ArgMap::new();
        args.insert(
            "interval_seconds".to_string(),
            ArgValue::Str("300".to_string()),
        );
        let result = registry
            .invoke("set_heartbeat_interval", args)
            .await
            .unwrap();
        assert!(result.starts_with("✅ 心跳间隔已设置为 300 秒"));
    }

    #[tokio::test]
    async fn monitor_lifecycle_through_capabilities() {
        let controller = test_controller("monitor").await;
        let registry = controller.capabilities().unwrap();

        let mut args = ArgMap::new();
        args.insert("symbol".to_string(), ArgValue::Str("btc".to_string()));
        let started = registry.invoke("start_symbol_monitor", args).await.unwrap();
        assert_eq!(started, "已开始监控 BTCUSDT，间隔 30 分钟");

        let mut args = ArgMap::new();
        args.insert("symbol".to_string(), ArgValue::Str("BTCUSDT".to_string()));
        let duplicate = registry.invoke("start_symbol_monitor", args).await.unwrap();
        assert_eq!(duplicate, "BTCUSDT 已在监控中");

        let mut args = ArgMap::new();
        args.insert("symbol".to_string(), ArgValue::Str("BTC".to_string()));
        let stopped = registry.invoke("stop_symbol_monitor", args).await.unwrap();
        assert_eq!(stopped, "已停止监控 BTCUSDT");
    }

    #[tokio::test]
    async fn monitoring_symbols_are_format_checked() {
        let controller = test_controller("symbols").await;
        let registry = controller.capabilities().unwrap();

        let mut args = ArgMap::new();
        args.insert(
            "primary_symbols".to_string(),
            ArgValue::List(vec!["BTC".to_string()]),
        );
        let result = registry
            .invoke("set_monitoring_symbols", args)
            .await
            .unwrap();
        assert_eq!(result, "❌ 币种格式错误: BTC，应为BTCUSDT格式");

        let mut args = ArgMap::new();
        args.insert(
            "primary_symbols".to_string(),
            ArgValue::List(vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]),
        );
        let result = registry
            .invoke("set_monitoring_symbols", args)
            .await
            .unwrap();
        assert!(result.contains("✅ 监控币种已更新"));
        assert!(result.contains("BTC, ETH"));
    }

    #[tokio::test]
    async fn missing_required_arg_is_an_error_string() {
        let controller = test_controller("missing-arg").await;
        let registry = controller.capabilities().unwrap();

        let result = registry
            .invoke("technical_analysis", ArgMap::new())
            .await
            .unwrap();
        assert_eq!(result, "❌ 缺少symbol参数");
    }
}
