use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use analysis_core::{normalize_symbol, AnalysisRecord};
use analysts::{
    roles, AnalysisResults, ChiefAnalyst, FundamentalAnalyst, MacroAnalyst, MarketAnalyst,
    SymbolAnalysis, TechnicalAnalyst, TraderAnalyst,
};
use binance_futures::TradingBroker;
use chrono::Utc;
use database::Store;
use futures::future::join_all;
use llm_client::LlmProviders;
use market_data::MarketDataService;
use technical_analysis::latest_indicators;

use crate::brain::MasterBrain;
use crate::capabilities;
use crate::config::{RoleProviders, RuntimeConfig, SystemConfig};
use crate::monitors::{MonitorManager, MonitorOutcome};
use crate::pipeline::AnalysisPipeline;
use crate::registry::CapabilityRegistry;
use crate::scheduler::Scheduler;
use crate::session::SessionStore;
use crate::transport::ChatTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Initialized,
    Running,
    Stopped,
}

impl Lifecycle {
    fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Initialized => "initialized",
            Lifecycle::Running => "running",
            Lifecycle::Stopped => "stopped",
        }
    }
}

/// Owns every component and exposes the operations the capability
/// registry dispatches to. The registry and master brain are created in
/// `init_brain` after the controller is behind an `Arc`, so capability
/// handlers close over a `Weak` back-reference instead of a cycle.
pub struct Controller {
    pub(crate) system_config: SystemConfig,
    pub(crate) runtime: Arc<RuntimeConfig>,
    pub(crate) store: Store,
    pub(crate) market_data: Arc<MarketDataService>,
    pub(crate) broker: Arc<TradingBroker>,
    pub(crate) pipeline: AnalysisPipeline,
    pub(crate) session: Arc<SessionStore>,
    pub(crate) monitors: MonitorManager,
    pub(crate) providers: LlmProviders,
    scheduler: Scheduler,
    registry: OnceLock<Arc<CapabilityRegistry>>,
    brain: OnceLock<MasterBrain>,
    transport: OnceLock<Arc<dyn ChatTransport>>,
    weak_self: OnceLock<Weak<Controller>>,
    auto_trading: AtomicBool,
    state: Mutex<Lifecycle>,
}

impl Controller {
    pub fn new(
        system_config: SystemConfig,
        runtime: Arc<RuntimeConfig>,
        store: Store,
        market_data: Arc<MarketDataService>,
        broker: Arc<TradingBroker>,
        providers: LlmProviders,
        role_providers: RoleProviders,
    ) -> Arc<Self> {
        let llm_for = |provider: &str| providers.for_provider(provider).unwrap_or_else(|| {
            Arc::new(llm_client::UnconfiguredLlm) as Arc<dyn llm_client::LlmClient>
        });

        let interval = market_data.kline_interval().to_string();
        let pipeline = AnalysisPipeline::new(
            Arc::clone(&market_data),
            store.clone(),
            TechnicalAnalyst::new(llm_for(&role_providers.technical), interval),
            MarketAnalyst::new(llm_for(&role_providers.market)),
            FundamentalAnalyst::new(llm_for(&role_providers.fundamental)),
            MacroAnalyst::new(llm_for(&role_providers.macro_analyst)),
            ChiefAnalyst::new(llm_for(&role_providers.chief)),
            TraderAnalyst::new(
                llm_for(&role_providers.trader),
                Arc::clone(&broker),
                store.clone(),
            ),
        );

        let session = Arc::new(SessionStore::new(
            store.clone(),
            llm_for(&role_providers.chief),
        ));

        Arc::new(Self {
            system_config,
            runtime,
            store,
            market_data,
            broker,
            pipeline,
            session,
            monitors: MonitorManager::new(),
            providers,
            scheduler: Scheduler::new(),
            registry: OnceLock::new(),
            brain: OnceLock::new(),
            transport: OnceLock::new(),
            weak_self: OnceLock::new(),
            auto_trading: AtomicBool::new(false),
            state: Mutex::new(Lifecycle::Initialized),
        })
    }

    /// Build the capability registry and master brain. Must run once,
    /// right after construction.
    pub fn init_brain(controller: &Arc<Self>, brain_provider: &str) {
        let registry = Arc::new(capabilities::build_registry(controller));
        let llm = controller
            .providers
            .for_provider(brain_provider)
            .unwrap_or_else(|| Arc::new(llm_client::UnconfiguredLlm));

        let brain = MasterBrain::new(
            llm,
            Arc::clone(&controller.session),
            Arc::clone(&registry),
            controller.system_config.clone(),
            Arc::clone(&controller.runtime),
        );

        controller
            .weak_self
            .set(Arc::downgrade(controller))
            .unwrap_or_else(|_| panic!("controller initialized twice"));
        controller
            .registry
            .set(registry)
            .unwrap_or_else(|_| panic!("capability registry initialized twice"));
        controller
            .brain
            .set(brain)
            .unwrap_or_else(|_| panic!("master brain initialized twice"));
        tracing::info!("master brain and capability registry initialized");
    }

    pub fn set_chat_transport(&self, transport: Arc<dyn ChatTransport>) {
        if self.transport.set(transport).is_err() {
            tracing::warn!("chat transport already set");
        }
    }

    pub fn capabilities(&self) -> Option<&Arc<CapabilityRegistry>> {
        self.registry.get()
    }

    // ============= lifecycle =============

    /// Set the system running: immediate base analysis, then the daily
    /// wall-clock slots. The chat transport is started by the binary right
    /// after this returns.
    pub fn start_monitoring(&self) {
        let Some(weak) = self.weak_self.get().cloned() else {
            tracing::error!("start_monitoring called before init_brain");
            return;
        };

        *self.state.lock().expect("state lock poisoned") = Lifecycle::Running;
        self.scheduler.start(move || {
            let weak = weak.clone();
            async move {
                if let Some(controller) = weak.upgrade() {
                    controller.run_base_analysis().await;
                }
            }
        });
        tracing::info!("monitoring started");
    }

    /// Stop the scheduler; the chat transport intentionally stays up so
    /// operators keep the command surface after monitoring halts.
    pub fn stop_monitoring(&self) {
        *self.state.lock().expect("state lock poisoned") = Lifecycle::Stopped;
        self.scheduler.stop();
        tracing::info!("monitoring stopped (chat transport stays up)");
    }

    /// Full shutdown: scheduler plus every symbol monitor.
    pub fn shutdown(&self) {
        self.stop_monitoring();
        self.monitors.stop_all();
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.state.lock().expect("state lock poisoned")
    }

    // ============= master brain =============

    /// Free-form user text, routed through the master brain.
    pub async fn process_user_message(&self, message: &str, chat_id: &str, source: &str) -> String {
        let Some(brain) = self.brain.get() else {
            return "❌ 智能主脑未初始化".to_string();
        };

        tracing::info!(chat_id, source, "master brain processing user message");
        let context = vec![
            ("source".to_string(), source.to_string()),
            ("message_type".to_string(), "user_request".to_string()),
        ];
        brain.process_request(message, chat_id, &context).await
    }

    pub fn heartbeat_decision(&self, market_conditions: &serde_json::Value) -> String {
        match self.brain.get() {
            Some(brain) => brain.heartbeat_decision(market_conditions),
            None => "❌ 智能主脑未初始化".to_string(),
        }
    }

    // ============= analysis operations =============

    pub async fn technical_report(&self, symbol: &str) -> String {
        let symbol = normalize_symbol(symbol);
        self.pipeline.technical_report(&symbol).await
    }

    pub async fn market_sentiment_report(&self) -> String {
        self.pipeline.market_sentiment_report().await
    }

    pub async fn fundamental_report(&self, symbol: &str) -> String {
        let symbol = normalize_symbol(symbol);
        self.pipeline.fundamental_report(&symbol).await
    }

    pub async fn macro_report(&self) -> String {
        self.pipeline.macro_report().await
    }

    /// Multi-analyst pipeline over the given symbols (defaults to the
    /// primary monitoring list when empty input was supplied upstream).
    pub async fn comprehensive_analysis(&self, question: &str, symbols: Vec<String>) -> String {
        let symbols: Vec<String> = if symbols.is_empty() {
            self.runtime.primary_symbols()
        } else {
            symbols.iter().map(|s| normalize_symbol(s)).collect()
        };
        self.pipeline.comprehensive_analysis(question, &symbols).await
    }

    /// Manual one-shot technical analysis; the report is persisted as an
    /// analysis record and returned verbatim.
    pub async fn manual_analysis(&self, symbol: &str) -> String {
        let symbol = normalize_symbol(symbol);
        let report = self.pipeline.technical_report(&symbol).await;
        if !report.starts_with('❌') {
            self.persist_record(
                roles::TECHNICAL,
                Some(&symbol),
                &report,
                "manual_analysis",
                Some(&format!("手动触发{symbol}技术分析")),
            )
            .await;
        }
        report
    }

    /// Latest close/RSI/MACD/volume per symbol, as a JSON string.
    pub async fn market_snapshot(&self, symbols: &[String]) -> String {
        let mut results = Vec::new();
        for raw in symbols {
            let symbol = normalize_symbol(raw);
            match self.market_data.collect_kline_data(&symbol).await {
                Ok(candles) if !candles.is_empty() => {
                    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
                    let (rsi, macd) = latest_indicators(&closes);
                    let last = candles.last().expect("non-empty checked above");
                    results.push(serde_json::json!({
                        "symbol": symbol,
                        "price": last.close,
                        "rsi": rsi,
                        "macd": macd,
                        "volume": last.volume,
                        "timestamp": last.timestamp.to_rfc3339(),
                    }));
                }
                Ok(_) | Err(_) => {
                    results.push(serde_json::json!({"symbol": symbol, "error": "无法获取数据"}));
                }
            }
        }
        serde_json::to_string_pretty(&results).unwrap_or_else(|e| format!("❌ 序列化失败: {e}"))
    }

    /// Trader run over caller-provided research text (the
    /// `trading_analysis` capability).
    pub async fn trading_analysis_from_text(&self, analysis_results: &str, question: &str) -> String {
        let research = AnalysisResults {
            symbols: vec![],
            symbol_analyses: Default::default(),
            sentiment_analysis: String::new(),
            macro_analysis: String::new(),
            research_summary: analysis_results.to_string(),
        };
        self.pipeline
            .trader
            .conduct_trading_analysis(&research, question)
            .await
    }

    /// Trader chain used by auto-trading monitors: technical report in,
    /// decision advice out.
    pub async fn analyze_trading_decision(&self, symbol: &str, technical_analysis: &str) -> String {
        let symbol = normalize_symbol(symbol);
        let mut symbol_analyses = std::collections::BTreeMap::new();
        symbol_analyses.insert(
            symbol.clone(),
            SymbolAnalysis {
                technical: technical_analysis.to_string(),
                ..Default::default()
            },
        );

        let research = AnalysisResults {
            symbols: vec![symbol.clone()],
            symbol_analyses,
            sentiment_analysis: String::new(),
            macro_analysis: String::new(),
            research_summary: format!("技术分析报告：\n\n{technical_analysis}"),
        };
        let question = format!("请基于技术分析为 {symbol} 提供交易决策建议");
        self.pipeline
            .trader
            .conduct_trading_analysis(&research, &question)
            .await
    }

    // ============= scheduled base analysis =============

    /// The heavy periodic job: macro + market sentiment + per-primary
    /// fundamentals, in parallel. Each sub-job persists its record;
    /// failures are logged and do not abort the siblings.
    pub async fn run_base_analysis(&self) {
        tracing::info!("base analysis started: macro + market + fundamentals");
        self.record_trigger_event(None, "base_analysis", "宏观+市场+基本面定时分析");
        tokio::join!(
            self.base_macro_task(),
            self.base_market_task(),
            self.base_fundamentals_task(),
        );
        tracing::info!("base analysis complete");
    }

    async fn base_macro_task(&self) {
        let report = self.pipeline.macro_report().await;
        if report.starts_with('❌') {
            tracing::warn!("scheduled macro analysis failed: {report}");
            return;
        }
        self.persist_record(roles::MACRO, None, &report, "macro_analysis", Some("定时宏观分析"))
            .await;
    }

    async fn base_market_task(&self) {
        let report = self.pipeline.market_sentiment_report().await;
        if report.starts_with('❌') {
            tracing::warn!("scheduled market sentiment analysis failed: {report}");
            return;
        }
        self.persist_record(
            roles::MARKET,
            None,
            &report,
            "market_sentiment_analysis",
            Some("定时市场情绪分析"),
        )
        .await;
    }

    async fn base_fundamentals_task(&self) {
        let primary = self.runtime.primary_symbols();
        if primary.is_empty() {
            tracing::info!("no primary symbols configured, skipping fundamentals");
            return;
        }

        join_all(primary.iter().map(|symbol| async move {
            let report = self.pipeline.fundamental_report(symbol).await;
            if report.starts_with('❌') {
                tracing::warn!(symbol, "scheduled fundamental analysis failed: {report}");
                return;
            }
            self.persist_record(
                roles::FUNDAMENTAL,
                Some(symbol),
                &report,
                "fundamental_analysis",
                Some(&format!("定时{symbol}基本面分析")),
            )
            .await;
        }))
        .await;
    }

    pub(crate) async fn persist_record(
        &self,
        agent_name: &str,
        symbol: Option<&str>,
        content: &str,
        data_type: &str,
        summary: Option<&str>,
    ) {
        let record = AnalysisRecord {
            timestamp: Utc::now(),
            agent_name: agent_name.to_string(),
            symbol: symbol.map(str::to_string),
            content: content.to_string(),
            summary: summary.map(str::to_string),
            data_type: data_type.to_string(),
        };
        if let Err(e) = self.store.save_analysis_record(&record).await {
            tracing::warn!(agent_name, data_type, "failed to persist analysis record: {e}");
        }
    }

    // ============= symbol monitors =============

    /// Start a recurring monitor: technical analysis pushed to chat on
    /// every cycle, with an optional trader chain when auto-trading is on.
    pub fn start_symbol_monitor(&self, symbol: &str, interval_minutes: u64) -> MonitorOutcome {
        let symbol = normalize_symbol(symbol);
        let Some(controller) = self.weak_self.get().cloned() else {
            return MonitorOutcome {
                success: false,
                message: "❌ 系统未初始化".to_string(),
            };
        };
        let tick_symbol = symbol.clone();

        let outcome = self.monitors.start(&symbol, interval_minutes, move || {
            let controller = controller.clone();
            let symbol = tick_symbol.clone();
            async move {
                let Some(controller) = controller.upgrade() else {
                    return;
                };
                controller.monitor_tick(&symbol).await;
            }
        });
        if outcome.success {
            self.record_trigger_event(Some(&symbol), "monitor_start", &outcome.message);
        }
        outcome
    }

    pub fn stop_symbol_monitor(&self, symbol: &str) -> MonitorOutcome {
        let symbol = normalize_symbol(symbol);
        let outcome = self.monitors.stop(&symbol);
        if outcome.success {
            self.record_trigger_event(Some(&symbol), "monitor_stop", &outcome.message);
        }
        outcome
    }

    fn record_trigger_event(&self, symbol: Option<&str>, event_type: &str, description: &str) {
        let store = self.store.clone();
        let symbol = symbol.map(str::to_string);
        let event_type = event_type.to_string();
        let description = description.to_string();
        tokio::spawn(async move {
            if let Err(e) = store
                .save_trigger_event(symbol.as_deref(), &event_type, &description)
                .await
            {
                tracing::debug!("failed to record trigger event: {e}");
            }
        });
    }

    async fn monitor_tick(&self, symbol: &str) {
        tracing::info!(symbol, "monitor cycle: technical analysis");
        let report = self.pipeline.technical_report(symbol).await;
        if report.starts_with('❌') {
            tracing::warn!(symbol, "monitor analysis failed: {report}");
            return;
        }

        let base = analysis_core::display_symbol(symbol);
        self.push_to_chat(&format!("📊 **{base} 定时分析**\n\n{report}"))
            .await;

        if self.auto_trading.load(Ordering::SeqCst) {
            tracing::info!(symbol, "auto-trading on, chaining trader analysis");
            let decision = self.analyze_trading_decision(symbol, &report).await;
            self.push_to_chat(&format!("💼 **{base} 交易员决策**\n\n{decision}"))
                .await;
        }
    }

    async fn push_to_chat(&self, message: &str) {
        let Some(transport) = self.transport.get() else {
            tracing::debug!("no chat transport configured, dropping push message");
            return;
        };
        if let Err(e) = transport.send_message(message).await {
            tracing::warn!("chat push failed: {e}");
        }
    }

    /// The `send_telegram_notification` capability.
    pub async fn send_notification(&self, message: &str) -> String {
        let Some(transport) = self.transport.get() else {
            return "通知发送失败".to_string();
        };
        match transport.send_message(message).await {
            Ok(()) => "通知发送成功".to_string(),
            Err(e) => {
                tracing::warn!("notification send failed: {e}");
                "通知发送失败".to_string()
            }
        }
    }

    // ============= trading =============

    pub async fn account_balance(&self) -> serde_json::Value {
        self.broker.get_account_balance().await
    }

    pub async fn current_positions(&self) -> serde_json::Value {
        self.broker.get_current_positions().await
    }

    pub async fn account_info(&self) -> serde_json::Value {
        self.pipeline.trader.account_info().await
    }

    pub async fn execute_trade(
        &self,
        symbol: &str,
        side: &str,
        quantity: f64,
        order_type: &str,
        price: Option<f64>,
    ) -> serde_json::Value {
        self.broker
            .place_futures_order(&normalize_symbol(symbol), side, quantity, order_type, price)
            .await
    }

    pub fn set_auto_trading(&self, enabled: bool) -> String {
        self.auto_trading.store(enabled, Ordering::SeqCst);
        let status = if enabled { "已开启" } else { "已关闭" };
        format!("自动交易{status}")
    }

    pub fn auto_trading_enabled(&self) -> bool {
        self.auto_trading.load(Ordering::SeqCst)
    }

    // ============= configuration =============

    pub fn set_monitoring_symbols(
        &self,
        primary_symbols: Vec<String>,
        secondary_symbols: Vec<String>,
    ) -> String {
        for symbol in primary_symbols.iter().chain(secondary_symbols.iter()) {
            if !symbol.ends_with("USDT") {
                return format!("❌ 币种格式错误: {symbol}，应为BTCUSDT格式");
            }
        }

        let result = self.runtime.update(|config| {
            config.monitor.primary_symbols = primary_symbols.clone();
            config.monitor.secondary_symbols = secondary_symbols.clone();
        });
        if let Err(e) = result {
            return format!("❌ 设置监控币种失败: {e}");
        }

        let primary_display = primary_symbols
            .iter()
            .map(|s| analysis_core::display_symbol(s))
            .collect::<Vec<_>>()
            .join(", ");
        let secondary_display = if secondary_symbols.is_empty() {
            "无".to_string()
        } else {
            secondary_symbols
                .iter()
                .map(|s| analysis_core::display_symbol(s))
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!("✅ 监控币种已更新\n主要币种: {primary_display}\n次要币种: {secondary_display}")
    }

    pub fn monitoring_symbols_json(&self) -> String {
        let config = self.runtime.snapshot();
        let total = config.monitor.primary_symbols.len() + config.monitor.secondary_symbols.len();
        serde_json::json!({
            "primary_symbols": config.monitor.primary_symbols,
            "secondary_symbols": config.monitor.secondary_symbols,
            "total_count": total,
        })
        .to_string()
    }

    pub fn set_heartbeat_interval(&self, interval_seconds: f64) -> String {
        if interval_seconds < 60.0 {
            return "❌ 心跳间隔不能少于60秒".to_string();
        }
        if interval_seconds > 3600.0 {
            return "❌ 心跳间隔不能超过1小时".to_string();
        }

        let seconds = interval_seconds as u64;
        if let Err(e) = self
            .runtime
            .update(|config| config.triggers.normal_interval = seconds)
        {
            return format!("❌ 设置心跳间隔失败: {e}");
        }

        format!(
            "✅ 心跳间隔已设置为 {seconds} 秒 ({:.1} 分钟)",
            seconds as f64 / 60.0
        )
    }

    pub fn heartbeat_settings_json(&self) -> String {
        let interval = self.runtime.normal_interval();
        serde_json::json!({
            "normal_interval": interval,
            "next_heartbeat_estimate": format!("{interval}秒后"),
        })
        .to_string()
    }

    // ============= status =============

    pub fn monitors_status_json(&self) -> String {
        let monitors = self.monitors.list();
        serde_json::json!({
            "active_count": monitors.len(),
            "monitors": monitors,
        })
        .to_string()
    }

    pub async fn system_status_json(&self) -> String {
        let database = self
            .store
            .database_stats()
            .await
            .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}));

        let status = serde_json::json!({
            "config": {
                "name": self.system_config.name,
                "version": self.system_config.version,
                "mode": self.system_config.mode,
            },
            "state": self.lifecycle().as_str(),
            "database": database,
            "cache": self.market_data.cache_stats(),
            "monitoring": {
                "scheduler_running": self.scheduler.is_running(),
                "symbol_monitors": self.monitors.list(),
                "auto_trading": self.auto_trading_enabled(),
            },
            "llm_clients": self.providers.provider_names(),
            "trading": {"available": self.broker.is_available()},
            "telegram": {
                "configured": self.transport.get().is_some(),
            },
        });

        serde_json::to_string_pretty(&status).unwrap_or_else(|e| format!("❌ 序列化失败: {e}"))
    }
}
