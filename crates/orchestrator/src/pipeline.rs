use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use analysis_core::{AnalysisContext, AnalysisRecord};
use analysts::{
    AnalysisResults, ChiefAnalyst, FundamentalAnalyst, MacroAnalyst, MarketAnalyst, SymbolAnalysis,
    TechnicalAnalyst, TraderAnalyst,
};
use chrono::{Local, NaiveDate, Utc};
use database::Store;
use futures::future::join_all;
use market_data::MarketDataService;

const SECTION_SEPARATOR: &str = "--------------------------------------------------------------------------------";

/// Same-day cache for the macro report. The macro capability must not run
/// more than once per calendar day; the second call gets the cached text.
#[derive(Default)]
pub struct MacroCache {
    state: Mutex<Option<(NaiveDate, String)>>,
}

impl MacroCache {
    pub async fn get_or_run(&self, analyst: &MacroAnalyst) -> String {
        let today = Local::now().date_naive();
        {
            let state = self.state.lock().expect("macro cache poisoned");
            if let Some((date, report)) = state.as_ref() {
                if *date == today {
                    tracing::info!("macro analysis served from same-day cache");
                    return report.clone();
                }
            }
        }

        let report = analyst.analyze().await;
        if !report.starts_with('❌') {
            let mut state = self.state.lock().expect("macro cache poisoned");
            *state = Some((today, report.clone()));
        }
        report
    }
}

/// The analysis service: per-role entry points plus the multi-analyst
/// comprehensive pipeline.
pub struct AnalysisPipeline {
    market_data: Arc<MarketDataService>,
    store: Store,
    pub technical: TechnicalAnalyst,
    pub market: MarketAnalyst,
    pub fundamental: FundamentalAnalyst,
    pub macro_analyst: MacroAnalyst,
    pub chief: ChiefAnalyst,
    pub trader: TraderAnalyst,
    pub macro_cache: MacroCache,
}

impl AnalysisPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_data: Arc<MarketDataService>,
        store: Store,
        technical: TechnicalAnalyst,
        market: MarketAnalyst,
        fundamental: FundamentalAnalyst,
        macro_analyst: MacroAnalyst,
        chief: ChiefAnalyst,
        trader: TraderAnalyst,
    ) -> Self {
        Self {
            market_data,
            store,
            technical,
            market,
            fundamental,
            macro_analyst,
            chief,
            trader,
            macro_cache: MacroCache::default(),
        }
    }

    /// Technical report over the latest klines of one canonical symbol.
    pub async fn technical_report(&self, symbol: &str) -> String {
        let ctx = self.technical_context(symbol).await;
        self.technical.analyze(&ctx).await
    }

    /// Market-sentiment report over the global data sources.
    pub async fn market_sentiment_report(&self) -> String {
        let ctx = self.market_context().await;
        self.market.analyze(&ctx).await
    }

    pub async fn fundamental_report(&self, symbol: &str) -> String {
        let ctx = AnalysisContext::new(symbol);
        self.fundamental.analyze(&ctx).await
    }

    /// Macro report, at most one fresh run per calendar day.
    pub async fn macro_report(&self) -> String {
        self.macro_cache.get_or_run(&self.macro_analyst).await
    }

    /// The full multi-analyst pipeline: per-symbol technical and
    /// fundamental runs fan out while the shared market and macro reports
    /// run alongside; per-symbol chief synthesis follows; the trader
    /// closes with a strategy proposal.
    pub async fn comprehensive_analysis(&self, question: &str, symbols: &[String]) -> String {
        if symbols.is_empty() {
            return "请指定要分析的币种，例如: BTCUSDT, ETHUSDT".to_string();
        }

        tracing::info!(symbols = ?symbols, "starting comprehensive analysis");

        let technical_all = join_all(symbols.iter().map(|s| self.technical_report(s)));
        let fundamental_all = join_all(symbols.iter().map(|s| self.fundamental_report(s)));
        let (technicals, fundamentals, sentiment, macro_report) = tokio::join!(
            technical_all,
            fundamental_all,
            self.market_sentiment_report(),
            self.macro_report(),
        );

        let chiefs = join_all(symbols.iter().enumerate().map(|(i, symbol)| {
            let mut ctx = AnalysisContext::new(symbol);
            ctx.technical_analysis = Some(technicals[i].clone());
            ctx.sentiment_analysis = Some(sentiment.clone());
            ctx.fundamental_analysis_result = Some(fundamentals[i].clone());
            ctx.macro_analysis_result = Some(macro_report.clone());
            async move { self.chief.analyze(&ctx).await }
        }))
        .await;

        let results = assemble_results(
            symbols,
            &technicals,
            &fundamentals,
            &chiefs,
            sentiment,
            macro_report,
        );

        // The trader reads these back as its recent-research history.
        self.persist_chief_records(symbols, &chiefs);

        let trading_analysis = self.trader.conduct_trading_analysis(&results, question).await;

        format!(
            "{}\n\n{SECTION_SEPARATOR}\n\n{}",
            results.research_summary, trading_analysis
        )
    }

    /// Fire-and-forget persistence of the per-symbol chief syntheses.
    fn persist_chief_records(&self, symbols: &[String], chiefs: &[String]) {
        for (symbol, chief) in symbols.iter().zip(chiefs.iter()) {
            if chief.starts_with('❌') {
                continue;
            }
            let store = self.store.clone();
            let record = AnalysisRecord {
                timestamp: Utc::now(),
                agent_name: analysts::roles::CHIEF.to_string(),
                symbol: Some(symbol.clone()),
                content: chief.clone(),
                summary: None,
                data_type: "chief_analysis".to_string(),
            };
            tokio::spawn(async move {
                if let Err(e) = store.save_analysis_record(&record).await {
                    tracing::debug!("failed to persist chief record: {e}");
                }
            });
        }
    }

    async fn technical_context(&self, symbol: &str) -> AnalysisContext {
        let mut ctx = AnalysisContext::new(symbol);
        match self.market_data.collect_kline_data(symbol).await {
            Ok(candles) => {
                // Keep the freshest bar on record for later audits
                if let Some(latest) = candles.last().cloned() {
                    let store = self.store.clone();
                    let symbol = symbol.to_string();
                    tokio::spawn(async move {
                        if let Err(e) = store.save_market_data(&symbol, &[latest]).await {
                            tracing::debug!("failed to persist market data: {e}");
                        }
                    });
                }
                ctx.kline_data.insert(symbol.to_string(), candles);
            }
            Err(e) => tracing::warn!(symbol, "kline fetch failed: {e}"),
        }
        ctx
    }

    async fn market_context(&self) -> AnalysisContext {
        let mut ctx = AnalysisContext::new("MARKET");
        ctx.global_market_data = self.market_data.collect_global_market_data().await.ok();
        ctx.fear_greed_index = self.market_data.get_fear_greed_index().await.ok();
        ctx.trending_coins = self.market_data.collect_trending_data().await.ok();
        ctx.major_coins_performance = self.market_data.collect_major_coins().await.ok();
        ctx
    }
}

/// Fold the per-role outputs into the research package for the trader.
pub fn assemble_results(
    symbols: &[String],
    technicals: &[String],
    fundamentals: &[String],
    chiefs: &[String],
    sentiment: String,
    macro_report: String,
) -> AnalysisResults {
    let mut symbol_analyses = BTreeMap::new();
    for (i, symbol) in symbols.iter().enumerate() {
        symbol_analyses.insert(
            symbol.clone(),
            SymbolAnalysis {
                technical: technicals.get(i).cloned().unwrap_or_default(),
                fundamental: fundamentals.get(i).cloned().unwrap_or_default(),
                chief: chiefs.get(i).cloned().unwrap_or_default(),
            },
        );
    }

    let research_summary = build_research_summary(symbols, &symbol_analyses);

    AnalysisResults {
        symbols: symbols.to_vec(),
        symbol_analyses,
        sentiment_analysis: sentiment,
        macro_analysis: macro_report,
        research_summary,
    }
}

/// Concatenate the per-symbol chief syntheses into one research summary.
pub fn build_research_summary(
    symbols: &[String],
    analyses: &BTreeMap<String, SymbolAnalysis>,
) -> String {
    let mut parts = vec!["🏛️ 研究部门综合报告".to_string()];
    for symbol in symbols {
        let Some(analysis) = analyses.get(symbol) else {
            continue;
        };
        parts.push(format!(
            "\n=== {} 综合分析 ===\n{}",
            analysis_core::display_symbol(symbol),
            analysis.chief
        ));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_carry_exactly_the_input_symbols() {
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let results = assemble_results(
            &symbols,
            &["btc-tech".to_string(), "eth-tech".to_string()],
            &["btc-fund".to_string(), "eth-fund".to_string()],
            &["btc-chief".to_string(), "eth-chief".to_string()],
            "sentiment".to_string(),
            "macro".to_string(),
        );

        let keys: Vec<&String> = results.symbol_analyses.keys().collect();
        assert_eq!(keys, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(results.symbols, symbols);
        assert_eq!(results.symbol_analyses["BTCUSDT"].technical, "btc-tech");
        assert_eq!(results.symbol_analyses["ETHUSDT"].chief, "eth-chief");
    }

    #[test]
    fn research_summary_contains_every_chief_section() {
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let results = assemble_results(
            &symbols,
            &[String::new(), String::new()],
            &[String::new(), String::new()],
            &["BTC 看多结论".to_string(), "ETH 观望结论".to_string()],
            String::new(),
            String::new(),
        );

        assert!(results.research_summary.contains("=== BTC 综合分析 ==="));
        assert!(results.research_summary.contains("BTC 看多结论"));
        assert!(results.research_summary.contains("=== ETH 综合分析 ==="));
        assert!(results.research_summary.contains("ETH 观望结论"));
    }
}
