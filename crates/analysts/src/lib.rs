pub mod chief;
pub mod fundamental;
pub mod market;
pub mod macro_analyst;
pub mod prompts;
pub mod technical;
pub mod trader;

pub use chief::ChiefAnalyst;
pub use fundamental::FundamentalAnalyst;
pub use market::MarketAnalyst;
pub use macro_analyst::MacroAnalyst;
pub use technical::TechnicalAnalyst;
pub use trader::{AnalysisResults, SymbolAnalysis, TraderAnalyst};

/// Role names, used for LLM routing, logging and persisted records.
pub mod roles {
    pub const TECHNICAL: &str = "技术分析师";
    pub const MARKET: &str = "市场分析师";
    pub const FUNDAMENTAL: &str = "基本面分析师";
    pub const MACRO: &str = "宏观分析师";
    pub const CHIEF: &str = "首席分析师";
    pub const TRADER: &str = "永续交易员";
    pub const MASTER_BRAIN: &str = "智能主脑";
    pub const SUMMARIZER: &str = "对话概要";
}
