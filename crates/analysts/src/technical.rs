use std::sync::Arc;

use analysis_core::AnalysisContext;
use llm_client::LlmClient;
use technical_analysis::{indicator_snapshot, IndicatorRow};

use crate::{prompts, roles};

/// Technical analyst: indicator table over the latest klines.
pub struct TechnicalAnalyst {
    llm: Arc<dyn LlmClient>,
    kline_period: String,
}

impl TechnicalAnalyst {
    pub fn new(llm: Arc<dyn LlmClient>, kline_period: impl Into<String>) -> Self {
        Self {
            llm,
            kline_period: kline_period.into(),
        }
    }

    /// Reads `ctx.kline_data[target_symbol]`; requires at least 50 candles.
    pub async fn analyze(&self, ctx: &AnalysisContext) -> String {
        if !ctx.has_kline_data() {
            return format!("❌ 无法获取{}的K线数据", ctx.target_symbol);
        }

        let klines = ctx.target_klines();
        if klines.len() < 50 {
            return format!("❌ 数据不足，仅有{}条数据（需要至少50条）", klines.len());
        }

        let rows = indicator_snapshot(klines, 10);
        let user_message = format_technical_message(&ctx.target_symbol, &self.kline_period, &rows);

        match self
            .llm
            .call(prompts::TECHNICAL_ANALYST, Some(&user_message), roles::TECHNICAL)
            .await
        {
            Ok(report) => report,
            Err(e) => format!("❌ 技术分析失败: {e}"),
        }
    }
}

/// Tabular snapshot of the last complete indicator rows.
pub fn format_technical_message(symbol: &str, period: &str, rows: &[IndicatorRow]) -> String {
    let mut parts = vec![
        format!("请分析{symbol}的{period}K线数据：\n"),
        format!("最近{}个周期的技术指标数据：", rows.len()),
        "时间戳(time)、开盘价(open)、最高价(high)、最低价(low)、收盘价(close)、成交量(volume)".to_string(),
        "20期简单移动平均线(sma_20)、50期简单移动平均线(sma_50)".to_string(),
        "相对强弱指数RSI(rsi)、MACD线(macd)、MACD信号线(macd_signal)\n".to_string(),
    ];

    for row in rows {
        parts.push(format!(
            "时间:{} | 开盘:{:.4} | 最高:{:.4} | 最低:{:.4} | 收盘:{:.4} | 成交量:{:.0} | SMA20:{:.4} | SMA50:{:.4} | RSI:{:.2} | MACD:{:.4} | 信号线:{:.4}",
            row.timestamp.format("%Y-%m-%d %H:%M"),
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume,
            row.sma_20,
            row.sma_50,
            row.rsi,
            row.macd,
            row.macd_signal,
        ));
    }

    parts.push("\n请保持简洁专业，重点关注短期走势。".to_string());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Candle;
    use chrono::{Duration, Utc};

    fn candles(len: usize) -> Vec<Candle> {
        let start = Utc::now() - Duration::minutes(15 * len as i64);
        (0..len)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.5).sin() * 3.0;
                Candle {
                    timestamp: start + Duration::minutes(15 * i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 500.0,
                }
            })
            .collect()
    }

    #[test]
    fn message_mentions_every_indicator() {
        let rows = indicator_snapshot(&candles(80), 10);
        let message = format_technical_message("BTCUSDT", "15m", &rows);

        assert!(message.contains("BTCUSDT"));
        assert!(message.contains("SMA20"));
        assert!(message.contains("SMA50"));
        assert!(message.contains("RSI"));
        assert!(message.contains("MACD"));
        assert_eq!(message.matches("时间:").count(), 10);
    }
}
