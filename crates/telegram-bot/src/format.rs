use chrono::Local;

/// Split a long reply at newline boundaries so every chunk fits under
/// `max_len`. A single overlong line becomes its own chunk.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for line in text.split('\n') {
        if !current.is_empty() && current.len() + line.len() + 1 > max_len {
            parts.push(current.trim_end().to_string());
            current = String::new();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        parts.push(current.trim_end().to_string());
    }
    parts
}

/// Render the account-status card: balance line plus a positions table.
pub fn format_account_status(
    balance: &serde_json::Value,
    positions: &serde_json::Value,
) -> String {
    let mut status = format!(
        "💰 **账户状态**\n⏰ {}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    if balance["success"].as_bool() == Some(true) {
        status.push_str(&format!(
            "总额 `${:.2}` | 可用 `${:.2}` | 盈亏 `${:.2}`\n\n",
            balance["total_wallet_balance"].as_f64().unwrap_or(0.0),
            balance["available_balance"].as_f64().unwrap_or(0.0),
            balance["total_unrealized_profit"].as_f64().unwrap_or(0.0),
        ));
    } else {
        status.push_str("❌ 余额获取失败\n\n");
    }

    let position_rows = positions["positions"].as_array();
    match position_rows {
        Some(rows) if !rows.is_empty() && positions["success"].as_bool() == Some(true) => {
            status.push_str("```\n");
            status.push_str("币种      价值     开仓价      盈亏\n");
            status.push_str("-----------------------------------\n");
            for pos in rows {
                let amount = pos["position_amt"].as_f64().unwrap_or(0.0);
                let mark = pos["mark_price"].as_f64().unwrap_or(0.0);
                let entry = pos["entry_price"].as_f64().unwrap_or(0.0);
                let pnl = pos["unrealized_profit"].as_f64().unwrap_or(0.0);
                let direction = if amount > 0.0 { "🟢" } else { "🔴" };
                let base = pos["symbol"]
                    .as_str()
                    .map(analysis_core::display_symbol)
                    .unwrap_or("?");
                let name: String = base.chars().take(6).collect();
                let sign = if pnl > 0.0 { "+" } else { "" };

                status.push_str(&format!(
                    "{direction}{name:<6} ${:6.0} ${entry:7.2} {sign}${pnl:5.2}\n",
                    amount.abs() * mark,
                ));
            }
            status.push_str("```");
        }
        _ => status.push_str("无持仓"),
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_messages_stay_whole() {
        let parts = split_message("hello\nworld", 4000);
        assert_eq!(parts, vec!["hello\nworld"]);
    }

    #[test]
    fn long_messages_split_at_newlines() {
        let line = "x".repeat(120);
        let text = (0..10).map(|_| line.clone()).collect::<Vec<_>>().join("\n");

        let parts = split_message(&text, 500);
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= 500);
            // No line is cut in the middle
            for piece in part.split('\n') {
                assert_eq!(piece.len(), 120);
            }
        }
    }

    #[test]
    fn chunks_preserve_all_content() {
        let text = (0..200)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let parts = split_message(&text, 300);
        let rejoined = parts.join("\n");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn account_card_shows_balance_and_positions() {
        let balance = json!({
            "success": true,
            "total_wallet_balance": 1000.0,
            "available_balance": 800.0,
            "total_unrealized_profit": -12.5,
        });
        let positions = json!({
            "success": true,
            "positions": [{
                "symbol": "BTCUSDT",
                "position_amt": 0.5,
                "entry_price": 40000.0,
                "mark_price": 41000.0,
                "unrealized_profit": 500.0,
            }],
        });

        let card = format_account_status(&balance, &positions);
        assert!(card.contains("账户状态"));
        assert!(card.contains("$1000.00"));
        assert!(card.contains("🟢BTC"));
        assert!(card.contains("+$500.00"));
    }

    #[test]
    fn account_card_degrades_on_errors() {
        let card = format_account_status(
            &json!({"error": "合约客户端未初始化"}),
            &json!({"error": "合约客户端未初始化"}),
        );
        assert!(card.contains("❌ 余额获取失败"));
        assert!(card.contains("无持仓"));
    }
}
