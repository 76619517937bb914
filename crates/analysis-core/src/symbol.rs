/// Normalize user input into the canonical `<BASE>USDT` trading pair.
///
/// Uppercases the input and appends the `USDT` quote suffix when missing.
/// Idempotent: applying it to an already-canonical symbol is a no-op.
pub fn normalize_symbol(input: &str) -> String {
    let upper = input.trim().to_uppercase();
    if upper.ends_with("USDT") {
        upper
    } else {
        format!("{upper}USDT")
    }
}

/// Strip the quote suffix for display ("BTCUSDT" -> "BTC").
pub fn display_symbol(symbol: &str) -> &str {
    symbol.strip_suffix("USDT").unwrap_or(symbol)
}

/// A symbol is well-formed when it is uppercase and carries the USDT suffix.
pub fn is_canonical(symbol: &str) -> bool {
    symbol.ends_with("USDT")
        && symbol.len() > 4
        && symbol.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_quote_suffix() {
        assert_eq!(normalize_symbol("btc"), "BTCUSDT");
        assert_eq!(normalize_symbol("Eth"), "ETHUSDT");
    }

    #[test]
    fn keeps_canonical_symbols() {
        assert_eq!(normalize_symbol("BTCUSDT"), "BTCUSDT");
        assert_eq!(normalize_symbol("solusdt"), "SOLUSDT");
    }

    #[test]
    fn idempotent() {
        for raw in ["btc", "BTCUSDT", "doge", "1000pepe"] {
            let once = normalize_symbol(raw);
            assert_eq!(normalize_symbol(&once), once);
        }
    }

    #[test]
    fn display_strips_suffix() {
        assert_eq!(display_symbol("BTCUSDT"), "BTC");
        assert_eq!(display_symbol("BTC"), "BTC");
    }

    #[test]
    fn canonical_check() {
        assert!(is_canonical("BTCUSDT"));
        assert!(is_canonical("1000SHIBUSDT"));
        assert!(!is_canonical("btcusdt"));
        assert!(!is_canonical("USDT"));
        assert!(!is_canonical("BTC"));
    }
}
