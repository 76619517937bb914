//! Parser for the `FUNCTION_CALL:` directive grammar emitted by the LLM.
//!
//! `name(key=value, key=[v1, v2], key="quoted")` — values are quoted
//! strings, bracketed lists, or bare tokens. A small explicit scanner, no
//! regex, so nested quotes and brackets behave predictably.

use std::collections::HashMap;

/// One parsed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    List(Vec<String>),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            ArgValue::List(_) => None,
        }
    }

    /// Scalar or single-element view as a list; a scalar becomes a
    /// one-element list so handlers can accept either form.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            ArgValue::Str(s) => vec![s.clone()],
            ArgValue::List(items) => items.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_str().and_then(|s| s.parse().ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_str().and_then(|s| s.parse().ok())
    }
}

/// A directive call: function name plus keyword arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub name: String,
    pub args: HashMap<String, ArgValue>,
}

impl ParsedCall {
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(ArgValue::as_str)
    }

    pub fn list_arg(&self, key: &str) -> Option<Vec<String>> {
        self.args.get(key).map(ArgValue::as_list)
    }
}

/// Parse the text after `FUNCTION_CALL:`. Returns None when the text is
/// not of the form `name(...)`.
pub fn parse_directive(call: &str) -> Option<ParsedCall> {
    let call = call.trim();
    let open = call.find('(')?;
    let name = call[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let close = call.rfind(')')?;
    if close < open {
        return None;
    }
    let body = &call[open + 1..close];

    let mut args = HashMap::new();
    let mut chars = body.chars().peekable();

    loop {
        skip_whitespace(&mut chars);
        if chars.peek().is_none() {
            break;
        }

        // key
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            if c == ',' {
                // stray token without '=': skip it
                chars.next();
                key.clear();
                skip_whitespace(&mut chars);
                continue;
            }
            key.push(c);
            chars.next();
        }
        if chars.next().is_none() {
            break; // no '=' — trailing garbage
        }
        let key = key.trim().to_string();

        skip_whitespace(&mut chars);
        let value = match chars.peek() {
            Some('[') => {
                chars.next();
                let mut items = Vec::new();
                let mut current = String::new();
                for c in chars.by_ref() {
                    match c {
                        ']' => break,
                        ',' => {
                            items.push(strip_quotes(current.trim()).to_string());
                            current.clear();
                        }
                        _ => current.push(c),
                    }
                }
                if !current.trim().is_empty() {
                    items.push(strip_quotes(current.trim()).to_string());
                }
                items.retain(|item| !item.is_empty());
                ArgValue::List(items)
            }
            Some(&quote) if quote == '"' || quote == '\'' => {
                chars.next();
                let mut value = String::new();
                let mut escaped = false;
                for c in chars.by_ref() {
                    if escaped {
                        value.push(c);
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        break;
                    } else {
                        value.push(c);
                    }
                }
                ArgValue::Str(value)
            }
            _ => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                ArgValue::Str(strip_quotes(value.trim()).to_string())
            }
        };

        if !key.is_empty() {
            args.insert(key, value);
        }

        // consume the separator between arguments
        skip_whitespace(&mut chars);
        if let Some(&c) = chars.peek() {
            if c == ',' {
                chars.next();
            }
        }
    }

    Some(ParsedCall {
        name: name.to_string(),
        args,
    })
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_and_list_args() {
        let call = parse_directive(r#"comprehensive_analysis(question="现在适合进场吗", symbols=[BTCUSDT, ETHUSDT])"#)
            .unwrap();
        assert_eq!(call.name, "comprehensive_analysis");
        assert_eq!(call.str_arg("question"), Some("现在适合进场吗"));
        assert_eq!(
            call.list_arg("symbols").unwrap(),
            vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
        );
    }

    #[test]
    fn parses_bare_tokens() {
        let call = parse_directive("start_symbol_monitor(symbol=BTCUSDT, interval_minutes=30)").unwrap();
        assert_eq!(call.str_arg("symbol"), Some("BTCUSDT"));
        assert_eq!(call.args["interval_minutes"].as_u64(), Some(30));
    }

    #[test]
    fn list_items_are_trimmed_and_unquoted() {
        let call =
            parse_directive(r#"set_monitoring_symbols(primary_symbols=[ "BTCUSDT" , 'ETHUSDT', SOLUSDT ])"#)
                .unwrap();
        assert_eq!(
            call.list_arg("primary_symbols").unwrap(),
            vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]
        );
    }

    #[test]
    fn quoted_strings_keep_commas_and_parens() {
        let call = parse_directive(r#"send_telegram_notification(message="BTC 涨了 5%, 注意风险 (测试)")"#)
            .unwrap();
        assert_eq!(
            call.str_arg("message"),
            Some("BTC 涨了 5%, 注意风险 (测试)")
        );
    }

    #[test]
    fn escaped_quotes_are_unescaped() {
        let call = parse_directive(r#"send_telegram_notification(message="he said \"go\"")"#).unwrap();
        assert_eq!(call.str_arg("message"), Some(r#"he said "go""#));
    }

    #[test]
    fn no_args_and_empty_parens() {
        let call = parse_directive("get_system_status()").unwrap();
        assert_eq!(call.name, "get_system_status");
        assert!(call.args.is_empty());
    }

    #[test]
    fn missing_key_is_none() {
        let call = parse_directive("technical_analysis(symbol=BTCUSDT)").unwrap();
        assert_eq!(call.str_arg("question"), None);
    }

    #[test]
    fn scalar_coerces_to_single_element_list() {
        let call = parse_directive("get_market_data(symbols=BTCUSDT)").unwrap();
        assert_eq!(call.list_arg("symbols").unwrap(), vec!["BTCUSDT"]);
    }

    #[test]
    fn rejects_non_call_text() {
        assert!(parse_directive("not a function call").is_none());
        assert!(parse_directive("()").is_none());
        assert!(parse_directive("bad name(x=1)").is_none());
    }
}
