use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Message roles in a chat session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "user" => ChatRole::User,
            "assistant" => ChatRole::Assistant,
            _ => ChatRole::System,
        }
    }
}

/// One persisted row of a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub chat_id: String,
    pub role: ChatRole,
    pub content: String,
    pub round_number: i64,
    pub is_summary: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// Persisted analyst output, used both as an audit trail and as the
/// "recent research" input to the trader role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub symbol: Option<String>,
    pub content: String,
    pub summary: Option<String>,
    pub data_type: String,
}

/// Snapshot of one active symbol monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub symbol: String,
    pub interval_minutes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_role_round_trip() {
        for role in [ChatRole::User, ChatRole::Assistant, ChatRole::System] {
            assert_eq!(ChatRole::from_str(role.as_str()), role);
        }
    }

    #[test]
    fn unknown_role_defaults_to_system() {
        assert_eq!(ChatRole::from_str("tool"), ChatRole::System);
    }
}
