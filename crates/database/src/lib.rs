use analysis_core::{AnalysisRecord, ChatMessage, ChatRole};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// SQLite-backed store for chat sessions, analyst outputs, market data
/// snapshots and trigger events.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

type ChatRow = (
    String,
    String,
    String,
    i64,
    i64,
    Option<String>,
    i64,
    String,
);

type RecordRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
);

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                round_number INTEGER NOT NULL,
                is_summary INTEGER NOT NULL DEFAULT 0,
                metadata TEXT,
                archived INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS analysis_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                symbol TEXT,
                content TEXT NOT NULL,
                summary TEXT,
                data_type TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS market_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trigger_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                symbol TEXT,
                event_type TEXT NOT NULL,
                description TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_chat
             ON chat_messages (chat_id, round_number)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // -- chat messages -------------------------------------------------------

    pub async fn save_chat_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
        round_number: i64,
        is_summary: bool,
        metadata: Option<&serde_json::Value>,
    ) -> Result<()> {
        let metadata_json = metadata.map(|m| m.to_string());
        sqlx::query(
            "INSERT INTO chat_messages
             (chat_id, role, content, round_number, is_summary, metadata, archived, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(chat_id)
        .bind(role.as_str())
        .bind(content)
        .bind(round_number)
        .bind(is_summary as i64)
        .bind(metadata_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Highest round number seen for this chat (archived rows included).
    pub async fn get_chat_round_count(&self, chat_id: &str) -> Result<i64> {
        let row: (Option<i64>,) = sqlx::query_as(
            "SELECT MAX(round_number) FROM chat_messages WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.unwrap_or(0))
    }

    /// Latest `limit` non-archived messages, returned in chronological
    /// order.
    pub async fn get_chat_history(&self, chat_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT chat_id, role, content, round_number, is_summary, metadata, archived, created_at
             FROM chat_messages
             WHERE chat_id = ? AND archived = 0
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<ChatMessage> = rows.into_iter().map(row_to_message).collect();
        messages.reverse();
        Ok(messages)
    }

    /// All messages in the round range, archived or not.
    pub async fn get_chat_messages_by_rounds(
        &self,
        chat_id: &str,
        round_start: i64,
        round_end: i64,
    ) -> Result<Vec<ChatMessage>> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT chat_id, role, content, round_number, is_summary, metadata, archived, created_at
             FROM chat_messages
             WHERE chat_id = ? AND round_number BETWEEN ? AND ? AND is_summary = 0
             ORDER BY id ASC",
        )
        .bind(chat_id)
        .bind(round_start)
        .bind(round_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    /// Mark the rounds as archived; summary rows are left visible.
    pub async fn archive_chat_messages(
        &self,
        chat_id: &str,
        round_start: i64,
        round_end: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE chat_messages SET archived = 1
             WHERE chat_id = ? AND round_number BETWEEN ? AND ? AND is_summary = 0",
        )
        .bind(chat_id)
        .bind(round_start)
        .bind(round_end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // -- analysis records ----------------------------------------------------

    pub async fn save_analysis_record(&self, record: &AnalysisRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO analysis_records (timestamp, agent_name, symbol, content, summary, data_type)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.agent_name)
        .bind(&record.symbol)
        .bind(&record.content)
        .bind(&record.summary)
        .bind(&record.data_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest records, optionally filtered by data type and agent name.
    pub async fn get_analysis_records(
        &self,
        data_type: Option<&str>,
        agent_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<AnalysisRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT timestamp, agent_name, symbol, content, summary, data_type
             FROM analysis_records
             WHERE (?1 IS NULL OR data_type = ?1)
               AND (?2 IS NULL OR agent_name = ?2)
             ORDER BY id DESC
             LIMIT ?3",
        )
        .bind(data_type)
        .bind(agent_name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(timestamp, agent_name, symbol, content, summary, data_type)| AnalysisRecord {
                timestamp: parse_timestamp(&timestamp),
                agent_name,
                symbol,
                content,
                summary,
                data_type,
            })
            .collect())
    }

    // -- market data & trigger events ---------------------------------------

    pub async fn save_market_data(
        &self,
        symbol: &str,
        candles: &[analysis_core::Candle],
    ) -> Result<()> {
        for candle in candles {
            sqlx::query(
                "INSERT INTO market_data (symbol, timestamp, open, high, low, close, volume)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(symbol)
            .bind(candle.timestamp.to_rfc3339())
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn save_trigger_event(
        &self,
        symbol: Option<&str>,
        event_type: &str,
        description: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO trigger_events (timestamp, symbol, event_type, description)
             VALUES (?, ?, ?, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(symbol)
        .bind(event_type)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn database_stats(&self) -> Result<serde_json::Value> {
        let mut stats = serde_json::Map::new();
        for table in [
            "chat_messages",
            "analysis_records",
            "market_data",
            "trigger_events",
        ] {
            let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            stats.insert(table.to_string(), serde_json::json!(row.0));
        }
        Ok(serde_json::Value::Object(stats))
    }
}

fn row_to_message(row: ChatRow) -> ChatMessage {
    let (chat_id, role, content, round_number, is_summary, metadata, archived, created_at) = row;
    ChatMessage {
        chat_id,
        role: ChatRole::from_str(&role),
        content,
        round_number,
        is_summary: is_summary != 0,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        archived: archived != 0,
        created_at: parse_timestamp(&created_at),
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
