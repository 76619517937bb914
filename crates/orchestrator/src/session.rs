use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use analysis_core::ChatRole;
use analysts::{prompts, roles};
use database::Store;
use llm_client::LlmClient;

/// How many rounds accumulate before the earliest four are summarized.
const COMPRESS_AFTER_ROUNDS: i64 = 5;
const COMPRESS_ROUND_START: i64 = 1;
const COMPRESS_ROUND_END: i64 = 4;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub content: String,
}

/// Per-chat conversation log with asynchronous history compression.
///
/// Rounds: a user message opens round N+1; the assistant (or system) reply
/// stays on the current round. Once five rounds accumulate, a background
/// task replaces rounds 1–4 with one summary row.
pub struct SessionStore {
    store: Store,
    llm: Arc<dyn LlmClient>,
    cache: Arc<Mutex<HashMap<String, Vec<HistoryEntry>>>>,
    compressing: Arc<Mutex<HashSet<String>>>,
}

impl SessionStore {
    pub fn new(store: Store, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            store,
            llm,
            cache: Arc::new(Mutex::new(HashMap::new())),
            compressing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Persist one message, assign its round number, and kick the
    /// compression check. Returns the assigned round.
    pub async fn add_message(
        &self,
        chat_id: &str,
        role: ChatRole,
        content: &str,
        metadata: Option<&serde_json::Value>,
    ) -> anyhow::Result<i64> {
        let current = self.store.get_chat_round_count(chat_id).await?;
        let round = match role {
            ChatRole::User => current + 1,
            _ => current.max(1),
        };

        self.store
            .save_chat_message(chat_id, role, content, round, false, metadata)
            .await?;

        {
            let mut cache = self.cache.lock().expect("session cache poisoned");
            if let Some(entries) = cache.get_mut(chat_id) {
                entries.push(HistoryEntry {
                    role,
                    content: content.to_string(),
                });
            }
        }

        tracing::debug!(chat_id, round, role = role.as_str(), "chat message saved");

        if round >= COMPRESS_AFTER_ROUNDS {
            self.spawn_compression(chat_id, round);
        }
        Ok(round)
    }

    /// Latest `limit` messages in chronological order, cached per chat.
    pub async fn get_history(&self, chat_id: &str, limit: usize) -> Vec<HistoryEntry> {
        {
            let cache = self.cache.lock().expect("session cache poisoned");
            if let Some(entries) = cache.get(chat_id) {
                let skip = entries.len().saturating_sub(limit);
                return entries[skip..].to_vec();
            }
        }

        let entries: Vec<HistoryEntry> = match self.store.get_chat_history(chat_id, limit as i64).await
        {
            Ok(messages) => messages
                .into_iter()
                .map(|m| HistoryEntry {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(chat_id, "failed to load chat history: {e}");
                return Vec::new();
            }
        };

        self.cache
            .lock()
            .expect("session cache poisoned")
            .insert(chat_id.to_string(), entries.clone());
        entries
    }

    pub fn clear_cache(&self, chat_id: Option<&str>) {
        let mut cache = self.cache.lock().expect("session cache poisoned");
        match chat_id {
            Some(id) => {
                cache.remove(id);
            }
            None => cache.clear(),
        }
    }

    pub async fn session_stats(&self, chat_id: &str) -> serde_json::Value {
        let round_count = self.store.get_chat_round_count(chat_id).await.unwrap_or(0);
        let cached = self
            .cache
            .lock()
            .expect("session cache poisoned")
            .contains_key(chat_id);
        serde_json::json!({
            "chat_id": chat_id,
            "round_count": round_count,
            "cached": cached,
        })
    }

    /// At most one in-flight compression per chat. The task holds only the
    /// chat id and re-reads fresh rows.
    fn spawn_compression(&self, chat_id: &str, current_round: i64) {
        {
            let mut compressing = self.compressing.lock().expect("compress set poisoned");
            if !compressing.insert(chat_id.to_string()) {
                return;
            }
        }

        let store = self.store.clone();
        let llm = Arc::clone(&self.llm);
        let cache = Arc::clone(&self.cache);
        let compressing = Arc::clone(&self.compressing);
        let chat_id = chat_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = compress_task(&store, llm.as_ref(), &cache, &chat_id, current_round).await
            {
                tracing::warn!(chat_id, "history compression failed: {e}");
            }
            compressing
                .lock()
                .expect("compress set poisoned")
                .remove(&chat_id);
        });
    }
}

async fn compress_task(
    store: &Store,
    llm: &dyn LlmClient,
    cache: &Mutex<HashMap<String, Vec<HistoryEntry>>>,
    chat_id: &str,
    current_round: i64,
) -> anyhow::Result<()> {
    let messages = store
        .get_chat_messages_by_rounds(chat_id, COMPRESS_ROUND_START, COMPRESS_ROUND_END)
        .await?;
    let fresh: Vec<_> = messages.into_iter().filter(|m| !m.archived).collect();
    if fresh.is_empty() {
        return Ok(());
    }

    let conversation_text = fresh
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let summary = llm
        .call(
            &prompts::summary_prompt(&conversation_text),
            None,
            roles::SUMMARIZER,
        )
        .await
        .map_err(|e| anyhow::anyhow!("summarization call failed: {e}"))?;

    store
        .save_chat_message(
            chat_id,
            ChatRole::System,
            &format!("[历史对话概要] {summary}"),
            current_round,
            true,
            None,
        )
        .await?;
    store
        .archive_chat_messages(chat_id, COMPRESS_ROUND_START, COMPRESS_ROUND_END)
        .await?;

    cache.lock().expect("session cache poisoned").remove(chat_id);
    tracing::info!(chat_id, "chat rounds 1-4 compressed into summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::AnalysisError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct MockLlm;

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn call(
            &self,
            _system: &str,
            _user: Option<&str>,
            _agent: &str,
        ) -> Result<String, AnalysisError> {
            Ok("用户询问了行情并完成了两次技术分析。".to_string())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    async fn session() -> (Arc<SessionStore>, Store) {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let session = Arc::new(SessionStore::new(store.clone(), Arc::new(MockLlm)));
        (session, store)
    }

    async fn wait_for_compression(store: &Store, chat_id: &str) {
        for _ in 0..200 {
            let rows = store
                .get_chat_messages_by_rounds(chat_id, 1, 4)
                .await
                .unwrap();
            if !rows.is_empty() && rows.iter().all(|m| m.archived) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("compression did not complete");
    }

    #[tokio::test]
    async fn round_numbering_alternates() {
        let (session, store) = session().await;

        assert_eq!(
            session
                .add_message("c1", ChatRole::User, "q1", None)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            session
                .add_message("c1", ChatRole::Assistant, "a1", None)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            session
                .add_message("c1", ChatRole::User, "q2", None)
                .await
                .unwrap(),
            2
        );

        assert_eq!(store.get_chat_round_count("c1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn fifth_user_round_triggers_compression() {
        let (session, store) = session().await;

        for round in 1..=4 {
            session
                .add_message("c1", ChatRole::User, &format!("q{round}"), None)
                .await
                .unwrap();
            session
                .add_message("c1", ChatRole::Assistant, &format!("a{round}"), None)
                .await
                .unwrap();
        }
        assert_eq!(store.get_chat_round_count("c1").await.unwrap(), 4);

        // Ninth message: the fifth user round
        session
            .add_message("c1", ChatRole::User, "q5", None)
            .await
            .unwrap();
        assert_eq!(store.get_chat_round_count("c1").await.unwrap(), 5);

        wait_for_compression(&store, "c1").await;

        // One visible summary row plus the live round
        let history = store.get_chat_history("c1", 10).await.unwrap();
        let summaries: Vec<_> = history.iter().filter(|m| m.is_summary).collect();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].content.starts_with("[历史对话概要] "));
        assert_eq!(summaries[0].round_number, 5);
        assert!(history.iter().all(|m| m.is_summary || m.round_number >= 5));
    }

    #[tokio::test]
    async fn compression_is_not_repeated() {
        let (session, store) = session().await;

        for round in 1..=5 {
            session
                .add_message("c1", ChatRole::User, &format!("q{round}"), None)
                .await
                .unwrap();
            session
                .add_message("c1", ChatRole::Assistant, &format!("a{round}"), None)
                .await
                .unwrap();
        }
        wait_for_compression(&store, "c1").await;

        // Further appends stay above the trigger but rounds 1-4 are gone;
        // no second summary row may appear.
        session
            .add_message("c1", ChatRole::User, "q6", None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let history = store.get_chat_history("c1", 50).await.unwrap();
        assert_eq!(history.iter().filter(|m| m.is_summary).count(), 1);
    }

    #[tokio::test]
    async fn history_reads_through_cache() {
        let (session, _store) = session().await;

        session
            .add_message("c1", ChatRole::User, "hello", None)
            .await
            .unwrap();
        session
            .add_message("c1", ChatRole::Assistant, "hi", None)
            .await
            .unwrap();

        let history = session.get_history("c1", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello");

        // Cached entries respect the limit
        let limited = session.get_history("c1", 1).await;
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].content, "hi");
    }
}
