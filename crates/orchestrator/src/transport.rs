use async_trait::async_trait;

/// Outbound chat channel used by monitors, the scheduler and the
/// notification capability. The Telegram bot implements this; tests plug
/// in an in-memory recorder.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(&self, text: &str) -> anyhow::Result<()>;

    fn name(&self) -> &str;
}
