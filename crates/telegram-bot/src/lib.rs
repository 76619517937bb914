mod format;
mod handlers;

pub use format::{format_account_status, split_message};
pub use handlers::run_bot;

use std::time::Duration;

use async_trait::async_trait;
use orchestrator::ChatTransport;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};

/// Telegram chunking threshold; replies longer than this are split at
/// newline boundaries.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Push-side Telegram channel bound to the configured operator chat.
/// Monitors and the scheduler publish through this; the dispatcher in
/// `handlers` covers the receive side.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    /// Send one (possibly long) message: chunked, Markdown first with a
    /// plain-text retry, one second between chunks.
    pub async fn send_long(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> anyhow::Result<()> {
        let parts = split_message(text, MAX_MESSAGE_LEN);
        let last = parts.len().saturating_sub(1);

        for (i, part) in parts.iter().enumerate() {
            let body = if i == 0 {
                part.clone()
            } else {
                format!("📄 **续：** {part}")
            };
            // Only the final chunk carries the keyboard
            let keyboard = (i == last).then(|| keyboard.clone()).flatten();
            self.send_chunk(chat_id, &body, keyboard).await?;

            if i < last {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        Ok(())
    }

    async fn send_chunk(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> anyhow::Result<()> {
        let mut request = self
            .bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Markdown);
        if let Some(keyboard) = keyboard.clone() {
            request = request.reply_markup(keyboard);
        }

        if let Err(markdown_err) = request.await {
            // Markdown can fail on unbalanced markers in LLM output;
            // retry once as plain text.
            tracing::debug!("markdown send failed, retrying plain: {markdown_err}");
            let mut request = self.bot.send_message(chat_id, text);
            if let Some(keyboard) = keyboard {
                request = request.reply_markup(keyboard);
            }
            request.await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramNotifier {
    async fn send_message(&self, text: &str) -> anyhow::Result<()> {
        self.send_long(self.chat_id, text, None).await
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
