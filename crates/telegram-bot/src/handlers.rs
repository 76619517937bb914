use std::sync::Arc;
use std::time::Duration;

use analysis_core::{display_symbol, normalize_symbol};
use orchestrator::Controller;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;

use crate::{format_account_status, TelegramNotifier};

const POLL_RETRY_ATTEMPTS: u32 = 5;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(30);

const WELCOME: &str = "🤖 **加密货币监控系统**

👋 欢迎！

📊 `/analyze 币种` - 技术分析
💰 点击下方按钮查看账户状态";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "显示欢迎信息")]
    Start,
    #[command(description = "技术分析，例：/analyze BTC")]
    Analyze(String),
}

/// Shared dispatcher state.
#[derive(Clone)]
struct BotState {
    controller: Arc<Controller>,
    notifier: TelegramNotifier,
}

fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
        "💰 账户状态",
        "account_status",
    )]])
}

fn monitor_keyboard(symbol: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[
        InlineKeyboardButton::callback("🔔 开始监控", format!("monitor_start_{symbol}")),
        InlineKeyboardButton::callback("⏹️ 停止监控", format!("monitor_stop_{symbol}")),
    ]])
}

fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[
        InlineKeyboardButton::callback("🔄 刷新", "account_status"),
        InlineKeyboardButton::callback("◀️ 返回", "main_menu"),
    ]])
}

/// Run the long-polling dispatcher. A dropped connection restarts polling
/// with a fixed backoff, up to five attempts, before giving up; the rest
/// of the system keeps running either way.
pub async fn run_bot(bot: Bot, controller: Arc<Controller>, notify_chat: ChatId) {
    let notifier = TelegramNotifier::new(bot.clone(), notify_chat);
    let state = BotState {
        controller,
        notifier: notifier.clone(),
    };

    // Startup notification is best-effort
    if let Err(e) = notifier
        .send_long(
            notify_chat,
            "🚀 **加密货币监控系统已启动**\n\n点击下方按钮查看账户状态",
            Some(main_menu()),
        )
        .await
    {
        tracing::warn!("startup notification failed: {e}");
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_message().endpoint(handle_message));

    for attempt in 1..=POLL_RETRY_ATTEMPTS {
        tracing::info!(attempt, "starting Telegram polling");
        Dispatcher::builder(bot.clone(), handler.clone())
            .dependencies(dptree::deps![state.clone()])
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;

        if attempt < POLL_RETRY_ATTEMPTS {
            tracing::warn!(
                attempt,
                "Telegram polling exited, reconnecting in {}s",
                POLL_RETRY_DELAY.as_secs()
            );
            tokio::time::sleep(POLL_RETRY_DELAY).await;
        }
    }
    tracing::error!("Telegram polling gave up after {POLL_RETRY_ATTEMPTS} attempts");
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: BotState,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, WELCOME)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(main_menu())
                .await?;
        }
        Command::Analyze(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                bot.send_message(
                    msg.chat.id,
                    "❌ 格式错误！\n正确格式：`/analyze 币种`\n例：`/analyze BTC`",
                )
                .parse_mode(ParseMode::Markdown)
                .await?;
                return Ok(());
            }

            let symbol = normalize_symbol(raw);
            let base = display_symbol(&symbol).to_string();
            bot.send_message(msg.chat.id, format!("🔍 正在分析 {base}..."))
                .await?;

            let report = state.controller.technical_report(&symbol).await;
            if report.starts_with('❌') {
                bot.send_message(msg.chat.id, report).await?;
            } else if let Err(e) = state
                .notifier
                .send_long(
                    msg.chat.id,
                    &format!("📊 **{base} 技术分析**\n\n{report}"),
                    Some(monitor_keyboard(&symbol)),
                )
                .await
            {
                tracing::warn!("failed to deliver analysis: {e}");
            }
        }
    }
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: BotState) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    if data == "main_menu" {
        bot.edit_message_text(chat_id, message_id, WELCOME)
            .parse_mode(ParseMode::Markdown)
            .reply_markup(main_menu())
            .await?;
    } else if data == "account_status" {
        let balance = state.controller.account_balance().await;
        let positions = state.controller.current_positions().await;
        let card = format_account_status(&balance, &positions);

        bot.edit_message_text(chat_id, message_id, card)
            .parse_mode(ParseMode::Markdown)
            .reply_markup(back_keyboard())
            .await?;
    } else if let Some(symbol) = data.strip_prefix("monitor_start_") {
        let outcome = state.controller.start_symbol_monitor(symbol, 30);
        let (text, keyboard) = if outcome.success {
            (
                format!("✅ {}\n\n每30分钟自动分析并推送", outcome.message),
                InlineKeyboardMarkup::new([[InlineKeyboardButton::callback(
                    "⏹️ 停止监控",
                    format!("monitor_stop_{symbol}"),
                )]]),
            )
        } else {
            (format!("⚠️ {}", outcome.message), back_keyboard())
        };
        bot.edit_message_text(chat_id, message_id, text)
            .reply_markup(keyboard)
            .await?;
    } else if let Some(symbol) = data.strip_prefix("monitor_stop_") {
        let outcome = state.controller.stop_symbol_monitor(symbol);
        let prefix = if outcome.success { "✅" } else { "⚠️" };
        bot.edit_message_text(chat_id, message_id, format!("{prefix} {}", outcome.message))
            .reply_markup(back_keyboard())
            .await?;
    }

    Ok(())
}

/// Free-form text goes to the master brain.
async fn handle_message(bot: Bot, msg: Message, state: BotState) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let chat_id = msg.chat.id;
    tracing::info!(chat_id = chat_id.0, "forwarding message to master brain");
    bot.send_message(chat_id, "💭 正在处理您的消息...").await?;

    let response = state
        .controller
        .process_user_message(text, &chat_id.0.to_string(), "telegram")
        .await;

    if response.is_empty() {
        bot.send_message(chat_id, "未收到响应，请重试").await?;
    } else if let Err(e) = state
        .notifier
        .send_long(chat_id, &format!("🤖 **AI Response:**\n\n{response}"), None)
        .await
    {
        tracing::warn!("failed to deliver brain response: {e}");
    }
    Ok(())
}
