use anyhow::{Context, Result};
use std::env;
use std::path::Path;

/// Boot-time configuration from environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub database_url: String,
    pub telegram_token: String,
    pub telegram_chat_id: i64,
    pub dynamic_config_path: String,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:crypto_monitor.db?mode=rwc".to_string()),
            telegram_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN not set")?,
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID")
                .context("TELEGRAM_CHAT_ID not set")?
                .parse()
                .context("TELEGRAM_CHAT_ID is not a number")?,
            dynamic_config_path: env::var("DYNAMIC_CONFIG_PATH")
                .unwrap_or_else(|_| "dynamic_config.toml".to_string()),
        })
    }
}

/// Load the first `.env` file found among the candidate paths. Missing
/// files are fine; parse errors are only warned about.
pub fn load_env_file() {
    for candidate in [".env", "../.env", "../../.env"] {
        if Path::new(candidate).exists() {
            match dotenvy::from_path(candidate) {
                Ok(()) => tracing::info!("loaded environment from {candidate}"),
                Err(e) => tracing::warn!("failed to parse {candidate}: {e}"),
            }
            return;
        }
    }
}
