use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Static system identity, reported by `get_system_status`.
#[derive(Debug, Clone, Serialize)]
pub struct SystemConfig {
    pub name: String,
    pub version: String,
    pub mode: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "CoinSentinel".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: "standby".to_string(),
        }
    }
}

/// LLM provider name per analyst role. Unknown names fall back to the
/// default provider at resolution time.
#[derive(Debug, Clone)]
pub struct RoleProviders {
    pub technical: String,
    pub market: String,
    pub fundamental: String,
    pub macro_analyst: String,
    pub chief: String,
    pub trader: String,
}

impl Default for RoleProviders {
    fn default() -> Self {
        Self {
            technical: "doubao".to_string(),
            market: "doubao".to_string(),
            fundamental: "doubao".to_string(),
            macro_analyst: "doubao".to_string(),
            chief: "claude".to_string(),
            trader: "claude".to_string(),
        }
    }
}

impl RoleProviders {
    /// Override per-role providers from `LLM_PROVIDER_<ROLE>` env vars.
    pub fn from_env() -> Self {
        let mut providers = Self::default();
        let overrides = [
            ("LLM_PROVIDER_TECHNICAL", &mut providers.technical),
            ("LLM_PROVIDER_MARKET", &mut providers.market),
            ("LLM_PROVIDER_FUNDAMENTAL", &mut providers.fundamental),
            ("LLM_PROVIDER_MACRO", &mut providers.macro_analyst),
            ("LLM_PROVIDER_CHIEF", &mut providers.chief),
            ("LLM_PROVIDER_TRADER", &mut providers.trader),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    *slot = value.trim().to_lowercase();
                }
            }
        }
        providers
    }
}

/// Runtime-adjustable settings, persisted to a TOML file so they survive
/// restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub primary_symbols: Vec<String>,
    #[serde(default)]
    pub secondary_symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub normal_interval: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            normal_interval: 300,
        }
    }
}

/// Mutable view over the dynamic config plus its backing file.
pub struct RuntimeConfig {
    path: PathBuf,
    state: Mutex<DynamicConfig>,
}

impl RuntimeConfig {
    /// Load the dynamic config from `path`, falling back to defaults when
    /// the file is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| toml::from_str(&raw).ok())
            .unwrap_or_default();

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> DynamicConfig {
        self.state.lock().expect("config lock poisoned").clone()
    }

    pub fn primary_symbols(&self) -> Vec<String> {
        self.snapshot().monitor.primary_symbols
    }

    pub fn normal_interval(&self) -> u64 {
        self.snapshot().triggers.normal_interval
    }

    /// Apply a mutation and persist the result to disk.
    pub fn update<F>(&self, mutate: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut DynamicConfig),
    {
        let snapshot = {
            let mut state = self.state.lock().expect("config lock poisoned");
            mutate(&mut state);
            state.clone()
        };

        let raw = toml::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = RuntimeConfig::load("/nonexistent/dynamic_config.toml");
        assert!(config.primary_symbols().is_empty());
        assert_eq!(config.normal_interval(), 300);
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = std::env::temp_dir().join("coinsentinel-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dynamic_config.toml");
        let _ = std::fs::remove_file(&path);

        let config = RuntimeConfig::load(&path);
        config
            .update(|c| {
                c.monitor.primary_symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
                c.triggers.normal_interval = 600;
            })
            .unwrap();

        let reloaded = RuntimeConfig::load(&path);
        assert_eq!(reloaded.primary_symbols(), vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(reloaded.normal_interval(), 600);

        let _ = std::fs::remove_file(&path);
    }
}
