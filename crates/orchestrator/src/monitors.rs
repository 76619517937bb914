use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use analysis_core::MonitorStatus;

/// Outcome of a start/stop request.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOutcome {
    pub success: bool,
    pub message: String,
}

struct MonitorEntry {
    interval_minutes: u64,
    active: Arc<AtomicBool>,
}

/// Registry of per-symbol recurring workers. The map is the single source
/// of truth for "is this symbol being watched"; each worker re-checks its
/// own active flag at every wake.
#[derive(Default)]
pub struct MonitorManager {
    monitors: Mutex<HashMap<String, MonitorEntry>>,
}

impl MonitorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor and spawn its worker loop. `tick` runs once per
    /// cycle; the loop exits at the first wake after `stop`.
    pub fn start<F, Fut>(&self, symbol: &str, interval_minutes: u64, tick: F) -> MonitorOutcome
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let active = {
            let mut monitors = self.monitors.lock().expect("monitor lock poisoned");
            if let Some(entry) = monitors.get(symbol) {
                if entry.active.load(Ordering::SeqCst) {
                    return MonitorOutcome {
                        success: false,
                        message: format!("{symbol} 已在监控中"),
                    };
                }
            }

            let active = Arc::new(AtomicBool::new(true));
            monitors.insert(
                symbol.to_string(),
                MonitorEntry {
                    interval_minutes,
                    active: Arc::clone(&active),
                },
            );
            active
        };

        let symbol_owned = symbol.to_string();
        tokio::spawn(async move {
            tracing::info!(symbol = %symbol_owned, interval_minutes, "symbol monitor started");
            while active.load(Ordering::SeqCst) {
                tick().await;
                tokio::time::sleep(Duration::from_secs(interval_minutes * 60)).await;
            }
            tracing::info!(symbol = %symbol_owned, "symbol monitor stopped");
        });

        MonitorOutcome {
            success: true,
            message: format!("已开始监控 {symbol}，间隔 {interval_minutes} 分钟"),
        }
    }

    /// Flip the active flag and drop the entry; the worker exits at its
    /// next wake.
    pub fn stop(&self, symbol: &str) -> MonitorOutcome {
        let mut monitors = self.monitors.lock().expect("monitor lock poisoned");
        match monitors.remove(symbol) {
            Some(entry) => {
                entry.active.store(false, Ordering::SeqCst);
                MonitorOutcome {
                    success: true,
                    message: format!("已停止监控 {symbol}"),
                }
            }
            None => MonitorOutcome {
                success: false,
                message: format!("{symbol} 未在监控中"),
            },
        }
    }

    /// Snapshot of the active monitors.
    pub fn list(&self) -> Vec<MonitorStatus> {
        let monitors = self.monitors.lock().expect("monitor lock poisoned");
        let mut statuses: Vec<MonitorStatus> = monitors
            .iter()
            .filter(|(_, entry)| entry.active.load(Ordering::SeqCst))
            .map(|(symbol, entry)| MonitorStatus {
                symbol: symbol.clone(),
                interval_minutes: entry.interval_minutes,
            })
            .collect();
        statuses.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        statuses
    }

    pub fn is_watching(&self, symbol: &str) -> bool {
        let monitors = self.monitors.lock().expect("monitor lock poisoned");
        monitors
            .get(symbol)
            .map(|entry| entry.active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Flip every flag; workers drain on their next wake.
    pub fn stop_all(&self) {
        let mut monitors = self.monitors.lock().expect("monitor lock poisoned");
        for entry in monitors.values() {
            entry.active.store(false, Ordering::SeqCst);
        }
        monitors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_start_is_rejected() {
        let manager = MonitorManager::new();

        let first = manager.start("BTCUSDT", 30, || async {});
        assert!(first.success);
        assert_eq!(first.message, "已开始监控 BTCUSDT，间隔 30 分钟");

        let second = manager.start("BTCUSDT", 30, || async {});
        assert!(!second.success);
        assert_eq!(second.message, "BTCUSDT 已在监控中");
    }

    #[tokio::test]
    async fn stop_then_restart_succeeds() {
        let manager = MonitorManager::new();
        manager.start("BTCUSDT", 30, || async {});

        let stopped = manager.stop("BTCUSDT");
        assert!(stopped.success);
        assert_eq!(stopped.message, "已停止监控 BTCUSDT");

        let restarted = manager.start("BTCUSDT", 15, || async {});
        assert!(restarted.success);
    }

    #[tokio::test]
    async fn stop_unknown_symbol_fails() {
        let manager = MonitorManager::new();
        let outcome = manager.stop("ETHUSDT");
        assert!(!outcome.success);
        assert_eq!(outcome.message, "ETHUSDT 未在监控中");
    }

    #[tokio::test]
    async fn list_reflects_active_monitors() {
        let manager = MonitorManager::new();
        manager.start("BTCUSDT", 30, || async {});
        manager.start("ETHUSDT", 15, || async {});

        let statuses = manager.list();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].symbol, "BTCUSDT");
        assert_eq!(statuses[1].interval_minutes, 15);

        manager.stop_all();
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn worker_ticks_until_stopped() {
        let manager = MonitorManager::new();
        let ticks = Arc::new(AtomicBool::new(false));
        let ticks_clone = Arc::clone(&ticks);

        manager.start("BTCUSDT", 30, move || {
            let ticks = Arc::clone(&ticks_clone);
            async move {
                ticks.store(true, Ordering::SeqCst);
            }
        });

        // The first cycle runs before the first sleep.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ticks.load(Ordering::SeqCst));
        assert!(manager.is_watching("BTCUSDT"));

        manager.stop("BTCUSDT");
        assert!(!manager.is_watching("BTCUSDT"));
    }
}
