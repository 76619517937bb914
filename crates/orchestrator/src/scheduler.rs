use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};

/// The two daily wall-clock slots for the base-analysis job.
const SLOTS: [(u32, u32); 2] = [(23, 0), (4, 0)];

/// Last-fired dates per slot. Kept separate from the ticking task so the
/// fire decision is a pure, testable function.
#[derive(Debug, Default)]
pub struct ScheduleSlots {
    last_fired: [Option<NaiveDate>; 2],
}

impl ScheduleSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `now` lands on an unfired slot for today; marks the slot
    /// fired. A second call within the same minute (or day) returns false.
    pub fn due(&mut self, now: NaiveDateTime) -> bool {
        let today = now.date();
        for (i, (hour, minute)) in SLOTS.iter().enumerate() {
            if now.hour() == *hour && now.minute() == *minute && self.last_fired[i] != Some(today) {
                self.last_fired[i] = Some(today);
                return true;
            }
        }
        false
    }
}

/// Minute-tick wall-clock scheduler for the heavy base-analysis job.
/// Fires once immediately on start, then at each slot exactly once per
/// local-clock day.
pub struct Scheduler {
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the tick loop. `job` is invoked on start and on every due
    /// slot; its failures are the job's own concern.
    pub fn start<F, Fut>(&self, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("scheduler already running");
            return;
        }

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            tracing::info!("scheduler started: base analysis now, then daily at 23:00 and 04:00");
            job().await;

            let slots = Mutex::new(ScheduleSlots::new());
            while running.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(60)).await;

                let fire = {
                    let mut slots = slots.lock().expect("slot lock poisoned");
                    slots.due(Local::now().naive_local())
                };
                if fire {
                    tracing::info!("scheduled base analysis triggered");
                    job().await;
                }
            }
            tracing::info!("scheduler stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(date: (i32, u32, u32), hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn fires_once_per_slot_per_day() {
        let mut slots = ScheduleSlots::new();

        assert!(slots.due(at((2025, 3, 1), 23, 0)));
        // Second wake inside the same minute
        assert!(!slots.due(at((2025, 3, 1), 23, 0)));
        // Later the same evening
        assert!(!slots.due(at((2025, 3, 1), 23, 1)));

        // The 04:00 slot is independent
        assert!(slots.due(at((2025, 3, 2), 4, 0)));
        assert!(!slots.due(at((2025, 3, 2), 4, 0)));

        // A new day re-arms both slots
        assert!(slots.due(at((2025, 3, 2), 23, 0)));
        assert!(slots.due(at((2025, 3, 3), 4, 0)));
    }

    #[test]
    fn off_slot_minutes_do_not_fire() {
        let mut slots = ScheduleSlots::new();
        assert!(!slots.due(at((2025, 3, 1), 22, 59)));
        assert!(!slots.due(at((2025, 3, 1), 23, 1)));
        assert!(!slots.due(at((2025, 3, 1), 12, 0)));
    }
}
