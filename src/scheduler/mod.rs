//! Debounced, cancelable, snooze-aware cleanup scheduling.
//!
//! A domain that just became closed should not be purged on the spot: the
//! user may be navigating between pages of the same site across tabs. The
//! scheduler turns a domain-leave into "run the handler after the
//! configured delay, unless the domain re-opens or the user snoozes
//! first". Each domain is in exactly one of three states: unscheduled,
//! scheduled with a live timer, or parked in the snoozed set.
//!
//! Re-scheduling is always cancel-and-replace; two timers for the same
//! domain cannot coexist. Snoozing is loss-free: timers are canceled into
//! the snoozed set and resubmitted with a full fresh delay when snoozing
//! ends. Disabling the feature clears everything silently.

use crate::base::settings::SettingsHandle;
use crate::base::timer::CancelableTimer;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

/// Future returned by the cleanup handler.
pub type CleanupTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Handler invoked with a domain once its delay elapses.
pub type CleanupHandler = Arc<dyn Fn(String) -> CleanupTask + Send + Sync>;

/// Delayed-execution engine for domain-leave cleanup.
pub struct CleanupScheduler {
    inner: Arc<SchedulerInner>,
}

impl Clone for CleanupScheduler {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct SchedulerInner {
    settings: SettingsHandle,
    handler: CleanupHandler,
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    scheduled: HashMap<String, CancelableTimer>,
    snoozed: HashSet<String>,
    snoozing: bool,
}

impl CleanupScheduler {
    pub fn new(settings: SettingsHandle, handler: CleanupHandler) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                settings,
                handler,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Schedule (or re-schedule) cleanup for `domain`.
    ///
    /// A second call before the delay elapses restarts the countdown.
    /// With a zero configured delay the handler runs right away.
    pub fn schedule(&self, domain: &str) {
        let settings = self.inner.settings.get();
        if !settings.domain_leave.enabled {
            return;
        }
        let delay = settings.domain_leave.delay();

        let fire_now = {
            let mut state = self.inner.lock_state();
            // Cancel-and-replace: dropping the old timer aborts it.
            state.scheduled.remove(domain);
            if state.snoozing {
                state.snoozed.insert(domain.to_string());
                false
            } else if delay.is_zero() {
                true
            } else {
                tracing::debug!(domain = %domain, delay_ms = delay.as_millis() as u64, "cleanup scheduled");
                let weak = Arc::downgrade(&self.inner);
                let owned = domain.to_string();
                let timer = CancelableTimer::spawn(delay, async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.fire(owned).await;
                    }
                });
                state.scheduled.insert(domain.to_string(), timer);
                false
            }
        };

        if fire_now {
            let inner = Arc::clone(&self.inner);
            let owned = domain.to_string();
            tokio::spawn(async move {
                inner.fire(owned).await;
            });
        }
    }

    /// Forget a domain entirely (it re-opened before its timer fired).
    pub fn cancel(&self, domain: &str) {
        let mut state = self.inner.lock_state();
        let had_timer = state.scheduled.remove(domain).is_some();
        let was_snoozed = state.snoozed.remove(domain);
        if had_timer || was_snoozed {
            tracing::debug!(domain = %domain, "cleanup canceled");
        }
    }

    /// Toggle snoozing. Entering snooze cancels every live timer into the
    /// snoozed set; leaving it resubmits each parked domain with a full
    /// fresh delay.
    pub fn set_snoozing(&self, snoozing: bool) {
        if snoozing {
            let mut state = self.inner.lock_state();
            state.snoozing = true;
            let parked: Vec<String> = state.scheduled.drain().map(|(domain, _)| domain).collect();
            state.snoozed.extend(parked);
        } else {
            let parked: Vec<String> = {
                let mut state = self.inner.lock_state();
                state.snoozing = false;
                state.snoozed.drain().collect()
            };
            for domain in parked {
                self.schedule(&domain);
            }
        }
    }

    /// Drop every scheduled and snoozed domain without firing handlers.
    /// Used when the feature is switched off.
    pub fn clear(&self) {
        let mut state = self.inner.lock_state();
        state.scheduled.clear();
        state.snoozed.clear();
    }

    pub fn is_snoozing(&self) -> bool {
        self.inner.lock_state().snoozing
    }

    pub fn is_scheduled(&self, domain: &str) -> bool {
        self.inner.lock_state().scheduled.contains_key(domain)
    }

    pub fn is_snoozed(&self, domain: &str) -> bool {
        self.inner.lock_state().snoozed.contains(domain)
    }

    pub fn scheduled_count(&self) -> usize {
        let state = self.inner.lock_state();
        state.scheduled.len() + state.snoozed.len()
    }
}

impl SchedulerInner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Timer callback. Enabled/snoozing are re-checked at fire time, not
    /// just at schedule time.
    async fn fire(self: Arc<Self>, domain: String) {
        let run = {
            let mut state = self.lock_state();
            state.scheduled.remove(&domain);
            if !self.settings.get().domain_leave.enabled {
                false
            } else if state.snoozing {
                state.snoozed.insert(domain.clone());
                false
            } else {
                true
            }
        };
        if run {
            tracing::debug!(domain = %domain, "cleanup due");
            (self.handler)(domain).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn handler_log() -> (CleanupHandler, Arc<Mutex<Vec<String>>>) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let handler: CleanupHandler = Arc::new(move |domain| {
            let log = Arc::clone(&log2);
            Box::pin(async move {
                log.lock().unwrap().push(domain);
            })
        });
        (handler, log)
    }

    fn scheduler(delay_ms: u64) -> (CleanupScheduler, Arc<Mutex<Vec<String>>>) {
        let settings = SettingsHandle::default();
        settings.update(|s| {
            s.domain_leave.enabled = true;
            s.domain_leave.delay_ms = delay_ms;
        });
        let (handler, log) = handler_log();
        (CleanupScheduler::new(settings, handler), log)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (scheduler, log) = scheduler(1000);
        scheduler.schedule("example.com");
        assert!(scheduler.is_scheduled("example.com"));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(*log.lock().unwrap(), vec!["example.com".to_string()]);
        assert!(!scheduler.is_scheduled("example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_restarts_countdown() {
        let (scheduler, log) = scheduler(1000);
        scheduler.schedule("a.com");
        tokio::time::sleep(Duration::from_millis(600)).await;

        scheduler.schedule("a.com");
        tokio::time::sleep(Duration::from_millis(600)).await;
        // 1200ms after the first call, but only 600ms after the second
        assert!(log.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*log.lock().unwrap(), vec!["a.com".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let (scheduler, log) = scheduler(1000);
        scheduler.schedule("a.com");
        scheduler.cancel("a.com");

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_fires_immediately() {
        let (scheduler, log) = scheduler(0);
        scheduler.schedule("a.com");
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*log.lock().unwrap(), vec!["a.com".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_is_noop() {
        let settings = SettingsHandle::default();
        let (handler, log) = handler_log();
        let scheduler = CleanupScheduler::new(settings, handler);

        scheduler.schedule("a.com");
        assert_eq!(scheduler.scheduled_count(), 0);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snooze_round_trip() {
        let (scheduler, log) = scheduler(1000);
        scheduler.set_snoozing(true);
        scheduler.schedule("a.com");
        scheduler.schedule("b.com");
        assert!(scheduler.is_snoozed("a.com"));
        assert!(scheduler.is_snoozed("b.com"));

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(log.lock().unwrap().is_empty());

        scheduler.set_snoozing(false);
        assert!(scheduler.is_scheduled("a.com"));
        assert!(scheduler.is_scheduled("b.com"));

        // Full fresh delay after unsnoozing
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(log.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(500)).await;
        let mut fired = log.lock().unwrap().clone();
        fired.sort();
        assert_eq!(fired, vec!["a.com".to_string(), "b.com".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snooze_cancels_live_timers() {
        let (scheduler, log) = scheduler(1000);
        scheduler.schedule("a.com");
        tokio::time::sleep(Duration::from_millis(600)).await;

        scheduler.set_snoozing(true);
        assert!(!scheduler.is_scheduled("a.com"));
        assert!(scheduler.is_snoozed("a.com"));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_at_fire_time_suppresses_handler() {
        let settings = SettingsHandle::default();
        settings.update(|s| {
            s.domain_leave.enabled = true;
            s.domain_leave.delay_ms = 1000;
        });
        let (handler, log) = handler_log();
        let scheduler = CleanupScheduler::new(settings.clone(), handler);

        scheduler.schedule("a.com");
        settings.update(|s| s.domain_leave.enabled = false);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_everything() {
        let (scheduler, log) = scheduler(1000);
        scheduler.schedule("a.com");
        scheduler.set_snoozing(true);
        scheduler.schedule("b.com");

        scheduler.clear();
        assert_eq!(scheduler.scheduled_count(), 0);

        scheduler.set_snoozing(false);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_single_fire() {
        let (scheduler, log) = scheduler(1000);
        // Burst of leave events for the same domain
        for _ in 0..5 {
            scheduler.schedule("a.com");
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
