//! Tab, frame, and domain presence tracking.
//!
//! [`DomainWatcher`] consumes the host's navigation and tab lifecycle
//! events and maintains, per cookie store, which domains are currently
//! open. Domain-enter and domain-leave are derived events: a domain
//! enters when the first frame anywhere in a store starts referencing it
//! and leaves when the last reference disappears, each transition firing
//! exactly once.
//!
//! Sub-frames have no reliable destruction signal on the host platform,
//! so the watcher recovers their state actively: liveness probes against
//! idle sub-frames, debounced per tab, treat a rejected probe as the
//! dead-frame signal.
//!
//! All mutation happens synchronously under the state lock; listener
//! callbacks fire after the lock is released, enters before leaves.

pub mod frame;
pub mod tab;

pub use frame::FrameInfo;
pub use tab::TabInfo;

use crate::base::listeners::{ListenerId, ListenerRegistry};
use crate::base::psl::FirstPartyRegister;
use crate::base::timer::CancelableTimer;
use crate::host::{CookieStoreId, FrameId, FrameProbe, TabId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;
use url::Url;

/// The hostname a navigation URL contributes; empty for URLs without a
/// host (local files).
pub fn hostname_of(url: &Url) -> String {
    url.host_str().unwrap_or("").to_lowercase()
}

/// A domain crossing the open/closed boundary within one cookie store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainTransition {
    pub store_id: CookieStoreId,
    pub domain: String,
}

/// Reference-counted domain presence across all tabs.
pub struct DomainWatcher {
    inner: Arc<WatcherInner>,
}

impl Clone for DomainWatcher {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct WatcherInner {
    state: Mutex<WatcherState>,
    enter_listeners: ListenerRegistry<DomainTransition>,
    leave_listeners: ListenerRegistry<DomainTransition>,
    probe: Arc<dyn FrameProbe>,
    register: Arc<dyn FirstPartyRegister>,
}

#[derive(Default)]
struct WatcherState {
    tab_infos: HashMap<TabId, TabInfo>,
    tabs_by_store: HashMap<CookieStoreId, Vec<TabId>>,
}

impl WatcherState {
    fn insert_tab(&mut self, tab: TabInfo) {
        self.tabs_by_store.entry(tab.cookie_store_id.clone()).or_default().push(tab.tab_id);
        self.tab_infos.insert(tab.tab_id, tab);
    }

    fn remove_tab(&mut self, tab_id: TabId) -> Option<TabInfo> {
        let tab = self.tab_infos.remove(&tab_id)?;
        if let Some(ids) = self.tabs_by_store.get_mut(&tab.cookie_store_id) {
            ids.retain(|id| *id != tab_id);
            if ids.is_empty() {
                self.tabs_by_store.remove(&tab.cookie_store_id);
            }
        }
        Some(tab)
    }

    fn store_tabs<'a>(&'a self, store_id: &CookieStoreId) -> impl Iterator<Item = &'a TabInfo> + 'a {
        self.tabs_by_store
            .get(store_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.tab_infos.get(id))
    }

    fn store_contains(&self, store_id: &CookieStoreId, hostname: &str, check_next: bool) -> bool {
        self.store_tabs(store_id).any(|tab| tab.contains_hostname(hostname, check_next))
    }
}

impl DomainWatcher {
    pub fn new(probe: Arc<dyn FrameProbe>, register: Arc<dyn FirstPartyRegister>) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                state: Mutex::new(WatcherState::default()),
                enter_listeners: ListenerRegistry::new(),
                leave_listeners: ListenerRegistry::new(),
                probe,
                register,
            }),
        }
    }

    // ---- listener surface ----

    pub fn add_domain_enter_listener(
        &self,
        listener: impl Fn(&DomainTransition) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.enter_listeners.register(listener)
    }

    pub fn remove_domain_enter_listener(&self, id: ListenerId) -> bool {
        self.inner.enter_listeners.unregister(id)
    }

    pub fn add_domain_leave_listener(
        &self,
        listener: impl Fn(&DomainTransition) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner.leave_listeners.register(listener)
    }

    pub fn remove_domain_leave_listener(&self, id: ListenerId) -> bool {
        self.inner.leave_listeners.unregister(id)
    }

    // ---- host event intake ----

    /// A tab appeared, optionally already pointed at a URL.
    pub fn on_tab_created(&self, tab_id: TabId, store_id: CookieStoreId, url: Option<&Url>) {
        let hostname = url.map(hostname_of).unwrap_or_default();
        let entered = {
            let mut guard = self.inner.lock_state();
            if guard.tab_infos.contains_key(&tab_id) {
                return;
            }
            let entered =
                !hostname.is_empty() && !guard.store_contains(&store_id, &hostname, true);
            let mut tab = TabInfo::new(tab_id, store_id.clone());
            if !hostname.is_empty() {
                tab.commit_navigation(FrameId::TOP, &hostname, self.inner.register.as_ref());
            }
            guard.insert_tab(tab);
            entered
        };
        if entered {
            self.inner.emit_enter(&store_id, &hostname);
        }
    }

    /// A tab is gone; every domain it referenced loses one reference.
    pub fn on_tab_removed(&self, tab_id: TabId) {
        let (store_id, leaves) = {
            let mut guard = self.inner.lock_state();
            let Some(tab) = guard.remove_tab(tab_id) else { return };
            let leaves: Vec<String> = tab
                .visible_hostnames()
                .into_iter()
                .filter(|hostname| !guard.store_contains(&tab.cookie_store_id, hostname, true))
                .collect();
            (tab.cookie_store_id, leaves)
        };
        for hostname in &leaves {
            self.inner.emit_leave(&store_id, hostname);
        }
    }

    /// The host is about to navigate a frame.
    pub fn on_before_navigate(&self, tab_id: TabId, frame_id: FrameId, url: &Url) {
        self.inner.prepare_navigation(tab_id, frame_id, &hostname_of(url));
    }

    /// An in-flight navigation was redirected; treated as a fresh
    /// preparation toward the new hostname.
    pub fn on_before_redirect(&self, tab_id: TabId, frame_id: FrameId, new_url: &Url) {
        self.inner.prepare_navigation(tab_id, frame_id, &hostname_of(new_url));
    }

    /// A navigation committed.
    pub fn on_committed(&self, tab_id: TabId, frame_id: FrameId, url: &Url) {
        self.inner.commit_navigation(tab_id, frame_id, &hostname_of(url));
        self.inner.schedule_dead_frames_check(tab_id);
    }

    /// A document finished loading. Commit is idempotent here; the event
    /// mainly drives dead-frame probing.
    pub fn on_completed(&self, tab_id: TabId, frame_id: FrameId, url: &Url) {
        self.inner.commit_navigation(tab_id, frame_id, &hostname_of(url));
        self.inner.schedule_dead_frames_check(tab_id);
    }

    /// Request a dead-frame probe for a tab (coalesced, debounced).
    pub fn schedule_dead_frames_check(&self, tab_id: TabId) {
        self.inner.schedule_dead_frames_check(tab_id);
    }

    // ---- query surface ----

    /// Whether `domain` is referenced by any frame in the given store.
    pub fn cookie_store_contains_domain(
        &self,
        store_id: &CookieStoreId,
        domain: &str,
        check_next: bool,
    ) -> bool {
        self.inner.lock_state().store_contains(store_id, domain, check_next)
    }

    /// Whether `domain` is referenced anywhere, in any store.
    pub fn contains_domain(&self, domain: &str) -> bool {
        let guard = self.inner.lock_state();
        guard.tab_infos.values().any(|tab| tab.contains_hostname(domain, true))
    }

    /// Whether a cookie for `cookie_domain` is third-party with respect
    /// to the given tab: no frame of the tab shares its first-party
    /// domain. Unknown tabs yield false (no evidence either way).
    pub fn is_third_party_cookie_on_tab(&self, tab_id: TabId, cookie_domain: &str) -> bool {
        let normalized = cookie_domain.strip_prefix('.').unwrap_or(cookie_domain);
        let first_party = self.inner.register.first_party(normalized);
        let guard = self.inner.lock_state();
        match guard.tab_infos.get(&tab_id) {
            Some(tab) => !tab.matches_first_party(&first_party, true),
            None => false,
        }
    }

    /// Whether any tab of the store references `first_party` at the
    /// eTLD+1 granularity. `deep` includes sub-frames.
    pub fn cookie_store_contains_domain_first_party(
        &self,
        store_id: &CookieStoreId,
        first_party: &str,
        deep: bool,
    ) -> bool {
        let guard = self.inner.lock_state();
        let result = guard.store_tabs(store_id).any(|tab| tab.matches_first_party(first_party, deep));
        result
    }

    /// Number of tracked tabs.
    pub fn tab_count(&self) -> usize {
        self.inner.lock_state().tab_infos.len()
    }
}

impl WatcherInner {
    fn lock_state(&self) -> MutexGuard<'_, WatcherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit_enter(&self, store_id: &CookieStoreId, domain: &str) {
        tracing::debug!(store = %store_id, domain = %domain, "domain enter");
        self.enter_listeners
            .emit(&DomainTransition { store_id: store_id.clone(), domain: domain.to_string() });
    }

    fn emit_leave(&self, store_id: &CookieStoreId, domain: &str) {
        tracing::debug!(store = %store_id, domain = %domain, "domain leave");
        self.leave_listeners
            .emit(&DomainTransition { store_id: store_id.clone(), domain: domain.to_string() });
    }

    fn prepare_navigation(&self, tab_id: TabId, frame_id: FrameId, hostname: &str) {
        let (store_id, entered, leave) = {
            let mut guard = self.lock_state();
            let Some(tab) = guard.tab_infos.get(&tab_id) else { return };
            let store_id = tab.cookie_store_id.clone();
            let entered =
                !hostname.is_empty() && !guard.store_contains(&store_id, hostname, true);
            let Some(tab) = guard.tab_infos.get_mut(&tab_id) else { return };
            let previous = tab.prepare_navigation(frame_id, hostname, self.register.as_ref());
            let leave =
                previous.filter(|prev| !guard.store_contains(&store_id, prev, true));
            (store_id, entered, leave)
        };
        if entered {
            self.emit_enter(&store_id, hostname);
        }
        if let Some(prev) = leave {
            self.emit_leave(&store_id, &prev);
        }
    }

    fn commit_navigation(&self, tab_id: TabId, frame_id: FrameId, hostname: &str) {
        let (store_id, entered, leaves) = {
            let mut guard = self.lock_state();
            let Some(tab) = guard.tab_infos.get(&tab_id) else { return };
            let store_id = tab.cookie_store_id.clone();
            let entered =
                !hostname.is_empty() && !guard.store_contains(&store_id, hostname, true);
            let Some(tab) = guard.tab_infos.get_mut(&tab_id) else { return };
            let dropped = tab.commit_navigation(frame_id, hostname, self.register.as_ref());
            let leaves: Vec<String> = dropped
                .into_iter()
                .filter(|d| !guard.store_contains(&store_id, d, true))
                .collect();
            (store_id, entered, leaves)
        };
        if entered {
            self.emit_enter(&store_id, hostname);
        }
        for hostname in &leaves {
            self.emit_leave(&store_id, hostname);
        }
    }

    fn schedule_dead_frames_check(self: &Arc<Self>, tab_id: TabId) {
        let run_now = {
            let mut guard = self.lock_state();
            let Some(tab) = guard.tab_infos.get_mut(&tab_id) else { return };
            if tab.frame_count() <= 1 {
                return;
            }
            if tab.dead_frame_check_due() {
                true
            } else {
                let armed =
                    tab.dead_frame_timer.as_ref().is_some_and(|timer| !timer.is_finished());
                if !armed {
                    let delay = tab.dead_frame_check_remaining();
                    let weak = Arc::downgrade(self);
                    tab.dead_frame_timer = Some(CancelableTimer::spawn(delay, async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.run_dead_frames_check(tab_id).await;
                        }
                    }));
                }
                false
            }
        };
        if run_now {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                inner.run_dead_frames_check(tab_id).await;
            });
        }
    }

    async fn run_dead_frames_check(self: Arc<Self>, tab_id: TabId) {
        let (to_probe, had_busy) = {
            let mut guard = self.lock_state();
            let Some(tab) = guard.tab_infos.get_mut(&tab_id) else { return };
            // Coalesced duplicate of a check that already ran.
            if !tab.dead_frame_check_due() {
                return;
            }
            tab.last_dead_frame_check = Some(Instant::now());
            tab.dead_frame_timer = None;
            (tab.frames_to_probe(), tab.has_busy_subframes())
        };

        let mut rejected = Vec::new();
        for frame_id in to_probe {
            if self.probe.probe(tab_id, frame_id).await.is_err() {
                rejected.push(frame_id);
            }
        }

        let (store_id, leaves, reschedule) = {
            let mut guard = self.lock_state();
            let Some(tab) = guard.tab_infos.get_mut(&tab_id) else { return };
            // Re-validate after the await boundary: a frame that
            // navigated while we were probing is alive again.
            let confirmed: Vec<FrameId> = rejected
                .into_iter()
                .filter(|id| tab.frame(*id).is_some_and(|frame| frame.is_idle()))
                .collect();
            let store_id = tab.cookie_store_id.clone();
            let dropped = tab.remove_frames(&confirmed);
            if !confirmed.is_empty() {
                tracing::debug!(
                    tab = tab_id.0,
                    frames = confirmed.len(),
                    "removed dead frames"
                );
            }
            let reschedule = tab.has_busy_subframes();
            let leaves: Vec<String> = dropped
                .into_iter()
                .filter(|d| !guard.store_contains(&store_id, d, true))
                .collect();
            (store_id, leaves, reschedule)
        };

        for hostname in &leaves {
            self.emit_leave(&store_id, hostname);
        }
        if had_busy || reschedule {
            self.schedule_dead_frames_check(tab_id);
        }
    }
}
