//! Cleanup Context - central wiring for the cleanup engine.
//!
//! Owns one of every component, connects the watcher's domain events to
//! the scheduler and the local-storage record, and gives the embedding
//! host a single object to drive: feed navigation/tab/cookie events in,
//! call the cleanup passes, toggle snoozing.

use crate::base::psl::{FirstPartyRegister, PslFirstParty};
use crate::base::settings::{Settings, SettingsHandle};
use crate::cleaners::cookies::CookieCleaner;
use crate::cleaners::downloads::DownloadCleaner;
use crate::cleaners::history::HistoryCleaner;
use crate::cleaners::localstorage::LocalStorageCleaner;
use crate::cleaners::BrowsingDataRemover;
use crate::host::{BrowsingHost, CookieStoreId, FrameProbe};
use crate::rules::RuleEngine;
use crate::scheduler::{CleanupHandler, CleanupScheduler};
use crate::watcher::DomainWatcher;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Configuration options for [`CleanupContext`].
pub struct CleanupContextConfig {
    /// Initial settings snapshot.
    pub settings: Settings,
    /// First-party domain service (None = PSL-backed default).
    pub first_party: Option<Arc<dyn FirstPartyRegister>>,
}

impl Default for CleanupContextConfig {
    fn default() -> Self {
        Self { settings: Settings::default(), first_party: None }
    }
}

/// The assembled cleanup engine.
pub struct CleanupContext {
    settings: SettingsHandle,
    engine: Arc<RuleEngine>,
    watcher: DomainWatcher,
    scheduler: CleanupScheduler,
    remover: Arc<BrowsingDataRemover>,
    cookies: Arc<CookieCleaner>,
    local_storage: Arc<LocalStorageCleaner>,
}

impl CleanupContext {
    pub fn new(
        config: CleanupContextConfig,
        probe: Arc<dyn FrameProbe>,
        host: Arc<dyn BrowsingHost>,
    ) -> Arc<Self> {
        let settings = SettingsHandle::new(config.settings);
        let register: Arc<dyn FirstPartyRegister> =
            config.first_party.unwrap_or_else(|| Arc::new(PslFirstParty));

        let watcher = DomainWatcher::new(probe, Arc::clone(&register));
        let engine = Arc::new(RuleEngine::new(settings.clone()));

        let cookies = Arc::new(CookieCleaner::new(
            settings.clone(),
            Arc::clone(&engine),
            watcher.clone(),
            Arc::clone(&register),
            Arc::clone(&host),
        ));
        let local_storage = Arc::new(LocalStorageCleaner::new(
            settings.clone(),
            Arc::clone(&engine),
            watcher.clone(),
            Arc::clone(&host),
        ));
        let history = Arc::new(HistoryCleaner::new(
            settings.clone(),
            Arc::clone(&engine),
            watcher.clone(),
            Arc::clone(&host),
        ));
        let downloads = Arc::new(DownloadCleaner::new(
            settings.clone(),
            Arc::clone(&engine),
            watcher.clone(),
            Arc::clone(&host),
        ));

        let mut remover =
            BrowsingDataRemover::new(settings.clone(), Arc::clone(&engine), Arc::clone(&host));
        remover.add_cleaner(cookies.clone());
        remover.add_cleaner(local_storage.clone());
        remover.add_cleaner(history.clone());
        remover.add_cleaner(downloads.clone());
        let remover = Arc::new(remover);

        // The leave-delay handler re-derives the affected stores at fire
        // time and skips any store where the domain has re-opened.
        let handler: CleanupHandler = {
            let remover = Arc::clone(&remover);
            let watcher = watcher.clone();
            let host = Arc::clone(&host);
            Arc::new(move |domain: String| {
                let remover = Arc::clone(&remover);
                let watcher = watcher.clone();
                let host = Arc::clone(&host);
                Box::pin(async move {
                    let stores = match host.list_cookie_stores().await {
                        Ok(stores) => stores,
                        Err(error) => {
                            tracing::debug!(%error, "cookie store listing rejected");
                            return;
                        }
                    };
                    for store in stores {
                        if watcher.cookie_store_contains_domain(&store, &domain, true) {
                            continue;
                        }
                        remover.clean_domain_on_leave(&store, &domain).await;
                    }
                })
            })
        };
        let scheduler = CleanupScheduler::new(settings.clone(), handler);

        // Entering a domain cancels its pending cleanup and records it as
        // a potential storage owner; leaving schedules cleanup.
        let enter_scheduler = scheduler.clone();
        let enter_storage = Arc::clone(&local_storage);
        watcher.add_domain_enter_listener(move |transition| {
            enter_scheduler.cancel(&transition.domain);
            enter_storage.note_domain(&transition.store_id, &transition.domain);
        });
        let leave_scheduler = scheduler.clone();
        watcher.add_domain_leave_listener(move |transition| {
            leave_scheduler.schedule(&transition.domain);
        });

        Arc::new(Self { settings, engine, watcher, scheduler, remover, cookies, local_storage })
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn watcher(&self) -> &DomainWatcher {
        &self.watcher
    }

    pub fn scheduler(&self) -> &CleanupScheduler {
        &self.scheduler
    }

    pub fn cookies(&self) -> &CookieCleaner {
        &self.cookies
    }

    pub fn local_storage(&self) -> &LocalStorageCleaner {
        &self.local_storage
    }

    /// Run the regular bulk pass.
    pub async fn run_cleanup(&self) {
        self.remover.run_cleanup().await;
    }

    /// Run the startup pass (drops temporary rules first).
    pub async fn run_startup_cleanup(&self) {
        self.remover.run_startup_cleanup().await;
    }

    /// Explicit user request to purge one domain in one store.
    pub async fn clean_domain_now(&self, store_id: &CookieStoreId, domain: &str) {
        self.remover.clean_domain_now(store_id, domain).await;
    }

    /// Suspend/resume leave-triggered cleanup.
    pub fn set_snoozing(&self, snoozing: bool) {
        self.scheduler.set_snoozing(snoozing);
    }

    /// React to a settings change: recompile rules and, if leave cleanup
    /// was switched off, drop every scheduled domain.
    pub fn apply_settings_change(&self) {
        self.engine.reload();
        if !self.settings.get().domain_leave.enabled {
            self.scheduler.clear();
        }
    }

    /// Follow the settings channel for as long as the context lives.
    /// Should be called once during initialization.
    pub fn spawn_settings_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.settings.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let Some(context) = weak.upgrade() else { break };
                context.apply_settings_change();
            }
        })
    }
}
