//! Local-storage cleanup decisions.
//!
//! The host cannot enumerate storage origins; removal is parameterized by
//! hostname list. The cleaner therefore records hostnames as their
//! domains become open (fed from domain-enter events) and cleans from
//! that record, per cookie store.

use crate::base::settings::SettingsHandle;
use crate::cleaners::{Cleaner, Cleaning};
use crate::host::{BrowsingHost, CategoryFlags, CookieStoreId};
use crate::rules::RuleEngine;
use crate::watcher::DomainWatcher;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

pub struct LocalStorageCleaner {
    settings: SettingsHandle,
    engine: Arc<RuleEngine>,
    watcher: DomainWatcher,
    host: Arc<dyn BrowsingHost>,
    /// Hostnames that may own local storage, per store.
    seen: DashMap<CookieStoreId, HashSet<String>>,
}

impl LocalStorageCleaner {
    pub fn new(
        settings: SettingsHandle,
        engine: Arc<RuleEngine>,
        watcher: DomainWatcher,
        host: Arc<dyn BrowsingHost>,
    ) -> Self {
        Self { settings, engine, watcher, host, seen: DashMap::new() }
    }

    /// Record a hostname that became open; it may create storage.
    pub fn note_domain(&self, store_id: &CookieStoreId, hostname: &str) {
        if hostname.is_empty() {
            return;
        }
        self.seen.entry(store_id.clone()).or_default().insert(hostname.to_string());
    }

    /// Number of recorded hostnames across stores.
    pub fn recorded_count(&self) -> usize {
        self.seen.iter().map(|entry| entry.value().len()).sum()
    }

    async fn clean_impl(&self, flags: &mut CategoryFlags, startup: bool) {
        if !flags.local_storage {
            return;
        }
        let settings = self.settings.get();
        let pass =
            if startup { settings.startup.local_storage } else { settings.cleanup.local_storage };
        if !pass.apply_rules {
            return;
        }
        flags.local_storage = false;

        // Snapshot before touching the host; the map must not be held
        // across an await.
        let recorded: Vec<(CookieStoreId, Vec<String>)> = self
            .seen
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().iter().cloned().collect()))
            .collect();

        for (store_id, hostnames) in recorded {
            let purge: Vec<String> = hostnames
                .into_iter()
                .filter(|hostname| {
                    !self.engine.is_domain_protected(hostname, startup)
                        && (startup
                            || !self.watcher.cookie_store_contains_domain(
                                &store_id, hostname, true,
                            ))
                })
                .collect();
            if purge.is_empty() {
                continue;
            }
            match self.host.remove_local_storage(&store_id, &purge).await {
                Ok(()) => {
                    if let Some(mut entry) = self.seen.get_mut(&store_id) {
                        for hostname in &purge {
                            entry.remove(hostname);
                        }
                    }
                }
                Err(error) => {
                    // Kept in the record; the next pass retries.
                    tracing::debug!(store = %store_id, %error, "local storage removal rejected");
                }
            }
        }
    }

    async fn clean_domain_impl(&self, store_id: &CookieStoreId, domain: &str) {
        if domain.is_empty() {
            return;
        }
        match self.host.remove_local_storage(store_id, &[domain.to_string()]).await {
            Ok(()) => {
                if let Some(mut entry) = self.seen.get_mut(store_id) {
                    entry.remove(domain);
                }
            }
            Err(error) => {
                tracing::debug!(store = %store_id, domain = %domain, %error, "local storage removal rejected");
            }
        }
    }
}

impl Cleaner for LocalStorageCleaner {
    fn clean<'a>(&'a self, flags: &'a mut CategoryFlags, startup: bool) -> Cleaning<'a> {
        Box::pin(self.clean_impl(flags, startup))
    }

    fn clean_domain_on_leave<'a>(
        &'a self,
        store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a> {
        Box::pin(async move {
            if !self.settings.get().domain_leave.local_storage {
                return;
            }
            if self.engine.is_domain_protected(domain, false) {
                return;
            }
            if self.watcher.cookie_store_contains_domain(store_id, domain, true) {
                return;
            }
            self.clean_domain_impl(store_id, domain).await;
        })
    }

    fn clean_domain_now<'a>(
        &'a self,
        store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a> {
        Box::pin(self.clean_domain_impl(store_id, domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::psl::PslFirstParty;
    use crate::base::settings::{CleanupType, Rule};
    use crate::cleaners::testhost::MockHost;
    use crate::host::{FrameId, Probing, TabId};
    use url::Url;

    struct AliveProbe;
    impl crate::host::FrameProbe for AliveProbe {
        fn probe(&self, _tab: TabId, _frame: FrameId) -> Probing {
            Box::pin(async { Ok(()) })
        }
    }

    fn fixture(
        rules: Vec<Rule>,
    ) -> (LocalStorageCleaner, Arc<MockHost>, DomainWatcher, SettingsHandle) {
        let settings = SettingsHandle::default();
        settings.update(|s| {
            s.rules = rules;
            s.domain_leave.local_storage = true;
        });
        let engine = Arc::new(RuleEngine::new(settings.clone()));
        let watcher = DomainWatcher::new(Arc::new(AliveProbe), Arc::new(PslFirstParty));
        let host = MockHost::new();
        let cleaner =
            LocalStorageCleaner::new(settings.clone(), engine, watcher.clone(), host.clone());
        (cleaner, host, watcher, settings)
    }

    fn removed_hostnames(host: &MockHost) -> Vec<String> {
        let mut hostnames: Vec<String> = host
            .storage_removals
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, hostnames)| hostnames.clone())
            .collect();
        hostnames.sort();
        hostnames
    }

    #[tokio::test]
    async fn test_clean_purges_recorded_hostnames() {
        let (cleaner, host, _watcher, _settings) =
            fixture(vec![Rule::new("keep.com", CleanupType::Never)]);
        let store = CookieStoreId::from("default");
        cleaner.note_domain(&store, "keep.com");
        cleaner.note_domain(&store, "drop.com");
        cleaner.note_domain(&store, "");

        let mut flags = CategoryFlags { local_storage: true, ..CategoryFlags::NONE };
        cleaner.clean(&mut flags, false).await;

        assert!(!flags.local_storage);
        assert_eq!(removed_hostnames(&host), vec!["drop.com"]);
        // keep.com stays recorded; drop.com was consumed
        assert_eq!(cleaner.recorded_count(), 1);
    }

    #[tokio::test]
    async fn test_open_hostname_survives_regular_pass() {
        let (cleaner, host, watcher, _settings) = fixture(vec![]);
        let store = CookieStoreId::from("default");
        watcher.on_tab_created(
            TabId(1),
            store.clone(),
            Some(&Url::parse("https://open.com/").unwrap()),
        );
        cleaner.note_domain(&store, "open.com");

        let mut flags = CategoryFlags { local_storage: true, ..CategoryFlags::NONE };
        cleaner.clean(&mut flags, false).await;
        assert!(removed_hostnames(&host).is_empty());

        // The startup pass does not treat anything as open
        let mut flags = CategoryFlags { local_storage: true, ..CategoryFlags::NONE };
        cleaner.note_domain(&store, "open.com");
        cleaner.clean(&mut flags, true).await;
        assert_eq!(removed_hostnames(&host), vec!["open.com"]);
    }

    #[tokio::test]
    async fn test_startup_pass_ignores_startup_rule() {
        let (cleaner, host, _watcher, _settings) =
            fixture(vec![Rule::new("startup.com", CleanupType::Startup)]);
        let store = CookieStoreId::from("default");
        cleaner.note_domain(&store, "startup.com");

        let mut flags = CategoryFlags { local_storage: true, ..CategoryFlags::NONE };
        cleaner.clean(&mut flags, false).await;
        assert!(removed_hostnames(&host).is_empty());

        let mut flags = CategoryFlags { local_storage: true, ..CategoryFlags::NONE };
        cleaner.clean(&mut flags, true).await;
        assert_eq!(removed_hostnames(&host), vec!["startup.com"]);
    }

    #[tokio::test]
    async fn test_domain_leave_gated_and_validated() {
        let (cleaner, host, watcher, settings) = fixture(vec![]);
        let store = CookieStoreId::from("default");

        settings.update(|s| s.domain_leave.local_storage = false);
        cleaner.clean_domain_on_leave(&store, "gone.com").await;
        assert!(removed_hostnames(&host).is_empty());

        settings.update(|s| s.domain_leave.local_storage = true);
        watcher.on_tab_created(
            TabId(1),
            store.clone(),
            Some(&Url::parse("https://reopened.com/").unwrap()),
        );
        cleaner.clean_domain_on_leave(&store, "reopened.com").await;
        assert!(removed_hostnames(&host).is_empty());

        cleaner.clean_domain_on_leave(&store, "gone.com").await;
        assert_eq!(removed_hostnames(&host), vec!["gone.com"]);
    }

    #[tokio::test]
    async fn test_clean_domain_now_unconditional() {
        let (cleaner, host, _watcher, _settings) =
            fixture(vec![Rule::new("protected.com", CleanupType::Never)]);
        let store = CookieStoreId::from("default");

        cleaner.clean_domain_now(&store, "protected.com").await;
        assert_eq!(removed_hostnames(&host), vec!["protected.com"]);
    }
}
