//! History cleanup decisions.
//!
//! History is host-global rather than partitioned by cookie store, so
//! openness checks go across all stores.

use crate::base::settings::SettingsHandle;
use crate::cleaners::{domain_scope_matches, Cleaner, Cleaning};
use crate::host::{BrowsingHost, CategoryFlags, CookieStoreId};
use crate::rules::RuleEngine;
use crate::watcher::{hostname_of, DomainWatcher};
use std::sync::Arc;

pub struct HistoryCleaner {
    settings: SettingsHandle,
    engine: Arc<RuleEngine>,
    watcher: DomainWatcher,
    host: Arc<dyn BrowsingHost>,
}

impl HistoryCleaner {
    pub fn new(
        settings: SettingsHandle,
        engine: Arc<RuleEngine>,
        watcher: DomainWatcher,
        host: Arc<dyn BrowsingHost>,
    ) -> Self {
        Self { settings, engine, watcher, host }
    }

    async fn clean_impl(&self, flags: &mut CategoryFlags, startup: bool) {
        if !flags.history {
            return;
        }
        let settings = self.settings.get();
        let pass = if startup { settings.startup.history } else { settings.cleanup.history };
        if !pass.apply_rules {
            return;
        }
        flags.history = false;

        let items = match self.host.list_history().await {
            Ok(items) => items,
            Err(error) => {
                tracing::debug!(%error, "history listing rejected");
                return;
            }
        };
        for item in items {
            let hostname = hostname_of(&item.url);
            if self.engine.is_domain_protected(&hostname, startup) {
                continue;
            }
            if !startup && self.watcher.contains_domain(&hostname) {
                continue;
            }
            if let Err(error) = self.host.remove_history_url(&item.url).await {
                tracing::debug!(url = %item.url, %error, "history removal rejected");
            }
        }
    }

    /// Erase a domain's URLs (subdomains included) unless protected.
    async fn clean_domain_impl(&self, domain: &str, ignore_rules: bool) {
        let items = match self.host.list_history().await {
            Ok(items) => items,
            Err(error) => {
                tracing::debug!(%error, "history listing rejected");
                return;
            }
        };
        for item in items {
            let hostname = hostname_of(&item.url);
            if !domain_scope_matches(&hostname, domain) {
                continue;
            }
            if !ignore_rules {
                if self.engine.is_domain_protected(&hostname, false) {
                    continue;
                }
                if self.watcher.contains_domain(&hostname) {
                    continue;
                }
            }
            if let Err(error) = self.host.remove_history_url(&item.url).await {
                tracing::debug!(url = %item.url, %error, "history removal rejected");
            }
        }
    }
}

impl Cleaner for HistoryCleaner {
    fn clean<'a>(&'a self, flags: &'a mut CategoryFlags, startup: bool) -> Cleaning<'a> {
        Box::pin(self.clean_impl(flags, startup))
    }

    fn clean_domain_on_leave<'a>(
        &'a self,
        _store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a> {
        Box::pin(async move {
            if !self.settings.get().domain_leave.history {
                return;
            }
            self.clean_domain_impl(domain, false).await;
        })
    }

    fn clean_domain_now<'a>(
        &'a self,
        _store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a> {
        Box::pin(self.clean_domain_impl(domain, true))
    }
}
