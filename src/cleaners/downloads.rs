//! Download-log cleanup decisions.

use crate::base::settings::SettingsHandle;
use crate::cleaners::{domain_scope_matches, Cleaner, Cleaning};
use crate::host::{BrowsingHost, CategoryFlags, CookieStoreId, DownloadItem};
use crate::rules::RuleEngine;
use crate::watcher::{hostname_of, DomainWatcher};
use std::sync::Arc;

pub struct DownloadCleaner {
    settings: SettingsHandle,
    engine: Arc<RuleEngine>,
    watcher: DomainWatcher,
    host: Arc<dyn BrowsingHost>,
}

impl DownloadCleaner {
    pub fn new(
        settings: SettingsHandle,
        engine: Arc<RuleEngine>,
        watcher: DomainWatcher,
        host: Arc<dyn BrowsingHost>,
    ) -> Self {
        Self { settings, engine, watcher, host }
    }

    async fn erase(&self, item: &DownloadItem) {
        if let Err(error) = self.host.erase_download(item.id).await {
            tracing::debug!(id = item.id, %error, "download erase rejected");
        }
    }

    async fn clean_impl(&self, flags: &mut CategoryFlags, startup: bool) {
        if !flags.downloads {
            return;
        }
        let settings = self.settings.get();
        let pass = if startup { settings.startup.downloads } else { settings.cleanup.downloads };
        if !pass.apply_rules {
            return;
        }
        flags.downloads = false;

        let items = match self.host.list_downloads().await {
            Ok(items) => items,
            Err(error) => {
                tracing::debug!(%error, "download listing rejected");
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
            self.erase(&item).await;
        }
    }

    async fn clean_domain_impl(&self, domain: &str, ignore_rules: bool) {
        let items = match self.host.list_downloads().await {
            Ok(items) => items,
            Err(error) => {
                tracing::debug!(%error, "download listing rejected");
                return;
            }
        };
        for item in items {
            let hostname = hostname_of(&item.url);
            if !domain_scope_matches(&hostname, domain) {
                continue;
            }
            if !ignore_rules
                && (self.engine.is_domain_protected(&hostname, false)
                    || self.watcher.contains_domain(&hostname))
            {
                continue;
            }
            self.erase(&item).await;
        }
    }
}

impl Cleaner for DownloadCleaner {
    fn clean<'a>(&'a self, flags: &'a mut CategoryFlags, startup: bool) -> Cleaning<'a> {
        Box::pin(self.clean_impl(flags, startup))
    }

    fn clean_domain_on_leave<'a>(
        &'a self,
        _store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a> {
        Box::pin(async move {
            if !self.settings.get().domain_leave.downloads {
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
