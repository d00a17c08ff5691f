//! Cleanup-pass decision logic, one cleaner per data category.
//!
//! Cleaners do not delete anything themselves; they decide, item by item,
//! what survives a pass and drive the host's removal calls. A cleaner
//! that fully handled its category clears the category's flag; whatever
//! is still flagged after every cleaner ran goes to the host's wholesale
//! removal in one call.

pub mod cookies;
pub mod downloads;
pub mod history;
pub mod localstorage;

#[cfg(test)]
pub(crate) mod testhost;

use crate::base::settings::SettingsHandle;
use crate::host::{BrowsingHost, CategoryFlags, CookieStoreId};
use crate::rules::RuleEngine;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future type for cleaner passes.
pub type Cleaning<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A per-category cleanup decision maker.
pub trait Cleaner: Send + Sync {
    /// Run a bulk pass. `startup` marks the startup pass, which ignores
    /// STARTUP-typed protection and open-domain protection.
    fn clean<'a>(&'a self, flags: &'a mut CategoryFlags, startup: bool) -> Cleaning<'a>;

    /// A domain finished its leave delay; purge its data in one store,
    /// honoring rules and re-checking that it did not re-open.
    fn clean_domain_on_leave<'a>(
        &'a self,
        store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a>;

    /// Explicit user action: purge the domain's data regardless of rules
    /// and open-domain protection.
    fn clean_domain_now<'a>(
        &'a self,
        store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a>;
}

/// Whether `hostname` is `domain` itself or one of its subdomains.
pub(crate) fn domain_scope_matches(hostname: &str, domain: &str) -> bool {
    if hostname == domain {
        return true;
    }
    hostname.len() > domain.len()
        && hostname.ends_with(domain)
        && hostname.as_bytes()[hostname.len() - domain.len() - 1] == b'.'
}

/// Orchestrates bulk and per-domain passes across every cleaner.
///
/// Modeled after Chromium's BrowsingDataRemover: one entry point builds
/// the requested category set, individual removers narrow it down, and a
/// single host call handles whatever remains.
pub struct BrowsingDataRemover {
    settings: SettingsHandle,
    engine: Arc<RuleEngine>,
    host: Arc<dyn BrowsingHost>,
    cleaners: Vec<Arc<dyn Cleaner>>,
}

impl BrowsingDataRemover {
    pub fn new(settings: SettingsHandle, engine: Arc<RuleEngine>, host: Arc<dyn BrowsingHost>) -> Self {
        Self { settings, engine, host, cleaners: Vec::new() }
    }

    pub fn add_cleaner(&mut self, cleaner: Arc<dyn Cleaner>) {
        self.cleaners.push(cleaner);
    }

    /// The regular bulk pass over the categories enabled for it.
    pub async fn run_cleanup(&self) {
        self.run(false).await;
    }

    /// The startup pass: temporary rules are dropped first, then the
    /// startup categories are cleaned with startup-only protection
    /// ignored.
    pub async fn run_startup_cleanup(&self) {
        let removed = self.settings.remove_temporary_rules();
        if removed > 0 {
            tracing::debug!(removed, "temporary rules dropped at startup");
            self.engine.reload();
        }
        self.run(true).await;
    }

    async fn run(&self, startup: bool) {
        let settings = self.settings.get();
        let pass = if startup { &settings.startup } else { &settings.cleanup };
        let mut flags = CategoryFlags {
            cookies: pass.cookies.enabled,
            local_storage: pass.local_storage.enabled,
            history: pass.history.enabled,
            downloads: pass.downloads.enabled,
        };
        if !flags.any() {
            return;
        }
        tracing::debug!(startup, "cleanup pass started");

        for cleaner in &self.cleaners {
            cleaner.clean(&mut flags, startup).await;
        }

        // Whatever no cleaner handled item-by-item is removed wholesale.
        if flags.any() {
            if let Err(error) = self.host.remove_bulk(flags).await {
                tracing::debug!(%error, "bulk removal rejected");
            }
        }
    }

    /// Leave-delay expiry for one (store, domain) pair.
    pub async fn clean_domain_on_leave(&self, store_id: &CookieStoreId, domain: &str) {
        for cleaner in &self.cleaners {
            cleaner.clean_domain_on_leave(store_id, domain).await;
        }
    }

    /// Explicit "clean this domain now" request.
    pub async fn clean_domain_now(&self, store_id: &CookieStoreId, domain: &str) {
        for cleaner in &self.cleaners {
            cleaner.clean_domain_now(store_id, domain).await;
        }
    }
}
