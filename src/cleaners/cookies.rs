//! Cookie cleanup decisions.
//!
//! Cookies are the only category with a per-event path in addition to
//! the bulk passes: INSTANTLY-classified cookies (and, when configured,
//! third-party cookies) are removed the moment the host reports them
//! being set, either as a structured change event or as a raw
//! `Set-Cookie` header.

use crate::base::psl::FirstPartyRegister;
use crate::base::settings::{CleanupType, Settings, SettingsHandle};
use crate::cleaners::{Cleaner, Cleaning};
use crate::host::{BrowsingHost, CategoryFlags, CookieInfo, CookieStoreId, TabId};
use crate::rules::RuleEngine;
use crate::watcher::DomainWatcher;
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

pub struct CookieCleaner {
    settings: SettingsHandle,
    engine: Arc<RuleEngine>,
    watcher: DomainWatcher,
    register: Arc<dyn FirstPartyRegister>,
    host: Arc<dyn BrowsingHost>,
}

impl CookieCleaner {
    pub fn new(
        settings: SettingsHandle,
        engine: Arc<RuleEngine>,
        watcher: DomainWatcher,
        register: Arc<dyn FirstPartyRegister>,
        host: Arc<dyn BrowsingHost>,
    ) -> Self {
        Self { settings, engine, watcher, register, host }
    }

    /// Whether a bulk pass deletes this cookie.
    fn should_purge(&self, cookie: &CookieInfo, startup: bool, settings: &Settings) -> bool {
        if settings.purge_expired_cookies && cookie.is_expired(OffsetDateTime::now_utc()) {
            return true;
        }
        let domain = cookie.normalized_domain();
        match self.engine.classify_cookie(domain, &cookie.name) {
            CleanupType::Never => return false,
            CleanupType::Startup if !startup => return false,
            _ => {}
        }
        // A cookie whose site is open in its own store stays, except on
        // the startup pass where nothing counts as open yet.
        if !startup {
            let first_party = self.register.first_party(domain);
            if self.watcher.cookie_store_contains_domain_first_party(
                &cookie.store_id,
                &first_party,
                true,
            ) {
                return false;
            }
        }
        true
    }

    /// Whether this cookie belongs to the given domain's site.
    fn in_domain_scope(&self, cookie: &CookieInfo, domain: &str, first_party: &str) -> bool {
        let cookie_domain = cookie.normalized_domain();
        cookie_domain == domain || self.register.first_party(cookie_domain) == first_party
    }

    async fn remove(&self, cookie: &CookieInfo) {
        if let Err(error) = self
            .host
            .remove_cookie(&cookie.store_id, &cookie.name, &cookie.domain, &cookie.path)
            .await
        {
            // Already gone; nothing to recover.
            tracing::debug!(name = %cookie.name, domain = %cookie.domain, %error, "cookie removal rejected");
        }
    }

    async fn clean_impl(&self, flags: &mut CategoryFlags, startup: bool) {
        if !flags.cookies {
            return;
        }
        let settings = self.settings.get();
        let pass = if startup { settings.startup.cookies } else { settings.cleanup.cookies };
        if !pass.apply_rules {
            // Wholesale removal happens at the host level instead.
            return;
        }
        flags.cookies = false;

        let stores = match self.host.list_cookie_stores().await {
            Ok(stores) => stores,
            Err(error) => {
                tracing::debug!(%error, "cookie store listing rejected");
                return;
            }
        };
        for store in stores {
            let cookies = match self.host.list_cookies(&store).await {
                Ok(cookies) => cookies,
                Err(error) => {
                    tracing::debug!(store = %store, %error, "cookie listing rejected");
                    continue;
                }
            };
            for cookie in cookies {
                if self.should_purge(&cookie, startup, &settings) {
                    self.remove(&cookie).await;
                }
            }
        }
    }

    async fn clean_domain_impl(&self, store_id: &CookieStoreId, domain: &str, ignore_rules: bool) {
        let settings = self.settings.get();
        let first_party = self.register.first_party(domain);
        let cookies = match self.host.list_cookies(store_id).await {
            Ok(cookies) => cookies,
            Err(error) => {
                tracing::debug!(store = %store_id, %error, "cookie listing rejected");
                return;
            }
        };
        let now = OffsetDateTime::now_utc();
        for cookie in cookies {
            if settings.purge_expired_cookies && cookie.is_expired(now) {
                self.remove(&cookie).await;
                continue;
            }
            if !self.in_domain_scope(&cookie, domain, &first_party) {
                continue;
            }
            if !ignore_rules {
                let cookie_domain = cookie.normalized_domain();
                if matches!(
                    self.engine.classify_cookie(cookie_domain, &cookie.name),
                    CleanupType::Never | CleanupType::Startup
                ) {
                    continue;
                }
                // The site may have re-opened under another hostname.
                if self.watcher.cookie_store_contains_domain_first_party(
                    store_id,
                    &self.register.first_party(cookie_domain),
                    true,
                ) {
                    continue;
                }
            }
            self.remove(&cookie).await;
        }
    }

    /// Per-event path: the host reports a cookie being set.
    ///
    /// `tab` is the originating tab, when known; third-party detection
    /// needs it and is skipped for background writes.
    pub async fn on_cookie_set(&self, tab: Option<TabId>, cookie: &CookieInfo) {
        let settings = self.settings.get();
        if !settings.instant.enabled {
            return;
        }
        let domain = cookie.normalized_domain();
        let classification = self.engine.classify_cookie(domain, &cookie.name);

        let purge = if settings.instant.cookies
            && self.engine.has_any_blocking_rule()
            && classification == CleanupType::Instantly
        {
            true
        } else if settings.instant.third_party_cookies
            && !matches!(classification, CleanupType::Never | CleanupType::Startup)
        {
            match tab {
                Some(tab) => self.watcher.is_third_party_cookie_on_tab(tab, &cookie.domain),
                None => false,
            }
        } else {
            false
        };

        if purge {
            tracing::debug!(name = %cookie.name, domain = %cookie.domain, "instant cookie removal");
            self.remove(cookie).await;
        }
    }

    /// Per-event path fed from a raw `Set-Cookie` response header.
    pub async fn on_set_cookie_header(
        &self,
        store_id: &CookieStoreId,
        tab: Option<TabId>,
        url: &Url,
        header: &str,
    ) {
        let Some(cookie) = parse_set_cookie(store_id, url, header) else {
            tracing::debug!(header, "unparseable Set-Cookie header");
            return;
        };
        self.on_cookie_set(tab, &cookie).await;
    }
}

/// Build a [`CookieInfo`] from a `Set-Cookie` header line, defaulting the
/// domain to the response URL's host as browsers do.
fn parse_set_cookie(store_id: &CookieStoreId, url: &Url, header: &str) -> Option<CookieInfo> {
    let parsed = cookie::Cookie::parse(header).ok()?;
    let domain = match parsed.domain() {
        // Explicit domain attribute: stored with the leading dot marker.
        Some(domain) => format!(".{}", domain.trim_start_matches('.').to_lowercase()),
        None => url.host_str()?.to_lowercase(),
    };
    Some(CookieInfo {
        name: parsed.name().to_string(),
        value: parsed.value().to_string(),
        domain,
        path: parsed.path().unwrap_or("/").to_string(),
        store_id: store_id.clone(),
        expires: parsed.expires().and_then(|e| e.datetime()),
        secure: parsed.secure().unwrap_or(false),
    })
}

impl Cleaner for CookieCleaner {
    fn clean<'a>(&'a self, flags: &'a mut CategoryFlags, startup: bool) -> Cleaning<'a> {
        Box::pin(self.clean_impl(flags, startup))
    }

    fn clean_domain_on_leave<'a>(
        &'a self,
        store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a> {
        Box::pin(async move {
            if !self.settings.get().domain_leave.cookies {
                return;
            }
            // Re-validate: the domain may have re-opened while the leave
            // delay was running.
            if self.watcher.cookie_store_contains_domain(store_id, domain, true) {
                return;
            }
            self.clean_domain_impl(store_id, domain, false).await;
        })
    }

    fn clean_domain_now<'a>(
        &'a self,
        store_id: &'a CookieStoreId,
        domain: &'a str,
    ) -> Cleaning<'a> {
        Box::pin(self.clean_domain_impl(store_id, domain, true))
    }
}
