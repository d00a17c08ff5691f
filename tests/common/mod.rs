//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tabsweep::host::{
    BrowsingHost, CategoryFlags, CookieInfo, CookieStoreId, DownloadItem, FrameId, FrameProbe,
    HistoryItem, HostError, Listing, Probing, Removing, TabId,
};
use tabsweep::watcher::{DomainTransition, DomainWatcher};
use time::OffsetDateTime;
use url::Url;

/// Frame probe whose dead frames are scripted by the test.
pub struct RecordingProbe {
    dead: Mutex<HashSet<(TabId, FrameId)>>,
    probed: Mutex<Vec<(TabId, FrameId)>>,
}

impl RecordingProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { dead: Mutex::new(HashSet::new()), probed: Mutex::new(Vec::new()) })
    }

    pub fn mark_dead(&self, tab: TabId, frame: FrameId) {
        self.dead.lock().unwrap().insert((tab, frame));
    }

    pub fn probe_count(&self) -> usize {
        self.probed.lock().unwrap().len()
    }
}

impl FrameProbe for RecordingProbe {
    fn probe(&self, tab: TabId, frame: FrameId) -> Probing {
        self.probed.lock().unwrap().push((tab, frame));
        let gone = self.dead.lock().unwrap().contains(&(tab, frame));
        Box::pin(async move {
            if gone {
                Err(HostError::FrameGone { tab, frame })
            } else {
                Ok(())
            }
        })
    }
}

/// In-memory browsing host.
pub struct MemoryHost {
    pub stores: Mutex<Vec<CookieStoreId>>,
    pub cookies: Mutex<Vec<CookieInfo>>,
    pub history: Mutex<Vec<HistoryItem>>,
    pub downloads: Mutex<Vec<DownloadItem>>,
    pub storage_removals: Mutex<Vec<(CookieStoreId, Vec<String>)>>,
    pub bulk_calls: Mutex<Vec<CategoryFlags>>,
}

impl MemoryHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stores: Mutex::new(vec![CookieStoreId::from("default")]),
            cookies: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            downloads: Mutex::new(Vec::new()),
            storage_removals: Mutex::new(Vec::new()),
            bulk_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn add_cookie(&self, name: &str, domain: &str) {
        self.cookies.lock().unwrap().push(CookieInfo {
            name: name.to_string(),
            value: "value".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            store_id: CookieStoreId::from("default"),
            expires: Some(OffsetDateTime::now_utc() + time::Duration::days(30)),
            secure: false,
        });
    }

    pub fn cookie_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.cookies.lock().unwrap().iter().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    pub fn add_history(&self, url: &str) {
        self.history.lock().unwrap().push(HistoryItem { url: Url::parse(url).unwrap() });
    }

    pub fn history_urls(&self) -> Vec<String> {
        self.history.lock().unwrap().iter().map(|h| h.url.to_string()).collect()
    }
}

impl BrowsingHost for MemoryHost {
    fn list_cookie_stores(&self) -> Listing<CookieStoreId> {
        let stores = self.stores.lock().unwrap().clone();
        Box::pin(async move { Ok(stores) })
    }

    fn list_cookies(&self, store: &CookieStoreId) -> Listing<CookieInfo> {
        let cookies: Vec<CookieInfo> = self
            .cookies
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.store_id == store)
            .cloned()
            .collect();
        Box::pin(async move { Ok(cookies) })
    }

    fn remove_cookie(
        &self,
        store: &CookieStoreId,
        name: &str,
        domain: &str,
        path: &str,
    ) -> Removing {
        let mut cookies = self.cookies.lock().unwrap();
        let before = cookies.len();
        cookies.retain(|c| {
            !(&c.store_id == store && c.name == name && c.domain == domain && c.path == path)
        });
        let removed = cookies.len() != before;
        Box::pin(async move {
            if removed {
                Ok(())
            } else {
                Err(HostError::NotFound("cookie".to_string()))
            }
        })
    }

    fn remove_local_storage(&self, store: &CookieStoreId, hostnames: &[String]) -> Removing {
        self.storage_removals.lock().unwrap().push((store.clone(), hostnames.to_vec()));
        Box::pin(async move { Ok(()) })
    }

    fn list_history(&self) -> Listing<HistoryItem> {
        let items = self.history.lock().unwrap().clone();
        Box::pin(async move { Ok(items) })
    }

    fn remove_history_url(&self, url: &Url) -> Removing {
        self.history.lock().unwrap().retain(|h| &h.url != url);
        Box::pin(async move { Ok(()) })
    }

    fn list_downloads(&self) -> Listing<DownloadItem> {
        let items = self.downloads.lock().unwrap().clone();
        Box::pin(async move { Ok(items) })
    }

    fn erase_download(&self, id: u32) -> Removing {
        self.downloads.lock().unwrap().retain(|d| d.id != id);
        Box::pin(async move { Ok(()) })
    }

    fn remove_bulk(&self, categories: CategoryFlags) -> Removing {
        self.bulk_calls.lock().unwrap().push(categories);
        Box::pin(async move { Ok(()) })
    }
}

/// Record enter/leave transitions as ("enter"/"leave", store, domain).
pub fn record_transitions(watcher: &DomainWatcher) -> Arc<Mutex<Vec<(String, String, String)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let enter_log = Arc::clone(&log);
    watcher.add_domain_enter_listener(move |t: &DomainTransition| {
        enter_log.lock().unwrap().push((
            "enter".to_string(),
            t.store_id.0.clone(),
            t.domain.clone(),
        ));
    });
    let leave_log = Arc::clone(&log);
    watcher.add_domain_leave_listener(move |t: &DomainTransition| {
        leave_log.lock().unwrap().push((
            "leave".to_string(),
            t.store_id.0.clone(),
            t.domain.clone(),
        ));
    });
    log
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}
