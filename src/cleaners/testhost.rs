//! In-memory host double for cleaner tests.

use crate::host::{
    BrowsingHost, CategoryFlags, CookieInfo, CookieStoreId, DownloadItem, HistoryItem, HostError,
    Listing, Removing,
};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use url::Url;

pub struct MockHost {
    pub stores: Mutex<Vec<CookieStoreId>>,
    pub cookies: Mutex<Vec<CookieInfo>>,
    pub history: Mutex<Vec<HistoryItem>>,
    pub downloads: Mutex<Vec<DownloadItem>>,
    pub storage_removals: Mutex<Vec<(CookieStoreId, Vec<String>)>>,
    pub bulk_calls: Mutex<Vec<CategoryFlags>>,
}

impl MockHost {
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
        self.add_cookie_in(name, domain, "default");
    }

    pub fn add_cookie_in(&self, name: &str, domain: &str, store: &str) {
        self.cookies.lock().unwrap().push(CookieInfo {
            name: name.to_string(),
            value: "value".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            store_id: CookieStoreId::from(store),
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

    pub fn add_download(&self, id: u32, url: &str) {
        self.downloads
            .lock()
            .unwrap()
            .push(DownloadItem { id, url: Url::parse(url).unwrap() });
    }

    pub fn download_ids(&self) -> Vec<u32> {
        self.downloads.lock().unwrap().iter().map(|d| d.id).collect()
    }
}

impl BrowsingHost for MockHost {
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
        let mut items = self.history.lock().unwrap();
        items.retain(|h| &h.url != url);
        Box::pin(async move { Ok(()) })
    }

    fn list_downloads(&self) -> Listing<DownloadItem> {
        let items = self.downloads.lock().unwrap().clone();
        Box::pin(async move { Ok(items) })
    }

    fn erase_download(&self, id: u32) -> Removing {
        let mut items = self.downloads.lock().unwrap();
        items.retain(|d| d.id != id);
        Box::pin(async move { Ok(()) })
    }

    fn remove_bulk(&self, categories: CategoryFlags) -> Removing {
        self.bulk_calls.lock().unwrap().push(categories);
        Box::pin(async move { Ok(()) })
    }
}
