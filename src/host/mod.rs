//! Host-platform abstraction.
//!
//! The host browser delivers navigation and tab events, answers liveness
//! probes for frames, and performs the actual data removal. Everything it
//! provides sits behind the traits in this module, in the same shape as
//! the DNS abstraction: boxed-future methods on `Send + Sync` trait
//! objects with blanket `Arc` implementations.
//!
//! Rejected host calls are expected outcomes for this crate: a rejected
//! [`FrameProbe::probe`] is how dead frames are detected, and a rejected
//! removal means the item was already gone.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

/// Tab identifier assigned by the host browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u32);

/// Frame identifier within a tab. Frame 0 is the top-level frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    pub const TOP: FrameId = FrameId(0);

    pub fn is_top(self) -> bool {
        self == Self::TOP
    }
}

/// Storage-partition identifier (default vs. private browsing, containers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CookieStoreId(pub String);

impl CookieStoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CookieStoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CookieStoreId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Host-call failure. Treated as data, not as a crash path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("frame {frame:?} in tab {tab:?} no longer exists")]
    FrameGone { tab: TabId, frame: FrameId },
    #[error("no such item: {0}")]
    NotFound(String),
    #[error("host call rejected: {0}")]
    Rejected(String),
}

/// A cookie as enumerated from a cookie store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieInfo {
    pub name: String,
    pub value: String,
    /// Domain as stored by the host; may carry a leading dot.
    pub domain: String,
    pub path: String,
    pub store_id: CookieStoreId,
    /// None for session cookies.
    pub expires: Option<OffsetDateTime>,
    pub secure: bool,
}

impl CookieInfo {
    /// The cookie domain without the leading dot marker.
    pub fn normalized_domain(&self) -> &str {
        self.domain.strip_prefix('.').unwrap_or(&self.domain)
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }
}

/// A visited page as enumerated from the host history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub url: Url,
}

/// A download log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub id: u32,
    pub url: Url,
}

/// Data categories requested from (or still owed to) the host.
///
/// Cleaners clear the flag of a category they handled item-by-item; flags
/// still set after all cleaners ran go to [`BrowsingHost::remove_bulk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryFlags {
    pub cookies: bool,
    pub local_storage: bool,
    pub history: bool,
    pub downloads: bool,
}

impl CategoryFlags {
    pub const NONE: CategoryFlags =
        CategoryFlags { cookies: false, local_storage: false, history: false, downloads: false };

    pub fn any(&self) -> bool {
        self.cookies || self.local_storage || self.history || self.downloads
    }
}

/// Alias for the `Future` type returned by [`FrameProbe::probe`].
pub type Probing = Pin<Box<dyn Future<Output = Result<(), HostError>> + Send>>;

/// Alias for host enumeration futures.
pub type Listing<T> = Pin<Box<dyn Future<Output = Result<Vec<T>, HostError>> + Send>>;

/// Alias for host removal futures.
pub type Removing = Pin<Box<dyn Future<Output = Result<(), HostError>> + Send>>;

/// Lightweight frame-liveness probe.
///
/// The host platform has no reliable "frame destroyed" signal for
/// sub-frames; probing is the only way to learn a frame is gone.
pub trait FrameProbe: Send + Sync {
    /// Resolves if the frame still exists, rejects if it does not.
    fn probe(&self, tab: TabId, frame: FrameId) -> Probing;
}

/// Blanket implementation for Arc-wrapped probes.
impl<P: FrameProbe + ?Sized> FrameProbe for Arc<P> {
    fn probe(&self, tab: TabId, frame: FrameId) -> Probing {
        (**self).probe(tab, frame)
    }
}

/// Enumeration and removal of browser-managed data.
pub trait BrowsingHost: Send + Sync {
    fn list_cookie_stores(&self) -> Listing<CookieStoreId>;
    fn list_cookies(&self, store: &CookieStoreId) -> Listing<CookieInfo>;
    fn remove_cookie(
        &self,
        store: &CookieStoreId,
        name: &str,
        domain: &str,
        path: &str,
    ) -> Removing;

    /// Remove local storage for the given hostnames within one store.
    fn remove_local_storage(&self, store: &CookieStoreId, hostnames: &[String]) -> Removing;

    fn list_history(&self) -> Listing<HistoryItem>;
    fn remove_history_url(&self, url: &Url) -> Removing;

    fn list_downloads(&self) -> Listing<DownloadItem>;
    fn erase_download(&self, id: u32) -> Removing;

    /// Wholesale removal of entire categories, for passes that do not
    /// apply rules item-by-item.
    fn remove_bulk(&self, categories: CategoryFlags) -> Removing;
}

/// Blanket implementation for Arc-wrapped hosts.
impl<H: BrowsingHost + ?Sized> BrowsingHost for Arc<H> {
    fn list_cookie_stores(&self) -> Listing<CookieStoreId> {
        (**self).list_cookie_stores()
    }
    fn list_cookies(&self, store: &CookieStoreId) -> Listing<CookieInfo> {
        (**self).list_cookies(store)
    }
    fn remove_cookie(
        &self,
        store: &CookieStoreId,
        name: &str,
        domain: &str,
        path: &str,
    ) -> Removing {
        (**self).remove_cookie(store, name, domain, path)
    }
    fn remove_local_storage(&self, store: &CookieStoreId, hostnames: &[String]) -> Removing {
        (**self).remove_local_storage(store, hostnames)
    }
    fn list_history(&self) -> Listing<HistoryItem> {
        (**self).list_history()
    }
    fn remove_history_url(&self, url: &Url) -> Removing {
        (**self).remove_history_url(url)
    }
    fn list_downloads(&self) -> Listing<DownloadItem> {
        (**self).list_downloads()
    }
    fn erase_download(&self, id: u32) -> Removing {
        (**self).erase_download(id)
    }
    fn remove_bulk(&self, categories: CategoryFlags) -> Removing {
        (**self).remove_bulk(categories)
    }
}
