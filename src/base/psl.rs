//! First-party (registrable domain) computation.
//!
//! Cookies and storage are scoped per site, not per hostname, so most
//! cleanup decisions compare at the eTLD+1 granularity. The Public Suffix
//! List semantics are swappable behind [`FirstPartyRegister`] so tests do
//! not depend on the live list.
//!
//! Uses Mozilla's Public Suffix List via the `psl` crate.

use std::sync::Arc;

/// Maps hostnames to their first-party (registrable, eTLD+1) domain.
///
/// # Design Notes
///
/// - Lookups are assumed to be cheap and infallible; hostnames with no
///   registrable domain (single-label hosts, IP literals) map to
///   themselves.
/// - The empty hostname (local files) maps to the empty string.
pub trait FirstPartyRegister: Send + Sync {
    /// Compute the first-party domain for `hostname`.
    ///
    /// For "sub.example.com", returns "example.com".
    /// For "example.com", returns "example.com".
    /// For "localhost", returns "localhost".
    fn first_party(&self, hostname: &str) -> String;
}

/// Blanket implementation for Arc-wrapped registers.
impl<R: FirstPartyRegister + ?Sized> FirstPartyRegister for Arc<R> {
    fn first_party(&self, hostname: &str) -> String {
        (**self).first_party(hostname)
    }
}

/// [`FirstPartyRegister`] backed by the `psl` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PslFirstParty;

impl FirstPartyRegister for PslFirstParty {
    fn first_party(&self, hostname: &str) -> String {
        let lower = hostname.to_lowercase();
        psl::domain(lower.as_bytes())
            .and_then(|d| std::str::from_utf8(d.as_bytes()).ok())
            .map(|s| s.to_string())
            .unwrap_or(lower)
    }
}

/// Check if a domain is a public suffix (e.g., "com", "co.uk").
/// Returns true if the domain itself is a public suffix.
pub fn is_public_suffix(domain: &str) -> bool {
    use psl::Psl;

    let lower = domain.to_lowercase();
    let bytes = lower.as_bytes();
    match psl::List.suffix(bytes) {
        Some(suffix) => suffix.as_bytes() == bytes,
        // Unknown TLD - not a listed suffix
        None => false,
    }
}
