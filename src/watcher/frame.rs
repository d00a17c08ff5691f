//! Per-frame navigation state machine.

use crate::base::psl::FirstPartyRegister;
use std::time::Duration;
use tokio::time::Instant;

/// A frame counts as settled this long after its last transition.
/// Probing a frame mid-navigation would misreport it as dead.
pub(crate) const FRAME_IDLE_AFTER: Duration = Duration::from_millis(1000);

/// Navigation state of a single frame.
///
/// A frame is either idle on its committed hostname or navigating toward
/// a pending one. `navigating` is true exactly while a
/// [`prepare_navigation`](FrameInfo::prepare_navigation) has not yet been
/// consumed by a [`commit_navigation`](FrameInfo::commit_navigation).
#[derive(Debug)]
pub struct FrameInfo {
    hostname: String,
    hostname_first_party: String,
    next_hostname: String,
    next_hostname_first_party: String,
    navigating: bool,
    last_timestamp: Instant,
}

impl FrameInfo {
    pub fn new() -> Self {
        Self {
            hostname: String::new(),
            hostname_first_party: String::new(),
            next_hostname: String::new(),
            next_hostname_first_party: String::new(),
            navigating: false,
            last_timestamp: Instant::now(),
        }
    }

    /// Record an intended navigation to `hostname`.
    ///
    /// Returns the previously pending hostname so the caller can account
    /// a leave for it. Re-preparing the already-pending hostname is a
    /// no-op and does not refresh the idle timestamp.
    pub fn prepare_navigation(
        &mut self,
        hostname: &str,
        register: &dyn FirstPartyRegister,
    ) -> Option<String> {
        if self.navigating && self.next_hostname == hostname {
            return None;
        }
        let previous = if self.navigating && !self.next_hostname.is_empty() {
            Some(std::mem::take(&mut self.next_hostname))
        } else {
            None
        };
        self.next_hostname = hostname.to_string();
        self.next_hostname_first_party = register.first_party(hostname);
        self.navigating = true;
        self.last_timestamp = Instant::now();
        previous
    }

    /// Commit a navigation to `hostname`.
    ///
    /// Always clears the pending state and exits `navigating`. Returns
    /// the hostnames this frame stopped referencing: the replaced
    /// committed hostname and, on a diverging redirect, the abandoned
    /// pending hostname.
    pub fn commit_navigation(
        &mut self,
        hostname: &str,
        register: &dyn FirstPartyRegister,
    ) -> Vec<String> {
        let mut dropped = Vec::new();
        if self.navigating && !self.next_hostname.is_empty() && self.next_hostname != hostname {
            dropped.push(std::mem::take(&mut self.next_hostname));
        }
        if self.hostname != hostname {
            if !self.hostname.is_empty() {
                dropped.push(self.hostname.clone());
            }
            self.hostname = hostname.to_string();
            self.hostname_first_party = register.first_party(hostname);
        }
        self.next_hostname.clear();
        self.next_hostname_first_party.clear();
        self.navigating = false;
        self.last_timestamp = Instant::now();
        dropped
    }

    /// Exact match against the committed hostname, or the pending one if
    /// `check_next` and a navigation is in flight.
    pub fn match_hostname(&self, hostname: &str, check_next: bool) -> bool {
        if !self.hostname.is_empty() && self.hostname == hostname {
            return true;
        }
        check_next && self.navigating && !self.next_hostname.is_empty()
            && self.next_hostname == hostname
    }

    /// Match at the eTLD+1 granularity, honoring the pending first-party
    /// while navigating. Used for third-party-cookie determination.
    pub fn match_hostname_first_party(&self, first_party: &str) -> bool {
        if !self.hostname_first_party.is_empty() && self.hostname_first_party == first_party {
            return true;
        }
        self.navigating
            && !self.next_hostname_first_party.is_empty()
            && self.next_hostname_first_party == first_party
    }

    /// Hostnames this frame currently references (committed and pending).
    pub fn visible_hostnames(&self) -> Vec<String> {
        let mut hostnames = Vec::with_capacity(2);
        if !self.hostname.is_empty() {
            hostnames.push(self.hostname.clone());
        }
        if self.navigating && !self.next_hostname.is_empty() && self.next_hostname != self.hostname
        {
            hostnames.push(self.next_hostname.clone());
        }
        hostnames
    }

    /// True iff not navigating and the last transition is old enough that
    /// a liveness probe will not race an in-flight load.
    pub fn is_idle(&self) -> bool {
        !self.navigating && self.last_timestamp.elapsed() >= FRAME_IDLE_AFTER
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn hostname_first_party(&self) -> &str {
        &self.hostname_first_party
    }

    pub fn next_hostname(&self) -> &str {
        &self.next_hostname
    }
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self::new()
    }
}
