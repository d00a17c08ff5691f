//! Per-tab frame aggregation and dead-frame bookkeeping.

use crate::base::psl::FirstPartyRegister;
use crate::base::timer::CancelableTimer;
use crate::host::{CookieStoreId, FrameId, TabId};
use crate::watcher::frame::FrameInfo;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between dead-frame probes of one tab.
pub(crate) const DEAD_FRAME_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

/// Frame state for a single tab, owned by the watcher.
///
/// Frame 0 (the top-level frame) always exists. Committing a top-level
/// navigation ends every sub-frame's lifetime.
pub struct TabInfo {
    pub tab_id: TabId,
    pub cookie_store_id: CookieStoreId,
    frame_infos: HashMap<FrameId, FrameInfo>,
    pub(crate) last_dead_frame_check: Option<Instant>,
    pub(crate) dead_frame_timer: Option<CancelableTimer>,
}

impl TabInfo {
    pub fn new(tab_id: TabId, cookie_store_id: CookieStoreId) -> Self {
        let mut frame_infos = HashMap::new();
        frame_infos.insert(FrameId::TOP, FrameInfo::new());
        Self {
            tab_id,
            cookie_store_id,
            frame_infos,
            last_dead_frame_check: None,
            dead_frame_timer: None,
        }
    }

    fn frame_mut(&mut self, frame_id: FrameId) -> &mut FrameInfo {
        self.frame_infos.entry(frame_id).or_default()
    }

    pub fn frame(&self, frame_id: FrameId) -> Option<&FrameInfo> {
        self.frame_infos.get(&frame_id)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_infos.len()
    }

    /// Delegate to the frame's state machine, creating it on demand.
    pub fn prepare_navigation(
        &mut self,
        frame_id: FrameId,
        hostname: &str,
        register: &dyn FirstPartyRegister,
    ) -> Option<String> {
        self.frame_mut(frame_id).prepare_navigation(hostname, register)
    }

    /// Commit a navigation; for frame 0 this discards every other frame.
    ///
    /// Returns all hostnames this tab stopped referencing, for leave
    /// accounting: the frame's own replaced/abandoned hostnames plus, on
    /// a top-level commit, everything the discarded frames referenced.
    pub fn commit_navigation(
        &mut self,
        frame_id: FrameId,
        hostname: &str,
        register: &dyn FirstPartyRegister,
    ) -> Vec<String> {
        let mut dropped = Vec::new();
        if frame_id.is_top() {
            self.frame_infos.retain(|id, frame| {
                if id.is_top() {
                    return true;
                }
                dropped.extend(frame.visible_hostnames());
                false
            });
        }
        dropped.extend(self.frame_mut(frame_id).commit_navigation(hostname, register));
        dropped.sort();
        dropped.dedup();
        dropped
    }

    /// Every hostname referenced by any frame, committed or pending.
    pub fn visible_hostnames(&self) -> Vec<String> {
        let mut hostnames: Vec<String> =
            self.frame_infos.values().flat_map(|f| f.visible_hostnames()).collect();
        hostnames.sort();
        hostnames.dedup();
        hostnames
    }

    pub fn contains_hostname(&self, hostname: &str, check_next: bool) -> bool {
        self.frame_infos.values().any(|f| f.match_hostname(hostname, check_next))
    }

    /// First-party match; `deep` includes sub-frames, otherwise only the
    /// top-level frame counts.
    pub fn matches_first_party(&self, first_party: &str, deep: bool) -> bool {
        if deep {
            self.frame_infos.values().any(|f| f.match_hostname_first_party(first_party))
        } else {
            self.frame_infos
                .get(&FrameId::TOP)
                .is_some_and(|f| f.match_hostname_first_party(first_party))
        }
    }

    /// Sub-frames settled long enough to probe safely.
    pub fn frames_to_probe(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self
            .frame_infos
            .iter()
            .filter(|(id, frame)| !id.is_top() && frame.is_idle())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Whether any sub-frame is currently mid-navigation or too fresh to
    /// probe. Such tabs need a follow-up check.
    pub fn has_busy_subframes(&self) -> bool {
        self.frame_infos.iter().any(|(id, frame)| !id.is_top() && !frame.is_idle())
    }

    /// Drop the given frames, returning the hostnames they referenced.
    pub fn remove_frames(&mut self, frame_ids: &[FrameId]) -> Vec<String> {
        let mut dropped = Vec::new();
        for frame_id in frame_ids {
            if frame_id.is_top() {
                continue;
            }
            if let Some(frame) = self.frame_infos.remove(frame_id) {
                dropped.extend(frame.visible_hostnames());
            }
        }
        dropped.sort();
        dropped.dedup();
        dropped
    }

    /// Whether enough time has passed since the last probe to run another
    /// immediately; `None` when a probe has never run.
    pub fn dead_frame_check_due(&self) -> bool {
        match self.last_dead_frame_check {
            None => true,
            Some(last) => last.elapsed() >= DEAD_FRAME_CHECK_INTERVAL,
        }
    }

    /// Time remaining until the next probe slot.
    pub fn dead_frame_check_remaining(&self) -> Duration {
        match self.last_dead_frame_check {
            None => Duration::ZERO,
            Some(last) => DEAD_FRAME_CHECK_INTERVAL.saturating_sub(last.elapsed()),
        }
    }
}
