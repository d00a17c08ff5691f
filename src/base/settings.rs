//! Settings model and change propagation.
//!
//! Components never read global mutable state; each one is handed a
//! [`SettingsHandle`] and reads a consistent snapshot per operation.
//! Updates go through the handle and are propagated over a single watch
//! channel, so consumers that need to react to changes (rule
//! recompilation, scheduler disable) subscribe once.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Effective cleanup policy for a domain or cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupType {
    /// Protected: never cleaned automatically.
    Never,
    /// Protected until the next startup pass.
    Startup,
    /// Cleaned after the domain is no longer open.
    Leave,
    /// Cleaned the moment it is observed.
    Instantly,
}

/// A user rule as supplied by configuration.
///
/// The expression is a dot-segment domain pattern, optionally prefixed
/// with `cookieName@`. A leading `*` matches the remaining segments and
/// any chain of subdomains before them; a `*` elsewhere matches exactly
/// one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub expression: String,
    #[serde(rename = "type")]
    pub rule_type: CleanupType,
    #[serde(default)]
    pub temporary: bool,
}

impl Rule {
    pub fn new(expression: &str, rule_type: CleanupType) -> Self {
        Self { expression: expression.to_string(), rule_type, temporary: false }
    }
}

/// Per-category switches for one cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySettings {
    /// Whether this category participates in the pass at all.
    pub enabled: bool,
    /// Whether rules are applied item-by-item. When false the category is
    /// handed to the host's wholesale removal instead.
    pub apply_rules: bool,
}

impl CategorySettings {
    pub const fn new(enabled: bool, apply_rules: bool) -> Self {
        Self { enabled, apply_rules }
    }
}

/// Category switches for a bulk or startup cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSettings {
    pub cookies: CategorySettings,
    pub local_storage: CategorySettings,
    pub history: CategorySettings,
    pub downloads: CategorySettings,
}

/// Behavior when a domain stops being open in every tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainLeaveSettings {
    /// Master switch for leave-triggered cleanup.
    pub enabled: bool,
    /// Delay between the leave event and the cleanup, in milliseconds.
    pub delay_ms: u64,
    pub cookies: bool,
    pub local_storage: bool,
    pub history: bool,
    pub downloads: bool,
}

impl DomainLeaveSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// The per-event cookie path, independent from bulk passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantSettings {
    pub enabled: bool,
    /// Remove cookies classified INSTANTLY as soon as they are set.
    pub cookies: bool,
    /// Also remove cookies that are third-party on the tab that set them.
    pub third_party_cookies: bool,
}

/// The full, externally-owned configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Ordered rule list; later entries override earlier ones.
    pub rules: Vec<Rule>,
    /// Classification applied when no rule matches.
    pub fallback_type: CleanupType,
    /// Treat dot-less hostnames (localhost, intranet names) as NEVER.
    pub whitelist_no_tld: bool,
    /// Treat the empty (file-system) hostname as NEVER.
    pub whitelist_file_system: bool,
    pub domain_leave: DomainLeaveSettings,
    /// Switches for the regular bulk pass.
    pub cleanup: PassSettings,
    /// Switches for the startup pass.
    pub startup: PassSettings,
    pub instant: InstantSettings,
    /// Delete already-expired cookies regardless of rules.
    pub purge_expired_cookies: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let on = CategorySettings::new(true, true);
        let off = CategorySettings::new(false, true);
        Self {
            rules: Vec::new(),
            fallback_type: CleanupType::Leave,
            whitelist_no_tld: true,
            whitelist_file_system: true,
            domain_leave: DomainLeaveSettings {
                enabled: false,
                delay_ms: 120_000,
                cookies: true,
                local_storage: true,
                history: false,
                downloads: false,
            },
            cleanup: PassSettings { cookies: on, local_storage: on, history: off, downloads: off },
            startup: PassSettings { cookies: off, local_storage: off, history: off, downloads: off },
            instant: InstantSettings { enabled: true, cookies: true, third_party_cookies: false },
            purge_expired_cookies: false,
        }
    }
}

/// Shared handle over the current [`Settings`] snapshot.
#[derive(Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<Arc<Settings>>>,
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsHandle {
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Self { tx: Arc::new(tx) }
    }

    /// The current snapshot. Cheap; holds no lock beyond the read.
    pub fn get(&self) -> Arc<Settings> {
        Arc::clone(&self.tx.borrow())
    }

    /// Mutate a copy of the current settings and publish it.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) {
        let mut next = (*self.get()).clone();
        mutate(&mut next);
        self.tx.send_replace(Arc::new(next));
    }

    /// Replace the settings wholesale.
    pub fn replace(&self, settings: Settings) {
        self.tx.send_replace(Arc::new(settings));
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Settings>> {
        self.tx.subscribe()
    }

    /// Drop rules marked `temporary`, returning how many were removed.
    /// Run by the startup pass.
    pub fn remove_temporary_rules(&self) -> usize {
        let before = self.get().rules.len();
        self.update(|settings| settings.rules.retain(|rule| !rule.temporary));
        before - self.get().rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fallback_is_leave() {
        let settings = Settings::default();
        assert_eq!(settings.fallback_type, CleanupType::Leave);
        assert!(settings.whitelist_no_tld);
        assert!(settings.whitelist_file_system);
        assert!(!settings.domain_leave.enabled);
    }

    #[test]
    fn test_update_publishes_to_subscribers() {
        let handle = SettingsHandle::default();
        let mut rx = handle.subscribe();
        assert!(!rx.has_changed().unwrap());

        handle.update(|s| s.domain_leave.enabled = true);

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().domain_leave.enabled);
        assert!(handle.get().domain_leave.enabled);
    }

    #[test]
    fn test_remove_temporary_rules() {
        let handle = SettingsHandle::default();
        handle.update(|s| {
            s.rules = vec![
                Rule::new("example.com", CleanupType::Never),
                Rule { expression: "temp.com".into(), rule_type: CleanupType::Leave, temporary: true },
            ];
        });

        assert_eq!(handle.remove_temporary_rules(), 1);
        let rules = &handle.get().rules;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].expression, "example.com");
    }

    #[test]
    fn test_rule_serde_roundtrip() {
        let rule = Rule::new("*.example.com", CleanupType::Instantly);
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"type\":\"instantly\""));
        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_rule_temporary_defaults_false() {
        let rule: Rule =
            serde_json::from_str(r#"{"expression":"a.com","type":"never"}"#).unwrap();
        assert!(!rule.temporary);
    }
}
