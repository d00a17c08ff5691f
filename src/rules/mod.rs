//! Rule compilation and cleanup classification.
//!
//! [`RuleEngine`] turns the externally-owned, ordered rule list into
//! compiled matchers and answers "what happens to this domain (or this
//! cookie)" queries. Precedence is last-writer-wins: rules are scanned in
//! list order and the final match decides, so a later rule overrides any
//! earlier one without a priority scheme.

pub mod matcher;

use crate::base::error::CleanupError;
use crate::base::settings::{CleanupType, Rule, Settings, SettingsHandle};
use crate::rules::matcher::compile_expression;
use regex::Regex;
use std::sync::RwLock;

/// A rule with its compiled matcher.
#[derive(Debug)]
pub struct CompiledRule {
    pub definition: Rule,
    regex: Regex,
    cookie_name: Option<String>,
}

impl CompiledRule {
    pub fn compile(definition: &Rule) -> Result<Self, CleanupError> {
        let compiled = compile_expression(&definition.expression)?;
        Ok(Self {
            definition: definition.clone(),
            regex: compiled.regex,
            cookie_name: compiled.cookie_name,
        })
    }

    pub fn matches_domain(&self, domain: &str) -> bool {
        self.regex.is_match(domain)
    }

    pub fn cookie_name(&self) -> Option<&str> {
        self.cookie_name.as_deref()
    }
}

#[derive(Default)]
struct CompiledRules {
    /// Rules without a cookie qualifier, in list order.
    domain_rules: Vec<CompiledRule>,
    /// `cookieName@domain` rules, in list order.
    cookie_rules: Vec<CompiledRule>,
}

impl CompiledRules {
    fn build(rules: &[Rule]) -> Self {
        let mut compiled = CompiledRules::default();
        for rule in rules {
            match CompiledRule::compile(rule) {
                Ok(entry) => {
                    if entry.cookie_name.is_some() {
                        compiled.cookie_rules.push(entry);
                    } else {
                        compiled.domain_rules.push(entry);
                    }
                }
                Err(error) => {
                    tracing::warn!(expression = %rule.expression, %error, "skipping invalid rule");
                }
            }
        }
        compiled
    }
}

/// Compiled view over the current rule list.
pub struct RuleEngine {
    settings: SettingsHandle,
    compiled: RwLock<CompiledRules>,
}

impl RuleEngine {
    pub fn new(settings: SettingsHandle) -> Self {
        let compiled = CompiledRules::build(&settings.get().rules);
        Self { settings, compiled: RwLock::new(compiled) }
    }

    /// Recompile from the current settings snapshot. Call when the
    /// settings channel reports a change.
    pub fn reload(&self) {
        let compiled = CompiledRules::build(&self.settings.get().rules);
        let count = compiled.domain_rules.len() + compiled.cookie_rules.len();
        *self.compiled.write().unwrap_or_else(|e| e.into_inner()) = compiled;
        tracing::debug!(rules = count, "rule set recompiled");
    }

    /// Validate a prospective rule list without applying it. Returns an
    /// error naming how many expressions failed, so callers can reject an
    /// import wholesale instead of applying it partially.
    pub fn validate(rules: &[Rule]) -> Result<(), CleanupError> {
        let invalid = rules.iter().filter(|r| CompiledRule::compile(r).is_err()).count();
        if invalid > 0 {
            return Err(CleanupError::RuleListRejected { invalid, total: rules.len() });
        }
        Ok(())
    }

    /// Effective classification for a domain.
    pub fn classify(&self, domain: &str) -> CleanupType {
        let settings = self.settings.get();
        if let Some(forced) = whitelist_override(domain, &settings) {
            return forced;
        }
        self.last_domain_match(domain).unwrap_or(settings.fallback_type)
    }

    /// Effective classification for a cookie. Cookie-qualified rules are
    /// consulted first (last match wins); without one the domain
    /// classification applies.
    pub fn classify_cookie(&self, domain: &str, cookie_name: &str) -> CleanupType {
        let settings = self.settings.get();
        if let Some(forced) = whitelist_override(domain, &settings) {
            return forced;
        }
        let name = cookie_name.to_lowercase();
        let compiled = self.compiled.read().unwrap_or_else(|e| e.into_inner());
        let cookie_match = compiled
            .cookie_rules
            .iter()
            .filter(|rule| rule.cookie_name() == Some(name.as_str()))
            .filter(|rule| rule.matches_domain(domain))
            .last()
            .map(|rule| rule.definition.rule_type);
        drop(compiled);
        cookie_match
            .or_else(|| self.last_domain_match(domain))
            .unwrap_or(settings.fallback_type)
    }

    fn last_domain_match(&self, domain: &str) -> Option<CleanupType> {
        let compiled = self.compiled.read().unwrap_or_else(|e| e.into_inner());
        compiled
            .domain_rules
            .iter()
            .filter(|rule| rule.matches_domain(domain))
            .last()
            .map(|rule| rule.definition.rule_type)
    }

    /// Whether automatic passes must keep this domain's data.
    pub fn is_domain_protected(&self, domain: &str, ignore_startup_rule: bool) -> bool {
        match self.classify(domain) {
            CleanupType::Never => true,
            CleanupType::Startup => !ignore_startup_rule,
            CleanupType::Leave | CleanupType::Instantly => false,
        }
    }

    /// Whether this domain is cleaned the moment it is observed.
    pub fn is_domain_blocked(&self, domain: &str) -> bool {
        self.classify(domain) == CleanupType::Instantly
    }

    /// Whether any rule at all is an INSTANTLY rule. Used to shortcut the
    /// per-event cookie path when nothing can match.
    pub fn has_any_blocking_rule(&self) -> bool {
        let compiled = self.compiled.read().unwrap_or_else(|e| e.into_inner());
        compiled
            .domain_rules
            .iter()
            .chain(compiled.cookie_rules.iter())
            .any(|rule| rule.definition.rule_type == CleanupType::Instantly)
    }
}

/// Whitelist switches win over every rule match.
fn whitelist_override(domain: &str, settings: &Settings) -> Option<CleanupType> {
    if domain.is_empty() {
        return settings.whitelist_file_system.then_some(CleanupType::Never);
    }
    if !domain.contains('.') && settings.whitelist_no_tld {
        return Some(CleanupType::Never);
    }
    None
}
