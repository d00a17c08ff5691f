//! # tabsweep
//!
//! A Chromium-inspired browsing-data cleanup engine for Rust.
//!
//! `tabsweep` tracks which network domains are open across every tab and
//! frame of a host browser, matches domains and cookies against an
//! ordered wildcard rule set, and decides - at well-defined trigger
//! points - whether domain-scoped data (cookies, local storage, history,
//! downloads) is purged immediately, after a delay, or protected.
//!
//! ## Features
//!
//! - **Frame Tracking**: per-frame navigation state machines with
//!   redirect handling and dead-frame recovery via liveness probes
//! - **Domain Presence**: reference-counted domain-enter/leave events,
//!   exactly once per transition, per cookie store
//! - **Wildcard Rules**: `*.example.com` / `cookieName@domain` patterns
//!   compiled once, last-match-wins precedence
//! - **Scheduled Cleanup**: debounced, cancelable, snooze-aware delays
//!   between "domain closed" and "data purged"
//! - **Per-Category Cleaners**: cookies (with an instant per-event
//!   path), local storage, history, downloads
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabsweep::service::{CleanupContext, CleanupContextConfig};
//! use tabsweep::host::{FrameId, TabId};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = CleanupContext::new(CleanupContextConfig::default(), probe, host);
//!     context.spawn_settings_listener();
//!
//!     // Feed host navigation events:
//!     let url = Url::parse("https://example.com/").unwrap();
//!     context.watcher().on_tab_created(TabId(1), "default".into(), Some(&url));
//!     context.watcher().on_committed(TabId(1), FrameId::TOP, &url);
//!
//!     // Run a bulk cleanup pass:
//!     context.run_cleanup().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Errors, timers, listener registries, settings, eTLD+1
//! - [`host`] - Host-platform traits (probe, enumeration, removal)
//! - [`watcher`] - Frame/tab state machines and domain presence
//! - [`rules`] - Rule compilation and cleanup classification
//! - [`scheduler`] - Debounced delayed cleanup
//! - [`cleaners`] - Per-category cleanup decisions
//! - [`service`] - Context wiring it all together
//!
//! ## Behavior Notes
//!
//! Nothing in this crate is fatal at runtime: rejected host calls are
//! expected outcomes (a rejected liveness probe *is* the dead-frame
//! signal), malformed rules are excluded at compile time, and the worst
//! failure mode is an item surviving until the next pass.

pub mod base;
pub mod cleaners;
pub mod host;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod watcher;
