//! Base types shared by every component.
//!
//! - [`CleanupError`](error::CleanupError): rule-compilation failures
//! - [`CancelableTimer`](timer::CancelableTimer): abort-on-drop one-shot timers
//! - [`ListenerRegistry`](listeners::ListenerRegistry): ordered observers
//! - [`FirstPartyRegister`](psl::FirstPartyRegister): pluggable eTLD+1 lookups
//! - [`Settings`](settings::Settings) / [`SettingsHandle`](settings::SettingsHandle)

pub mod error;
pub mod listeners;
pub mod psl;
pub mod settings;
pub mod timer;
