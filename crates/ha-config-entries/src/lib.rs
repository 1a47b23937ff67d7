//! Config Entries
//!
//! A config entry is one configured instance of an integration. This crate
//! holds the entry type, its lifecycle state machine, the [`Integration`]
//! trait integrations implement, and the [`ConfigEntries`] manager that
//! drives setup and unload and maps setup failures onto entry states.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`SetupError`] - How an integration reports a failed setup
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`HomeAssistant`] - The hub handle passed to integrations

pub mod entry;
pub mod hass;
pub mod integration;
pub mod manager;
pub mod state_machine;

// Re-export main types
pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState};
pub use hass::HomeAssistant;
pub use integration::{Integration, SetupError};
pub use manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};
pub use state_machine::{calculate_retry_delay, InvalidTransition};
