//! The contract between the config entry manager and an integration

use async_trait::async_trait;
use thiserror::Error;

use crate::entry::ConfigEntry;
use crate::hass::HomeAssistant;

/// Why an integration could not set up an entry
///
/// The variant decides the entry's next state: credentials problems need the
/// user, connectivity problems are retried, everything else is an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Credentials were rejected or are missing; the user must re-authenticate
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The remote side is unreachable right now; retry later
    #[error("not ready: {0}")]
    NotReady(String),

    /// Setup failed for another reason
    #[error("setup failed: {0}")]
    Failed(String),
}

/// An integration that can be set up from config entries
#[async_trait]
pub trait Integration: Send + Sync {
    /// Domain this integration handles (e.g. "vantage")
    fn domain(&self) -> &str;

    /// Set up one config entry
    async fn setup_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry)
        -> Result<(), SetupError>;

    /// Unload a previously set up entry, returning whether it fully unloaded
    async fn unload_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry) -> bool;
}
