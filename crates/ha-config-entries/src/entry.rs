//! Config entry types
//!
//! A [`ConfigEntry`] is one configured instance of an integration, e.g. one
//! Vantage controller reachable at one host.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::InvalidTransition;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Not set up
    #[default]
    NotLoaded,
    /// Setup is running
    SetupInProgress,
    /// Setup succeeded
    Loaded,
    /// Setup failed and will not be retried automatically
    SetupError,
    /// Setup failed on a transient problem and should be retried
    SetupRetry,
    /// Version migration failed
    MigrationError,
    /// Unload is running
    UnloadInProgress,
    /// Unload failed
    FailedUnload,
}

impl ConfigEntryState {
    /// Whether the entry may be unloaded or set up again from this state
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigEntryState::NotLoaded
                | ConfigEntryState::Loaded
                | ConfigEntryState::SetupError
                | ConfigEntryState::SetupRetry
        )
    }
}

/// How the entry was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Configured by the user
    #[default]
    User,
    /// Imported from YAML
    Import,
    /// Found over mDNS
    Zeroconf,
    /// Created by a re-authentication flow
    Reauth,
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g. "vantage")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    /// Configuration data handed to the integration
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// Optional unique identifier for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Why the entry is in a failed state
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Number of consecutive setup retries (not persisted)
    #[serde(skip, default)]
    pub tries: u32,

    /// Set when setup was rejected for credentials; cleared by the next successful setup
    #[serde(skip, default)]
    pub reauth_required: bool,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            unique_id: None,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            tries: 0,
            reauth_required: false,
            disabled: false,
            created_at: now,
            modified_at: now,
        }
    }

    /// Set entry data
    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Set entry data from a JSON object; anything else leaves data empty
    pub fn with_json_data(mut self, data: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = data {
            self.data = map.into_iter().collect();
        }
        self
    }

    /// Set unique_id
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// Set source
    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    /// Entry data as a JSON object, for typed deserialization
    pub fn data_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Move to `new_state`, recording `reason`
    ///
    /// The retry counter survives only while the entry bounces between
    /// `SetupInProgress` and `SetupRetry`.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state = self.state.try_transition(new_state)?;
        self.reason = reason;
        if !matches!(
            new_state,
            ConfigEntryState::SetupRetry | ConfigEntryState::SetupInProgress
        ) {
            self.tries = 0;
        }
        self.modified_at = Utc::now();
        Ok(())
    }

    /// Increment the retry counter and return the new count
    pub fn increment_tries(&mut self) -> u32 {
        self.tries += 1;
        self.tries
    }
}
