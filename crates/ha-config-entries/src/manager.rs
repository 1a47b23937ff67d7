//! Config Entries Manager
//!
//! Owns every config entry, runs integration setup/unload for them and maps
//! the outcome onto the entry lifecycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::hass::HomeAssistant;
use crate::integration::{Integration, SetupError};
use crate::state_machine::{calculate_retry_delay, InvalidTransition};

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("No integration registered for domain {0}")]
    NoIntegration(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Unload failed for entry {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config Entries Manager
///
/// Entries live in memory, indexed by id, domain and `(domain, unique_id)`.
/// Setup and unload are serialized by a single lock.
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Integrations by domain
    integrations: DashMap<String, Arc<dyn Integration>>,

    setup_lock: Mutex<()>,
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            integrations: DashMap::new(),
            setup_lock: Mutex::new(()),
        }
    }

    /// Register the integration that sets up entries of its domain
    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        let domain = integration.domain().to_string();
        debug!(domain = %domain, "Registered integration");
        self.integrations.insert(domain, integration);
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id.clone());
        }
        self.entries.insert(entry_id, entry.clone());
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    fn require(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(&entry_id))
    }

    /// Add a new config entry
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Apply `f` to the stored entry
    fn with_entry<R>(
        &self,
        entry_id: &str,
        f: impl FnOnce(&mut ConfigEntry) -> R,
    ) -> ConfigEntriesResult<R> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        Ok(f(entry.value_mut()))
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        self.with_entry(entry_id, |entry| entry.try_set_state(state, reason))??;
        Ok(())
    }

    /// Set up an entry with its domain's integration
    ///
    /// Returns the state the entry ended up in. Integration failures are not
    /// errors here; they become `SetupError` or `SetupRetry`.
    pub async fn setup(
        &self,
        hass: &HomeAssistant,
        entry_id: &str,
    ) -> ConfigEntriesResult<ConfigEntryState> {
        let _guard = self.setup_lock.lock().await;

        let entry = self.require(entry_id)?;
        if entry.disabled {
            debug!(entry_id, "Skipping setup of disabled entry");
            return Ok(entry.state);
        }
        let integration = self
            .integrations
            .get(&entry.domain)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| ConfigEntriesError::NoIntegration(entry.domain.clone()))?;

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;
        let entry = self.require(entry_id)?;

        let result = integration.setup_entry(hass, &entry).await;

        let state = match result {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                self.with_entry(entry_id, |e| e.reauth_required = false)?;
                info!("Set up {} entry {}", entry.domain, entry.title);
                ConfigEntryState::Loaded
            }
            Err(SetupError::AuthFailed(reason)) => {
                warn!(entry_id, %reason, "Authentication failed, reauthentication required");
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason))?;
                self.with_entry(entry_id, |e| e.reauth_required = true)?;
                ConfigEntryState::SetupError
            }
            Err(SetupError::NotReady(reason)) => {
                self.transition(entry_id, ConfigEntryState::SetupRetry, Some(reason.clone()))?;
                let tries = self.with_entry(entry_id, |e| e.increment_tries())?;
                let delay = calculate_retry_delay(tries.saturating_sub(1));
                warn!(
                    entry_id,
                    %reason,
                    tries,
                    "Entry not ready yet, retrying in {:.0}s",
                    delay.as_secs_f64()
                );
                ConfigEntryState::SetupRetry
            }
            Err(SetupError::Failed(reason)) => {
                warn!(entry_id, %reason, "Setup failed");
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason))?;
                ConfigEntryState::SetupError
            }
        };

        Ok(state)
    }

    /// Delay before the next setup attempt of an entry waiting in `SetupRetry`
    pub fn retry_delay(&self, entry_id: &str) -> Option<Duration> {
        self.get(entry_id)
            .filter(|e| e.state == ConfigEntryState::SetupRetry)
            .map(|e| calculate_retry_delay(e.tries.saturating_sub(1)))
    }

    /// Unload an entry
    ///
    /// Only loaded entries call into the integration; entries that failed
    /// setup go straight back to `NotLoaded`.
    pub async fn unload(&self, hass: &HomeAssistant, entry_id: &str) -> ConfigEntriesResult<()> {
        let _guard = self.setup_lock.lock().await;

        let entry = self.require(entry_id)?;
        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }
        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        let was_loaded = entry.is_loaded();

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let unloaded = match self.integrations.get(&entry.domain).map(|r| Arc::clone(r.value())) {
            Some(integration) if was_loaded => integration.unload_entry(hass, &entry).await,
            _ => true,
        };

        if unloaded {
            self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
            info!("Unloaded {} entry {}", entry.domain, entry.title);
            Ok(())
        } else {
            self.transition(
                entry_id,
                ConfigEntryState::FailedUnload,
                Some("integration refused to unload".into()),
            )?;
            Err(ConfigEntriesError::UnloadFailed(entry_id.to_string()))
        }
    }

    /// Unload and then set up an entry again
    pub async fn reload(
        &self,
        hass: &HomeAssistant,
        entry_id: &str,
    ) -> ConfigEntriesResult<ConfigEntryState> {
        self.unload(hass, entry_id).await?;
        self.setup(hass, entry_id).await
    }

    /// Remove an entry together with its devices and entities
    pub async fn remove(
        &self,
        hass: &HomeAssistant,
        entry_id: &str,
    ) -> ConfigEntriesResult<ConfigEntry> {
        self.unload(hass, entry_id).await?;
        let entry = self.require(entry_id)?;

        for entity in hass.registries.entities.get_by_config_entry_id(entry_id) {
            hass.registries.entities.remove(&entity.entity_id);
        }
        for device in hass.registries.devices.get_by_config_entry_id(entry_id) {
            hass.registries.remove_device(&device.id);
        }

        self.unindex_entry(&entry);
        info!("Removed config entry: {} ({})", entry.title, entry.domain);
        Ok(entry)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ha_registries::{DeviceIdentifier, DeviceInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio_test::{assert_err, assert_ok};

    /// Integration that replays scripted setup results
    struct ScriptedIntegration {
        results: StdMutex<Vec<Result<(), SetupError>>>,
        unload_ok: bool,
        unload_calls: AtomicUsize,
    }

    impl ScriptedIntegration {
        fn new(results: Vec<Result<(), SetupError>>) -> Arc<Self> {
            Arc::new(Self {
                results: StdMutex::new(results),
                unload_ok: true,
                unload_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Integration for ScriptedIntegration {
        fn domain(&self) -> &str {
            "demo"
        }

        async fn setup_entry(
            &self,
            _hass: &HomeAssistant,
            _entry: &ConfigEntry,
        ) -> Result<(), SetupError> {
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(())
            } else {
                results.remove(0)
            }
        }

        async fn unload_entry(&self, _hass: &HomeAssistant, _entry: &ConfigEntry) -> bool {
            self.unload_calls.fetch_add(1, Ordering::SeqCst);
            self.unload_ok
        }
    }

    fn manager_with(integration: Arc<ScriptedIntegration>) -> (ConfigEntries, String) {
        let manager = ConfigEntries::new();
        manager.register_integration(integration);
        let entry = manager.add(ConfigEntry::new("demo", "Demo")).unwrap();
        (manager, entry.entry_id)
    }

    #[test]
    fn test_add_rejects_duplicate_unique_id() {
        let manager = ConfigEntries::new();
        manager
            .add(ConfigEntry::new("demo", "A").with_unique_id("u1"))
            .unwrap();
        let result = manager.add(ConfigEntry::new("demo", "B").with_unique_id("u1"));

        assert!(matches!(result, Err(ConfigEntriesError::AlreadyExists { .. })));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get_by_domain("demo").len(), 1);
    }

    #[tokio::test]
    async fn test_setup_success_loads() {
        let hass = HomeAssistant::new();
        let (manager, id) = manager_with(ScriptedIntegration::new(vec![]));

        let state = manager.setup(&hass, &id).await.unwrap();
        assert_eq!(state, ConfigEntryState::Loaded);
        assert!(manager.get(&id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_auth_failure_requires_reauth() {
        let hass = HomeAssistant::new();
        let (manager, id) = manager_with(ScriptedIntegration::new(vec![Err(
            SetupError::AuthFailed("bad password".into()),
        )]));

        let state = manager.setup(&hass, &id).await.unwrap();
        let entry = manager.get(&id).unwrap();

        assert_eq!(state, ConfigEntryState::SetupError);
        assert!(entry.reauth_required);
        assert_eq!(entry.reason.as_deref(), Some("bad password"));

        // A later successful setup clears the flag
        manager.setup(&hass, &id).await.unwrap();
        assert!(!manager.get(&id).unwrap().reauth_required);
    }

    #[tokio::test]
    async fn test_not_ready_schedules_retry() {
        let hass = HomeAssistant::new();
        let (manager, id) = manager_with(ScriptedIntegration::new(vec![
            Err(SetupError::NotReady("timed out".into())),
            Err(SetupError::NotReady("timed out".into())),
        ]));

        assert_eq!(
            manager.setup(&hass, &id).await.unwrap(),
            ConfigEntryState::SetupRetry
        );
        assert_eq!(manager.get(&id).unwrap().tries, 1);
        let first = manager.retry_delay(&id).unwrap();
        assert!((5.0..5.2).contains(&first.as_secs_f64()));

        manager.setup(&hass, &id).await.unwrap();
        assert_eq!(manager.get(&id).unwrap().tries, 2);
        let second = manager.retry_delay(&id).unwrap();
        assert!((10.0..10.2).contains(&second.as_secs_f64()));

        manager.setup(&hass, &id).await.unwrap();
        assert_eq!(manager.get(&id).unwrap().tries, 0);
        assert!(manager.retry_delay(&id).is_none());
    }

    #[tokio::test]
    async fn test_other_failure_is_setup_error() {
        let hass = HomeAssistant::new();
        let (manager, id) = manager_with(ScriptedIntegration::new(vec![Err(SetupError::Failed(
            "boom".into(),
        ))]));

        assert_eq!(
            manager.setup(&hass, &id).await.unwrap(),
            ConfigEntryState::SetupError
        );
        assert!(!manager.get(&id).unwrap().reauth_required);
    }

    #[tokio::test]
    async fn test_setup_without_integration() {
        let hass = HomeAssistant::new();
        let manager = ConfigEntries::new();
        let entry = manager.add(ConfigEntry::new("missing", "X")).unwrap();

        let result = manager.setup(&hass, &entry.entry_id).await;
        assert!(matches!(result, Err(ConfigEntriesError::NoIntegration(_))));
    }

    #[tokio::test]
    async fn test_unload_only_calls_integration_when_loaded() {
        let hass = HomeAssistant::new();
        let integration = ScriptedIntegration::new(vec![Err(SetupError::Failed("x".into()))]);
        let (manager, id) = manager_with(Arc::clone(&integration));

        assert_ok!(manager.setup(&hass, &id).await);
        assert_ok!(manager.unload(&hass, &id).await);
        assert_eq!(integration.unload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.get(&id).unwrap().state, ConfigEntryState::NotLoaded);

        manager.setup(&hass, &id).await.unwrap();
        manager.unload(&hass, &id).await.unwrap();
        assert_eq!(integration.unload_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_unload_is_terminal() {
        let hass = HomeAssistant::new();
        let integration = Arc::new(ScriptedIntegration {
            results: StdMutex::new(vec![]),
            unload_ok: false,
            unload_calls: AtomicUsize::new(0),
        });
        let (manager, id) = manager_with(integration);

        manager.setup(&hass, &id).await.unwrap();
        let err = assert_err!(manager.unload(&hass, &id).await);

        assert!(matches!(err, ConfigEntriesError::UnloadFailed(_)));
        assert_eq!(manager.get(&id).unwrap().state, ConfigEntryState::FailedUnload);
        assert!(matches!(
            manager.unload(&hass, &id).await,
            Err(ConfigEntriesError::CannotUnload(ConfigEntryState::FailedUnload))
        ));
    }

    #[tokio::test]
    async fn test_remove_clears_registries() {
        let hass = HomeAssistant::new();
        let (manager, id) = manager_with(ScriptedIntegration::new(vec![]));
        manager.setup(&hass, &id).await.unwrap();

        let device = hass.registries.devices.get_or_create(
            &id,
            &DeviceInfo::new(DeviceIdentifier::new("demo", "1")).with_name("Box"),
        );
        hass.registries
            .entities
            .get_or_create("switch", "demo", "1", "Box", Some(&id), Some(&device.id));

        manager.remove(&hass, &id).await.unwrap();

        assert!(manager.get(&id).is_none());
        assert!(hass.registries.devices.is_empty());
        assert!(hass.registries.entities.is_empty());
    }
}
