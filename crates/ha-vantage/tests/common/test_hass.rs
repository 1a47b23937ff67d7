//! A HomeAssistant with the Vantage integration registered

use std::sync::Arc;

use ha_config_entries::{ConfigEntries, ConfigEntry, ConfigEntryState, HomeAssistant};
use ha_core::Event;
use ha_vantage::{PlatformEntity, Platform, VantageIntegration, VantageRuntime};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use vantage_client::{Backend, ObjectId};

use super::{system, FakeBackend, FIRMWARE, MASTER};

pub struct TestVantage {
    pub hass: HomeAssistant,
    pub entries: ConfigEntries,
    pub integration: Arc<VantageIntegration>,
    pub backend: Arc<FakeBackend>,
    pub entry_id: String,
}

impl TestVantage {
    /// Fixture system behind a fresh config entry, not yet set up
    pub fn new() -> Self {
        Self::with_backend(FakeBackend::new(system()).with_version(MASTER, FIRMWARE))
    }

    pub fn with_backend(backend: FakeBackend) -> Self {
        Self::with_hass(HomeAssistant::new(), backend)
    }

    /// Share registries and bus with an earlier instance
    pub fn with_hass(hass: HomeAssistant, backend: FakeBackend) -> Self {
        let backend = Arc::new(backend);
        let factory_backend = Arc::clone(&backend);
        let integration = Arc::new(VantageIntegration::new(move |_config| {
            Arc::clone(&factory_backend) as Arc<dyn Backend>
        }));

        let entries = ConfigEntries::new();
        entries.register_integration(integration.clone());
        let entry = entries
            .add(
                ConfigEntry::new("vantage", "Vantage InFusion")
                    .with_json_data(json!({"host": "192.168.1.50", "username": "admin", "password": "secret"}))
                    .with_unique_id("123456"),
            )
            .unwrap();

        Self {
            hass,
            entries,
            integration,
            backend,
            entry_id: entry.entry_id,
        }
    }

    /// Set up the entry, returning the state it ends in
    pub async fn setup(&self) -> ConfigEntryState {
        self.entries.setup(&self.hass, &self.entry_id).await.unwrap()
    }

    pub async fn unload(&self) {
        self.entries.unload(&self.hass, &self.entry_id).await.unwrap();
    }

    pub fn entry(&self) -> ConfigEntry {
        self.entries.get(&self.entry_id).unwrap()
    }

    pub fn runtime(&self) -> Arc<VantageRuntime> {
        self.integration.runtime(&self.entry_id).expect("entry not loaded")
    }

    pub fn entity_id(&self, platform: Platform, id: ObjectId) -> String {
        self.runtime()
            .entities
            .entity_id(platform, id)
            .unwrap_or_else(|| panic!("no {} entity for object {}", platform, id))
    }

    pub fn entity(&self, platform: Platform, id: ObjectId) -> PlatformEntity {
        let entity_id = self.entity_id(platform, id);
        self.runtime().entities.get(&entity_id).unwrap()
    }

    /// Last written state value of an entity
    pub fn state(&self, platform: Platform, id: ObjectId) -> String {
        let entity_id = self.entity_id(platform, id);
        self.runtime().entities.state(&entity_id).unwrap().state
    }

    /// Last written attribute of an entity
    pub fn attribute(&self, platform: Platform, id: ObjectId, key: &str) -> Option<Value> {
        let entity_id = self.entity_id(platform, id);
        self.runtime()
            .entities
            .state(&entity_id)
            .and_then(|state| state.attributes.get(key).cloned())
    }
}

/// Yield to spawned tasks until `cond` holds
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Let spawned tasks drain their queues
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Events received so far
pub fn drain(rx: &mut broadcast::Receiver<Event<Value>>) -> Vec<Event<Value>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
