//! Entity model shared by the Vantage platforms
//!
//! Entities are thin proxies: they hold the client and an object id and
//! project the controller's current snapshot every time their state is
//! read. The [`EntityStore`] registers them, writes their state to the bus
//! and keeps the registry free of entities that no longer exist.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use ha_config_entries::HomeAssistant;
use ha_core::events::StateChangedData;
use ha_core::{Context, EntityId, State, STATE_UNAVAILABLE, STATE_UNKNOWN};
use ha_registries::DeviceInfo;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use vantage_client::{Controller, EventFilter, EventKind, ObjectId, SystemObject, Vantage};

use crate::binary_sensor::BinarySensorEntity;
use crate::constants::{Platform, DOMAIN};
use crate::device::vantage_device_info;
use crate::light::LightEntity;
use crate::number::NumberEntity;
use crate::runtime::VantageRuntime;
use crate::switch::SwitchEntity;

/// State attributes
pub type Attributes = HashMap<String, Value>;

/// Client handle and identity carried by every Vantage entity
#[derive(Clone)]
pub struct VantageEntity {
    pub client: Arc<Vantage>,
    pub id: ObjectId,
    pub name: String,
}

impl VantageEntity {
    pub fn new<T: SystemObject>(client: &Arc<Vantage>, obj: &T) -> Self {
        Self {
            client: Arc::clone(client),
            id: obj.id(),
            name: obj.name().to_string(),
        }
    }

    /// Current snapshot of the backing object
    pub fn object<T: SystemObject>(&self, controller: &Controller<T>) -> Option<T> {
        controller.get(self.id)
    }

    /// Device derived from the backing object
    pub fn device_info_for<T: SystemObject>(&self, obj: Option<T>) -> Option<DeviceInfo> {
        obj.map(|obj| vantage_device_info(&self.client, &obj))
    }
}

/// What every platform entity exposes
pub trait Entity: Send + Sync {
    fn base(&self) -> &VantageEntity;

    fn unique_id(&self) -> String {
        self.base().id.to_string()
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn icon(&self) -> Option<&'static str> {
        None
    }

    /// False once the backing object is gone
    fn available(&self) -> bool;

    fn device_info(&self) -> Option<DeviceInfo>;

    /// State value while available
    fn state(&self) -> String;

    /// Platform-specific attributes while available
    fn extra_attributes(&self) -> Attributes {
        Attributes::new()
    }
}

/// "on"/"off" for a known boolean, "unknown" otherwise
pub fn on_off(value: Option<bool>) -> String {
    match value {
        Some(true) => "on".to_string(),
        Some(false) => "off".to_string(),
        None => STATE_UNKNOWN.to_string(),
    }
}

/// An entity of any supported platform
#[derive(Clone)]
pub enum PlatformEntity {
    BinarySensor(Arc<dyn BinarySensorEntity>),
    Light(Arc<dyn LightEntity>),
    Number(Arc<dyn NumberEntity>),
    Switch(Arc<dyn SwitchEntity>),
}

macro_rules! dispatch {
    ($self:ident, $e:ident => $body:expr) => {
        match $self {
            PlatformEntity::BinarySensor($e) => $body,
            PlatformEntity::Light($e) => $body,
            PlatformEntity::Number($e) => $body,
            PlatformEntity::Switch($e) => $body,
        }
    };
}

impl PlatformEntity {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformEntity::BinarySensor(_) => Platform::BinarySensor,
            PlatformEntity::Light(_) => Platform::Light,
            PlatformEntity::Number(_) => Platform::Number,
            PlatformEntity::Switch(_) => Platform::Switch,
        }
    }

    pub fn object_id(&self) -> ObjectId {
        dispatch!(self, e => e.base().id)
    }

    pub fn unique_id(&self) -> String {
        dispatch!(self, e => e.unique_id())
    }

    pub fn name(&self) -> &str {
        dispatch!(self, e => e.name())
    }

    pub fn available(&self) -> bool {
        dispatch!(self, e => e.available())
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        dispatch!(self, e => e.device_info())
    }

    pub fn state(&self) -> String {
        if !self.available() {
            return STATE_UNAVAILABLE.to_string();
        }
        dispatch!(self, e => e.state())
    }

    pub fn attributes(&self) -> Attributes {
        let mut attributes = if self.available() {
            dispatch!(self, e => e.extra_attributes())
        } else {
            Attributes::new()
        };
        attributes.insert("friendly_name".into(), json!(self.name()));
        if let Some(icon) = dispatch!(self, e => e.icon()) {
            attributes.insert("icon".into(), json!(icon));
        }
        attributes
    }

    pub fn as_light(&self) -> Option<&Arc<dyn LightEntity>> {
        match self {
            PlatformEntity::Light(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&Arc<dyn SwitchEntity>> {
        match self {
            PlatformEntity::Switch(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Arc<dyn NumberEntity>> {
        match self {
            PlatformEntity::Number(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_binary_sensor(&self) -> Option<&Arc<dyn BinarySensorEntity>> {
        match self {
            PlatformEntity::BinarySensor(e) => Some(e),
            _ => None,
        }
    }
}

/// Entities of one config entry
///
/// Adding an entity registers it (and its device) in the registries and
/// writes its first state. Later writes fire `state_changed` only when the
/// state value or attributes actually changed.
pub struct EntityStore {
    hass: HomeAssistant,
    entry_id: String,
    /// entity_id -> entity
    entities: DashMap<String, PlatformEntity>,
    /// (platform, object id) -> entity_id
    by_object: DashMap<(Platform, ObjectId), String>,
    /// entity_id -> last written state
    states: DashMap<String, State>,
}

impl EntityStore {
    pub fn new(hass: HomeAssistant, entry_id: impl Into<String>) -> Self {
        Self {
            hass,
            entry_id: entry_id.into(),
            entities: DashMap::new(),
            by_object: DashMap::new(),
            states: DashMap::new(),
        }
    }

    /// Register an entity and write its initial state, returning its entity_id
    pub fn add(&self, entity: PlatformEntity) -> String {
        let platform = entity.platform();
        let device_id = entity.device_info().map(|info| {
            self.hass
                .registries
                .devices
                .get_or_create(&self.entry_id, &info)
                .id
                .clone()
        });
        let entry = self.hass.registries.entities.get_or_create(
            platform.as_str(),
            DOMAIN,
            &entity.unique_id(),
            entity.name(),
            Some(&self.entry_id),
            device_id.as_deref(),
        );
        let entity_id = entry.entity_id.clone();

        self.by_object
            .insert((platform, entity.object_id()), entity_id.clone());
        self.entities.insert(entity_id.clone(), entity);
        debug!(entity_id = %entity_id, "Added entity");

        self.write_state(&entity_id);
        entity_id
    }

    pub fn contains_object(&self, platform: Platform, id: ObjectId) -> bool {
        self.by_object.contains_key(&(platform, id))
    }

    /// entity_id of the entity a platform created for an object
    pub fn entity_id(&self, platform: Platform, id: ObjectId) -> Option<String> {
        self.by_object.get(&(platform, id)).map(|r| r.value().clone())
    }

    pub fn get(&self, entity_id: &str) -> Option<PlatformEntity> {
        self.entities.get(entity_id).map(|r| r.value().clone())
    }

    /// Last state written for an entity
    pub fn state(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|r| r.value().clone())
    }

    /// All entity_ids, sorted
    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entities.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Re-project the entity a platform created for an object
    pub fn refresh(&self, platform: Platform, id: ObjectId) {
        if let Some(entity_id) = self.entity_id(platform, id) {
            self.write_state(&entity_id);
        }
    }

    /// Project an entity's state and fire `state_changed` if it differs
    pub fn write_state(&self, entity_id: &str) {
        let Some(entity) = self.get(entity_id) else {
            return;
        };
        let parsed: EntityId = match entity_id.parse() {
            Ok(id) => id,
            Err(err) => {
                warn!(entity_id, "Cannot write state: {}", err);
                return;
            }
        };

        let old_state = self.state(entity_id);
        let context = Context::new();
        let new_state = match old_state {
            Some(ref old) => old.with_update(entity.state(), entity.attributes(), context),
            None => State::new(parsed.clone(), entity.state(), entity.attributes(), context),
        };
        if old_state.as_ref() == Some(&new_state) {
            return;
        }

        self.states.insert(entity_id.to_string(), new_state.clone());
        let context = new_state.context.clone();
        self.hass.bus.fire_typed(
            StateChangedData {
                entity_id: parsed,
                old_state,
                new_state: Some(new_state),
            },
            context,
        );
    }

    /// Drop registry entries of this entry that no created entity backs
    pub fn cleanup_orphans(&self) -> usize {
        let registry = &self.hass.registries.entities;
        let mut removed = 0;
        for entry in registry.get_by_config_entry_id(&self.entry_id) {
            if !self.entities.contains_key(&entry.entity_id) {
                info!(entity_id = %entry.entity_id, "Removing orphaned entity");
                registry.remove(&entry.entity_id);
                removed += 1;
            }
        }
        removed
    }
}

/// Create an entity for every object of a controller passing `filter`
///
/// Objects added to the controller later get entities too, and updates or
/// deletions of a registered object re-write that entity's state.
pub fn register_objects<T: SystemObject>(
    runtime: &VantageRuntime,
    platform: Platform,
    controller: fn(&Vantage) -> &Controller<T>,
    filter: fn(&T) -> bool,
    create: fn(&Arc<Vantage>, &T) -> PlatformEntity,
) {
    let client = Arc::clone(&runtime.client);
    let store = Arc::clone(&runtime.entities);

    // Subscribe first; objects seen twice in the overlap are only refreshed
    let mut events = controller(&client).subscribe(EventFilter::all());
    for obj in controller(&client).all() {
        if filter(&obj) {
            store.add(create(&client, &obj));
        }
    }

    runtime.track(tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let id = event.object.id();
            match event.kind {
                EventKind::ObjectAdded => {
                    if store.contains_object(platform, id) {
                        // Deleted and added back under the same id
                        store.refresh(platform, id);
                    } else if filter(&event.object) {
                        store.add(create(&client, &event.object));
                    }
                }
                EventKind::ObjectUpdated | EventKind::ObjectDeleted => store.refresh(platform, id),
            }
        }
    }));
}
