//! Device Registry
//!
//! Tracks registered devices by identifier, config entry and parent device.
//! Integrations describe a device with [`DeviceInfo`] and call
//! [`DeviceRegistry::get_or_create`]; the registry keeps one entry per
//! identifier no matter how often that happens.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Device entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEntryType {
    /// Service device (virtual)
    Service,
}

/// A device identifier (domain, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    /// Create a key for indexing
    pub fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

/// Device description supplied by an integration
///
/// `None` fields are left untouched on an existing entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<DeviceIdentifier>,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub sw_version: Option<String>,
    pub suggested_area: Option<String>,
    /// Identifier of the device this one is reached through
    pub via_device: Option<DeviceIdentifier>,
    pub entry_type: Option<DeviceEntryType>,
}

impl DeviceInfo {
    /// Describe a device known by a single identifier
    pub fn new(identifier: DeviceIdentifier) -> Self {
        Self {
            identifiers: vec![identifier],
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overlay the fields that `other` sets
    pub fn update(&mut self, other: DeviceInfo) {
        for identifier in other.identifiers {
            if !self.identifiers.contains(&identifier) {
                self.identifiers.push(identifier);
            }
        }
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(
            name,
            manufacturer,
            model,
            serial_number,
            sw_version,
            suggested_area,
            via_device,
            entry_type
        );
    }
}

/// A registered device entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Internal UUID
    pub id: String,

    /// Unique identifiers by domain (e.g., [["vantage", "118"]])
    #[serde(default)]
    pub identifiers: Vec<DeviceIdentifier>,

    /// Associated config entries
    #[serde(default)]
    pub config_entries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Software/firmware version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    /// Suggested area name (informational, used during creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_area: Option<String>,

    /// Parent device (for nested devices)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<DeviceEntryType>,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn new(identifiers: Vec<DeviceIdentifier>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            identifiers,
            config_entries: Vec::new(),
            name: None,
            manufacturer: None,
            model: None,
            sw_version: None,
            serial_number: None,
            suggested_area: None,
            via_device_id: None,
            entry_type: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Get the identifier id registered under `domain`
    pub fn identifier_for(&self, domain: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|i| i.domain() == domain)
            .map(DeviceIdentifier::id)
    }
}

/// Write the fields `info` sets onto `entry`
fn apply_info(
    entry: &mut DeviceEntry,
    config_entry_id: &str,
    info: &DeviceInfo,
    via_device_id: Option<String>,
) {
    for identifier in &info.identifiers {
        if !entry.identifiers.contains(identifier) {
            entry.identifiers.push(identifier.clone());
        }
    }
    if !entry.config_entries.iter().any(|id| id == config_entry_id) {
        entry.config_entries.push(config_entry_id.to_string());
    }
    macro_rules! assign {
        ($($field:ident),*) => {
            $(if let Some(ref value) = info.$field {
                entry.$field = Some(value.clone());
            })*
        };
    }
    assign!(
        name,
        manufacturer,
        model,
        serial_number,
        sw_version,
        suggested_area,
        entry_type
    );
    if via_device_id.is_some() {
        entry.via_device_id = via_device_id;
    }
}

/// Device Registry with multi-index support
///
/// Entries are stored as `Arc<DeviceEntry>` to avoid cloning on reads.
#[derive(Default)]
pub struct DeviceRegistry {
    /// Primary index: device_id -> DeviceEntry
    by_id: DashMap<String, Arc<DeviceEntry>>,

    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,

    /// Index: config_entry_id -> set of device_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,

    /// Index: via_device_id -> set of device_ids (child devices)
    by_via_device_id: DashMap<String, HashSet<String>>,
}

impl DeviceRegistry {
    /// Create a new device registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Index an entry in all indexes
    fn index_entry(&self, entry: Arc<DeviceEntry>) {
        let device_id = entry.id.clone();

        for identifier in &entry.identifiers {
            self.by_identifier
                .insert(identifier.key(), device_id.clone());
        }

        for config_entry_id in &entry.config_entries {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(device_id.clone());
        }

        if let Some(ref via_device_id) = entry.via_device_id {
            self.by_via_device_id
                .entry(via_device_id.clone())
                .or_default()
                .insert(device_id.clone());
        }

        self.by_id.insert(device_id, entry);
    }

    /// Remove an entry from the secondary indexes
    fn unindex_entry(&self, entry: &DeviceEntry) {
        let device_id = &entry.id;

        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier.key());
        }

        for config_entry_id in &entry.config_entries {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(device_id);
            }
        }

        if let Some(ref via_device_id) = entry.via_device_id {
            if let Some(mut ids) = self.by_via_device_id.get_mut(via_device_id) {
                ids.remove(device_id);
            }
        }
    }

    /// Get device by ID
    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| Arc::clone(r.value()))
    }

    /// Get device by identifier
    pub fn get_by_identifier(&self, identifier: &DeviceIdentifier) -> Option<Arc<DeviceEntry>> {
        self.by_identifier
            .get(&identifier.key())
            .and_then(|device_id| self.get(&device_id))
    }

    /// Get a device by any of its identifiers
    pub fn get_device(&self, identifiers: &[DeviceIdentifier]) -> Option<Arc<DeviceEntry>> {
        identifiers
            .iter()
            .find_map(|identifier| self.get_by_identifier(identifier))
    }

    /// Get all devices for a config entry
    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<DeviceEntry>> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get all child devices (connected via this device)
    pub fn get_children(&self, device_id: &str) -> Vec<Arc<DeviceEntry>> {
        self.by_via_device_id
            .get(device_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get or create a device and apply `info` to it
    ///
    /// Looks the device up by any of the identifiers in `info`. The via
    /// device is resolved through its identifier; a via device that is not
    /// registered yet leaves the link unset.
    pub fn get_or_create(&self, config_entry_id: &str, info: &DeviceInfo) -> Arc<DeviceEntry> {
        let via_device_id = info
            .via_device
            .as_ref()
            .and_then(|via| self.get_by_identifier(via))
            .map(|via| via.id.clone());

        if let Some(existing) = self.get_device(&info.identifiers) {
            debug!("Found existing device by identifier: {}", existing.id);
            return self
                .update(&existing.id, |entry| {
                    apply_info(entry, config_entry_id, info, via_device_id)
                })
                .unwrap_or(existing);
        }

        let mut entry = DeviceEntry::new(info.identifiers.clone());
        apply_info(&mut entry, config_entry_id, info, via_device_id);

        let arc_entry = Arc::new(entry);
        self.index_entry(Arc::clone(&arc_entry));
        info!("Registered new device: {:?} ({})", info.name, arc_entry.id);
        arc_entry
    }

    /// Update a device entry
    ///
    /// `modified_at` only moves when the closure changed something.
    pub fn update<F>(&self, device_id: &str, f: F) -> Option<Arc<DeviceEntry>>
    where
        F: FnOnce(&mut DeviceEntry),
    {
        // Remove first so no shard lock is held while re-indexing
        let (_, arc_entry) = self.by_id.remove(device_id)?;
        self.unindex_entry(&arc_entry);

        let mut entry = (*arc_entry).clone();
        f(&mut entry);
        if entry != *arc_entry {
            entry.modified_at = Utc::now();
        }

        let new_arc = Arc::new(entry);
        self.index_entry(Arc::clone(&new_arc));
        Some(new_arc)
    }

    /// Remove a device
    ///
    /// Children that were reached through it lose their via link.
    pub fn remove(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        let (_, arc_entry) = self.by_id.remove(device_id)?;
        self.unindex_entry(&arc_entry);

        let children: Vec<String> = self
            .by_via_device_id
            .remove(device_id)
            .map(|(_, ids)| ids.into_iter().collect())
            .unwrap_or_default();
        for child in children {
            self.update(&child, |entry| entry.via_device_id = None);
        }

        info!("Removed device: {}", device_id);
        Some(arc_entry)
    }

    /// Get count of registered devices
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = Arc<DeviceEntry>> + '_ {
        self.by_id.iter().map(|r| Arc::clone(r.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(id: &str) -> DeviceIdentifier {
        DeviceIdentifier::new("vantage", id)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = DeviceRegistry::new();
        let info = DeviceInfo::new(ident("1")).with_name("Main Controller");

        let first = registry.get_or_create("entry1", &info);
        let second = registry.get_or_create("entry1", &info);

        assert_eq!(first.id, second.id);
        assert_eq!(registry.len(), 1);
        assert_eq!(second.config_entries, vec!["entry1".to_string()]);
    }

    #[test]
    fn test_get_or_create_updates_fields() {
        let registry = DeviceRegistry::new();
        registry.get_or_create("entry1", &DeviceInfo::new(ident("5")).with_name("Old"));

        let mut info = DeviceInfo::new(ident("5")).with_name("New");
        info.model = Some("Keypad".to_string());
        let updated = registry.get_or_create("entry1", &info);

        assert_eq!(updated.name.as_deref(), Some("New"));
        assert_eq!(updated.model.as_deref(), Some("Keypad"));
    }

    #[test]
    fn test_via_device_resolved_by_identifier() {
        let registry = DeviceRegistry::new();
        let master = registry.get_or_create("entry1", &DeviceInfo::new(ident("1")));

        let mut info = DeviceInfo::new(ident("20"));
        info.via_device = Some(ident("1"));
        let module = registry.get_or_create("entry1", &info);

        assert_eq!(module.via_device_id.as_deref(), Some(master.id.as_str()));
        assert_eq!(registry.get_children(&master.id).len(), 1);
    }

    #[test]
    fn test_unknown_via_device_leaves_link_unset() {
        let registry = DeviceRegistry::new();
        let mut info = DeviceInfo::new(ident("20"));
        info.via_device = Some(ident("999"));

        let device = registry.get_or_create("entry1", &info);
        assert!(device.via_device_id.is_none());
    }

    #[test]
    fn test_remove_clears_indexes_and_children() {
        let registry = DeviceRegistry::new();
        let master = registry.get_or_create("entry1", &DeviceInfo::new(ident("1")));
        let mut info = DeviceInfo::new(ident("2"));
        info.via_device = Some(ident("1"));
        let child = registry.get_or_create("entry1", &info);

        assert!(registry.remove(&master.id).is_some());
        assert!(registry.remove(&master.id).is_none());
        assert!(registry.get_by_identifier(&ident("1")).is_none());
        assert!(registry.get(&child.id).unwrap().via_device_id.is_none());
        assert_eq!(registry.get_by_config_entry_id("entry1").len(), 1);
    }

    #[test]
    fn test_device_info_update_overlays_set_fields() {
        let mut info = DeviceInfo::new(ident("1")).with_name("Controller");
        info.update(DeviceInfo {
            sw_version: Some("4.1.0".to_string()),
            ..DeviceInfo::default()
        });

        assert_eq!(info.name.as_deref(), Some("Controller"));
        assert_eq!(info.sw_version.as_deref(), Some("4.1.0"));
    }
}
