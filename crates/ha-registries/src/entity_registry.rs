//! Entity Registry
//!
//! Tracks registered entities by `(domain, platform, unique_id)`, linking
//! each to the config entry that created it and the device it belongs to.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ha_core::slugify;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur in the entity registry
#[derive(Debug, Error, Clone)]
pub enum EntityRegistryError {
    /// Entity was not found
    #[error("Entity not found: {0}")]
    NotFound(String),
}

/// A registered entity entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    /// Internal UUID
    pub id: String,
    /// Full entity ID (domain.object_id)
    pub entity_id: String,
    /// Platform-specific unique identifier
    pub unique_id: String,
    /// Integration that provides this entity
    pub platform: String,
    /// Parent device ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Config entry that created this entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_entry_id: Option<String>,
    /// Name reported by the integration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl EntityEntry {
    /// Get the domain part of the entity_id
    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or("")
    }

    fn key(&self) -> String {
        unique_key(self.domain(), &self.platform, &self.unique_id)
    }
}

fn unique_key(domain: &str, platform: &str, unique_id: &str) -> String {
    format!("{}\u{1f}{}\u{1f}{}", domain, platform, unique_id)
}

/// Entity Registry
///
/// Entries keep insertion order; lookups by unique id, config entry and
/// device go through secondary indexes.
#[derive(Default)]
pub struct EntityRegistry {
    /// Primary index: entity_id -> EntityEntry
    by_entity_id: RwLock<IndexMap<String, Arc<EntityEntry>>>,
    /// Index: (domain, platform, unique_id) -> entity_id
    by_unique_id: DashMap<String, String>,
    /// Index: config_entry_id -> set of entity_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,
    /// Index: device_id -> set of entity_ids
    by_device_id: DashMap<String, HashSet<String>>,
}

impl EntityRegistry {
    /// Create a new entity registry
    pub fn new() -> Self {
        Self::default()
    }

    fn index_entry(&self, entry: Arc<EntityEntry>) {
        let entity_id = entry.entity_id.clone();

        self.by_unique_id.insert(entry.key(), entity_id.clone());
        if let Some(ref config_entry_id) = entry.config_entry_id {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(entity_id.clone());
        }
        if let Some(ref device_id) = entry.device_id {
            self.by_device_id
                .entry(device_id.clone())
                .or_default()
                .insert(entity_id.clone());
        }

        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.insert(entity_id, entry);
        }
    }

    fn unindex_entry(&self, entry: &EntityEntry) {
        self.by_unique_id.remove(&entry.key());
        if let Some(ref config_entry_id) = entry.config_entry_id {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.entity_id);
            }
        }
        if let Some(ref device_id) = entry.device_id {
            if let Some(mut ids) = self.by_device_id.get_mut(device_id) {
                ids.remove(&entry.entity_id);
            }
        }
    }

    /// Get entity by entity_id
    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .ok()
            .and_then(|idx| idx.get(entity_id).cloned())
    }

    /// Look up the entity_id registered for a unique id
    pub fn get_entity_id(&self, domain: &str, platform: &str, unique_id: &str) -> Option<String> {
        self.by_unique_id
            .get(&unique_key(domain, platform, unique_id))
            .map(|r| r.value().clone())
    }

    /// Get all entities created by a config entry
    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<EntityEntry>> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get all entities attached to a device
    pub fn get_by_device_id(&self, device_id: &str) -> Vec<Arc<EntityEntry>> {
        self.by_device_id
            .get(device_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get or create an entity entry
    ///
    /// An entity already registered under `(domain, platform, unique_id)`
    /// is returned with its device link refreshed. New entities get an
    /// entity_id derived from `suggested_name`.
    pub fn get_or_create(
        &self,
        domain: &str,
        platform: &str,
        unique_id: &str,
        suggested_name: &str,
        config_entry_id: Option<&str>,
        device_id: Option<&str>,
    ) -> Arc<EntityEntry> {
        if let Some(entity_id) = self.get_entity_id(domain, platform, unique_id) {
            debug!("Found existing entity by unique_id: {}", entity_id);
            let refreshed = self.update(&entity_id, |entry| {
                if entry.device_id.as_deref() != device_id {
                    entry.device_id = device_id.map(String::from);
                    entry.modified_at = Utc::now();
                }
            });
            if let Ok(entry) = refreshed {
                return entry;
            }
        }

        let entity_id = self.generate_entity_id(domain, &slugify(suggested_name));
        let now = Utc::now();
        let entry = Arc::new(EntityEntry {
            id: uuid::Uuid::new_v4().simple().to_string(),
            entity_id: entity_id.clone(),
            unique_id: unique_id.to_string(),
            platform: platform.to_string(),
            device_id: device_id.map(String::from),
            config_entry_id: config_entry_id.map(String::from),
            original_name: Some(suggested_name.to_string()),
            created_at: now,
            modified_at: now,
        });
        self.index_entry(Arc::clone(&entry));

        info!("Registered new entity: {}", entity_id);
        entry
    }

    /// Update an entity entry
    pub fn update<F>(&self, entity_id: &str, f: F) -> Result<Arc<EntityEntry>, EntityRegistryError>
    where
        F: FnOnce(&mut EntityEntry),
    {
        let current = self
            .get(entity_id)
            .ok_or_else(|| EntityRegistryError::NotFound(entity_id.to_string()))?;
        self.unindex_entry(&current);

        let mut entry = (*current).clone();
        f(&mut entry);

        let new_arc = Arc::new(entry);
        self.index_entry(Arc::clone(&new_arc));
        Ok(new_arc)
    }

    /// Remove an entity
    pub fn remove(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        let arc_entry = self
            .by_entity_id
            .write()
            .ok()
            .and_then(|mut idx| idx.shift_remove(entity_id))?;

        self.unindex_entry(&arc_entry);
        info!("Removed entity: {}", entity_id);
        Some(arc_entry)
    }

    /// Check if an entity_id is registered
    pub fn is_registered(&self, entity_id: &str) -> bool {
        self.by_entity_id
            .read()
            .map(|idx| idx.contains_key(entity_id))
            .unwrap_or(false)
    }

    /// Pick an entity_id that no registered entity uses
    ///
    /// Appends `_2`, `_3`, ... to the preferred id until it is free.
    pub fn generate_entity_id(&self, domain: &str, suggested_object_id: &str) -> String {
        let preferred = format!("{}.{}", domain, suggested_object_id);
        if !self.is_registered(&preferred) {
            return preferred;
        }

        (2..)
            .map(|n| format!("{}_{}", preferred, n))
            .find(|candidate| !self.is_registered(candidate))
            .unwrap_or(preferred)
    }

    /// Get count of registered entities
    pub fn len(&self) -> usize {
        self.by_entity_id.read().map(|idx| idx.len()).unwrap_or(0)
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in insertion order
    pub fn iter(&self) -> Vec<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .map(|idx| idx.values().cloned().collect())
            .unwrap_or_default()
    }
}
