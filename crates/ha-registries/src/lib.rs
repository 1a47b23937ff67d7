//! Home Assistant Registries
//!
//! In-memory registries that integrations write to when they mirror a
//! remote system:
//! - Devices (DeviceRegistry)
//! - Entities (EntityRegistry)

pub mod device_registry;
pub mod entity_registry;

pub use device_registry::{
    DeviceEntry, DeviceEntryType, DeviceIdentifier, DeviceInfo, DeviceRegistry,
};

pub use entity_registry::{EntityEntry, EntityRegistry, EntityRegistryError};

/// Both registries bundled together
#[derive(Default)]
pub struct Registries {
    pub devices: DeviceRegistry,
    pub entities: EntityRegistry,
}

impl Registries {
    /// Create empty registries
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a device together with every entity attached to it
    ///
    /// Returns the removed device, or `None` if it was not registered.
    pub fn remove_device(&self, device_id: &str) -> Option<std::sync::Arc<DeviceEntry>> {
        let removed = self.devices.remove(device_id)?;
        for entity in self.entities.get_by_device_id(device_id) {
            self.entities.remove(&entity.entity_id);
        }
        Some(removed)
    }
}
