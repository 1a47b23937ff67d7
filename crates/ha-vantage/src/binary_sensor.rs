//! Binary sensor platform: dry contacts

use std::sync::Arc;

use ha_registries::DeviceInfo;
use vantage_client::{DryContact, Vantage};

use crate::constants::Platform;
use crate::entity::{on_off, register_objects, Entity, PlatformEntity, VantageEntity};
use crate::runtime::VantageRuntime;

/// A binary sensor entity
pub trait BinarySensorEntity: Entity {
    fn is_on(&self) -> Option<bool>;
}

/// Dry contact input; on while triggered
pub struct VantageDryContact {
    base: VantageEntity,
}

impl VantageDryContact {
    pub fn new(client: &Arc<Vantage>, contact: &DryContact) -> Self {
        Self {
            base: VantageEntity::new(client, contact),
        }
    }
}

impl Entity for VantageDryContact {
    fn base(&self) -> &VantageEntity {
        &self.base
    }

    fn available(&self) -> bool {
        self.base.client.dry_contacts.contains(self.base.id)
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        self.base
            .device_info_for(self.base.object(&self.base.client.dry_contacts))
    }

    fn state(&self) -> String {
        on_off(self.is_on())
    }
}

impl BinarySensorEntity for VantageDryContact {
    fn is_on(&self) -> Option<bool> {
        self.base
            .object(&self.base.client.dry_contacts)
            .and_then(|contact| contact.triggered)
    }
}

pub fn async_setup_entry(runtime: &VantageRuntime) {
    register_objects(
        runtime,
        Platform::BinarySensor,
        |v| &v.dry_contacts,
        |_| true,
        |client, contact| {
            PlatformEntity::BinarySensor(Arc::new(VantageDryContact::new(client, contact)))
        },
    );
}
