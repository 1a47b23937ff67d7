//! Switch platform: relay and motor loads, boolean variables

use std::sync::Arc;

use async_trait::async_trait;
use ha_registries::DeviceInfo;
use vantage_client::{GMem, GMemValue, LevelObject, Load, Vantage, VantageResult};

use crate::constants::Platform;
use crate::entity::{on_off, register_objects, Entity, PlatformEntity, VantageEntity};
use crate::runtime::VantageRuntime;

/// A switch entity
#[async_trait]
pub trait SwitchEntity: Entity {
    fn is_on(&self) -> Option<bool>;

    async fn turn_on(&self) -> VantageResult<()>;

    async fn turn_off(&self) -> VantageResult<()>;
}

/// Switch backed by a relay or motor load
pub struct VantageLoadSwitch {
    base: VantageEntity,
}

impl VantageLoadSwitch {
    pub fn new(client: &Arc<Vantage>, load: &Load) -> Self {
        Self {
            base: VantageEntity::new(client, load),
        }
    }
}

impl Entity for VantageLoadSwitch {
    fn base(&self) -> &VantageEntity {
        &self.base
    }

    fn available(&self) -> bool {
        self.base.client.loads.contains(self.base.id)
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        self.base
            .device_info_for(self.base.object(&self.base.client.loads))
    }

    fn state(&self) -> String {
        on_off(self.is_on())
    }
}

#[async_trait]
impl SwitchEntity for VantageLoadSwitch {
    fn is_on(&self) -> Option<bool> {
        self.base
            .object(&self.base.client.loads)
            .and_then(|load| load.is_on())
    }

    async fn turn_on(&self) -> VantageResult<()> {
        self.base.client.loads.turn_on(self.base.id, 0.0, 100.0).await
    }

    async fn turn_off(&self) -> VantageResult<()> {
        self.base.client.loads.turn_off(self.base.id, 0.0).await
    }
}

/// Switch backed by a boolean variable
pub struct VantageVariableSwitch {
    base: VantageEntity,
}

impl VantageVariableSwitch {
    pub fn new(client: &Arc<Vantage>, gmem: &GMem) -> Self {
        Self {
            base: VantageEntity::new(client, gmem),
        }
    }
}

impl Entity for VantageVariableSwitch {
    fn base(&self) -> &VantageEntity {
        &self.base
    }

    fn available(&self) -> bool {
        self.base.client.gmem.contains(self.base.id)
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        self.base
            .device_info_for(self.base.object(&self.base.client.gmem))
    }

    fn state(&self) -> String {
        on_off(self.is_on())
    }
}

#[async_trait]
impl SwitchEntity for VantageVariableSwitch {
    fn is_on(&self) -> Option<bool> {
        match self.base.object(&self.base.client.gmem)?.value? {
            GMemValue::Bool(value) => Some(value),
            GMemValue::Int(value) => Some(value != 0),
            GMemValue::Text(_) => None,
        }
    }

    async fn turn_on(&self) -> VantageResult<()> {
        self.base
            .client
            .gmem
            .set_value(self.base.id, GMemValue::Bool(true))
            .await
    }

    async fn turn_off(&self) -> VantageResult<()> {
        self.base
            .client
            .gmem
            .set_value(self.base.id, GMemValue::Bool(false))
            .await
    }
}

/// Register switches for relay/motor loads and boolean variables
pub fn async_setup_entry(runtime: &VantageRuntime) {
    register_objects(
        runtime,
        Platform::Switch,
        |v| &v.loads,
        |load| load.is_relay() || load.is_motor(),
        |client, load| PlatformEntity::Switch(Arc::new(VantageLoadSwitch::new(client, load))),
    );
    register_objects(
        runtime,
        Platform::Switch,
        |v| &v.gmem,
        |gmem| gmem.is_bool(),
        |client, gmem| PlatformEntity::Switch(Arc::new(VantageVariableSwitch::new(client, gmem))),
    );
}
