//! Number platform: integer and fixed-point variables

use std::sync::Arc;

use async_trait::async_trait;
use ha_core::STATE_UNKNOWN;
use ha_registries::DeviceInfo;
use serde_json::json;
use tracing::warn;
use vantage_client::{GMem, GMemValue, Vantage, VantageResult};

use crate::constants::Platform;
use crate::entity::{register_objects, Attributes, Entity, PlatformEntity, VantageEntity};
use crate::runtime::VantageRuntime;

/// Fixed-point variables store thousandths
const FIXED_SCALE: f64 = 1000.0;

/// Range and unit metadata for a variable type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub unit: Option<&'static str>,
    pub device_class: Option<&'static str>,
}

impl Default for NumberSpec {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            step: 1.0,
            unit: None,
            device_class: None,
        }
    }
}

/// Metadata for a variable's type tag
///
/// Unknown tags log a warning and get the default 0-100 range.
pub fn number_spec(tag: &str) -> NumberSpec {
    let base = NumberSpec::default();
    match tag {
        // Generic fixed-precision unsigned measurement
        "DeviceUnits" => NumberSpec {
            max: 604_800.0,
            ..base
        },
        "Level" => NumberSpec {
            unit: Some("%"),
            ..base
        },
        // Id of another object
        "Load" | "Task" => NumberSpec {
            min: 1.0,
            max: 10_000.0,
            ..base
        },
        "Number" => NumberSpec {
            min: f64::from(i32::MIN),
            max: f64::from(i32::MAX),
            ..base
        },
        // Up to a day, in milliseconds
        "Delay" => NumberSpec {
            max: 24.0 * 60.0 * 60.0 * 1000.0,
            unit: Some("ms"),
            ..base
        },
        // Up to a week
        "Seconds" => NumberSpec {
            max: 7.0 * 24.0 * 60.0 * 60.0,
            unit: Some("s"),
            ..base
        },
        "DegC" => NumberSpec {
            min: -40.0,
            max: 150.0,
            unit: Some("°C"),
            device_class: Some("temperature"),
            ..base
        },
        "Decimal" => NumberSpec {
            min: -2_147_483_648.0,
            max: 2_147_483_648.0,
            step: 0.001,
            ..base
        },
        other => {
            warn!("Unknown number type {}", other);
            base
        }
    }
}

/// A number entity
#[async_trait]
pub trait NumberEntity: Entity {
    fn native_value(&self) -> Option<f64>;

    fn spec(&self) -> NumberSpec;

    async fn set_native_value(&self, value: f64) -> VantageResult<()>;
}

/// Number backed by an integer or fixed-point variable
pub struct VantageNumberVariable {
    base: VantageEntity,
    fixed: bool,
    spec: NumberSpec,
}

impl VantageNumberVariable {
    pub fn new(client: &Arc<Vantage>, gmem: &GMem) -> Self {
        Self {
            base: VantageEntity::new(client, gmem),
            fixed: gmem.is_fixed(),
            spec: number_spec(&gmem.tag),
        }
    }

    /// Raw variable value for a presented value
    pub fn to_raw(&self, value: f64) -> i64 {
        if self.fixed {
            (value * FIXED_SCALE).round() as i64
        } else {
            value.trunc() as i64
        }
    }

    /// Presented value for a raw variable value
    pub fn from_raw(&self, raw: i64) -> f64 {
        if self.fixed {
            raw as f64 / FIXED_SCALE
        } else {
            raw as f64
        }
    }
}

impl Entity for VantageNumberVariable {
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
        self.native_value()
            .map(|value| value.to_string())
            .unwrap_or_else(|| STATE_UNKNOWN.to_string())
    }

    fn extra_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("min".into(), json!(self.spec.min));
        attrs.insert("max".into(), json!(self.spec.max));
        attrs.insert("step".into(), json!(self.spec.step));
        attrs.insert("mode".into(), json!("auto"));
        if let Some(unit) = self.spec.unit {
            attrs.insert("unit_of_measurement".into(), json!(unit));
        }
        if let Some(device_class) = self.spec.device_class {
            attrs.insert("device_class".into(), json!(device_class));
        }
        attrs
    }
}

#[async_trait]
impl NumberEntity for VantageNumberVariable {
    fn native_value(&self) -> Option<f64> {
        match self.base.object(&self.base.client.gmem)?.value? {
            GMemValue::Int(raw) => Some(self.from_raw(raw)),
            GMemValue::Bool(_) | GMemValue::Text(_) => None,
        }
    }

    fn spec(&self) -> NumberSpec {
        self.spec
    }

    async fn set_native_value(&self, value: f64) -> VantageResult<()> {
        self.base
            .client
            .gmem
            .set_value(self.base.id, GMemValue::Int(self.to_raw(value)))
            .await
    }
}

pub fn async_setup_entry(runtime: &VantageRuntime) {
    register_objects(
        runtime,
        Platform::Number,
        |v| &v.gmem,
        |gmem| gmem.is_int() || gmem.is_fixed(),
        |client, gmem| PlatformEntity::Number(Arc::new(VantageNumberVariable::new(client, gmem))),
    );
}
