//! Light platform
//!
//! Three families: dimmable or on/off loads, colour loads, and load groups.

use std::sync::Arc;

use async_trait::async_trait;
use bitflags::bitflags;
use ha_registries::{DeviceEntryType, DeviceInfo};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use vantage_client::{
    ColorType, LevelObject, Load, LoadGroup, RgbLoad, Vantage, VantageResult,
};

use crate::constants::{Platform, LEVEL_RANGE};
use crate::entity::{on_off, register_objects, Attributes, Entity, PlatformEntity, VantageEntity};
use crate::runtime::VantageRuntime;

/// How a light expresses its colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[serde(rename = "onoff")]
    OnOff,
    Brightness,
    ColorTemp,
    Hs,
    Rgb,
    Rgbw,
}

bitflags! {
    /// Optional light features
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LightEntityFeature: u32 {
        const TRANSITION = 32;
    }
}

/// Parameters of a turn-on request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightTurnOn {
    /// 0-255
    pub brightness: Option<u8>,
    /// Seconds
    pub transition: Option<f64>,
    pub hs_color: Option<(f64, f64)>,
    pub rgb_color: Option<[u8; 3]>,
    pub rgbw_color: Option<[u8; 4]>,
    pub color_temp_kelvin: Option<u32>,
}

/// Level (1-100) to brightness (1-255)
pub fn value_to_brightness(range: (f64, f64), value: f64) -> u8 {
    let (low, high) = range;
    let scaled = (value - (low - 1.0)) * 255.0 / (high - low + 1.0);
    scaled.round().clamp(1.0, 255.0) as u8
}

/// Brightness (1-255) to level (1-100)
pub fn brightness_to_value(range: (f64, f64), brightness: u8) -> f64 {
    let (low, high) = range;
    f64::from(brightness) * (high - low + 1.0) / 255.0 + (low - 1.0)
}

/// Scale every channel of a colour by `brightness / 255`
pub fn scale_color_brightness<const N: usize>(color: [u8; N], brightness: Option<u8>) -> [u8; N] {
    match brightness {
        Some(brightness) => color.map(|c| {
            (f64::from(c) * f64::from(brightness) / 255.0)
                .round()
                .clamp(0.0, 255.0) as u8
        }),
        None => color,
    }
}

/// A light entity
#[async_trait]
pub trait LightEntity: Entity {
    fn is_on(&self) -> Option<bool>;

    fn brightness(&self) -> Option<u8>;

    fn color_mode(&self) -> ColorMode;

    fn supported_color_modes(&self) -> Vec<ColorMode> {
        vec![self.color_mode()]
    }

    fn supported_features(&self) -> LightEntityFeature;

    fn hs_color(&self) -> Option<(f64, f64)> {
        None
    }

    fn rgb_color(&self) -> Option<[u8; 3]> {
        None
    }

    fn rgbw_color(&self) -> Option<[u8; 4]> {
        None
    }

    fn color_temp_kelvin(&self) -> Option<u32> {
        None
    }

    /// (min, max) colour temperature in kelvin
    fn color_temp_range(&self) -> Option<(u32, u32)> {
        None
    }

    async fn turn_on(&self, params: LightTurnOn) -> VantageResult<()>;

    async fn turn_off(&self, transition: Option<f64>) -> VantageResult<()>;
}

fn light_state(light: &dyn LightEntity) -> String {
    on_off(light.is_on())
}

fn light_attributes(light: &dyn LightEntity) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(
        "supported_color_modes".into(),
        json!(light.supported_color_modes()),
    );
    attrs.insert(
        "supported_features".into(),
        json!(light.supported_features().bits()),
    );
    if let Some((min, max)) = light.color_temp_range() {
        attrs.insert("min_color_temp_kelvin".into(), json!(min));
        attrs.insert("max_color_temp_kelvin".into(), json!(max));
    }

    if light.is_on() != Some(true) {
        return attrs;
    }

    let mode = light.color_mode();
    attrs.insert("color_mode".into(), json!(mode));
    if mode != ColorMode::OnOff {
        attrs.insert("brightness".into(), json!(light.brightness()));
    }
    match mode {
        ColorMode::Hs => {
            attrs.insert("hs_color".into(), json!(light.hs_color()));
        }
        ColorMode::Rgb => {
            attrs.insert("rgb_color".into(), json!(light.rgb_color()));
        }
        ColorMode::Rgbw => {
            attrs.insert("rgbw_color".into(), json!(light.rgbw_color()));
        }
        ColorMode::ColorTemp => {
            attrs.insert("color_temp_kelvin".into(), json!(light.color_temp_kelvin()));
        }
        ColorMode::OnOff | ColorMode::Brightness => {}
    }
    attrs
}

fn level_brightness(level: Option<f64>) -> Option<u8> {
    level.map(|level| value_to_brightness(LEVEL_RANGE, level))
}

fn requested_level(params: &LightTurnOn) -> f64 {
    brightness_to_value(LEVEL_RANGE, params.brightness.unwrap_or(255))
}

macro_rules! light_entity {
    ($ty:ty, $controller:ident $(, entry_type = $entry_type:expr)?) => {
        impl Entity for $ty {
            fn base(&self) -> &VantageEntity {
                &self.base
            }

            fn available(&self) -> bool {
                self.base.client.$controller.contains(self.base.id)
            }

            fn device_info(&self) -> Option<DeviceInfo> {
                let info = self
                    .base
                    .device_info_for(self.base.object(&self.base.client.$controller));
                $(
                    let info = info.map(|mut info| {
                        info.entry_type = Some($entry_type);
                        info
                    });
                )?
                info
            }

            fn icon(&self) -> Option<&'static str> {
                self.icon
            }

            fn state(&self) -> String {
                light_state(self)
            }

            fn extra_attributes(&self) -> Attributes {
                light_attributes(self)
            }
        }
    };
}

/// Light backed by a single load
pub struct VantageLight {
    base: VantageEntity,
    color_mode: ColorMode,
    features: LightEntityFeature,
    icon: Option<&'static str>,
}

impl VantageLight {
    /// Dimmable power profiles get brightness and transitions; others are on/off
    pub fn new(client: &Arc<Vantage>, load: &Load) -> Self {
        let dimmable = load
            .power_profile
            .and_then(|id| client.power_profiles.get(id))
            .map(|profile| profile.dimmable)
            .unwrap_or(false);
        let (color_mode, features) = if dimmable {
            (ColorMode::Brightness, LightEntityFeature::TRANSITION)
        } else {
            (ColorMode::OnOff, LightEntityFeature::empty())
        };
        Self {
            base: VantageEntity::new(client, load),
            color_mode,
            features,
            icon: None,
        }
    }

    fn load(&self) -> Option<Load> {
        self.base.object(&self.base.client.loads)
    }
}

light_entity!(VantageLight, loads);

#[async_trait]
impl LightEntity for VantageLight {
    fn is_on(&self) -> Option<bool> {
        self.load().and_then(|load| load.is_on())
    }

    fn brightness(&self) -> Option<u8> {
        level_brightness(self.load().and_then(|load| load.level))
    }

    fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    fn supported_features(&self) -> LightEntityFeature {
        self.features
    }

    async fn turn_on(&self, params: LightTurnOn) -> VantageResult<()> {
        let transition = params.transition.unwrap_or(0.0);
        self.base
            .client
            .loads
            .turn_on(self.base.id, transition, requested_level(&params))
            .await
    }

    async fn turn_off(&self, transition: Option<f64>) -> VantageResult<()> {
        self.base
            .client
            .loads
            .turn_off(self.base.id, transition.unwrap_or(0.0))
            .await
    }
}

/// Light backed by a colour load
pub struct VantageRgbLight {
    base: VantageEntity,
    color_mode: ColorMode,
    features: LightEntityFeature,
    temp_range: Option<(u32, u32)>,
    icon: Option<&'static str>,
}

impl VantageRgbLight {
    /// The load's colour type picks the single colour mode
    ///
    /// Unrecognised colour types fall back to a dimmable light.
    pub fn new(client: &Arc<Vantage>, load: &RgbLoad) -> Self {
        let mut temp_range = None;
        let (color_mode, features) = match load.color_type {
            ColorType::Hsl => (ColorMode::Hs, LightEntityFeature::TRANSITION),
            ColorType::Rgb => (ColorMode::Rgb, LightEntityFeature::TRANSITION),
            ColorType::Rgbw => (ColorMode::Rgbw, LightEntityFeature::empty()),
            ColorType::Cct => {
                temp_range = Some((load.min_temp, load.max_temp));
                (ColorMode::ColorTemp, LightEntityFeature::TRANSITION)
            }
            ColorType::Unknown(ref other) => {
                warn!(
                    "Unsupported color type {} for RGB light {}",
                    other, load.info.name
                );
                (ColorMode::Brightness, LightEntityFeature::TRANSITION)
            }
        };
        Self {
            base: VantageEntity::new(client, load),
            color_mode,
            features,
            temp_range,
            icon: None,
        }
    }

    fn load(&self) -> Option<RgbLoad> {
        self.base.object(&self.base.client.rgb_loads)
    }
}

light_entity!(VantageRgbLight, rgb_loads);

#[async_trait]
impl LightEntity for VantageRgbLight {
    fn is_on(&self) -> Option<bool> {
        self.load().and_then(|load| load.is_on())
    }

    fn brightness(&self) -> Option<u8> {
        level_brightness(self.load().and_then(|load| load.level))
    }

    fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    fn supported_features(&self) -> LightEntityFeature {
        self.features
    }

    fn hs_color(&self) -> Option<(f64, f64)> {
        self.load()
            .and_then(|load| load.hsl)
            .map(|(hue, saturation, _)| (hue, saturation))
    }

    fn rgb_color(&self) -> Option<[u8; 3]> {
        self.load().and_then(|load| load.rgb)
    }

    fn rgbw_color(&self) -> Option<[u8; 4]> {
        self.load().and_then(|load| load.rgbw)
    }

    fn color_temp_kelvin(&self) -> Option<u32> {
        self.load().and_then(|load| load.color_temp)
    }

    fn color_temp_range(&self) -> Option<(u32, u32)> {
        self.temp_range
    }

    /// RGBW wins over RGB, RGB over HS; without a colour the temperature
    /// (if any) is set before ramping to the requested level.
    async fn turn_on(&self, params: LightTurnOn) -> VantageResult<()> {
        let id = self.base.id;
        let loads = &self.base.client.rgb_loads;
        let transition = params.transition.unwrap_or(0.0);

        if let Some(rgbw) = params.rgbw_color {
            let rgbw = scale_color_brightness(rgbw, params.brightness);
            return loads.set_rgbw(id, rgbw).await;
        }
        if let Some(rgb) = params.rgb_color {
            let rgb = scale_color_brightness(rgb, params.brightness);
            return loads.dissolve_rgb(id, rgb, transition).await;
        }
        if let Some((hue, saturation)) = params.hs_color {
            return loads
                .dissolve_hsl(id, hue, saturation, requested_level(&params), transition)
                .await;
        }

        if let Some(kelvin) = params.color_temp_kelvin {
            loads.set_color_temp(id, kelvin).await?;
        }
        loads.turn_on(id, transition, requested_level(&params)).await
    }

    async fn turn_off(&self, transition: Option<f64>) -> VantageResult<()> {
        self.base
            .client
            .rgb_loads
            .turn_off(self.base.id, transition.unwrap_or(0.0))
            .await
    }
}

/// Light backed by a load group
pub struct VantageLightGroup {
    base: VantageEntity,
    icon: Option<&'static str>,
}

impl VantageLightGroup {
    pub fn new(client: &Arc<Vantage>, group: &LoadGroup) -> Self {
        Self {
            base: VantageEntity::new(client, group),
            icon: Some("mdi:lightbulb-group"),
        }
    }

    fn group(&self) -> Option<LoadGroup> {
        self.base.object(&self.base.client.load_groups)
    }
}

// Groups are virtual, so their device is a service
light_entity!(VantageLightGroup, load_groups, entry_type = DeviceEntryType::Service);

#[async_trait]
impl LightEntity for VantageLightGroup {
    fn is_on(&self) -> Option<bool> {
        self.group().and_then(|group| group.is_on())
    }

    fn brightness(&self) -> Option<u8> {
        level_brightness(self.group().and_then(|group| group.level))
    }

    fn color_mode(&self) -> ColorMode {
        ColorMode::Brightness
    }

    fn supported_features(&self) -> LightEntityFeature {
        LightEntityFeature::TRANSITION
    }

    async fn turn_on(&self, params: LightTurnOn) -> VantageResult<()> {
        let transition = params.transition.unwrap_or(0.0);
        self.base
            .client
            .load_groups
            .turn_on(self.base.id, transition, requested_level(&params))
            .await
    }

    async fn turn_off(&self, transition: Option<f64>) -> VantageResult<()> {
        self.base
            .client
            .load_groups
            .turn_off(self.base.id, transition.unwrap_or(0.0))
            .await
    }
}

/// Register light entities for light loads, colour loads and load groups
pub fn async_setup_entry(runtime: &VantageRuntime) {
    register_objects(
        runtime,
        Platform::Light,
        |v| &v.loads,
        |load| load.is_light(),
        |client, load| PlatformEntity::Light(Arc::new(VantageLight::new(client, load))),
    );
    register_objects(
        runtime,
        Platform::Light,
        |v| &v.rgb_loads,
        |_| true,
        |client, load| PlatformEntity::Light(Arc::new(VantageRgbLight::new(client, load))),
    );
    register_objects(
        runtime,
        Platform::Light,
        |v| &v.load_groups,
        |_| true,
        |client, group| PlatformEntity::Light(Arc::new(VantageLightGroup::new(client, group))),
    );
}
