//! Vantage object model
//!
//! Every object configured on a controller shares an [`ObjectInfo`] header
//! (id, names, type string, owning master, optional area and parent) and
//! adds the attributes of its category. Attributes that the controller
//! reports at runtime (levels, colours, variable values, contact and button
//! states) are `Option`s until the first status arrives.

/// Object identifier as assigned by the controller
pub type ObjectId = u32;

/// Reference to a parent object and this object's position within it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent {
    pub id: ObjectId,
    pub position: u32,
}

/// Attributes shared by every object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub name: String,
    pub display_name: Option<String>,
    /// Type string, `"Manufacturer.Model"` for custom devices
    pub object_type: String,
    /// Master (controller) the object belongs to
    pub master: ObjectId,
    pub area: Option<ObjectId>,
    pub parent: Option<Parent>,
}

impl ObjectInfo {
    pub fn new(id: ObjectId, name: impl Into<String>, object_type: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            display_name: None,
            object_type: object_type.into(),
            master: 0,
            area: None,
            parent: None,
        }
    }

    pub fn with_master(mut self, master: ObjectId) -> Self {
        self.master = master;
        self
    }

    pub fn with_area(mut self, area: ObjectId) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_parent(mut self, id: ObjectId, position: u32) -> Self {
        self.parent = Some(Parent { id, position });
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Common view over every object category
pub trait SystemObject: Clone + PartialEq + Send + Sync + 'static {
    fn info(&self) -> &ObjectInfo;

    fn id(&self) -> ObjectId {
        self.info().id
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    /// Name shown to users, falling back to `name`
    fn display_name(&self) -> &str {
        let info = self.info();
        info.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&info.name)
    }

    fn vantage_type(&self) -> &str {
        &self.info().object_type
    }

    fn master(&self) -> ObjectId {
        self.info().master
    }

    fn area(&self) -> Option<ObjectId> {
        self.info().area
    }

    fn parent(&self) -> Option<Parent> {
        self.info().parent
    }

    fn serial_number(&self) -> Option<u32> {
        None
    }

    fn is_master(&self) -> bool {
        false
    }

    /// Fill runtime status this snapshot lacks from `previous`
    ///
    /// Configuration updates arrive without live values such as levels or
    /// button state; those are carried over from the stored object.
    fn carry_status(&mut self, _previous: &Self) {}
}

/// Objects with a 0-100 level that can be ramped
pub trait LevelObject: SystemObject {
    fn level(&self) -> Option<f64>;

    fn is_on(&self) -> Option<bool> {
        self.level().map(|level| level > 0.0)
    }
}

macro_rules! system_object {
    ($ty:ty $(, serial = $serial:ident)? $(, status = [$($field:ident),+])?) => {
        impl SystemObject for $ty {
            fn info(&self) -> &ObjectInfo {
                &self.info
            }

            $(
                fn serial_number(&self) -> Option<u32> {
                    self.$serial
                }
            )?

            $(
                fn carry_status(&mut self, previous: &Self) {
                    $(
                        if self.$field.is_none() {
                            self.$field = previous.$field.clone();
                        }
                    )+
                }
            )?
        }
    };
}

macro_rules! level_object {
    ($ty:ty) => {
        impl LevelObject for $ty {
            fn level(&self) -> Option<f64> {
                self.level
            }
        }
    };
}

/// A controller in the system
#[derive(Debug, Clone, PartialEq)]
pub struct Master {
    pub info: ObjectInfo,
    pub serial_number: Option<u32>,
}

/// A power or dimmer module plugged into a controller
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub info: ObjectInfo,
}

/// A third-party device attached through a port
#[derive(Debug, Clone, PartialEq)]
pub struct PortDevice {
    pub info: ObjectInfo,
}

/// A keypad or other station on the bus
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub info: ObjectInfo,
    pub serial_number: Option<u32>,
}

/// Wall box grouping stations; never shown as a device of its own
#[derive(Debug, Clone, PartialEq)]
pub struct BackBox {
    pub info: ObjectInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub info: ObjectInfo,
}

/// Electrical profile of a load
#[derive(Debug, Clone, PartialEq)]
pub struct PowerProfile {
    pub info: ObjectInfo,
    pub dimmable: bool,
}

/// A single lighting, relay or motor load
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub info: ObjectInfo,
    /// e.g. "Incandescent", "High Voltage Relay", "Motor"
    pub load_type: String,
    pub power_profile: Option<ObjectId>,
    pub level: Option<f64>,
}

impl Load {
    pub fn new(info: ObjectInfo, load_type: impl Into<String>) -> Self {
        Self {
            info,
            load_type: load_type.into(),
            power_profile: None,
            level: None,
        }
    }

    pub fn is_relay(&self) -> bool {
        matches!(
            self.load_type.as_str(),
            "High Voltage Relay" | "Low Voltage Relay"
        )
    }

    pub fn is_motor(&self) -> bool {
        self.load_type == "Motor"
    }

    pub fn is_light(&self) -> bool {
        !self.is_relay() && !self.is_motor()
    }
}

/// How an RGB load interprets colour commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorType {
    Hsl,
    Rgb,
    Rgbw,
    Cct,
    Unknown(String),
}

impl From<&str> for ColorType {
    fn from(s: &str) -> Self {
        match s {
            "HSL" => ColorType::Hsl,
            "RGB" => ColorType::Rgb,
            "RGBW" => ColorType::Rgbw,
            "CCT" => ColorType::Cct,
            other => ColorType::Unknown(other.to_string()),
        }
    }
}

impl From<&String> for ColorType {
    fn from(s: &String) -> Self {
        ColorType::from(s.as_str())
    }
}

impl std::fmt::Display for ColorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorType::Hsl => f.write_str("HSL"),
            ColorType::Rgb => f.write_str("RGB"),
            ColorType::Rgbw => f.write_str("RGBW"),
            ColorType::Cct => f.write_str("CCT"),
            ColorType::Unknown(other) => f.write_str(other),
        }
    }
}

/// A colour-capable load
#[derive(Debug, Clone, PartialEq)]
pub struct RgbLoad {
    pub info: ObjectInfo,
    pub color_type: ColorType,
    pub level: Option<f64>,
    /// Hue (0-360), saturation (0-100), lightness (0-100)
    pub hsl: Option<(f64, f64, f64)>,
    pub rgb: Option<[u8; 3]>,
    pub rgbw: Option<[u8; 4]>,
    /// Colour temperature in kelvin
    pub color_temp: Option<u32>,
    pub min_temp: u32,
    pub max_temp: u32,
}

impl RgbLoad {
    pub fn new(info: ObjectInfo, color_type: impl Into<ColorType>) -> Self {
        Self {
            info,
            color_type: color_type.into(),
            level: None,
            hsl: None,
            rgb: None,
            rgbw: None,
            color_temp: None,
            min_temp: 2000,
            max_temp: 6500,
        }
    }
}

/// A group of loads controlled together
#[derive(Debug, Clone, PartialEq)]
pub struct LoadGroup {
    pub info: ObjectInfo,
    pub level: Option<f64>,
}

/// Value held by a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GMemValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

/// A global memory variable
#[derive(Debug, Clone, PartialEq)]
pub struct GMem {
    pub info: ObjectInfo,
    /// Variable type tag, e.g. "Number", "Level", "DegC", "bool", "Text"
    pub tag: String,
    pub value: Option<GMemValue>,
}

impl GMem {
    pub fn new(info: ObjectInfo, tag: impl Into<String>) -> Self {
        Self {
            info,
            tag: tag.into(),
            value: None,
        }
    }

    pub fn is_bool(&self) -> bool {
        self.tag == "bool"
    }

    pub fn is_text(&self) -> bool {
        self.tag == "Text"
    }

    /// Fixed-point values are stored as thousandths
    pub fn is_fixed(&self) -> bool {
        matches!(
            self.tag.as_str(),
            "DeviceUnits" | "Seconds" | "DegC" | "Decimal" | "Fixed"
        )
    }

    pub fn is_int(&self) -> bool {
        !self.is_bool() && !self.is_text() && !self.is_fixed()
    }
}

/// A dry contact input
#[derive(Debug, Clone, PartialEq)]
pub struct DryContact {
    pub info: ObjectInfo,
    pub triggered: Option<bool>,
}

/// A keypad button; its parent is the station it sits on
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub info: ObjectInfo,
    pub pressed: Option<bool>,
}

impl SystemObject for Master {
    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn serial_number(&self) -> Option<u32> {
        self.serial_number
    }

    fn is_master(&self) -> bool {
        true
    }
}

system_object!(Module);
system_object!(PortDevice);
system_object!(Station, serial = serial_number);
system_object!(BackBox);
system_object!(Area);
system_object!(PowerProfile);
system_object!(Load, status = [level]);
system_object!(RgbLoad, status = [level, hsl, rgb, rgbw, color_temp]);
system_object!(LoadGroup, status = [level]);
system_object!(GMem, status = [value]);
system_object!(DryContact, status = [triggered]);
system_object!(Button, status = [pressed]);

level_object!(Load);
level_object!(RgbLoad);
level_object!(LoadGroup);

/// Any object, as enumerated from the controller
#[derive(Debug, Clone, PartialEq)]
pub enum AnyObject {
    Master(Master),
    Module(Module),
    PortDevice(PortDevice),
    Station(Station),
    BackBox(BackBox),
    Area(Area),
    PowerProfile(PowerProfile),
    Load(Load),
    RgbLoad(RgbLoad),
    LoadGroup(LoadGroup),
    GMem(GMem),
    DryContact(DryContact),
    Button(Button),
}

impl AnyObject {
    pub fn info(&self) -> &ObjectInfo {
        match self {
            AnyObject::Master(o) => o.info(),
            AnyObject::Module(o) => o.info(),
            AnyObject::PortDevice(o) => o.info(),
            AnyObject::Station(o) => o.info(),
            AnyObject::BackBox(o) => o.info(),
            AnyObject::Area(o) => o.info(),
            AnyObject::PowerProfile(o) => o.info(),
            AnyObject::Load(o) => o.info(),
            AnyObject::RgbLoad(o) => o.info(),
            AnyObject::LoadGroup(o) => o.info(),
            AnyObject::GMem(o) => o.info(),
            AnyObject::DryContact(o) => o.info(),
            AnyObject::Button(o) => o.info(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.info().id
    }
}
