//! A small Vantage system: one master, a dimmer module, a keypad and a
//! handful of loads, variables and inputs

use vantage_client::{
    AnyObject, Area, BackBox, Button, DryContact, GMem, GMemValue, Load, LoadGroup, Master,
    Module, ObjectInfo, PortDevice, PowerProfile, RgbLoad, Station,
};

pub const MASTER: u32 = 1;
pub const KITCHEN: u32 = 2;
pub const MODULE: u32 = 10;
pub const PORT_DEVICE: u32 = 11;
pub const KEYPAD: u32 = 20;
pub const BACK_BOX: u32 = 30;
pub const DIMMABLE: u32 = 40;
pub const NON_DIMMABLE: u32 = 41;

pub const PENDANT: u32 = 100;
pub const PORCH_RELAY: u32 = 101;
pub const CLOSET: u32 = 102;
pub const SHADE_MOTOR: u32 = 103;
pub const COVE_RGB: u32 = 110;
pub const STRIP: u32 = 111;
pub const WHITE_TUNE: u32 = 112;
pub const KITCHEN_GROUP: u32 = 120;

pub const AWAY_MODE: u32 = 130;
pub const SETPOINT: u32 = 131;
pub const COUNTER: u32 = 132;
pub const MESSAGE: u32 = 133;

pub const GATE: u32 = 140;
pub const SCENE_BUTTON: u32 = 150;
pub const LOOSE_BUTTON: u32 = 151;

pub const FIRMWARE: &str = "4.5.1";

fn info(id: u32, name: &str, object_type: &str) -> ObjectInfo {
    ObjectInfo::new(id, name, object_type).with_master(MASTER)
}

pub fn master() -> Master {
    Master {
        info: info(MASTER, "IC-DIN-II", "Master").with_display_name("Main Controller"),
        serial_number: Some(123_456),
    }
}

pub fn module() -> Module {
    Module {
        info: info(MODULE, "Dimmer Module", "Module").with_parent(MASTER, 1),
    }
}

pub fn port_device() -> PortDevice {
    PortDevice {
        info: info(PORT_DEVICE, "Shade Bridge", "Somfy.URTSI_2"),
    }
}

pub fn keypad() -> Station {
    Station {
        info: info(KEYPAD, "Kitchen Keypad", "Keypad")
            .with_area(KITCHEN)
            .with_parent(BACK_BOX, 1),
        serial_number: Some(0),
    }
}

pub fn dimmer(id: u32, name: &str, level: f64) -> Load {
    let mut load = Load::new(
        info(id, name, "Load").with_area(KITCHEN).with_parent(MODULE, 1),
        "Incandescent",
    );
    load.power_profile = Some(DIMMABLE);
    load.level = Some(level);
    load
}

pub fn relay(id: u32, name: &str, level: f64) -> Load {
    let mut load = Load::new(info(id, name, "Load"), "High Voltage Relay");
    load.power_profile = Some(NON_DIMMABLE);
    load.level = Some(level);
    load
}

pub fn rgb_load(id: u32, name: &str, color_type: &str) -> RgbLoad {
    let mut load = RgbLoad::new(info(id, name, "Vantage.DGColorLoad"), color_type);
    load.level = Some(80.0);
    load
}

pub fn gmem(id: u32, name: &str, tag: &str, value: GMemValue) -> GMem {
    let mut gmem = GMem::new(info(id, name, "GMem"), tag);
    gmem.value = Some(value);
    gmem
}

pub fn button(id: u32, name: &str, parent: Option<(u32, u32)>) -> Button {
    let info = match parent {
        Some((station, position)) => info(id, name, "Button").with_parent(station, position),
        None => info(id, name, "Button"),
    };
    Button {
        info,
        pressed: Some(false),
    }
}

/// Every object of the fixture system
pub fn system() -> Vec<AnyObject> {
    let mut closet = dimmer(CLOSET, "Closet Light", 100.0);
    closet.power_profile = Some(NON_DIMMABLE);

    let mut motor = Load::new(info(SHADE_MOTOR, "Shade Motor", "Load"), "Motor");
    motor.level = Some(0.0);

    let mut cove = rgb_load(COVE_RGB, "Cove RGB", "RGB");
    cove.rgb = Some([255, 0, 0]);

    let mut tune = rgb_load(WHITE_TUNE, "White Tune", "CCT");
    tune.color_temp = Some(3000);
    tune.min_temp = 2700;
    tune.max_temp = 5000;

    vec![
        AnyObject::Master(master()),
        AnyObject::Area(Area {
            info: info(KITCHEN, "Kitchen", "Area"),
        }),
        AnyObject::Module(module()),
        AnyObject::PortDevice(port_device()),
        AnyObject::BackBox(BackBox {
            info: info(BACK_BOX, "Kitchen Box", "BackBox"),
        }),
        AnyObject::Station(keypad()),
        AnyObject::PowerProfile(PowerProfile {
            info: info(DIMMABLE, "Incandescent Profile", "PowerProfile"),
            dimmable: true,
        }),
        AnyObject::PowerProfile(PowerProfile {
            info: info(NON_DIMMABLE, "Relay Profile", "PowerProfile"),
            dimmable: false,
        }),
        AnyObject::Load(dimmer(PENDANT, "Kitchen Pendant", 50.0)),
        AnyObject::Load(relay(PORCH_RELAY, "Porch Relay", 0.0)),
        AnyObject::Load(closet),
        AnyObject::Load(motor),
        AnyObject::RgbLoad(cove),
        AnyObject::RgbLoad(rgb_load(STRIP, "Accent Strip", "PWM")),
        AnyObject::RgbLoad(tune),
        AnyObject::LoadGroup(LoadGroup {
            info: info(KITCHEN_GROUP, "All Kitchen", "LoadGroup"),
            level: Some(0.0),
        }),
        AnyObject::GMem(gmem(AWAY_MODE, "Away Mode", "bool", GMemValue::Bool(false))),
        AnyObject::GMem(gmem(SETPOINT, "Setpoint", "DegC", GMemValue::Int(21_500))),
        AnyObject::GMem(gmem(COUNTER, "Counter", "Number", GMemValue::Int(7))),
        AnyObject::GMem(gmem(
            MESSAGE,
            "Message",
            "Text",
            GMemValue::Text("hello".into()),
        )),
        AnyObject::DryContact(DryContact {
            info: info(GATE, "Gate Contact", "DryContact").with_parent(KEYPAD, 5),
            triggered: Some(false),
        }),
        AnyObject::Button(button(SCENE_BUTTON, "Scene 1", Some((KEYPAD, 3)))),
        AnyObject::Button(button(LOOSE_BUTTON, "Loose Button", None)),
    ]
}
