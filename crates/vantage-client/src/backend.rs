//! Transport seam between the client and a Vantage controller

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::VantageResult;
use crate::objects::{AnyObject, GMemValue, ObjectId};

/// A single request to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ramp a load, RGB load or load group to `level` (0-100) over `transition` seconds
    Ramp {
        id: ObjectId,
        level: f64,
        transition: f64,
    },
    SetRgbw {
        id: ObjectId,
        rgbw: [u8; 4],
    },
    DissolveRgb {
        id: ObjectId,
        rgb: [u8; 3],
        transition: f64,
    },
    DissolveHsl {
        id: ObjectId,
        hue: f64,
        saturation: f64,
        level: f64,
        transition: f64,
    },
    SetColorTemp {
        id: ObjectId,
        kelvin: u32,
    },
    SetVariable {
        id: ObjectId,
        value: GMemValue,
    },
}

impl Command {
    /// Object the command addresses
    pub fn id(&self) -> ObjectId {
        match self {
            Command::Ramp { id, .. }
            | Command::SetRgbw { id, .. }
            | Command::DissolveRgb { id, .. }
            | Command::DissolveHsl { id, .. }
            | Command::SetColorTemp { id, .. }
            | Command::SetVariable { id, .. } => *id,
        }
    }
}

/// What changed on an object
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Level(f64),
    Hsl(f64, f64, f64),
    Rgb([u8; 3]),
    Rgbw([u8; 4]),
    ColorTemp(u32),
    Variable(GMemValue),
    Triggered(bool),
    Pressed(bool),
    /// Object configuration added or replaced
    Object(AnyObject),
    /// Object removed from the configuration
    Deleted,
}

/// A status notification pushed by the controller
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub id: ObjectId,
    pub change: StatusChange,
}

impl StatusUpdate {
    pub fn new(id: ObjectId, change: StatusChange) -> Self {
        Self { id, change }
    }
}

/// Connection to a Vantage controller
#[async_trait]
pub trait Backend: Send + Sync {
    /// Authenticate; fails with `LoginRequired` or `LoginFailed`
    async fn login(&self) -> VantageResult<()>;

    /// Enumerate every configured object
    async fn fetch_objects(&self) -> VantageResult<Vec<AnyObject>>;

    /// Send one command and wait for the controller to accept it
    async fn send(&self, command: Command) -> VantageResult<()>;

    /// Firmware version of a master
    async fn application_version(&self, master: ObjectId) -> VantageResult<Option<String>>;

    /// Stream of status notifications
    fn subscribe_status(&self) -> broadcast::Receiver<StatusUpdate>;

    /// Close the connection
    fn close(&self);
}
