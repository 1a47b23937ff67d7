//! Vantage InFusion client
//!
//! Typed mirror of the objects configured on a Vantage controller. Each
//! object category lives in a [`Controller`] that stores the current
//! snapshot, broadcasts add/update/delete notifications and sends commands
//! through a [`Backend`].
//!
//! The wire protocol is not part of this crate; a [`Backend`] implementation
//! supplies object enumeration, commands and status updates.
//!
//! # Key Types
//!
//! - [`Vantage`] - The client, one controller per object category
//! - [`Controller`] - Object store with filtered subscriptions
//! - [`Backend`] - Transport seam to the controller
//! - [`VantageError`] - Client errors

pub mod backend;
pub mod client;
pub mod controller;
pub mod error;
pub mod objects;

pub use backend::{Backend, Command, StatusChange, StatusUpdate};
pub use client::Vantage;
pub use controller::{Controller, EventFilter, EventKind, ObjectEvent, Subscription};
pub use error::{VantageError, VantageResult};
pub use objects::{
    AnyObject, Area, BackBox, Button, ColorType, DryContact, GMem, GMemValue, LevelObject, Load,
    LoadGroup, Master, Module, ObjectId, ObjectInfo, Parent, PortDevice, PowerProfile, RgbLoad,
    Station, SystemObject,
};
