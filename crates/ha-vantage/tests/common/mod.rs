//! Shared harness for the Vantage integration tests
//!
//! A [`FakeBackend`] stands in for the controller connection, the
//! fixtures describe a small but complete system, and [`TestVantage`]
//! wires both into a config entry manager.

#![allow(dead_code)]

mod fake_backend;
mod fixtures;
mod logs;
mod test_hass;

pub use fake_backend::*;
pub use fixtures::*;
pub use logs::*;
pub use test_hass::*;
