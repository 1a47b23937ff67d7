//! The hub handle passed to integrations

use std::sync::Arc;

use ha_event_bus::{EventBus, SharedEventBus};
use ha_registries::Registries;

/// Shared handles an integration needs while it is set up
///
/// Cheap to clone; every clone points at the same bus and registries.
#[derive(Clone)]
pub struct HomeAssistant {
    pub bus: SharedEventBus,
    pub registries: Arc<Registries>,
}

impl HomeAssistant {
    /// Create a hub with an empty bus and empty registries
    pub fn new() -> Self {
        Self {
            bus: Arc::new(EventBus::new()),
            registries: Arc::new(Registries::new()),
        }
    }
}

impl Default for HomeAssistant {
    fn default() -> Self {
        Self::new()
    }
}
