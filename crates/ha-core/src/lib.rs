//! Core types for Home Assistant
//!
//! The fundamental values passed between the hub and its integrations:
//! entity ids, entity states, bus events and the context that ties a chain
//! of actions together.

mod context;
mod entity_id;
mod event;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use state::State;

/// State value reported for entities whose backing object is gone
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State value reported when the backing object has no value yet
pub const STATE_UNKNOWN: &str = "unknown";

/// Standard event types used by Home Assistant
pub mod events {
    use super::*;

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
