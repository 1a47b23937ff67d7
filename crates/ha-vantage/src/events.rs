//! Button events on the bus
//!
//! Keypad button presses and releases are fired as
//! `vantage_button_pressed` / `vantage_button_released` so automations can
//! react to them.

use std::sync::Arc;

use ha_config_entries::HomeAssistant;
use ha_core::Context;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;
use vantage_client::{Button, EventFilter, EventKind, ObjectEvent, ObjectId, SystemObject, Vantage};

use crate::constants::{EVENT_BUTTON_PRESSED, EVENT_BUTTON_RELEASED};

/// Payload of a button event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEventData {
    pub button_id: ObjectId,
    pub button_name: String,
    /// Position of the button on its station, 0 if it has no parent
    pub button_position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
}

/// Event type and payload for a button notification, if it is a press or release
pub fn button_event(
    client: &Vantage,
    event: &ObjectEvent<Button>,
) -> Option<(&'static str, ButtonEventData)> {
    if event.kind != EventKind::ObjectUpdated || !event.attrs_changed.contains(&"pressed") {
        return None;
    }

    let button = &event.object;
    let parent = button.parent();
    let station = parent.and_then(|parent| client.stations.get(parent.id));
    let data = ButtonEventData {
        button_id: button.id(),
        button_name: button.name().to_string(),
        button_position: parent.map(|parent| parent.position).unwrap_or(0),
        station_id: station.as_ref().map(|station| station.id()),
        station_name: station.as_ref().map(|station| station.name().to_string()),
    };

    let event_type = if button.pressed.unwrap_or(false) {
        EVENT_BUTTON_PRESSED
    } else {
        EVENT_BUTTON_RELEASED
    };
    Some((event_type, data))
}

/// Forward button presses and releases to the bus until aborted
pub fn async_setup_events(hass: &HomeAssistant, client: &Arc<Vantage>) -> JoinHandle<()> {
    let mut events = client
        .buttons
        .subscribe(EventFilter::all().kind(EventKind::ObjectUpdated));
    let bus = Arc::clone(&hass.bus);
    let client = Arc::clone(client);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some((event_type, data)) = button_event(&client, &event) {
                debug!(event_type, button_id = data.button_id, "Firing button event");
                bus.fire_data(event_type, &data, Context::new());
            }
        }
    })
}
