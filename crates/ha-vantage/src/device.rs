//! Device registry mirror of the Vantage system
//!
//! Masters, modules, port devices and stations each become a device of the
//! config entry. The mirror is reconciled once at setup and then follows
//! the controllers' add/update/delete notifications.

use std::sync::Arc;

use ha_config_entries::HomeAssistant;
use ha_registries::{DeviceEntry, DeviceIdentifier, DeviceInfo};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vantage_client::{
    Controller, EventFilter, EventKind, ObjectId, SystemObject, Vantage, VantageResult,
};

use crate::constants::{DOMAIN, MANUFACTURER};

/// Identifier of the device mirroring object `id`
pub fn device_identifier(id: ObjectId) -> DeviceIdentifier {
    DeviceIdentifier::new(DOMAIN, id.to_string())
}

/// Split a type string into (manufacturer, model)
///
/// Custom devices are typed `"Manufacturer.Model"`; anything without a dot
/// is a built-in Vantage object.
pub fn manufacturer_and_model(vantage_type: &str) -> (String, String) {
    match vantage_type.split_once('.') {
        Some((manufacturer, model)) => (manufacturer.to_string(), model.to_string()),
        None => (MANUFACTURER.to_string(), vantage_type.to_string()),
    }
}

/// Describe the device for an object
pub fn vantage_device_info<T: SystemObject>(client: &Vantage, obj: &T) -> DeviceInfo {
    let (manufacturer, model) = manufacturer_and_model(obj.vantage_type());
    let mut info = DeviceInfo::new(device_identifier(obj.id())).with_name(obj.display_name());
    info.manufacturer = Some(manufacturer);
    info.model = Some(model);

    info.suggested_area = obj
        .area()
        .and_then(|area| client.areas.get(area))
        .map(|area| area.name().to_string());

    info.serial_number = obj
        .serial_number()
        .filter(|serial| *serial != 0)
        .map(|serial| serial.to_string());

    if !obj.is_master() {
        let via = match obj.parent() {
            Some(parent) if client.contains(parent.id) && !client.back_boxes.contains(parent.id) => {
                parent.id
            }
            _ => obj.master(),
        };
        info.via_device = Some(device_identifier(via));
    }

    info
}

async fn add_device<T: SystemObject>(
    hass: &HomeAssistant,
    entry_id: &str,
    client: &Vantage,
    obj: &T,
) -> VantageResult<Arc<DeviceEntry>> {
    let mut info = vantage_device_info(client, obj);
    if obj.is_master() {
        info.sw_version = client.masters.application_version(obj.id()).await?;
    }
    Ok(hass.registries.devices.get_or_create(entry_id, &info))
}

fn remove_device(hass: &HomeAssistant, id: ObjectId) {
    let identifier = device_identifier(id);
    if let Some(device) = hass.registries.devices.get_by_identifier(&identifier) {
        hass.registries.remove_device(&device.id);
        info!(object_id = id, "Removed device for deleted object");
    }
}

/// Mirror every object of a controller and follow its notifications
async fn register_items<T: SystemObject>(
    hass: &HomeAssistant,
    entry_id: &str,
    client: &Arc<Vantage>,
    controller: fn(&Vantage) -> &Controller<T>,
) -> VantageResult<JoinHandle<()>> {
    let mut events = controller(client).subscribe(EventFilter::all());
    for obj in controller(client).all() {
        add_device(hass, entry_id, client, &obj).await?;
    }

    let hass = hass.clone();
    let entry_id = entry_id.to_string();
    let client = Arc::clone(client);
    Ok(tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.kind {
                EventKind::ObjectDeleted => remove_device(&hass, event.object.id()),
                EventKind::ObjectAdded | EventKind::ObjectUpdated => {
                    if let Err(err) = add_device(&hass, &entry_id, &client, &event.object).await {
                        warn!(object_id = event.object.id(), "Failed to update device: {}", err);
                    }
                }
            }
        }
    }))
}

/// Remove devices of the entry whose object no longer exists
///
/// Device identifiers are the object id, optionally followed by `:suffix`.
pub fn remove_stale_devices(hass: &HomeAssistant, entry_id: &str, client: &Vantage) -> usize {
    let mut removed = 0;
    for device in hass.registries.devices.get_by_config_entry_id(entry_id) {
        let object_id = device
            .identifier_for(DOMAIN)
            .and_then(|id| id.split(':').next())
            .and_then(|id| id.parse::<ObjectId>().ok());

        let stale = match object_id {
            Some(id) => !client.contains(id),
            None => true,
        };
        if stale && hass.registries.remove_device(&device.id).is_some() {
            debug!(device_id = %device.id, "Removed stale device");
            removed += 1;
        }
    }
    if removed > 0 {
        info!(removed, "Removed devices for objects no longer on the controller");
    }
    removed
}

/// Reconcile the device registry with the client and keep it in sync
///
/// Returns the subscription tasks; the caller aborts them on unload.
pub async fn async_setup_devices(
    hass: &HomeAssistant,
    entry_id: &str,
    client: &Arc<Vantage>,
) -> VantageResult<Vec<JoinHandle<()>>> {
    let tasks = vec![
        register_items(hass, entry_id, client, |v| &v.masters).await?,
        register_items(hass, entry_id, client, |v| &v.modules).await?,
        register_items(hass, entry_id, client, |v| &v.port_devices).await?,
        register_items(hass, entry_id, client, |v| &v.stations).await?,
    ];

    remove_stale_devices(hass, entry_id, client);
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manufacturer_and_model() {
        assert_eq!(
            manufacturer_and_model("Somfy.URTSI_2_Shade_CHILD"),
            ("Somfy".to_string(), "URTSI_2_Shade_CHILD".to_string())
        );
        assert_eq!(
            manufacturer_and_model("Lutron.RadioRA.Dimmer"),
            ("Lutron".to_string(), "RadioRA.Dimmer".to_string())
        );
        assert_eq!(
            manufacturer_and_model("Keypad"),
            ("Vantage".to_string(), "Keypad".to_string())
        );
    }

    #[test]
    fn test_device_identifier() {
        let id = device_identifier(118);
        assert_eq!(id.domain(), "vantage");
        assert_eq!(id.id(), "118");
    }
}
