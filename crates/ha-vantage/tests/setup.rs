//! Config entry lifecycle of the Vantage integration

mod common;

use std::time::Duration;

use common::*;
use ha_config_entries::{ConfigEntries, ConfigEntry, ConfigEntryState, HomeAssistant};
use ha_vantage::{Platform, VantageIntegration};
use serde_json::json;
use vantage_client::{Backend, StatusChange, VantageError};

#[tokio::test]
async fn test_setup_creates_entities_for_every_platform() {
    let t = TestVantage::new();
    assert_eq!(t.setup().await, ConfigEntryState::Loaded);
    assert_eq!(t.backend.logins(), 1);

    let runtime = t.runtime();
    let ids = runtime.entities.entity_ids();
    let count = |prefix: &str| ids.iter().filter(|id| id.starts_with(prefix)).count();
    assert_eq!(count("light."), 6);
    assert_eq!(count("switch."), 3);
    assert_eq!(count("number."), 2);
    assert_eq!(count("binary_sensor."), 1);
    assert_eq!(runtime.entities.len(), 12);

    assert!(runtime.entities.entity_id(Platform::Number, MESSAGE).is_none());
    assert!(runtime.entities.entity_id(Platform::Light, PORCH_RELAY).is_none());
    assert!(runtime.task_count() > 0);
}

#[tokio::test]
async fn test_entity_ids_follow_object_names() {
    let t = TestVantage::new();
    t.setup().await;

    assert_eq!(t.entity_id(Platform::Light, PENDANT), "light.kitchen_pendant");
    assert_eq!(t.entity_id(Platform::Switch, AWAY_MODE), "switch.away_mode");
    assert_eq!(t.entity_id(Platform::BinarySensor, GATE), "binary_sensor.gate_contact");

    let entry = t.hass.registries.entities.get("light.kitchen_pendant").unwrap();
    assert_eq!(entry.unique_id, PENDANT.to_string());
    assert_eq!(entry.platform, "vantage");
    assert_eq!(entry.config_entry_id.as_deref(), Some(t.entry_id.as_str()));
}

#[tokio::test]
async fn test_login_failure_requires_reauth() {
    let t = TestVantage::new();
    t.backend
        .fail_login(Some(VantageError::LoginFailed("bad password".into())));

    assert_eq!(t.setup().await, ConfigEntryState::SetupError);
    let entry = t.entry();
    assert!(entry.reauth_required);
    assert!(entry.reason.is_some());
    assert!(t.integration.runtime(&t.entry_id).is_none());
    assert!(t.backend.is_closed());
}

#[tokio::test]
async fn test_missing_credentials_require_reauth() {
    let t = TestVantage::new();
    t.backend.fail_login(Some(VantageError::LoginRequired));

    assert_eq!(t.setup().await, ConfigEntryState::SetupError);
    assert!(t.entry().reauth_required);
}

#[tokio::test]
async fn test_connection_failure_retries() {
    let t = TestVantage::new();
    t.backend
        .fail_fetch(Some(VantageError::Connection("connection refused".into())));

    assert_eq!(t.setup().await, ConfigEntryState::SetupRetry);
    let entry = t.entry();
    assert_eq!(entry.tries, 1);
    assert!(!entry.reauth_required);
    assert!(t.backend.is_closed());

    let delay = t.entries.retry_delay(&t.entry_id).unwrap();
    assert!(delay >= Duration::from_secs(5));
    assert!(delay <= Duration::from_millis(5100));

    // The controller comes back
    t.backend.fail_fetch(None);
    assert_eq!(t.setup().await, ConfigEntryState::Loaded);
    assert_eq!(t.entry().tries, 0);
    assert_eq!(t.runtime().entities.len(), 12);
}

#[tokio::test]
async fn test_timeout_retries_with_backoff() {
    let t = TestVantage::new();
    t.backend.fail_fetch(Some(VantageError::Timeout));

    assert_eq!(t.setup().await, ConfigEntryState::SetupRetry);
    assert_eq!(t.setup().await, ConfigEntryState::SetupRetry);
    assert_eq!(t.entry().tries, 2);

    let delay = t.entries.retry_delay(&t.entry_id).unwrap();
    assert!(delay >= Duration::from_secs(10));
}

#[tokio::test]
async fn test_other_errors_fail_setup() {
    let t = TestVantage::new();
    t.backend
        .fail_fetch(Some(VantageError::Command("unexpected response".into())));

    assert_eq!(t.setup().await, ConfigEntryState::SetupError);
    assert!(!t.entry().reauth_required);
    assert!(t.entries.retry_delay(&t.entry_id).is_none());
}

#[tokio::test]
async fn test_invalid_entry_data_fails_setup() {
    let backend = std::sync::Arc::new(FakeBackend::new(system()));
    let integration = std::sync::Arc::new(VantageIntegration::new(move |_| {
        std::sync::Arc::clone(&backend) as std::sync::Arc<dyn Backend>
    }));
    let hass = HomeAssistant::new();
    let entries = ConfigEntries::new();
    entries.register_integration(integration.clone());
    let entry = entries
        .add(ConfigEntry::new("vantage", "No host").with_json_data(json!({"username": "admin"})))
        .unwrap();

    let state = entries.setup(&hass, &entry.entry_id).await.unwrap();
    assert_eq!(state, ConfigEntryState::SetupError);
    assert!(integration.runtime(&entry.entry_id).is_none());
}

#[tokio::test]
async fn test_unload_stops_following_the_controller() {
    let t = TestVantage::new();
    t.setup().await;
    let runtime = t.runtime();
    let pendant = t.entity_id(Platform::Light, PENDANT);
    assert_eq!(runtime.entities.state(&pendant).unwrap().state, "on");

    t.unload().await;
    assert_eq!(t.entry().state, ConfigEntryState::NotLoaded);
    assert!(t.integration.runtime(&t.entry_id).is_none());
    assert!(t.backend.is_closed());
    assert_eq!(runtime.task_count(), 0);

    t.backend.push(PENDANT, StatusChange::Level(0.0));
    settle().await;
    assert_eq!(runtime.entities.state(&pendant).unwrap().state, "on");
}

#[tokio::test]
async fn test_reload_keeps_entity_ids() {
    let t = TestVantage::new();
    t.setup().await;
    let before = t.runtime().entities.entity_ids();

    let state = t.entries.reload(&t.hass, &t.entry_id).await.unwrap();
    assert_eq!(state, ConfigEntryState::Loaded);
    assert_eq!(t.backend.logins(), 2);
    assert_eq!(t.runtime().entities.entity_ids(), before);
    assert_eq!(t.hass.registries.entities.len(), before.len());
}

#[tokio::test]
async fn test_remove_clears_devices_and_entities() {
    let t = TestVantage::new();
    t.setup().await;
    assert!(!t.hass.registries.devices.get_by_config_entry_id(&t.entry_id).is_empty());

    t.entries.remove(&t.hass, &t.entry_id).await.unwrap();
    assert!(t.entries.get(&t.entry_id).is_none());
    assert!(t.hass.registries.devices.get_by_config_entry_id(&t.entry_id).is_empty());
    assert!(t.hass.registries.entities.get_by_config_entry_id(&t.entry_id).is_empty());
}
