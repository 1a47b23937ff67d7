//! Vantage InFusion integration
//!
//! Sets up a config entry by connecting a [`Vantage`] client, mirroring the
//! controller's hardware into the device registry, forwarding keypad button
//! events to the bus and creating light, switch, number and binary sensor
//! entities for its loads, variables and dry contacts.
//!
//! # Setup errors
//!
//! | client error                    | setup result             |
//! |---------------------------------|--------------------------|
//! | `LoginRequired`, `LoginFailed`  | `SetupError::AuthFailed` |
//! | `Connection`, `Timeout`         | `SetupError::NotReady`   |
//! | anything else                   | `SetupError::Failed`     |

pub mod binary_sensor;
pub mod config;
pub mod constants;
pub mod device;
pub mod entity;
pub mod events;
pub mod light;
pub mod number;
pub mod runtime;
pub mod switch;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ha_config_entries::{ConfigEntry, HomeAssistant, Integration, SetupError};
use tracing::{info, warn};
use vantage_client::{Backend, Vantage, VantageError, VantageResult};

pub use config::{ConfigError, VantageConfig};
pub use constants::{Platform, DOMAIN, PLATFORMS};
pub use entity::{EntityStore, PlatformEntity};
pub use runtime::VantageRuntime;

/// Builds the backend for an entry's connection settings
pub type BackendFactory = Arc<dyn Fn(&VantageConfig) -> Arc<dyn Backend> + Send + Sync>;

/// Map a client error raised during setup onto the entry outcome
pub fn setup_error(err: VantageError) -> SetupError {
    if err.is_auth() {
        SetupError::AuthFailed(err.to_string())
    } else if err.is_connection() {
        SetupError::NotReady(err.to_string())
    } else {
        SetupError::Failed(err.to_string())
    }
}

/// The Vantage integration
pub struct VantageIntegration {
    backend_factory: BackendFactory,
    runtimes: DashMap<String, Arc<VantageRuntime>>,
}

impl VantageIntegration {
    pub fn new(
        backend_factory: impl Fn(&VantageConfig) -> Arc<dyn Backend> + Send + Sync + 'static,
    ) -> Self {
        Self {
            backend_factory: Arc::new(backend_factory),
            runtimes: DashMap::new(),
        }
    }

    /// Runtime of a loaded entry
    pub fn runtime(&self, entry_id: &str) -> Option<Arc<VantageRuntime>> {
        self.runtimes.get(entry_id).map(|r| Arc::clone(r.value()))
    }
}

async fn setup_runtime(
    hass: &HomeAssistant,
    entry: &ConfigEntry,
    runtime: &VantageRuntime,
) -> VantageResult<()> {
    let client = &runtime.client;
    client.initialize().await?;

    let device_tasks = device::async_setup_devices(hass, &entry.entry_id, client).await?;
    runtime.track_all(device_tasks);

    runtime.track(events::async_setup_events(hass, client));

    for platform in PLATFORMS {
        match platform {
            Platform::BinarySensor => binary_sensor::async_setup_entry(runtime),
            Platform::Light => light::async_setup_entry(runtime),
            Platform::Number => number::async_setup_entry(runtime),
            Platform::Switch => switch::async_setup_entry(runtime),
        }
    }

    runtime.entities.cleanup_orphans();
    Ok(())
}

#[async_trait]
impl Integration for VantageIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup_entry(&self, hass: &HomeAssistant, entry: &ConfigEntry) -> Result<(), SetupError> {
        let config = VantageConfig::from_entry(entry)?;
        let client = Vantage::new((self.backend_factory)(&config));
        let runtime = Arc::new(VantageRuntime::new(hass.clone(), &entry.entry_id, client));

        if let Err(err) = setup_runtime(hass, entry, &runtime).await {
            warn!(host = %config.host, "Setting up Vantage controller failed: {}", err);
            runtime.shutdown();
            return Err(setup_error(err));
        }

        info!(
            host = %config.host,
            entities = runtime.entities.len(),
            "Vantage controller set up"
        );
        if let Some(previous) = self.runtimes.insert(entry.entry_id.clone(), runtime) {
            previous.shutdown();
        }
        Ok(())
    }

    async fn unload_entry(&self, _hass: &HomeAssistant, entry: &ConfigEntry) -> bool {
        if let Some((_, runtime)) = self.runtimes.remove(&entry.entry_id) {
            runtime.shutdown();
        }
        true
    }
}
