//! Per-entry runtime data

use std::sync::{Arc, Mutex};

use ha_config_entries::HomeAssistant;
use tokio::task::JoinHandle;
use tracing::debug;
use vantage_client::Vantage;

use crate::entity::EntityStore;

/// Everything a loaded config entry owns
///
/// Created once at setup; [`VantageRuntime::shutdown`] aborts every
/// subscription task and closes the client.
pub struct VantageRuntime {
    pub client: Arc<Vantage>,
    pub entities: Arc<EntityStore>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl VantageRuntime {
    pub fn new(hass: HomeAssistant, entry_id: &str, client: Arc<Vantage>) -> Self {
        Self {
            client,
            entities: Arc::new(EntityStore::new(hass, entry_id)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Keep a subscription task until shutdown
    pub fn track(&self, task: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
    }

    pub fn track_all(&self, tasks: impl IntoIterator<Item = JoinHandle<()>>) {
        for task in tasks {
            self.track(task);
        }
    }

    /// Number of live subscription tasks
    pub fn task_count(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }

    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            debug!(tasks = tasks.len(), "Stopping subscription tasks");
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        self.client.close();
    }
}
