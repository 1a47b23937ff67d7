//! The Vantage client

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::backend::{Backend, StatusChange, StatusUpdate};
use crate::controller::Controller;
use crate::error::VantageResult;
use crate::objects::{
    AnyObject, Area, BackBox, Button, DryContact, GMem, LoadGroup, Load, Master, Module,
    ObjectId, PortDevice, PowerProfile, RgbLoad, Station, SystemObject,
};

/// Mirror of one Vantage system
///
/// After [`Vantage::initialize`] every controller holds the configured
/// objects, and a background task applies status notifications from the
/// backend so that snapshots stay current.
pub struct Vantage {
    backend: Arc<dyn Backend>,
    pub masters: Controller<Master>,
    pub modules: Controller<Module>,
    pub port_devices: Controller<PortDevice>,
    pub stations: Controller<Station>,
    pub back_boxes: Controller<BackBox>,
    pub areas: Controller<Area>,
    pub power_profiles: Controller<PowerProfile>,
    pub loads: Controller<Load>,
    pub rgb_loads: Controller<RgbLoad>,
    pub load_groups: Controller<LoadGroup>,
    pub gmem: Controller<GMem>,
    pub dry_contacts: Controller<DryContact>,
    pub buttons: Controller<Button>,
    status_task: Mutex<Option<JoinHandle<()>>>,
}

impl Vantage {
    pub fn new(backend: Arc<dyn Backend>) -> Arc<Self> {
        fn controller<T: SystemObject>(backend: &Arc<dyn Backend>) -> Controller<T> {
            Controller::new(Arc::clone(backend))
        }

        Arc::new(Self {
            masters: controller(&backend),
            modules: controller(&backend),
            port_devices: controller(&backend),
            stations: controller(&backend),
            back_boxes: controller(&backend),
            areas: controller(&backend),
            power_profiles: controller(&backend),
            loads: controller(&backend),
            rgb_loads: controller(&backend),
            load_groups: controller(&backend),
            gmem: controller(&backend),
            dry_contacts: controller(&backend),
            buttons: controller(&backend),
            status_task: Mutex::new(None),
            backend,
        })
    }

    /// Log in, enumerate every object and start following status updates
    ///
    /// Must run inside a tokio runtime.
    pub async fn initialize(self: &Arc<Self>) -> VantageResult<()> {
        self.backend.login().await?;

        // Subscribe before enumerating so nothing in between is lost
        let mut status = self.backend.subscribe_status();
        let objects = self.backend.fetch_objects().await?;
        let count = objects.len();
        for object in objects {
            self.store(object);
        }

        let client = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match status.recv().await {
                    Ok(update) => match client.upgrade() {
                        Some(client) => client.apply(update),
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Status listener lagged, missed {} updates", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Status listener stopped");
        });
        if let Ok(mut slot) = self.status_task.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }

        info!(objects = count, "Vantage client initialized");
        Ok(())
    }

    /// Insert or replace an object in its controller
    pub fn store(&self, object: AnyObject) {
        match object {
            AnyObject::Master(o) => self.masters.add(o),
            AnyObject::Module(o) => self.modules.add(o),
            AnyObject::PortDevice(o) => self.port_devices.add(o),
            AnyObject::Station(o) => self.stations.add(o),
            AnyObject::BackBox(o) => self.back_boxes.add(o),
            AnyObject::Area(o) => self.areas.add(o),
            AnyObject::PowerProfile(o) => self.power_profiles.add(o),
            AnyObject::Load(o) => self.loads.add(o),
            AnyObject::RgbLoad(o) => self.rgb_loads.add(o),
            AnyObject::LoadGroup(o) => self.load_groups.add(o),
            AnyObject::GMem(o) => self.gmem.add(o),
            AnyObject::DryContact(o) => self.dry_contacts.add(o),
            AnyObject::Button(o) => self.buttons.add(o),
        };
    }

    /// Apply one status notification to the matching object
    pub fn apply(&self, update: StatusUpdate) {
        let id = update.id;
        let handled = match update.change {
            StatusChange::Level(level) => {
                self.loads.update_with(id, &["level"], |o| o.level = Some(level))
                    || self.rgb_loads.update_with(id, &["level"], |o| o.level = Some(level))
                    || self.load_groups.update_with(id, &["level"], |o| o.level = Some(level))
            }
            StatusChange::Hsl(h, s, l) => {
                self.rgb_loads.update_with(id, &["hsl"], |o| o.hsl = Some((h, s, l)))
            }
            StatusChange::Rgb(rgb) => self.rgb_loads.update_with(id, &["rgb"], |o| o.rgb = Some(rgb)),
            StatusChange::Rgbw(rgbw) => {
                self.rgb_loads.update_with(id, &["rgbw"], |o| o.rgbw = Some(rgbw))
            }
            StatusChange::ColorTemp(kelvin) => {
                self.rgb_loads.update_with(id, &["color_temp"], |o| o.color_temp = Some(kelvin))
            }
            StatusChange::Variable(value) => {
                self.gmem.update_with(id, &["value"], |o| o.value = Some(value))
            }
            StatusChange::Triggered(triggered) => self
                .dry_contacts
                .update_with(id, &["triggered"], |o| o.triggered = Some(triggered)),
            StatusChange::Pressed(pressed) => {
                self.buttons.update_with(id, &["pressed"], |o| o.pressed = Some(pressed))
            }
            StatusChange::Object(object) => {
                self.store(object);
                true
            }
            StatusChange::Deleted => self.remove(id),
        };

        if !handled {
            trace!(id, "Ignoring status for unknown object");
        }
    }

    /// Remove an object from whichever controller holds it
    pub fn remove(&self, id: ObjectId) -> bool {
        self.masters.remove(id).is_some()
            || self.modules.remove(id).is_some()
            || self.port_devices.remove(id).is_some()
            || self.stations.remove(id).is_some()
            || self.back_boxes.remove(id).is_some()
            || self.areas.remove(id).is_some()
            || self.power_profiles.remove(id).is_some()
            || self.loads.remove(id).is_some()
            || self.rgb_loads.remove(id).is_some()
            || self.load_groups.remove(id).is_some()
            || self.gmem.remove(id).is_some()
            || self.dry_contacts.remove(id).is_some()
            || self.buttons.remove(id).is_some()
    }

    /// Whether any controller holds an object with this id
    pub fn contains(&self, id: ObjectId) -> bool {
        self.masters.contains(id)
            || self.modules.contains(id)
            || self.port_devices.contains(id)
            || self.stations.contains(id)
            || self.back_boxes.contains(id)
            || self.areas.contains(id)
            || self.power_profiles.contains(id)
            || self.loads.contains(id)
            || self.rgb_loads.contains(id)
            || self.load_groups.contains(id)
            || self.gmem.contains(id)
            || self.dry_contacts.contains(id)
            || self.buttons.contains(id)
    }

    /// Stop following status updates and close the backend
    pub fn close(&self) {
        if let Ok(mut slot) = self.status_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        self.backend.close();
        debug!("Vantage client closed");
    }
}

impl Drop for Vantage {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.status_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}
