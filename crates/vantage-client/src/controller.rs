//! Per-category object stores
//!
//! A [`Controller`] holds the current snapshot of every object of one
//! category and broadcasts an [`ObjectEvent`] whenever an object is added,
//! changed or removed. Subscribers pick the events they care about with an
//! [`EventFilter`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::backend::{Backend, Command};
use crate::error::{VantageError, VantageResult};
use crate::objects::{GMem, GMemValue, LevelObject, Master, ObjectId, RgbLoad, SystemObject};

/// Default capacity for object event channels
const CHANNEL_CAPACITY: usize = 256;

/// Kind of change an [`ObjectEvent`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ObjectAdded,
    ObjectUpdated,
    ObjectDeleted,
}

/// Notification about one object
#[derive(Debug, Clone)]
pub struct ObjectEvent<T> {
    pub kind: EventKind,
    /// Snapshot after the change (before removal for deletes)
    pub object: T,
    /// Attributes that changed; empty for adds, deletes and configuration changes
    pub attrs_changed: Vec<&'static str>,
}

/// Which events a [`Subscription`] delivers
///
/// Empty kind and id lists match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    kinds: Vec<EventKind>,
    ids: Vec<ObjectId>,
}

impl EventFilter {
    /// Match every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Also accept events of `kind`
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Also accept events about object `id`
    pub fn id(mut self, id: ObjectId) -> Self {
        self.ids.push(id);
        self
    }

    pub fn matches(&self, kind: EventKind, id: ObjectId) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&kind))
            && (self.ids.is_empty() || self.ids.contains(&id))
    }
}

/// Filtered receiver for a controller's events
pub struct Subscription<T> {
    receiver: broadcast::Receiver<ObjectEvent<T>>,
    filter: EventFilter,
}

impl<T: SystemObject> Subscription<T> {
    /// Wait for the next matching event
    ///
    /// Returns `None` once the controller is gone.
    pub async fn recv(&mut self) -> Option<ObjectEvent<T>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(event.kind, event.object.id()) => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Object subscriber lagged, missed {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued
    pub fn try_recv(&mut self) -> Option<ObjectEvent<T>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(event.kind, event.object.id()) => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Object subscriber lagged, missed {} events", n);
                }
                Err(_) => return None,
            }
        }
    }
}

/// Store and command surface for one object category
pub struct Controller<T> {
    objects: DashMap<ObjectId, T>,
    sender: broadcast::Sender<ObjectEvent<T>>,
    backend: Arc<dyn Backend>,
}

impl<T: SystemObject> Controller<T> {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            objects: DashMap::new(),
            sender,
            backend,
        }
    }

    /// Snapshot of one object
    pub fn get(&self, id: ObjectId) -> Option<T> {
        self.objects.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Every object, ordered by id
    pub fn all(&self) -> Vec<T> {
        let mut objects: Vec<T> = self.objects.iter().map(|r| r.value().clone()).collect();
        objects.sort_by_key(|o| o.id());
        objects
    }

    /// Objects passing `predicate`, ordered by id
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.all().into_iter().filter(|o| predicate(o)).collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Receive events matching `filter`
    pub fn subscribe(&self, filter: EventFilter) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    fn emit(&self, kind: EventKind, object: T, attrs_changed: Vec<&'static str>) {
        // No receivers is fine
        let _ = self.sender.send(ObjectEvent {
            kind,
            object,
            attrs_changed,
        });
    }

    /// Insert or replace an object
    ///
    /// A replacement keeps the stored object's live status wherever the new
    /// snapshot has none. Emits `ObjectAdded` for new ids and
    /// `ObjectUpdated` when an existing object differs. Returns the emitted
    /// kind, if any.
    pub fn add(&self, mut object: T) -> Option<EventKind> {
        let id = object.id();
        if let Some(previous) = self.get(id) {
            object.carry_status(&previous);
        }
        let previous = self.objects.insert(id, object.clone());
        let kind = match previous {
            None => EventKind::ObjectAdded,
            Some(ref old) if *old == object => return None,
            Some(_) => EventKind::ObjectUpdated,
        };
        debug!(id, ?kind, "Object stored");
        self.emit(kind, object, Vec::new());
        Some(kind)
    }

    /// Mutate an object in place and announce `attrs` as changed
    ///
    /// Returns false when the id is unknown. No event is emitted if `f`
    /// leaves the object unchanged.
    pub fn update_with(&self, id: ObjectId, attrs: &[&'static str], f: impl FnOnce(&mut T)) -> bool {
        let updated = {
            let Some(mut entry) = self.objects.get_mut(&id) else {
                return false;
            };
            let before = entry.value().clone();
            f(entry.value_mut());
            (*entry.value() != before).then(|| entry.value().clone())
        };
        if let Some(object) = updated {
            self.emit(EventKind::ObjectUpdated, object, attrs.to_vec());
        }
        true
    }

    /// Remove an object, emitting `ObjectDeleted`
    pub fn remove(&self, id: ObjectId) -> Option<T> {
        let (_, object) = self.objects.remove(&id)?;
        debug!(id, "Object removed");
        self.emit(EventKind::ObjectDeleted, object.clone(), Vec::new());
        Some(object)
    }

    async fn send(&self, command: Command) -> VantageResult<()> {
        let id = command.id();
        if !self.contains(id) {
            return Err(VantageError::NotFound(id));
        }
        debug!(?command, "Sending command");
        self.backend.send(command).await
    }
}

impl<T: LevelObject> Controller<T> {
    /// Ramp to `level` percent over `transition` seconds
    pub async fn turn_on(&self, id: ObjectId, transition: f64, level: f64) -> VantageResult<()> {
        self.send(Command::Ramp {
            id,
            level: level.clamp(0.0, 100.0),
            transition: transition.max(0.0),
        })
        .await
    }

    pub async fn turn_off(&self, id: ObjectId, transition: f64) -> VantageResult<()> {
        self.send(Command::Ramp {
            id,
            level: 0.0,
            transition: transition.max(0.0),
        })
        .await
    }
}

impl Controller<RgbLoad> {
    pub async fn set_rgbw(&self, id: ObjectId, rgbw: [u8; 4]) -> VantageResult<()> {
        self.send(Command::SetRgbw { id, rgbw }).await
    }

    pub async fn dissolve_rgb(&self, id: ObjectId, rgb: [u8; 3], transition: f64) -> VantageResult<()> {
        self.send(Command::DissolveRgb { id, rgb, transition }).await
    }

    pub async fn dissolve_hsl(
        &self,
        id: ObjectId,
        hue: f64,
        saturation: f64,
        level: f64,
        transition: f64,
    ) -> VantageResult<()> {
        self.send(Command::DissolveHsl {
            id,
            hue,
            saturation,
            level,
            transition,
        })
        .await
    }

    pub async fn set_color_temp(&self, id: ObjectId, kelvin: u32) -> VantageResult<()> {
        self.send(Command::SetColorTemp { id, kelvin }).await
    }
}

impl Controller<Master> {
    /// Firmware version reported by a master
    pub async fn application_version(&self, id: ObjectId) -> VantageResult<Option<String>> {
        if !self.contains(id) {
            return Err(VantageError::NotFound(id));
        }
        self.backend.application_version(id).await
    }
}

impl Controller<GMem> {
    pub async fn set_value(&self, id: ObjectId, value: GMemValue) -> VantageResult<()> {
        self.send(Command::SetVariable { id, value }).await
    }
}
