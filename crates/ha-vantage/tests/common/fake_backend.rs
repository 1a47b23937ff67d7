//! In-memory controller connection

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;
use vantage_client::{
    AnyObject, Backend, Command, ObjectId, StatusChange, StatusUpdate, VantageError,
    VantageResult,
};

/// Backend serving a fixed object list and recording every command
pub struct FakeBackend {
    objects: Mutex<Vec<AnyObject>>,
    versions: Mutex<HashMap<ObjectId, String>>,
    commands: Mutex<Vec<Command>>,
    login_error: Mutex<Option<VantageError>>,
    fetch_error: Mutex<Option<VantageError>>,
    status: broadcast::Sender<StatusUpdate>,
    logins: AtomicUsize,
    closed: AtomicBool,
}

impl FakeBackend {
    pub fn new(objects: Vec<AnyObject>) -> Self {
        let (status, _) = broadcast::channel(64);
        Self {
            objects: Mutex::new(objects),
            versions: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            login_error: Mutex::new(None),
            fetch_error: Mutex::new(None),
            status,
            logins: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Report `version` as the firmware of master `id`
    pub fn with_version(self, id: ObjectId, version: &str) -> Self {
        self.versions.lock().unwrap().insert(id, version.to_string());
        self
    }

    /// Fail the next logins with `err` until cleared
    pub fn fail_login(&self, err: Option<VantageError>) {
        *self.login_error.lock().unwrap() = err;
    }

    /// Fail object enumeration with `err` until cleared
    pub fn fail_fetch(&self, err: Option<VantageError>) {
        *self.fetch_error.lock().unwrap() = err;
    }

    /// Replace the objects served by the next enumeration
    pub fn set_objects(&self, objects: Vec<AnyObject>) {
        *self.objects.lock().unwrap() = objects;
    }

    /// Push a status notification to the client
    pub fn push(&self, id: ObjectId, change: StatusChange) {
        let _ = self.status.send(StatusUpdate::new(id, change));
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn last_command(&self) -> Option<Command> {
        self.commands.lock().unwrap().last().cloned()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self) -> VantageResult<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        match self.login_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_objects(&self) -> VantageResult<Vec<AnyObject>> {
        if let Some(err) = self.fetch_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.objects.lock().unwrap().clone())
    }

    async fn send(&self, command: Command) -> VantageResult<()> {
        self.commands.lock().unwrap().push(command);
        Ok(())
    }

    async fn application_version(&self, master: ObjectId) -> VantageResult<Option<String>> {
        Ok(self.versions.lock().unwrap().get(&master).cloned())
    }

    fn subscribe_status(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status.subscribe()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
