use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use med_domain::Medication;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PushError, Result};
use crate::subscription::RegistrationPayload;

const STORE_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSubscription {
    #[serde(flatten)]
    pub payload: RegistrationPayload,
    /// False until the server has acknowledged this subscription.
    #[serde(default)]
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSnapshot {
    #[serde(default = "default_store_version")]
    pub version: u8,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub subscription: Option<StoredSubscription>,
}

fn default_store_version() -> u8 {
    STORE_VERSION
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            medications: Vec::new(),
            subscription: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentStore {
    path: PathBuf,
    writer: Arc<Mutex<()>>,
}

impl AgentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<StoreSnapshot> {
        if !self.path.exists() {
            return Ok(StoreSnapshot::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|err| {
            PushError::Store(format!("{} is not a valid store: {err}", self.path.display()))
        })
    }

    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|err| PushError::Store(err.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "agent store saved");
        Ok(())
    }

    /// Clones share one writer lock, so the schedule and the subscription
    /// can be updated from different tasks without losing either.
    pub fn update(&self, apply: impl FnOnce(&mut StoreSnapshot)) -> Result<StoreSnapshot> {
        let _guard = self.writer.lock();
        let mut snapshot = self.load()?;
        apply(&mut snapshot);
        self.save(&snapshot)?;
        Ok(snapshot)
    }
}
