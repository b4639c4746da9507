//! Registration records and their persistence

use crate::error::{SwError, SwResult};
use crate::worker::script::{WorkerConfig, WorkerScript};
use crate::worker::state::WorkerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// One installed version of a worker script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerVersion {
    /// SHA-256 of the script bytes
    pub script_hash: String,

    /// Configuration parsed from the script
    pub config: WorkerConfig,

    pub state: WorkerState,

    pub installed_at: DateTime<Utc>,
}

impl WorkerVersion {
    /// A freshly parsed version, not yet installed
    pub fn from_script(script: &WorkerScript) -> Self {
        Self {
            script_hash: script.hash.clone(),
            config: script.config.clone(),
            state: WorkerState::Parsed,
            installed_at: Utc::now(),
        }
    }

    pub fn short_hash(&self) -> &str {
        &self.script_hash[..self.script_hash.len().min(12)]
    }
}

/// A worker registration for one scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,

    /// URL path prefix the worker controls
    pub scope: String,

    /// Path of the registered script
    pub script_url: String,

    /// Version currently serving requests
    pub active: Option<WorkerVersion>,

    /// Installed version waiting for the active one to be released
    pub waiting: Option<WorkerVersion>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn new(scope: &str, script_url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            scope: scope.to_string(),
            script_url: script_url.to_string(),
            active: None,
            waiting: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a script with this hash is already active or waiting
    pub fn has_version(&self, script_hash: &str) -> bool {
        [&self.active, &self.waiting]
            .into_iter()
            .flatten()
            .any(|v| v.script_hash == script_hash)
    }

    /// Record a change
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Where the host keeps its registration
///
/// `Memory` keeps it for the life of the process only.
#[derive(Debug, Clone)]
pub enum RegistrationStore {
    File(PathBuf),
    Memory,
}

impl RegistrationStore {
    pub async fn load(&self) -> SwResult<Option<Registration>> {
        let path = match self {
            Self::File(path) => path,
            Self::Memory => return Ok(None),
        };

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            SwError::io(format!("reading registration {}", path.display()), e)
        })?;

        let registration: Registration = serde_json::from_str(&content)?;
        Ok(Some(registration))
    }

    pub async fn save(&self, registration: &Registration) -> SwResult<()> {
        let Self::File(path) = self else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SwError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(registration)?;
        fs::write(path, content).await.map_err(|e| {
            SwError::io(format!("writing registration {}", path.display()), e)
        })
    }

    pub async fn remove(&self) -> SwResult<()> {
        if let Self::File(path) = self {
            if path.exists() {
                fs::remove_file(path).await.map_err(|e| {
                    SwError::io(format!("deleting registration {}", path.display()), e)
                })?;
            }
        }
        Ok(())
    }
}
