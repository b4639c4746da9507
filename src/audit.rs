//! Audit trail of worker lifecycle events
//!
//! Each [`AuditEvent`] becomes one JSON line in `<storage dir>/audit.log`:
//!
//! ```text
//! {"event":"worker.activated","data":{...},"timestamp":"2026-..."}
//! ```

use crate::config::{schema::Config, ConfigManager};
use crate::error::{SwError, SwResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Who removed a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletedBy {
    /// Pruned by an activating worker
    Activate,
    /// Removed with `swcache caches delete`
    User,
}

/// A recorded lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum AuditEvent {
    #[serde(rename = "worker.registered")]
    WorkerRegistered {
        id: Uuid,
        scope: String,
        script_url: String,
    },

    #[serde(rename = "worker.installed")]
    WorkerInstalled {
        script_hash: String,
        cache_name: String,
    },

    #[serde(rename = "worker.install_failed")]
    InstallFailed {
        script_hash: String,
        cache_name: String,
        reason: String,
    },

    #[serde(rename = "worker.activated")]
    WorkerActivated {
        scope: String,
        script_hash: String,
        cache_name: String,
    },

    #[serde(rename = "worker.unregistered")]
    WorkerUnregistered { id: Uuid, scope: String },

    #[serde(rename = "cache.deleted")]
    CacheDeleted {
        cache_name: String,
        deleted_by: DeletedBy,
    },
}

impl AuditEvent {
    /// Serialize as a timestamped JSON line
    fn to_line(&self) -> SwResult<String> {
        let mut record = serde_json::to_value(self)?;
        let object = record
            .as_object_mut()
            .ok_or_else(|| SwError::Internal("audit event is not an object".to_string()))?;
        object.insert(
            "timestamp".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        Ok(line)
    }
}

/// Appends lifecycle events to the audit file
///
/// Recording never fails the caller; write errors are logged.
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Audit log under the storage directory, if enabled in config
    pub fn new(config: &Config) -> Self {
        if !config.general.audit_log {
            return Self::disabled();
        }
        Self::to_file(ConfigManager::storage_dir(config).join("audit.log"))
    }

    /// Audit log writing to `path`
    pub fn to_file(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// An audit log that records nothing
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub async fn record(&self, event: AuditEvent) {
        let Some(path) = &self.path else {
            return;
        };

        let result = match event.to_line() {
            Ok(line) => append(path, &line).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!("Audited {:?}", event),
            Err(e) => warn!("Failed to record audit event: {}", e),
        }
    }

    /// Events recorded so far, oldest first
    #[cfg(test)]
    pub(crate) async fn events(&self) -> Vec<AuditEvent> {
        let Some(path) = &self.path else {
            return vec![];
        };
        let Ok(content) = fs::read_to_string(path).await else {
            return vec![];
        };
        content
            .lines()
            .map(|line| {
                let mut value: serde_json::Value = serde_json::from_str(line).unwrap();
                assert!(value["timestamp"].is_string());
                value.as_object_mut().unwrap().remove("timestamp");
                serde_json::from_value(value).unwrap()
            })
            .collect()
    }
}

async fn append(path: &Path, line: &str) -> SwResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SwError::io(format!("creating {}", parent.display()), e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| SwError::io(format!("opening {}", path.display()), e))?;
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| SwError::io(format!("appending to {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn activated() -> AuditEvent {
        AuditEvent::WorkerActivated {
            scope: "/".to_string(),
            script_hash: "abc".to_string(),
            cache_name: "pages-cache-v1".to_string(),
        }
    }

    #[tokio::test]
    async fn line_carries_event_name_and_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("audit.log");
        AuditLog::to_file(path.clone()).record(activated()).await;

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed["event"], "worker.activated");
        assert_eq!(parsed["data"]["cache_name"], "pages-cache-v1");
    }

    #[tokio::test]
    async fn events_read_back_in_order() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::to_file(dir.path().join("audit.log"));
        let deleted = AuditEvent::CacheDeleted {
            cache_name: "pages-cache-v0".to_string(),
            deleted_by: DeletedBy::Activate,
        };

        audit.record(deleted.clone()).await;
        audit.record(activated()).await;

        assert_eq!(audit.events().await, vec![deleted, activated()]);
    }

    #[tokio::test]
    async fn config_switch_disables_recording() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.dir = Some(dir.path().to_path_buf());
        config.general.audit_log = false;

        AuditLog::new(&config).record(activated()).await;
        assert!(!dir.path().join("audit.log").exists());

        config.general.audit_log = true;
        AuditLog::new(&config).record(activated()).await;
        assert!(dir.path().join("audit.log").exists());
    }
}
