//! Configuration schema for swcache
//!
//! Configuration is stored at `~/.config/swcache/config.toml`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Where worker scripts and uncached requests are fetched from
    pub origin: OriginConfig,

    /// Cache store settings
    pub storage: StorageConfig,

    /// Network fetch settings
    pub fetch: FetchConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging of lifecycle events
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the origin (scheme + host + optional port)
    pub url: String,

    /// Serve the origin from a local directory instead of over HTTP
    pub root: Option<PathBuf>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            root: None,
        }
    }
}

/// Cache store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Persistent store under the state directory
    Disk,
    /// Process-local store, lost on exit
    Memory,
    /// No cache storage; service workers are unsupported
    None,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk => write!(f, "disk"),
            Self::Memory => write!(f, "memory"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use
    pub backend: StorageBackend,

    /// Override the directory used by the disk backend
    pub dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Disk,
            dir: None,
        }
    }
}

/// Network fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Overall timeout per request in seconds (0 = no timeout)
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}
