//! Worker scripts
//!
//! A worker script is a TOML document served by the origin:
//!
//! ```toml
//! cache_name = "pages-cache-v1"
//! urls_to_cache = ["/app/", "/app/style.css"]
//! cache_whitelist = ["pages-cache-v1"]
//! strategy = "cache-first"
//! ```
//!
//! Any byte change to the script makes it a new worker version.

use crate::error::{SwError, SwResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// How the worker answers requests it intercepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStrategy {
    /// Serve from cache, fall back to the network, never write back
    #[default]
    CacheFirst,
    /// As `CacheFirst`, but store successful same-origin network responses
    CacheFirstWriteBack,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheFirst => write!(f, "cache-first"),
            Self::CacheFirstWriteBack => write!(f, "cache-first-write-back"),
        }
    }
}

/// Immutable worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Versioned name of the cache this worker populates
    pub cache_name: String,

    /// Assets cached on install, in order
    #[serde(default)]
    pub urls_to_cache: Vec<String>,

    /// Caches kept on activate; defaults to `[cache_name]`
    #[serde(default)]
    pub cache_whitelist: Vec<String>,

    #[serde(default)]
    pub strategy: FetchStrategy,
}

impl WorkerConfig {
    /// Create a cache-first configuration
    pub fn new(cache_name: &str, urls_to_cache: &[&str]) -> Self {
        Self {
            cache_name: cache_name.to_string(),
            urls_to_cache: urls_to_cache.iter().map(|u| u.to_string()).collect(),
            cache_whitelist: vec![],
            strategy: FetchStrategy::CacheFirst,
        }
    }

    /// Replace the whitelist
    pub fn with_whitelist(mut self, whitelist: &[&str]) -> Self {
        self.cache_whitelist = whitelist.iter().map(|w| w.to_string()).collect();
        self
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Caches considered current during activate
    pub fn whitelist(&self) -> Vec<String> {
        if self.cache_whitelist.is_empty() {
            vec![self.cache_name.clone()]
        } else {
            self.cache_whitelist.clone()
        }
    }
}

/// A fetched, parsed worker script
#[derive(Debug, Clone)]
pub struct WorkerScript {
    pub url: String,
    /// SHA-256 of the script bytes
    pub hash: String,
    pub config: WorkerConfig,
}

impl WorkerScript {
    /// Parse script bytes fetched from `url`
    pub fn parse(url: &str, bytes: &[u8]) -> SwResult<Self> {
        let invalid = |reason: String| SwError::ScriptInvalid {
            url: url.to_string(),
            reason,
        };

        let text = std::str::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
        let config: WorkerConfig = toml::from_str(text).map_err(|e| invalid(e.to_string()))?;

        if config.cache_name.trim().is_empty() {
            return Err(invalid("cache_name must not be empty".to_string()));
        }

        Ok(Self {
            url: url.to_string(),
            hash: hex::encode(Sha256::digest(bytes)),
            config,
        })
    }

    /// First 12 hex digits of the hash, for display
    pub fn short_hash(&self) -> &str {
        &self.hash[..12]
    }
}
