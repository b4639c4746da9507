//! Error types for swcache
//!
//! All modules use `SwResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for swcache operations
pub type SwResult<T> = Result<T, SwError>;

/// All errors that can occur in swcache
#[derive(Error, Debug)]
pub enum SwError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid worker script {url}: {reason}")]
    ScriptInvalid { url: String, reason: String },

    // Registration errors
    #[error("Service workers are not supported by the configured storage backend")]
    Unsupported,

    #[error("Scope {scope} is outside the maximum scope {max_scope} of the worker script")]
    ScopeNotAllowed { scope: String, max_scope: String },

    #[error("No registration found")]
    NotRegistered,

    #[error("No waiting worker to activate")]
    NothingWaiting,

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Network errors
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Network request failed for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Request for {url} returned bad status {status}")]
    BadStatus { url: String, status: u16 },

    // Lifecycle errors
    #[error("Install of {cache_name} failed: {reason}")]
    InstallFailed { cache_name: String, reason: String },

    #[error("Activate could not delete cache(s): {}", failed.join(", "))]
    ActivateIncomplete { failed: Vec<String> },

    #[error("Background task failed: {0}")]
    TaskJoin(String),

    // Cache store errors
    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    #[error("Corrupt cache index {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl SwError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the network rather than local state
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::BadStatus { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Unsupported => Some("Set storage.backend to \"disk\" or \"memory\""),
            Self::NotRegistered => Some("Run: swcache register <script>"),
            Self::NothingWaiting => Some("Change the worker script and run: swcache register"),
            Self::ScopeNotAllowed { .. } => {
                Some("Move the worker script up the path hierarchy or narrow --scope")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SwError::InstallFailed {
            cache_name: "pages-cache-v1".to_string(),
            reason: "boom".to_string(),
        };
        assert!(err.to_string().contains("pages-cache-v1"));
    }

    #[test]
    fn activate_incomplete_lists_caches() {
        let err = SwError::ActivateIncomplete {
            failed: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Activate could not delete cache(s): a, b");
    }

    #[test]
    fn error_hint() {
        assert_eq!(
            SwError::NotRegistered.hint(),
            Some("Run: swcache register <script>")
        );
        assert!(SwError::Internal("x".to_string()).hint().is_none());
    }

    #[test]
    fn network_classification() {
        assert!(SwError::network("/a", "refused").is_network());
        assert!(SwError::BadStatus {
            url: "/a".to_string(),
            status: 404
        }
        .is_network());
        assert!(!SwError::NotRegistered.is_network());
    }
}
