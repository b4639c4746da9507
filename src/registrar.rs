//! Registrar: one-shot worker registration on startup
//!
//! Checks whether the host can run workers at all, then asks it to
//! register a script. Both outcomes are reported through logging only;
//! failures are not retried.

use crate::worker::{Registration, WorkerHost};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a registration attempt
#[derive(Debug)]
pub enum RegistrationOutcome {
    /// The environment has no worker support
    Unsupported,
    Registered(Registration),
    Failed(String),
}

/// Registers worker scripts with a host, if there is one
pub struct Registrar {
    host: Option<Arc<WorkerHost>>,
}

impl Registrar {
    pub fn new(host: Option<Arc<WorkerHost>>) -> Self {
        Self { host }
    }

    /// Whether worker registration is available
    pub fn is_supported(&self) -> bool {
        self.host.is_some()
    }

    /// Register `script_url`, optionally narrowing the scope
    pub async fn register(&self, script_url: &str, scope: Option<&str>) -> RegistrationOutcome {
        let Some(host) = &self.host else {
            info!("Service workers are not supported in this environment");
            return RegistrationOutcome::Unsupported;
        };

        match host.register(script_url, scope).await {
            Ok(registration) => {
                info!(
                    "Service worker registration successful with scope: {}",
                    registration.scope
                );
                RegistrationOutcome::Registered(registration)
            }
            Err(e) => {
                warn!("Service worker registration failed: {}", e);
                RegistrationOutcome::Failed(e.to_string())
            }
        }
    }
}
