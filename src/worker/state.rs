//! Worker version lifecycle
//!
//! ```text
//! parsed -> installing -> installed -> activating -> activated -> redundant
//!                 \             \
//!                  -> redundant  -> redundant
//! ```
//!
//! Waiting is `installed` while another version is active.

use crate::error::{SwError, SwResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Worker version state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    /// Whether `next` is a legal successor
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Installed, Redundant)
                | (Activating, Activated)
                | (Activated, Redundant)
        )
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: WorkerState) -> SwResult<()> {
        if !self.can_transition_to(next) {
            return Err(SwError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}
