//! Lifecycle events with keep-alive
//!
//! Handlers register their asynchronous work with
//! [`ExtendableEvent::wait_until`]. The host settles the event, awaiting
//! every registered unit before the lifecycle step counts as complete.

use crate::error::SwResult;
use futures_util::future::{join_all, BoxFuture};
use std::fmt;
use std::future::Future;

/// Which lifecycle step an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Install,
    Activate,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Activate => write!(f, "activate"),
        }
    }
}

/// An install or activate event
pub struct ExtendableEvent {
    kind: LifecycleEvent,
    pending: Vec<BoxFuture<'static, SwResult<()>>>,
}

impl ExtendableEvent {
    pub fn new(kind: LifecycleEvent) -> Self {
        Self {
            kind,
            pending: vec![],
        }
    }

    pub fn kind(&self) -> LifecycleEvent {
        self.kind
    }

    /// Extend the event's lifetime until `work` settles
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = SwResult<()>> + Send + 'static,
    {
        self.pending.push(Box::pin(work));
    }

    /// Number of registered units of work
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Await every registered unit, then report the first failure
    pub async fn settle(self) -> SwResult<()> {
        join_all(self.pending).await.into_iter().collect()
    }
}
