//! Worker lifecycle: scripts, cache manager, host

pub mod event;
pub mod host;
pub mod manager;
pub mod registration;
pub mod script;
pub mod state;

pub use event::{ExtendableEvent, LifecycleEvent};
pub use host::WorkerHost;
pub use manager::{CacheManager, ServiceWorker};
pub use registration::{Registration, RegistrationStore, WorkerVersion};
pub use script::{FetchStrategy, WorkerConfig, WorkerScript};
pub use state::WorkerState;
