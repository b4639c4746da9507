//! CLI command implementations

pub mod activate;
pub mod caches;
pub mod config;
pub mod fetch;
pub mod register;
pub mod status;
pub mod unregister;

pub use activate::execute as activate;
pub use caches::execute as caches;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use register::execute as register;
pub use status::execute as status;
pub use unregister::execute as unregister;

use crate::config::Config;
use crate::error::{SwError, SwResult};
use crate::worker::WorkerHost;

/// Build the worker host, failing if workers are unsupported
pub(crate) async fn require_host(config: &Config) -> SwResult<WorkerHost> {
    WorkerHost::from_config(config)
        .await?
        .ok_or(SwError::Unsupported)
}
