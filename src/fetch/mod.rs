//! Network access for the worker
//!
//! Everything the worker does not find in its caches goes through a
//! [`Fetcher`]:
//! - `http(s)://` origins: blocking `ureq` agent on the tokio blocking pool
//! - local site roots: files served from a directory

mod directory;
mod http;

pub use directory::DirectoryFetcher;
pub use http::HttpFetcher;

use crate::config::Config;
use crate::error::SwResult;
use crate::http::{Origin, Request, Response};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Abstract network interface
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform one network request
    ///
    /// Non-2xx statuses are returned as responses, not errors; only
    /// transport failures are errors.
    async fn fetch(&self, request: &Request) -> SwResult<Response>;

    /// Human-readable description for diagnostics
    fn describe(&self) -> String;
}

/// Create the fetcher configured for the origin
pub fn create_fetcher(config: &Config) -> SwResult<Arc<dyn Fetcher>> {
    let origin = Origin::parse(&config.origin.url)?;

    match &config.origin.root {
        Some(root) => Ok(Arc::new(DirectoryFetcher::new(root.clone()))),
        None => {
            let timeout = match config.fetch.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
            Ok(Arc::new(HttpFetcher::new(origin, timeout)))
        }
    }
}
