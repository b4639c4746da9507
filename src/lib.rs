//! swcache - service-worker style request cache
//!
//! Registers worker scripts against an origin, caches their assets in
//! versioned namespaces on install, answers requests cache-first, and
//! prunes stale namespaces on activate.

pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod registrar;
pub mod store;
pub mod worker;

pub use error::{SwError, SwResult};
