//! Unregister command - drop the worker registration

use crate::cli::commands::require_host;
use crate::config::Config;
use crate::error::{SwError, SwResult};
use console::style;

/// Execute the unregister command
pub async fn execute(config: &Config) -> SwResult<()> {
    let host = require_host(config).await?;

    if !host.unregister().await? {
        return Err(SwError::NotRegistered);
    }

    println!(
        "{} Worker unregistered (caches kept; see `swcache caches list`)",
        style("✓").green()
    );
    Ok(())
}
