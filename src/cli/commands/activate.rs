//! Activate command - promote the waiting worker version

use crate::cli::commands::require_host;
use crate::config::Config;
use crate::error::SwResult;
use console::style;

/// Execute the activate command
pub async fn execute(config: &Config) -> SwResult<()> {
    let host = require_host(config).await?;
    let registration = host.activate_waiting().await?;

    if let Some(active) = &registration.active {
        println!(
            "{} Version {} active with cache {}",
            style("✓").green(),
            active.short_hash(),
            style(&active.config.cache_name).cyan()
        );
    }

    Ok(())
}
