//! Register command - register and install a worker script

use crate::cli::args::RegisterArgs;
use crate::config::Config;
use crate::error::SwResult;
use crate::registrar::{Registrar, RegistrationOutcome};
use crate::worker::WorkerHost;
use console::style;
use std::sync::Arc;

/// Execute the register command
///
/// Registration failures are reported, not returned as errors.
pub async fn execute(args: RegisterArgs, config: &Config) -> SwResult<()> {
    let host = WorkerHost::from_config(config).await?.map(Arc::new);
    let registrar = Registrar::new(host);

    match registrar.register(&args.script, args.scope.as_deref()).await {
        RegistrationOutcome::Unsupported => {
            println!(
                "{} Service workers are not supported (storage backend is {})",
                style("!").yellow(),
                config.storage.backend
            );
        }
        RegistrationOutcome::Registered(registration) => {
            println!(
                "{} Registered {} with scope {}",
                style("✓").green(),
                style(&registration.script_url).cyan(),
                style(&registration.scope).cyan()
            );
            if let Some(active) = &registration.active {
                println!(
                    "  active:  {} ({}, cache {})",
                    active.short_hash(),
                    active.state,
                    active.config.cache_name
                );
            }
            if let Some(waiting) = &registration.waiting {
                println!(
                    "  waiting: {} (cache {}) - run `swcache activate` to take over",
                    waiting.short_hash(),
                    waiting.config.cache_name
                );
            }
        }
        RegistrationOutcome::Failed(reason) => {
            eprintln!(
                "{} Service worker registration failed: {}",
                style("✗").red(),
                reason
            );
        }
    }

    Ok(())
}
