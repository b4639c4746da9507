//! swcache - service-worker style request cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use swcache::cli::{commands, Cli, Commands};
use swcache::config::{ConfigManager, StorageBackend};
use swcache::error::SwResult;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SwResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("swcache=warn"),
        1 => EnvFilter::new("swcache=info"),
        _ => EnvFilter::new("swcache=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!("Loaded config from {}", config_manager.path().display());

    // Config commands must work without a state directory
    if let Commands::Config(args) = cli.command {
        return commands::config(args, &config, &config_manager).await;
    }

    if config.storage.backend == StorageBackend::Disk {
        ConfigManager::ensure_state_dirs(&config).await?;
    }

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Register(args) => commands::register(args, &config).await,
        Commands::Unregister => commands::unregister(&config).await,
        Commands::Activate => commands::activate(&config).await,
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Status => commands::status(&config).await,
        Commands::Caches(args) => commands::caches(args, &config).await,
    }
}
