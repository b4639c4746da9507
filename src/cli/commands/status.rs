//! Status command - show the registration and worker versions

use crate::config::{Config, ConfigManager};
use crate::error::SwResult;
use crate::worker::{WorkerHost, WorkerVersion};
use console::style;

/// Execute the status command
pub async fn execute(config: &Config) -> SwResult<()> {
    println!("{}", style("swcache status").bold());
    println!();
    println!("  origin:  {}", config.origin.url);
    if let Some(root) = &config.origin.root {
        println!("  root:    {}", root.display());
    }
    println!("  storage: {}", config.storage.backend);

    let Some(host) = WorkerHost::from_config(config).await? else {
        println!();
        println!(
            "{} Service workers unsupported with storage backend `{}`",
            style("!").yellow(),
            config.storage.backend
        );
        return Ok(());
    };
    println!(
        "  dir:     {}",
        ConfigManager::storage_dir(config).display()
    );
    println!();

    let Some(registration) = host.registration().await else {
        println!("{} No worker registered", style("-").dim());
        return Ok(());
    };

    println!("{}", style("Registration").bold());
    println!("  id:      {}", registration.id);
    println!("  scope:   {}", style(&registration.scope).cyan());
    println!("  script:  {}", registration.script_url);
    println!(
        "  updated: {}",
        registration.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!();

    print_version("Active", registration.active.as_ref());
    print_version("Waiting", registration.waiting.as_ref());

    Ok(())
}

fn print_version(label: &str, version: Option<&WorkerVersion>) {
    match version {
        Some(v) => {
            println!(
                "  {} {:<8} {} {} ({}, {})",
                style("✓").green(),
                label,
                style(v.short_hash()).dim(),
                style(&v.config.cache_name).cyan(),
                v.state,
                v.config.strategy
            );
        }
        None => println!("  {} {:<8} none", style("-").dim(), label),
    }
}
