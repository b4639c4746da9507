//! Caches command - inspect and delete cache namespaces

use crate::audit::{AuditEvent, AuditLog, DeletedBy};
use crate::cli::args::{CachesAction, CachesArgs, OutputFormat};
use crate::config::Config;
use crate::error::{SwError, SwResult};
use crate::store::{create_storage, CacheStorage};
use console::style;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
struct CacheSummary {
    name: String,
    entries: usize,
}

/// Execute the caches command
pub async fn execute(args: CachesArgs, config: &Config) -> SwResult<()> {
    let storage = create_storage(config).ok_or(SwError::Unsupported)?;

    match args.action {
        CachesAction::List { format } => list(&storage, format).await,
        CachesAction::Show { name } => show(&storage, &name).await,
        CachesAction::Delete { name } => delete(&storage, &name, config).await,
    }
}

async fn summaries(storage: &Arc<dyn CacheStorage>) -> SwResult<Vec<CacheSummary>> {
    let mut out = Vec::new();
    for name in storage.keys().await? {
        let entries = match storage.entries(&name).await {
            Ok(entries) => entries.len(),
            Err(SwError::CacheCorrupt { reason, .. }) => {
                warn!("Cache {} is unreadable: {}", name, reason);
                0
            }
            Err(e) => return Err(e),
        };
        out.push(CacheSummary { name, entries });
    }
    Ok(out)
}

async fn list(storage: &Arc<dyn CacheStorage>, format: OutputFormat) -> SwResult<()> {
    let caches = summaries(storage).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&caches)?),
        OutputFormat::Plain => {
            for cache in &caches {
                println!("{}", cache.name);
            }
        }
        OutputFormat::Table => {
            if caches.is_empty() {
                println!("No caches");
                return Ok(());
            }
            println!(
                "{:<40} {:>8}",
                style("NAME").bold(),
                style("ENTRIES").bold()
            );
            println!("{}", "-".repeat(49));
            for cache in &caches {
                println!("{:<40} {:>8}", cache.name, cache.entries);
            }
            println!();
            println!(
                "{} cache(s) in {} storage",
                caches.len(),
                storage.backend_name()
            );
        }
    }

    Ok(())
}

async fn show(storage: &Arc<dyn CacheStorage>, name: &str) -> SwResult<()> {
    if !storage.has(name).await? {
        return Err(SwError::CacheNotFound(name.to_string()));
    }

    println!("{}", style(name).bold());
    for key in storage.entries(name).await? {
        println!("  {}", key);
    }
    Ok(())
}

async fn delete(storage: &Arc<dyn CacheStorage>, name: &str, config: &Config) -> SwResult<()> {
    if !storage.delete(name).await? {
        return Err(SwError::CacheNotFound(name.to_string()));
    }

    AuditLog::new(config)
        .record(AuditEvent::CacheDeleted {
            cache_name: name.to_string(),
            deleted_by: DeletedBy::User,
        })
        .await;
    println!("{} Deleted cache {}", style("✓").green(), style(name).cyan());
    Ok(())
}
