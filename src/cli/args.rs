//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// swcache - service-worker style request cache
///
/// Registers a worker script, caches its assets, and serves requests
/// cache-first with network fallback.
#[derive(Parser, Debug)]
#[command(name = "swcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SWCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a worker script and install it
    Register(RegisterArgs),

    /// Remove the worker registration
    Unregister,

    /// Activate the waiting worker version
    Activate,

    /// Resolve a request through the worker
    Fetch(FetchArgs),

    /// Show the registration and worker versions
    Status,

    /// Inspect and manage caches
    Caches(CachesArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the register command
#[derive(Parser, Debug)]
pub struct RegisterArgs {
    /// Path of the worker script on the origin (e.g. /sw.toml)
    pub script: String,

    /// Narrow the scope below the script's directory
    #[arg(short, long)]
    pub scope: Option<String>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL or origin-relative path to request
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print status line and headers before the body
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the caches command
#[derive(Parser, Debug)]
pub struct CachesArgs {
    /// Subcommand for caches
    #[command(subcommand)]
    pub action: CachesAction,
}

/// Caches subcommands
#[derive(Subcommand, Debug)]
pub enum CachesAction {
    /// List cache namespaces
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the entries of one cache
    Show {
        /// Cache name
        name: String,
    },

    /// Delete one cache
    Delete {
        /// Cache name
        name: String,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
