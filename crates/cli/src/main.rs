//! wsync CLI - workspace change watching
//!
//! This binary runs the change watcher against a directory and reports
//! each coalesced batch.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use wsync::{watch_until, OutputFormat};
use wsync_core::config::Config;

#[derive(Parser)]
#[command(name = "wsync")]
#[command(about = "Watch a workspace and batch on-disk changes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and report debounced change batches
    Watch {
        /// Directory to watch (defaults to the current directory)
        path: Option<PathBuf>,

        /// Override the debounce window in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Print each batch as a JSON line on stdout
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Watch {
            path,
            debounce_ms,
            json,
        } => watch(cli.config.as_deref(), path, debounce_ms, json).await,
        Commands::Config => show_config(cli.config.as_deref()),
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "wsync={level},wsync_core={level},wsync_watcher={level}"
                ))
            }),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn watch(
    config_path: Option<&Path>,
    path: Option<PathBuf>,
    debounce_ms: Option<u64>,
    json: bool,
) -> Result<()> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    if let Some(ms) = debounce_ms {
        config.watcher.debounce_ms = ms;
    }
    config.validate()?;

    let root = match path {
        Some(p) => p,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Log
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let stats = watch_until(&root, config.watcher, format, shutdown)
        .await
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    info!(
        "Delivered {} batches ({} events observed, {} notify failures, {} watch errors)",
        stats.batches_delivered,
        stats.events_observed,
        stats.notify_failures,
        stats.observation_errors
    );
    Ok(())
}

fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}
