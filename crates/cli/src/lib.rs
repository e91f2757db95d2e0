//! Operator surface for the workspace consistency layer
//!
//! Watches a directory and reports each debounced batch, either as log
//! lines or as one JSON object per batch on stdout.

use async_trait::async_trait;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use wsync_core::{ChangeBatch, DiagnosticsSnapshot, Notifier, Result, WatcherConfig};
use wsync_watcher::ChangeWatcher;

/// Output format for delivered batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Log,
    Json,
}

/// Notifier that reports batches instead of invalidating a cache
#[derive(Debug)]
pub struct ReportingNotifier {
    format: OutputFormat,
}

impl ReportingNotifier {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl Notifier for ReportingNotifier {
    async fn notify_changed(&self, batch: ChangeBatch) -> Result<()> {
        match self.format {
            OutputFormat::Log => {
                info!("{} change(s) on disk", batch.len());
                for event in batch.events() {
                    debug!("  {} {}", event.kind, event.path.display());
                }
            }
            OutputFormat::Json => {
                let line = serde_json::to_string(&batch).map_err(anyhow::Error::from)?;
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{line}")?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Watch `root` until `shutdown` resolves, then close the watcher
///
/// Returns the watcher's diagnostic counters at shutdown.
pub async fn watch_until(
    root: &Path,
    config: WatcherConfig,
    format: OutputFormat,
    shutdown: impl Future<Output = ()>,
) -> Result<DiagnosticsSnapshot> {
    let notifier: Arc<dyn Notifier> = Arc::new(ReportingNotifier::new(format));
    let watcher = ChangeWatcher::with_config(notifier, root, config)?;
    let diagnostics = watcher.diagnostics();

    shutdown.await;
    info!("Shutting down watcher");
    watcher.close().await;

    Ok(diagnostics.snapshot())
}
