//! Core change watcher implementation
//!
//! One background task per watcher owns the OS watch registrations and the
//! pending batch. Raw notify events arrive over an unbounded channel, are
//! classified, and accumulate until the debounce window goes quiet. The
//! batch is then handed to the [`Notifier`] and cleared whatever the outcome.

use crate::{
    classify::classify, debouncer::BatchDebouncer, ignore::IgnoreFilter,
    registry::WatchRegistry,
};
use dashmap::DashSet;
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, RecommendedWatcher, Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use wsync_core::error::{Error, Result};
use wsync_core::{ChangeBatch, ChangeEvent, ChangeKind, Diagnostics, Notifier, WatcherConfig};

type RawEvent = notify::Result<NotifyEvent>;

/// Watches a directory subtree and delivers debounced change batches
///
/// Must be created inside a Tokio runtime. Call [`ChangeWatcher::close`] to
/// stop watching; dropping the watcher without closing also stops the
/// background task, but does not wait for it.
pub struct ChangeWatcher {
    /// Canonical root of the watched subtree
    root: PathBuf,
    /// Directories currently registered with the OS watcher
    directories: Arc<DashSet<PathBuf>>,
    /// Counters for swallowed errors and deliveries
    diagnostics: Arc<Diagnostics>,
    /// Cancellation token for stopping the event loop
    cancellation_token: CancellationToken,
    /// Event loop task, taken on close
    task: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Start watching `root` with the default configuration
    pub fn new(notifier: Arc<dyn Notifier>, root: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(notifier, root, WatcherConfig::default())
    }

    /// Start watching `root` with a custom configuration
    pub fn with_config(
        notifier: Arc<dyn Notifier>,
        root: impl AsRef<Path>,
        config: WatcherConfig,
    ) -> Result<Self> {
        Self::with_diagnostics(notifier, root, config, Arc::new(Diagnostics::new()))
    }

    /// Start watching `root`, recording into a shared diagnostic sink
    pub fn with_diagnostics(
        notifier: Arc<dyn Notifier>,
        root: impl AsRef<Path>,
        config: WatcherConfig,
        diagnostics: Arc<Diagnostics>,
    ) -> Result<Self> {
        let root = root.as_ref();
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::watch_setup(root, format!("no Tokio runtime: {e}")))?;

        let root = Self::resolve_root(root)?;

        let ignore_filter = IgnoreFilter::from_patterns(&config.ignore_patterns)
            .map_err(|e| Error::config(format!("Failed to create ignore filter: {e}")))?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let os_watcher = Self::create_notify_watcher(&root, raw_tx)?;

        let mut registry = WatchRegistry::new(
            os_watcher,
            ignore_filter,
            config.follow_symlinks,
            Arc::clone(&diagnostics),
        );
        let registered = registry.register_root(&root)?;
        let directories = registry.directories();

        let cancellation_token = CancellationToken::new();
        let event_loop = EventLoop {
            root: root.clone(),
            registry,
            debouncer: BatchDebouncer::new(config.debounce_duration()),
            notifier,
            diagnostics: Arc::clone(&diagnostics),
            resync_on_failure: config.resync_on_notify_failure,
            resync_pending: false,
        };
        let task = runtime.spawn(event_loop.run(raw_rx, cancellation_token.clone()));

        info!(
            "Watching {:?} ({} directories, debounce {}ms)",
            root, registered, config.debounce_ms
        );

        Ok(Self {
            root,
            directories,
            diagnostics,
            cancellation_token,
            task: Some(task),
        })
    }

    fn resolve_root(root: &Path) -> Result<PathBuf> {
        let metadata = std::fs::metadata(root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::watch_setup(root, "root does not exist")
            } else {
                Error::watch_setup(root, e.to_string())
            }
        })?;
        if !metadata.is_dir() {
            return Err(Error::watch_setup(root, "root is not a directory"));
        }
        std::fs::canonicalize(root).map_err(|e| Error::watch_setup(root, e.to_string()))
    }

    /// Create a notify watcher feeding the event loop's channel
    fn create_notify_watcher(
        root: &Path,
        tx: mpsc::UnboundedSender<RawEvent>,
    ) -> Result<RecommendedWatcher> {
        let config = NotifyConfig::default().with_compare_contents(false);

        RecommendedWatcher::new(
            move |res: RawEvent| {
                // Fails only once the event loop has exited.
                let _ = tx.send(res);
            },
            config,
        )
        .map_err(|e| Error::watch_setup(root, format!("Failed to create watcher: {e}")))
    }

    /// Canonical root of the watched subtree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directories currently registered with the OS watcher
    pub fn watched_directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.directories.iter().map(|d| d.key().clone()).collect();
        dirs.sort();
        dirs
    }

    /// Check if `path` is a registered directory
    pub fn is_watching(&self, path: &Path) -> bool {
        self.directories.contains(path)
    }

    /// Shared diagnostic counters
    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    /// Stop watching
    ///
    /// Cancels the event loop, drops any pending batch without delivering
    /// it, and waits for the task to exit. An in-flight notifier call is
    /// abandoned. All OS watch registrations are released before return.
    pub async fn close(mut self) {
        self.cancellation_token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Watcher event loop terminated abnormally: {}", e);
            }
        }
        self.directories.clear();
        info!("File watcher stopped for {:?}", self.root);
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("root", &self.root)
            .field("directories", &self.directories.len())
            .field("running", &self.task.is_some())
            .finish()
    }
}

/// State owned by the background task
struct EventLoop {
    root: PathBuf,
    registry: WatchRegistry,
    debouncer: BatchDebouncer,
    notifier: Arc<dyn Notifier>,
    diagnostics: Arc<Diagnostics>,
    resync_on_failure: bool,
    resync_pending: bool,
}

impl EventLoop {
    async fn run(
        mut self,
        mut raw_rx: mpsc::UnboundedReceiver<RawEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                raw = raw_rx.recv() => match raw {
                    Some(raw) => self.handle_raw(raw),
                    None => {
                        debug!("Notify channel closed");
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.debouncer.is_ready_at(Instant::now()) && !self.flush(&cancel).await {
                        break;
                    }
                }
            }
        }

        let dropped = self.debouncer.discard();
        if dropped > 0 {
            debug!("Dropped {} pending events on shutdown", dropped);
        }
        debug!("Event loop stopped for {:?}", self.root);
        // `self.registry` drops here, releasing every OS watch.
    }

    fn handle_raw(&mut self, raw: RawEvent) {
        let event = match raw {
            Ok(event) => event,
            Err(e) => {
                warn!("File watch error: {}", e);
                self.diagnostics.record_observation_error();
                return;
            }
        };
        trace!("Received notify event: {:?}", event);

        if event.need_rescan() {
            // The OS queue overflowed; some changes were lost.
            warn!("File watch events dropped by the OS for {:?}", self.root);
            self.diagnostics.record_observation_error();
            if self.resync_on_failure {
                self.resync_pending = true;
                self.debouncer.arm();
            }
        }

        for change in classify(&event) {
            if self.registry.should_ignore(&change.path) {
                self.diagnostics.record_event_ignored();
                continue;
            }
            self.diagnostics.record_event_observed();

            match change.kind {
                ChangeKind::Created if self.registry.is_watchable_dir(&change.path) => {
                    // Register before queueing so nothing written inside the
                    // new directory during this window goes unseen.
                    let existing = self.registry.register_created(&change.path);
                    self.debouncer.push(change);
                    for path in existing {
                        self.debouncer.push(ChangeEvent::created(path));
                    }
                }
                ChangeKind::Deleted => {
                    if self.registry.is_registered(&change.path) {
                        self.registry.unregister_subtree(&change.path);
                    }
                    self.debouncer.push(change);
                }
                _ => self.debouncer.push(change),
            }
        }
    }

    /// Deliver the pending batch; returns false if shutdown interrupted it
    async fn flush(&mut self, cancel: &CancellationToken) -> bool {
        let mut events = self.debouncer.take();
        if events.is_empty() && !self.resync_pending {
            return true;
        }

        if self.resync_pending {
            let files = self.registry.files();
            debug!("Resyncing {} files", files.len());
            events.extend(files.into_iter().map(ChangeEvent::changed));
            self.resync_pending = false;
            if events.is_empty() {
                return true;
            }
        }

        let batch = ChangeBatch::from_disk(events);
        let count = batch.len();
        debug!("Flushing batch of {} events", count);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Shutdown during flush; abandoning batch of {} events", count);
                false
            }
            result = self.notifier.notify_changed(batch) => {
                match result {
                    Ok(()) => self.diagnostics.record_batch_delivered(),
                    Err(e) => {
                        warn!("Failed to deliver batch of {} events: {}", count, e);
                        self.diagnostics.record_notify_failure();
                        self.resync_pending = self.resync_on_failure;
                    }
                }
                true
            }
        }
    }
}
