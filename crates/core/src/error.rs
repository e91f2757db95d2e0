use std::path::PathBuf;
use thiserror::Error;

/// Result type for workspace consistency operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for workspace consistency operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The watch root could not be registered with the OS notification mechanism
    #[error("Failed to watch {path}: {reason}")]
    WatchSetup { path: PathBuf, reason: String },

    /// The notifier rejected a change batch
    #[error("Notify error: {0}")]
    Notify(String),

    /// The session reported no active views
    #[error("No active views in the workspace session")]
    NoActiveViews,

    /// Every active view failed to produce a snapshot
    #[error("No usable snapshots: all {attempted} view(s) failed to produce a snapshot")]
    NoUsableSnapshots { attempted: usize },

    /// A single view failed to produce a snapshot
    #[error("Snapshot acquisition failed for view {view}: {reason}")]
    SnapshotAcquisition { view: String, reason: String },

    /// A caller-supplied query failed
    #[error("Query error: {0}")]
    Query(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a watch setup error for `path`
    pub fn watch_setup(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WatchSetup {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a notify error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Creates a snapshot acquisition error
    pub fn snapshot_acquisition(view: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SnapshotAcquisition {
            view: view.into(),
            reason: reason.into(),
        }
    }

    /// Creates a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True when the session has no views at all ("no project loaded")
    pub fn is_no_active_views(&self) -> bool {
        matches!(self, Self::NoActiveViews)
    }

    /// True when views exist but none could produce a snapshot
    pub fn is_no_usable_snapshots(&self) -> bool {
        matches!(self, Self::NoUsableSnapshots { .. })
    }

    /// True for construction-time watch failures
    pub fn is_watch_setup(&self) -> bool {
        matches!(self, Self::WatchSetup { .. })
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
