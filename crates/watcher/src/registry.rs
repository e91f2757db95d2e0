//! The set of directories registered with the OS watcher
//!
//! Watches are installed one directory at a time (non-recursive), so every
//! directory created under the root has to be registered here before its
//! contents can be observed.

use crate::ignore::IgnoreFilter;
use dashmap::DashSet;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use wsync_core::error::{Error, Result};
use wsync_core::Diagnostics;

/// Owns the notify watcher and the registered directory set
pub(crate) struct WatchRegistry<W = RecommendedWatcher> {
    watcher: W,
    directories: Arc<DashSet<PathBuf>>,
    ignore_filter: IgnoreFilter,
    follow_symlinks: bool,
    diagnostics: Arc<Diagnostics>,
}

impl<W: NotifyWatcher> WatchRegistry<W> {
    pub(crate) fn new(
        watcher: W,
        ignore_filter: IgnoreFilter,
        follow_symlinks: bool,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            watcher,
            directories: Arc::new(DashSet::new()),
            ignore_filter,
            follow_symlinks,
            diagnostics,
        }
    }

    /// Shared view of the registered directories
    pub(crate) fn directories(&self) -> Arc<DashSet<PathBuf>> {
        Arc::clone(&self.directories)
    }

    pub(crate) fn is_registered(&self, dir: &Path) -> bool {
        self.directories.contains(dir)
    }

    /// Register `root` and every directory reachable from it
    ///
    /// All-or-nothing: on the first failure every registration made by this
    /// call is removed again before the error is returned.
    pub(crate) fn register_root(&mut self, root: &Path) -> Result<usize> {
        let mut added = Vec::new();
        let outcome = self.walk(root, &mut added, None, true);

        match outcome {
            Ok(()) => {
                self.diagnostics
                    .record_directories_registered(added.len() as u64);
                debug!("Registered {} directories under {:?}", added.len(), root);
                Ok(added.len())
            }
            Err((path, e)) => {
                for dir in &added {
                    self.unwatch(dir);
                }
                Err(Error::watch_setup(path, e.to_string()))
            }
        }
    }

    /// Register a directory that appeared after the watch started
    ///
    /// Best effort: failures are logged and counted. Returns every entry
    /// already present inside the new subtree so the caller can report
    /// files written before the watch was in place.
    pub(crate) fn register_created(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mut added = Vec::new();
        let mut discovered = Vec::new();

        if let Err((path, e)) = self.walk(dir, &mut added, Some(&mut discovered), false) {
            warn!("Failed to register new directory {:?}: {}", path, e);
            self.diagnostics.record_registration_failure();
        }

        if !added.is_empty() {
            self.diagnostics
                .record_directories_registered(added.len() as u64);
            debug!("Registered {} new directories under {:?}", added.len(), dir);
        }
        discovered
    }

    /// Forget `dir` and every registered descendant
    pub(crate) fn unregister_subtree(&mut self, dir: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .directories
            .iter()
            .filter(|d| d.starts_with(dir))
            .map(|d| d.key().clone())
            .collect();

        for path in &doomed {
            self.unwatch(path);
        }
        if !doomed.is_empty() {
            debug!("Unregistered {} directories under {:?}", doomed.len(), dir);
        }
        doomed.len()
    }

    /// Every non-ignored file directly inside a registered directory
    pub(crate) fn files(&self) -> Vec<PathBuf> {
        let dirs: Vec<PathBuf> = self.directories.iter().map(|d| d.key().clone()).collect();
        let mut files = Vec::new();

        for dir in dirs {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    trace!("Skipping unreadable directory {:?}: {}", dir, e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_file = entry.file_type().map(|t| !t.is_dir()).unwrap_or(false);
                if is_file && !self.ignore_filter.should_ignore(&path) {
                    files.push(path);
                }
            }
        }
        files
    }

    pub(crate) fn should_ignore(&self, path: &Path) -> bool {
        self.ignore_filter.should_ignore(path)
    }

    /// Whether `path` is a directory the walk would descend into
    pub(crate) fn is_watchable_dir(&self, path: &Path) -> bool {
        let metadata = if self.follow_symlinks {
            std::fs::metadata(path)
        } else {
            std::fs::symlink_metadata(path)
        };
        metadata.map(|m| m.is_dir()).unwrap_or(false)
    }

    fn walk(
        &mut self,
        start: &Path,
        added: &mut Vec<PathBuf>,
        mut discovered: Option<&mut Vec<PathBuf>>,
        strict: bool,
    ) -> std::result::Result<(), (PathBuf, io::Error)> {
        let mut visited = HashSet::new();
        let mut stack = vec![start.to_path_buf()];

        while let Some(dir) = stack.pop() {
            if self.follow_symlinks {
                // Guards against symlink cycles.
                let canonical = std::fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
                if !visited.insert(canonical) {
                    continue;
                }
            }

            if !self.directories.contains(&dir) {
                self.watcher
                    .watch(&dir, RecursiveMode::NonRecursive)
                    .map_err(|e| (dir.clone(), io::Error::other(e.to_string())))?;
                self.directories.insert(dir.clone());
                added.push(dir.clone());
                trace!("Watching directory {:?}", dir);
            }

            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if strict => return Err((dir, e)),
                Err(e) => {
                    // Removed again before we got to it.
                    trace!("Cannot read {:?}: {}", dir, e);
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if strict => return Err((dir.clone(), e)),
                    Err(_) => continue,
                };
                let path = entry.path();
                if self.ignore_filter.should_ignore(&path) {
                    continue;
                }
                if let Some(found) = discovered.as_deref_mut() {
                    found.push(path.clone());
                }
                if self.is_watchable_dir(&path) {
                    stack.push(path);
                }
            }
        }
        Ok(())
    }

    fn unwatch(&mut self, dir: &Path) {
        self.directories.remove(dir);
        // The OS usually drops the watch itself once the directory is gone.
        if let Err(e) = self.watcher.unwatch(dir) {
            trace!("Unwatch of {:?} failed: {}", dir, e);
        }
    }
}
