//! Glob-based path filtering
//!
//! Paths matching an ignore pattern are never registered with the OS
//! watcher and their events are never reported.

use glob::{Pattern, PatternError};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Compiled set of ignore patterns
///
/// By default, ignores nothing. A pattern matches either the full path or
/// the final path component, so `.git` and `**/.git/**` both work.
#[derive(Clone, Default)]
pub(crate) struct IgnoreFilter {
    patterns: Arc<Vec<Pattern>>,
}

impl IgnoreFilter {
    /// Create a filter from patterns
    pub(crate) fn from_patterns(patterns: &[String]) -> Result<Self, PatternError> {
        let compiled_patterns = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns: Arc::new(compiled_patterns),
        })
    }

    /// Check if a path should be ignored
    pub(crate) fn should_ignore(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();
        let file_name = path.file_name().map(|n| n.to_string_lossy());

        for pattern in self.patterns.iter() {
            let name_match = file_name
                .as_deref()
                .is_some_and(|name| pattern.matches(name));
            if name_match || pattern.matches(&path_str) {
                trace!("Path {:?} matches ignore pattern {}", path, pattern);
                return true;
            }
        }

        false
    }
}

impl std::fmt::Debug for IgnoreFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IgnoreFilter")
            .field("patterns", &self.patterns.len())
            .finish()
    }
}
