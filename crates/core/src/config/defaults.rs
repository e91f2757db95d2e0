//! Default values and functions for configuration

/// Default quiet period before a change batch is delivered
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

pub(crate) fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

pub(crate) fn default_ignore_patterns() -> Vec<String> {
    Vec::new()
}

pub(crate) fn default_follow_symlinks() -> bool {
    false
}

pub(crate) fn default_resync_on_notify_failure() -> bool {
    false
}

pub(crate) fn default_concurrent_acquisition() -> bool {
    true
}
