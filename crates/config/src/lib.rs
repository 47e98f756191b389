//! # Config - engine options
//!
//! Tunables for a cask database. Every field has a default, so
//! `Options::default()` is a working configuration.
//!
//! ```text
//! CASK_MAX_SEGMENT_KB        rotation threshold in KiB        (default: 10240 = 10 MiB)
//! CASK_MAX_MERGE_SEGMENT_KB  merge output rollover in KiB     (default: 102400 = 100 MiB)
//! CASK_SYNC                  fsync after every put            (default: "false")
//! ```

/// Default rotation threshold for the active segment (10 MiB).
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 10 * 1024 * 1024;
/// Default size at which merge starts a new output segment (100 MiB).
pub const DEFAULT_MAX_MERGE_SEGMENT_SIZE: u64 = 100 * 1024 * 1024;

pub const ENV_MAX_SEGMENT_KB: &str = "CASK_MAX_SEGMENT_KB";
pub const ENV_MAX_MERGE_SEGMENT_KB: &str = "CASK_MAX_MERGE_SEGMENT_KB";
pub const ENV_SYNC: &str = "CASK_SYNC";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// The active segment is rotated before a put once its size is at or
    /// above this many bytes.
    pub max_segment_size: u64,
    /// A merged segment is sealed and a new one started once it reaches
    /// this many bytes.
    pub max_merge_segment_size: u64,
    /// fsync the active segment after every append.
    pub sync_on_put: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            max_merge_segment_size: DEFAULT_MAX_MERGE_SEGMENT_SIZE,
            sync_on_put: false,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_segment_size(mut self, bytes: u64) -> Self {
        self.max_segment_size = bytes;
        self
    }

    pub fn with_max_merge_segment_size(mut self, bytes: u64) -> Self {
        self.max_merge_segment_size = bytes;
        self
    }

    pub fn with_sync_on_put(mut self, sync: bool) -> Self {
        self.sync_on_put = sync;
        self
    }

    /// Reads options from the process environment. Missing or unparsable
    /// values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds options from an arbitrary `key -> value` lookup using the
    /// `CASK_*` names.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        if let Some(kb) = lookup(ENV_MAX_SEGMENT_KB).and_then(|v| v.trim().parse::<u64>().ok()) {
            opts.max_segment_size = kb.saturating_mul(1024);
        }
        if let Some(kb) =
            lookup(ENV_MAX_MERGE_SEGMENT_KB).and_then(|v| v.trim().parse::<u64>().ok())
        {
            opts.max_merge_segment_size = kb.saturating_mul(1024);
        }
        if let Some(sync) = lookup(ENV_SYNC).and_then(|v| parse_bool(&v)) {
            opts.sync_on_put = sync;
        }

        opts
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
