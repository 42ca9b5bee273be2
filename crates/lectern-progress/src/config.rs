//! Progress-queue configuration.

use std::time::Duration;

use lectern_core::{Error, LogFormat, Result};

use crate::pending::DEFAULT_PENDING_KEY;
use crate::progress::DEFAULT_PROGRESS_COLLECTION;
use crate::retry::RetryPolicy;

/// Settings shared by the pending store, reconciler and recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backoff policy for remote reads.
    pub retry: RetryPolicy,
    /// Local key holding the pending list.
    pub pending_key: String,
    /// Remote collection holding course-progress documents.
    pub progress_collection: String,
    /// Keep unhandled event types after a successful sync instead of dropping them.
    pub retain_unhandled: bool,
    /// Log output format for binaries.
    pub log_format: LogFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            pending_key: DEFAULT_PENDING_KEY.to_string(),
            progress_collection: DEFAULT_PROGRESS_COLLECTION.to_string(),
            retain_unhandled: false,
            log_format: LogFormat::default(),
        }
    }
}

impl SyncConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// Supported environment variables:
    /// - `LECTERN_RETRY_MAX_RETRIES` (default: 3)
    /// - `LECTERN_RETRY_INITIAL_DELAY_MS` (default: 1000)
    /// - `LECTERN_PENDING_KEY` (default: `pendingProgressUpdates`)
    /// - `LECTERN_PROGRESS_COLLECTION` (default: `userProgress`)
    /// - `LECTERN_RETAIN_UNHANDLED` (default: false)
    /// - `LECTERN_LOG_FORMAT` (`pretty` or `json`, default: pretty)
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&lookup);
        let mut config = Self::default();

        if let Some(retries) = vars.u32("LECTERN_RETRY_MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(millis) = vars.u64("LECTERN_RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay = Duration::from_millis(millis);
        }
        if let Some(key) = vars.string("LECTERN_PENDING_KEY") {
            config.pending_key = key;
        }
        if let Some(collection) = vars.string("LECTERN_PROGRESS_COLLECTION") {
            if collection.contains('/') {
                return Err(Error::InvalidInput(format!(
                    "LECTERN_PROGRESS_COLLECTION must not contain '/' (got {collection})"
                )));
            }
            config.progress_collection = collection;
        }
        if let Some(retain) = vars.bool("LECTERN_RETAIN_UNHANDLED")? {
            config.retain_unhandled = retain;
        }
        if let Some(format) = vars.string("LECTERN_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        Ok(config)
    }
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u32(&self, name: &str) -> Result<Option<u32>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u32>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u32: {e}")))
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
    }

    fn bool(&self, name: &str) -> Result<Option<bool>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(Some(true)),
            "false" | "0" | "no" | "n" => Ok(Some(false)),
            _ => Err(Error::InvalidInput(format!(
                "{name} must be a boolean (true/false/1/0)"
            ))),
        }
    }
}
