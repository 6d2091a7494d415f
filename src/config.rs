//! Ledger configuration
//!
//! Thresholds default to the values reports have always been computed with;
//! a JSON file and `EDIT_FLUX_*` environment variables can override them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Lines at or below this many characters are never cached
pub const DEFAULT_CACHE_MIN_CONTENT_LENGTH: usize = 15;

/// Gaps above this are deliberation (15 seconds)
pub const DEFAULT_THINKING_THRESHOLD_MS: i64 = 15_000;

/// Gaps above this are capped and the excess counted as idle (10 minutes)
pub const DEFAULT_IDLE_THRESHOLD_MS: i64 = 600_000;

/// Width of event-count buckets (5 seconds)
pub const DEFAULT_BUCKET_WIDTH_MS: i64 = 5_000;

/// Tunable thresholds for ingestion and metric derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Content must be strictly longer than this to enter the content cache
    pub cache_min_content_length: usize,
    /// Gap above which time counts as thinking
    pub thinking_threshold_ms: i64,
    /// Gap above which the excess counts as idle
    pub idle_threshold_ms: i64,
    /// Bucket width for the Fano factor series
    pub bucket_width_ms: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cache_min_content_length: DEFAULT_CACHE_MIN_CONTENT_LENGTH,
            thinking_threshold_ms: DEFAULT_THINKING_THRESHOLD_MS,
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            bucket_width_ms: DEFAULT_BUCKET_WIDTH_MS,
        }
    }
}

impl LedgerConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        let config: LedgerConfig = serde_json::from_str(json)
            .map_err(|e| LedgerError::InvalidConfig(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_json(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, LedgerError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, LedgerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply `EDIT_FLUX_*` overrides; unparsable values are ignored
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_override::<usize>("EDIT_FLUX_CACHE_MIN_LENGTH") {
            self.cache_min_content_length = value;
        }
        if let Some(value) = env_override::<i64>("EDIT_FLUX_THINKING_THRESHOLD_MS") {
            self.thinking_threshold_ms = value;
        }
        if let Some(value) = env_override::<i64>("EDIT_FLUX_IDLE_THRESHOLD_MS") {
            self.idle_threshold_ms = value;
        }
        if let Some(value) = env_override::<i64>("EDIT_FLUX_BUCKET_WIDTH_MS") {
            self.bucket_width_ms = value;
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.bucket_width_ms <= 0 {
            return Err(LedgerError::InvalidConfig(format!(
                "bucket_width_ms must be positive, got {}",
                self.bucket_width_ms
            )));
        }
        if self.thinking_threshold_ms < 0 {
            return Err(LedgerError::InvalidConfig(format!(
                "thinking_threshold_ms must not be negative, got {}",
                self.thinking_threshold_ms
            )));
        }
        if self.thinking_threshold_ms >= self.idle_threshold_ms {
            return Err(LedgerError::InvalidConfig(format!(
                "thinking_threshold_ms ({}) must be below idle_threshold_ms ({})",
                self.thinking_threshold_ms, self.idle_threshold_ms
            )));
        }
        Ok(())
    }
}

fn env_override<T: std::str::FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("invalid {name}, ignoring: {err}");
            None
        }
    }
}
