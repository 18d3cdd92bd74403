//! Fetch configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, ValidationError};

/// Tuning knobs for populating a dataset cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Directory holding the per-dataset cache files.
    pub cache_dir: PathBuf,
    /// Batch size of the first selection page.
    pub initial_batch_size: usize,
    /// Multiplier applied to the batch size after a successful page.
    pub growth_factor: f64,
    /// Multiplier applied to the batch size after a failed page.
    pub shrink_factor: f64,
    /// Fixed wait between detail query attempts.
    pub detail_retry_delay: Duration,
    /// Maximum detail query attempts per identifier; `None` retries forever.
    pub detail_max_attempts: Option<u32>,
    /// Discard any existing cache for the dataset and fetch again.
    pub force_refresh: bool,
    /// Whether to fsync the cache when a fetch completes.
    pub sync_on_commit: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("."),
            initial_batch_size: 2000,
            growth_factor: 1.2,
            shrink_factor: 0.5,
            detail_retry_delay: Duration::from_secs(5),
            detail_max_attempts: Some(12),
            force_refresh: false,
            sync_on_commit: true,
        }
    }
}

impl FetchConfig {
    /// Creates a default configuration rooted at `cache_dir`.
    #[must_use]
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Checks every setting, returning the config unchanged when valid.
    ///
    /// # Errors
    /// `LinkError::Validation` wrapping `InvalidConfig`, naming the first bad setting.
    pub fn validate(self) -> Result<Self, LinkError> {
        if self.initial_batch_size == 0 {
            return Err(invalid("initial_batch_size must be at least 1".to_string()));
        }

        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(invalid(format!(
                "growth_factor must be >= 1.0 (got {})",
                self.growth_factor
            )));
        }

        if !self.shrink_factor.is_finite() || self.shrink_factor <= 0.0 || self.shrink_factor >= 1.0 {
            return Err(invalid(format!(
                "shrink_factor must be in (0.0, 1.0) (got {})",
                self.shrink_factor
            )));
        }

        if self.detail_max_attempts == Some(0) {
            return Err(invalid("detail_max_attempts must be at least 1".to_string()));
        }

        Ok(self)
    }
}

fn invalid(reason: String) -> LinkError {
    LinkError::Validation(ValidationError::InvalidConfig { reason })
}
