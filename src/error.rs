//! Error types for datalink.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the failing stage of a linkage run (configuration, fetch, cache, decode,
//! comparison) and get a readable message.

use std::io;

use thiserror::Error;

/// Validation errors raised while building datasets, matchers and configs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Dataset definition has a blank store reference.
    #[error("Store reference cannot be empty")]
    EmptyStoreRef,

    /// Dataset definition has a blank selection pattern.
    #[error("Selection pattern cannot be empty")]
    EmptySelectionPattern,

    /// Matcher built without comparators.
    #[error("Matcher needs at least one comparator spec")]
    NoComparators,

    /// A comparator weight is NaN or infinite.
    #[error("Comparator spec '{field_a}' ~ '{field_b}' has a non-finite weight")]
    NonFiniteWeight {
        /// Left field of the offending spec.
        field_a: String,
        /// Right field of the offending spec.
        field_b: String,
    },

    /// A fetch setting is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which setting and why.
        reason: String,
    },
}

/// Errors raised while populating a dataset cache from a remote store.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Selections kept failing until the batch size reached zero.
    #[error("Batch size reduced to zero at offset {offset}: the store rejects even a minimal selection")]
    BatchSizeExhausted {
        /// Offset of the page that could not be fetched.
        offset: usize,
    },

    /// A detail query failed on every allowed attempt.
    #[error("Detail query for {resource} failed after {attempts} attempts")]
    DetailRetriesExhausted {
        /// Entity whose detail could not be fetched.
        resource: String,
        /// Attempts made.
        attempts: u32,
    },

    /// The run's cancellation token fired.
    #[error("Fetch cancelled")]
    Cancelled,

    /// No store is registered under the dataset's reference.
    #[error("No record store registered for '{store_ref}'")]
    StoreNotFound {
        /// Reference that failed to resolve.
        store_ref: String,
    },
}

/// Errors raised while decoding cached payloads into records.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A payload line is not a valid triple.
    #[error("Malformed graph at line {line}: {reason}")]
    MalformedGraph {
        /// One-based line number in the payload.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },
}

/// Error returned by a field comparator.
#[derive(Debug, Error)]
#[error("Comparator '{comparator}' failed: {reason}")]
pub struct ComparatorError {
    /// Name of the failing comparator.
    pub comparator: String,
    /// Why it failed.
    pub reason: String,
}

impl ComparatorError {
    /// Creates a comparator error.
    #[must_use]
    pub fn new(comparator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            comparator: comparator.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error type for a linkage run.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Invalid dataset, matcher or config.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Populating a cache from a store failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Opening, reading or writing a cache failed.
    #[error("Cache error: {message}")]
    Cache {
        /// What was being done to the cache.
        message: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A cached payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A comparator failed during scoring.
    #[error("Comparator error: {0}")]
    Comparator(#[from] ComparatorError),

    /// Writing the match output failed.
    #[error("Failed to write match output: {0}")]
    Output(#[source] io::Error),
}

impl LinkError {
    /// Wraps a cache I/O failure with context.
    #[must_use]
    pub fn cache(message: impl Into<String>, source: io::Error) -> Self {
        Self::Cache {
            message: message.into(),
            source,
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a fetch error.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Returns true if this is a cache I/O error.
    #[must_use]
    pub const fn is_cache(&self) -> bool {
        matches!(self, Self::Cache { .. })
    }

    /// Returns true if the cache is held open by another process.
    #[must_use]
    pub fn is_cache_locked(&self) -> bool {
        match self {
            Self::Cache { source, .. } => source.kind() == io::ErrorKind::WouldBlock,
            _ => false,
        }
    }

    /// Returns true if the run was stopped through its cancellation token.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(FetchError::Cancelled))
    }
}

/// Result type alias for datalink operations.
pub type LinkResult<T> = Result<T, LinkError>;
