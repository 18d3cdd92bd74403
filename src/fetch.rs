//! Populating a dataset cache from a remote store.
//!
//! The fetcher pages through the dataset's selection query with an adaptive
//! batch size, then issues one detail query per identifier and writes each
//! payload to the [`RecordCache`]. Two retry policies apply:
//!
//! - Selection pages: on failure the batch size is halved and the same offset
//!   is retried at once. A batch size of zero is fatal.
//! - Detail queries: on failure the same query is retried after a fixed delay,
//!   up to `detail_max_attempts`, and the wait can be cancelled.
//!
//! A completed cache is reused without any network access. An interrupted
//! fetch resumes from its partial cache, skipping identifiers already stored.

use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

use crate::cache::{CacheMode, CacheState, RecordCache};
use crate::config::FetchConfig;
use crate::dataset::Dataset;
use crate::error::{FetchError, LinkError, LinkResult};
use crate::store::{RecordStore, SelectResult};

/// Adaptive selection batch size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSizer {
    size: usize,
    growth_factor: f64,
    shrink_factor: f64,
}

impl BatchSizer {
    /// Creates a sizer starting at `initial`.
    #[must_use]
    pub fn new(initial: usize, growth_factor: f64, shrink_factor: f64) -> Self {
        Self {
            size: initial,
            growth_factor,
            shrink_factor,
        }
    }

    /// Creates a sizer from the fetch settings.
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.initial_batch_size,
            config.growth_factor,
            config.shrink_factor,
        )
    }

    /// Batch size for the next request.
    #[must_use]
    pub const fn current(&self) -> usize {
        self.size
    }

    /// Grows after a successful page (truncating).
    pub fn grow(&mut self) -> usize {
        self.size = scale(self.size, self.growth_factor);
        self.size
    }

    /// Shrinks after a failed page (truncating). Zero means give up.
    pub fn shrink(&mut self) -> usize {
        self.size = scale(self.size, self.shrink_factor);
        self.size
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scale(size: usize, factor: f64) -> usize {
    (size as f64 * factor).trunc() as usize
}

/// Cooperative cancellation for a running fetch.
///
/// Clones share state. Once cancelled, every clone observes it.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Default for Cancellation {
    fn default() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }
}

impl Cancellation {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.try_send(());
    }

    /// Returns true once `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Sleeps for `timeout` unless cancelled first. Returns true if cancelled.
    fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                // Put the signal back for other clones and later checks
                let _ = self.tx.try_send(());
                true
            }
            Err(_) => false,
        }
    }
}

/// Counters describing one `populate` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    /// Cache file stem of the dataset.
    pub identity: String,
    /// A completed cache was reused; no network access happened.
    pub reused: bool,
    /// A partial cache from an interrupted fetch was resumed.
    pub resumed: bool,
    /// Successful selection pages.
    pub pages: usize,
    /// Failed selection attempts (each one halved the batch size).
    pub bulk_failures: usize,
    /// Batch size after the last page.
    pub final_batch_size: usize,
    /// Detail queries issued, including retries.
    pub detail_requests: usize,
    /// Failed detail attempts.
    pub detail_failures: usize,
    /// Identifiers skipped because the cache already held them.
    pub skipped_cached: usize,
    /// Payloads written to the cache.
    pub records_written: usize,
    /// When population started.
    pub started_at: DateTime<Utc>,
    /// When population finished.
    pub finished_at: DateTime<Utc>,
}

/// Drives a [`RecordStore`] to populate the cache of one dataset.
pub struct DatasetFetcher<'a> {
    store: &'a dyn RecordStore,
    config: &'a FetchConfig,
    cancel: Cancellation,
}

impl<'a> DatasetFetcher<'a> {
    /// Creates a fetcher over `store` with its own cancellation token.
    #[must_use]
    pub fn new(store: &'a dyn RecordStore, config: &'a FetchConfig) -> Self {
        Self {
            store,
            config,
            cancel: Cancellation::new(),
        }
    }

    /// Uses `cancel` to stop the fetch from another thread.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ensures a complete cache exists for `dataset` and returns it read-only.
    ///
    /// # Errors
    /// - `FetchError::BatchSizeExhausted` when selection keeps failing
    /// - `FetchError::DetailRetriesExhausted` when a detail query keeps failing
    /// - `FetchError::Cancelled` when the cancellation token fires
    /// - `LinkError::Cache` on any cache I/O failure
    pub fn populate(&self, dataset: &Dataset) -> LinkResult<(RecordCache, FetchReport)> {
        let dir = &self.config.cache_dir;
        let identity = dataset.identity();
        let mut report = FetchReport {
            identity: identity.file_stem(),
            started_at: Utc::now(),
            ..FetchReport::default()
        };

        if self.config.force_refresh {
            tracing::info!(dataset = %identity, "force refresh: discarding cached records");
            RecordCache::remove(dir, identity)
                .map_err(|e| LinkError::cache("failed to discard cache", e))?;
        }

        let mut cache = match RecordCache::state(dir, identity) {
            CacheState::Complete => {
                let cache = RecordCache::open(dir, identity, CacheMode::Read)
                    .map_err(|e| LinkError::cache("failed to open cache", e))?;
                report.reused = true;
                report.finished_at = Utc::now();
                tracing::info!(
                    dataset = %identity,
                    records = cache.len(),
                    "reusing completed cache"
                );
                return Ok((cache, report));
            }
            CacheState::Partial => {
                let cache = RecordCache::open(dir, identity, CacheMode::Append)
                    .map_err(|e| LinkError::cache("failed to reopen partial cache", e))?;
                report.resumed = true;
                tracing::info!(
                    dataset = %identity,
                    records = cache.len(),
                    "resuming interrupted fetch"
                );
                cache
            }
            CacheState::Missing => RecordCache::open(dir, identity, CacheMode::Create)
                .map_err(|e| LinkError::cache("failed to create cache", e))?,
        };

        self.fetch_all(dataset, &mut cache, &mut report)?;

        let cache = cache
            .commit(self.config.sync_on_commit)
            .map_err(|e| LinkError::cache("failed to commit cache", e))?;

        report.finished_at = Utc::now();
        tracing::info!(
            dataset = %identity,
            pages = report.pages,
            bulk_failures = report.bulk_failures,
            records_written = report.records_written,
            skipped_cached = report.skipped_cached,
            "fetch complete"
        );

        Ok((cache, report))
    }

    fn fetch_all(
        &self,
        dataset: &Dataset,
        cache: &mut RecordCache,
        report: &mut FetchReport,
    ) -> LinkResult<()> {
        let mut sizer = BatchSizer::from_config(self.config);
        let mut offset = 0usize;

        loop {
            let (requested, page) = self.select_page(dataset, &mut sizer, offset, report)?;

            for resource in page.resources() {
                if cache.contains(resource) {
                    report.skipped_cached += 1;
                    continue;
                }

                let payload = self.fetch_detail(dataset, resource, report)?;
                cache
                    .put(resource, &payload)
                    .map_err(|e| LinkError::cache("failed to write cache entry", e))?;
                report.records_written += 1;
            }

            // Advance by what was asked for, not by the grown size.
            offset += requested;
            if page.len() < requested {
                break;
            }
        }

        report.final_batch_size = sizer.current();
        Ok(())
    }

    /// Fetches one selection page, shrinking and retrying on failure.
    /// Returns the batch size that succeeded along with the page.
    fn select_page(
        &self,
        dataset: &Dataset,
        sizer: &mut BatchSizer,
        offset: usize,
        report: &mut FetchReport,
    ) -> LinkResult<(usize, SelectResult)> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled.into());
            }

            let requested = sizer.current();
            let query = dataset.selection_query(requested, offset);
            tracing::debug!(%query, "selecting page");

            match self.store.select(&query) {
                Ok(response) if response.is_success() => {
                    report.pages += 1;
                    sizer.grow();
                    return Ok((requested, response.body));
                }
                Ok(response) => tracing::warn!(
                    status = response.status,
                    batch_size = requested,
                    offset,
                    "selection page failed"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    batch_size = requested,
                    offset,
                    "selection page failed"
                ),
            }

            report.bulk_failures += 1;
            if sizer.shrink() == 0 {
                tracing::error!(offset, "batch size reduced to zero");
                return Err(FetchError::BatchSizeExhausted { offset }.into());
            }
        }
    }

    fn fetch_detail(
        &self,
        dataset: &Dataset,
        resource: &str,
        report: &mut FetchReport,
    ) -> LinkResult<String> {
        let query = dataset.detail_query(resource);
        tracing::debug!(%resource, "fetching record");

        let mut attempts = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled.into());
            }

            attempts += 1;
            report.detail_requests += 1;

            match self.store.fetch_detail(&query) {
                Ok(response) if response.is_success() => return Ok(response.body),
                Ok(response) => tracing::warn!(
                    %resource,
                    status = response.status,
                    attempt = attempts,
                    "record fetch failed"
                ),
                Err(e) => tracing::warn!(
                    %resource,
                    error = %e,
                    attempt = attempts,
                    "record fetch failed"
                ),
            }
            report.detail_failures += 1;

            if let Some(max) = self.config.detail_max_attempts {
                if attempts >= max {
                    return Err(FetchError::DetailRetriesExhausted {
                        resource: resource.to_string(),
                        attempts,
                    }
                    .into());
                }
            }

            if self.cancel.wait(self.config.detail_retry_delay) {
                return Err(FetchError::Cancelled.into());
            }
        }
    }
}
