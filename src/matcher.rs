//! Weighted pairwise matching of two datasets.
//!
//! Every left-hand entity is scored against every right-hand record. The
//! aggregate score of a pair is the sum of `compare(a, b) * weight` over the
//! comparator specs. The best strictly positive candidate wins; on equal
//! scores the later candidate wins, so results follow cache iteration order.
//!
//! Matching is greedy: each left entity is decided once, and several left
//! entities may match the same right entity.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::io::{self, Write};

use serde::Serialize;

use crate::comparator::ComparatorSpec;
use crate::config::FetchConfig;
use crate::dataset::{Dataset, DatasetDefinition};
use crate::decode::{DecodedRecord, EntityRecords, RecordDecoder};
use crate::error::{ComparatorError, FetchError, LinkError, LinkResult, ValidationError};
use crate::fetch::{Cancellation, DatasetFetcher};
use crate::graph::NTriplesParser;
use crate::store::StoreResolver;

/// Predicate used for match assertions unless the job names another.
pub const DEFAULT_MATCH_PREDICATE: &str = "http://www.w3.org/2002/07/owl#sameAs";

/// Best match found for one left-hand entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    /// Left-hand entity.
    pub left: String,
    /// Best right-hand entity, if any scored above zero.
    pub right: Option<String>,
    /// Score of the best candidate.
    pub score: f64,
}

impl MatchOutcome {
    /// Returns true if a right-hand entity was selected.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.right.is_some()
    }

    /// Writes the outcome as an annotated N-Triples assertion.
    ///
    /// # Errors
    /// Propagates write failures from `sink`.
    pub fn write_to(&self, match_predicate: &str, sink: &mut dyn Write) -> io::Result<()> {
        writeln!(sink)?;
        match &self.right {
            Some(right) => {
                writeln!(sink, "# Matched with a score of {}", self.score)?;
                writeln!(sink, "<{}> <{}> <{}> .", self.left, match_predicate, right)
            }
            None => writeln!(sink, "# Could not match {}", self.left),
        }
    }
}

/// Lower-cases `value` only if it is non-empty and entirely alphabetic.
///
/// Values containing spaces, digits or punctuation keep their case.
#[must_use]
pub fn fold_if_alphabetic(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && value.chars().all(char::is_alphabetic) {
        Cow::Owned(value.to_lowercase())
    } else {
        Cow::Borrowed(value)
    }
}

/// Two resolved datasets plus the comparator specs that link them.
#[derive(Debug, Clone)]
pub struct Matcher {
    left: Dataset,
    right: Dataset,
    comparators: Vec<ComparatorSpec>,
}

impl Matcher {
    /// Builds a matcher.
    ///
    /// Each side's predicate set is the union of the fields its specs read.
    /// A side without an explicit record query gets one synthesized from
    /// those predicates.
    ///
    /// # Errors
    /// Returns a validation error if there are no comparator specs or a
    /// weight is not finite.
    pub fn new(
        left: &DatasetDefinition,
        right: &DatasetDefinition,
        comparators: Vec<ComparatorSpec>,
    ) -> LinkResult<Self> {
        if comparators.is_empty() {
            return Err(ValidationError::NoComparators.into());
        }
        for spec in &comparators {
            spec.validate()?;
        }

        let left_predicates: BTreeSet<String> =
            comparators.iter().map(|s| s.field_a.clone()).collect();
        let right_predicates: BTreeSet<String> =
            comparators.iter().map(|s| s.field_b.clone()).collect();

        Ok(Self {
            left: left.resolve(left_predicates),
            right: right.resolve(right_predicates),
            comparators,
        })
    }

    /// Left-hand dataset, resolved.
    #[must_use]
    pub const fn left(&self) -> &Dataset {
        &self.left
    }

    /// Right-hand dataset, resolved.
    #[must_use]
    pub const fn right(&self) -> &Dataset {
        &self.right
    }

    /// Comparator specs in configured order.
    #[must_use]
    pub fn comparators(&self) -> &[ComparatorSpec] {
        &self.comparators
    }

    /// Aggregate weighted score of one record pair.
    ///
    /// A field absent from either record contributes nothing.
    ///
    /// # Errors
    /// Returns `ComparatorError` if a comparator fails or yields a
    /// non-finite score.
    pub fn score_pair(
        &self,
        left: &DecodedRecord,
        right: &DecodedRecord,
    ) -> Result<f64, ComparatorError> {
        let mut total = 0.0;

        for spec in &self.comparators {
            let (Some(a), Some(b)) = (left.get(&spec.field_a), right.get(&spec.field_b)) else {
                continue;
            };

            let a = fold_if_alphabetic(a);
            let b = fold_if_alphabetic(b);
            let score = spec.comparator.compare(&a, &b)?;
            if !score.is_finite() {
                return Err(ComparatorError::new(
                    spec.comparator.name(),
                    format!("non-finite score for '{a}' vs '{b}'"),
                ));
            }

            total += score * spec.weight;
        }

        Ok(total)
    }

    /// Finds the best right-hand record for every left-hand entity.
    ///
    /// Each outcome is written to `sink` as soon as it is decided, so output
    /// already written stays valid if a later comparison fails.
    ///
    /// # Errors
    /// Stops at the first comparator failure or write failure.
    pub fn match_entities(
        &self,
        left: &[EntityRecords],
        right: &[DecodedRecord],
        match_predicate: &str,
        sink: &mut dyn Write,
    ) -> LinkResult<Vec<MatchOutcome>> {
        let mut outcomes = Vec::with_capacity(left.len());

        for entity in left {
            let mut best: Option<&str> = None;
            let mut max_score = 0.0;

            for record in &entity.records {
                for candidate in right {
                    let score = self.score_pair(record, candidate)?;
                    if score > 0.0 && score >= max_score {
                        max_score = score;
                        best = Some(candidate.entity_id.as_str());
                    }
                }
            }

            let outcome = MatchOutcome {
                left: entity.entity_id.clone(),
                right: best.map(str::to_string),
                score: max_score,
            };
            tracing::debug!(
                left = %outcome.left,
                right = ?outcome.right,
                score = outcome.score,
                "entity decided"
            );

            outcome
                .write_to(match_predicate, sink)
                .map_err(LinkError::Output)?;
            outcomes.push(outcome);
        }

        sink.flush().map_err(LinkError::Output)?;
        Ok(outcomes)
    }
}

/// Everything needed for one linkage run.
#[derive(Debug, Clone)]
pub struct LinkJob {
    /// Dataset whose entities are matched.
    pub left: DatasetDefinition,
    /// Dataset searched for candidates.
    pub right: DatasetDefinition,
    /// Weighted comparators summed into a pair score.
    pub comparators: Vec<ComparatorSpec>,
    /// Predicate written between matched entities.
    pub match_predicate: String,
    /// Paging, retry and cache settings.
    pub fetch: FetchConfig,
    /// Stops in-flight fetches.
    pub cancel: Cancellation,
}

impl LinkJob {
    /// Creates a job with the default match predicate and fetch settings.
    #[must_use]
    pub fn new(
        left: DatasetDefinition,
        right: DatasetDefinition,
        comparators: Vec<ComparatorSpec>,
    ) -> Self {
        Self {
            left,
            right,
            comparators,
            match_predicate: DEFAULT_MATCH_PREDICATE.to_string(),
            fetch: FetchConfig::default(),
            cancel: Cancellation::new(),
        }
    }

    /// Overrides the predicate written in match assertions.
    #[must_use]
    pub fn with_match_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.match_predicate = predicate.into();
        self
    }

    /// Replaces the fetch settings used for both datasets.
    #[must_use]
    pub fn with_fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Uses `cancel` to stop the run while fetching.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Runs a linkage job end to end.
///
/// Populates (or reuses) both caches, decodes both sides, then matches every
/// left-hand entity, streaming each outcome to `sink`.
///
/// # Errors
/// - `LinkError::Validation` for an invalid job or fetch config
/// - `FetchError::StoreNotFound` if a dataset's store is not registered
/// - any fetch, cache, decode, comparator or output failure
pub fn run_matcher(
    job: &LinkJob,
    stores: &dyn StoreResolver,
    sink: &mut dyn Write,
) -> LinkResult<Vec<MatchOutcome>> {
    let config = job.fetch.clone().validate()?;
    let matcher = Matcher::new(&job.left, &job.right, job.comparators.clone())?;

    // Each cache is released before the next is opened; both sides may share one.
    let left = load_side(matcher.left(), stores, &config, &job.cancel)?;
    let right: Vec<DecodedRecord> = load_side(matcher.right(), stores, &config, &job.cancel)?
        .into_iter()
        .flat_map(|entity| entity.records)
        .collect();

    tracing::info!(
        left_entities = left.len(),
        right_records = right.len(),
        comparators = matcher.comparators().len(),
        "matching"
    );

    let outcomes = matcher.match_entities(&left, &right, &job.match_predicate, sink)?;

    tracing::info!(
        matched = outcomes.iter().filter(|o| o.is_match()).count(),
        unmatched = outcomes.iter().filter(|o| !o.is_match()).count(),
        "matching complete"
    );
    Ok(outcomes)
}

fn load_side(
    dataset: &Dataset,
    stores: &dyn StoreResolver,
    config: &FetchConfig,
    cancel: &Cancellation,
) -> LinkResult<Vec<EntityRecords>> {
    let store_ref = dataset.definition().store_ref();
    let store = stores
        .resolve(store_ref)
        .ok_or_else(|| FetchError::StoreNotFound {
            store_ref: store_ref.to_string(),
        })?;

    let (cache, report) = DatasetFetcher::new(store, config)
        .with_cancellation(cancel.clone())
        .populate(dataset)?;
    tracing::debug!(?report, "dataset ready");

    RecordDecoder::for_dataset(dataset, NTriplesParser).decode_cache(&cache)
}
