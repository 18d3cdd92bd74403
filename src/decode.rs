//! Decoding cached payloads into flat comparison records.
//!
//! Each entity may carry several values per predicate. The decoder expands
//! them into every one-value-per-predicate combination (the cartesian
//! product), so a comparator always sees single strings.
//!
//! Predicates are required unless the dataset marks them optional: a required
//! predicate with no values empties the product, so the entity yields no
//! records. The entity itself is still reported (with the missing predicates)
//! so the matcher can emit a "could not match" line for it.

use std::collections::{BTreeMap, BTreeSet};

use crate::cache::RecordCache;
use crate::dataset::Dataset;
use crate::error::{DecodeError, LinkError, LinkResult};
use crate::graph::GraphParser;

/// One flattened view of an entity: predicate → single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Subject the record was decoded for.
    pub entity_id: String,
    /// Lower-cased value per present predicate.
    pub attributes: BTreeMap<String, String>,
}

impl DecodedRecord {
    /// Value of `predicate`, if present.
    #[must_use]
    pub fn get(&self, predicate: &str) -> Option<&str> {
        self.attributes.get(predicate).map(String::as_str)
    }
}

/// All records decoded from one entity's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecords {
    /// Identifier the payload was cached under.
    pub entity_id: String,
    /// Permutations in product order (last predicate varies fastest).
    pub records: Vec<DecodedRecord>,
    /// Required predicates the entity had no value for.
    pub missing: Vec<String>,
}

/// Projects raw payloads onto a dataset's predicates.
#[derive(Debug, Clone)]
pub struct RecordDecoder<P> {
    predicates: Vec<String>,
    optional: BTreeSet<String>,
    parser: P,
}

impl<P: GraphParser> RecordDecoder<P> {
    /// Creates a decoder for explicit predicate sets.
    #[must_use]
    pub fn new(predicates: &BTreeSet<String>, optional: &BTreeSet<String>, parser: P) -> Self {
        Self {
            predicates: predicates.iter().cloned().collect(),
            optional: optional.clone(),
            parser,
        }
    }

    /// Creates a decoder for a resolved dataset.
    #[must_use]
    pub fn for_dataset(dataset: &Dataset, parser: P) -> Self {
        Self::new(
            dataset.predicates(),
            dataset.definition().optional_predicates(),
            parser,
        )
    }

    /// Decodes one entity's payload.
    ///
    /// # Errors
    /// Returns `DecodeError` if the payload does not parse.
    pub fn decode(&self, entity_id: &str, payload: &str) -> Result<EntityRecords, DecodeError> {
        let graph = self.parser.parse(payload)?;

        let mut slots: Vec<Vec<Option<String>>> = Vec::with_capacity(self.predicates.len());
        let mut missing = Vec::new();

        for predicate in &self.predicates {
            let values: Vec<Option<String>> = graph
                .objects(entity_id, predicate)
                .iter()
                .map(|v| Some(v.to_lowercase()))
                .collect();

            if values.is_empty() {
                if self.optional.contains(predicate) {
                    slots.push(vec![None]);
                    continue;
                }
                missing.push(predicate.clone());
            }
            slots.push(values);
        }

        let records = cartesian_product(&slots)
            .into_iter()
            .map(|combination| DecodedRecord {
                entity_id: entity_id.to_string(),
                attributes: self
                    .predicates
                    .iter()
                    .zip(combination)
                    .filter_map(|(p, v)| v.map(|v| (p.clone(), v)))
                    .collect(),
            })
            .collect();

        if !missing.is_empty() {
            tracing::debug!(
                entity = entity_id,
                missing = ?missing,
                "entity has no value for a required predicate; no records decoded"
            );
        }

        Ok(EntityRecords {
            entity_id: entity_id.to_string(),
            records,
            missing,
        })
    }

    /// Decodes every entity in a cache, in cache iteration order.
    ///
    /// # Errors
    /// Fails on the first cache read error or undecodable payload.
    pub fn decode_cache(&self, cache: &RecordCache) -> LinkResult<Vec<EntityRecords>> {
        let iter = cache
            .iter()
            .map_err(|e| LinkError::cache("failed to read cache", e))?;

        let mut out = Vec::with_capacity(cache.len());
        for entry in iter {
            let (entity_id, payload) =
                entry.map_err(|e| LinkError::cache("corrupted cache entry", e))?;
            out.push(self.decode(&entity_id, &payload)?);
        }

        Ok(out)
    }
}

/// Every combination taking one item from each list, in order.
///
/// The last list varies fastest. Any empty list makes the result empty; no
/// lists at all yields one empty combination.
#[must_use]
pub fn cartesian_product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
    let mut acc: Vec<Vec<T>> = vec![Vec::with_capacity(lists.len())];

    for list in lists {
        let mut next = Vec::with_capacity(acc.len() * list.len());
        for prefix in &acc {
            for item in list {
                let mut row = prefix.clone();
                row.push(item.clone());
                next.push(row);
            }
        }
        acc = next;
    }

    acc
}
