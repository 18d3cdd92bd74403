//! Dataset definitions and the queries derived from them.
//!
//! A [`DatasetDefinition`] names one side of a linkage job: which store to
//! query, how to enumerate its entities, and optionally how to fetch each one.
//! A [`Dataset`] is a definition resolved against the predicates a matcher
//! needs, with a concrete record query and a stable cache identity.

use std::collections::BTreeSet;
use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Placeholder substituted with the entity URI in record queries.
pub const RESOURCE_VARIABLE: &str = "?resource";

/// Bumped whenever the cache layout or the query templates change shape.
const IDENTITY_VERSION: &str = "datalink-cache-v1";

/// One side of a linkage job, as configured by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    store_ref: String,
    selection_pattern: String,
    record_query: Option<String>,
    optional_predicates: BTreeSet<String>,
    fingerprint: Option<String>,
}

impl DatasetDefinition {
    /// Creates a definition from a store reference and a selection pattern.
    ///
    /// The selection pattern is a graph pattern binding `?resource`, e.g.
    /// `?resource a <http://xmlns.com/foaf/0.1/Person>`.
    ///
    /// # Errors
    /// Returns an error if either argument is blank.
    pub fn new(
        store_ref: impl Into<String>,
        selection_pattern: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let store_ref = store_ref.into();
        let selection_pattern = selection_pattern.into();

        if store_ref.trim().is_empty() {
            return Err(ValidationError::EmptyStoreRef);
        }
        if selection_pattern.trim().is_empty() {
            return Err(ValidationError::EmptySelectionPattern);
        }

        Ok(Self {
            store_ref,
            selection_pattern,
            record_query: None,
            optional_predicates: BTreeSet::new(),
            fingerprint: None,
        })
    }

    /// Sets an explicit record query template containing `?resource`.
    #[must_use]
    pub fn with_record_query(mut self, query: impl Into<String>) -> Self {
        self.record_query = Some(query.into());
        self
    }

    /// Marks a predicate as optional for cartesian expansion.
    ///
    /// An entity without a value for an optional predicate still decodes;
    /// the predicate is simply absent from its attribute map.
    #[must_use]
    pub fn with_optional_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.optional_predicates.insert(predicate.into());
        self
    }

    /// Mixes a caller-chosen version string into the cache identity.
    ///
    /// Changing the fingerprint makes the next run fetch into a fresh cache.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Returns the store reference.
    #[must_use]
    pub fn store_ref(&self) -> &str {
        &self.store_ref
    }

    /// Returns the selection pattern.
    #[must_use]
    pub fn selection_pattern(&self) -> &str {
        &self.selection_pattern
    }

    /// Returns the explicit record query, if one was configured.
    #[must_use]
    pub fn record_query(&self) -> Option<&str> {
        self.record_query.as_deref()
    }

    /// Returns the predicates that may be missing without dropping an entity.
    #[must_use]
    pub fn optional_predicates(&self) -> &BTreeSet<String> {
        &self.optional_predicates
    }

    /// Resolves this definition against the predicates a matcher compares.
    #[must_use]
    pub fn resolve(&self, predicates: BTreeSet<String>) -> Dataset {
        let record_query = self
            .record_query
            .clone()
            .unwrap_or_else(|| build_record_query(&predicates));
        let identity = DatasetIdentity::derive(
            &self.store_ref,
            &self.selection_pattern,
            &record_query,
            self.fingerprint.as_deref(),
        );

        Dataset {
            definition: self.clone(),
            predicates,
            record_query,
            identity,
        }
    }
}

/// A definition resolved to concrete queries and a cache identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    definition: DatasetDefinition,
    predicates: BTreeSet<String>,
    record_query: String,
    identity: DatasetIdentity,
}

impl Dataset {
    /// Returns the definition this dataset was resolved from.
    #[must_use]
    pub fn definition(&self) -> &DatasetDefinition {
        &self.definition
    }

    /// Returns the predicates the decoder projects, in sorted order.
    #[must_use]
    pub fn predicates(&self) -> &BTreeSet<String> {
        &self.predicates
    }

    /// Returns the record query template (explicit or synthesized).
    #[must_use]
    pub fn record_query(&self) -> &str {
        &self.record_query
    }

    /// Returns the cache identity.
    #[must_use]
    pub fn identity(&self) -> &DatasetIdentity {
        &self.identity
    }

    /// Renders the selection query for one page.
    #[must_use]
    pub fn selection_query(&self, limit: usize, offset: usize) -> String {
        format!(
            "select {RESOURCE_VARIABLE} {{{}}} limit {limit} offset {offset}",
            self.definition.selection_pattern
        )
    }

    /// Renders the detail query for one entity.
    #[must_use]
    pub fn detail_query(&self, resource: &str) -> String {
        self.record_query
            .replace(RESOURCE_VARIABLE, &format!("<{resource}>"))
    }
}

/// Synthesizes a `construct` query projecting every predicate as optional.
///
/// Each predicate gets its own `optional` clause so an entity lacking some
/// predicates still returns the ones it has.
#[must_use]
pub fn build_record_query(predicates: &BTreeSet<String>) -> String {
    let mut patterns = Vec::with_capacity(predicates.len());
    let mut optionals = Vec::with_capacity(predicates.len());

    for (index, predicate) in predicates.iter().enumerate() {
        optionals.push(format!(
            "optional {{{RESOURCE_VARIABLE} <{predicate}> ?v{index} .}}"
        ));
        patterns.push(format!("<{predicate}> ?v{index}"));
    }

    format!(
        "construct {{{RESOURCE_VARIABLE} {} .}} {{ {} }}",
        patterns.join(" ; "),
        optionals.join(" ")
    )
}

/// Stable identity of a dataset's cache.
///
/// Derived with blake3 so it is identical across processes and platforms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetIdentity {
    store_ref: String,
    digest: String,
}

impl DatasetIdentity {
    fn derive(
        store_ref: &str,
        selection_pattern: &str,
        record_query: &str,
        fingerprint: Option<&str>,
    ) -> Self {
        let mut h = Hasher::new();
        for part in [
            IDENTITY_VERSION,
            store_ref,
            selection_pattern,
            record_query,
            fingerprint.unwrap_or(""),
        ] {
            h.update(part.as_bytes());
            h.update(b"\t");
        }

        Self {
            store_ref: store_ref.to_string(),
            digest: h.finalize().to_hex().to_string(),
        }
    }

    /// Returns the full hex digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// File stem used for the cache files of this dataset.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let store: String = self
            .store_ref
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{store}_{}", &self.digest[..16])
    }
}

impl fmt::Display for DatasetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "http://xmlns.com/foaf/0.1/name";
    const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

    fn predicates() -> BTreeSet<String> {
        [NAME, LABEL].iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn test_rejects_blank_fields() {
        assert!(matches!(
            DatasetDefinition::new(" ", "?resource a <x>"),
            Err(ValidationError::EmptyStoreRef)
        ));
        assert!(matches!(
            DatasetDefinition::new("space", ""),
            Err(ValidationError::EmptySelectionPattern)
        ));
    }

    #[test]
    fn test_build_record_query() {
        let query = build_record_query(&predicates());
        assert_eq!(
            query,
            "construct {?resource <http://www.w3.org/2000/01/rdf-schema#label> ?v0 ; \
             <http://xmlns.com/foaf/0.1/name> ?v1 .} { \
             optional {?resource <http://www.w3.org/2000/01/rdf-schema#label> ?v0 .} \
             optional {?resource <http://xmlns.com/foaf/0.1/name> ?v1 .} }"
        );
    }

    #[test]
    fn test_explicit_record_query_wins() {
        let def = DatasetDefinition::new("space", "?resource a <x>")
            .unwrap()
            .with_record_query("describe ?resource");
        let ds = def.resolve(predicates());
        assert_eq!(ds.record_query(), "describe ?resource");
        assert_eq!(
            ds.detail_query("http://example.org/a1"),
            "describe <http://example.org/a1>"
        );
    }

    #[test]
    fn test_selection_query() {
        let ds = DatasetDefinition::new("space", "?resource a <http://example.org/T>")
            .unwrap()
            .resolve(predicates());
        assert_eq!(
            ds.selection_query(2000, 4000),
            "select ?resource {?resource a <http://example.org/T>} limit 2000 offset 4000"
        );
    }

    #[test]
    fn test_identity_is_stable_and_sensitive() {
        let def = DatasetDefinition::new("space", "?resource a <x>").unwrap();
        let a = def.resolve(predicates());
        let b = def.resolve(predicates());
        assert_eq!(a.identity(), b.identity());

        let other_pattern = DatasetDefinition::new("space", "?resource a <y>")
            .unwrap()
            .resolve(predicates());
        assert_ne!(a.identity(), other_pattern.identity());

        let fingerprinted = def.clone().with_fingerprint("2024-01").resolve(predicates());
        assert_ne!(a.identity(), fingerprinted.identity());
    }

    #[test]
    fn test_file_stem_is_path_safe() {
        let ds = DatasetDefinition::new("http://dbpedia.org/sparql", "?resource a <x>")
            .unwrap()
            .resolve(predicates());
        let stem = ds.identity().file_stem();
        assert!(stem.starts_with("http___dbpedia_org_sparql_"));
        assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }
}
