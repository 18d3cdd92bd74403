//! Remote record store capability.
//!
//! The wire protocol used to reach a store is not part of this crate: callers
//! implement [`RecordStore`] for their client (SPARQL over HTTP, a local
//! triple store, a test fake) and hand it to the fetcher.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Column holding entity identifiers in selection results.
pub const RESOURCE_COLUMN: &str = "resource";

/// Status and body of a store call. Status codes follow HTTP semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse<T> {
    /// HTTP-style status code.
    pub status: u16,
    /// Decoded response body.
    pub body: T,
}

impl<T> StoreResponse<T> {
    /// A 200 response.
    #[must_use]
    pub fn ok(body: T) -> Self {
        Self { status: 200, body }
    }

    /// Returns true for any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Tabular result of a selection query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectResult {
    /// Variable names, in projection order.
    pub header: Vec<String>,
    /// One binding map per row.
    pub rows: Vec<HashMap<String, String>>,
}

impl SelectResult {
    /// Builds a single-column `resource` result from identifiers.
    #[must_use]
    pub fn from_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: vec![RESOURCE_COLUMN.to_string()],
            rows: resources
                .into_iter()
                .map(|r| HashMap::from([(RESOURCE_COLUMN.to_string(), r.into())]))
                .collect(),
        }
    }

    /// Number of rows returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates the `resource` binding of each row, skipping unbound rows.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(RESOURCE_COLUMN).map(String::as_str))
    }
}

/// Transport-level failure: the call never produced a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure(pub String);

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TransportFailure {}

/// A remote source that answers selection and per-entity detail queries.
///
/// Both a transport failure and a non-2xx status count as a failed attempt;
/// the fetcher decides whether and how to retry.
pub trait RecordStore {
    /// Runs a selection query returning entity identifiers.
    fn select(&self, query: &str) -> Result<StoreResponse<SelectResult>, TransportFailure>;

    /// Runs a detail query returning the raw serialized record.
    fn fetch_detail(&self, query: &str) -> Result<StoreResponse<String>, TransportFailure>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn select(&self, query: &str) -> Result<StoreResponse<SelectResult>, TransportFailure> {
        (**self).select(query)
    }

    fn fetch_detail(&self, query: &str) -> Result<StoreResponse<String>, TransportFailure> {
        (**self).fetch_detail(query)
    }
}

/// Maps a dataset's store reference to a store instance.
pub trait StoreResolver {
    /// Returns the store registered under `store_ref`.
    fn resolve(&self, store_ref: &str) -> Option<&dyn RecordStore>;
}

impl StoreResolver for HashMap<String, Box<dyn RecordStore>> {
    fn resolve(&self, store_ref: &str) -> Option<&dyn RecordStore> {
        self.get(store_ref).map(|s| s.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure traits are object-safe
    fn _assert_record_store_object_safe(_: &dyn RecordStore) {}
    fn _assert_store_resolver_object_safe(_: &dyn StoreResolver) {}

    #[test]
    fn test_success_range() {
        assert!(StoreResponse::ok(()).is_success());
        assert!(StoreResponse { status: 204, body: () }.is_success());
        assert!(!StoreResponse { status: 199, body: () }.is_success());
        assert!(!StoreResponse { status: 300, body: () }.is_success());
        assert!(!StoreResponse { status: 503, body: () }.is_success());
    }

    #[test]
    fn test_resources_skips_unbound_rows() {
        let mut result = SelectResult::from_resources(["http://example.org/a", "http://example.org/b"]);
        result.rows.push(HashMap::from([("other".to_string(), "x".to_string())]));

        assert_eq!(result.len(), 3);
        let resources: Vec<_> = result.resources().collect();
        assert_eq!(resources, vec!["http://example.org/a", "http://example.org/b"]);
    }
}
