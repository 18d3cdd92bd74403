//! In-memory record store shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use regex::Regex;

use datalink::{
    FetchConfig, RecordStore, SelectResult, StoreResolver, StoreResponse, TransportFailure,
};

pub const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const PERSON_PATTERN: &str = "?resource a <http://xmlns.com/foaf/0.1/Person>";

/// Serves a fixed list of entities, paging selections by `limit`/`offset`.
pub struct FakeStore {
    entities: Vec<(String, String)>,
    max_page: Option<usize>,
    broken: HashSet<String>,
    page_re: Regex,
    pub select_calls: Cell<usize>,
    pub detail_calls: Cell<usize>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            max_page: None,
            broken: HashSet::new(),
            page_re: Regex::new(r"limit (\d+) offset (\d+)").unwrap(),
            select_calls: Cell::new(0),
            detail_calls: Cell::new(0),
        }
    }

    /// Adds an entity with the given `(predicate, literal)` pairs.
    pub fn entity(mut self, id: &str, values: &[(&str, &str)]) -> Self {
        let payload = values
            .iter()
            .map(|(p, v)| format!("<{id}> <{p}> \"{v}\" .\n"))
            .collect();
        self.entities.push((id.to_string(), payload));
        self
    }

    /// Adds `n` entities named `<prefix><i>` with a `foaf:name` each.
    pub fn numbered(mut self, prefix: &str, n: usize) -> Self {
        for i in 0..n {
            let id = format!("{prefix}{i}");
            self = self.entity(&id, &[(FOAF_NAME, &format!("person {i}"))]);
        }
        self
    }

    /// Rejects selections asking for more than `max` rows.
    pub fn with_max_page(mut self, max: usize) -> Self {
        self.max_page = Some(max);
        self
    }

    /// Makes every detail query for `id` fail.
    pub fn with_broken(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }

    pub fn ids(&self) -> Vec<String> {
        self.entities.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn remote_calls(&self) -> usize {
        self.select_calls.get() + self.detail_calls.get()
    }
}

impl RecordStore for FakeStore {
    fn select(&self, query: &str) -> Result<StoreResponse<SelectResult>, TransportFailure> {
        self.select_calls.set(self.select_calls.get() + 1);

        let caps = self
            .page_re
            .captures(query)
            .ok_or_else(|| TransportFailure(format!("unexpected selection: {query}")))?;
        let limit: usize = caps[1].parse().unwrap();
        let offset: usize = caps[2].parse().unwrap();

        if self.max_page.is_some_and(|max| limit > max) {
            return Ok(StoreResponse {
                status: 500,
                body: SelectResult::default(),
            });
        }

        let page = self
            .entities
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(id, _)| id.clone());
        Ok(StoreResponse::ok(SelectResult::from_resources(page)))
    }

    fn fetch_detail(&self, query: &str) -> Result<StoreResponse<String>, TransportFailure> {
        self.detail_calls.set(self.detail_calls.get() + 1);

        let (id, payload) = self
            .entities
            .iter()
            .find(|(id, _)| query.contains(&format!("<{id}>")))
            .ok_or_else(|| TransportFailure(format!("unknown entity in: {query}")))?;

        if self.broken.contains(id) {
            return Ok(StoreResponse {
                status: 503,
                body: String::new(),
            });
        }
        Ok(StoreResponse::ok(payload.clone()))
    }
}

/// Resolves store references to borrowed fakes.
pub struct Registry<'a>(pub Vec<(&'static str, &'a FakeStore)>);

impl StoreResolver for Registry<'_> {
    fn resolve(&self, store_ref: &str) -> Option<&dyn RecordStore> {
        self.0
            .iter()
            .find(|(name, _)| *name == store_ref)
            .map(|(_, store)| *store as &dyn RecordStore)
    }
}

/// Fast-retrying config rooted at `dir`.
pub fn test_config(dir: &Path) -> FetchConfig {
    FetchConfig {
        detail_retry_delay: Duration::from_millis(1),
        sync_on_commit: false,
        ..FetchConfig::with_cache_dir(dir)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
