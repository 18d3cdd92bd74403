//! # datalink - Record linkage between two queryable datasets
//!
//! datalink finds records in two independently populated data sources that
//! describe the same real-world entity and emits ranked `sameAs` assertions.
//!
//! ## Pipeline
//!
//! - **DatasetFetcher**: pages through a remote store with an adaptive batch
//!   size and fetches every entity's record, retrying failed queries
//! - **RecordCache**: durable per-dataset cache that makes fetching idempotent
//!   and resumable
//! - **RecordDecoder**: expands multi-valued attributes into single-valued
//!   records (cartesian product)
//! - **Matcher**: scores every cross pair with weighted field comparators and
//!   keeps the best match per left-hand entity
//!
//! ## Usage
//!
//! ```rust,ignore
//! use datalink::{presets, run_matcher, FetchConfig, RecordStore};
//! use std::collections::HashMap;
//!
//! let mut stores: HashMap<String, Box<dyn RecordStore>> = HashMap::new();
//! stores.insert("space".into(), Box::new(space_client));
//! stores.insert("dbpedia".into(), Box::new(dbpedia_client));
//!
//! let job = presets::astronauts()?.with_fetch_config(FetchConfig::with_cache_dir("cache"));
//! let outcomes = run_matcher(&job, &stores, &mut std::io::stdout())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod comparator;
pub mod config;
pub mod dataset;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod matcher;
pub mod presets;
pub mod store;

pub use cache::{CacheMode, CacheState, RecordCache};
pub use comparator::{ComparatorSpec, ContainsString, ExactString, FieldComparator, Jaro};
pub use config::FetchConfig;
pub use dataset::{Dataset, DatasetDefinition, DatasetIdentity};
pub use decode::{DecodedRecord, EntityRecords, RecordDecoder};
pub use error::{
    ComparatorError, DecodeError, FetchError, LinkError, LinkResult, ValidationError,
};
pub use fetch::{BatchSizer, Cancellation, DatasetFetcher, FetchReport};
pub use graph::{GraphParser, NTriplesParser, TripleGraph};
pub use matcher::{run_matcher, LinkJob, MatchOutcome, Matcher, DEFAULT_MATCH_PREDICATE};
pub use store::{RecordStore, SelectResult, StoreResolver, StoreResponse, TransportFailure};
