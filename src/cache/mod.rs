//! Local durable cache of fetched entity records.
//!
//! One cache per dataset identity, persisted across runs:
//! - Append-only log of CRC-framed entries
//! - Exclusive file lock for single-process access
//! - Atomic rename as the completion marker
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 RecordCache                   │
//! ├──────────────────────────────────────────────┤
//! │  key index (memory)   ──►  <stem>.partial     │
//! │                             │ commit (rename) │
//! │                             ▼                 │
//! │                            <stem>.cache       │
//! │  FileLock ──► <stem>.lock                     │
//! └──────────────────────────────────────────────┘
//! ```

mod codec;
mod file_lock;
mod record_cache;

pub use file_lock::FileLock;
pub use record_cache::{CacheIter, CacheMode, CacheState, RecordCache};
