//! Durable key → payload store for one dataset.
//!
//! # File Layout
//! ```text
//! <stem>.partial   fetch in progress (append-only log)
//! <stem>.cache     completed fetch (read-only)
//! <stem>.lock      advisory lock held while either is open
//! ```
//!
//! Both data files share one format:
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: framed CacheEntry]
//! [ENTRY 2: framed CacheEntry]
//! ...
//! ```
//!
//! A completed fetch is committed by renaming `.partial` to `.cache`, so the
//! existence of a `.cache` file means the fetch ran to the end.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{
    BufReader, BufWriter, ErrorKind, Read, Result as IoResult, Seek, SeekFrom, Write,
};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::DatasetIdentity;

use super::codec;
use super::file_lock::FileLock;

/// How a cache is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Start a fresh partial cache, discarding any earlier partial file.
    Create,
    /// Resume a partial cache left behind by an interrupted fetch.
    Append,
    /// Open a completed cache; writes are rejected.
    Read,
}

/// What exists on disk for a dataset identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing cached yet.
    Missing,
    /// An interrupted fetch left a partial file.
    Partial,
    /// A committed cache exists.
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    payload: String,
}

/// On-disk record cache keyed by entity identifier.
///
/// Keys are kept in first-insertion order; payloads stay on disk and are read
/// back lazily by [`RecordCache::iter`].
#[derive(Debug)]
pub struct RecordCache {
    dir: PathBuf,
    stem: String,
    mode: CacheMode,
    _lock: FileLock,
    writer: Option<BufWriter<File>>,
    end_offset: u64,
    offsets: HashMap<String, u64>,
    order: Vec<String>,
}

impl RecordCache {
    /// Path of the completed cache file.
    #[must_use]
    pub fn complete_path(dir: &Path, identity: &DatasetIdentity) -> PathBuf {
        dir.join(format!("{}.cache", identity.file_stem()))
    }

    /// Path of the in-progress cache file.
    #[must_use]
    pub fn partial_path(dir: &Path, identity: &DatasetIdentity) -> PathBuf {
        dir.join(format!("{}.partial", identity.file_stem()))
    }

    fn lock_path(dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}.lock"))
    }

    /// Reports whether a completed or partial cache exists.
    #[must_use]
    pub fn state(dir: &Path, identity: &DatasetIdentity) -> CacheState {
        if Self::complete_path(dir, identity).is_file() {
            CacheState::Complete
        } else if Self::partial_path(dir, identity).is_file() {
            CacheState::Partial
        } else {
            CacheState::Missing
        }
    }

    /// Deletes the completed and partial files for an identity.
    ///
    /// # Errors
    /// `ErrorKind::WouldBlock` if the cache is open elsewhere, or any I/O
    /// failure other than a missing file.
    pub fn remove(dir: &Path, identity: &DatasetIdentity) -> IoResult<()> {
        fs::create_dir_all(dir)?;
        let _lock = FileLock::acquire(&Self::lock_path(dir, &identity.file_stem()))?;
        for path in [Self::complete_path(dir, identity), Self::partial_path(dir, identity)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Opens the cache for `identity` under `dir`.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` if another process has the cache open
    /// - `ErrorKind::NotFound` for `Read`/`Append` when the file is missing
    /// - `ErrorKind::InvalidData` if the file is corrupted
    pub fn open(dir: &Path, identity: &DatasetIdentity, mode: CacheMode) -> IoResult<Self> {
        fs::create_dir_all(dir)?;

        let stem = identity.file_stem();
        let lock = FileLock::acquire(&Self::lock_path(dir, &stem))?;

        let mut cache = Self {
            dir: dir.to_path_buf(),
            stem,
            mode,
            _lock: lock,
            writer: None,
            end_offset: codec::HEADER_LEN,
            offsets: HashMap::new(),
            order: Vec::new(),
        };

        match mode {
            CacheMode::Create => {
                let mut file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(cache.path())?;
                codec::write_header(&mut file)?;
                cache.writer = Some(BufWriter::new(file));
            }
            CacheMode::Append => {
                let valid_end = cache.load_index()?;
                let file = OpenOptions::new().write(true).open(cache.path())?;
                if file.metadata()?.len() > valid_end {
                    tracing::warn!(
                        cache = %cache.path().display(),
                        valid_end,
                        "dropping torn entry at end of partial cache"
                    );
                    file.set_len(valid_end)?;
                }
                let mut file = file;
                file.seek(SeekFrom::End(0))?;
                cache.writer = Some(BufWriter::new(file));
            }
            CacheMode::Read => {
                cache.load_index()?;
            }
        }

        Ok(cache)
    }

    /// Path of the file currently backing this cache.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        match self.mode {
            CacheMode::Read => self.dir.join(format!("{}.cache", self.stem)),
            CacheMode::Create | CacheMode::Append => self.dir.join(format!("{}.partial", self.stem)),
        }
    }

    /// Returns the mode the cache is open in.
    #[must_use]
    pub const fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no records are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns true if a payload is cached for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.offsets.contains_key(key)
    }

    /// Keys in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Appends a payload. A repeated key replaces the earlier payload but keeps
    /// its original position in iteration order.
    ///
    /// # Errors
    /// `ErrorKind::PermissionDenied` in `Read` mode, or any write failure.
    pub fn put(&mut self, key: &str, payload: &str) -> IoResult<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(ErrorKind::PermissionDenied, "record cache is read-only")
        })?;

        let frame = codec::encode(&CacheEntry {
            key: key.to_string(),
            payload: payload.to_string(),
        })?;
        writer.write_all(&frame)?;
        writer.flush()?;

        let offset = self.end_offset;
        self.end_offset += frame.len() as u64;
        if self.offsets.insert(key.to_string(), offset).is_none() {
            self.order.push(key.to_string());
        }

        Ok(())
    }

    /// Lazily iterates `(key, payload)` pairs in first-insertion order.
    ///
    /// # Errors
    /// Any failure opening the backing file. Each item also carries the
    /// read or decode error for its own entry.
    pub fn iter(&self) -> IoResult<CacheIter<'_>> {
        let file = File::open(self.path())?;
        Ok(CacheIter {
            cache: self,
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Marks the fetch complete: flushes, optionally fsyncs, and renames the
    /// partial file into place. The returned cache is read-only.
    ///
    /// This is the commit point; after it returns the cache is reused as-is
    /// by every later run for the same identity.
    ///
    /// # Errors
    /// Any flush, fsync or rename failure; the partial file is left in place.
    pub fn commit(mut self, sync: bool) -> IoResult<Self> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            if sync {
                writer.get_ref().sync_all()?;
            }
        } else {
            return Ok(self);
        }

        let from = self.path();
        self.mode = CacheMode::Read;
        fs::rename(&from, self.path())?;

        Ok(self)
    }

    /// Scans the file and rebuilds the key index. Returns the offset just past
    /// the last complete entry.
    fn load_index(&mut self) -> IoResult<u64> {
        let file = File::open(self.path())?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader)?;

        let mut valid_end = codec::HEADER_LEN;
        while valid_end < file_size {
            match codec::decode::<CacheEntry>(&mut reader) {
                Ok(entry) => {
                    if self.offsets.insert(entry.key.clone(), valid_end).is_none() {
                        self.order.push(entry.key);
                    }
                    valid_end = reader.stream_position()?;
                }
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    self.check_torn_tail(&mut reader, valid_end)?;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        self.end_offset = valid_end;
        Ok(valid_end)
    }

    /// Accepts a short read at `valid_end` only as the torn tail of a partial
    /// cache: nothing intact may follow it, and committed caches have none.
    fn check_torn_tail(&self, reader: &mut BufReader<File>, valid_end: u64) -> IoResult<()> {
        let corrupt = |what: &str| {
            std::io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "{what} at offset {valid_end} in cache {}",
                    self.path().display()
                ),
            )
        };

        if self.mode == CacheMode::Read {
            return Err(corrupt("incomplete entry"));
        }

        let mut rest = Vec::new();
        reader.seek(SeekFrom::Start(valid_end))?;
        reader.read_to_end(&mut rest)?;
        if codec::contains_frame(&rest) {
            return Err(corrupt("corrupted entry"));
        }
        Ok(())
    }
}

/// Lazy iterator over cached records.
pub struct CacheIter<'a> {
    cache: &'a RecordCache,
    reader: BufReader<File>,
    position: usize,
}

impl Iterator for CacheIter<'_> {
    type Item = IoResult<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cache.order.get(self.position)?;
        self.position += 1;

        let offset = self.cache.offsets[key];
        let entry = self
            .reader
            .seek(SeekFrom::Start(offset))
            .and_then(|_| codec::decode::<CacheEntry>(&mut self.reader));

        Some(entry.map(|e| (e.key, e.payload)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.cache.order.len() - self.position;
        (remaining, Some(remaining))
    }
}
