use crate::codec::CacheCodec;
use crate::error::{CacheError, Result};
use crate::io::{delete_entry, read_entry, write_entry};
use crate::metadata::{CacheMetadata, MetadataHeader};
use crate::util::{now_utc, remove_file_best_effort};
use indexmap::IndexMap;
use lru::LruCache;
use std::fs;
use std::hash::Hash;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::macros::datetime;
use time::OffsetDateTime;

pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

pub const DEFAULT_VERSION: i32 = -1;

pub const DEFAULT_INVALIDATE_AFTER: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

/// Lifecycle state of a [`CacheStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    /// Reusing a persisted cache that passed validation.
    Valid,
    /// The persisted cache was discarded; the caller is expected to re-add everything.
    Rebuilding,
}

/// A bounded, disk-backed map from `K` to `V`.
///
/// At most `capacity` values are materialized at a time. Adding or loading a
/// value into a full working set first writes the least recently used value to
/// its entry file and drops it from memory. Every key ever added also has a
/// summary in the *persistent index*, which stays resident regardless of
/// eviction and is saved to the directory's metadata file by
/// [`uninitialize`](Self::uninitialize).
pub struct CacheStore<K, V, C> {
    codec: C,
    directory: Option<PathBuf>,
    capacity: NonZeroUsize,
    version: i32,
    invalidate_after: OffsetDateTime,
    state: StoreState,
    working_set: LruCache<K, Arc<V>>,
    persistent_index: IndexMap<K, Option<String>>,
    dirty: bool,
}

impl<K, V, C> CacheStore<K, V, C>
where
    K: Clone + Eq + Hash,
    C: CacheCodec<K, V>,
{
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            directory: None,
            capacity: DEFAULT_CAPACITY,
            version: DEFAULT_VERSION,
            invalidate_after: DEFAULT_INVALIDATE_AFTER,
            state: StoreState::Uninitialized,
            // The bound is enforced by `evict_if_full` so that evicted values
            // are written out rather than silently dropped.
            working_set: LruCache::unbounded(),
            persistent_index: IndexMap::new(),
            dirty: false,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_invalidate_after(mut self, invalidate_after: OffsetDateTime) -> Self {
        self.invalidate_after = invalidate_after;
        self
    }

    /// Change the instant after which the persisted cache is considered stale.
    /// Takes effect on disk at the next metadata write.
    pub fn set_invalidate_after(&mut self, invalidate_after: OffsetDateTime) {
        if self.invalidate_after != invalidate_after {
            self.invalidate_after = invalidate_after;
            self.dirty = true;
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn invalidate_after(&self) -> OffsetDateTime {
        self.invalidate_after
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of materialized values.
    pub fn len(&self) -> usize {
        self.working_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.working_set.is_empty()
    }

    /// Whether `key` is currently materialized. Does not affect eviction order.
    pub fn contains(&self, key: &K) -> bool {
        self.working_set.contains(key)
    }

    /// Whether `key` has an entry in the persistent index.
    pub fn is_indexed(&self, key: &K) -> bool {
        self.persistent_index.contains_key(key)
    }

    /// The persisted summary of `key`, if it is indexed and has one.
    pub fn summary(&self, key: &K) -> Option<&str> {
        self.persistent_index.get(key).and_then(|summary| summary.as_deref())
    }

    /// Every indexed key, in the order it was first added.
    pub fn indexed_keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.persistent_index.keys()
    }

    pub fn index_len(&self) -> usize {
        self.persistent_index.len()
    }

    /// Materialized keys from most to least recently used.
    pub fn resident_keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.working_set.iter().map(|(key, _)| key)
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }

    /// Prepare the store for use.
    ///
    /// Returns `true` when the persisted cache in the directory was reused.
    /// Otherwise the directory is cleared, the store enters
    /// [`StoreState::Rebuilding`] and `false` is returned: a missing, outdated
    /// or expired cache is not an error.
    pub fn initialize(&mut self, use_existing: bool) -> Result<bool> {
        let dir = self.require_directory()?.to_path_buf();
        if self.state != StoreState::Uninitialized {
            self.empty_all()?;
        }

        if !use_existing {
            tracing::debug!(target: "nasr.cache", dir = %dir.display(), "existing cache not requested");
            self.invalidate();
            return Ok(false);
        }

        let now = now_utc();
        let header = match CacheMetadata::read_header(&dir)? {
            Some(header) if header.is_valid_for(self.version, now) => header,
            Some(header) => {
                self.log_rejected(&dir, &header, now);
                self.invalidate();
                return Ok(false);
            }
            None => {
                tracing::info!(target: "nasr.cache", dir = %dir.display(), "no usable cache metadata; rebuilding");
                self.invalidate();
                return Ok(false);
            }
        };

        let Some(metadata) = CacheMetadata::load(&dir)? else {
            self.invalidate();
            return Ok(false);
        };

        self.working_set.clear();
        if let Err(err) = self.restore_index(metadata.index) {
            self.persistent_index.clear();
            self.codec.clear_summaries();
            self.state = StoreState::Uninitialized;
            return Err(CacheError::MetadataLoadFailure {
                path: CacheMetadata::path(&dir),
                source: Box::new(err),
            });
        }

        self.invalidate_after = header.invalidate_after;
        self.state = StoreState::Valid;
        self.dirty = false;
        tracing::info!(
            target: "nasr.cache",
            dir = %dir.display(),
            entries = self.persistent_index.len(),
            "reusing persisted cache"
        );
        Ok(true)
    }

    /// Discard every persisted and in-memory entry and enter
    /// [`StoreState::Rebuilding`]. Materialized values are *not* written out.
    pub fn invalidate(&mut self) {
        if let Some(dir) = &self.directory {
            clear_directory(dir);
        }
        self.working_set.clear();
        self.persistent_index.clear();
        self.codec.clear_summaries();
        // An empty rebuilt cache still needs its metadata written.
        self.dirty = true;
        self.state = StoreState::Rebuilding;
    }

    /// Return the value for `key`, loading it from disk if it was evicted.
    /// The key becomes the most recently used.
    ///
    /// A miss on a full working set evicts the least recently used value
    /// before reading, even if the read then fails.
    pub fn get(&mut self, key: &K) -> Result<Arc<V>> {
        self.ensure_initialized()?;
        if let Some(value) = self.working_set.get(key) {
            return Ok(Arc::clone(value));
        }

        self.require_directory()?;
        self.evict_if_full()?;
        let value = Arc::new(read_entry(self.require_directory()?, &self.codec, key)?);
        self.working_set.put(key.clone(), Arc::clone(&value));
        Ok(value)
    }

    /// Make `value` the materialized value of `key` and record its summary.
    ///
    /// A full working set evicts its least recently used value first, even when
    /// `key` itself is already materialized.
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        self.ensure_initialized()?;
        self.require_directory()?;
        self.evict_if_full()?;

        let summary = self.codec.summarize(&value);
        self.record_summary(&key, summary)?;
        self.working_set.put(key, Arc::new(value));
        self.dirty = true;
        Ok(())
    }

    /// Drop `key` from memory, the persistent index and disk.
    ///
    /// A materialized value is discarded without being written.
    pub fn remove(&mut self, key: &K) -> Result<()> {
        self.ensure_initialized()?;
        let dir = self.require_directory()?.to_path_buf();

        let resident = self.working_set.pop(key).is_some();
        let indexed = self.persistent_index.shift_remove(key).is_some();
        if !resident && !indexed {
            return Err(CacheError::NonexistentEntry {
                key: self.codec.encode_key(key),
            });
        }

        if !delete_entry(&dir, &self.codec, key) {
            tracing::warn!(
                target: "nasr.cache",
                key = %self.codec.encode_key(key),
                "failed to delete cache entry file"
            );
        }
        self.codec.forget_summary(key);
        self.dirty = true;
        Ok(())
    }

    /// Write the materialized value of `key` to disk and drop it from memory.
    pub fn force_unload(&mut self, key: &K) -> Result<()> {
        self.ensure_initialized()?;
        let Some(value) = self.working_set.peek(key).map(Arc::clone) else {
            return Err(CacheError::NotMaterialized {
                key: self.codec.encode_key(key),
            });
        };

        write_entry(self.require_directory()?, &self.codec, key, value.as_ref())?;
        let summary = self.codec.summarize(&value);
        self.record_summary(key, summary)?;
        self.working_set.pop(key);
        Ok(())
    }

    /// Unload every materialized value, least recently used first.
    pub fn empty_all(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        while let Some(key) = self.working_set.peek_lru().map(|(key, _)| key.clone()) {
            self.force_unload(&key)?;
        }
        Ok(())
    }

    /// Write the metadata file now and mark the store clean.
    pub fn save_metadata(&mut self) -> Result<()> {
        let dir = self.require_directory()?;
        let metadata = CacheMetadata {
            header: MetadataHeader {
                version: self.version,
                invalidate_after: self.invalidate_after,
            },
            index: self
                .persistent_index
                .iter()
                .map(|(key, summary)| (self.codec.encode_key(key), summary.clone()))
                .collect(),
        };
        metadata.save(dir)?;
        tracing::debug!(
            target: "nasr.cache",
            dir = %dir.display(),
            entries = metadata.index.len(),
            "saved cache metadata"
        );
        self.dirty = false;
        Ok(())
    }

    /// Flush every materialized value and, if anything changed, the metadata
    /// file; then return to [`StoreState::Uninitialized`]. Calling it again is
    /// a no-op.
    pub fn uninitialize(&mut self) -> Result<()> {
        if self.state == StoreState::Uninitialized {
            return Ok(());
        }
        self.empty_all()?;
        if self.dirty {
            self.save_metadata()?;
        }
        self.state = StoreState::Uninitialized;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        match self.state {
            StoreState::Uninitialized => Err(CacheError::Uninitialized),
            StoreState::Valid | StoreState::Rebuilding => Ok(()),
        }
    }

    fn require_directory(&self) -> Result<&Path> {
        self.directory.as_deref().ok_or(CacheError::NullValue {
            description: "Cache directory",
        })
    }

    fn evict_if_full(&mut self) -> Result<()> {
        while self.working_set.len() >= self.capacity.get() {
            let Some(lru) = self.working_set.peek_lru().map(|(key, _)| key.clone()) else {
                break;
            };
            self.force_unload(&lru)?;
        }
        Ok(())
    }

    /// Store `summary` for `key` in the index, telling the codec about any change.
    fn record_summary(&mut self, key: &K, summary: Option<String>) -> Result<()> {
        match self.persistent_index.get(key) {
            Some(existing) if *existing == summary => return Ok(()),
            Some(_) => self.codec.forget_summary(key),
            None => {}
        }
        self.codec.restore_summary(key, summary.as_deref())?;
        self.persistent_index.insert(key.clone(), summary);
        self.dirty = true;
        Ok(())
    }

    fn restore_index(&mut self, index: Vec<(String, Option<String>)>) -> Result<()> {
        self.persistent_index.clear();
        self.codec.clear_summaries();
        for (raw, summary) in index {
            let key = self.codec.decode_key(&raw)?;
            self.codec.restore_summary(&key, summary.as_deref())?;
            self.persistent_index.insert(key, summary);
        }
        Ok(())
    }

    fn log_rejected(&self, dir: &Path, header: &MetadataHeader, now: OffsetDateTime) {
        if header.version != self.version {
            tracing::info!(
                target: "nasr.cache",
                dir = %dir.display(),
                found = header.version,
                expected = self.version,
                "cache version mismatch; rebuilding"
            );
        } else {
            tracing::info!(
                target: "nasr.cache",
                dir = %dir.display(),
                invalidate_after = %header.invalidate_after,
                now = %now,
                "cache expired; rebuilding"
            );
        }
    }
}

/// Delete every file in `dir` and then `dir` itself. Failures are logged, not returned.
fn clear_directory(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return,
        Err(err) => {
            tracing::warn!(target: "nasr.cache", dir = %dir.display(), error = %err, "failed to list cache directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && !remove_file_best_effort(&path, "invalidate") {
            tracing::warn!(target: "nasr.cache", path = %path.display(), "failed to delete cache file");
        }
    }

    match fs::remove_dir(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(target: "nasr.cache", dir = %dir.display(), error = %err, "failed to delete cache directory");
        }
    }
}
