//! Generic, bounded, disk-backed object cache.
//!
//! A [`CacheStore`] keeps at most `capacity` values materialized and spills
//! the least recently used one to disk when it needs room. Each value type
//! plugs in through a [`CacheCodec`], which maps values to flat
//! [`CacheEntry`] records and produces a compact *summary* per key. Summaries
//! form the store's persistent index: they stay in memory for every key ever
//! added, so callers can answer lookups (name -> key, ...) without loading
//! values. [`CacheLink`] is a lazy cross-store reference resolved through a
//! [`SharedStore`] handle.
//!
//! ## On-disk layout
//!
//! One directory per store:
//! - `.cache`: [`CacheMetadata`], i.e. `CacheVersion:<int>`,
//!   `InvalidateAfter:<RFC 3339>` and one `<key-byte-length>=<key><summary>`
//!   line per indexed key
//! - `<escaped key>.cache`: one entry record as a flat `key=value` property
//!   list (see `nasr-properties`), keys escaped by [`escape_key`]
//!
//! A directory whose metadata is missing, has another version or has passed
//! its `InvalidateAfter` instant is wiped by [`CacheStore::initialize`], which
//! then reports that the caller must rebuild.

mod codec;
mod entry;
mod error;
mod io;
mod link;
mod metadata;
mod path;
mod store;
mod util;

pub use codec::CacheCodec;
pub use entry::{CacheEntry, ToEntryValue};
pub use error::{CacheError, Result};
pub use link::{CacheLink, SharedStore};
pub use metadata::{CacheMetadata, MetadataHeader};
pub use path::{entry_path, escape_key, key_from_file_name, ENTRY_EXTENSION, METADATA_FILENAME};
pub use store::{CacheStore, StoreState, DEFAULT_CAPACITY, DEFAULT_INVALIDATE_AFTER, DEFAULT_VERSION};
pub use util::{atomic_write, now_utc};
