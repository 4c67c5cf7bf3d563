use crate::codec::CacheCodec;
use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use crate::path::entry_path;
use crate::util::atomic_write;
use std::fs;
use std::io;
use std::path::Path;

/// Serialize `value` through `codec` and persist it as the entry file for `key`.
pub(crate) fn write_entry<K, V, C>(dir: &Path, codec: &C, key: &K, value: &V) -> Result<()>
where
    C: CacheCodec<K, V>,
{
    let encoded_key = codec.encode_key(key);
    let wrap = |source: CacheError| CacheError::WriteFailure {
        key: encoded_key.clone(),
        source: Box::new(source),
    };

    let path = entry_path(dir, &encoded_key).map_err(wrap)?;
    let mut entry = CacheEntry::new();
    codec.encode(value, &mut entry);

    let stored = entry.to_stored_pairs();
    let text = nasr_properties::write(
        stored
            .iter()
            .map(|(field, value)| (*field, value.as_str())),
    );
    atomic_write(&path, text.as_bytes()).map_err(wrap)?;

    tracing::trace!(
        target: "nasr.cache",
        key = %encoded_key,
        fields = entry.len(),
        "wrote cache entry"
    );
    Ok(())
}

/// Load and decode the entry file for `key`.
///
/// A missing file is reported as a bare [`CacheError::NonexistentEntry`];
/// anything else that goes wrong is wrapped in [`CacheError::ReadFailure`].
pub(crate) fn read_entry<K, V, C>(dir: &Path, codec: &C, key: &K) -> Result<V>
where
    C: CacheCodec<K, V>,
{
    let encoded_key = codec.encode_key(key);
    let wrap = |source: CacheError| CacheError::ReadFailure {
        key: encoded_key.clone(),
        source: Box::new(source),
    };

    let path = entry_path(dir, &encoded_key).map_err(wrap)?;
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CacheError::NonexistentEntry {
                key: encoded_key.clone(),
            });
        }
        Err(err) => return Err(wrap(err.into())),
    };

    let mut entry = CacheEntry::new();
    for property in nasr_properties::parse(&text).entries {
        entry.insert_stored(property.key, &property.value);
    }

    let value = codec.decode(&entry).map_err(wrap)?;
    tracing::trace!(target: "nasr.cache", key = %encoded_key, "read cache entry");
    Ok(value)
}

/// Delete the entry file for `key`. Returns `false` if it could not be removed.
pub(crate) fn delete_entry<K, V, C>(dir: &Path, codec: &C, key: &K) -> bool
where
    C: CacheCodec<K, V>,
{
    match entry_path(dir, &codec.encode_key(key)) {
        Ok(path) => crate::util::remove_file_best_effort(&path, "remove"),
        Err(_) => false,
    }
}
