use crate::entry::CacheEntry;
use crate::error::Result;

/// Translation between one cached type and its persisted forms.
///
/// A codec is supplied to each [`CacheStore`](crate::CacheStore) at
/// construction and owned by it. Besides the full object <-> [`CacheEntry`]
/// mapping it produces the compact *summary* kept in the store's persistent
/// index, and is handed every summary back on load so it can rebuild
/// secondary lookups (name -> key and the like) without materializing values.
///
/// Implementations must satisfy `decode(encode(v)) == v` for every field they
/// declare and `decode_key(encode_key(k)) == k`.
pub trait CacheCodec<K, V> {
    fn decode(&self, entry: &CacheEntry) -> Result<V>;

    fn encode(&self, value: &V, entry: &mut CacheEntry);

    fn encode_key(&self, key: &K) -> String;

    fn decode_key(&self, raw: &str) -> Result<K>;

    /// Compact metadata kept for `value` while it is evicted. `None` means
    /// "nothing to remember" and is stored as an empty summary.
    fn summarize(&self, value: &V) -> Option<String>;

    /// Consume a summary produced by [`summarize`](Self::summarize), either
    /// from a freshly added value or from the metadata file.
    fn restore_summary(&mut self, key: &K, summary: Option<&str>) -> Result<()>;

    /// `key` was removed from the store.
    fn forget_summary(&mut self, _key: &K) {}

    /// The store dropped its whole persistent index.
    fn clear_summaries(&mut self) {}
}
