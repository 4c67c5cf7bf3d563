use crate::codec::CacheCodec;
use crate::error::Result;
use crate::store::CacheStore;
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Handle to a store shared between its owner and the links pointing into it.
///
/// Every public operation goes through the one lock, so eviction, the write
/// of the evicted entry and the index update are observed together.
pub type SharedStore<K, V, C> = Arc<Mutex<CacheStore<K, V, C>>>;

impl<K, V, C> CacheStore<K, V, C>
where
    K: Clone + Eq + Hash,
    C: CacheCodec<K, V>,
{
    pub fn into_shared(self) -> SharedStore<K, V, C> {
        Arc::new(Mutex::new(self))
    }

    pub fn link(store: &SharedStore<K, V, C>, key: K) -> CacheLink<K, V, C> {
        CacheLink::new(store, key)
    }
}

/// A lazy reference to a value in another store.
///
/// Holding a link costs one key and one handle; the target is loaded only when
/// [`get`](Self::get) is called. Links compare and hash by key alone.
pub struct CacheLink<K, V, C> {
    store: SharedStore<K, V, C>,
    key: K,
}

impl<K, V, C> CacheLink<K, V, C>
where
    K: Clone + Eq + Hash,
    C: CacheCodec<K, V>,
{
    pub fn new(store: &SharedStore<K, V, C>, key: K) -> Self {
        Self {
            store: Arc::clone(store),
            key,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Resolve the link through the store, loading the value from disk if needed.
    pub fn get(&self) -> Result<Arc<V>> {
        self.store.lock().get(&self.key)
    }

    pub fn store(&self) -> &SharedStore<K, V, C> {
        &self.store
    }
}

impl<K: Clone, V, C> Clone for CacheLink<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}

impl<K: PartialEq, V, C> PartialEq for CacheLink<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<K: Eq, V, C> Eq for CacheLink<K, V, C> {}

impl<K: Hash, V, C> Hash for CacheLink<K, V, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<K: fmt::Debug, V, C> fmt::Debug for CacheLink<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLink").field("key", &self.key).finish()
    }
}
