//! Read-mostly shared map with a multiple-reader, single-writer discipline.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Associative store shared by reference between tasks.
///
/// [`GuardedMap`] allows any number of concurrent readers, while [`GuardedMap::set`],
/// [`GuardedMap::delete`] and [`GuardedMap::update`] take exclusive access. Cloning the map
/// returns another handle to the same underlying storage, so every task must be handed the
/// exact instance it is meant to share.
///
/// The lock is held only for the duration of a single map operation and never across an
/// `.await`, so blocking is bounded by the opposing access class. The closure given to
/// [`GuardedMap::update`] is the only caller code that runs under the lock; if it panics the
/// entry is left removed and the map stays usable.
pub struct GuardedMap<K, V> {
    inner: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> GuardedMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty map able to hold `capacity` entries without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::with_capacity(capacity))),
        }
    }

    /// Returns a clone of the value stored for `key`, or [`None`] when the key is absent.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.read().get(key).cloned()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, key: K, value: V) {
        self.inner.write().insert(key, value);
    }

    /// Removes `key` and returns whether it was present.
    pub fn delete(&self, key: &K) -> bool {
        self.inner.write().remove(key).is_some()
    }

    /// Returns whether `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Applies `f` to the entry for `key` under the write lock and returns its result.
    ///
    /// The closure receives `None` when the key is absent. Whatever the closure leaves in the
    /// option is stored back, so returning with `None` deletes the entry. This is the only way to
    /// perform a read-modify-write without another writer interleaving.
    pub fn update<F, R>(&self, key: K, f: F) -> R
    where
        F: FnOnce(&mut Option<V>) -> R,
    {
        let mut map = self.inner.write();
        let mut slot = map.remove(&key);
        let result = f(&mut slot);
        if let Some(value) = slot {
            map.insert(key, value);
        }

        result
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a consistent copy of every entry taken under a single read lock.
    pub fn snapshot(&self) -> HashMap<K, V>
    where
        K: Clone,
        V: Clone,
    {
        self.inner.read().clone()
    }
}

impl<K, V> Clone for GuardedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for GuardedMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for GuardedMap<K, V>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: Arc::new(RwLock::new(iter.into_iter().collect())),
        }
    }
}

impl<K, V> fmt::Debug for GuardedMap<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedMap")
            .field("len", &self.len())
            .finish()
    }
}
