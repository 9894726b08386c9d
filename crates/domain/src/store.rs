//! Internally synchronized in-memory entity storage.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// Keyed entity storage with per-entity mutual exclusion.
///
/// The outer map lock is held only long enough to find (or create) an entry;
/// mutations then run under that entity's own mutex, so two requests touching
/// the same entity are serialized while requests on different entities
/// proceed in parallel.
///
/// Updates are applied to a copy and committed only when the closure returns
/// `Ok`, which makes every mutation all-or-nothing.
pub struct EntityStore<K, V> {
    entries: Arc<RwLock<HashMap<K, Arc<Mutex<V>>>>>,
}

impl<K, V> Clone for EntityStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for EntityStore<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> std::fmt::Debug for EntityStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore").finish_non_exhaustive()
    }
}

impl<K, V> EntityStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new entity. Returns false (and leaves the store untouched)
    /// if the key is already present.
    pub async fn insert_new(&self, key: K, value: V) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, Arc::new(Mutex::new(value)));
        true
    }

    /// Returns a snapshot of the entity, taken under its lock.
    pub async fn get(&self, key: &K) -> Option<V> {
        let entry = self.entry(key).await?;
        let value = entry.lock().await.clone();
        Some(value)
    }

    /// Applies `f` to the entity under its lock.
    ///
    /// Returns `None` if the key is absent.
    pub async fn update<T, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> Result<T, E>,
    ) -> Option<Result<T, E>> {
        let entry = self.entry(key).await?;
        Some(Self::apply(&entry, f).await)
    }

    /// Applies `f` to the entity under its lock, creating it with `init` first
    /// if it does not exist yet.
    pub async fn upsert<T, E>(
        &self,
        key: K,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> Result<T, E>,
    ) -> Result<T, E> {
        let entry = {
            let mut entries = self.entries.write().await;
            Arc::clone(
                entries
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(init()))),
            )
        };
        Self::apply(&entry, f).await
    }

    /// Returns true if the key is present.
    pub async fn contains(&self, key: &K) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Returns the number of stored entities.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if the store holds no entities.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns a snapshot of every entity.
    pub async fn values(&self) -> Vec<V> {
        let entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        let mut values = Vec::with_capacity(entries.len());
        for entry in entries {
            values.push(entry.lock().await.clone());
        }
        values
    }

    async fn entry(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn apply<T, E>(entry: &Mutex<V>, f: impl FnOnce(&mut V) -> Result<T, E>) -> Result<T, E> {
        let mut guard = entry.lock().await;
        let mut draft = guard.clone();
        let result = f(&mut draft);
        if result.is_ok() {
            *guard = draft;
        }
        result
    }
}
