use ahash::AHashMap;
use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// In-memory map keyed by address/id with merge and full-refresh semantics.
///
/// Readers get immutable snapshots (`Arc<AHashMap>`); writers swap in a new
/// map under the write lock, so an entry is either fully present or absent and
/// no two mutations interleave. Every mutation bumps a version number that is
/// published through a watch channel.
pub struct KeyedStore<K, V> {
    name: &'static str,
    entries: RwLock<Arc<AHashMap<K, V>>>,
    version_tx: watch::Sender<u64>,
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self { name, entries: RwLock::new(Arc::new(AHashMap::new())), version_tx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Merge `partial` into the store. Keys not in `partial` are untouched.
    /// Returns the number of entries written.
    pub fn upsert<I>(&self, partial: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut guard = self.entries.write();
        let mut iter = partial.into_iter().peekable();
        if iter.peek().is_none() {
            return 0;
        }
        let map = Arc::make_mut(&mut guard);
        let mut written = 0;
        for (key, value) in iter {
            map.insert(key, value);
            written += 1;
        }
        self.bump(written);
        written
    }

    pub fn upsert_one(&self, key: K, value: V) {
        self.upsert(std::iter::once((key, value)));
    }

    /// Discard the previous contents and install `full`.
    pub fn replace<I>(&self, full: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let map: AHashMap<K, V> = full.into_iter().collect();
        let len = map.len();
        let mut guard = self.entries.write();
        *guard = Arc::new(map);
        self.bump(len);
    }

    /// Insert only keys that are not present yet, for entities that are
    /// immutable once fetched. Returns the number of entries inserted.
    pub fn insert_missing<I>(&self, partial: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut guard = self.entries.write();
        let fresh: Vec<(K, V)> = partial.into_iter().filter(|(key, _)| !guard.contains_key(key)).collect();
        if fresh.is_empty() {
            return 0;
        }
        let map = Arc::make_mut(&mut guard);
        let mut inserted = 0;
        for (key, value) in fresh {
            if !map.contains_key(&key) {
                map.insert(key, value);
                inserted += 1;
            }
        }
        self.bump(inserted);
        inserted
    }

    /// Remove the given keys. Returns how many were present.
    pub fn remove<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut guard = self.entries.write();
        let present: Vec<&K> = keys.into_iter().filter(|key| guard.contains_key(*key)).collect();
        if present.is_empty() {
            return 0;
        }
        let map = Arc::make_mut(&mut guard);
        for key in present.iter() {
            map.remove(*key);
        }
        self.bump(present.len());
        present.len()
    }

    pub fn remove_one(&self, key: &K) -> bool {
        self.remove(std::iter::once(key)) == 1
    }

    pub fn clear(&self) {
        self.replace(std::iter::empty());
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Latest committed contents.
    pub fn snapshot(&self) -> Arc<AHashMap<K, V>> {
        Arc::clone(&self.entries.read())
    }

    /// Snapshot together with the version it corresponds to.
    pub fn versioned_snapshot(&self) -> (u64, Arc<AHashMap<K, V>>) {
        let guard = self.entries.read();
        (*self.version_tx.borrow(), Arc::clone(&guard))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn version(&self) -> u64 {
        *self.version_tx.borrow()
    }

    /// Receiver that changes on every committed mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    // Called with the write lock held.
    fn bump(&self, touched: usize) {
        self.version_tx.send_modify(|version| *version += 1);
        trace!("{} store committed {} entries (version {})", self.name, touched, *self.version_tx.borrow());
    }
}
