//! Mutex-guarded storage flavor.
//!
//! Every container carries its own `parking_lot::Mutex`; each mutation and
//! each read acquires the lock of the container it touches. Operations
//! spanning several containers are not atomic with respect to each other:
//! two concurrent inserts of different tokens may interleave. Key-bag
//! iteration hands out a snapshot taken under the lock, so no lock is held
//! while the caller consumes the keys.

use parking_lot::Mutex;

use crate::node::Node;
use crate::storage::{EdgeMap, KeyBag, StoragePolicy};

/// Mutex-per-container flavor; safe to share across threads behind an `Arc`.
///
/// The key bag deduplicates: adding the same key twice under one token
/// stores it once.
pub struct GuardedPolicy;

impl<K: Clone + PartialEq> StoragePolicy<K> for GuardedPolicy {
    type EdgeMap = MutexEdgeMap<Node<K, GuardedPolicy>>;
    type KeyBag = MutexKeyBag<K>;
}

/// Insertion-ordered child table behind a single mutex.
pub struct MutexEdgeMap<N> {
    entries: Mutex<Vec<(Box<[u8]>, N)>>,
}

impl<N> Default for MutexEdgeMap<N> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<N> EdgeMap<N> for MutexEdgeMap<N> {
    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn insert(&self, edge: Box<[u8]>, node: N) -> Option<N> {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|(e, _)| *e == edge) {
            Some(entry) => Some(std::mem::replace(&mut entry.1, node)),
            None => {
                entries.push((edge, node));
                None
            }
        }
    }

    fn remove(&self, edge: &[u8]) -> Option<N> {
        let mut entries = self.entries.lock();
        let pos = entries.iter().position(|(e, _)| &**e == edge)?;
        Some(entries.remove(pos).1)
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn with_node<R>(&self, edge: &[u8], f: impl FnOnce(&mut N) -> R) -> Option<R> {
        let mut entries = self.entries.lock();
        let entry = entries.iter_mut().find(|(e, _)| &**e == edge)?;
        Some(f(&mut entry.1))
    }

    // The lock is held for the whole pass; nested passes only ever take
    // locks further down the tree.
    fn for_each(&self, mut f: impl FnMut(&[u8], &N)) {
        let entries = self.entries.lock();
        for (edge, node) in entries.iter() {
            f(edge, node);
        }
    }
}

/// Deduplicating key list behind a single mutex.
pub struct MutexKeyBag<K> {
    keys: Mutex<Vec<K>>,
}

impl<K> Default for MutexKeyBag<K> {
    fn default() -> Self {
        Self {
            keys: Mutex::new(Vec::new()),
        }
    }
}

impl<K: Clone + PartialEq> KeyBag<K> for MutexKeyBag<K> {
    fn len(&self) -> usize {
        self.keys.lock().len()
    }

    fn add(&self, key: K) {
        let mut keys = self.keys.lock();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    fn remove_key(&self, key: &K) -> bool {
        let mut keys = self.keys.lock();
        let before = keys.len();
        keys.retain(|k| k != key);
        keys.len() != before
    }

    fn for_each(&self, mut f: impl FnMut(&K)) {
        let snapshot = self.keys.lock().clone();
        for key in &snapshot {
            f(key);
        }
    }
}
