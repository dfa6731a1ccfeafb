//! Lock-free storage flavor on concurrent maps.
//!
//! Child tables are `DashMap`s keyed by edge bytes and key bags are
//! `DashSet`s, giving per-container linearizability and weakly-consistent
//! iteration. Memory overhead is higher than the other flavors and
//! iteration order is not insertion-stable, so a re-save of a loaded index
//! is equivalent but not byte-identical.

use dashmap::{DashMap, DashSet};

use crate::node::Node;
use crate::storage::{EdgeMap, KeyBag, StoragePolicy};

/// Concurrent-map flavor; fine-grained sharing without a global lock.
pub struct LockFreePolicy;

impl<K: Clone + Eq + std::hash::Hash> StoragePolicy<K> for LockFreePolicy {
    type EdgeMap = DashEdgeMap<Node<K, LockFreePolicy>>;
    type KeyBag = DashKeyBag<K>;
}

/// Child table on a concurrent hash map. Edge hashing and equality are the
/// byte-wise `Box<[u8]>` implementations.
pub struct DashEdgeMap<N> {
    entries: DashMap<Box<[u8]>, N>,
}

impl<N> Default for DashEdgeMap<N> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<N> EdgeMap<N> for DashEdgeMap<N> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&self, edge: Box<[u8]>, node: N) -> Option<N> {
        self.entries.insert(edge, node)
    }

    fn remove(&self, edge: &[u8]) -> Option<N> {
        self.entries.remove(edge).map(|(_, node)| node)
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn with_node<R>(&self, edge: &[u8], f: impl FnOnce(&mut N) -> R) -> Option<R> {
        let mut entry = self.entries.get_mut(edge)?;
        Some(f(entry.value_mut()))
    }

    fn for_each(&self, mut f: impl FnMut(&[u8], &N)) {
        for entry in self.entries.iter() {
            f(entry.key(), entry.value());
        }
    }
}

/// Concurrent key set; duplicate additions collapse.
pub struct DashKeyBag<K: Eq + std::hash::Hash> {
    keys: DashSet<K>,
}

impl<K: Eq + std::hash::Hash> Default for DashKeyBag<K> {
    fn default() -> Self {
        Self {
            keys: DashSet::new(),
        }
    }
}

impl<K: Clone + Eq + std::hash::Hash> KeyBag<K> for DashKeyBag<K> {
    fn len(&self) -> usize {
        self.keys.len()
    }

    fn add(&self, key: K) {
        self.keys.insert(key);
    }

    fn remove_key(&self, key: &K) -> bool {
        self.keys.remove(key).is_some()
    }

    fn for_each(&self, mut f: impl FnMut(&K)) {
        for entry in self.keys.iter() {
            f(entry.key());
        }
    }
}
