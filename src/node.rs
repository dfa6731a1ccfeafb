//! Radix-tree nodes and the traversals over them.
//!
//! Edges carry non-empty byte strings and live as the keys of the parent
//! child table; the tree root is a bare child table with an implicit empty
//! edge. The structural invariant maintained by insertion: no two sibling
//! edges share a non-empty byte prefix, so at most one child can ever match
//! a probe.

use std::mem;

use crate::storage::{EdgeMap, KeyBag, StoragePolicy};

/// One tree node. The variant encodes what the node holds: leaves carry
/// keys only, branches carry children and optionally keys.
pub enum Node<K, P: StoragePolicy<K>> {
    Leaf { keys: P::KeyBag },
    NoKeysBranch { children: P::EdgeMap },
    KeysBranch { keys: P::KeyBag, children: P::EdgeMap },
}

impl<K, P: StoragePolicy<K>> Node<K, P> {
    pub(crate) fn leaf_with(key: K) -> Self {
        let keys = P::KeyBag::default();
        keys.add(key);
        Node::Leaf { keys }
    }

    pub(crate) fn keys(&self) -> Option<&P::KeyBag> {
        match self {
            Node::Leaf { keys } | Node::KeysBranch { keys, .. } => Some(keys),
            Node::NoKeysBranch { .. } => None,
        }
    }

    pub(crate) fn children(&self) -> Option<&P::EdgeMap> {
        match self {
            Node::NoKeysBranch { children } | Node::KeysBranch { children, .. } => Some(children),
            Node::Leaf { .. } => None,
        }
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Records `key` under every node the token path reaches, splitting edges
/// as needed. Empty tokens are a no-op.
pub(crate) fn insert_token<K, P>(children: &P::EdgeMap, key: &K, token: &[u8])
where
    K: Clone,
    P: StoragePolicy<K>,
{
    if token.is_empty() {
        return;
    }

    // A child with exactly this edge: put the key there, promoting a
    // keyless branch in place.
    let exact = children.with_node(token, |child| {
        if matches!(child, Node::NoKeysBranch { .. }) {
            let old = mem::replace(
                child,
                Node::NoKeysBranch {
                    children: P::EdgeMap::default(),
                },
            );
            if let Node::NoKeysBranch { children: inner } = old {
                let keys = P::KeyBag::default();
                keys.add(key.clone());
                *child = Node::KeysBranch {
                    keys,
                    children: inner,
                };
            }
        } else if let Some(keys) = child.keys() {
            keys.add(key.clone());
        }
    });
    if exact.is_some() {
        return;
    }

    // First child sharing any byte prefix with the token; unique under the
    // sibling-edge invariant.
    let mut shared: Option<(Box<[u8]>, usize)> = None;
    children.for_each(|edge, _| {
        if shared.is_none() {
            let m = common_prefix(edge, token);
            if m > 0 {
                shared = Some((Box::from(edge), m));
            }
        }
    });

    let Some((edge, m)) = shared else {
        children.insert(Box::from(token), Node::leaf_with(key.clone()));
        return;
    };

    if m == edge.len() {
        // The token runs past this child's whole edge. Descend into a
        // branch; a leaf grows into a keyed branch with the remainder
        // hanging beneath it.
        let rest = &token[m..];
        children.with_node(&edge, |child| {
            if matches!(child, Node::Leaf { .. }) {
                let old = mem::replace(
                    child,
                    Node::NoKeysBranch {
                        children: P::EdgeMap::default(),
                    },
                );
                if let Node::Leaf { keys } = old {
                    let inner = P::EdgeMap::default();
                    inner.insert(Box::from(rest), Node::leaf_with(key.clone()));
                    *child = Node::KeysBranch {
                        keys,
                        children: inner,
                    };
                }
            } else if let Some(inner) = child.children() {
                insert_token::<K, P>(inner, key, rest);
            }
        });
        return;
    }

    // The token diverges inside the edge: split at the divergence point.
    // The displaced child keeps its variant and contents under its edge
    // suffix; the key lands on the split top when the token ends there,
    // otherwise on a fresh sibling leaf.
    let Some(displaced) = children.remove(&edge) else {
        return;
    };
    let inner = P::EdgeMap::default();
    inner.insert(Box::from(&edge[m..]), displaced);
    let top = if m == token.len() {
        let keys = P::KeyBag::default();
        keys.add(key.clone());
        Node::KeysBranch {
            keys,
            children: inner,
        }
    } else {
        inner.insert(Box::from(&token[m..]), Node::leaf_with(key.clone()));
        Node::NoKeysBranch { children: inner }
    };
    children.insert(Box::from(&token[..m]), top);
}

/// Feeds every key stored at or under the first node whose path covers
/// `prefix` into `sink`. No deduplication, no ordering promise beyond tree
/// order.
pub(crate) fn lookup_prefix<K, P, F>(children: &P::EdgeMap, prefix: &[u8], sink: &mut F)
where
    P: StoragePolicy<K>,
    F: FnMut(&K) + ?Sized,
{
    if prefix.is_empty() {
        return;
    }
    children.for_each(|edge, node| {
        let m = common_prefix(edge, prefix);
        if m == 0 {
            // sibling with no shared byte
        } else if m == prefix.len() {
            // prefix exhausted on this edge: the whole subtree matches
            collect_subtree::<K, P, F>(node, sink);
        } else if m == edge.len() {
            if let Some(inner) = node.children() {
                lookup_prefix::<K, P, F>(inner, &prefix[m..], sink);
            }
        }
    });
}

/// Emits the keys of `node` and all its descendants, parent before
/// children, siblings in table order.
pub(crate) fn collect_subtree<K, P, F>(node: &Node<K, P>, sink: &mut F)
where
    P: StoragePolicy<K>,
    F: FnMut(&K) + ?Sized,
{
    if let Some(keys) = node.keys() {
        keys.for_each(|key| sink(key));
    }
    if let Some(children) = node.children() {
        children.for_each(|_, child| collect_subtree::<K, P, F>(child, sink));
    }
}

/// Emits every key in every bag of the tree.
pub(crate) fn collect_all<K, P, F>(children: &P::EdgeMap, sink: &mut F)
where
    P: StoragePolicy<K>,
    F: FnMut(&K) + ?Sized,
{
    children.for_each(|_, node| collect_subtree::<K, P, F>(node, sink));
}

/// Strips `targets` out of every bag in the tree, flagging which targets
/// were found at least once. Emptied bags and branches stay in place.
pub(crate) fn remove_keys<K, P>(children: &P::EdgeMap, targets: &[K], found: &mut [bool])
where
    P: StoragePolicy<K>,
{
    children.for_each(|_, node| {
        if let Some(keys) = node.keys() {
            for (i, target) in targets.iter().enumerate() {
                if keys.remove_key(target) {
                    found[i] = true;
                }
            }
        }
        if let Some(inner) = node.children() {
            remove_keys::<K, P>(inner, targets, found);
        }
    });
}
