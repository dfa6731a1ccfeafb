//! # findex
//!
//! An embeddable in-memory full-text search index keyed by arbitrary user
//! values, backed by a compressed byte-radix tree.
//!
//! ## Features
//!
//! - **Prefix search**: query words match indexed words by prefix, so
//!   `"the"` finds documents containing "the", "these" or "theory"
//! - **Boolean queries**: `-` (NOT), `|` (OR) and `+` (AND) sigils compose
//!   prefix tokens; unmarked words are AND
//! - **Arbitrary keys**: anything implementing [`IndexKey`] can key the
//!   index, from strings and integers to custom records
//! - **Persistence**: the whole index saves to and loads from a compact,
//!   optionally gzip-compressed binary stream
//! - **Three storage flavors**: single-threaded, mutex-guarded and
//!   lock-free, all sharing the algorithms and the on-disk format
//!
//! ## Example
//!
//! ```rust
//! use findex::{Compression, Index};
//!
//! let index: Index<String> = Index::new();
//! index.add("a".into(), "This is a simple phrase");
//! index.add("b".into(), "And this one is another phrase, a bit longer");
//!
//! assert_eq!(index.search_distinct("this").len(), 2);
//! assert_eq!(index.search_distinct("simple | another").len(), 2);
//! assert_eq!(index.search_distinct("this -another"), ["a".to_string()]);
//!
//! // Round-trip through a byte stream.
//! let mut buf = Vec::new();
//! index.save(&mut buf, Compression::Gzip).unwrap();
//! let restored: Index<String> = Index::load(&mut buf.as_slice()).unwrap();
//! assert_eq!(restored.search_distinct("phrase").len(), 2);
//! ```
//!
//! ## Picking a flavor
//!
//! [`Index`] is the plain single-threaded flavor; it is not `Sync` and a
//! duplicate `add` of the same key and word accumulates duplicates.
//! [`GuardedIndex`] serializes access per container with mutexes and
//! [`ConcurrentIndex`] uses lock-free maps; both deduplicate keys within a
//! node and can be shared across threads behind an `Arc`. `save` is not
//! synchronized against concurrent writers in any flavor; quiesce writers
//! before persisting.

mod error;
mod guarded;
mod key;
mod lockfree;
mod node;
mod persist;
mod query;
mod storage;
mod tokenizer;

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

pub use crate::error::{Error, Result};
pub use crate::guarded::GuardedPolicy;
pub use crate::key::{IndexKey, KeyCodecError};
pub use crate::lockfree::LockFreePolicy;
pub use crate::node::Node;
pub use crate::persist::Compression;
pub use crate::query::{QueryOp, QueryToken, parse_query, parse_query_with};
pub use crate::storage::{BasicPolicy, EdgeMap, KeyBag, StoragePolicy};
pub use crate::tokenizer::{DefaultTokenizer, Tokenizer};

/// Full-text index over a byte-radix tree.
///
/// `K` is the key type, `P` selects the storage flavor and `T` the word
/// splitter. Text added for a key is tokenized and every token inserted
/// into the tree; searches tokenize the query, run prefix lookups and
/// compose them with the boolean operators.
///
/// All operations take `&self`; the flavor's containers carry their own
/// interior mutability. See the crate docs for how the flavors differ.
pub struct FullTextIndex<K, P = BasicPolicy, T = DefaultTokenizer>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    T: Tokenizer,
{
    root: P::EdgeMap,
    tokenizer: T,
    keys_count: AtomicUsize,
}

/// Single-threaded flavor: insertion-ordered tables, duplicate-keeping bags.
pub type Index<K> = FullTextIndex<K, BasicPolicy, DefaultTokenizer>;

/// Mutex-guarded flavor, shareable behind an `Arc`.
pub type GuardedIndex<K> = FullTextIndex<K, GuardedPolicy, DefaultTokenizer>;

/// Lock-free flavor on concurrent maps, shareable behind an `Arc`.
pub type ConcurrentIndex<K> = FullTextIndex<K, LockFreePolicy, DefaultTokenizer>;

impl<K: IndexKey, P: StoragePolicy<K>> FullTextIndex<K, P> {
    /// Creates an empty index with the default word splitter.
    pub fn new() -> Self {
        Self::with_tokenizer(DefaultTokenizer)
    }
}

impl<K: IndexKey, P: StoragePolicy<K>> Default for FullTextIndex<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P, T> FullTextIndex<K, P, T>
where
    K: IndexKey,
    P: StoragePolicy<K>,
    T: Tokenizer,
{
    /// Creates an empty index splitting words with `tokenizer`.
    pub fn with_tokenizer(tokenizer: T) -> Self {
        Self {
            root: P::EdgeMap::default(),
            tokenizer,
            keys_count: AtomicUsize::new(0),
        }
    }

    /// Indexes `text` under `key`.
    ///
    /// Every word of `text` becomes a tree token accumulating the key. The
    /// key count goes up by one per call, whether the text produced one
    /// token, many, or none at all.
    pub fn add(&self, key: K, text: &str) {
        self.keys_count.fetch_add(1, Ordering::Relaxed);
        let mut tokens = 0usize;
        self.tokenizer.tokenize(text, &mut |word| {
            tokens += 1;
            node::insert_token::<K, P>(&self.root, &key, word.as_bytes());
        });
        trace!(tokens, "document added");
    }

    /// Indexes a key under its own textual form, as produced by the key
    /// codec. Handy for record keys whose text view carries the fields.
    pub fn add_key(&self, key: K) {
        let text = key.to_text();
        self.add(key, &text);
    }

    /// Number of `add` calls recorded, less removals. After a load this is
    /// the number of distinct keys in the stream's intern table.
    pub fn keys_count(&self) -> usize {
        self.keys_count.load(Ordering::Relaxed)
    }

    /// Runs a boolean prefix query and returns the matching keys.
    ///
    /// The result is not deduplicated and carries no ordering promise; use
    /// [`search_distinct`](Self::search_distinct) when one key per document
    /// is wanted. Unknown words simply match nothing; a malformed query
    /// never fails.
    pub fn search(&self, query: &str) -> Vec<K> {
        let tokens = query::parse_query_with(&self.tokenizer, query);
        query::evaluate(
            &tokens,
            |text, sink| node::lookup_prefix::<K, P, _>(&self.root, text.as_bytes(), sink),
            |sink| node::collect_all::<K, P, _>(&self.root, sink),
        )
    }

    /// [`search`](Self::search) with order-preserving deduplication.
    pub fn search_distinct(&self, query: &str) -> Vec<K> {
        let mut seen = HashSet::new();
        self.search(query)
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Every key in every node, in tree order, duplicates included.
    pub fn keys(&self) -> Vec<K> {
        let mut out = Vec::new();
        node::collect_all::<K, P, _>(&self.root, &mut |key: &K| out.push(key.clone()));
        out
    }

    /// Deletes the given keys from every node they appear in and returns
    /// how many of them were found at least once. The tree keeps its
    /// shape: emptied bags and branches stay.
    pub fn remove(&self, keys: &[K]) -> usize {
        if keys.is_empty() {
            return 0;
        }
        let mut found = vec![false; keys.len()];
        node::remove_keys::<K, P>(&self.root, keys, &mut found);
        let removed = found.iter().filter(|hit| **hit).count();
        self.keys_count.fetch_sub(removed, Ordering::Relaxed);
        trace!(requested = keys.len(), removed, "keys removed");
        removed
    }

    /// Removes a single key; true if it was present.
    pub fn remove_key(&self, key: &K) -> bool {
        self.remove(std::slice::from_ref(key)) == 1
    }

    /// Drops every entry and resets the key count.
    pub fn clear(&self) {
        self.root.clear();
        self.keys_count.store(0, Ordering::Relaxed);
    }

    /// Writes the index to `writer` in the documented stream format.
    ///
    /// Not synchronized against concurrent mutation; quiesce writers first.
    pub fn save<W: Write>(&self, writer: &mut W, compression: Compression) -> Result<()> {
        persist::save_index::<K, P, W>(&self.root, writer, compression)
    }

    /// Reads an index previously written by [`save`](Self::save).
    ///
    /// Builds into fresh containers and only then constructs the index, so
    /// a failed load leaves nothing behind. The key count afterwards equals
    /// the stream's intern-table size.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self>
    where
        T: Default,
    {
        Self::load_with_tokenizer(reader, T::default())
    }

    /// [`load`](Self::load) with an explicit word splitter.
    pub fn load_with_tokenizer<R: Read>(reader: &mut R, tokenizer: T) -> Result<Self> {
        let (root, interned) = persist::load_index::<K, P, R>(reader)?;
        Ok(Self {
            root,
            tokenizer,
            keys_count: AtomicUsize::new(interned),
        })
    }

    /// Saves to a file, creating or truncating it.
    pub fn save_to_path(&self, path: impl AsRef<Path>, compression: Compression) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("empty file path"));
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer, compression)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads from a file written by [`save_to_path`](Self::save_to_path).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        T: Default,
    {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("empty file path"));
        }
        Self::load(&mut BufReader::new(File::open(path)?))
    }

    #[cfg(test)]
    pub(crate) fn root(&self) -> &P::EdgeMap {
        &self.root
    }
}
