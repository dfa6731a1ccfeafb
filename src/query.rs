//! Query tokenization and boolean evaluation.
//!
//! A query is a sequence of prefix tokens, each carrying one of three roles.
//! The sigils `-` (NOT), `|` (OR) and `+` (AND) attach to the next word,
//! whether glued to it or standing alone; unmarked words default to AND.
//! Anything else that is not an ASCII letter is just a word break, so a
//! malformed query never fails, it only loses tokens.

use std::collections::HashSet;
use std::hash::Hash;

use crate::tokenizer::{DefaultTokenizer, Tokenizer};

/// Boolean role of one query token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    And,
    Or,
    Not,
}

/// One classified word of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryToken {
    pub op: QueryOp,
    pub text: String,
}

/// Tokenizes `query` with the default word splitter.
pub fn parse_query(query: &str) -> Vec<QueryToken> {
    parse_query_with(&DefaultTokenizer, query)
}

/// Tokenizes `query`, cutting it at sigil positions and running `tokenizer`
/// over each fragment. The sigil classifies the first word that follows it;
/// later words in the same fragment fall back to AND.
pub fn parse_query_with<T: Tokenizer>(tokenizer: &T, query: &str) -> Vec<QueryToken> {
    let mut tokens = Vec::new();
    let mut op = QueryOp::And;
    let mut rest = query;
    loop {
        match rest.find(['-', '|', '+']) {
            Some(pos) => {
                emit_fragment(tokenizer, &rest[..pos], op, &mut tokens);
                op = match rest.as_bytes()[pos] {
                    b'-' => QueryOp::Not,
                    b'|' => QueryOp::Or,
                    _ => QueryOp::And,
                };
                rest = &rest[pos + 1..];
            }
            None => {
                emit_fragment(tokenizer, rest, op, &mut tokens);
                return tokens;
            }
        }
    }
}

fn emit_fragment<T: Tokenizer>(
    tokenizer: &T,
    fragment: &str,
    first_op: QueryOp,
    out: &mut Vec<QueryToken>,
) {
    let mut next = Some(first_op);
    tokenizer.tokenize(fragment, &mut |word| {
        out.push(QueryToken {
            op: next.take().unwrap_or(QueryOp::And),
            text: word.to_owned(),
        });
    });
}

/// Evaluates classified tokens against prefix lookups.
///
/// `lookup` feeds every key matching a token prefix into its sink, without
/// deduplication; `all_keys` feeds every key in the index. The fast path for
/// a non-NOT head followed by an all-OR tail returns the raw concatenation
/// of the per-token lookups, duplicates included; callers deduplicate.
pub(crate) fn evaluate<K: Clone + Eq + Hash>(
    tokens: &[QueryToken],
    mut lookup: impl FnMut(&str, &mut dyn FnMut(&K)),
    mut all_keys: impl FnMut(&mut dyn FnMut(&K)),
) -> Vec<K> {
    if tokens.is_empty() {
        return Vec::new();
    }

    if tokens[0].op != QueryOp::Not && tokens[1..].iter().all(|t| t.op == QueryOp::Or) {
        let mut out = Vec::new();
        for token in tokens {
            lookup(&token.text, &mut |key| out.push(key.clone()));
        }
        return out;
    }

    if let [token] = tokens {
        // only a NOT token reaches here: everything except its matches
        let mut excluded = HashSet::new();
        lookup(&token.text, &mut |key| {
            excluded.insert(key.clone());
        });
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        all_keys(&mut |key| {
            if !excluded.contains(key) && seen.insert(key.clone()) {
                out.push(key.clone());
            }
        });
        return out;
    }

    let mut set: HashSet<K> = HashSet::new();
    for token in tokens.iter().filter(|t| t.op == QueryOp::Or) {
        lookup(&token.text, &mut |key| {
            set.insert(key.clone());
        });
    }
    let mut first_and = true;
    for token in tokens.iter().filter(|t| t.op == QueryOp::And) {
        let mut hits = HashSet::new();
        lookup(&token.text, &mut |key| {
            hits.insert(key.clone());
        });
        if set.is_empty() && first_and {
            set = hits;
        } else {
            set.retain(|key| hits.contains(key));
        }
        first_and = false;
    }
    for token in tokens.iter().filter(|t| t.op == QueryOp::Not) {
        lookup(&token.text, &mut |key| {
            set.remove(key);
        });
    }
    set.into_iter().collect()
}
