use smallvec::SmallVec;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Splits indexing and query text into word tokens.
///
/// Implementations push each token into `emit` in text order. Tokens must be
/// non-empty; the tree ignores empty ones.
pub trait Tokenizer {
    fn tokenize(&self, text: &str, emit: &mut dyn FnMut(&str));
}

/// Default word splitter: the input is decomposed to NFD, combining marks are
/// dropped, and the remaining characters are lowercased. Any rune that is not
/// an ASCII letter breaks the current word, so `"réveillez-vous"` tokenizes
/// as `reveillez`, `vous`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenizer;

impl Tokenizer for DefaultTokenizer {
    fn tokenize(&self, text: &str, emit: &mut dyn FnMut(&str)) {
        let mut word: SmallVec<[u8; 24]> = SmallVec::new();
        for c in text.nfd() {
            if is_combining_mark(c) {
                continue;
            }
            if c.is_ascii_alphabetic() {
                word.push(c.to_ascii_lowercase() as u8);
            } else if !word.is_empty() {
                if let Ok(token) = std::str::from_utf8(&word) {
                    emit(token);
                }
                word.clear();
            }
        }
        if !word.is_empty()
            && let Ok(token) = std::str::from_utf8(&word)
        {
            emit(token);
        }
    }
}
