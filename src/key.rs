use std::hash::Hash;

use thiserror::Error;

/// Failure of a user key codec while parsing an interned string back into a
/// key during load.
#[derive(Debug, Error)]
#[error("key codec: {message}")]
pub struct KeyCodecError {
    message: String,
}

impl KeyCodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A value the index can be keyed by.
///
/// Keys are opaque to the tree itself; identity comes from `Eq + Hash`. The
/// two codec methods give every key an invariant textual form, used for the
/// intern table of the save stream and as the default indexing text for
/// [`add_key`](crate::FullTextIndex::add_key).
///
/// `parse_text` must be the inverse of `to_text` for any key the codec can
/// produce. Parse failures propagate out of load as
/// [`Error::KeyCodec`](crate::Error::KeyCodec).
pub trait IndexKey: Clone + Eq + Hash {
    fn to_text(&self) -> String;

    fn parse_text(text: &str) -> Result<Self, KeyCodecError>;
}

impl IndexKey for String {
    fn to_text(&self) -> String {
        self.clone()
    }

    fn parse_text(text: &str) -> Result<Self, KeyCodecError> {
        Ok(text.to_owned())
    }
}

macro_rules! int_index_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IndexKey for $ty {
                fn to_text(&self) -> String {
                    self.to_string()
                }

                fn parse_text(text: &str) -> Result<Self, KeyCodecError> {
                    text.parse().map_err(|err| {
                        KeyCodecError::new(format!(
                            "{text:?} is not a valid {}: {err}",
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

int_index_key!(u16, u32, u64, usize, i16, i32, i64, isize);
