use thiserror::Error;

use crate::key::KeyCodecError;

/// Errors surfaced by index operations, mostly by [`load`](crate::FullTextIndex::load).
///
/// Nothing is retried or swallowed internally; every failure propagates to the
/// caller and a failed load leaves no partially built index behind.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("bad magic {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("unknown compression code {0}")]
    UnknownCompression(i32),

    /// The stream ended early or a frame carries an impossible length
    /// field, so the rest of it cannot be read.
    #[error("truncated stream")]
    Truncated,

    #[error("intern index {index} out of range for a table of {len} keys")]
    InternIndexOutOfRange { index: i32, len: usize },

    #[error(transparent)]
    KeyCodec(#[from] KeyCodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
