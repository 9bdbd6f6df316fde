//! Error types surfaced at the boundary of the engine.
//!
//! Internal plumbing (file I/O, malformed on-disk tables) is wrapped with
//! `anyhow::Context` for human-readable messages; the conditions the caller
//! is expected to match on are the variants of [`StegError`].

use thiserror::Error;

/// Errors that can cross the public API of this crate.
#[derive(Error, Debug)]
pub enum StegError {
    /// The XOR cipher was used in strict mode with a key shorter than the
    /// plaintext it was asked to encrypt.
    #[error("key ({key_bits} bits) is shorter than plaintext ({plaintext_bits} bits) in strict mode")]
    KeyTooShort {
        key_bits: usize,
        plaintext_bits: usize,
    },

    /// A token string has no entry in the vocabulary index, or the index
    /// file itself is malformed (duplicate string, non-contiguous ids).
    #[error("vocabulary error: {0}")]
    Vocabulary(String),

    /// The back-off language model found negative leftover probability
    /// mass, implying the underlying BinDB tables violate invariant (I2)
    /// (counts-consistency between adjacent orders).
    #[error("model inconsistency: {0}")]
    ModelInconsistency(String),

    /// `START` occurred where §4.5 step 1 forbids it (mid-context other
    /// than right after `END`, or as a fresh top-of-recursion call with a
    /// non-empty context).
    #[error("ill-placed START token in context {context:?}")]
    IllPlacedStart { context: Vec<u32> },

    /// A BinDB table file's length is not a multiple of its record size,
    /// or some other structural invariant of the binary format is broken.
    #[error("malformed BinDB table (order {order}): {reason}")]
    MalformedTable { order: usize, reason: String },

    /// `deep_decode` exhausted its refinement budget without reaching the
    /// requested end token. Silent truncation is forbidden by design; this
    /// is always a loud failure.
    #[error("deep_decode did not terminate within {rounds} refinement rounds")]
    DecodeExhausted { rounds: usize },

    /// Wraps lower-level I/O failures (opening/reading table or index
    /// files) with the path that was involved.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wraps the `anyhow::Error` plumbing used at I/O boundaries (e.g.
    /// [`crate::bindb`]) so callers above that layer only ever need to
    /// match on [`StegError`].
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StegError>;
