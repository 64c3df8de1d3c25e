//! Errors raised while replaying a Fiat-Shamir transcript.

use thiserror::Error;

use super::pattern::OpKind;

/// Failure modes of the transcript replay engine.
///
/// Every variant is fatal: the transcript is either malformed or does not follow the
/// declared IO pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    /// The public stream ran out of bytes while an absorb was being replayed.
    #[error("transcript underrun: needed {needed} bytes for `{label}`, {available} left")]
    TranscriptUnderrun {
        label: String,
        needed: usize,
        available: usize,
    },

    /// The caller requested an operation that is not the next one in the IO pattern.
    #[error("IO pattern mismatch: expected {expected}, got {actual}")]
    PatternMismatch { expected: String, actual: String },

    /// The IO pattern string itself is malformed.
    #[error("invalid IO pattern: {0}")]
    InvalidPattern(String),

    /// Fewer than 4 bytes remained when a hint length prefix was expected.
    #[error("insufficient bytes for hint length of `{label}`")]
    InsufficientHintLength { label: String },

    /// The hint length prefix points past the end of the transcript.
    #[error("hint `{label}` of {length} bytes exceeds the transcript ({available} left)")]
    HintExceedsTranscript {
        label: String,
        length: usize,
        available: usize,
    },

    /// An absorb operation needs more bytes than the transcript has left.
    #[error("absorb `{label}` of {length} bytes exceeds the transcript ({available} left)")]
    AbsorbExceedsTranscript {
        label: String,
        length: usize,
        available: usize,
    },

    /// Bytes remain after every operation of the IO pattern was replayed.
    #[error("{0} trailing bytes after the last operation")]
    TrailingBytes(usize),

    /// The verifier finished while operations of the IO pattern were still pending.
    #[error("{kind:?} `{label}` was never consumed")]
    UnconsumedOperation { kind: OpKind, label: String },
}
