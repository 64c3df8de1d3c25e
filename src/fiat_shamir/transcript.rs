//! Transcript pre-pass.
//!
//! A raw transcript interleaves public prover messages (absorbed by the sponge) with
//! length-prefixed hints (never absorbed). Walking the IO pattern once splits the two, so that
//! the verifier can replay the public stream and decode hints independently.

use tracing::instrument;

use super::{
    errors::TranscriptError,
    pattern::{IoPattern, OpKind},
};
use crate::constant::HINT_LENGTH_BYTES;

/// A hint payload together with the label of the operation that carried it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hint {
    pub label: String,
    pub payload: Vec<u8>,
}

/// Result of the pre-pass: the public byte stream and the ordered hints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitTranscript {
    pub public: Vec<u8>,
    pub hints: Vec<Hint>,
}

/// Splits `transcript` into its public stream and its hints according to `pattern`.
///
/// - `Hint` reads a 4-byte little-endian length followed by the payload.
/// - `Absorb` copies its width to the public stream.
/// - `Squeeze` consumes nothing.
///
/// Bytes left after the last operation are rejected.
#[instrument(skip_all, fields(len = transcript.len()))]
pub fn split_transcript(
    pattern: &IoPattern,
    transcript: &[u8],
) -> Result<SplitTranscript, TranscriptError> {
    let mut split = SplitTranscript {
        public: Vec::with_capacity(pattern.public_len()),
        hints: Vec::new(),
    };
    let mut rest = transcript;

    for op in pattern.ops() {
        match op.kind {
            OpKind::Hint => {
                if rest.len() < HINT_LENGTH_BYTES {
                    return Err(TranscriptError::InsufficientHintLength {
                        label: op.label.clone(),
                    });
                }
                let (prefix, tail) = rest.split_at(HINT_LENGTH_BYTES);
                let mut length = [0u8; HINT_LENGTH_BYTES];
                length.copy_from_slice(prefix);
                let length = u32::from_le_bytes(length) as usize;

                if tail.len() < length {
                    return Err(TranscriptError::HintExceedsTranscript {
                        label: op.label.clone(),
                        length,
                        available: tail.len(),
                    });
                }
                let (payload, tail) = tail.split_at(length);
                split.hints.push(Hint {
                    label: op.label.clone(),
                    payload: payload.to_vec(),
                });
                rest = tail;
            }
            OpKind::Absorb => {
                let length = op.absorb_width();
                if rest.len() < length {
                    return Err(TranscriptError::AbsorbExceedsTranscript {
                        label: op.label.clone(),
                        length,
                        available: rest.len(),
                    });
                }
                let (public, tail) = rest.split_at(length);
                split.public.extend_from_slice(public);
                rest = tail;
            }
            OpKind::Squeeze => {}
        }
    }

    if !rest.is_empty() {
        return Err(TranscriptError::TrailingBytes(rest.len()));
    }

    Ok(split)
}
