//! Decoding of hint payloads.
//!
//! Hints use the canonical little-endian layout: a `Vec<T>` is a `u64` length followed by its
//! items, a scalar is four little-endian `u64` limbs.

use std::collections::{HashMap, VecDeque};

use p3_field::Field;
use thiserror::Error;

use super::transcript::Hint;
use crate::utils::field_from_limbs;

/// Errors raised while decoding a hint payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HintError {
    /// The payload ended before the value was fully decoded.
    #[error("hint `{label}` is truncated: needed {needed} bytes, {available} left")]
    Truncated {
        label: String,
        needed: usize,
        available: usize,
    },

    /// The payload holds more bytes than the decoded value.
    #[error("hint `{label}` has {remaining} unread bytes")]
    TrailingBytes { label: String, remaining: usize },

    /// A declared length cannot be honoured by the payload.
    #[error("hint `{label}` declares {length} items, which exceeds its payload")]
    LengthOverflow { label: String, length: u64 },

    /// The hint label is not part of the protocol.
    #[error("unknown hint label `{0}`")]
    UnknownLabel(String),

    /// A hint was requested but none is left for this label.
    #[error("missing hint `{0}`")]
    Missing(String),

    /// Decoded hints are inconsistent with each other.
    #[error("inconsistent hint `{label}`: {reason}")]
    Inconsistent { label: String, reason: String },
}

/// Cursor over a single hint payload.
#[derive(Debug)]
pub struct HintReader<'a> {
    label: &'a str,
    bytes: &'a [u8],
}

impl<'a> HintReader<'a> {
    #[must_use]
    pub const fn new(label: &'a str, bytes: &'a [u8]) -> Self {
        Self { label, bytes }
    }

    #[must_use]
    pub const fn label(&self) -> &'a str {
        self.label
    }

    /// Consume and return the next `n` raw bytes of the payload.
    pub fn next_hint_bytes(&mut self, n: usize) -> Result<&'a [u8], HintError> {
        if self.bytes.len() < n {
            return Err(HintError::Truncated {
                label: self.label.to_string(),
                needed: n,
                available: self.bytes.len(),
            });
        }
        let bytes: &'a [u8] = self.bytes;
        let (head, tail) = bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    /// Consume a little-endian `u64`.
    pub fn next_hint_u64(&mut self) -> Result<u64, HintError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.next_hint_bytes(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    /// Consume a collection length, rejecting lengths that cannot fit in what is left
    /// given that every item takes at least `min_item_len` bytes.
    pub fn next_hint_len(&mut self, min_item_len: usize) -> Result<usize, HintError> {
        let length = self.next_hint_u64()?;
        let fits = usize::try_from(length)
            .ok()
            .and_then(|len| len.checked_mul(min_item_len))
            .is_some_and(|total| total <= self.bytes.len());
        if !fits {
            return Err(HintError::LengthOverflow {
                label: self.label.to_string(),
                length,
            });
        }
        Ok(length as usize)
    }

    /// Consume `n` scalars encoded as four little-endian limbs each.
    pub fn next_hint_scalars<F: Field>(&mut self, n: usize) -> Result<Vec<F>, HintError> {
        (0..n)
            .map(|_| Fp256::read(self).map(|limbs| limbs.to_field()))
            .collect()
    }

    /// Fails unless the whole payload was consumed.
    pub fn finish(self) -> Result<(), HintError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(HintError::TrailingBytes {
                label: self.label.to_string(),
                remaining: self.bytes.len(),
            })
        }
    }
}

/// Values that can be decoded from a hint payload.
pub trait HintDeserialize: Sized {
    /// Minimum number of bytes one encoded value occupies.
    const MIN_ENCODED_LEN: usize;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError>;

    /// Decodes a full payload, rejecting trailing bytes.
    fn decode(label: &str, payload: &[u8]) -> Result<Self, HintError> {
        let mut reader = HintReader::new(label, payload);
        let value = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

impl HintDeserialize for u64 {
    const MIN_ENCODED_LEN: usize = 8;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError> {
        reader.next_hint_u64()
    }
}

impl HintDeserialize for [u8; 32] {
    const MIN_ENCODED_LEN: usize = 32;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(reader.next_hint_bytes(32)?);
        Ok(out)
    }
}

impl<T: HintDeserialize> HintDeserialize for Vec<T> {
    const MIN_ENCODED_LEN: usize = 8;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError> {
        let len = reader.next_hint_len(T::MIN_ENCODED_LEN)?;
        (0..len).map(|_| T::read(reader)).collect()
    }
}

/// A 256-bit scalar as four little-endian `u64` limbs, not yet reduced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fp256(pub [u64; 4]);

impl Fp256 {
    /// Reduces the limbs into the field.
    #[must_use]
    pub fn to_field<F: Field>(&self) -> F {
        field_from_limbs(&self.0)
    }
}

impl HintDeserialize for Fp256 {
    const MIN_ENCODED_LEN: usize = 32;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError> {
        let mut limbs = [0u64; 4];
        for limb in &mut limbs {
            *limb = reader.next_hint_u64()?;
        }
        Ok(Self(limbs))
    }
}

/// One Merkle authentication path as carried in a hint.
///
/// The authentication path is serialized root-first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Path {
    pub leaf_sibling_hash: [u8; 32],
    pub auth_path: Vec<[u8; 32]>,
    pub leaf_index: u64,
}

impl HintDeserialize for Path {
    const MIN_ENCODED_LEN: usize = 32 + 8 + 8;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError> {
        Ok(Self {
            leaf_sibling_hash: HintDeserialize::read(reader)?,
            auth_path: HintDeserialize::read(reader)?,
            leaf_index: HintDeserialize::read(reader)?,
        })
    }
}

/// All authentication paths opened in one round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FullMultiPath {
    pub proofs: Vec<Path>,
}

impl HintDeserialize for FullMultiPath {
    const MIN_ENCODED_LEN: usize = 8;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError> {
        Ok(Self {
            proofs: HintDeserialize::read(reader)?,
        })
    }
}

/// Claimed linear-statement evaluations of a witness commitment:
/// the witness polynomial (`f_sums`) and its blinding polynomial (`g_sums`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimedEvaluations {
    pub f_sums: Vec<Fp256>,
    pub g_sums: Vec<Fp256>,
}

impl HintDeserialize for ClaimedEvaluations {
    const MIN_ENCODED_LEN: usize = 16;

    fn read(reader: &mut HintReader<'_>) -> Result<Self, HintError> {
        Ok(Self {
            f_sums: HintDeserialize::read(reader)?,
            g_sums: HintDeserialize::read(reader)?,
        })
    }
}

/// Labels of the hints carried by a proof transcript.
pub mod labels {
    pub const STIR_ANSWERS: &str = "stir_answers";
    pub const MERKLE_PROOF: &str = "merkle_proof";
    pub const DEFERRED_WEIGHT_EVALUATIONS: &str = "deferred_weight_evaluations";
    pub const CLAIMED_EVALUATIONS: &str = "claimed_evaluations";

    /// Per-commitment STIR answers of the first round of a batched proof.
    #[must_use]
    pub fn stir_answers_witness(commitment: usize) -> String {
        format!("{STIR_ANSWERS}_witness_{commitment}")
    }

    /// Per-commitment Merkle paths of the first round of a batched proof.
    #[must_use]
    pub fn merkle_proof_witness(commitment: usize) -> String {
        format!("{MERKLE_PROOF}_witness_{commitment}")
    }

    /// Claimed evaluations of the `index`-th witness commitment (`1` or `2`) in dual mode.
    #[must_use]
    pub fn claimed_evaluations_of(index: usize) -> String {
        format!("{CLAIMED_EVALUATIONS}_{index}")
    }

    /// Whether `label` names a hint the verifier knows how to decode.
    #[must_use]
    pub fn is_known(label: &str) -> bool {
        let indexed = |prefix: &str| {
            label
                .strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        };
        matches!(
            label,
            STIR_ANSWERS | MERKLE_PROOF | DEFERRED_WEIGHT_EVALUATIONS | CLAIMED_EVALUATIONS
        ) || indexed("stir_answers_witness_")
            || indexed("merkle_proof_witness_")
            || indexed("claimed_evaluations_")
    }
}

/// Hints of a transcript, queued per label in transcript order.
#[derive(Clone, Debug, Default)]
pub struct ProofHints {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
}

impl ProofHints {
    /// Routes the hints of a split transcript, rejecting labels outside the protocol.
    pub fn new(hints: Vec<Hint>) -> Result<Self, HintError> {
        let mut queues: HashMap<String, VecDeque<Vec<u8>>> = HashMap::new();
        for hint in hints {
            if !labels::is_known(&hint.label) {
                return Err(HintError::UnknownLabel(hint.label));
            }
            queues.entry(hint.label).or_default().push_back(hint.payload);
        }
        Ok(Self { queues })
    }

    /// Decodes the next hint carrying `label`.
    pub fn take<T: HintDeserialize>(&mut self, label: &str) -> Result<T, HintError> {
        let payload = self
            .queues
            .get_mut(label)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| HintError::Missing(label.to_string()))?;
        T::decode(label, &payload)
    }

    /// Decodes every remaining hint carrying `label` and concatenates them.
    pub fn take_appended<T: HintDeserialize>(&mut self, label: &str) -> Result<Vec<T>, HintError> {
        let mut out = Vec::new();
        if let Some(queue) = self.queues.remove(label) {
            for payload in queue {
                out.extend(Vec::<T>::decode(label, &payload)?);
            }
        }
        Ok(out)
    }

    /// Number of hints not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

/// Encoding counterpart of [`HintDeserialize`], used to build transcripts in tests.
#[cfg(any(test, feature = "test-utils"))]
pub trait HintSerialize {
    fn write(&self, out: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod serialize {
    use super::{ClaimedEvaluations, Fp256, FullMultiPath, HintSerialize, Path};

    impl HintSerialize for u64 {
        fn write(&self, out: &mut Vec<u8>) {
            out.extend_from_slice(&self.to_le_bytes());
        }
    }

    impl HintSerialize for [u8; 32] {
        fn write(&self, out: &mut Vec<u8>) {
            out.extend_from_slice(self);
        }
    }

    impl<T: HintSerialize> HintSerialize for Vec<T> {
        fn write(&self, out: &mut Vec<u8>) {
            (self.len() as u64).write(out);
            for item in self {
                item.write(out);
            }
        }
    }

    impl HintSerialize for Fp256 {
        fn write(&self, out: &mut Vec<u8>) {
            for limb in &self.0 {
                limb.write(out);
            }
        }
    }

    impl HintSerialize for Path {
        fn write(&self, out: &mut Vec<u8>) {
            self.leaf_sibling_hash.write(out);
            self.auth_path.write(out);
            self.leaf_index.write(out);
        }
    }

    impl HintSerialize for FullMultiPath {
        fn write(&self, out: &mut Vec<u8>) {
            self.proofs.write(out);
        }
    }

    impl HintSerialize for ClaimedEvaluations {
        fn write(&self, out: &mut Vec<u8>) {
            self.f_sums.write(out);
            self.g_sums.write(out);
        }
    }
}
