use p3_field::Field;
use zeroize::Zeroize;

use super::{
    errors::TranscriptError,
    keccak::{Keccak, sponge_for_pattern},
    pattern::{IoPattern, OpCursor, OpKind, Request},
};
use crate::{
    constant::SCALAR_BYTES,
    utils::{challenge_bytes_len, field_from_be_bytes, field_from_le_bytes},
};

/// State held by the verifier while replaying the public part of a transcript.
///
/// Hints are filtered out of the IO pattern: they are decoded separately from the
/// pre-pass output. Every other call is checked against the next pending operation, which
/// may be consumed in several calls as long as kind and unit agree.
#[derive(Debug)]
pub struct VerifierState<'a> {
    /// Keccak duplex sponge seeded with the digest of the IO pattern.
    sponge: Keccak,
    /// Pending absorb and squeeze operations.
    cursor: OpCursor,
    /// Public bytes not yet absorbed.
    public: &'a [u8],
}

impl<'a> VerifierState<'a> {
    /// Create a new verifier state from a parsed IO pattern and the public stream produced by
    /// [`split_transcript`](super::transcript::split_transcript).
    #[must_use]
    pub fn new(pattern: &IoPattern, public: &'a [u8]) -> Self {
        Self {
            sponge: sponge_for_pattern(pattern.as_bytes()),
            cursor: OpCursor::new(
                pattern
                    .ops()
                    .iter()
                    .filter(|op| op.kind != OpKind::Hint)
                    .cloned(),
            ),
            public,
        }
    }

    /// Takes `len` public bytes and absorbs them in the sponge.
    fn absorb_public(&mut self, label: &str, len: usize) -> Result<&'a [u8], TranscriptError> {
        if self.public.len() < len {
            return Err(TranscriptError::TranscriptUnderrun {
                label: label.to_string(),
                needed: len,
                available: self.public.len(),
            });
        }
        let public: &'a [u8] = self.public;
        let (bytes, rest) = public.split_at(len);
        self.public = rest;
        self.sponge.absorb(bytes);
        Ok(bytes)
    }

    /// Consume and return `n` scalars from the public stream, absorbing them in the sponge.
    ///
    /// Scalars are 32-byte little-endian encodings, reduced into the field.
    pub fn next_scalars<F: Field>(&mut self, n: usize) -> Result<Vec<F>, TranscriptError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let label = self.cursor.consume(Request::Scalars, n)?;
        let bytes = self.absorb_public(&label, n * SCALAR_BYTES)?;
        Ok(bytes.chunks_exact(SCALAR_BYTES).map(field_from_le_bytes).collect())
    }

    /// Consume and return a single scalar.
    pub fn next_scalar<F: Field>(&mut self) -> Result<F, TranscriptError> {
        Ok(self.next_scalars(1)?[0])
    }

    /// Consume and return `n` raw bytes (used for the proof-of-work nonce).
    pub fn next_bytes(&mut self, n: usize) -> Result<Vec<u8>, TranscriptError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let label = self.cursor.consume(Request::Bytes, n)?;
        Ok(self.absorb_public(&label, n)?.to_vec())
    }

    /// Squeeze `n` challenge bytes from the sponge.
    pub fn challenge_bytes(&mut self, n: usize) -> Result<Vec<u8>, TranscriptError> {
        let mut out = vec![0u8; n];
        if n > 0 {
            self.cursor.consume(Request::Challenge, n)?;
            self.sponge.squeeze(&mut out);
        }
        Ok(out)
    }

    /// Squeeze `n` challenge scalars.
    ///
    /// Each scalar is derived from `(bits(p) + 128) / 8` bytes read as a big-endian integer
    /// and reduced modulo `p`.
    pub fn challenge_scalars<F: Field>(&mut self, n: usize) -> Result<Vec<F>, TranscriptError> {
        let width = challenge_bytes_len::<F>();
        let bytes = self.challenge_bytes(n * width)?;
        Ok(bytes.chunks_exact(width).map(field_from_be_bytes).collect())
    }

    /// Squeeze a single challenge scalar.
    pub fn challenge_scalar<F: Field>(&mut self) -> Result<F, TranscriptError> {
        Ok(self.challenge_scalars(1)?[0])
    }

    /// Checks that every operation of the pattern was replayed and no public byte is left.
    pub fn finish(mut self) -> Result<(), TranscriptError> {
        self.cursor.finish()?;
        if !self.public.is_empty() {
            return Err(TranscriptError::TrailingBytes(self.public.len()));
        }
        self.sponge.zeroize();
        Ok(())
    }
}
