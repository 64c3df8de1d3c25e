use p3_field::{Field, PrimeField};

use super::{
    errors::TranscriptError,
    keccak::{Keccak, sponge_for_pattern},
    pattern::{IoPattern, OpCursor, Request},
};
use crate::{
    constant::HINT_LENGTH_BYTES,
    utils::{challenge_bytes_len, field_from_be_bytes, field_to_le_bytes},
};

/// Prover state for a Fiat-Shamir protocol.
///
/// Writes the raw transcript (public messages interleaved with length-prefixed hints) while
/// following the same IO pattern and sponge as [`VerifierState`](super::verifier::VerifierState).
#[derive(Debug)]
pub struct ProverState {
    sponge: Keccak,
    cursor: OpCursor,
    transcript: Vec<u8>,
}

impl ProverState {
    /// Initialize a new prover state.
    #[must_use]
    pub fn new(pattern: &IoPattern) -> Self {
        Self {
            sponge: sponge_for_pattern(pattern.as_bytes()),
            cursor: OpCursor::new(pattern.ops().iter().cloned()),
            transcript: Vec::new(),
        }
    }

    /// Raw transcript written so far.
    #[must_use]
    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }

    // Passing data to the verifier:

    pub fn add_scalars<F: PrimeField>(&mut self, scalars: &[F]) -> Result<(), TranscriptError> {
        if scalars.is_empty() {
            return Ok(());
        }
        self.cursor.consume(Request::Scalars, scalars.len())?;
        for scalar in scalars {
            let bytes = field_to_le_bytes(scalar);
            self.sponge.absorb(&bytes);
            self.transcript.extend_from_slice(&bytes);
        }
        Ok(())
    }

    pub fn add_scalar<F: PrimeField>(&mut self, scalar: F) -> Result<(), TranscriptError> {
        self.add_scalars(&[scalar])
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<(), TranscriptError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.cursor.consume(Request::Bytes, bytes.len())?;
        self.sponge.absorb(bytes);
        self.transcript.extend_from_slice(bytes);
        Ok(())
    }

    // Passing hints to the verifier:

    pub fn hint(&mut self, payload: &[u8]) -> Result<(), TranscriptError> {
        self.cursor.consume(Request::Hint, 0)?;
        let length = u32::try_from(payload.len())
            .map_err(|_| TranscriptError::InvalidPattern("hint too long".to_string()))?;
        debug_assert_eq!(length.to_le_bytes().len(), HINT_LENGTH_BYTES);
        self.transcript.extend_from_slice(&length.to_le_bytes());
        self.transcript.extend_from_slice(payload);
        Ok(())
    }

    // Generating pseudo-random values:

    pub fn challenge_bytes(&mut self, n: usize) -> Result<Vec<u8>, TranscriptError> {
        let mut out = vec![0u8; n];
        if n > 0 {
            self.cursor.consume(Request::Challenge, n)?;
            self.sponge.squeeze(&mut out);
        }
        Ok(out)
    }

    pub fn challenge_scalars<F: Field>(&mut self, n: usize) -> Result<Vec<F>, TranscriptError> {
        let width = challenge_bytes_len::<F>();
        let bytes = self.challenge_bytes(n * width)?;
        Ok(bytes.chunks_exact(width).map(field_from_be_bytes).collect())
    }

    pub fn challenge_scalar<F: Field>(&mut self) -> Result<F, TranscriptError> {
        Ok(self.challenge_scalars(1)?[0])
    }

    /// Checks that the whole pattern was followed and returns the raw transcript.
    pub fn finish(self) -> Result<Vec<u8>, TranscriptError> {
        self.cursor.finish()?;
        Ok(self.transcript)
    }
}

#[cfg(test)]
mod tests {
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::{
        FieldElement,
        fiat_shamir::{transcript::split_transcript, verifier::VerifierState},
    };

    type F = FieldElement;

    #[test]
    fn test_prover_and_verifier_agree() {
        let pattern = IoPattern::parse(
            b"proto\0A2values\0S47challenge\0Hmerkle_proof\0S32pow_queries\0A8pow-nonce",
        )
        .unwrap();

        let mut prover = ProverState::new(&pattern);
        prover
            .add_scalars(&[F::from_u8(3), F::from_u64(1 << 40)])
            .unwrap();
        let challenge: F = prover.challenge_scalar().unwrap();
        prover.hint(&[9, 9, 9]).unwrap();
        let pow_challenge = prover.challenge_bytes(32).unwrap();
        prover.add_bytes(&7u64.to_be_bytes()).unwrap();
        let transcript = prover.finish().unwrap();

        let split = split_transcript(&pattern, &transcript).unwrap();
        assert_eq!(split.hints[0].payload, vec![9, 9, 9]);

        let mut verifier = VerifierState::new(&pattern, &split.public);
        assert_eq!(
            verifier.next_scalars::<F>(2).unwrap(),
            vec![F::from_u8(3), F::from_u64(1 << 40)]
        );
        assert_eq!(verifier.challenge_scalar::<F>().unwrap(), challenge);
        assert_eq!(verifier.challenge_bytes(32).unwrap(), pow_challenge);
        assert_eq!(verifier.next_bytes(8).unwrap(), 7u64.to_be_bytes().to_vec());
        verifier.finish().unwrap();
    }

    #[test]
    fn test_prover_rejects_out_of_order_hint() {
        let pattern = IoPattern::parse(b"proto\0A1value\0Hmerkle_proof").unwrap();
        let mut prover = ProverState::new(&pattern);
        assert!(prover.hint(&[]).is_err());
    }
}
