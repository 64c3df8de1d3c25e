//! Binding of the public inputs to the witness commitment.
//!
//! The prover commits to the hash of the public inputs, then proves the claim
//! `f_pub = sum_i x^i z_i` for a fresh challenge `x`, where `z = [1, inputs...]` are the first
//! entries of the committed witness. The claim is checked by the witness WHIR proof as an extra
//! linear statement whose weights are `w[i] = x^i`.

use p3_field::PrimeField;
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    fiat_shamir::verifier::VerifierState,
    poly::{coeffs::horner, multilinear::MultilinearPoint},
    utils::{field_from_le_bytes, field_to_le_bytes},
    whir::verifier::errors::VerifierError,
};

/// Trusted oracle hashing the public inputs into a field element.
pub trait PublicInputHasher<F> {
    fn hash(&self, inputs: &[F]) -> F;
}

/// SHA-256 over the 32-byte little-endian encoding of every input, read back little-endian
/// and reduced into the field. No inputs hash to zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256PublicInputHasher;

impl<F: PrimeField> PublicInputHasher<F> for Sha256PublicInputHasher {
    fn hash(&self, inputs: &[F]) -> F {
        if inputs.is_empty() {
            return F::ZERO;
        }
        let mut hasher = Sha256::new();
        for input in inputs {
            hasher.update(field_to_le_bytes(input));
        }
        field_from_le_bytes(&hasher.finalize())
    }
}

/// Values read from the transcript when public inputs are bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicInputBinding<F> {
    /// Challenge `x` weighting the public wires.
    pub challenge: F,
    /// Claimed public-weight evaluation of the witness polynomial.
    pub f_pub: F,
    /// Same evaluation for the blinding polynomial committed alongside it.
    pub g_pub: F,
}

impl<F: PrimeField> PublicInputBinding<F> {
    /// Reads the hash of the public inputs, checks it against `hasher`, samples the weight
    /// challenge and reads the two claimed evaluations.
    #[instrument(skip_all, fields(num_inputs = inputs.len()))]
    pub fn read<H: PublicInputHasher<F>>(
        verifier_state: &mut VerifierState<'_>,
        hasher: &H,
        inputs: &[F],
    ) -> Result<Self, VerifierError> {
        let hash: F = verifier_state.next_scalar()?;
        if hash != hasher.hash(inputs) {
            return Err(VerifierError::PublicInputMismatch(
                "hash of the public inputs differs from the transcript".to_string(),
            ));
        }
        let challenge = verifier_state.challenge_scalar()?;
        let evaluations: Vec<F> = verifier_state.next_scalars(2)?;
        Ok(Self {
            challenge,
            f_pub: evaluations[0],
            g_pub: evaluations[1],
        })
    }

    /// Claims of the public-weight statement on the witness commitment, `[f_pub, g_pub]`.
    #[must_use]
    pub const fn claims(&self) -> [F; 2] {
        [self.f_pub, self.g_pub]
    }

    /// Checks `f_pub = sum_i x^i z_i` with `z = [1, inputs...]`.
    pub fn check_evaluation(&self, inputs: &[F]) -> Result<(), VerifierError> {
        let wires: Vec<F> = std::iter::once(F::ONE).chain(inputs.iter().copied()).collect();
        if horner(&wires, self.challenge) == self.f_pub {
            Ok(())
        } else {
            Err(VerifierError::PublicInputMismatch(
                "public inputs do not match the committed witness".to_string(),
            ))
        }
    }

    /// Checks the deferred evaluation of the public weights at the witness folding randomness.
    pub fn check_deferred(
        &self,
        num_inputs: usize,
        randomness: &MultilinearPoint<F>,
        deferred: F,
    ) -> Result<(), VerifierError> {
        if public_weights_evaluation(self.challenge, num_inputs, randomness) == deferred {
            Ok(())
        } else {
            Err(VerifierError::PublicInputMismatch(
                "deferred public weight evaluation is wrong".to_string(),
            ))
        }
    }
}

/// Multilinear extension of `w[i] = x^i` (for `i <= num_inputs`, zero elsewhere) at `point`.
#[must_use]
pub fn public_weights_evaluation<F: PrimeField>(
    challenge: F,
    num_inputs: usize,
    point: &MultilinearPoint<F>,
) -> F {
    challenge
        .powers()
        .take(num_inputs + 1)
        .enumerate()
        .map(|(i, weight)| weight * point.eq_poly(i))
        .sum()
}

#[cfg(test)]
mod tests {
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::{
        FieldElement,
        fiat_shamir::{domain_separator::DomainSeparator, prover::ProverState},
        poly::evals::EvaluationsList,
    };

    type F = FieldElement;

    #[test]
    fn test_sha256_hash_of_inputs() {
        let hasher = Sha256PublicInputHasher;
        assert_eq!(PublicInputHasher::<F>::hash(&hasher, &[]), F::ZERO);

        let inputs = [F::from_u64(1), F::from_u64(2)];
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&field_to_le_bytes(&inputs[0]));
        bytes.extend_from_slice(&field_to_le_bytes(&inputs[1]));
        let digest = Sha256::digest(&bytes);
        assert_eq!(hasher.hash(&inputs), field_from_le_bytes::<F>(&digest));
        assert_ne!(hasher.hash(&inputs), hasher.hash(&inputs[..1]));
    }

    #[test]
    fn test_read_binding() {
        let inputs = [F::from_u64(7)];
        let mut ds = DomainSeparator::new("public");
        ds.add_public_inputs::<F>();
        let pattern = ds.to_io_pattern().unwrap();

        let mut prover = ProverState::new(&pattern);
        prover.add_scalar(Sha256PublicInputHasher.hash(&inputs)).unwrap();
        let x: F = prover.challenge_scalar().unwrap();
        let f_pub = F::ONE + x * inputs[0];
        prover.add_scalars(&[f_pub, F::from_u64(3)]).unwrap();
        let transcript = prover.finish().unwrap();

        let mut state = VerifierState::new(&pattern, &transcript);
        let binding =
            PublicInputBinding::read(&mut state, &Sha256PublicInputHasher, &inputs).unwrap();
        state.finish().unwrap();

        assert_eq!(binding.challenge, x);
        assert_eq!(binding.claims(), [f_pub, F::from_u64(3)]);
        binding.check_evaluation(&inputs).unwrap();
        assert!(matches!(
            binding.check_evaluation(&[F::from_u64(8)]),
            Err(VerifierError::PublicInputMismatch(_))
        ));

        let mut state = VerifierState::new(&pattern, &transcript);
        assert!(matches!(
            PublicInputBinding::read(&mut state, &Sha256PublicInputHasher, &[F::from_u64(8)]),
            Err(VerifierError::PublicInputMismatch(_))
        ));
    }

    #[test]
    fn test_public_weights_match_their_table() {
        let x = F::from_u64(5);
        let point = MultilinearPoint(vec![F::from_u64(2), F::from_u64(9), F::from_u64(11)]);
        let mut table = vec![F::ZERO; 8];
        for (slot, weight) in table.iter_mut().zip(x.powers()).take(3) {
            *slot = weight;
        }
        assert_eq!(
            public_weights_evaluation(x, 2, &point),
            EvaluationsList::new(table).evaluate(&point)
        );

        let binding = PublicInputBinding {
            challenge: x,
            f_pub: F::ZERO,
            g_pub: F::ZERO,
        };
        let deferred = public_weights_evaluation(x, 2, &point);
        binding.check_deferred(2, &point, deferred).unwrap();
        assert!(binding.check_deferred(1, &point, deferred).is_err());
    }
}
