use p3_field::PrimeField;
use tracing::instrument;

use super::sumcheck_polynomial::{CubicSumcheckPolynomial, SumcheckPolynomial};
use crate::{
    fiat_shamir::verifier::VerifierState,
    merkle_tree::TwoToOneCompression,
    poly::multilinear::MultilinearPoint,
    whir::verifier::{errors::VerifierError, utils::verify_pow_round},
};

fn sumcheck_failed<F: PrimeField>(round: usize, expected: F, actual: F) -> VerifierError {
    VerifierError::SumcheckFailed {
        round,
        expected: expected.as_canonical_biguint().to_string(),
        actual: actual.as_canonical_biguint().to_string(),
    }
}

/// Replays `rounds` rounds of the quadratic sumcheck and returns the folding randomness in
/// reverse order.
///
/// Each round reads `h(0), h(1), h(2)`, samples `r`, checks `h(0) + h(1)` against the running
/// claim and moves the claim to `h(r)`. The prover fixes the lowest variable first, so reversing
/// the challenges gives a point whose first coordinate is the most significant variable.
///
/// `pow_bits > 0` adds a proof-of-work after every round.
#[instrument(skip_all, fields(rounds))]
pub fn verify_sumcheck_rounds<F, C>(
    verifier_state: &mut VerifierState<'_>,
    compression: &C,
    claimed_sum: &mut F,
    rounds: usize,
    pow_bits: usize,
) -> Result<MultilinearPoint<F>, VerifierError>
where
    F: PrimeField,
    C: TwoToOneCompression<F>,
{
    let mut randomness = Vec::with_capacity(rounds);

    for round in 0..rounds {
        let evals: Vec<F> = verifier_state.next_scalars(3)?;
        let poly = SumcheckPolynomial::from_slice(&evals)
            .ok_or_else(|| VerifierError::Malformed("sumcheck round needs 3 values".to_string()))?;
        let rand: F = verifier_state.challenge_scalar()?;

        let actual = poly.sum_over_boolean_hypercube();
        if actual != *claimed_sum {
            return Err(sumcheck_failed(round, *claimed_sum, actual));
        }

        verify_pow_round(verifier_state, compression, pow_bits)?;

        *claimed_sum = poly.evaluate_at(rand);
        randomness.push(rand);
    }

    randomness.reverse();
    Ok(MultilinearPoint(randomness))
}

/// Replays `rounds` rounds of the cubic sumcheck used by the zero-knowledge Spartan wrapper.
///
/// The prover binds the most significant variable first, so the challenges are returned in
/// round order.
#[instrument(skip_all, fields(rounds))]
pub fn verify_cubic_sumcheck_rounds<F: PrimeField>(
    verifier_state: &mut VerifierState<'_>,
    claimed_sum: &mut F,
    rounds: usize,
) -> Result<MultilinearPoint<F>, VerifierError> {
    let mut randomness = Vec::with_capacity(rounds);

    for round in 0..rounds {
        let coeffs: Vec<F> = verifier_state.next_scalars(4)?;
        let poly = CubicSumcheckPolynomial::from_slice(&coeffs)
            .ok_or_else(|| VerifierError::Malformed("cubic round needs 4 values".to_string()))?;
        let rand: F = verifier_state.challenge_scalar()?;

        let actual = poly.sum_over_boolean_hypercube();
        if actual != *claimed_sum {
            return Err(sumcheck_failed(round, *claimed_sum, actual));
        }

        *claimed_sum = poly.evaluate_at(rand);
        randomness.push(rand);
    }

    Ok(MultilinearPoint(randomness))
}
