//! Honest provers writing transcripts the verifier accepts.
//!
//! Only compiled for tests and with the `test-utils` feature (benches).

use p3_field::PrimeField;
use rand::{Rng, rngs::StdRng};

use crate::{
    FieldElement,
    config::WhirConfig,
    constant::POW_CHALLENGE_BYTES,
    fiat_shamir::{errors::TranscriptError, prover::ProverState},
    merkle_tree::{KeccakCompression, verify_pow},
    utils::exp_biguint,
};

pub mod spartan;
pub mod whir;

/// Generator of the multiplicative subgroup of order `2^log_size`.
///
/// `5` generates the multiplicative group of the BN254 scalar field.
#[must_use]
pub fn domain_generator<F: PrimeField>(log_size: usize) -> F {
    let exponent = (F::order() - 1u32) >> log_size;
    exp_biguint(F::from_u64(5), &exponent)
}

/// WHIR parameters with one out-of-domain sample and no proof-of-work in every round.
#[must_use]
pub fn whir_config(n_rounds: usize, folding_factor: Vec<usize>, n_vars: usize, rate: usize) -> WhirConfig {
    WhirConfig {
        n_rounds,
        rate,
        n_vars,
        folding_factor,
        ood_samples: vec![1; n_rounds],
        num_queries: vec![4; n_rounds],
        pow_bits: vec![0; n_rounds],
        final_queries: 3,
        final_pow_bits: 0,
        final_folding_pow_bits: 0,
        domain_generator: domain_generator::<FieldElement>(n_vars + rate)
            .as_canonical_biguint()
            .to_string(),
        batch_size: 1,
    }
}

/// Grinds a proof-of-work nonce and absorbs it. Zero bits touch nothing.
pub fn prove_pow<F: PrimeField>(
    prover_state: &mut ProverState,
    bits: usize,
) -> Result<(), TranscriptError> {
    if bits == 0 {
        return Ok(());
    }
    let challenge = prover_state.challenge_bytes(POW_CHALLENGE_BYTES)?;
    let nonce = (0u64..)
        .find(|nonce| {
            verify_pow::<F, _>(&KeccakCompression, &challenge, &nonce.to_be_bytes(), bits).is_ok()
        })
        .unwrap_or_default();
    prover_state.add_bytes(&nonce.to_be_bytes())
}

/// `len` uniformly sampled field elements.
pub fn random_vec<F: PrimeField>(rng: &mut StdRng, len: usize) -> Vec<F> {
    (0..len).map(|_| F::from_u64(rng.random())).collect()
}

#[cfg(test)]
mod tests {
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::parameters::WhirParameters;

    type F = FieldElement;

    #[test]
    fn test_domain_generator_order() {
        let generator = domain_generator::<F>(5);
        assert_eq!(generator.exp_power_of_2(5), F::ONE);
        assert_ne!(generator.exp_power_of_2(4), F::ONE);
    }

    #[test]
    fn test_whir_config_is_valid() {
        let params = WhirParameters::<F>::new(&whir_config(1, vec![4, 4], 8, 1)).unwrap();
        assert_eq!(params.starting_domain_size, 512);
        assert_eq!(params.final_sumcheck_rounds, 0);
        assert_eq!(params.n_rounds(), 1);
    }
}
