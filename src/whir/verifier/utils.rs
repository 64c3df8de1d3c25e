use p3_field::{Field, PrimeField};

use super::errors::VerifierError;
use crate::{
    constant::{POW_CHALLENGE_BYTES, POW_NONCE_BYTES},
    fiat_shamir::verifier::VerifierState,
    merkle_tree::{TwoToOneCompression, verify_pow},
    parameters::stir_query_bytes,
};

/// Replays a proof-of-work: squeezes the challenge, reads the nonce and checks it.
///
/// Zero bits touch neither the transcript nor the sponge.
pub fn verify_pow_round<F, C>(
    verifier_state: &mut VerifierState<'_>,
    compression: &C,
    bits: usize,
) -> Result<(), VerifierError>
where
    F: PrimeField,
    C: TwoToOneCompression<F>,
{
    if bits == 0 {
        return Ok(());
    }
    let challenge = verifier_state.challenge_bytes(POW_CHALLENGE_BYTES)?;
    let nonce = verifier_state.next_bytes(POW_NONCE_BYTES)?;
    verify_pow::<F, C>(compression, &challenge, &nonce, bits)
}

/// Samples `num_queries` STIR indexes into a folded domain of `folded_domain_size` points.
pub fn get_challenge_stir_queries(
    verifier_state: &mut VerifierState<'_>,
    folded_domain_size: usize,
    num_queries: usize,
) -> Result<Vec<usize>, VerifierError> {
    let bytes_per_query = stir_query_bytes(folded_domain_size);
    let bytes = verifier_state.challenge_bytes(num_queries * bytes_per_query)?;
    Ok(stir_queries_from_bytes(&bytes, folded_domain_size, num_queries))
}

/// Every query is read big-endian from its own chunk of challenge bytes and reduced to its
/// low `log2(folded_domain_size)` bits. Indexes are neither sorted nor deduplicated.
#[must_use]
pub fn stir_queries_from_bytes(
    bytes: &[u8],
    folded_domain_size: usize,
    num_queries: usize,
) -> Vec<usize> {
    debug_assert!(folded_domain_size.is_power_of_two());
    let bytes_per_query = stir_query_bytes(folded_domain_size);
    if bytes_per_query == 0 {
        return vec![0; num_queries];
    }
    let mask = folded_domain_size - 1;
    bytes
        .chunks_exact(bytes_per_query)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | usize::from(b))
                & mask
        })
        .collect()
}

/// Collapses a leaf holding `batch_size` stacked blocks into one block:
/// `out[j] = sum_b randomness^b * leaf[b * block + j]`.
pub fn collapse_leaf<F: Field>(
    leaf: &[F],
    batch_size: usize,
    randomness: F,
) -> Result<Vec<F>, VerifierError> {
    if batch_size == 0 || leaf.len() % batch_size != 0 {
        return Err(VerifierError::Malformed(format!(
            "leaf of {} values cannot hold {batch_size} blocks",
            leaf.len()
        )));
    }
    let block = leaf.len() / batch_size;
    let mut out = vec![F::ZERO; block];
    for (chunk, coeff) in leaf.chunks_exact(block).zip(randomness.powers()) {
        for (acc, &value) in out.iter_mut().zip(chunk) {
            *acc += coeff * value;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::{
        FieldElement,
        fiat_shamir::{domain_separator::DomainSeparator, prover::ProverState},
        merkle_tree::KeccakCompression,
    };

    #[test]
    fn test_collapse_leaf() {
        type F = BabyBear;
        let leaf: Vec<F> = (1..=4).map(F::from_u64).collect();
        let r = F::from_u64(10);
        assert_eq!(
            collapse_leaf(&leaf, 2, r).unwrap(),
            vec![F::from_u64(31), F::from_u64(42)]
        );
        assert_eq!(collapse_leaf(&leaf, 1, r).unwrap(), leaf);
        assert!(collapse_leaf(&leaf, 3, r).is_err());
    }

    #[test]
    fn test_stir_queries_stay_in_domain() {
        let mut ds = DomainSeparator::new("stir");
        ds.challenge_bytes(10 * stir_query_bytes(32), "stir_queries");
        ds.challenge_bytes(3 * stir_query_bytes(512), "stir_queries");
        let pattern = ds.to_io_pattern().unwrap();

        let mut prover = ProverState::new(&pattern);
        let small = prover.challenge_bytes(10).unwrap();
        let large = prover.challenge_bytes(6).unwrap();

        let mut state = VerifierState::new(&pattern, &[]);
        let queries = get_challenge_stir_queries(&mut state, 32, 10).unwrap();
        assert_eq!(
            queries,
            small.iter().map(|&b| usize::from(b) & 31).collect::<Vec<_>>()
        );
        let queries = get_challenge_stir_queries(&mut state, 512, 3).unwrap();
        assert_eq!(
            queries,
            large
                .chunks_exact(2)
                .map(|c| ((usize::from(c[0]) << 8) | usize::from(c[1])) & 511)
                .collect::<Vec<_>>()
        );
        state.finish().unwrap();
    }

    #[test]
    fn test_single_point_domain_needs_no_bytes() {
        let pattern = DomainSeparator::new("stir").to_io_pattern().unwrap();
        let mut state = VerifierState::new(&pattern, &[]);
        assert_eq!(
            get_challenge_stir_queries(&mut state, 1, 3).unwrap(),
            vec![0, 0, 0]
        );
    }

    #[test]
    fn test_pow_round() {
        type F = FieldElement;
        let mut ds = DomainSeparator::new("pow");
        ds.pow(4);
        let pattern = ds.to_io_pattern().unwrap();

        let mut prover = ProverState::new(&pattern);
        let challenge = prover.challenge_bytes(POW_CHALLENGE_BYTES).unwrap();
        let nonce = (0u64..)
            .find(|n| {
                verify_pow::<F, _>(&KeccakCompression, &challenge, &n.to_be_bytes(), 4).is_ok()
            })
            .unwrap();
        prover.add_bytes(&nonce.to_be_bytes()).unwrap();
        let transcript = prover.finish().unwrap();

        let mut state = VerifierState::new(&pattern, &transcript);
        verify_pow_round::<F, _>(&mut state, &KeccakCompression, 4).unwrap();
        state.finish().unwrap();

        let pattern = DomainSeparator::new("pow").to_io_pattern().unwrap();
        let mut state = VerifierState::new(&pattern, &[]);
        verify_pow_round::<F, _>(&mut state, &KeccakCompression, 0).unwrap();
        state.finish().unwrap();
    }
}
