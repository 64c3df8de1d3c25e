//! Zero-knowledge wrapper around the cubic Spartan sumcheck.
//!
//! The prover blinds the sumcheck with a multilinear polynomial `G` committed under the hiding
//! parameters. The claim becomes `claim_0 + rho * sum(G)`, and once the rounds are done the
//! blinding contribution `rho * G(alpha)` is removed. The value `G(alpha)` is proven by a WHIR
//! proof on the hiding commitment, with the weight `eq(., alpha)` left to the caller.

use p3_field::PrimeField;
use tracing::{debug, instrument};

use crate::{
    fiat_shamir::{hints::ProofHints, verifier::VerifierState},
    merkle_tree::{IndexOracle, TwoToOneCompression},
    poly::multilinear::MultilinearPoint,
    sumcheck::verifier::verify_cubic_sumcheck_rounds,
    whir::{
        committer::reader::CommitmentReader,
        statement::Statement,
        verifier::{Verifier, WhirOutcome, errors::VerifierError},
    },
};

/// Result of the zero-knowledge sumcheck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkSumcheckOutcome<F> {
    /// Sumcheck challenges in round order, most significant variable first.
    pub randomness: MultilinearPoint<F>,
    /// Claim left once the blinding has been removed.
    pub last_claim: F,
    /// Claimed values of the hiding polynomial and of its own blinding at `randomness`.
    pub blinded_sums: [F; 2],
    pub hiding: WhirOutcome<F>,
}

/// Replays the blinded sumcheck of `initial_claim` over `rounds` variables.
///
/// `hiding_deferred` is the evaluation of `eq(., alpha)` at the folding randomness of the
/// hiding WHIR proof; it is trusted here and must be checked by the caller.
#[instrument(skip_all, fields(rounds))]
pub fn verify_zk_sumcheck<F, C, O>(
    hiding_verifier: &Verifier<'_, F, C, O>,
    verifier_state: &mut VerifierState<'_>,
    hints: &mut ProofHints,
    initial_claim: F,
    rounds: usize,
    hiding_deferred: F,
) -> Result<ZkSumcheckOutcome<F>, VerifierError>
where
    F: PrimeField,
    C: TwoToOneCompression<F>,
    O: IndexOracle,
{
    let commitment = CommitmentReader::<F>::new(hiding_verifier).parse_commitment(verifier_state)?;

    let sum_of_g: F = verifier_state.next_scalar()?;
    let rho: F = verifier_state.challenge_scalar()?;
    let mut claim = initial_claim + sum_of_g * rho;

    let randomness = verify_cubic_sumcheck_rounds(verifier_state, &mut claim, rounds)?;

    let sums: Vec<F> = verifier_state.next_scalars(2)?;
    let blinded_sums = [sums[0], sums[1]];
    claim -= blinded_sums[0] * rho;
    debug!("blinded sumcheck reduced");

    let statement = Statement::new(vec![vec![blinded_sums[0]], vec![blinded_sums[1]]]);
    let hiding = hiding_verifier.verify(
        verifier_state,
        hints,
        &commitment,
        &statement,
        &[hiding_deferred],
    )?;

    Ok(ZkSumcheckOutcome {
        randomness,
        last_claim: claim,
        blinded_sums,
        hiding,
    })
}
