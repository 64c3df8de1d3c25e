use std::ops::Deref;

use p3_field::Field;
use tracing::instrument;

use crate::{
    fiat_shamir::{errors::TranscriptError, verifier::VerifierState},
    parameters::WhirParameters,
};

/// Represents a parsed commitment from the prover in the WHIR protocol.
///
/// A commitment binds `batch_size` polynomials under one Merkle root. Every polynomial is
/// answered at the same out-of-domain points, and the batch is later collapsed with powers of
/// the batching randomness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommitment<F> {
    /// Merkle root of the committed evaluation table.
    pub root: F,

    /// Points queried by the verifier outside the low-degree evaluation domain.
    pub ood_points: Vec<F>,

    /// `ood_answers[b][j]` is polynomial `b` of the batch evaluated at `ood_points[j]`.
    pub ood_answers: Vec<Vec<F>>,

    /// Randomness collapsing the batch into a single polynomial.
    pub batching_randomness: F,
}

impl<F: Field> ParsedCommitment<F> {
    /// Number of polynomials committed under the root.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.ood_answers.len()
    }

    /// Answers of the collapsed polynomial: `sum_b B^b * ood_answers[b][j]`.
    #[must_use]
    pub fn combined_ood_answers(&self) -> Vec<F> {
        self.combine(&self.ood_answers)
    }

    /// Collapses one value per polynomial of the batch (`rows[b][j]`) with powers of the
    /// batching randomness.
    #[must_use]
    pub fn combine(&self, rows: &[Vec<F>]) -> Vec<F> {
        let width = rows.first().map_or(0, Vec::len);
        let mut out = vec![F::ZERO; width];
        for (row, coeff) in rows.iter().zip(self.batching_randomness.powers()) {
            for (acc, &value) in out.iter_mut().zip(row) {
                *acc += coeff * value;
            }
        }
        out
    }
}

/// Helper for parsing commitment data during verification.
#[derive(Debug)]
pub struct CommitmentReader<'a, F>(&'a WhirParameters<F>);

impl<'a, F: Field> CommitmentReader<'a, F> {
    #[must_use]
    pub const fn new(params: &'a WhirParameters<F>) -> Self {
        Self(params)
    }

    /// Reads the root, samples the out-of-domain points, reads one answer per point and per
    /// polynomial of the batch, and samples the batching randomness.
    #[instrument(skip_all, fields(batch_size = self.batch_size))]
    pub fn parse_commitment(
        &self,
        verifier_state: &mut VerifierState<'_>,
    ) -> Result<ParsedCommitment<F>, TranscriptError> {
        let root = verifier_state.next_scalar()?;

        let samples = self.commitment_ood_samples;
        let ood_points = verifier_state.challenge_scalars(samples)?;
        let answers: Vec<F> = verifier_state.next_scalars(samples * self.batch_size)?;
        let ood_answers = if samples == 0 {
            vec![Vec::new(); self.batch_size]
        } else {
            answers.chunks_exact(samples).map(<[F]>::to_vec).collect()
        };

        let batching_randomness = verifier_state.challenge_scalar()?;

        Ok(ParsedCommitment {
            root,
            ood_points,
            ood_answers,
            batching_randomness,
        })
    }
}

impl<F> Deref for CommitmentReader<'_, F> {
    type Target = WhirParameters<F>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}
