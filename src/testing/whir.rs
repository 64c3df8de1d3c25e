//! Honest WHIR prover over the verifier's leaf layout.
//!
//! A leaf of an oracle folded by `k` holds, for every polynomial of the batch, the `2^k`
//! partial sums `q[i_lo] = sum_{i_hi} c[i_hi * 2^k + i_lo] * y^i_hi` at the domain point `y`
//! of the leaf. Folding `q` with the round randomness gives the folded polynomial at `y`.

use itertools::Itertools;
use p3_field::PrimeField;
use tracing::instrument;

use super::prove_pow;
use crate::{
    fiat_shamir::{
        errors::TranscriptError,
        hints::{Fp256, FullMultiPath, HintSerialize},
        prover::ProverState,
    },
    merkle_tree::{KeccakCompression, MerkleTree},
    parameters::{WhirParameters, stir_query_bytes},
    poly::{coeffs::CoefficientList, evals::EvaluationsList, multilinear::MultilinearPoint},
    utils::{dot_product, field_to_limbs},
    whir::{statement::Statement, verifier::utils::stir_queries_from_bytes},
};

/// A batch of polynomials committed under one root.
#[derive(Debug, Clone)]
pub struct Witness<F> {
    pub polynomials: Vec<CoefficientList<F>>,
    tree: MerkleTree<F>,
    pub ood_points: Vec<F>,
    /// `ood_answers[b][j]`: polynomial `b` at `ood_points[j]`.
    pub ood_answers: Vec<Vec<F>>,
    pub batching_randomness: F,
}

impl<F: PrimeField> Witness<F> {
    /// `sum_b B^b * p_b`.
    #[must_use]
    pub fn combined(&self) -> CoefficientList<F> {
        combine_polynomials(&self.polynomials, self.batching_randomness)
    }

    /// Claims of every polynomial of the batch on the linear statements `weights`.
    #[must_use]
    pub fn statement(&self, weights: &[EvaluationsList<F>]) -> Statement<F> {
        let evaluations = self
            .polynomials
            .iter()
            .map(CoefficientList::to_evaluations)
            .collect_vec();
        let mut statement = Statement::default();
        for weight in weights {
            let claims = evaluations
                .iter()
                .map(|evals| dot_product(evals.evals(), weight.evals()))
                .collect_vec();
            statement.add_claim(&claims);
        }
        statement
    }
}

/// What an honest opening leaves to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhirOpening<F> {
    /// Folding randomness, most significant variable first.
    pub folding_randomness: MultilinearPoint<F>,
    /// Every statement weight evaluated at the folding randomness, in statement order.
    pub deferred: Vec<F>,
}

/// Oracle the next STIR step opens.
#[derive(Debug, Clone, Copy)]
enum Opened<'w, F> {
    /// The commitments the proof starts from; every one of them is opened.
    Initial(&'w [Witness<F>]),
    Round(&'w MerkleTree<F>),
}

/// Honest prover for one set of WHIR parameters.
#[derive(Debug, Clone, Copy)]
pub struct WhirProver<'a, F> {
    params: &'a WhirParameters<F>,
}

impl<'a, F: PrimeField> WhirProver<'a, F> {
    #[must_use]
    pub const fn new(params: &'a WhirParameters<F>) -> Self {
        Self { params }
    }

    /// Commits to a batch of `batch_size` polynomials of `num_variables` variables.
    #[instrument(skip_all, fields(batch_size = polynomials.len()))]
    pub fn commit(
        &self,
        prover_state: &mut ProverState,
        polynomials: Vec<CoefficientList<F>>,
    ) -> Result<Witness<F>, TranscriptError> {
        assert_eq!(polynomials.len(), self.params.batch_size);
        assert!(
            polynomials
                .iter()
                .all(|p| p.num_variables() == self.params.num_variables)
        );

        let tree = self.oracle(&polynomials, 0);
        prover_state.add_scalar(tree.root())?;

        let ood_points: Vec<F> =
            prover_state.challenge_scalars(self.params.commitment_ood_samples)?;
        let ood_answers = polynomials
            .iter()
            .map(|poly| {
                ood_points
                    .iter()
                    .map(|&point| poly.evaluate_at_univariate(point))
                    .collect_vec()
            })
            .collect_vec();
        prover_state.add_scalars(&ood_answers.concat())?;
        let batching_randomness = prover_state.challenge_scalar()?;

        Ok(Witness {
            polynomials,
            tree,
            ood_points,
            ood_answers,
            batching_randomness,
        })
    }

    /// Opens one commitment on the statements `weights`.
    pub fn prove(
        &self,
        prover_state: &mut ProverState,
        witness: &Witness<F>,
        weights: &[EvaluationsList<F>],
    ) -> Result<WhirOpening<F>, TranscriptError> {
        let combination: F = prover_state.challenge_scalar()?;
        let constraints = witness
            .ood_points
            .iter()
            .map(|&point| self.ood_weight(point))
            .chain(weights.iter().cloned())
            .collect_vec();
        let table = combine_tables(&constraints, combination);

        self.prove_rounds(
            prover_state,
            witness.combined(),
            table,
            Opened::Initial(std::slice::from_ref(witness)),
            weights,
        )
    }

    /// Opens several commitments together, `weights[i]` holding the statements of commitment
    /// `i`.
    pub fn prove_batch(
        &self,
        prover_state: &mut ProverState,
        witnesses: &[Witness<F>],
        weights: &[Vec<EvaluationsList<F>>],
    ) -> Result<WhirOpening<F>, TranscriptError> {
        assert_eq!(witnesses.len(), weights.len());

        // Columns: every out-of-domain point, then every statement.
        let columns = witnesses
            .iter()
            .flat_map(|w| w.ood_points.iter().map(|&point| self.ood_weight(point)))
            .chain(weights.iter().flatten().cloned())
            .collect_vec();
        let combined = witnesses.iter().map(Witness::combined).collect_vec();
        let matrix = combined
            .iter()
            .flat_map(|poly| {
                let evals = poly.to_evaluations();
                columns
                    .iter()
                    .map(|column| dot_product(evals.evals(), column.evals()))
                    .collect_vec()
            })
            .collect_vec();
        prover_state.add_scalars(&matrix)?;

        let batch_randomness: F = prover_state.challenge_scalar()?;
        let combination: F = prover_state.challenge_scalar()?;
        let table = combine_tables(&columns, combination);

        self.prove_rounds(
            prover_state,
            combine_polynomials(&combined, batch_randomness),
            table,
            Opened::Initial(witnesses),
            &weights.concat(),
        )
    }

    #[allow(clippy::too_many_lines)]
    fn prove_rounds(
        &self,
        prover_state: &mut ProverState,
        polynomial: CoefficientList<F>,
        weight_table: Vec<F>,
        initial: Opened<'_, F>,
        statement_weights: &[EvaluationsList<F>],
    ) -> Result<WhirOpening<F>, TranscriptError> {
        let params = self.params;
        let mut evals = polynomial.to_evaluations().into_evals();
        let mut table = weight_table;
        let mut sampled =
            prove_sumcheck(prover_state, &mut evals, &mut table, params.folding_factor_at(0))?;
        let mut current = CoefficientList::from(EvaluationsList::new(evals.clone()));

        let mut trees = Vec::with_capacity(params.n_rounds());
        for (round, round_params) in params.round_parameters.iter().enumerate() {
            let tree = self.oracle(std::slice::from_ref(&current), round + 1);
            prover_state.add_scalar(tree.root())?;

            let ood_points: Vec<F> = prover_state.challenge_scalars(round_params.ood_samples)?;
            let ood_answers = ood_points
                .iter()
                .map(|&point| current.evaluate_at_univariate(point))
                .collect_vec();
            prover_state.add_scalars(&ood_answers)?;

            prove_pow::<F>(prover_state, round_params.pow_bits)?;
            let opened = match trees.last() {
                None => initial,
                Some(previous) => Opened::Round(previous),
            };
            let stir_points =
                self.open(prover_state, round, round_params.num_queries, opened)?;

            let combination: F = prover_state.challenge_scalar()?;
            let n = current.num_variables();
            for (point, coeff) in ood_points.iter().chain(&stir_points).zip(combination.powers()) {
                let eq = EvaluationsList::eq_table(&MultilinearPoint::expand_from_univariate(
                    *point, n,
                ));
                for (acc, &value) in table.iter_mut().zip(eq.evals()) {
                    *acc += coeff * value;
                }
            }

            sampled.extend(prove_sumcheck(
                prover_state,
                &mut evals,
                &mut table,
                params.folding_factor_at(round + 1),
            )?);
            current = CoefficientList::from(EvaluationsList::new(evals.clone()));
            trees.push(tree);
        }

        prover_state.add_scalars(current.coeffs())?;
        prove_pow::<F>(prover_state, params.final_pow_bits)?;
        let opened = match trees.last() {
            None => initial,
            Some(previous) => Opened::Round(previous),
        };
        self.open(prover_state, params.n_rounds(), params.final_queries, opened)?;

        let final_randomness = prove_sumcheck(
            prover_state,
            &mut evals,
            &mut table,
            params.final_sumcheck_rounds,
        )?;
        sampled.extend(final_randomness);
        prove_pow::<F>(prover_state, params.final_folding_pow_bits)?;

        sampled.reverse();
        let folding_randomness = MultilinearPoint(sampled);
        let deferred = statement_weights
            .iter()
            .map(|weight| weight.evaluate(&folding_randomness))
            .collect();
        Ok(WhirOpening {
            folding_randomness,
            deferred,
        })
    }

    /// Samples the STIR queries of `round`, writes the opening hints and returns the points
    /// of the folded domain the queries land on.
    fn open(
        &self,
        prover_state: &mut ProverState,
        round: usize,
        num_queries: usize,
        opened: Opened<'_, F>,
    ) -> Result<Vec<F>, TranscriptError> {
        let params = self.params;
        let folded = params.domain_size_at(round) >> params.folding_factor_at(round);
        let bytes = prover_state.challenge_bytes(num_queries * stir_query_bytes(folded))?;
        let queries = stir_queries_from_bytes(&bytes, folded, num_queries);

        // The IO pattern names the hints: per commitment in a batched proof, plain otherwise.
        match opened {
            Opened::Initial(witnesses) => {
                for witness in witnesses {
                    write_opening(prover_state, &witness.tree, &queries)?;
                }
            }
            Opened::Round(tree) => write_opening(prover_state, tree, &queries)?,
        }

        let generator = params.query_generator(round);
        Ok(queries
            .iter()
            .map(|&index| generator.exp_u64(index as u64))
            .collect())
    }

    /// Merkle tree of the oracle queried in `round`.
    fn oracle(&self, polynomials: &[CoefficientList<F>], round: usize) -> MerkleTree<F> {
        let folding_factor = self.params.folding_factor_at(round);
        let num_leaves = self.params.domain_size_at(round) >> folding_factor;
        let generator = self.params.query_generator(round);
        let leaves = generator
            .powers()
            .take(num_leaves)
            .map(|point| {
                polynomials
                    .iter()
                    .flat_map(|poly| leaf_block(poly.coeffs(), folding_factor, point))
                    .collect_vec()
            })
            .collect_vec();
        MerkleTree::new(&KeccakCompression, leaves)
    }

    /// Weight of an out-of-domain constraint: `eq(expand(point), .)`.
    fn ood_weight(&self, point: F) -> EvaluationsList<F> {
        EvaluationsList::eq_table(&MultilinearPoint::expand_from_univariate(
            point,
            self.params.num_variables,
        ))
    }
}

fn leaf_block<F: PrimeField>(coeffs: &[F], folding_factor: usize, point: F) -> Vec<F> {
    let width = 1 << folding_factor;
    let mut block = vec![F::ZERO; width];
    for (chunk, power) in coeffs.chunks_exact(width).zip(point.powers()) {
        for (acc, &c) in block.iter_mut().zip(chunk) {
            *acc += power * c;
        }
    }
    block
}

fn write_opening<F: PrimeField>(
    prover_state: &mut ProverState,
    tree: &MerkleTree<F>,
    queries: &[usize],
) -> Result<(), TranscriptError> {
    let answers: Vec<Vec<Fp256>> = queries
        .iter()
        .map(|&index| {
            tree.leaf(index)
                .iter()
                .map(|value| Fp256(field_to_limbs(value)))
                .collect()
        })
        .collect();
    let paths = FullMultiPath {
        proofs: queries.iter().map(|&index| tree.hint_path(index)).collect(),
    };
    prover_state.hint(&answers.encode())?;
    prover_state.hint(&paths.encode())
}

fn combine_polynomials<F: PrimeField>(polynomials: &[CoefficientList<F>], randomness: F) -> CoefficientList<F> {
    let mut out = vec![F::ZERO; polynomials[0].num_coeffs()];
    for (poly, coeff) in polynomials.iter().zip(randomness.powers()) {
        for (acc, &c) in out.iter_mut().zip(poly.coeffs()) {
            *acc += coeff * c;
        }
    }
    CoefficientList::new(out)
}

fn combine_tables<F: PrimeField>(tables: &[EvaluationsList<F>], randomness: F) -> Vec<F> {
    let mut out = vec![F::ZERO; tables.first().map_or(1, EvaluationsList::num_evals)];
    for (table, coeff) in tables.iter().zip(randomness.powers()) {
        for (acc, &value) in out.iter_mut().zip(table.evals()) {
            *acc += coeff * value;
        }
    }
    out
}

/// Quadratic sumcheck of `sum_b evals(b) * weights(b)`, fixing the lowest variable first.
///
/// Returns the challenges in sampling order.
pub fn prove_sumcheck<F: PrimeField>(
    prover_state: &mut ProverState,
    evals: &mut Vec<F>,
    weights: &mut Vec<F>,
    rounds: usize,
) -> Result<Vec<F>, TranscriptError> {
    let mut challenges = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let (mut h0, mut h1, mut h2) = (F::ZERO, F::ZERO, F::ZERO);
        for (p, w) in evals.chunks_exact(2).zip(weights.chunks_exact(2)) {
            h0 += p[0] * w[0];
            h1 += p[1] * w[1];
            h2 += (p[1].double() - p[0]) * (w[1].double() - w[0]);
        }
        prover_state.add_scalars(&[h0, h1, h2])?;
        let r: F = prover_state.challenge_scalar()?;
        *evals = EvaluationsList::new(std::mem::take(evals)).fold_lsb(r).into_evals();
        *weights = EvaluationsList::new(std::mem::take(weights)).fold_lsb(r).into_evals();
        challenges.push(r);
    }
    Ok(challenges)
}
