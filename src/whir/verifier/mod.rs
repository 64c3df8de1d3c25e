use std::ops::Deref;

use p3_field::PrimeField;
use tracing::{debug, instrument};

use super::{committer::reader::ParsedCommitment, statement::Statement};
use crate::{
    fiat_shamir::{
        hints::{Fp256, FullMultiPath, ProofHints, labels},
        verifier::VerifierState,
    },
    merkle_tree::{
        IndexOracle, KeccakCompression, LinearIndexOracle, QueryBinding, TwoToOneCompression,
        openings_from_hints, verify_openings,
    },
    parameters::WhirParameters,
    poly::{coeffs::CoefficientList, multilinear::MultilinearPoint},
    sumcheck::verifier::verify_sumcheck_rounds,
    utils::{dot_product, expand_randomness},
    whir::verifier::{
        errors::VerifierError,
        utils::{collapse_leaf, get_challenge_stir_queries, verify_pow_round},
    },
};

pub mod errors;
pub mod utils;

/// How the first oracle of a WHIR proof is formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhirMode {
    /// One commitment, possibly holding a batch of polynomials under one root.
    Single,
    /// Several commitments opened together, combined after an evaluation matrix.
    Batched,
}

/// Everything the verifier learned in one main round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainRoundData<F> {
    /// Root of the oracle committed in this round.
    pub root: F,
    pub ood_points: Vec<F>,
    pub ood_answers: Vec<F>,
    /// Leaf indexes opened on the previous oracle.
    pub stir_indexes: Vec<u64>,
    /// Points of the folded domain matching `stir_indexes`.
    pub stir_points: Vec<F>,
    /// Folded values of the opened leaves.
    pub folds: Vec<F>,
    pub combination_randomness: Vec<F>,
    /// Sumcheck randomness of this round, most significant variable first.
    pub folding_randomness: MultilinearPoint<F>,
}

/// Result of a successful WHIR verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhirOutcome<F> {
    /// All folding randomness, most significant variable first.
    ///
    /// The deferred weight evaluations must be checked by the caller at this point.
    pub folding_randomness: MultilinearPoint<F>,
    pub rounds: Vec<MainRoundData<F>>,
    pub final_coefficients: CoefficientList<F>,
}

/// Values of the previous oracle at the STIR queries.
#[derive(Debug, Clone)]
struct StirEvaluations<F> {
    indexes: Vec<u64>,
    points: Vec<F>,
    folds: Vec<F>,
}

/// Oracle queried by the STIR step of a round.
#[derive(Debug, Clone, Copy)]
enum QueriedOracle<'c, F> {
    /// The commitments the proof started from.
    Initial {
        commitments: &'c [ParsedCommitment<F>],
        mode: WhirMode,
        batch_randomness: F,
    },
    /// The oracle committed in the previous round.
    Round { root: F },
}

/// WHIR verifier over a set of validated parameters.
#[derive(Debug, Clone)]
pub struct Verifier<'a, F, C = KeccakCompression, O = LinearIndexOracle> {
    params: &'a WhirParameters<F>,
    compression: C,
    query_binding: QueryBinding,
    index_oracle: O,
}

impl<'a, F: PrimeField> Verifier<'a, F> {
    /// Keccak compression, positional query binding.
    #[must_use]
    pub const fn new(params: &'a WhirParameters<F>) -> Self {
        Self {
            params,
            compression: KeccakCompression,
            query_binding: QueryBinding::Positional,
            index_oracle: LinearIndexOracle,
        }
    }
}

impl<'a, F, C, O> Verifier<'a, F, C, O>
where
    F: PrimeField,
    C: TwoToOneCompression<F>,
    O: IndexOracle,
{
    #[must_use]
    pub fn with_compression<C2: TwoToOneCompression<F>>(
        self,
        compression: C2,
    ) -> Verifier<'a, F, C2, O> {
        Verifier {
            params: self.params,
            compression,
            query_binding: self.query_binding,
            index_oracle: self.index_oracle,
        }
    }

    #[must_use]
    pub fn with_index_oracle<O2: IndexOracle>(self, index_oracle: O2) -> Verifier<'a, F, C, O2> {
        Verifier {
            params: self.params,
            compression: self.compression,
            query_binding: self.query_binding,
            index_oracle,
        }
    }

    #[must_use]
    pub const fn with_query_binding(mut self, query_binding: QueryBinding) -> Self {
        self.query_binding = query_binding;
        self
    }

    /// Verifies a proof over a single commitment.
    ///
    /// `deferred` holds one weight evaluation per statement, in statement order.
    pub fn verify(
        &self,
        verifier_state: &mut VerifierState<'_>,
        hints: &mut ProofHints,
        parsed_commitment: &ParsedCommitment<F>,
        statement: &Statement<F>,
        deferred: &[F],
    ) -> Result<WhirOutcome<F>, VerifierError> {
        self.verify_with_mode(
            WhirMode::Single,
            verifier_state,
            hints,
            std::slice::from_ref(parsed_commitment),
            std::slice::from_ref(statement),
            deferred,
        )
    }

    /// Verifies a proof opening several commitments together.
    ///
    /// `deferred` holds the weight evaluations of every commitment's statements, in
    /// commitment order.
    pub fn verify_batch(
        &self,
        verifier_state: &mut VerifierState<'_>,
        hints: &mut ProofHints,
        parsed_commitments: &[ParsedCommitment<F>],
        statements: &[Statement<F>],
        deferred: &[F],
    ) -> Result<WhirOutcome<F>, VerifierError> {
        self.verify_with_mode(
            WhirMode::Batched,
            verifier_state,
            hints,
            parsed_commitments,
            statements,
            deferred,
        )
    }

    #[instrument(skip_all, fields(mode = ?mode, n_rounds = self.n_rounds()))]
    #[allow(clippy::too_many_lines)]
    pub fn verify_with_mode(
        &self,
        mode: WhirMode,
        verifier_state: &mut VerifierState<'_>,
        hints: &mut ProofHints,
        parsed_commitments: &[ParsedCommitment<F>],
        statements: &[Statement<F>],
        deferred: &[F],
    ) -> Result<WhirOutcome<F>, VerifierError> {
        self.check_shape(mode, parsed_commitments, statements)?;

        let num_statements: usize = statements.iter().map(Statement::len).sum();
        if deferred.len() != num_statements {
            return Err(VerifierError::Malformed(format!(
                "{} deferred evaluations for {num_statements} statements",
                deferred.len()
            )));
        }

        let initial_ood_points: Vec<F> = parsed_commitments
            .iter()
            .flat_map(|c| c.ood_points.iter().copied())
            .collect();

        // Claimed values of the initial constraints: out-of-domain answers, then statements.
        let (initial_sums, batch_randomness) = match mode {
            WhirMode::Single => {
                let commitment = &parsed_commitments[0];
                let sums: Vec<F> = commitment
                    .combined_ood_answers()
                    .into_iter()
                    .chain(statements[0].combined(commitment))
                    .collect();
                (sums, F::ONE)
            }
            WhirMode::Batched => {
                self.read_batch_evaluations(verifier_state, parsed_commitments, statements)?
            }
        };

        let mut claimed_sum = F::ZERO;
        let initial_combination =
            Self::combine_constraints(verifier_state, &mut claimed_sum, &initial_sums)?;

        let mut round_folding_randomness = Vec::with_capacity(self.n_rounds() + 2);
        round_folding_randomness.push(verify_sumcheck_rounds(
            verifier_state,
            &self.compression,
            &mut claimed_sum,
            self.folding_factor_at(0),
            0,
        )?);

        let mut rounds = Vec::with_capacity(self.n_rounds());
        let mut queried = QueriedOracle::Initial {
            commitments: parsed_commitments,
            mode,
            batch_randomness,
        };

        for round_index in 0..self.n_rounds() {
            let round_params = &self.round_parameters[round_index];

            let root: F = verifier_state.next_scalar()?;
            let ood_points: Vec<F> = verifier_state.challenge_scalars(round_params.ood_samples)?;
            let ood_answers: Vec<F> = verifier_state.next_scalars(round_params.ood_samples)?;

            let stir = self.verify_stir_challenges(
                verifier_state,
                hints,
                round_index,
                queried,
                round_folding_randomness
                    .last()
                    .ok_or_else(|| VerifierError::Malformed("no folding randomness".into()))?,
            )?;

            let sums: Vec<F> = ood_answers.iter().chain(&stir.folds).copied().collect();
            let combination_randomness =
                Self::combine_constraints(verifier_state, &mut claimed_sum, &sums)?;

            let folding_randomness = verify_sumcheck_rounds(
                verifier_state,
                &self.compression,
                &mut claimed_sum,
                self.folding_factor_at(round_index + 1),
                0,
            )?;
            round_folding_randomness.push(folding_randomness.clone());

            debug!(round = round_index, queries = stir.indexes.len(), "main round verified");
            rounds.push(MainRoundData {
                root,
                ood_points,
                ood_answers,
                stir_indexes: stir.indexes,
                stir_points: stir.points,
                folds: stir.folds,
                combination_randomness,
                folding_randomness,
            });
            queried = QueriedOracle::Round { root };
        }

        // In the final round we receive the full polynomial instead of a commitment.
        let final_coefficients =
            CoefficientList::new(verifier_state.next_scalars(self.final_coefficients())?);

        let stir = self.verify_stir_challenges(
            verifier_state,
            hints,
            self.n_rounds(),
            queried,
            round_folding_randomness
                .last()
                .ok_or_else(|| VerifierError::Malformed("no folding randomness".into()))?,
        )?;

        // Verify stir constraints directly on final polynomial
        for (position, (&point, &fold)) in stir.points.iter().zip(&stir.folds).enumerate() {
            if final_coefficients.evaluate_at_univariate(point) != fold {
                return Err(VerifierError::FoldMismatch { position });
            }
        }

        let final_sumcheck_randomness = verify_sumcheck_rounds(
            verifier_state,
            &self.compression,
            &mut claimed_sum,
            self.final_sumcheck_rounds,
            0,
        )?;
        verify_pow_round(verifier_state, &self.compression, self.final_folding_pow_bits)?;
        round_folding_randomness.push(final_sumcheck_randomness.clone());

        // Compute folding randomness across all rounds.
        let folding_randomness = MultilinearPoint(
            round_folding_randomness
                .into_iter()
                .rev()
                .flat_map(|poly| poly.0.into_iter())
                .collect(),
        );

        let evaluation_of_weights = self.eval_constraints_poly(
            &initial_ood_points,
            &initial_combination,
            deferred,
            &rounds,
            &folding_randomness,
        );

        // Check the final sumcheck evaluation
        let final_value = final_coefficients.evaluate(&final_sumcheck_randomness);
        if claimed_sum != evaluation_of_weights * final_value {
            return Err(VerifierError::FinalIdentityFailed);
        }

        Ok(WhirOutcome {
            folding_randomness,
            rounds,
            final_coefficients,
        })
    }

    fn check_shape(
        &self,
        mode: WhirMode,
        parsed_commitments: &[ParsedCommitment<F>],
        statements: &[Statement<F>],
    ) -> Result<(), VerifierError> {
        if parsed_commitments.is_empty() {
            return Err(VerifierError::Malformed(
                "at least one commitment is required".to_string(),
            ));
        }
        if mode == WhirMode::Single && parsed_commitments.len() != 1 {
            return Err(VerifierError::Malformed(format!(
                "single mode got {} commitments",
                parsed_commitments.len()
            )));
        }
        if statements.len() != parsed_commitments.len() {
            return Err(VerifierError::Malformed(format!(
                "{} statements for {} commitments",
                statements.len(),
                parsed_commitments.len()
            )));
        }
        for (commitment, statement) in parsed_commitments.iter().zip(statements) {
            if commitment.batch_size() != self.batch_size || !statement.fits_batch(self.batch_size)
            {
                return Err(VerifierError::Malformed(format!(
                    "statement does not fit a batch of {}",
                    self.batch_size
                )));
            }
        }
        Ok(())
    }

    /// Reads the evaluation matrix of a batched proof, binds every row to its commitment and
    /// combines the rows with a fresh challenge.
    ///
    /// Columns are every commitment's out-of-domain answers, then every commitment's
    /// statements, both in commitment order.
    fn read_batch_evaluations(
        &self,
        verifier_state: &mut VerifierState<'_>,
        parsed_commitments: &[ParsedCommitment<F>],
        statements: &[Statement<F>],
    ) -> Result<(Vec<F>, F), VerifierError> {
        let num_rows = parsed_commitments.len();
        let ood_widths: Vec<usize> = parsed_commitments
            .iter()
            .map(|c| c.ood_points.len())
            .collect();
        let statement_widths: Vec<usize> = statements.iter().map(Statement::len).collect();
        let num_ood: usize = ood_widths.iter().sum();
        let num_columns = num_ood + statement_widths.iter().sum::<usize>();

        let matrix: Vec<F> = verifier_state.next_scalars(num_rows * num_columns)?;

        let mut ood_offset = 0;
        let mut statement_offset = num_ood;
        for (i, (commitment, statement)) in parsed_commitments.iter().zip(statements).enumerate() {
            let row = &matrix[i * num_columns..(i + 1) * num_columns];
            let ood_block = &row[ood_offset..ood_offset + ood_widths[i]];
            let statement_block = &row[statement_offset..statement_offset + statement_widths[i]];
            if ood_block != commitment.combined_ood_answers().as_slice()
                || statement_block != statement.combined(commitment).as_slice()
            {
                return Err(VerifierError::BatchBindingFailed { commitment: i });
            }
            ood_offset += ood_widths[i];
            statement_offset += statement_widths[i];
        }

        let batch_randomness: F = verifier_state.challenge_scalar()?;
        let mut combined = vec![F::ZERO; num_columns];
        if num_columns > 0 {
            for (row, coeff) in matrix.chunks_exact(num_columns).zip(batch_randomness.powers()) {
                for (acc, &value) in combined.iter_mut().zip(row) {
                    *acc += coeff * value;
                }
            }
        }
        Ok((combined, batch_randomness))
    }

    /// Combine multiple constraints into a single claim using random linear combination.
    ///
    /// One challenge `r` is sampled and constraint `i` is weighted by `r^i`.
    pub fn combine_constraints(
        verifier_state: &mut VerifierState<'_>,
        claimed_sum: &mut F,
        sums: &[F],
    ) -> Result<Vec<F>, VerifierError> {
        let combination_randomness_gen: F = verifier_state.challenge_scalar()?;
        let combination_randomness = expand_randomness(combination_randomness_gen, sums.len());
        *claimed_sum += dot_product(&combination_randomness, sums);
        Ok(combination_randomness)
    }

    /// Verify STIR in-domain queries on the oracle queried in `round_index`.
    ///
    /// Checks the proof-of-work, samples the queries, binds them to the opened leaves, checks
    /// the Merkle paths and folds every opened leaf with `folding_randomness`. Points are
    /// derived from the opened leaf indexes.
    fn verify_stir_challenges(
        &self,
        verifier_state: &mut VerifierState<'_>,
        hints: &mut ProofHints,
        round_index: usize,
        queried: QueriedOracle<'_, F>,
        folding_randomness: &MultilinearPoint<F>,
    ) -> Result<StirEvaluations<F>, VerifierError> {
        let (pow_bits, num_queries) = match self.round_parameters.get(round_index) {
            Some(round) => (round.pow_bits, round.num_queries),
            None => (self.final_pow_bits, self.final_queries),
        };
        let folding_factor = self.folding_factor_at(round_index);

        verify_pow_round(verifier_state, &self.compression, pow_bits)?;

        let folded_domain_size = self.domain_size_at(round_index) >> folding_factor;
        let queries = get_challenge_stir_queries(verifier_state, folded_domain_size, num_queries)?;

        let (indexes, leaves) = match queried {
            QueriedOracle::Initial {
                commitments,
                mode,
                batch_randomness,
            } => {
                let mut indexes: Option<Vec<u64>> = None;
                let mut combined: Vec<Vec<F>> = Vec::new();
                for (i, (commitment, coeff)) in
                    commitments.iter().zip(batch_randomness.powers()).enumerate()
                {
                    let (answers_label, paths_label) = match mode {
                        WhirMode::Single => {
                            (labels::STIR_ANSWERS.to_string(), labels::MERKLE_PROOF.to_string())
                        }
                        WhirMode::Batched => (
                            labels::stir_answers_witness(i),
                            labels::merkle_proof_witness(i),
                        ),
                    };
                    let (opened, leaves) = self.open_leaves(
                        hints,
                        &answers_label,
                        &paths_label,
                        &queries,
                        commitment.root,
                        folding_factor,
                        commitment.batch_size(),
                    )?;
                    let collapsed = leaves
                        .iter()
                        .map(|leaf| {
                            collapse_leaf(leaf, commitment.batch_size(), commitment.batching_randomness)
                        })
                        .collect::<Result<Vec<_>, _>>()?;

                    match &indexes {
                        None => {
                            combined = collapsed;
                            indexes = Some(opened);
                        }
                        Some(first) => {
                            if *first != opened {
                                return Err(VerifierError::QueryIndexMismatch {
                                    position: 0,
                                    reason: format!(
                                        "commitment {i} opens other leaves than commitment 0"
                                    ),
                                });
                            }
                            for (acc, leaf) in combined.iter_mut().zip(collapsed) {
                                for (a, v) in acc.iter_mut().zip(leaf) {
                                    *a += coeff * v;
                                }
                            }
                        }
                    }
                }
                (indexes.unwrap_or_default(), combined)
            }
            QueriedOracle::Round { root } => self.open_leaves(
                hints,
                labels::STIR_ANSWERS,
                labels::MERKLE_PROOF,
                &queries,
                root,
                folding_factor,
                1,
            )?,
        };

        let generator = self.query_generator(round_index);
        let points = indexes.iter().map(|&index| generator.exp_u64(index)).collect();
        let folds = leaves
            .into_iter()
            .map(|leaf| CoefficientList::new(leaf).evaluate(folding_randomness))
            .collect();

        Ok(StirEvaluations {
            indexes,
            points,
            folds,
        })
    }

    /// Reads one oracle's answers and paths, binds them to the queries and checks them
    /// against `root`.
    #[allow(clippy::too_many_arguments)]
    fn open_leaves(
        &self,
        hints: &mut ProofHints,
        answers_label: &str,
        paths_label: &str,
        queries: &[usize],
        root: F,
        folding_factor: usize,
        batch_size: usize,
    ) -> Result<(Vec<u64>, Vec<Vec<F>>), VerifierError> {
        let answers: Vec<Vec<Fp256>> = hints.take(answers_label)?;
        let paths: FullMultiPath = hints.take(paths_label)?;

        let leaf_len = batch_size << folding_factor;
        let leaves: Vec<Vec<F>> = answers
            .iter()
            .map(|leaf| leaf.iter().map(Fp256::to_field).collect())
            .collect();
        if let Some(position) = leaves.iter().position(|leaf| leaf.len() != leaf_len) {
            return Err(VerifierError::Malformed(format!(
                "opened leaf {position} of `{answers_label}` does not hold {leaf_len} values"
            )));
        }

        let openings = openings_from_hints(&paths, leaves)?;
        let opened: Vec<u64> = openings.iter().map(|opening| opening.index).collect();
        self.query_binding
            .check(&self.index_oracle, queries, &opened)?;
        verify_openings(&self.compression, &openings, root)?;

        Ok((
            opened,
            openings.into_iter().map(|opening| opening.leaf).collect(),
        ))
    }

    /// Evaluates the combined weight polynomial at the folding randomness.
    ///
    /// Out-of-domain and STIR constraints are equality constraints on univariate points;
    /// statement weights are deferred to the caller and enter through `deferred`.
    fn eval_constraints_poly(
        &self,
        initial_ood_points: &[F],
        initial_combination: &[F],
        deferred: &[F],
        rounds: &[MainRoundData<F>],
        folding_randomness: &MultilinearPoint<F>,
    ) -> F {
        let mut num_variables = self.num_variables;
        let (ood_coeffs, statement_coeffs) = initial_combination.split_at(initial_ood_points.len());

        let mut value: F = initial_ood_points
            .iter()
            .zip(ood_coeffs)
            .map(|(&point, &coeff)| {
                coeff
                    * MultilinearPoint::expand_from_univariate(point, num_variables)
                        .eq_poly_outside(folding_randomness)
            })
            .sum();
        value += dot_product(statement_coeffs, deferred);

        for (round_index, round) in rounds.iter().enumerate() {
            num_variables -= self.folding_factor_at(round_index);
            let point = folding_randomness.prefix(num_variables);
            value += round
                .ood_points
                .iter()
                .chain(&round.stir_points)
                .zip(&round.combination_randomness)
                .map(|(&p, &coeff)| {
                    coeff
                        * MultilinearPoint::expand_from_univariate(p, num_variables)
                            .eq_poly_outside(&point)
                })
                .sum::<F>();
        }
        value
    }
}

impl<F, C, O> Deref for Verifier<'_, F, C, O> {
    type Target = WhirParameters<F>;

    fn deref(&self) -> &Self::Target {
        self.params
    }
}
