//! Satisfiable R1CS instances with honest zero-knowledge Spartan proofs.
//!
//! The instance checks `x * a = b`, `b * b = c`, `(x + a) * 1 = d` and `c * 2 = e` over the
//! witness `z = [1, x, a, b, c, d, e]`, with `x` optionally public.

use itertools::Itertools;
use p3_field::PrimeCharacteristicRing;
use rand::{SeedableRng, rngs::StdRng};

use super::{random_vec, whir::WhirProver, whir_config};
use crate::{
    FieldElement,
    config::ProofConfig,
    constant::R1CS_MATRICES,
    errors::Error,
    fiat_shamir::{
        errors::TranscriptError,
        hints::{ClaimedEvaluations, Fp256, HintSerialize},
        pattern::IoPattern,
        prover::ProverState,
    },
    poly::{coeffs::CoefficientList, evals::EvaluationsList, multilinear::MultilinearPoint},
    r1cs::{InternerAsString, R1cs, R1csFile, SparseMatrix},
    spartan::{
        CommitmentMode, VerificationContext,
        public_inputs::{PublicInputHasher, Sha256PublicInputHasher},
    },
    utils::{dot_product, field_to_le_bytes, field_to_limbs},
};

type F = FieldElement;

/// Session identifier of every fixture transcript.
pub const SESSION: &str = "whir-spartan-fixture";

const LOG_NUM_CONSTRAINTS: usize = 2;
const LOG_NUM_VARIABLES: usize = 4;
/// Witness columns of the first commitment in dual mode.
const W1_SIZE: usize = 4;
const NUM_CHALLENGES: usize = 2;

/// Shape of a fixture.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixtureOptions {
    /// Split the witness in two commitments with logup challenges in between.
    pub dual: bool,
    /// Bind `x` as a public input.
    pub public_inputs: bool,
    /// Seed of the blinding polynomials.
    pub seed: u64,
}

/// A proof configuration and the R1CS instance it proves.
#[derive(Clone, Debug)]
pub struct SpartanFixture {
    pub config: ProofConfig,
    pub r1cs_file: R1csFile,
}

impl SpartanFixture {
    /// Builds the instance and proves it honestly.
    ///
    /// # Panics
    /// Never for the fixed instance; a panic means the honest prover broke.
    #[must_use]
    pub fn new(options: FixtureOptions) -> Self {
        let r1cs_file = r1cs_file();
        let r1cs = R1cs::<F>::decode(&r1cs_file).expect("fixture R1CS decodes");

        let mut witness = whir_config(1, vec![2], LOG_NUM_VARIABLES, 1);
        witness.batch_size = 2;
        let mut hiding = whir_config(0, vec![2], LOG_NUM_CONSTRAINTS, 1);
        hiding.batch_size = 2;
        let mut config = ProofConfig {
            whir_config_witness: witness,
            whir_config_hiding_spartan: hiding,
            log_num_constraints: LOG_NUM_CONSTRAINTS,
            log_num_variables: LOG_NUM_VARIABLES,
            log_a_num_terms: 3,
            io_pattern: SESSION.to_string(),
            transcript: Vec::new(),
            transcript_len: 0,
            num_challenges: if options.dual { NUM_CHALLENGES } else { 0 },
            w1_size: if options.dual { W1_SIZE } else { 0 },
            public_inputs: if options.public_inputs {
                vec![hex::encode(field_to_le_bytes(&witness_values()[1]))]
            } else {
                Vec::new()
            },
        };

        let context = VerificationContext::new(&config, r1cs).expect("fixture is consistent");
        let ds = context.domain_separator(SESSION);
        config.io_pattern = ds.as_str().to_string();
        let pattern = ds.to_io_pattern().expect("fixture pattern is valid");

        let mut rng = StdRng::seed_from_u64(options.seed);
        let transcript =
            prove(&context, &pattern, &mut rng).expect("honest prover follows its pattern");
        config.transcript_len = transcript.len();
        config.transcript = transcript;

        Self { config, r1cs_file }
    }

    /// Decoded R1CS instance.
    #[must_use]
    pub fn r1cs(&self) -> R1cs<F> {
        R1cs::decode(&self.r1cs_file).expect("fixture R1CS decodes")
    }

    /// Verification context of the proof.
    pub fn context(&self) -> Result<VerificationContext<F>, Error> {
        VerificationContext::new(&self.config, self.r1cs())
    }
}

/// `[1, x, a, b, c, d, e]` for `x = 3`, `a = 5`, padded to the hypercube.
fn witness_values() -> Vec<F> {
    let values = [1u64, 3, 5, 15, 225, 8, 450];
    let mut z = values.into_iter().map(F::from_u64).collect_vec();
    z.resize(1 << LOG_NUM_VARIABLES, F::ZERO);
    z
}

/// Compresses rows of `(column, interned value)` entries.
fn sparse(rows: &[&[(u64, u64)]]) -> SparseMatrix {
    let mut matrix = SparseMatrix {
        num_rows: rows.len() as u64,
        num_cols: 1 << LOG_NUM_VARIABLES,
        ..SparseMatrix::default()
    };
    for row in rows {
        matrix.new_row_indices.push(matrix.values.len() as u64);
        for &(column, value) in *row {
            matrix.col_indices.push(column);
            matrix.values.push(value);
        }
    }
    matrix
}

fn r1cs_file() -> R1csFile {
    let interner: Vec<Fp256> = [1u64, 2].iter().map(|&v| Fp256([v, 0, 0, 0])).collect();
    R1csFile {
        public_inputs: 1,
        witnesses: 6,
        constraints: 4,
        interner: InternerAsString {
            values: hex::encode(interner.encode()),
        },
        a: sparse(&[&[(1, 0)], &[(3, 0)], &[(1, 0), (2, 0)], &[(4, 0)]]),
        b: sparse(&[&[(2, 0)], &[(3, 0)], &[(0, 0)], &[(0, 1)]]),
        c: sparse(&[&[(3, 0)], &[(4, 0)], &[(5, 0)], &[(6, 0)]]),
    }
}

fn coefficients(evals: &[F]) -> CoefficientList<F> {
    CoefficientList::from(EvaluationsList::new(evals.to_vec()))
}

fn to_hint(values: &[F]) -> Vec<Fp256> {
    values.iter().map(|v| Fp256(field_to_limbs(v))).collect()
}

/// Commitment holding `column` and its index there.
const fn locate(mode: CommitmentMode, column: usize) -> (usize, usize) {
    match mode {
        CommitmentMode::Single => (0, column),
        CommitmentMode::Dual { .. } => {
            if column < W1_SIZE {
                (0, column)
            } else {
                (1, column - W1_SIZE)
            }
        }
    }
}

/// `(A z, B z, C z)` over the padded rows.
fn matrix_products(r1cs: &R1cs<F>, z: &[F]) -> [Vec<F>; R1CS_MATRICES] {
    r1cs.matrices.each_ref().map(|cells| {
        let mut out = vec![F::ZERO; 1 << LOG_NUM_CONSTRAINTS];
        for cell in cells {
            out[cell.row] += cell.value * z[cell.column];
        }
        out
    })
}

fn poly_mul(lhs: &[F], rhs: &[F]) -> Vec<F> {
    let mut out = vec![F::ZERO; lhs.len() + rhs.len() - 1];
    for (i, &l) in lhs.iter().enumerate() {
        for (j, &r) in rhs.iter().enumerate() {
            out[i + j] += l * r;
        }
    }
    out
}

/// Cubic sumcheck of `sum_x eq(x) (a(x) b(x) - c(x)) + rho g(x)`, binding the most
/// significant variable first.
fn prove_cubic_sumcheck(
    prover_state: &mut ProverState,
    mut tables: [Vec<F>; 5],
    rho: F,
) -> Result<MultilinearPoint<F>, TranscriptError> {
    let mut challenges = Vec::new();
    while tables[0].len() > 1 {
        let half = tables[0].len() / 2;
        let mut coeffs = [F::ZERO; 4];
        for i in 0..half {
            let [eq, a, b, c, g] = tables.each_ref().map(|t| [t[i], t[i + half] - t[i]]);
            for (acc, v) in coeffs.iter_mut().zip(poly_mul(&poly_mul(&eq, &a), &b)) {
                *acc += v;
            }
            for (acc, v) in coeffs.iter_mut().zip(poly_mul(&eq, &c)) {
                *acc -= v;
            }
            coeffs[0] += rho * g[0];
            coeffs[1] += rho * g[1];
        }
        prover_state.add_scalars(&coeffs)?;
        let r: F = prover_state.challenge_scalar()?;
        for table in &mut tables {
            let (low, high) = table.split_at_mut(half);
            for (l, &h) in low.iter_mut().zip(high.iter()) {
                *l += r * (h - *l);
            }
            table.truncate(half);
        }
        challenges.push(r);
    }
    Ok(MultilinearPoint(challenges))
}

#[allow(clippy::too_many_lines)]
fn prove(
    context: &VerificationContext<F>,
    pattern: &IoPattern,
    rng: &mut StdRng,
) -> Result<Vec<u8>, TranscriptError> {
    let mut prover_state = ProverState::new(pattern);
    let columns = 1 << context.log_num_variables;
    let z = witness_values();

    let parts: Vec<Vec<F>> = match context.mode {
        CommitmentMode::Single => vec![z.clone()],
        CommitmentMode::Dual { .. } => {
            let mut low = z[..W1_SIZE].to_vec();
            low.resize(columns, F::ZERO);
            let mut high = z[W1_SIZE..].to_vec();
            high.resize(columns, F::ZERO);
            vec![low, high]
        }
    };
    let blindings: Vec<Vec<F>> = parts.iter().map(|_| random_vec(rng, columns)).collect();

    let witness_prover = WhirProver::new(&context.witness_params);
    let mut witnesses = Vec::with_capacity(parts.len());
    for ((descriptor, f), g) in context.commitments().iter().zip(&parts).zip(&blindings) {
        let _logup: Vec<F> = prover_state.challenge_scalars(descriptor.challenges_before)?;
        witnesses.push(witness_prover.commit(&mut prover_state, vec![coefficients(f), coefficients(g)])?);
    }

    let public_weight = if context.has_public_inputs() {
        prover_state.add_scalar(Sha256PublicInputHasher.hash(&context.public_inputs))?;
        let challenge: F = prover_state.challenge_scalar()?;
        let mut weight = challenge
            .powers()
            .take(context.public_inputs.len() + 1)
            .collect_vec();
        weight.resize(columns, F::ZERO);
        prover_state.add_scalars(&[
            dot_product(&parts[0], &weight),
            dot_product(&blindings[0], &weight),
        ])?;
        Some(EvaluationsList::new(weight))
    } else {
        None
    };

    let tau = MultilinearPoint(prover_state.challenge_scalars(context.log_num_constraints)?);

    let rows = 1 << context.log_num_constraints;
    let hiding_g = random_vec(rng, rows);
    let hiding_h = random_vec(rng, rows);
    let hiding_prover = WhirProver::new(&context.hiding_params);
    let hiding_witness = hiding_prover.commit(
        &mut prover_state,
        vec![coefficients(&hiding_g), coefficients(&hiding_h)],
    )?;
    prover_state.add_scalar(hiding_g.iter().copied().sum::<F>())?;
    let rho: F = prover_state.challenge_scalar()?;

    let [az, bz, cz] = matrix_products(&context.r1cs, &z);
    let alpha = prove_cubic_sumcheck(
        &mut prover_state,
        [
            EvaluationsList::eq_table(&tau).into_evals(),
            az,
            bz,
            cz,
            hiding_g.clone(),
        ],
        rho,
    )?;
    let alpha_eq = EvaluationsList::eq_table(&alpha);
    prover_state.add_scalars(&[
        dot_product(&hiding_g, alpha_eq.evals()),
        dot_product(&hiding_h, alpha_eq.evals()),
    ])?;
    let hiding_opening =
        hiding_prover.prove(&mut prover_state, &hiding_witness, std::slice::from_ref(&alpha_eq))?;

    // weights[i][M][y] = sum_x eq(alpha, x) M[x][y] over the columns of commitment i.
    let mut weights = vec![vec![vec![F::ZERO; columns]; R1CS_MATRICES]; parts.len()];
    for (m, cells) in context.r1cs.matrices.iter().enumerate() {
        for cell in cells {
            let (commitment, column) = locate(context.mode, cell.column);
            weights[commitment][m][column] += alpha_eq.evals()[cell.row] * cell.value;
        }
    }
    let mut statements: Vec<Vec<EvaluationsList<F>>> = weights
        .into_iter()
        .map(|tables| tables.into_iter().map(EvaluationsList::new).collect())
        .collect();

    for ((statement, f), g) in statements.iter().zip(&parts).zip(&blindings) {
        let claimed = ClaimedEvaluations {
            f_sums: to_hint(&statement.iter().map(|w| dot_product(f, w.evals())).collect_vec()),
            g_sums: to_hint(&statement.iter().map(|w| dot_product(g, w.evals())).collect_vec()),
        };
        prover_state.hint(&claimed.encode())?;
    }
    if let Some(weight) = public_weight {
        statements[0].push(weight);
    }

    let opening = match context.mode {
        CommitmentMode::Single => {
            witness_prover.prove(&mut prover_state, &witnesses[0], &statements[0])?
        }
        CommitmentMode::Dual { .. } => {
            witness_prover.prove_batch(&mut prover_state, &witnesses, &statements)?
        }
    };

    let deferred = to_hint(&[hiding_opening.deferred, opening.deferred].concat());
    prover_state.hint(&deferred.encode())?;
    prover_state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_instance_is_satisfied() {
        let r1cs = R1cs::<F>::decode(&r1cs_file()).unwrap();
        let z = witness_values();
        let [az, bz, cz] = matrix_products(&r1cs, &z);
        for ((a, b), c) in az.iter().zip(&bz).zip(&cz) {
            assert_eq!(*a * *b, *c);
        }
        assert_eq!(cz[3], F::from_u64(450));
    }

    #[test]
    fn test_fixture_transcript_matches_declared_length() {
        let fixture = SpartanFixture::new(FixtureOptions::default());
        fixture.config.check_transcript_len().unwrap();
        assert!(fixture.config.io_pattern.starts_with(SESSION));
    }
}
