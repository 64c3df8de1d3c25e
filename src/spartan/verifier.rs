use p3_field::PrimeField;
use tracing::{debug, info, instrument};

use super::{
    context::{CommitmentMode, VerificationContext},
    public_inputs::{PublicInputBinding, PublicInputHasher, Sha256PublicInputHasher},
    zk_sumcheck::{ZkSumcheckOutcome, verify_zk_sumcheck},
};
use crate::{
    constant::R1CS_MATRICES,
    errors::Error,
    fiat_shamir::{
        hints::{ClaimedEvaluations, Fp256, ProofHints, labels},
        transcript::split_transcript,
        verifier::VerifierState,
    },
    merkle_tree::{IndexOracle, KeccakCompression, LinearIndexOracle, QueryBinding, TwoToOneCompression},
    parameters::WhirParameters,
    poly::multilinear::MultilinearPoint,
    r1cs::matrix_extension::{evaluate_matrix_extension, evaluate_matrix_extension_batched},
    whir::{
        committer::reader::{CommitmentReader, ParsedCommitment},
        statement::Statement,
        verifier::{Verifier, errors::VerifierError},
    },
};

/// Randomness a successful verification settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpartanOutcome<F> {
    /// Sumcheck challenges over the constraints, most significant variable first.
    pub constraint_randomness: MultilinearPoint<F>,
    /// Folding randomness of the witness WHIR proof.
    pub witness_randomness: MultilinearPoint<F>,
    /// Folding randomness of the hiding WHIR proof.
    pub hiding_randomness: MultilinearPoint<F>,
}

/// Verifier of a zero-knowledge Spartan proof over WHIR commitments.
#[derive(Debug, Clone)]
pub struct SpartanVerifier<
    'a,
    F,
    H = Sha256PublicInputHasher,
    C = KeccakCompression,
    O = LinearIndexOracle,
> {
    context: &'a VerificationContext<F>,
    hasher: H,
    compression: C,
    index_oracle: O,
    query_binding: QueryBinding,
}

impl<'a, F: PrimeField> SpartanVerifier<'a, F> {
    #[must_use]
    pub const fn new(context: &'a VerificationContext<F>) -> Self {
        Self {
            context,
            hasher: Sha256PublicInputHasher,
            compression: KeccakCompression,
            index_oracle: LinearIndexOracle,
            query_binding: QueryBinding::Positional,
        }
    }
}

impl<'a, F, H, C, O> SpartanVerifier<'a, F, H, C, O>
where
    F: PrimeField,
    H: PublicInputHasher<F>,
    C: TwoToOneCompression<F> + Clone,
    O: IndexOracle + Clone,
{
    #[must_use]
    pub fn with_hasher<H2: PublicInputHasher<F>>(self, hasher: H2) -> SpartanVerifier<'a, F, H2, C, O> {
        SpartanVerifier {
            context: self.context,
            hasher,
            compression: self.compression,
            index_oracle: self.index_oracle,
            query_binding: self.query_binding,
        }
    }

    #[must_use]
    pub fn with_index_oracle<O2: IndexOracle + Clone>(
        self,
        index_oracle: O2,
    ) -> SpartanVerifier<'a, F, H, C, O2> {
        SpartanVerifier {
            context: self.context,
            hasher: self.hasher,
            compression: self.compression,
            index_oracle,
            query_binding: self.query_binding,
        }
    }

    #[must_use]
    pub const fn with_query_binding(mut self, query_binding: QueryBinding) -> Self {
        self.query_binding = query_binding;
        self
    }

    fn whir_verifier<'p>(
        &self,
        params: &'p WhirParameters<F>,
    ) -> Verifier<'p, F, C, O> {
        Verifier::new(params)
            .with_compression(self.compression.clone())
            .with_index_oracle(self.index_oracle.clone())
            .with_query_binding(self.query_binding)
    }

    /// Replays the whole proof and runs every check, stopping at the first failure.
    #[instrument(skip_all, fields(mode = ?self.context.mode, public = self.context.has_public_inputs()))]
    pub fn verify(&self) -> Result<SpartanOutcome<F>, Error> {
        let ctx = self.context;
        let split = split_transcript(&ctx.io_pattern, &ctx.transcript)?;
        let mut hints = ProofHints::new(split.hints)?;
        let mut verifier_state = VerifierState::new(&ctx.io_pattern, &split.public);

        let descriptors = ctx.commitments();
        let reader = CommitmentReader::new(&ctx.witness_params);
        let mut commitments: Vec<ParsedCommitment<F>> = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let _logup: Vec<F> = verifier_state.challenge_scalars(descriptor.challenges_before)?;
            commitments.push(reader.parse_commitment(&mut verifier_state)?);
            debug!(label = descriptor.label, "witness commitment parsed");
        }

        let public = if ctx.has_public_inputs() {
            Some(PublicInputBinding::read(
                &mut verifier_state,
                &self.hasher,
                &ctx.public_inputs,
            )?)
        } else {
            None
        };

        let tau = MultilinearPoint(verifier_state.challenge_scalars(ctx.log_num_constraints)?);

        let deferred: Vec<F> = hints
            .take_appended::<Fp256>(labels::DEFERRED_WEIGHT_EVALUATIONS)?
            .iter()
            .map(Fp256::to_field)
            .collect();
        let (&hiding_deferred, witness_deferred) = deferred.split_first().ok_or_else(|| {
            VerifierError::Malformed("no deferred weight evaluations".to_string())
        })?;

        let hiding_verifier = self.whir_verifier(&ctx.hiding_params);
        let zk = verify_zk_sumcheck(
            &hiding_verifier,
            &mut verifier_state,
            &mut hints,
            F::ZERO,
            ctx.log_num_constraints,
            hiding_deferred,
        )?;

        let claimed = descriptors
            .iter()
            .map(|descriptor| read_claimed_evaluations(&mut hints, &descriptor.claimed_evaluations))
            .collect::<Result<Vec<_>, _>>()?;
        let statements: Vec<Statement<F>> = claimed
            .iter()
            .enumerate()
            .map(|(i, (f_sums, g_sums))| {
                let mut statement = Statement::default();
                for (&f, &g) in f_sums.iter().zip(g_sums) {
                    statement.add_claim(&[f, g]);
                }
                if let (0, Some(binding)) = (i, &public) {
                    statement.add_claim(&binding.claims());
                }
                statement
            })
            .collect();

        let witness_verifier = self.whir_verifier(&ctx.witness_params);
        let whir = match ctx.mode {
            CommitmentMode::Single => witness_verifier.verify(
                &mut verifier_state,
                &mut hints,
                &commitments[0],
                &statements[0],
                witness_deferred,
            )?,
            CommitmentMode::Dual { .. } => witness_verifier.verify_batch(
                &mut verifier_state,
                &mut hints,
                &commitments,
                &statements,
                witness_deferred,
            )?,
        };

        check_spartan_relation(&claimed, &zk, &tau)?;

        // Positions of the matrix statements in the witness deferred list, skipping the public one.
        let mut matrix_positions = Vec::with_capacity(R1CS_MATRICES * statements.len());
        let mut offset = 0;
        for statement in &statements {
            matrix_positions.extend(offset..offset + R1CS_MATRICES);
            offset += statement.len();
        }
        let expected: Vec<F> = match ctx.mode {
            CommitmentMode::Single => {
                evaluate_matrix_extension(&ctx.r1cs, &zk.randomness, &whir.folding_randomness)?
                    .to_vec()
            }
            CommitmentMode::Dual { .. } => evaluate_matrix_extension_batched(
                &ctx.r1cs,
                &zk.randomness,
                &whir.folding_randomness,
                ctx.w1_size,
            )?
            .to_vec(),
        };
        for (expected, &position) in expected.iter().zip(&matrix_positions) {
            if *expected != witness_deferred[position] {
                return Err(VerifierError::MatrixExtensionMismatch {
                    index: position + 1,
                }
                .into());
            }
        }

        if let Some(binding) = &public {
            binding.check_evaluation(&ctx.public_inputs)?;
            binding.check_deferred(
                ctx.public_inputs.len(),
                &whir.folding_randomness,
                witness_deferred[R1CS_MATRICES],
            )?;
        }

        if hiding_deferred != zk.randomness.eq_poly_outside(&zk.hiding.folding_randomness) {
            return Err(VerifierError::MatrixExtensionMismatch { index: 0 }.into());
        }

        verifier_state.finish()?;
        if hints.remaining() != 0 {
            return Err(VerifierError::Malformed(format!(
                "{} hints were never consumed",
                hints.remaining()
            ))
            .into());
        }

        info!("spartan proof verified");
        Ok(SpartanOutcome {
            constraint_randomness: zk.randomness,
            witness_randomness: whir.folding_randomness,
            hiding_randomness: zk.hiding.folding_randomness,
        })
    }
}

/// Reads the claimed `[Az, Bz, Cz]` evaluations of a witness commitment and of its blinding.
fn read_claimed_evaluations<F: PrimeField>(
    hints: &mut ProofHints,
    label: &str,
) -> Result<(Vec<F>, Vec<F>), VerifierError> {
    let claimed: ClaimedEvaluations = hints.take(label)?;
    if claimed.f_sums.len() != R1CS_MATRICES || claimed.g_sums.len() != R1CS_MATRICES {
        return Err(VerifierError::Malformed(format!(
            "`{label}` holds {} and {} sums, expected {R1CS_MATRICES}",
            claimed.f_sums.len(),
            claimed.g_sums.len()
        )));
    }
    Ok((
        claimed.f_sums.iter().map(Fp256::to_field).collect(),
        claimed.g_sums.iter().map(Fp256::to_field).collect(),
    ))
}

/// `(az * bz - cz) * eq(alpha, tau)` must be the claim left by the sumcheck, with `az`, `bz`
/// and `cz` summed over the witness commitments.
fn check_spartan_relation<F: PrimeField>(
    claimed: &[(Vec<F>, Vec<F>)],
    zk: &ZkSumcheckOutcome<F>,
    tau: &MultilinearPoint<F>,
) -> Result<(), VerifierError> {
    let mut sums = [F::ZERO; R1CS_MATRICES];
    for (f_sums, _) in claimed {
        for (acc, &value) in sums.iter_mut().zip(f_sums) {
            *acc += value;
        }
    }
    let [az, bz, cz] = sums;
    if (az * bz - cz) * zk.randomness.eq_poly_outside(tau) == zk.last_claim {
        Ok(())
    } else {
        Err(VerifierError::SpartanRelationFailed)
    }
}

#[cfg(test)]
mod tests {
    use p3_field::PrimeCharacteristicRing;

    use super::*;
    use crate::{
        FieldElement,
        fiat_shamir::errors::TranscriptError,
        r1cs::R1cs,
        testing::spartan::{FixtureOptions, SpartanFixture},
        utils::field_to_le_bytes,
    };

    type F = FieldElement;

    fn verify(fixture: &SpartanFixture) -> Result<SpartanOutcome<F>, Error> {
        SpartanVerifier::new(&fixture.context()?).verify()
    }

    #[test]
    fn test_single_commitment_proof() {
        let fixture = SpartanFixture::new(FixtureOptions::default());
        let outcome = verify(&fixture).unwrap();
        assert_eq!(outcome.constraint_randomness.num_variables(), 2);
        assert_eq!(outcome.witness_randomness.num_variables(), 4);
        assert_eq!(outcome.hiding_randomness.num_variables(), 2);
    }

    #[test]
    fn test_dual_commitment_proof() {
        let fixture = SpartanFixture::new(FixtureOptions {
            dual: true,
            ..FixtureOptions::default()
        });
        let context = fixture.context().unwrap();
        assert_eq!(context.mode, CommitmentMode::Dual { num_challenges: 2 });
        SpartanVerifier::new(&context).verify().unwrap();
    }

    #[test]
    fn test_public_inputs_in_both_modes() {
        for dual in [false, true] {
            let fixture = SpartanFixture::new(FixtureOptions {
                dual,
                public_inputs: true,
                seed: 7,
            });
            let context = fixture.context().unwrap();
            assert_eq!(context.public_inputs, vec![F::from_u64(3)]);
            SpartanVerifier::new(&context).verify().unwrap();
        }
    }

    #[test]
    fn test_verification_is_deterministic() {
        let fixture = SpartanFixture::new(FixtureOptions {
            seed: 11,
            ..FixtureOptions::default()
        });
        let context = fixture.context().unwrap();
        let first = SpartanVerifier::new(&context).verify().unwrap();
        let second = SpartanVerifier::new(&context).verify().unwrap();
        assert_eq!(first, second);

        let again = SpartanFixture::new(FixtureOptions {
            seed: 11,
            ..FixtureOptions::default()
        });
        assert_eq!(again.config.transcript, fixture.config.transcript);
    }

    #[test]
    fn test_membership_binding_accepts_honest_proof() {
        let fixture = SpartanFixture::new(FixtureOptions::default());
        let context = fixture.context().unwrap();
        SpartanVerifier::new(&context)
            .with_query_binding(QueryBinding::Membership)
            .verify()
            .unwrap();
    }

    #[test]
    fn test_truncated_transcript() {
        let mut fixture = SpartanFixture::new(FixtureOptions::default());
        fixture.config.transcript.pop();
        fixture.config.transcript_len -= 1;
        let err = verify(&fixture).unwrap_err();
        assert!(matches!(
            err,
            Error::Transcript(TranscriptError::HintExceedsTranscript { ref label, .. })
                if label == labels::DEFERRED_WEIGHT_EVALUATIONS
        ));
        assert!(!err.is_check_failure());
    }

    #[test]
    fn test_wrong_public_input() {
        let mut fixture = SpartanFixture::new(FixtureOptions {
            public_inputs: true,
            ..FixtureOptions::default()
        });
        fixture.config.public_inputs = vec![hex::encode(field_to_le_bytes(&F::from_u64(4)))];
        assert!(matches!(
            verify(&fixture),
            Err(Error::Verifier(VerifierError::PublicInputMismatch(_)))
        ));
    }

    #[test]
    fn test_custom_hasher_is_used() {
        struct ZeroHasher;
        impl PublicInputHasher<F> for ZeroHasher {
            fn hash(&self, _inputs: &[F]) -> F {
                F::ZERO
            }
        }

        let fixture = SpartanFixture::new(FixtureOptions {
            public_inputs: true,
            ..FixtureOptions::default()
        });
        let context = fixture.context().unwrap();
        assert!(matches!(
            SpartanVerifier::new(&context).with_hasher(ZeroHasher).verify(),
            Err(Error::Verifier(VerifierError::PublicInputMismatch(_)))
        ));
    }

    #[test]
    fn test_other_instance_fails_matrix_extension() {
        let fixture = SpartanFixture::new(FixtureOptions::default());
        let mut r1cs: R1cs<F> = fixture.r1cs();
        // B of the last constraint becomes 3 instead of 2.
        for cell in &mut r1cs.matrices[1] {
            if cell.row == 3 {
                cell.value = F::from_u64(3);
            }
        }
        let context = VerificationContext::new(&fixture.config, r1cs).unwrap();
        let err = SpartanVerifier::new(&context).verify().unwrap_err();
        assert!(matches!(
            err,
            Error::Verifier(VerifierError::MatrixExtensionMismatch { index: 2 })
        ));
        assert!(matches!(err.verification_failed(), Error::VerificationFailed));
    }

    #[test]
    fn test_tampered_transcript_is_rejected() {
        let mut fixture = SpartanFixture::new(FixtureOptions::default());
        let last = fixture.config.transcript.len() - 1;
        // Last byte of the deferred evaluations.
        fixture.config.transcript[last] ^= 1;
        assert!(verify(&fixture).is_err());
    }
}
