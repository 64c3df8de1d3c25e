use p3_field::PrimeField;

use crate::{
    config::ProofConfig,
    constant::R1CS_MATRICES,
    errors::Error,
    fiat_shamir::{domain_separator::DomainSeparator, hints::labels, pattern::IoPattern},
    parameters::{WhirParameters, errors::ParametersError},
    r1cs::R1cs,
};

/// Polynomials committed together in every ZK commitment: the polynomial and its blinding.
pub const ZK_BATCH_SIZE: usize = 2;

/// How the witness is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitmentMode {
    /// The whole witness under one commitment.
    Single,
    /// The witness split in two commitments, with `num_challenges` logup challenges sampled
    /// between them.
    Dual { num_challenges: usize },
}

impl CommitmentMode {
    #[must_use]
    pub const fn from_challenges(num_challenges: usize) -> Self {
        if num_challenges == 0 {
            Self::Single
        } else {
            Self::Dual { num_challenges }
        }
    }

    #[must_use]
    pub const fn num_commitments(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Dual { .. } => 2,
        }
    }
}

/// One witness commitment of the protocol, in transcript order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentDescriptor {
    pub label: &'static str,
    pub ood_samples: usize,
    /// Challenges squeezed right before the commitment is read.
    pub challenges_before: usize,
    /// Label of the hint carrying the claimed evaluations on this commitment.
    pub claimed_evaluations: String,
}

/// Everything a verification needs, validated once and never mutated.
#[derive(Clone, Debug)]
pub struct VerificationContext<F> {
    pub witness_params: WhirParameters<F>,
    pub hiding_params: WhirParameters<F>,
    pub log_num_constraints: usize,
    pub log_num_variables: usize,
    pub log_a_num_terms: usize,
    pub io_pattern: IoPattern,
    pub transcript: Vec<u8>,
    pub mode: CommitmentMode,
    /// Witness columns held by the first commitment in dual mode.
    pub w1_size: usize,
    pub public_inputs: Vec<F>,
    pub r1cs: R1cs<F>,
}

fn inconsistent(message: String) -> Error {
    Error::Parameters(ParametersError::Inconsistent(message))
}

impl<F: PrimeField> VerificationContext<F> {
    /// Derives the WHIR parameters, decodes the public inputs and checks that every part of
    /// the configuration agrees with the others.
    pub fn new(config: &ProofConfig, r1cs: R1cs<F>) -> Result<Self, Error> {
        config.check_transcript_len()?;
        let witness_params = WhirParameters::new(&config.whir_config_witness)?;
        let hiding_params = WhirParameters::new(&config.whir_config_hiding_spartan)?;
        let public_inputs = config.public_inputs()?;
        let mode = CommitmentMode::from_challenges(config.num_challenges);

        let context = Self {
            witness_params,
            hiding_params,
            log_num_constraints: config.log_num_constraints,
            log_num_variables: config.log_num_variables,
            log_a_num_terms: config.log_a_num_terms,
            io_pattern: IoPattern::parse(config.io_pattern.as_bytes())?,
            transcript: config.transcript.clone(),
            mode,
            w1_size: config.w1_size,
            public_inputs,
            r1cs,
        };
        context.validate()?;
        Ok(context)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.hiding_params.num_variables != self.log_num_constraints {
            return Err(inconsistent(format!(
                "hiding polynomial has {} variables for 2^{} constraints",
                self.hiding_params.num_variables, self.log_num_constraints
            )));
        }
        if self.witness_params.num_variables != self.log_num_variables {
            return Err(inconsistent(format!(
                "witness polynomial has {} variables, expected {}",
                self.witness_params.num_variables, self.log_num_variables
            )));
        }
        for (name, params) in [("witness", &self.witness_params), ("hiding", &self.hiding_params)] {
            if params.batch_size != ZK_BATCH_SIZE {
                return Err(inconsistent(format!(
                    "{name} commitments hold {} polynomials, expected {ZK_BATCH_SIZE}",
                    params.batch_size
                )));
            }
        }
        if self.r1cs.num_constraints > 1 << self.log_num_constraints {
            return Err(inconsistent(format!(
                "{} constraints do not fit in 2^{}",
                self.r1cs.num_constraints, self.log_num_constraints
            )));
        }

        let columns = 1 << self.log_num_variables;
        if let CommitmentMode::Dual { .. } = self.mode {
            if self.w1_size == 0 || self.w1_size > columns {
                return Err(inconsistent(format!(
                    "w1_size {} is outside 1..={columns}",
                    self.w1_size
                )));
            }
        }
        if self.has_public_inputs() {
            if self.public_inputs.len() != self.r1cs.num_public_inputs {
                return Err(inconsistent(format!(
                    "{} public inputs for an instance with {}",
                    self.public_inputs.len(),
                    self.r1cs.num_public_inputs
                )));
            }
            if self.public_inputs.len() >= self.first_commitment_columns() {
                return Err(inconsistent(
                    "public inputs do not fit in the first witness commitment".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Number of witness columns in the first commitment.
    #[must_use]
    pub fn first_commitment_columns(&self) -> usize {
        match self.mode {
            CommitmentMode::Single => 1 << self.log_num_variables,
            CommitmentMode::Dual { .. } => self.w1_size,
        }
    }

    #[must_use]
    pub fn has_public_inputs(&self) -> bool {
        !self.public_inputs.is_empty()
    }

    /// Witness commitments in transcript order.
    #[must_use]
    pub fn commitments(&self) -> Vec<CommitmentDescriptor> {
        let ood_samples = self.witness_params.commitment_ood_samples;
        match self.mode {
            CommitmentMode::Single => vec![CommitmentDescriptor {
                label: "witness",
                ood_samples,
                challenges_before: 0,
                claimed_evaluations: labels::CLAIMED_EVALUATIONS.to_string(),
            }],
            CommitmentMode::Dual { num_challenges } => vec![
                CommitmentDescriptor {
                    label: "witness_1",
                    ood_samples,
                    challenges_before: 0,
                    claimed_evaluations: labels::claimed_evaluations_of(1),
                },
                CommitmentDescriptor {
                    label: "witness_2",
                    ood_samples,
                    challenges_before: num_challenges,
                    claimed_evaluations: labels::claimed_evaluations_of(2),
                },
            ],
        }
    }

    /// Number of linear statements on each witness commitment.
    #[must_use]
    pub fn statements_per_commitment(&self) -> Vec<usize> {
        (0..self.mode.num_commitments())
            .map(|i| R1CS_MATRICES + usize::from(i == 0 && self.has_public_inputs()))
            .collect()
    }

    /// The IO pattern a proof for this context follows.
    #[must_use]
    pub fn domain_separator(&self, session_identifier: &str) -> DomainSeparator {
        let mut ds = DomainSeparator::new(session_identifier);
        let commitments = self.commitments();
        for commitment in &commitments {
            ds.challenge_scalars::<F>(commitment.challenges_before, "logup_challenges");
            ds.add_whir_commitment(&self.witness_params);
        }
        if self.has_public_inputs() {
            ds.add_public_inputs::<F>();
        }
        ds.challenge_scalars::<F>(self.log_num_constraints, "tau");
        ds.add_zk_sumcheck(&self.hiding_params, self.log_num_constraints);

        for commitment in &commitments {
            ds.hint(&commitment.claimed_evaluations);
        }
        match self.mode {
            CommitmentMode::Single => ds.add_whir_proof(&self.witness_params),
            CommitmentMode::Dual { .. } => {
                let ood: usize = commitments.iter().map(|c| c.ood_samples).sum();
                let statements: usize = self.statements_per_commitment().iter().sum();
                ds.add_whir_batch_proof(&self.witness_params, commitments.len(), ood + statements);
            }
        }
        ds.hint(labels::DEFERRED_WEIGHT_EVALUATIONS);
        ds
    }
}

#[cfg(test)]
mod tests {
    use p3_field::{PrimeCharacteristicRing, PrimeField};

    use super::*;
    use crate::{
        FieldElement,
        fiat_shamir::pattern::OpKind,
        testing::whir_config,
    };

    type F = FieldElement;

    fn proof_config(num_challenges: usize, public_inputs: Vec<String>) -> ProofConfig {
        let mut witness = whir_config(1, vec![2], 4, 1);
        witness.batch_size = 2;
        let mut hiding = whir_config(0, vec![2], 2, 1);
        hiding.batch_size = 2;
        ProofConfig {
            whir_config_witness: witness,
            whir_config_hiding_spartan: hiding,
            log_num_constraints: 2,
            log_num_variables: 4,
            log_a_num_terms: 3,
            io_pattern: "spartan".to_string(),
            transcript: Vec::new(),
            transcript_len: 0,
            num_challenges,
            w1_size: if num_challenges > 0 { 8 } else { 0 },
            public_inputs,
        }
    }

    fn context(config: &ProofConfig, num_public_inputs: usize) -> Result<VerificationContext<F>, Error> {
        let r1cs = R1cs {
            num_public_inputs,
            num_witnesses: 16,
            num_constraints: 4,
            matrices: Default::default(),
        };
        VerificationContext::new(config, r1cs)
    }

    #[test]
    fn test_single_mode_descriptors() {
        let ctx = context(&proof_config(0, vec![]), 0).unwrap();
        assert_eq!(ctx.mode, CommitmentMode::Single);
        let commitments = ctx.commitments();
        assert_eq!(commitments.len(), 1);
        assert_eq!(commitments[0].claimed_evaluations, "claimed_evaluations");
        assert_eq!(commitments[0].ood_samples, 1);
        assert_eq!(ctx.statements_per_commitment(), vec![3]);
    }

    #[test]
    fn test_dual_mode_with_public_inputs() {
        let ctx = context(&proof_config(2, vec!["05".to_string()]), 1).unwrap();
        assert_eq!(ctx.mode, CommitmentMode::Dual { num_challenges: 2 });
        let commitments = ctx.commitments();
        assert_eq!(commitments[1].challenges_before, 2);
        assert_eq!(commitments[1].claimed_evaluations, "claimed_evaluations_2");
        assert_eq!(ctx.statements_per_commitment(), vec![4, 3]);

        let pattern = ctx.domain_separator("spartan").to_io_pattern().unwrap();
        let labels: Vec<&str> = pattern
            .ops()
            .iter()
            .filter(|op| op.kind == OpKind::Hint)
            .map(|op| op.label.as_str())
            .collect();
        assert_eq!(labels[0], "stir_answers");
        assert!(labels.contains(&"claimed_evaluations_1"));
        assert!(labels.contains(&"stir_answers_witness_1"));
        assert_eq!(labels.last(), Some(&"deferred_weight_evaluations"));
        assert!(pattern.ops().iter().any(|op| op.label == "public_inputs_hash"));
        assert!(pattern.ops().iter().any(|op| op.label == "logup_challenges"));
    }

    #[test]
    fn test_rejects_inconsistent_configurations() {
        let mut config = proof_config(0, vec![]);
        config.log_num_constraints = 3;
        assert!(matches!(
            context(&config, 0),
            Err(Error::Parameters(ParametersError::Inconsistent(_)))
        ));

        let mut config = proof_config(0, vec![]);
        config.whir_config_witness.batch_size = 1;
        assert!(matches!(
            context(&config, 0),
            Err(Error::Parameters(ParametersError::Inconsistent(_)))
        ));

        let mut config = proof_config(1, vec![]);
        config.w1_size = 17;
        assert!(matches!(
            context(&config, 0),
            Err(Error::Parameters(ParametersError::Inconsistent(_)))
        ));

        let config = proof_config(0, vec!["01".to_string()]);
        assert!(matches!(
            context(&config, 2),
            Err(Error::Parameters(ParametersError::Inconsistent(_)))
        ));

        let mut config = proof_config(0, vec![]);
        config.transcript_len = 1;
        assert!(matches!(context(&config, 0), Err(Error::Config(_))));

        let mut config = proof_config(0, vec![]);
        config.whir_config_hiding_spartan.domain_generator = F::ONE.as_canonical_biguint().to_string();
        assert!(matches!(context(&config, 0), Err(Error::Parameters(_))));
    }
}
