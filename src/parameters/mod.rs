use std::fmt::Display;

use errors::ParametersError;
use num_bigint::BigUint;
use p3_field::Field;

use crate::{
    config::WhirConfig,
    constant::{COMMITMENT_OOD_SAMPLES, MAX_POW_DIFFICULTY},
    utils::{bit_length, field_from_biguint},
};

pub mod errors;

/// Defines the folding factor of every WHIR round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldingFactor {
    /// A fixed folding factor used in all rounds.
    Constant(usize),
    /// One factor per round; rounds past the end reuse the last factor.
    PerRound(Vec<usize>),
}

impl FoldingFactor {
    /// Builds the folding factor from the configured array.
    ///
    /// A single entry means a constant factor.
    pub fn from_factors(factors: &[usize]) -> Result<Self, ParametersError> {
        if let Some(round) = factors.iter().position(|&k| k == 0) {
            return Err(ParametersError::ZeroFactor(round));
        }
        match factors {
            [] => Err(ParametersError::EmptyFoldingFactor),
            [factor] => Ok(Self::Constant(*factor)),
            _ => Ok(Self::PerRound(factors.to_vec())),
        }
    }

    /// Retrieves the folding factor for a given round.
    #[must_use]
    pub fn at_round(&self, round: usize) -> usize {
        match self {
            Self::Constant(factor) => *factor,
            Self::PerRound(factors) => factors
                .get(round)
                .or_else(|| factors.last())
                .copied()
                .unwrap_or_default(),
        }
    }

    /// Number of variables folded over rounds `0..=n_rounds`.
    #[must_use]
    pub fn total_number(&self, n_rounds: usize) -> usize {
        (0..=n_rounds).map(|round| self.at_round(round)).sum()
    }
}

/// Parameters of one main WHIR round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundConfig<F> {
    /// Folding factor of the oracle queried in this round.
    pub folding_factor: usize,
    pub num_queries: usize,
    pub ood_samples: usize,
    pub pow_bits: usize,
    /// Size of the domain queried in this round.
    pub domain_size: usize,
    /// Generator of the folded domain, mapping a query index to its point.
    pub exp_domain_gen: F,
}

/// Validated WHIR parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhirParameters<F> {
    pub num_variables: usize,
    pub log_inv_rate: usize,
    pub folding_factor: FoldingFactor,
    pub commitment_ood_samples: usize,
    pub starting_domain_size: usize,
    pub domain_gen: F,
    pub round_parameters: Vec<RoundConfig<F>>,
    pub final_queries: usize,
    pub final_pow_bits: usize,
    pub final_folding_pow_bits: usize,
    pub final_sumcheck_rounds: usize,
    /// Number of polynomials committed together under one root.
    pub batch_size: usize,
}

fn check_len(name: &'static str, values: &[usize], n_rounds: usize) -> Result<(), ParametersError> {
    if values.len() < n_rounds {
        return Err(ParametersError::MissingRoundValues {
            name,
            len: values.len(),
            n_rounds,
        });
    }
    Ok(())
}

fn check_pow(name: &'static str, bits: usize) -> Result<(), ParametersError> {
    if bits > MAX_POW_DIFFICULTY {
        return Err(ParametersError::PowTooLarge {
            name,
            bits,
            max: MAX_POW_DIFFICULTY,
        });
    }
    Ok(())
}

impl<F: Field> WhirParameters<F> {
    /// Derives and validates the parameters of a WHIR instance.
    pub fn new(config: &WhirConfig) -> Result<Self, ParametersError> {
        let n_rounds = config.n_rounds;
        let folding_factor = FoldingFactor::from_factors(&config.folding_factor)?;

        check_len("ood_samples", &config.ood_samples, n_rounds)?;
        check_len("num_queries", &config.num_queries, n_rounds)?;
        check_len("pow_bits", &config.pow_bits, n_rounds)?;
        for &bits in &config.pow_bits[..n_rounds] {
            check_pow("pow_bits", bits)?;
        }
        check_pow("final_pow_bits", config.final_pow_bits)?;
        check_pow("final_folding_pow_bits", config.final_folding_pow_bits)?;

        if config.batch_size == 0 {
            return Err(ParametersError::ZeroBatchSize);
        }

        let total = folding_factor.total_number(n_rounds);
        let final_sumcheck_rounds = config.num_variables_checked(total)?;

        let log_domain = config.n_vars + config.rate;
        if log_domain >= usize::BITS as usize - 1 {
            return Err(ParametersError::DomainTooLarge(log_domain));
        }
        let starting_domain_size = 1 << log_domain;

        for round in 0..=n_rounds {
            let factor = folding_factor.at_round(round);
            let log_round_domain = log_domain.saturating_sub(round);
            if factor > log_round_domain {
                return Err(ParametersError::FoldingExceedsDomain {
                    round,
                    factor,
                    log_domain: log_round_domain,
                });
            }
        }

        let domain_gen = parse_generator::<F>(&config.domain_generator)?;
        let has_order = domain_gen.exp_power_of_2(log_domain) == F::ONE
            && (log_domain == 0 || domain_gen.exp_power_of_2(log_domain - 1) != F::ONE);
        if !has_order {
            return Err(ParametersError::WrongGeneratorOrder(starting_domain_size));
        }

        let round_parameters = (0..n_rounds)
            .map(|round| {
                let factor = folding_factor.at_round(round);
                RoundConfig {
                    folding_factor: factor,
                    num_queries: config.num_queries[round],
                    ood_samples: config.ood_samples[round],
                    pow_bits: config.pow_bits[round],
                    domain_size: starting_domain_size >> round,
                    exp_domain_gen: domain_gen.exp_power_of_2(round + factor),
                }
            })
            .collect();

        Ok(Self {
            num_variables: config.n_vars,
            log_inv_rate: config.rate,
            folding_factor,
            commitment_ood_samples: COMMITMENT_OOD_SAMPLES,
            starting_domain_size,
            domain_gen,
            round_parameters,
            final_queries: config.final_queries,
            final_pow_bits: config.final_pow_bits,
            final_folding_pow_bits: config.final_folding_pow_bits,
            final_sumcheck_rounds,
            batch_size: config.batch_size,
        })
    }

    #[must_use]
    pub const fn n_rounds(&self) -> usize {
        self.round_parameters.len()
    }

    #[must_use]
    pub fn folding_factor_at(&self, round: usize) -> usize {
        self.folding_factor.at_round(round)
    }

    /// Size of the domain queried in `round` (the final phase is round `n_rounds`).
    #[must_use]
    pub const fn domain_size_at(&self, round: usize) -> usize {
        self.starting_domain_size >> round
    }

    /// Generator of the folded domain queried in `round`: `gen^(2^(round + k_round))`.
    #[must_use]
    pub fn query_generator(&self, round: usize) -> F {
        self.domain_gen
            .exp_power_of_2(round + self.folding_factor_at(round))
    }

    /// Folding factor of the oracle queried in the final phase.
    #[must_use]
    pub fn final_folding_factor(&self) -> usize {
        self.folding_factor_at(self.n_rounds())
    }

    /// Number of coefficients sent in the final phase.
    #[must_use]
    pub const fn final_coefficients(&self) -> usize {
        1 << self.final_sumcheck_rounds
    }

    /// Total number of sumcheck rounds, i.e. the length of the folding randomness.
    #[must_use]
    pub const fn total_sumcheck_rounds(&self) -> usize {
        self.num_variables
    }
}

impl WhirConfig {
    /// `n_vars - total`, or an error when the folding factors fold too much.
    fn num_variables_checked(&self, total: usize) -> Result<usize, ParametersError> {
        self.n_vars
            .checked_sub(total)
            .ok_or(ParametersError::TooManyFoldedVariables {
                total,
                n_vars: self.n_vars,
            })
    }
}

/// Number of bytes squeezed per STIR query over a folded domain of `folded_domain_size` points.
#[must_use]
pub const fn stir_query_bytes(folded_domain_size: usize) -> usize {
    (bit_length(2 * folded_domain_size - 1) - 1).div_ceil(8)
}

fn parse_generator<F: Field>(generator: &str) -> Result<F, ParametersError> {
    BigUint::parse_bytes(generator.trim().as_bytes(), 10)
        .map(|value| field_from_biguint(&value))
        .ok_or_else(|| ParametersError::InvalidGenerator(generator.to_string()))
}

impl<F: Field> Display for WhirParameters<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Number of variables: {}, log inv rate: {}, batch size: {}",
            self.num_variables, self.log_inv_rate, self.batch_size
        )?;
        for (round, r) in self.round_parameters.iter().enumerate() {
            writeln!(
                f,
                "Round {round}: k = {}, domain = {}, queries = {}, ood = {}, pow = {}",
                r.folding_factor, r.domain_size, r.num_queries, r.ood_samples, r.pow_bits
            )?;
        }
        write!(
            f,
            "Final: k = {}, queries = {}, pow = {}, sumcheck rounds = {}, folding pow = {}",
            self.final_folding_factor(),
            self.final_queries,
            self.final_pow_bits,
            self.final_sumcheck_rounds,
            self.final_folding_pow_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use p3_field::{PrimeCharacteristicRing, PrimeField};

    use super::*;
    use crate::{FieldElement, testing::domain_generator};

    type F = FieldElement;

    fn config(n_rounds: usize, folding_factor: Vec<usize>, n_vars: usize, rate: usize) -> WhirConfig {
        let generator = domain_generator::<F>(n_vars + rate);
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
            domain_generator: generator.as_canonical_biguint().to_string(),
            batch_size: 1,
        }
    }

    #[test]
    fn test_folding_factor_clamps_to_last() {
        let ff = FoldingFactor::from_factors(&[4, 3]).unwrap();
        assert_eq!(ff.at_round(0), 4);
        assert_eq!(ff.at_round(1), 3);
        assert_eq!(ff.at_round(7), 3);
        assert_eq!(ff.total_number(2), 10);

        let ff = FoldingFactor::from_factors(&[2]).unwrap();
        assert_eq!(ff, FoldingFactor::Constant(2));
        assert_eq!(ff.total_number(3), 8);
    }

    #[test]
    fn test_folding_factor_rejects_empty_and_zero() {
        assert_eq!(
            FoldingFactor::from_factors(&[]),
            Err(ParametersError::EmptyFoldingFactor)
        );
        assert_eq!(
            FoldingFactor::from_factors(&[4, 0]),
            Err(ParametersError::ZeroFactor(1))
        );
    }

    #[test]
    fn test_domain_bookkeeping() {
        let params = WhirParameters::<F>::new(&config(1, vec![4, 4], 8, 1)).unwrap();

        assert_eq!(params.starting_domain_size, 512);
        assert_eq!(params.domain_size_at(1), 256);
        assert_eq!(params.final_sumcheck_rounds, 0);
        assert_eq!(params.final_coefficients(), 1);
        assert_eq!(params.final_folding_factor(), 4);
        assert_eq!(params.commitment_ood_samples, 1);

        // Round r queries the domain of size D_r / 2^k_r.
        let round = &params.round_parameters[0];
        assert_eq!(round.domain_size, 512);
        assert_eq!(round.exp_domain_gen.exp_u64(512 / 16), F::ONE);
        assert_ne!(round.exp_domain_gen.exp_u64(512 / 32), F::ONE);

        let last = params.query_generator(1);
        assert_eq!(last.exp_u64(256 / 16), F::ONE);
        assert_ne!(last.exp_u64(256 / 32), F::ONE);
    }

    #[test]
    fn test_query_generator_matches_squaring_for_constant_factor() {
        let params = WhirParameters::<F>::new(&config(2, vec![2], 8, 2)).unwrap();
        let mut expected = params.domain_gen.exp_power_of_2(2);
        for round in 0..=2 {
            assert_eq!(params.query_generator(round), expected);
            expected = expected.square();
        }
        assert_eq!(params.final_sumcheck_rounds, 2);
    }

    #[test]
    fn test_rejects_invalid_configurations() {
        let mut c = config(1, vec![4, 4], 8, 1);
        c.n_vars = 7;
        c.domain_generator = domain_generator::<F>(8).as_canonical_biguint().to_string();
        assert_eq!(
            WhirParameters::<F>::new(&c),
            Err(ParametersError::TooManyFoldedVariables { total: 8, n_vars: 7 })
        );

        let mut c = config(1, vec![4, 4], 8, 1);
        c.pow_bits = vec![28];
        assert!(matches!(
            WhirParameters::<F>::new(&c),
            Err(ParametersError::PowTooLarge { bits: 28, .. })
        ));

        let mut c = config(2, vec![4, 4], 8, 1);
        c.num_queries = vec![1];
        assert!(matches!(
            WhirParameters::<F>::new(&c),
            Err(ParametersError::MissingRoundValues { name: "num_queries", .. })
        ));

        let mut c = config(1, vec![4, 4], 8, 1);
        c.batch_size = 0;
        assert_eq!(WhirParameters::<F>::new(&c), Err(ParametersError::ZeroBatchSize));

        let mut c = config(1, vec![4, 4], 8, 1);
        c.domain_generator = "not a number".to_string();
        assert!(matches!(
            WhirParameters::<F>::new(&c),
            Err(ParametersError::InvalidGenerator(_))
        ));

        let mut c = config(1, vec![4, 4], 8, 1);
        c.domain_generator = domain_generator::<F>(8).as_canonical_biguint().to_string();
        assert_eq!(
            WhirParameters::<F>::new(&c),
            Err(ParametersError::WrongGeneratorOrder(512))
        );
    }

    #[test]
    fn test_stir_query_bytes() {
        assert_eq!(stir_query_bytes(1), 0);
        assert_eq!(stir_query_bytes(2), 1);
        assert_eq!(stir_query_bytes(32), 1);
        assert_eq!(stir_query_bytes(256), 1);
        assert_eq!(stir_query_bytes(512), 2);
    }
}
