use std::fmt::Write;

use p3_field::Field;

use super::{errors::TranscriptError, pattern::IoPattern};
use crate::{
    constant::{POW_CHALLENGE_BYTES, POW_NONCE_BYTES, POW_NONCE_LABEL},
    parameters::{WhirParameters, stir_query_bytes},
    utils::challenge_bytes_len,
};

/// Separates operations; the one byte a label may not contain.
const SEP_BYTE: &str = "\0";

/// Builder of the IO pattern of a protocol.
///
/// The pattern starts with a session identifier followed by one `\0`-separated operation per
/// transcript step:
///
/// ```text
///     session A1merkle_digest S47ood_query A1ood_ans Hmerkle_proof
/// ```
///
/// `A<n>` absorbs `n` prover scalars (bytes for the proof-of-work nonce), `S<n>` squeezes `n`
/// challenge bytes and `H` marks a length-prefixed hint the sponge never sees. Labels may not
/// start with a digit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainSeparator {
    io: String,
}

fn check_label(label: &str) {
    assert!(!label.contains(SEP_BYTE), "label `{label}` contains a NUL byte");
    assert!(
        !label.starts_with(|c: char| c.is_ascii_digit()),
        "label `{label}` starts with a digit"
    );
}

impl DomainSeparator {
    #[must_use]
    pub fn new(session_identifier: &str) -> Self {
        assert!(
            !session_identifier.contains(SEP_BYTE),
            "session identifier contains a NUL byte"
        );
        Self {
            io: session_identifier.to_string(),
        }
    }

    /// Absorb `count` prover elements.
    pub fn absorb(&mut self, count: usize, label: &str) {
        assert_ne!(count, 0, "empty operation `{label}`");
        check_label(label);
        self.io += SEP_BYTE;
        let _ = write!(self.io, "A{count}{label}");
    }

    /// Squeeze `count` bytes.
    pub fn squeeze(&mut self, count: usize, label: &str) {
        assert_ne!(count, 0, "empty operation `{label}`");
        check_label(label);
        self.io += SEP_BYTE;
        let _ = write!(self.io, "S{count}{label}");
    }

    /// Declare a hint.
    pub fn hint(&mut self, label: &str) {
        check_label(label);
        self.io += SEP_BYTE;
        let _ = write!(self.io, "H{label}");
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.io.as_bytes()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.io
    }

    /// Parses the built pattern.
    pub fn to_io_pattern(&self) -> Result<IoPattern, TranscriptError> {
        IoPattern::parse(self.as_bytes())
    }

    pub fn add_scalars(&mut self, count: usize, label: &str) {
        if count > 0 {
            self.absorb(count, label);
        }
    }

    pub fn challenge_scalars<F: Field>(&mut self, count: usize, label: &str) {
        if count > 0 {
            self.squeeze(count * challenge_bytes_len::<F>(), label);
        }
    }

    pub fn challenge_bytes(&mut self, count: usize, label: &str) {
        if count > 0 {
            self.squeeze(count, label);
        }
    }

    pub fn add_digest(&mut self, label: &str) {
        self.absorb(1, label);
    }

    /// A proof-of-work challenge followed by its nonce, skipped for zero bits.
    pub fn pow(&mut self, bits: usize) {
        if bits > 0 {
            self.squeeze(POW_CHALLENGE_BYTES, "pow_queries");
            self.absorb(POW_NONCE_BYTES, POW_NONCE_LABEL);
        }
    }

    pub fn add_ood<F: Field>(&mut self, num_samples: usize) {
        if num_samples > 0 {
            self.challenge_scalars::<F>(num_samples, "ood_query");
            self.add_scalars(num_samples, "ood_ans");
        }
    }

    /// Performs `rounds` rounds of quadratic sumcheck interaction with the transcript.
    ///
    /// In each round:
    /// - Absorbs 3 scalars for the sumcheck polynomial.
    /// - Samples 1 scalar for folding randomness.
    pub fn add_sumcheck<F: Field>(&mut self, rounds: usize) {
        for _ in 0..rounds {
            self.add_scalars(3, "sumcheck_poly");
            self.challenge_scalars::<F>(1, "folding_randomness");
        }
    }

    /// Same as [`Self::add_sumcheck`] for cubic polynomials sent as 4 coefficients.
    pub fn add_cubic_sumcheck<F: Field>(&mut self, rounds: usize) {
        for _ in 0..rounds {
            self.add_scalars(4, "sumcheck_poly");
            self.challenge_scalars::<F>(1, "folding_randomness");
        }
    }

    /// Root, out-of-domain sample and batching randomness of a commitment.
    pub fn add_whir_commitment<F: Field>(&mut self, params: &WhirParameters<F>) {
        self.add_digest("merkle_digest");
        self.challenge_scalars::<F>(params.commitment_ood_samples, "ood_query");
        self.add_scalars(
            params.commitment_ood_samples * params.batch_size,
            "ood_ans",
        );
        self.challenge_scalars::<F>(1, "batching_randomness");
    }

    /// STIR queries into the domain of `round` and the hints opening them.
    fn add_stir_queries<F: Field>(
        &mut self,
        params: &WhirParameters<F>,
        round: usize,
        num_queries: usize,
        num_commitments: Option<usize>,
    ) {
        let folded = params.domain_size_at(round) >> params.folding_factor_at(round);
        self.challenge_bytes(num_queries * stir_query_bytes(folded), "stir_queries");
        match num_commitments {
            Some(n) => {
                for i in 0..n {
                    self.hint(&format!("stir_answers_witness_{i}"));
                    self.hint(&format!("merkle_proof_witness_{i}"));
                }
            }
            None => {
                self.hint("stir_answers");
                self.hint("merkle_proof");
            }
        }
    }

    fn add_whir_rounds<F: Field>(&mut self, params: &WhirParameters<F>, num_commitments: Option<usize>) {
        self.add_sumcheck::<F>(params.folding_factor_at(0));

        for (round, r) in params.round_parameters.iter().enumerate() {
            self.add_digest("merkle_digest");
            self.add_ood::<F>(r.ood_samples);
            self.pow(r.pow_bits);
            let commitments = if round == 0 { num_commitments } else { None };
            self.add_stir_queries(params, round, r.num_queries, commitments);
            self.challenge_scalars::<F>(1, "combination_randomness");
            self.add_sumcheck::<F>(params.folding_factor_at(round + 1));
        }

        let n_rounds = params.n_rounds();
        self.add_scalars(params.final_coefficients(), "final_coeffs");
        self.pow(params.final_pow_bits);
        let commitments = if n_rounds == 0 { num_commitments } else { None };
        self.add_stir_queries(params, n_rounds, params.final_queries, commitments);
        self.add_sumcheck::<F>(params.final_sumcheck_rounds);
        self.pow(params.final_folding_pow_bits);
    }

    /// Single-commitment WHIR proof, following [`Self::add_whir_commitment`].
    pub fn add_whir_proof<F: Field>(&mut self, params: &WhirParameters<F>) {
        self.challenge_scalars::<F>(1, "initial_combination_randomness");
        self.add_whir_rounds(params, None);
    }

    /// WHIR proof over `num_commitments` commitments opened together.
    ///
    /// `num_constraints` is the number of columns of the evaluation matrix (out-of-domain
    /// samples and statements of every commitment).
    pub fn add_whir_batch_proof<F: Field>(
        &mut self,
        params: &WhirParameters<F>,
        num_commitments: usize,
        num_constraints: usize,
    ) {
        self.add_scalars(num_commitments * num_constraints, "batch_evaluations");
        self.challenge_scalars::<F>(1, "batch_combination_randomness");
        self.challenge_scalars::<F>(1, "initial_combination_randomness");
        self.add_whir_rounds(params, Some(num_commitments));
    }

    /// Hash of the public inputs, the challenge weighting them and the two claimed
    /// evaluations of the public weights.
    pub fn add_public_inputs<F: Field>(&mut self) {
        self.add_scalars(1, "public_inputs_hash");
        self.challenge_scalars::<F>(1, "public_weights_challenge");
        self.add_scalars(2, "public_weights_evaluations");
    }

    /// Zero-knowledge sumcheck over `rounds` variables, blinded by a polynomial committed
    /// with `hiding` and opened by a WHIR proof.
    pub fn add_zk_sumcheck<F: Field>(&mut self, hiding: &WhirParameters<F>, rounds: usize) {
        self.add_whir_commitment(hiding);
        self.add_scalars(1, "sum_g");
        self.challenge_scalars::<F>(1, "blinding_challenge");
        self.add_cubic_sumcheck::<F>(rounds);
        self.add_scalars(2, "blinded_sums");
        self.add_whir_proof(hiding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FieldElement,
        config::WhirConfig,
        fiat_shamir::pattern::{Op, OpKind},
        testing::domain_generator,
    };
    use p3_field::PrimeField;

    type F = FieldElement;

    fn params(n_rounds: usize, pow_bits: usize) -> WhirParameters<F> {
        WhirParameters::new(&WhirConfig {
            n_rounds,
            rate: 1,
            n_vars: 8,
            folding_factor: vec![4, 4],
            ood_samples: vec![1; n_rounds],
            num_queries: vec![2; n_rounds],
            pow_bits: vec![pow_bits; n_rounds],
            final_queries: 3,
            final_pow_bits: 0,
            final_folding_pow_bits: 0,
            domain_generator: domain_generator::<F>(9).as_canonical_biguint().to_string(),
            batch_size: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_basic_operations() {
        let mut ds = DomainSeparator::new("proto");
        ds.add_scalars(2, "values");
        ds.challenge_scalars::<F>(1, "challenge");
        ds.hint("merkle_proof");
        ds.pow(3);
        assert_eq!(
            ds.as_str(),
            "proto\0A2values\0S47challenge\0Hmerkle_proof\0S32pow_queries\0A8pow-nonce"
        );
    }

    #[test]
    fn test_zero_counts_are_skipped() {
        let mut ds = DomainSeparator::new("proto");
        ds.add_scalars(0, "nothing");
        ds.challenge_bytes(0, "nothing");
        ds.pow(0);
        ds.add_ood::<F>(0);
        assert_eq!(ds.as_str(), "proto");
    }

    #[test]
    #[should_panic]
    fn test_label_cannot_start_with_digit() {
        DomainSeparator::new("proto").absorb(1, "1abc");
    }

    #[test]
    #[should_panic]
    fn test_session_cannot_contain_separator() {
        let _ = DomainSeparator::new("pro\0to");
    }

    #[test]
    fn test_whir_commitment_pattern() {
        let mut ds = DomainSeparator::new("whir");
        ds.add_whir_commitment(&params(1, 0));
        assert_eq!(
            ds.as_str(),
            "whir\0A1merkle_digest\0S47ood_query\0A2ood_ans\0S47batching_randomness"
        );
    }

    #[test]
    fn test_whir_proof_pattern_round_trips_through_parser() {
        let params = params(1, 2);
        let mut ds = DomainSeparator::new("whir");
        ds.add_whir_commitment(&params);
        ds.add_whir_proof(&params);
        let pattern = ds.to_io_pattern().unwrap();

        let hints: Vec<&str> = pattern
            .ops()
            .iter()
            .filter(|op| op.kind == OpKind::Hint)
            .map(|op| op.label.as_str())
            .collect();
        assert_eq!(
            hints,
            vec!["stir_answers", "merkle_proof", "stir_answers", "merkle_proof"]
        );

        // Round 0 queries 512 / 16 = 32 cosets (1 byte each), the final phase 256 / 16 = 16.
        let queries: Vec<&Op> = pattern
            .ops()
            .iter()
            .filter(|op| op.label == "stir_queries")
            .collect();
        assert_eq!(queries[0].size, 2);
        assert_eq!(queries[1].size, 3);

        let sumcheck_rounds = pattern
            .ops()
            .iter()
            .filter(|op| op.label == "sumcheck_poly")
            .count();
        assert_eq!(sumcheck_rounds, 8);
        assert!(pattern.ops().iter().any(|op| op.counts_bytes()));
    }

    #[test]
    fn test_whir_batch_proof_uses_per_commitment_hints() {
        let params = params(1, 0);
        let mut ds = DomainSeparator::new("whir");
        ds.add_whir_batch_proof(&params, 2, 5);
        let pattern = ds.to_io_pattern().unwrap();

        assert_eq!(pattern.ops()[0].size, 10);
        let hints: Vec<&str> = pattern
            .ops()
            .iter()
            .filter(|op| op.kind == OpKind::Hint)
            .map(|op| op.label.as_str())
            .collect();
        assert_eq!(
            hints,
            vec![
                "stir_answers_witness_0",
                "merkle_proof_witness_0",
                "stir_answers_witness_1",
                "merkle_proof_witness_1",
                "stir_answers",
                "merkle_proof"
            ]
        );
    }
}
