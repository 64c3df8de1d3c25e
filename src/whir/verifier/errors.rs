//! Verifier error types for WHIR and Spartan validation.

use thiserror::Error;

use crate::fiat_shamir::{errors::TranscriptError, hints::HintError};

/// Errors for WHIR protocol verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// Merkle tree proof verification failed for polynomial commitment.
    #[error("Merkle proof verification failed at position {position}: {reason}")]
    MerkleProofInvalid { position: usize, reason: String },

    /// A STIR query is not backed by the opened Merkle leaves.
    #[error("STIR query {position} is not opened: {reason}")]
    QueryIndexMismatch { position: usize, reason: String },

    /// Sumcheck verification failed due to inconsistent polynomial evaluations.
    #[error("Sumcheck verification failed at round {round}: expected {expected}, got {actual}")]
    SumcheckFailed {
        round: usize,
        expected: String,
        actual: String,
    },

    /// A proof-of-work nonce does not meet its difficulty.
    #[error("proof of work of {bits} bits is invalid")]
    PowInvalid { bits: usize },

    /// A folded STIR answer disagrees with the final polynomial.
    #[error("fold of query {position} does not match the final polynomial")]
    FoldMismatch { position: usize },

    /// The final claim is not `W(r) * f(r)`.
    #[error("final WHIR identity does not hold")]
    FinalIdentityFailed,

    /// The last Spartan sumcheck value is not `(az * bz - cz) * eq(alpha, t)`.
    #[error("Spartan relation does not hold")]
    SpartanRelationFailed,

    /// A deferred evaluation disagrees with the one recomputed by the verifier.
    #[error("deferred evaluation {index} does not match the matrix extension")]
    MatrixExtensionMismatch { index: usize },

    /// The public inputs are not bound by the proof.
    #[error("public input binding failed: {0}")]
    PublicInputMismatch(String),

    /// A row of the batched evaluation matrix disagrees with its commitment.
    #[error("batched evaluations of commitment {commitment} are inconsistent")]
    BatchBindingFailed { commitment: usize },

    /// The proof has the wrong shape for the parameters.
    #[error("malformed proof: {0}")]
    Malformed(String),

    /// Fiat-Shamir transcript error during verification.
    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    /// A hint could not be decoded.
    #[error(transparent)]
    Hint(#[from] HintError),
}

impl VerifierError {
    /// Whether this error is a failed algebraic or cryptographic check, as opposed to
    /// malformed input.
    #[must_use]
    pub const fn is_check_failure(&self) -> bool {
        !matches!(
            self,
            Self::Malformed(_) | Self::Transcript(_) | Self::Hint(_)
        )
    }
}
