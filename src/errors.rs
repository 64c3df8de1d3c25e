//! Top-level error type of the verifier.

use thiserror::Error;

use crate::{
    config::ConfigError,
    fiat_shamir::{errors::TranscriptError, hints::HintError},
    parameters::errors::ParametersError,
    r1cs::R1csError,
    whir::verifier::errors::VerifierError,
};

/// Any failure of a verification, from loading its inputs to the last algebraic check.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parameters(#[from] ParametersError),

    #[error(transparent)]
    R1cs(#[from] R1csError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    #[error(transparent)]
    Hint(#[from] HintError),

    /// A check of the proof failed.
    #[error(transparent)]
    Verifier(#[from] VerifierError),

    /// Opaque form of every failed check, see [`Error::verification_failed`].
    #[error("verification failed")]
    VerificationFailed,
}

impl Error {
    /// Whether the proof was rejected by an algebraic or cryptographic check.
    #[must_use]
    pub const fn is_check_failure(&self) -> bool {
        match self {
            Self::Verifier(err) => err.is_check_failure(),
            Self::VerificationFailed => true,
            _ => false,
        }
    }

    /// Hides which check failed.
    ///
    /// Malformed inputs and configuration errors keep their detail.
    #[must_use]
    pub fn verification_failed(self) -> Self {
        if self.is_check_failure() {
            Self::VerificationFailed
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_failures_become_opaque() {
        let err = Error::from(VerifierError::FinalIdentityFailed).verification_failed();
        assert!(matches!(err, Error::VerificationFailed));

        let err = Error::from(VerifierError::MerkleProofInvalid {
            position: 3,
            reason: "root".to_string(),
        });
        assert!(err.is_check_failure());
        assert_eq!(err.verification_failed().to_string(), "verification failed");
    }

    #[test]
    fn test_malformed_inputs_keep_their_detail() {
        let err = Error::from(TranscriptError::TrailingBytes(2)).verification_failed();
        assert!(matches!(err, Error::Transcript(TranscriptError::TrailingBytes(2))));

        let err = Error::from(VerifierError::Malformed("short leaf".to_string()));
        assert!(!err.is_check_failure());
        assert!(err.verification_failed().to_string().contains("short leaf"));

        let err = Error::from(ParametersError::ZeroBatchSize).verification_failed();
        assert!(matches!(err, Error::Parameters(ParametersError::ZeroBatchSize)));
    }
}
