//! Zero-knowledge Spartan verifier over WHIR polynomial commitments.
//!
//! The witness is committed (once, or split in two commitments when logup challenges are
//! involved) together with a blinding polynomial. A blinded cubic sumcheck reduces the R1CS
//! relation to claims on `Az`, `Bz` and `Cz`, which are checked by a WHIR proof on the witness
//! whose deferred weights are the multilinear extensions of the R1CS matrices.

pub mod context;
pub mod public_inputs;
pub mod verifier;
pub mod zk_sumcheck;

pub use context::{CommitmentDescriptor, CommitmentMode, VerificationContext};
pub use verifier::{SpartanOutcome, SpartanVerifier};
