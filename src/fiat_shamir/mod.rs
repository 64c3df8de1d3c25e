//! Fiat-Shamir transcript replay: IO patterns, the Keccak duplex sponge, the pre-pass that
//! separates hints from public prover messages, and the verifier state.

pub mod domain_separator;
pub mod duplex_sponge;
pub mod errors;
pub mod hints;
pub mod keccak;
pub mod pattern;
#[cfg(any(test, feature = "test-utils"))]
pub mod prover;
pub mod transcript;
pub mod verifier;
