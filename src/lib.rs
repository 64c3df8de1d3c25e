pub mod backend;
pub mod config;
pub mod constant;
pub mod errors;
pub mod fiat_shamir;
pub mod merkle_tree;
pub mod parameters;
pub mod poly;
pub mod r1cs;
pub mod spartan;
pub mod sumcheck;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod utils;
pub mod whir;

/// Scalar field of the BN254 curve, the field every transcript scalar lives in.
pub type FieldElement = p3_bn254_fr::Bn254Fr;
