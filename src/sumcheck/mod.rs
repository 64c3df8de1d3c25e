//! Sumcheck reduction, verifier side.
//!
//! Two round encodings are supported: quadratic polynomials sent as evaluations at `{0, 1, 2}`
//! (WHIR folding) and cubic polynomials sent as coefficients (zero-knowledge Spartan).

pub mod sumcheck_polynomial;
pub mod verifier;
