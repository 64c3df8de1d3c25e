pub mod coeffs;
pub mod evals;
pub mod multilinear;
