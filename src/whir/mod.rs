//! WHIR polynomial-commitment verifier: commitment parsing, linear statements and the
//! folding/query protocol in single, batched and hiding form.

pub mod committer;
pub mod statement;
pub mod verifier;
