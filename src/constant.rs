/// Number of bytes of a serialized scalar in the transcript and in hints (little-endian).
pub const SCALAR_BYTES: usize = 32;

/// Number of bytes squeezed from the sponge to derive a proof-of-work challenge.
pub const POW_CHALLENGE_BYTES: usize = 32;

/// Number of bytes of a proof-of-work nonce (a big-endian `u64`).
pub const POW_NONCE_BYTES: usize = 8;

/// Label of the absorb operation carrying the proof-of-work nonce.
///
/// It is the only absorb whose size is counted in bytes rather than scalars.
pub const POW_NONCE_LABEL: &str = "pow-nonce";

/// Largest supported proof-of-work difficulty.
///
/// Thresholds are `p >> d` for `d` in `0..=MAX_POW_DIFFICULTY`.
pub const MAX_POW_DIFFICULTY: usize = 27;

/// Number of out-of-domain samples drawn when a commitment is parsed.
pub const COMMITMENT_OOD_SAMPLES: usize = 1;

/// Number of bytes of the length prefix in front of every hint payload.
pub const HINT_LENGTH_BYTES: usize = 4;

/// Number of R1CS matrices (A, B, C).
pub const R1CS_MATRICES: usize = 3;
