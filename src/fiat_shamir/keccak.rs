use p3_keccak::{Keccak256Hash, KeccakF};
use p3_symmetric::CryptographicHasher;

use super::duplex_sponge::DuplexSponge;

/// Width of the Keccak-f1600 sponge (in bytes)
pub const KECCAK_WIDTH_BYTES: usize = 200;
/// Rate of the sponge (bytes): 136
pub const KECCAK_RATE_BYTES: usize = 136;

/// A duplex sponge based on Keccak
pub type Keccak = DuplexSponge<KeccakF, KECCAK_WIDTH_BYTES, KECCAK_RATE_BYTES>;

/// Keccak-256 digest of `bytes`.
#[must_use]
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256Hash.hash_slice(bytes)
}

/// Keccak sponge whose capacity is seeded with the Keccak-256 digest of the IO pattern.
#[must_use]
pub fn sponge_for_pattern(io_pattern: &[u8]) -> Keccak {
    Keccak::new(KeccakF, keccak256(io_pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty_input() {
        // Keccak-256 (pre-standard padding) of the empty string.
        let expected =
            hex::decode("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470").unwrap();
        assert_eq!(keccak256(b"").to_vec(), expected);
    }

    #[test]
    fn test_sponge_is_deterministic_per_pattern() {
        let mut a = sponge_for_pattern(b"proto\0A1x");
        let mut b = sponge_for_pattern(b"proto\0A1x");
        let mut c = sponge_for_pattern(b"proto\0A2x");

        let (mut out_a, mut out_b, mut out_c) = ([0u8; 16], [0u8; 16], [0u8; 16]);
        a.squeeze(&mut out_a);
        b.squeeze(&mut out_b);
        c.squeeze(&mut out_c);

        assert_eq!(out_a, out_b);
        assert_ne!(out_a, out_c);
    }
}
