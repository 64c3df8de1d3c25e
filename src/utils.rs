use num_bigint::BigUint;
use p3_field::{Field, PrimeField};

use crate::constant::SCALAR_BYTES;

/// Returns `2^64` in the field.
#[inline]
fn two_pow_64<F: Field>() -> F {
    F::from_u64(1 << 32).square()
}

/// Interprets four little-endian `u64` limbs as an integer and reduces it into the field.
pub fn field_from_limbs<F: Field>(limbs: &[u64; 4]) -> F {
    let shift = two_pow_64::<F>();
    limbs
        .iter()
        .rev()
        .fold(F::ZERO, |acc, &limb| acc * shift + F::from_u64(limb))
}

/// Interprets `bytes` as a little-endian integer of arbitrary length and reduces it into the field.
pub fn field_from_le_bytes<F: Field>(bytes: &[u8]) -> F {
    let shift = two_pow_64::<F>();
    bytes.chunks(8).rev().fold(F::ZERO, |acc, chunk| {
        let mut limb = [0u8; 8];
        limb[..chunk.len()].copy_from_slice(chunk);
        // Only the most significant chunk can be short.
        let scale = if chunk.len() == 8 {
            shift
        } else {
            F::from_u64(1 << (8 * chunk.len()))
        };
        acc * scale + F::from_u64(u64::from_le_bytes(limb))
    })
}

/// Interprets `bytes` as a big-endian integer of arbitrary length and reduces it into the field.
pub fn field_from_be_bytes<F: Field>(bytes: &[u8]) -> F {
    let le: Vec<u8> = bytes.iter().rev().copied().collect();
    field_from_le_bytes(&le)
}

/// Reduces an arbitrary integer into the field.
pub fn field_from_biguint<F: Field>(value: &BigUint) -> F {
    field_from_le_bytes(&value.to_bytes_le())
}

/// Canonical 32-byte little-endian encoding of a field element.
pub fn field_to_le_bytes<F: PrimeField>(value: &F) -> [u8; SCALAR_BYTES] {
    let mut out = [0u8; SCALAR_BYTES];
    let bytes = value.as_canonical_biguint().to_bytes_le();
    out[..bytes.len()].copy_from_slice(&bytes);
    out
}

/// Canonical four-limb little-endian encoding of a field element.
pub fn field_to_limbs<F: PrimeField>(value: &F) -> [u64; 4] {
    let bytes = field_to_le_bytes(value);
    core::array::from_fn(|i| {
        let mut limb = [0u8; 8];
        limb.copy_from_slice(&bytes[8 * i..8 * (i + 1)]);
        u64::from_le_bytes(limb)
    })
}

/// Number of bytes squeezed to derive one (statistically uniform) field challenge.
#[must_use]
pub fn challenge_bytes_len<F: Field>() -> usize {
    (F::bits() + 128) / 8
}

/// Computes `[1, base, base^2, ..., base^(len - 1)]`.
pub fn expand_randomness<F: Field>(base: F, len: usize) -> Vec<F> {
    base.powers().take(len).collect()
}

/// Inner product of two slices of equal length.
pub fn dot_product<F: Field>(lhs: &[F], rhs: &[F]) -> F {
    debug_assert_eq!(lhs.len(), rhs.len());
    lhs.iter().zip(rhs).map(|(&a, &b)| a * b).sum()
}

/// Raises `base` to an arbitrary non-negative integer power.
pub fn exp_biguint<F: Field>(base: F, exponent: &BigUint) -> F {
    (0..exponent.bits()).rev().fold(F::ONE, |acc, bit| {
        let acc = acc.square();
        if exponent.bit(bit) { acc * base } else { acc }
    })
}

/// Number of bits needed to represent `value` (zero has bit length zero).
#[must_use]
pub const fn bit_length(value: usize) -> usize {
    (usize::BITS - value.leading_zeros()) as usize
}

#[cfg(test)]
mod tests {
    use p3_baby_bear::BabyBear;
    use p3_field::PrimeCharacteristicRing;
    use proptest::prelude::*;

    use super::*;
    use crate::FieldElement;

    type F = BabyBear;

    #[test]
    fn test_field_from_le_bytes_small_values() {
        assert_eq!(field_from_le_bytes::<F>(&[]), F::ZERO);
        assert_eq!(field_from_le_bytes::<F>(&[7]), F::from_u8(7));
        assert_eq!(field_from_le_bytes::<F>(&[0, 1]), F::from_u64(256));
        assert_eq!(
            field_from_le_bytes::<F>(&[1, 0, 0, 0, 0, 0, 0, 0, 1]),
            F::from_u64(1) + two_pow_64::<F>()
        );
    }

    #[test]
    fn test_field_from_be_bytes_reverses_order() {
        assert_eq!(field_from_be_bytes::<F>(&[1, 0]), F::from_u64(256));
        assert_eq!(
            field_from_be_bytes::<F>(&[0, 0, 0, 0, 0, 0, 0, 5]),
            F::from_u8(5)
        );
    }

    #[test]
    fn test_bn254_bytes_roundtrip_is_canonical() {
        let value = FieldElement::from_u64(0xdead_beef_cafe_babe) * FieldElement::from_u64(12345);
        let bytes = field_to_le_bytes(&value);
        assert_eq!(field_from_le_bytes::<FieldElement>(&bytes), value);
        assert_eq!(field_from_limbs::<FieldElement>(&field_to_limbs(&value)), value);
    }

    #[test]
    fn test_order_reduces_to_zero() {
        let order = <FieldElement as Field>::order();
        assert_eq!(field_from_biguint::<FieldElement>(&order), FieldElement::ZERO);
        let order_plus_three = order + BigUint::from(3u8);
        assert_eq!(
            field_from_biguint::<FieldElement>(&order_plus_three),
            FieldElement::from_u8(3)
        );
    }

    #[test]
    fn test_challenge_width_for_bn254() {
        // 254 bits plus 128 bits of statistical slack.
        assert_eq!(challenge_bytes_len::<FieldElement>(), 47);
    }

    #[test]
    fn test_expand_randomness() {
        let base = F::from_u8(3);
        assert_eq!(
            expand_randomness(base, 4),
            vec![F::ONE, F::from_u8(3), F::from_u8(9), F::from_u8(27)]
        );
        assert!(expand_randomness(base, 0).is_empty());
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(0), 0);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(31), 5);
        assert_eq!(bit_length(32), 6);
    }

    proptest! {
        #[test]
        fn proptest_exp_biguint_matches_exp_u64(base in 1u64..1_000_000, exp in 0u64..10_000) {
            let base = F::from_u64(base);
            prop_assert_eq!(exp_biguint(base, &BigUint::from(exp)), base.exp_u64(exp));
        }

        #[test]
        fn proptest_le_bytes_match_u64(value in any::<u64>()) {
            prop_assert_eq!(
                field_from_le_bytes::<FieldElement>(&value.to_le_bytes()),
                FieldElement::from_u64(value)
            );
            prop_assert_eq!(
                field_from_be_bytes::<FieldElement>(&value.to_be_bytes()),
                FieldElement::from_u64(value)
            );
        }

        #[test]
        fn proptest_dot_product_is_bilinear(a in any::<u32>(), b in any::<u32>(), c in any::<u32>()) {
            let lhs = [F::from_u64(u64::from(a)), F::from_u64(u64::from(b))];
            let rhs = [F::from_u64(u64::from(c)), F::ONE];
            prop_assert_eq!(dot_product(&lhs, &rhs), lhs[0] * rhs[0] + lhs[1]);
        }
    }
}
