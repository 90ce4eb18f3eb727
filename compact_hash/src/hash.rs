//! Invertible hash functions on fixed-width integers.
//!
//! The table only stores the quotient of each hashed key, so the hash must be a bijection on
//! `width`-bit integers: the key is recovered by composing the quotient with the slot address
//! and inverting the hash.
use std::fmt::Debug;

use bit_layout::mask;

/// A bijection on `width`-bit unsigned integers, for every `width` in `1..=64`.
///
/// Implementations are stateless policies.
pub trait InvertibleHash: Default + Clone + Debug {
    /// Maps `key < 2^width` to a hash `< 2^width`.
    fn hash(&self, key: u64, width: u32) -> u64;

    /// Inverse of [`hash`](InvertibleHash::hash) for the same `width`.
    fn unhash(&self, hashed: u64, width: u32) -> u64;
}

/// Identity mapping, useful to construct deterministic collisions.
#[derive(Clone, Copy, Default, Debug)]
pub struct IdentityHash;

impl InvertibleHash for IdentityHash {
    #[inline(always)]
    fn hash(&self, key: u64, width: u32) -> u64 {
        debug_assert!(key & !mask(width) == 0);
        key
    }

    #[inline(always)]
    fn unhash(&self, hashed: u64, _width: u32) -> u64 {
        hashed
    }
}

/// Xorshift, odd multiply, xorshift, all modulo `2^width`.
///
/// Shifting by more than half the width makes each xorshift step its own inverse and the
/// multiplier is inverted through its inverse modulo `2^64`.
#[derive(Clone, Copy, Default, Debug)]
pub struct XorShiftMix;

const MULTIPLIER: u64 = 0x9e37_79b9_7f4a_7c15;
const MULTIPLIER_INVERSE: u64 = inverse_mod_2_64(MULTIPLIER);

const fn inverse_mod_2_64(odd: u64) -> u64 {
    // Newton iteration, each step doubles the number of correct low bits.
    let mut inverse = odd;
    let mut step = 0;
    while step < 6 {
        inverse = inverse.wrapping_mul(2u64.wrapping_sub(odd.wrapping_mul(inverse)));
        step += 1;
    }
    inverse
}

impl XorShiftMix {
    #[inline(always)]
    fn xorshift(value: u64, width: u32) -> u64 {
        value ^ (value >> (width / 2 + 1))
    }
}

impl InvertibleHash for XorShiftMix {
    #[inline]
    fn hash(&self, key: u64, width: u32) -> u64 {
        debug_assert!(key & !mask(width) == 0);
        let value = Self::xorshift(key, width);
        let value = value.wrapping_mul(MULTIPLIER) & mask(width);
        Self::xorshift(value, width)
    }

    #[inline]
    fn unhash(&self, hashed: u64, width: u32) -> u64 {
        let value = Self::xorshift(hashed, width);
        let value = value.wrapping_mul(MULTIPLIER_INVERSE) & mask(width);
        Self::xorshift(value, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn multiplier_inverse() {
        assert_eq!(MULTIPLIER.wrapping_mul(MULTIPLIER_INVERSE), 1);
    }

    #[test]
    fn small_widths_are_permutations() {
        for width in 1..=10 {
            let mut seen = vec![false; 1 << width];
            for key in 0..1u64 << width {
                let hashed = XorShiftMix.hash(key, width);
                assert!(hashed < 1 << width);
                assert!(!seen[hashed as usize], "width {width} maps two keys to {hashed}");
                seen[hashed as usize] = true;
                assert_eq!(XorShiftMix.unhash(hashed, width), key);
            }
        }
    }

    #[test]
    fn wide_keys_invert() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(1);
        for width in [11, 17, 32, 33, 48, 63, 64] {
            for _ in 0..1000 {
                let key = rng.gen::<u64>() & mask(width);
                let hashed = XorShiftMix.hash(key, width);
                assert_eq!(hashed & !mask(width), 0);
                assert_eq!(XorShiftMix.unhash(hashed, width), key);
            }
        }
    }

    #[test]
    fn identity_is_identity() {
        assert_eq!(IdentityHash.hash(11, 4), 11);
        assert_eq!(IdentityHash.unhash(11, 4), 11);
    }
}
