//! Power-of-two capacity bookkeeping and hash decomposition.
use std::io::{self, Read, Write};

use crate::{
    config::check_load_factor,
    error::{ConfigError, DeserializeError},
    io::{read_f32, read_u8, read_usize, write_f32, write_u8, write_usize},
};

/// A hash split into the starting probe position and the bits stored alongside the entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Decomposed {
    /// Low `capacity_log2` bits of the hash.
    pub initial_address: usize,
    /// Remaining high bits of the hash.
    pub quotient: u64,
}

/// Tracks capacity, entry count and load factor of a table.
#[derive(Clone, PartialEq, Debug)]
pub struct SizeManager {
    capacity_log2: u32,
    size: usize,
    max_load_factor: f32,
}

impl SizeManager {
    /// Creates a manager for an empty table of at least `capacity` slots.
    ///
    /// Capacities below 2 are raised to 2, others are rounded up to a power of two.
    pub fn new(capacity: usize, max_load_factor: f32) -> Result<Self, ConfigError> {
        let capacity = capacity.max(2).next_power_of_two();
        Ok(Self {
            capacity_log2: capacity.trailing_zeros(),
            size: 0,
            max_load_factor: check_load_factor(max_load_factor)?,
        })
    }

    /// Number of slots.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        1 << self.capacity_log2
    }

    /// Base-2 logarithm of the capacity.
    #[inline(always)]
    pub fn capacity_log2(&self) -> u32 {
        self.capacity_log2
    }

    /// Number of occupied slots.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Current maximum load factor.
    #[inline(always)]
    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    /// Replaces the maximum load factor, which must lie in `(0, 1]`.
    pub fn set_max_load_factor(&mut self, max_load_factor: f32) -> Result<(), ConfigError> {
        self.max_load_factor = check_load_factor(max_load_factor)?;
        Ok(())
    }

    /// Returns whether holding `new_size` entries requires a larger capacity.
    ///
    /// At least one slot always stays free, whatever the load factor.
    #[inline]
    pub fn needs_to_grow_capacity(&self, new_size: usize) -> bool {
        let capacity = self.capacity();
        let limit = (capacity as f64 * self.max_load_factor as f64) as usize;
        new_size > limit.min(capacity - 1)
    }

    /// Capacity after one growth step.
    ///
    /// Panics if doubling would overflow the address space.
    #[inline]
    pub fn grown_capacity(&self) -> usize {
        match self.capacity().checked_mul(2) {
            Some(capacity) if self.capacity_log2 < 63 => capacity,
            _ => panic!("compact hash table capacity overflow"),
        }
    }

    /// Splits a hash into initial address and quotient.
    #[inline(always)]
    pub fn decompose_hashed_value(&self, hashed: u64) -> Decomposed {
        Decomposed {
            initial_address: (hashed & (self.capacity() as u64 - 1)) as usize,
            quotient: hashed >> self.capacity_log2,
        }
    }

    /// Inverse of [`decompose_hashed_value`](SizeManager::decompose_hashed_value) for the current
    /// capacity.
    #[inline(always)]
    pub fn compose_hashed_value(&self, initial_address: usize, quotient: u64) -> u64 {
        debug_assert!(initial_address < self.capacity());
        (quotient << self.capacity_log2) | initial_address as u64
    }

    /// `(position + distance) mod capacity`.
    #[inline(always)]
    pub fn mod_add(&self, position: usize, distance: usize) -> usize {
        position.wrapping_add(distance) & (self.capacity() - 1)
    }

    /// `(position - distance) mod capacity`.
    #[inline(always)]
    pub fn mod_sub(&self, position: usize, distance: usize) -> usize {
        position.wrapping_sub(distance) & (self.capacity() - 1)
    }

    pub(crate) fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        write_u8(writer, self.capacity_log2 as u8)?;
        write_usize(writer, self.size)?;
        write_f32(writer, self.max_load_factor)
    }

    pub(crate) fn read_from(reader: &mut impl Read) -> Result<Self, DeserializeError> {
        let capacity_log2 = read_u8(reader)?;
        let size = read_usize(reader)?;
        let max_load_factor = read_f32(reader)?;
        if !(1..64).contains(&capacity_log2) || capacity_log2 as u32 >= usize::BITS {
            return Err(DeserializeError::CapacityLog2(capacity_log2));
        }
        let manager = Self {
            capacity_log2: capacity_log2 as u32,
            size,
            max_load_factor: check_load_factor(max_load_factor)?,
        };
        if size >= manager.capacity() {
            return Err(DeserializeError::Size {
                size,
                capacity: manager.capacity(),
            });
        }
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn capacity_is_normalized() {
        for (hint, capacity) in [(0, 2), (1, 2), (2, 2), (3, 4), (8, 8), (9, 16), (1000, 1024)] {
            let manager = SizeManager::new(hint, 0.5).unwrap();
            assert_eq!(manager.capacity(), capacity);
            assert_eq!(1 << manager.capacity_log2(), capacity);
        }
        assert!(SizeManager::new(8, 0.0).is_err());
        assert!(SizeManager::new(8, 1.01).is_err());
    }

    #[test]
    fn growth_keeps_a_free_slot() {
        let full = SizeManager::new(8, 1.0).unwrap();
        assert!(!full.needs_to_grow_capacity(7));
        assert!(full.needs_to_grow_capacity(8));

        let half = SizeManager::new(8, 0.5).unwrap();
        assert!(!half.needs_to_grow_capacity(4));
        assert!(half.needs_to_grow_capacity(5));
        assert_eq!(half.grown_capacity(), 16);

        let tiny = SizeManager::new(2, 0.1).unwrap();
        assert!(tiny.needs_to_grow_capacity(1));
    }

    #[test]
    fn decomposition_is_invertible() {
        let mut rng = rand_pcg::Pcg64::seed_from_u64(3);
        for capacity_log2 in 1..63 {
            let manager = SizeManager::new(1 << capacity_log2, 0.5).unwrap();
            for _ in 0..200 {
                let hashed = rng.gen::<u64>();
                let Decomposed {
                    initial_address,
                    quotient,
                } = manager.decompose_hashed_value(hashed);
                assert!(initial_address < manager.capacity());
                assert_eq!(manager.compose_hashed_value(initial_address, quotient), hashed);
            }
        }
    }

    #[test]
    fn modular_arithmetic_wraps() {
        let manager = SizeManager::new(8, 0.5).unwrap();
        assert_eq!(manager.mod_add(7, 1), 0);
        assert_eq!(manager.mod_add(5, 6), 3);
        assert_eq!(manager.mod_sub(0, 1), 7);
        assert_eq!(manager.mod_sub(2, 5), 5);
    }

    #[test]
    fn serialized_state_round_trips() {
        let mut manager = SizeManager::new(64, 0.75).unwrap();
        manager.set_size(17);
        let mut bytes = vec![];
        manager.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 1 + std::mem::size_of::<usize>() + 4);
        assert_eq!(bytes[0], 6);
        assert_eq!(SizeManager::read_from(&mut &bytes[..]).unwrap(), manager);

        bytes[0] = 70;
        assert!(matches!(
            SizeManager::read_from(&mut &bytes[..]),
            Err(DeserializeError::CapacityLog2(70))
        ));
    }
}
