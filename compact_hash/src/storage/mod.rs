//! Slot storage backends.
//!
//! A storage holds one [`Slot`] per occupied table position and knows nothing about hashing or
//! probing. Index structures decide which positions are used.
use std::io::{self, Read, Write};

use crate::{config::TableConfig, error::DeserializeError};

mod bucketed;
mod flat;

pub use bucketed::{BucketedStorage, BUCKET_SIZE};
pub use flat::FlatStorage;

/// Contents of an occupied table position.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Slot {
    /// High bits of the entry's hash.
    pub quotient: u64,
    /// Satellite value, always zero for sets.
    pub value: u64,
}

/// Bit widths of the fields stored per slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SlotWidths {
    /// Width of the stored quotient.
    pub quotient: u32,
    /// Width of the stored value.
    pub value: u32,
}

/// A backend storing the slots of a table with a fixed number of positions.
pub trait Storage: Sized {
    /// Creates an empty storage with `table_size` positions.
    fn new(table_size: usize, widths: SlotWidths, config: &TableConfig) -> Self;

    /// Creates an empty storage with the same backend parameters as `self`.
    fn empty_like(&self, table_size: usize, widths: SlotWidths) -> Self;

    /// Number of positions.
    fn table_size(&self) -> usize;

    /// Field widths of every slot.
    fn widths(&self) -> SlotWidths;

    /// Returns `true` if no slot is stored at `pos`.
    fn is_empty_at(&self, pos: usize) -> bool;

    /// Returns the slot stored at `pos`, if any.
    fn get(&self, pos: usize) -> Option<Slot>;

    /// Stores `slot` at the free position `pos`.
    fn allocate(&mut self, pos: usize, slot: Slot);

    /// Overwrites the slot at the occupied position `pos`.
    fn set(&mut self, pos: usize, slot: Slot);

    /// Removes and returns the slot at `pos`.
    fn take(&mut self, pos: usize) -> Option<Slot>;

    /// Heap memory in bytes.
    fn heap_size(&self) -> usize;

    /// Appends the serialized storage to `writer`.
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()>;

    /// Reads a storage serialized by [`write_to`](Storage::write_to) and checks that it holds
    /// exactly `size` slots.
    fn read_from(
        reader: &mut impl Read,
        table_size: usize,
        widths: SlotWidths,
        size: usize,
    ) -> Result<Self, DeserializeError>;

    /// Returns the slot at a position that is known to be occupied.
    ///
    /// Panics if `pos` is free.
    #[inline]
    fn occupied(&self, pos: usize) -> Slot {
        match self.get(pos) {
            Some(slot) => slot,
            None => panic!("table position {pos} is unexpectedly empty"),
        }
    }
}
