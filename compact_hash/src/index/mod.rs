//! Collision resolution strategies.
//!
//! An index structure decides at which position an entry with a given initial address is
//! stored, and recovers the initial address of every stored entry so the full hash can be
//! reassembled from the quotient.
use std::io::{self, Read, Write};

use crate::{
    config::TableConfig,
    error::DeserializeError,
    size_manager::SizeManager,
    storage::{Slot, Storage},
};

mod cv;
mod displacement;

pub use cv::CvIndex;
pub use displacement::{
    DisplacementIndex, DisplacementStore, EliasGammaDisplacement, FixedDisplacement,
    LayeredDisplacement,
};

/// Outcome of [`IndexStructure::lookup_insert`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Placement {
    /// Position of the entry.
    pub pos: usize,
    /// `true` if the entry was already present and left untouched.
    pub found: bool,
}

/// Strategy mapping `(initial_address, quotient)` pairs to storage positions.
pub trait IndexStructure: Sized {
    /// Creates an index for an empty table with `table_size` positions.
    fn new(table_size: usize, config: &TableConfig) -> Self;

    /// Creates an empty index with the same parameters as `self`.
    fn empty_like(&self, table_size: usize) -> Self;

    /// Finds the position of the entry with the given initial address and quotient.
    fn lookup<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        initial_address: usize,
        quotient: u64,
    ) -> Option<usize>;

    /// Finds the entry matching `slot.quotient`, storing `slot` if there is none.
    ///
    /// The caller is responsible for keeping at least one position free.
    fn lookup_insert<S: Storage>(
        &mut self,
        sizes: &SizeManager,
        storage: &mut S,
        initial_address: usize,
        slot: Slot,
    ) -> Placement;

    /// Removes the entry with the given initial address and quotient.
    fn remove<S: Storage>(
        &mut self,
        sizes: &SizeManager,
        storage: &mut S,
        initial_address: usize,
        quotient: u64,
    ) -> Option<Slot>;

    /// Calls `f(initial_address, pos, slot)` for every stored entry.
    ///
    /// The order only depends on the table contents.
    fn for_each_occupied<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        f: impl FnMut(usize, usize, Slot),
    );

    /// Heap memory in bytes.
    fn heap_size(&self) -> usize;

    /// Appends the serialized index to `writer`.
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()>;

    /// Reads an index serialized by [`write_to`](IndexStructure::write_to) for a table with
    /// `table_size` positions.
    fn read_from(reader: &mut impl Read, table_size: usize) -> Result<Self, DeserializeError>;

    /// Checks a deserialized index against the storage read along with it.
    ///
    /// Succeeds if every stored entry is reachable from its initial address and no two entries
    /// share an initial address and quotient. Lookups on a table that fails this check may
    /// panic.
    fn validate<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
    ) -> Result<(), DeserializeError>;
}

/// First free position of `storage`, which a valid table always has.
fn first_free<S: Storage>(storage: &S) -> Result<usize, DeserializeError> {
    (0..storage.table_size())
        .find(|&pos| storage.is_empty_at(pos))
        .ok_or(DeserializeError::Inconsistent("table without free position"))
}

/// Rejects two stored entries with the same initial address and quotient.
fn check_distinct_entries<I: IndexStructure, S: Storage>(
    index: &I,
    sizes: &SizeManager,
    storage: &S,
) -> Result<(), DeserializeError> {
    let mut entries = Vec::with_capacity(sizes.size());
    index.for_each_occupied(sizes, storage, |initial_address, _, slot| {
        entries.push((initial_address, slot.quotient))
    });
    entries.sort_unstable();
    if entries.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(DeserializeError::Inconsistent("duplicate entry"));
    }
    Ok(())
}
