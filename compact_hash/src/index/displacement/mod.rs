//! Linear probing with an explicit per-position displacement.
//!
//! Every occupied position `pos` records how far it lies from the initial address of the entry
//! stored there, so the initial address is `pos - displacement` and the full hash can be
//! recovered without storing it. A probe from `initial_address` matches an entry only if both
//! its displacement and its quotient agree.
use std::io::{self, Read, Write};

use bit_layout::IntVec;

use super::{check_distinct_entries, first_free, IndexStructure, Placement};
use crate::{
    config::{check_width, TableConfig},
    error::DeserializeError,
    io::{packed_words, read_u8, read_words, write_u8, write_words},
    size_manager::SizeManager,
    storage::{Slot, Storage},
};

mod elias;
mod layered;

pub use elias::EliasGammaDisplacement;
pub use layered::LayeredDisplacement;

/// Array of displacements, one per table position.
///
/// Free positions hold an unspecified displacement.
pub trait DisplacementStore: Sized {
    /// Creates a store of `table_size` zero displacements.
    fn new(table_size: usize, config: &TableConfig) -> Self;

    /// Creates a store of `table_size` zero displacements with the parameters of `self`.
    fn empty_like(&self, table_size: usize) -> Self;

    /// Displacement recorded for `pos`.
    fn get(&self, pos: usize) -> usize;

    /// Records the displacement of `pos`.
    fn set(&mut self, pos: usize, displacement: usize);

    /// Heap memory in bytes.
    fn heap_size(&self) -> usize;

    /// Appends the serialized store to `writer`.
    fn write_to(&self, writer: &mut impl Write) -> io::Result<()>;

    /// Reads a store serialized by [`write_to`](DisplacementStore::write_to).
    fn read_from(reader: &mut impl Read, table_size: usize) -> Result<Self, DeserializeError>;
}

/// Displacements stored in a packed array of fixed width.
///
/// Recording a displacement of `2^width - 1` or more panics.
#[derive(Clone, Debug)]
pub struct FixedDisplacement {
    displacements: IntVec,
}

impl DisplacementStore for FixedDisplacement {
    fn new(table_size: usize, config: &TableConfig) -> Self {
        Self {
            displacements: IntVec::zeroed(table_size, config.fixed_displacement_width),
        }
    }

    fn empty_like(&self, table_size: usize) -> Self {
        Self {
            displacements: IntVec::zeroed(table_size, self.displacements.width()),
        }
    }

    #[inline]
    fn get(&self, pos: usize) -> usize {
        self.displacements.get(pos) as usize
    }

    #[inline]
    fn set(&mut self, pos: usize, displacement: usize) {
        assert!(
            (displacement as u64) < self.displacements.max_value(),
            "displacement {displacement} exceeds the fixed width of {} bits",
            self.displacements.width()
        );
        self.displacements.set(pos, displacement as u64);
    }

    fn heap_size(&self) -> usize {
        self.displacements.heap_size()
    }

    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        write_u8(writer, self.displacements.width() as u8)?;
        write_words(writer, self.displacements.as_words())
    }

    fn read_from(reader: &mut impl Read, table_size: usize) -> Result<Self, DeserializeError> {
        let width = check_width("fixed displacement", read_u8(reader)? as u32, 1, 63)?;
        let count = packed_words(table_size, width, "displacement table too large")?;
        let words = read_words(reader, count)?;
        let displacements = IntVec::from_words(words, width, table_size)
            .ok_or(DeserializeError::Inconsistent("padding bits of displacement table"))?;
        Ok(Self { displacements })
    }
}

/// Index resolving collisions by linear probing and recording displacements.
#[derive(Clone, Debug)]
pub struct DisplacementIndex<D> {
    displacements: D,
}

impl<D: DisplacementStore> DisplacementIndex<D> {
    /// The underlying displacement store.
    pub fn displacements(&self) -> &D {
        &self.displacements
    }

    #[inline]
    fn matches<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        pos: usize,
        initial_address: usize,
        quotient: u64,
    ) -> bool {
        self.displacements.get(pos) == sizes.mod_sub(pos, initial_address)
            && storage.occupied(pos).quotient == quotient
    }
}

impl<D: DisplacementStore> IndexStructure for DisplacementIndex<D> {
    fn new(table_size: usize, config: &TableConfig) -> Self {
        Self {
            displacements: D::new(table_size, config),
        }
    }

    fn empty_like(&self, table_size: usize) -> Self {
        Self {
            displacements: self.displacements.empty_like(table_size),
        }
    }

    fn lookup<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        initial_address: usize,
        quotient: u64,
    ) -> Option<usize> {
        let mut pos = initial_address;
        loop {
            if storage.is_empty_at(pos) {
                return None;
            }
            if self.matches(sizes, storage, pos, initial_address, quotient) {
                return Some(pos);
            }
            pos = sizes.mod_add(pos, 1);
            if pos == initial_address {
                return None;
            }
        }
    }

    fn lookup_insert<S: Storage>(
        &mut self,
        sizes: &SizeManager,
        storage: &mut S,
        initial_address: usize,
        slot: Slot,
    ) -> Placement {
        let mut pos = initial_address;
        loop {
            if storage.is_empty_at(pos) {
                self.displacements
                    .set(pos, sizes.mod_sub(pos, initial_address));
                storage.allocate(pos, slot);
                return Placement { pos, found: false };
            }
            if self.matches(sizes, storage, pos, initial_address, slot.quotient) {
                return Placement { pos, found: true };
            }
            pos = sizes.mod_add(pos, 1);
            assert!(pos != initial_address, "no free position left in the table");
        }
    }

    fn remove<S: Storage>(
        &mut self,
        sizes: &SizeManager,
        storage: &mut S,
        initial_address: usize,
        quotient: u64,
    ) -> Option<Slot> {
        let pos = self.lookup(sizes, storage, initial_address, quotient)?;
        let removed = storage.take(pos)?;
        self.displacements.set(pos, 0);

        // Backward shift: move every later entry of the run whose probe sequence passes the
        // hole into it, so that no probe sequence is interrupted.
        let mut hole = pos;
        let mut cursor = sizes.mod_add(pos, 1);
        while let Some(slot) = storage.get(cursor) {
            let displacement = self.displacements.get(cursor);
            let gap = sizes.mod_sub(cursor, hole);
            if displacement >= gap {
                storage.take(cursor);
                storage.allocate(hole, slot);
                self.displacements.set(hole, displacement - gap);
                self.displacements.set(cursor, 0);
                hole = cursor;
            }
            cursor = sizes.mod_add(cursor, 1);
        }
        Some(removed)
    }

    fn for_each_occupied<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        mut f: impl FnMut(usize, usize, Slot),
    ) {
        for pos in 0..storage.table_size() {
            if let Some(slot) = storage.get(pos) {
                f(sizes.mod_sub(pos, self.displacements.get(pos)), pos, slot);
            }
        }
    }

    fn heap_size(&self) -> usize {
        self.displacements.heap_size()
    }

    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        self.displacements.write_to(writer)
    }

    fn read_from(reader: &mut impl Read, table_size: usize) -> Result<Self, DeserializeError> {
        Ok(Self {
            displacements: D::read_from(reader, table_size)?,
        })
    }

    fn validate<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
    ) -> Result<(), DeserializeError> {
        // A probe from `pos - displacement` must only pass occupied positions to reach `pos`.
        let free = first_free(storage)?;
        let mut occupied_before = 0;
        let mut pos = free;
        for _ in 0..storage.table_size() {
            pos = sizes.mod_add(pos, 1);
            if storage.is_empty_at(pos) {
                occupied_before = 0;
                continue;
            }
            if self.displacements.get(pos) > occupied_before {
                return Err(DeserializeError::Inconsistent(
                    "displacement crosses a free position",
                ));
            }
            occupied_before += 1;
        }
        check_distinct_entries(self, sizes, storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BucketedStorage, SlotWidths};

    const WIDTHS: SlotWidths = SlotWidths {
        quotient: 8,
        value: 8,
    };

    fn setup<D: DisplacementStore>() -> (SizeManager, BucketedStorage, DisplacementIndex<D>) {
        let config = TableConfig::default().with_layered_displacement_width(2);
        let sizes = SizeManager::new(8, 1.0).unwrap();
        let storage = BucketedStorage::new(8, WIDTHS, &config);
        let index = DisplacementIndex::<D>::new(8, &config);
        (sizes, storage, index)
    }

    fn collisions<D: DisplacementStore>() {
        let (sizes, mut storage, mut index) = setup::<D>();
        // (initial address, quotient) pairs, the first three collide at address 6
        let entries = [(6, 1), (6, 2), (6, 3), (7, 1), (0, 9), (3, 4)];
        for (n, &(initial_address, quotient)) in entries.iter().enumerate() {
            let slot = Slot {
                quotient,
                value: n as u64,
            };
            let placement = index.lookup_insert(&sizes, &mut storage, initial_address, slot);
            assert!(!placement.found);
            let again = index.lookup_insert(&sizes, &mut storage, initial_address, slot);
            assert_eq!(again, Placement { found: true, ..placement });
        }
        for (n, &(initial_address, quotient)) in entries.iter().enumerate() {
            let pos = index
                .lookup(&sizes, &storage, initial_address, quotient)
                .unwrap();
            assert_eq!(storage.occupied(pos).value, n as u64);
        }
        assert_eq!(index.lookup(&sizes, &storage, 6, 4), None);
        assert_eq!(index.lookup(&sizes, &storage, 1, 9), None);

        let mut seen = vec![];
        index.for_each_occupied(&sizes, &storage, |initial_address, _, slot| {
            seen.push((initial_address, slot.quotient))
        });
        seen.sort();
        let mut expected = entries.to_vec();
        expected.sort();
        assert_eq!(seen, expected);

        assert_eq!(
            index.remove(&sizes, &mut storage, 6, 1).map(|slot| slot.value),
            Some(0)
        );
        assert_eq!(index.remove(&sizes, &mut storage, 6, 1), None);
        for (n, &(initial_address, quotient)) in entries.iter().enumerate().skip(1) {
            let pos = index
                .lookup(&sizes, &storage, initial_address, quotient)
                .unwrap();
            assert_eq!(storage.occupied(pos).value, n as u64);
        }
    }

    #[test]
    fn fixed_resolves_collisions() {
        collisions::<FixedDisplacement>();
    }

    #[test]
    fn layered_resolves_collisions() {
        collisions::<LayeredDisplacement>();
    }

    #[test]
    fn elias_resolves_collisions() {
        collisions::<EliasGammaDisplacement>();
    }

    fn inconsistent_displacements<D: DisplacementStore + Clone>() {
        let (sizes, mut storage, mut index) = setup::<D>();
        // positions 6, 7 and 0 hold the group of 6, position 3 its own entry
        for (initial_address, quotient) in [(6, 1), (6, 2), (6, 3), (3, 4)] {
            let slot = Slot { quotient, value: 1 };
            index.lookup_insert(&sizes, &mut storage, initial_address, slot);
        }
        assert_eq!(index.displacements.get(0), 2);
        assert!(index.validate(&sizes, &storage).is_ok());

        let check = |pos: usize, displacement: usize| {
            let mut index = index.clone();
            index.displacements.set(pos, displacement);
            match index.validate(&sizes, &storage) {
                Err(DeserializeError::Inconsistent(what)) => what,
                other => panic!("displacement {displacement} at {pos} accepted: {other:?}"),
            }
        };
        assert_eq!(check(3, 1), "displacement crosses a free position");
        assert_eq!(check(0, 3), "displacement crosses a free position");
        assert_eq!(check(6, 7), "displacement crosses a free position");

        let mut duplicated = storage.clone();
        duplicated.set(7, Slot { quotient: 1, value: 2 });
        assert!(matches!(
            index.validate(&sizes, &duplicated),
            Err(DeserializeError::Inconsistent("duplicate entry"))
        ));

        let mut full = storage.clone();
        for pos in [1, 2, 4, 5] {
            full.allocate(pos, Slot { quotient: 9, value: 1 });
        }
        assert!(matches!(
            index.validate(&sizes, &full),
            Err(DeserializeError::Inconsistent("table without free position"))
        ));
    }

    #[test]
    fn fixed_rejects_inconsistent_displacements() {
        inconsistent_displacements::<FixedDisplacement>();
    }

    #[test]
    fn layered_rejects_inconsistent_displacements() {
        inconsistent_displacements::<LayeredDisplacement>();
    }

    #[test]
    fn elias_rejects_inconsistent_displacements() {
        inconsistent_displacements::<EliasGammaDisplacement>();
    }

    #[test]
    #[should_panic]
    fn fixed_width_overflow_panics() {
        let config = TableConfig::default().with_fixed_displacement_width(2);
        let mut store = FixedDisplacement::new(8, &config);
        store.set(0, 2);
        store.set(1, 3);
    }
}
