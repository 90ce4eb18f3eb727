//! Collision resolution with two flag bits per position.
//!
//! Entries sharing an initial address form a contiguous group, and groups within a run of
//! occupied positions are sorted by initial address. The `virgin` bit of position `i` is set if
//! some entry has initial address `i`, the `change` bit of a position is set if it starts a
//! group. Counting both kinds of bits locates the group of any initial address without storing
//! displacements.
use std::io::{self, Read, Write};

use bit_layout::IntVec;

use super::{check_distinct_entries, first_free, IndexStructure, Placement};
use crate::{
    config::TableConfig,
    error::DeserializeError,
    io::{packed_words, read_words, write_words},
    size_manager::SizeManager,
    storage::{Slot, Storage},
};

const VIRGIN: u64 = 0b01;
const CHANGE: u64 = 0b10;

/// Location of a group found by [`CvIndex::search_existing_group`].
#[derive(Clone, Copy, Debug)]
struct Group {
    start: usize,
    /// One past the last position of the group.
    end: usize,
    /// First free position after the run containing the group.
    terminator: usize,
}

/// Index storing a virgin and a change bit per position.
#[derive(Clone, Debug)]
pub struct CvIndex {
    bits: IntVec,
}

impl CvIndex {
    fn with_table_size(table_size: usize) -> Self {
        Self {
            bits: IntVec::zeroed(table_size, 2),
        }
    }

    #[inline(always)]
    fn flag(&self, pos: usize, flag: u64) -> bool {
        self.bits.get(pos) & flag != 0
    }

    #[inline(always)]
    fn set_flag(&mut self, pos: usize, flag: u64, value: bool) {
        let bits = self.bits.get(pos);
        self.bits
            .set(pos, if value { bits | flag } else { bits & !flag });
    }

    /// Locates the group of `initial_address`, whose virgin bit must be set.
    ///
    /// If the group has no entries yet, the returned group is the one directly preceding the
    /// place where it belongs, so that its end is the insertion point.
    fn search_existing_group<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        initial_address: usize,
    ) -> Group {
        debug_assert!(self.flag(initial_address, VIRGIN));

        // Groups of the initial addresses between here and the end of the run are the last
        // groups of the run.
        let mut cursor = initial_address;
        let mut virgin_count = 0;
        while !storage.is_empty_at(cursor) {
            virgin_count += self.flag(cursor, VIRGIN) as usize;
            cursor = sizes.mod_add(cursor, 1);
        }
        let terminator = cursor;

        let mut change_count = 0;
        while change_count != virgin_count {
            cursor = sizes.mod_sub(cursor, 1);
            change_count += self.flag(cursor, CHANGE) as usize;
        }
        let start = cursor;

        let mut end = sizes.mod_add(start, 1);
        while end != terminator && !self.flag(end, CHANGE) {
            end = sizes.mod_add(end, 1);
        }
        Group {
            start,
            end,
            terminator,
        }
    }

    fn find_in_group<S: Storage>(
        sizes: &SizeManager,
        storage: &S,
        group: Group,
        quotient: u64,
    ) -> Option<usize> {
        let mut pos = group.start;
        while pos != group.end {
            if storage.occupied(pos).quotient == quotient {
                return Some(pos);
            }
            pos = sizes.mod_add(pos, 1);
        }
        None
    }

    /// Shifts the slots and change bits in `from..to` one position up and stores `slot` at
    /// `from`, which becomes a continuation of the preceding group. `to` must be free.
    fn shift_groups_and_insert<S: Storage>(
        &mut self,
        sizes: &SizeManager,
        storage: &mut S,
        from: usize,
        to: usize,
        slot: Slot,
    ) {
        debug_assert!(storage.is_empty_at(to));
        if from == to {
            storage.allocate(from, slot);
            self.set_flag(from, CHANGE, false);
            return;
        }
        let mut cursor = to;
        while cursor != from {
            let previous = sizes.mod_sub(cursor, 1);
            let moved = storage.occupied(previous);
            if cursor == to {
                storage.allocate(cursor, moved);
            } else {
                storage.set(cursor, moved);
            }
            let change = self.flag(previous, CHANGE);
            self.set_flag(cursor, CHANGE, change);
            cursor = previous;
        }
        self.set_flag(from, CHANGE, false);
        storage.set(from, slot);
    }

    /// Calls `f(initial_address, pos)` for the positions of the run starting at `run_start`,
    /// which must directly follow a free position.
    fn walk_run<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        run_start: usize,
        mut f: impl FnMut(usize, usize),
    ) {
        let mut initial_address = sizes.mod_sub(run_start, 1);
        let mut pos = run_start;
        while !storage.is_empty_at(pos) {
            if self.flag(pos, CHANGE) {
                initial_address = sizes.mod_add(initial_address, 1);
                while !self.flag(initial_address, VIRGIN) {
                    initial_address = sizes.mod_add(initial_address, 1);
                }
            }
            f(initial_address, pos);
            pos = sizes.mod_add(pos, 1);
        }
    }
}

impl IndexStructure for CvIndex {
    fn new(table_size: usize, _config: &TableConfig) -> Self {
        Self::with_table_size(table_size)
    }

    fn empty_like(&self, table_size: usize) -> Self {
        Self::with_table_size(table_size)
    }

    fn lookup<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        initial_address: usize,
        quotient: u64,
    ) -> Option<usize> {
        if !self.flag(initial_address, VIRGIN) {
            return None;
        }
        let group = self.search_existing_group(sizes, storage, initial_address);
        Self::find_in_group(sizes, storage, group, quotient)
    }

    fn lookup_insert<S: Storage>(
        &mut self,
        sizes: &SizeManager,
        storage: &mut S,
        initial_address: usize,
        slot: Slot,
    ) -> Placement {
        if storage.is_empty_at(initial_address) {
            debug_assert!(!self.flag(initial_address, VIRGIN));
            storage.allocate(initial_address, slot);
            self.bits.set(initial_address, VIRGIN | CHANGE);
            return Placement {
                pos: initial_address,
                found: false,
            };
        }

        if self.flag(initial_address, VIRGIN) {
            let group = self.search_existing_group(sizes, storage, initial_address);
            if let Some(pos) = Self::find_in_group(sizes, storage, group, slot.quotient) {
                return Placement { pos, found: true };
            }
            self.shift_groups_and_insert(sizes, storage, group.end, group.terminator, slot);
            Placement {
                pos: group.end,
                found: false,
            }
        } else {
            self.set_flag(initial_address, VIRGIN, true);
            let group = self.search_existing_group(sizes, storage, initial_address);
            self.shift_groups_and_insert(sizes, storage, group.end, group.terminator, slot);
            self.set_flag(group.end, CHANGE, true);
            Placement {
                pos: group.end,
                found: false,
            }
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

        // Rebuild the whole run without the removed entry.
        let mut run_start = pos;
        loop {
            let previous = sizes.mod_sub(run_start, 1);
            if storage.is_empty_at(previous) {
                break;
            }
            run_start = previous;
        }
        let mut run = vec![];
        self.walk_run(sizes, storage, run_start, |initial_address, run_pos| {
            run.push((initial_address, run_pos))
        });

        // Initial addresses of a run lie inside the run, clearing its flags clears all of them.
        let mut removed = None;
        let mut kept = Vec::with_capacity(run.len());
        for (initial_address, run_pos) in run {
            self.bits.set(run_pos, 0);
            match storage.take(run_pos) {
                Some(slot) if run_pos == pos => removed = Some(slot),
                Some(slot) => kept.push((initial_address, slot)),
                None => (),
            }
        }
        for (initial_address, slot) in kept {
            self.lookup_insert(sizes, storage, initial_address, slot);
        }
        removed
    }

    fn for_each_occupied<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
        mut f: impl FnMut(usize, usize, Slot),
    ) {
        let Ok(free) = first_free(storage) else {
            assert!(storage.table_size() == 0, "table without free position");
            return;
        };
        let mut pos = sizes.mod_add(free, 1);
        while pos != free {
            if storage.is_empty_at(pos) {
                pos = sizes.mod_add(pos, 1);
                continue;
            }
            let run_start = pos;
            let mut run_len = 0;
            self.walk_run(sizes, storage, run_start, |initial_address, pos| {
                f(initial_address, pos, storage.occupied(pos));
                run_len += 1;
            });
            pos = sizes.mod_add(run_start, run_len);
        }
    }

    fn heap_size(&self) -> usize {
        self.bits.heap_size()
    }

    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        write_words(writer, self.bits.as_words())
    }

    fn read_from(reader: &mut impl Read, table_size: usize) -> Result<Self, DeserializeError> {
        let count = packed_words(table_size, 2, "flag vector exceeds the address space")?;
        let words = read_words(reader, count)?;
        let bits = IntVec::from_words(words, 2, table_size)
            .ok_or(DeserializeError::Inconsistent("padding bits of flag vector"))?;
        let virgins = bits.iter().filter(|&flags| flags & VIRGIN != 0).count();
        let changes = bits.iter().filter(|&flags| flags & CHANGE != 0).count();
        if virgins != changes {
            return Err(DeserializeError::Inconsistent(
                "virgin and change bits do not pair up",
            ));
        }
        Ok(Self { bits })
    }

    fn validate<S: Storage>(
        &self,
        sizes: &SizeManager,
        storage: &S,
    ) -> Result<(), DeserializeError> {
        // Within every run the k-th group starts at or after the k-th virgin bit, and both
        // kinds of bits pair up by the end of the run.
        let free = first_free(storage)?;
        let (mut virgins, mut changes) = (0usize, 0usize);
        let mut pos = free;
        for _ in 0..storage.table_size() {
            let previous_free = storage.is_empty_at(pos);
            pos = sizes.mod_add(pos, 1);
            let flags = self.bits.get(pos);
            if storage.is_empty_at(pos) {
                if flags != 0 {
                    return Err(DeserializeError::Inconsistent("flag bits on a free position"));
                }
                if virgins != changes {
                    return Err(DeserializeError::Inconsistent(
                        "virgin and change bits of a run do not pair up",
                    ));
                }
                (virgins, changes) = (0, 0);
                continue;
            }
            if previous_free && flags != VIRGIN | CHANGE {
                return Err(DeserializeError::Inconsistent(
                    "run does not start with its own group",
                ));
            }
            virgins += (flags & VIRGIN != 0) as usize;
            changes += (flags & CHANGE != 0) as usize;
            if changes > virgins {
                return Err(DeserializeError::Inconsistent(
                    "group starts before its initial address",
                ));
            }
        }
        check_distinct_entries(self, sizes, storage)
    }
}
