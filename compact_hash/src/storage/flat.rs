use std::{
    fmt,
    io::{self, Read, Write},
};

use bit_layout::{bits_for, BitLayout, LayoutElement};

use super::{Slot, SlotWidths, Storage};
use crate::{
    config::TableConfig,
    error::DeserializeError,
    io::{packed_words, read_u64, read_words, write_u64, write_words},
};

/// Storage with one preallocated slot per table position.
///
/// A position is free exactly when its stored value equals the configured empty value, so that
/// value must never be stored as a legitimate payload. Doing so panics instead of silently
/// dropping the entry. The value field is widened as needed to represent the empty value.
#[derive(Clone)]
pub struct FlatStorage {
    words: Vec<u64>,
    quotients: LayoutElement,
    values: LayoutElement,
    widths: SlotWidths,
    empty_value: u64,
}

impl fmt::Debug for FlatStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatStorage")
            .field("table_size", &self.quotients.len)
            .field("widths", &self.widths)
            .field("empty_value", &self.empty_value)
            .finish()
    }
}

impl FlatStorage {
    fn layout(
        table_size: usize,
        widths: SlotWidths,
        empty_value: u64,
    ) -> (BitLayout, LayoutElement, LayoutElement) {
        let mut layout = BitLayout::new();
        let quotients = layout.bit_packed_elements(widths.quotient, table_size);
        let value_width = widths.value.max(bits_for(empty_value));
        let values = layout.bit_packed_elements(value_width, table_size);
        (layout, quotients, values)
    }

    fn with_empty_value(table_size: usize, widths: SlotWidths, empty_value: u64) -> Self {
        let (layout, quotients, values) = Self::layout(table_size, widths, empty_value);
        let mut storage = Self {
            words: vec![0; layout.size_in_words()],
            quotients,
            values,
            widths,
            empty_value,
        };
        if empty_value != 0 {
            for pos in 0..table_size {
                storage.values.view_mut(&mut storage.words).set(pos, empty_value);
            }
        }
        storage
    }

    /// The value marking free positions.
    pub fn empty_value(&self) -> u64 {
        self.empty_value
    }

    #[inline(always)]
    fn value_at(&self, pos: usize) -> u64 {
        self.values.view(&self.words).get(pos)
    }

    /// Writes `slot` to `pos` regardless of its previous state.
    fn write_slot(&mut self, pos: usize, slot: Slot) {
        assert!(
            slot.value != self.empty_value,
            "value {} equals the empty value of flat storage",
            slot.value
        );
        self.quotients.view_mut(&mut self.words).set(pos, slot.quotient);
        self.values.view_mut(&mut self.words).set(pos, slot.value);
    }
}

impl Storage for FlatStorage {
    fn new(table_size: usize, widths: SlotWidths, config: &TableConfig) -> Self {
        Self::with_empty_value(table_size, widths, config.empty_value)
    }

    fn empty_like(&self, table_size: usize, widths: SlotWidths) -> Self {
        Self::with_empty_value(table_size, widths, self.empty_value)
    }

    fn table_size(&self) -> usize {
        self.quotients.len
    }

    fn widths(&self) -> SlotWidths {
        self.widths
    }

    #[inline]
    fn is_empty_at(&self, pos: usize) -> bool {
        self.value_at(pos) == self.empty_value
    }

    #[inline]
    fn get(&self, pos: usize) -> Option<Slot> {
        let value = self.value_at(pos);
        (value != self.empty_value).then(|| Slot {
            quotient: self.quotients.view(&self.words).get(pos),
            value,
        })
    }

    fn allocate(&mut self, pos: usize, slot: Slot) {
        assert!(self.is_empty_at(pos), "position {pos} is already occupied");
        self.write_slot(pos, slot);
    }

    fn set(&mut self, pos: usize, slot: Slot) {
        assert!(!self.is_empty_at(pos), "position {pos} is not occupied");
        self.write_slot(pos, slot);
    }

    fn take(&mut self, pos: usize) -> Option<Slot> {
        let slot = self.get(pos)?;
        self.quotients.view_mut(&mut self.words).set(pos, 0);
        let empty_value = self.empty_value;
        self.values.view_mut(&mut self.words).set(pos, empty_value);
        Some(slot)
    }

    fn heap_size(&self) -> usize {
        self.words.capacity() * std::mem::size_of::<u64>()
    }

    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        write_u64(writer, self.empty_value)?;
        write_words(writer, &self.words)
    }

    fn read_from(
        reader: &mut impl Read,
        table_size: usize,
        widths: SlotWidths,
        size: usize,
    ) -> Result<Self, DeserializeError> {
        let empty_value = read_u64(reader)?;
        let slot_width = widths.quotient + widths.value.max(bits_for(empty_value));
        packed_words(table_size, slot_width, "flat storage exceeds the address space")?;
        let (layout, quotients, values) = Self::layout(table_size, widths, empty_value);
        let storage = Self {
            words: read_words(reader, layout.size_in_words())?,
            quotients,
            values,
            widths,
            empty_value,
        };
        let occupied = (0..table_size)
            .filter(|&pos| !storage.is_empty_at(pos))
            .count();
        if occupied != size {
            return Err(DeserializeError::Inconsistent(
                "occupied slot count differs from the table size",
            ));
        }
        let value_limit = bit_layout::mask(widths.value);
        let too_wide = |pos| storage.get(pos).is_some_and(|slot| slot.value > value_limit);
        if (0..table_size).any(too_wide) {
            return Err(DeserializeError::Inconsistent("stored value exceeds the value width"));
        }
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTHS: SlotWidths = SlotWidths {
        quotient: 5,
        value: 9,
    };

    #[test]
    fn sentinel_marks_free_positions() {
        let config = TableConfig::default().with_empty_value(511);
        let mut storage = FlatStorage::new(16, WIDTHS, &config);
        assert!((0..16).all(|pos| storage.is_empty_at(pos)));
        storage.allocate(
            3,
            Slot {
                quotient: 31,
                value: 0,
            },
        );
        assert_eq!(
            storage.get(3),
            Some(Slot {
                quotient: 31,
                value: 0
            })
        );
        assert_eq!(storage.take(3).map(|slot| slot.quotient), Some(31));
        assert!(storage.is_empty_at(3));
    }

    #[test]
    fn value_field_fits_the_sentinel() {
        let config = TableConfig::default().with_empty_value(u64::MAX);
        let mut storage = FlatStorage::new(4, WIDTHS, &config);
        storage.allocate(
            0,
            Slot {
                quotient: 1,
                value: 7,
            },
        );
        assert!(storage.is_empty_at(1));
        assert_eq!(storage.get(0).map(|slot| slot.value), Some(7));
    }

    #[test]
    #[should_panic]
    fn storing_the_sentinel_panics() {
        let mut storage = FlatStorage::new(4, WIDTHS, &TableConfig::default());
        storage.allocate(
            0,
            Slot {
                quotient: 1,
                value: 0,
            },
        );
    }

    #[test]
    fn serialization_round_trip() {
        let mut storage = FlatStorage::new(8, WIDTHS, &TableConfig::default());
        storage.allocate(
            2,
            Slot {
                quotient: 4,
                value: 300,
            },
        );
        let mut bytes = vec![];
        storage.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 8 + 8 * 2);
        let read = FlatStorage::read_from(&mut &bytes[..], 8, WIDTHS, 1).unwrap();
        assert_eq!(read.get(2), storage.get(2));
        assert!(FlatStorage::read_from(&mut &bytes[..], 8, WIDTHS, 0).is_err());
    }
}
