use std::{
    hash::BuildHasherDefault,
    io::{self, Read, Write},
};

use bit_layout::IntVec;
use hashbrown::HashMap;
use zwohash::ZwoHasher;

use super::DisplacementStore;
use crate::{
    config::{check_width, TableConfig},
    error::DeserializeError,
    io::{
        packed_words, read_len, read_u8, read_usize, read_words, write_u8, write_usize,
        write_words,
    },
};

/// Displacements stored in a narrow packed array, with large values spilled into a sparse map.
///
/// An in-line entry equal to the largest representable value means the true displacement is
/// found in the spill map under the same position.
#[derive(Clone, Debug)]
pub struct LayeredDisplacement {
    inline: IntVec,
    spill: HashMap<usize, usize, BuildHasherDefault<ZwoHasher>>,
}

impl LayeredDisplacement {
    fn with_width(table_size: usize, width: u32) -> Self {
        Self {
            inline: IntVec::zeroed(table_size, width),
            spill: HashMap::default(),
        }
    }

    /// Number of displacements currently held in the spill map.
    pub fn spilled(&self) -> usize {
        self.spill.len()
    }
}

impl DisplacementStore for LayeredDisplacement {
    fn new(table_size: usize, config: &TableConfig) -> Self {
        Self::with_width(table_size, config.layered_displacement_width)
    }

    fn empty_like(&self, table_size: usize) -> Self {
        Self::with_width(table_size, self.inline.width())
    }

    #[inline]
    fn get(&self, pos: usize) -> usize {
        let inline = self.inline.get(pos);
        if inline == self.inline.max_value() {
            self.spill[&pos]
        } else {
            inline as usize
        }
    }

    fn set(&mut self, pos: usize, displacement: usize) {
        let max = self.inline.max_value();
        if displacement as u64 >= max {
            self.inline.set(pos, max);
            self.spill.insert(pos, displacement);
        } else {
            if self.inline.get(pos) == max {
                self.spill.remove(&pos);
            }
            self.inline.set(pos, displacement as u64);
        }
    }

    fn heap_size(&self) -> usize {
        self.inline.heap_size()
            + self.spill.capacity() * (std::mem::size_of::<(usize, usize)>() + 1)
    }

    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        write_u8(writer, self.inline.width() as u8)?;
        write_words(writer, self.inline.as_words())?;
        let mut spilled: Vec<_> = self.spill.iter().map(|(&pos, &value)| (pos, value)).collect();
        spilled.sort_unstable();
        write_usize(writer, spilled.len())?;
        for (pos, value) in spilled {
            write_usize(writer, pos)?;
            write_usize(writer, value)?;
        }
        Ok(())
    }

    fn read_from(reader: &mut impl Read, table_size: usize) -> Result<Self, DeserializeError> {
        let width = check_width("layered displacement", read_u8(reader)? as u32, 1, 63)?;
        let count = packed_words(table_size, width, "displacement table too large")?;
        let words = read_words(reader, count)?;
        let inline = IntVec::from_words(words, width, table_size)
            .ok_or(DeserializeError::Inconsistent("padding bits of displacement table"))?;
        let max = inline.max_value();
        let escaped = inline.iter().filter(|&value| value == max).count();

        let count = read_len(reader, table_size, "spill map larger than the table")?;
        if count != escaped {
            return Err(DeserializeError::Inconsistent(
                "spill map size differs from the escaped displacements",
            ));
        }
        let mut spill = HashMap::default();
        for _ in 0..count {
            let pos = read_usize(reader)?;
            let value = read_usize(reader)?;
            if pos >= table_size || inline.get(pos) != max || (value as u64) < max {
                return Err(DeserializeError::Inconsistent("invalid spilled displacement"));
            }
            if spill.insert(pos, value).is_some() {
                return Err(DeserializeError::Inconsistent("duplicate spilled displacement"));
            }
        }
        Ok(Self { inline, spill })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_values_spill() {
        let config = TableConfig::default().with_layered_displacement_width(3);
        let mut store = LayeredDisplacement::new(32, &config);
        store.set(1, 6);
        store.set(2, 7);
        store.set(3, 1000);
        assert_eq!(store.spilled(), 2);
        assert_eq!((store.get(1), store.get(2), store.get(3)), (6, 7, 1000));

        store.set(2, 0);
        assert_eq!(store.spilled(), 1);
        assert_eq!(store.get(2), 0);

        let mut bytes = vec![];
        store.write_to(&mut bytes).unwrap();
        let read = LayeredDisplacement::read_from(&mut &bytes[..], 32).unwrap();
        assert_eq!(read.get(3), 1000);
        assert_eq!(read.get(1), 6);
        assert_eq!(read.spilled(), 1);
    }

    #[test]
    fn missing_spill_entries_are_rejected() {
        let config = TableConfig::default().with_layered_displacement_width(2);
        let mut store = LayeredDisplacement::new(8, &config);
        store.set(5, 9);
        let mut bytes = vec![];
        store.write_to(&mut bytes).unwrap();
        // width byte, one word, then the spill count
        let count_at = 1 + 8;
        bytes[count_at..count_at + std::mem::size_of::<usize>()]
            .copy_from_slice(&0usize.to_ne_bytes());
        assert!(LayeredDisplacement::read_from(&mut &bytes[..], 8).is_err());
    }
}
