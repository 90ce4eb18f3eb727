use std::{
    cell::Cell,
    io::{self, Read, Write},
};

use bit_layout::{bit_buf::gamma_len, words_for_bits, BitBuf};

use super::DisplacementStore;
use crate::{
    config::TableConfig,
    error::DeserializeError,
    io::{read_len, read_u8, read_usize, read_words, write_u8, write_usize, write_words},
};

/// Position of a decoded entry, remembered to make sequential access cheap.
#[derive(Clone, Copy, Default, Debug)]
struct Cursor {
    bucket: usize,
    index: usize,
    bit: usize,
}

/// Displacements encoded as Elias-gamma codes of `displacement + 1`.
///
/// Entries are grouped into buckets, each a bit stream of consecutive codes. Accessing an entry
/// decodes its bucket up to that entry, starting from the last accessed entry when possible.
#[derive(Clone, Debug)]
pub struct EliasGammaDisplacement {
    buckets: Vec<BitBuf>,
    bucket_size: usize,
    table_size: usize,
    growing: bool,
    cursor: Cell<Cursor>,
}

/// Bucket size of the growing policy, `floor(log2(table_size)^1.5)`.
fn growing_bucket_size(table_size: usize) -> usize {
    let log2 = table_size.max(2).ilog2() as f64;
    ((log2 * log2.sqrt()) as usize).max(1)
}

impl EliasGammaDisplacement {
    fn with_bucket_size(table_size: usize, bucket_size: usize, growing: bool) -> Self {
        let bucket_size = if growing {
            growing_bucket_size(table_size)
        } else {
            bucket_size
        };
        assert!(bucket_size > 0);
        let buckets = (0..table_size.div_ceil(bucket_size))
            .map(|bucket| {
                // Every zero displacement is the one bit code of 1.
                let entries = bucket_entries(table_size, bucket_size, bucket);
                let mut buf = BitBuf::new();
                for chunk in (0..entries).step_by(64) {
                    let width = (entries - chunk).min(64) as u32;
                    buf.push(u64::MAX, width);
                }
                buf
            })
            .collect();
        Self {
            buckets,
            bucket_size,
            table_size,
            growing,
            cursor: Cell::default(),
        }
    }

    /// Number of entries per bucket.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Finds the bit position of entry `pos` inside its bucket.
    fn seek(&self, pos: usize) -> Cursor {
        assert!(pos < self.table_size, "position {pos} out of bounds");
        let bucket = pos / self.bucket_size;
        let index = pos % self.bucket_size;
        let cached = self.cursor.get();
        let mut cursor = if cached.bucket == bucket && cached.index <= index {
            cached
        } else {
            Cursor {
                bucket,
                index: 0,
                bit: 0,
            }
        };
        let stream = &self.buckets[bucket];
        while cursor.index < index {
            cursor.bit = decode(stream, cursor.bit).1;
            cursor.index += 1;
        }
        self.cursor.set(cursor);
        cursor
    }
}

fn bucket_entries(table_size: usize, bucket_size: usize, bucket: usize) -> usize {
    (table_size - bucket * bucket_size).min(bucket_size)
}

/// Decodes the code at `bit`, streams are validated on construction and deserialization.
#[inline]
fn decode(stream: &BitBuf, bit: usize) -> (u64, usize) {
    match stream.read_gamma(bit) {
        Some(decoded) => decoded,
        None => panic!("corrupt elias-gamma displacement stream at bit {bit}"),
    }
}

impl DisplacementStore for EliasGammaDisplacement {
    fn new(table_size: usize, config: &TableConfig) -> Self {
        Self::with_bucket_size(table_size, config.elias_bucket_size, config.elias_growing_buckets)
    }

    fn empty_like(&self, table_size: usize) -> Self {
        Self::with_bucket_size(table_size, self.bucket_size, self.growing)
    }

    fn get(&self, pos: usize) -> usize {
        let cursor = self.seek(pos);
        (decode(&self.buckets[cursor.bucket], cursor.bit).0 - 1) as usize
    }

    fn set(&mut self, pos: usize, displacement: usize) {
        let cursor = self.seek(pos);
        let stream = &mut self.buckets[cursor.bucket];
        let (old, end) = decode(stream, cursor.bit);
        let code = displacement as u64 + 1;
        if old == code {
            return;
        }
        let mut replacement = BitBuf::new();
        replacement.push_gamma(code);
        debug_assert_eq!(replacement.len(), gamma_len(code));
        stream.splice(cursor.bit, end, &replacement);
    }

    fn heap_size(&self) -> usize {
        self.buckets.capacity() * std::mem::size_of::<BitBuf>()
            + self.buckets.iter().map(BitBuf::heap_size).sum::<usize>()
    }

    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        write_u8(writer, self.growing as u8)?;
        write_usize(writer, self.bucket_size)?;
        for stream in &self.buckets {
            write_usize(writer, stream.len())?;
            write_words(writer, stream.as_words())?;
        }
        Ok(())
    }

    fn read_from(reader: &mut impl Read, table_size: usize) -> Result<Self, DeserializeError> {
        let growing = match read_u8(reader)? {
            0 => false,
            1 => true,
            _ => return Err(DeserializeError::Inconsistent("invalid growing bucket flag")),
        };
        let bucket_size = read_usize(reader)?;
        if bucket_size == 0 || (growing && bucket_size != growing_bucket_size(table_size)) {
            return Err(DeserializeError::Inconsistent("invalid elias-gamma bucket size"));
        }
        let bucket_count = table_size.div_ceil(bucket_size);
        let mut buckets = vec![];
        for bucket in 0..bucket_count {
            let entries = bucket_entries(table_size, bucket_size, bucket);
            let len = read_len(
                reader,
                entries.saturating_mul(2 * u64::BITS as usize - 1),
                "elias-gamma bucket longer than its entries allow",
            )?;
            let words = read_words(reader, words_for_bits(len))?;
            let stream = BitBuf::from_words(words, len)
                .ok_or(DeserializeError::Inconsistent("padding bits of elias-gamma bucket"))?;
            let mut bit = 0;
            for _ in 0..entries {
                bit = stream
                    .read_gamma(bit)
                    .ok_or(DeserializeError::Inconsistent("truncated elias-gamma code"))?
                    .1;
            }
            if bit != len {
                return Err(DeserializeError::Inconsistent(
                    "trailing bits in elias-gamma bucket",
                ));
            }
            buckets.push(stream);
        }
        Ok(Self {
            buckets,
            bucket_size,
            table_size,
            growing,
            cursor: Cell::default(),
        })
    }
}
