use std::{
    fmt,
    io::{self, Read, Write},
};

use bit_layout::{BitLayout, LayoutElement};

use super::{Slot, SlotWidths, Storage};
use crate::{
    config::TableConfig,
    error::DeserializeError,
    io::{read_u64, read_words, write_u64, write_words},
};

type OccupancyMask = u64;

/// Number of table positions grouped into one bucket.
pub const BUCKET_SIZE: usize = OccupancyMask::BITS as usize;
const BUCKET_SHIFT: u32 = {
    assert!(BUCKET_SIZE.is_power_of_two());
    BUCKET_SIZE.trailing_zeros()
};
const BUCKET_MASK: usize = BUCKET_SIZE - 1;

/// Maps a table position to its bucket and the bit inside that bucket's occupancy mask.
#[inline(always)]
fn table_pos_to_bucket(pos: usize) -> (usize, u32) {
    (pos >> BUCKET_SHIFT, (pos & BUCKET_MASK) as u32)
}

/// Placement of the packed arrays of a bucket holding `len` slots.
///
/// Word 0 is the occupancy mask, followed by all quotients and then all values.
struct BucketLayout {
    quotients: LayoutElement,
    values: LayoutElement,
    words: usize,
}

impl BucketLayout {
    fn new(len: usize, widths: SlotWidths) -> Self {
        let mut layout = BitLayout::new();
        layout.aligned_elements(8, 8, 1);
        let quotients = layout.bit_packed_elements(widths.quotient, len);
        let values = layout.bit_packed_elements(widths.value, len);
        Self {
            quotients,
            values,
            words: layout.size_in_words(),
        }
    }

    #[inline]
    fn read(&self, words: &[u64], index: usize) -> Slot {
        Slot {
            quotient: self.quotients.view(words).get(index),
            value: self.values.view(words).get(index),
        }
    }

    #[inline]
    fn write(&self, words: &mut [u64], index: usize, slot: Slot) {
        self.quotients.view_mut(words).set(index, slot.quotient);
        self.values.view_mut(words).set(index, slot.value);
    }
}

/// Up to [`BUCKET_SIZE`] slots in a single allocation sized for the occupied ones.
///
/// An empty bucket holds no allocation at all.
#[derive(Clone, Default, PartialEq, Eq)]
struct Bucket {
    words: Box<[u64]>,
}

impl Bucket {
    #[inline(always)]
    fn mask(&self) -> OccupancyMask {
        self.words.first().copied().unwrap_or(0)
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.mask().count_ones() as usize
    }

    #[inline(always)]
    fn contains(&self, bit: u32) -> bool {
        self.mask() & (1 << bit) != 0
    }

    /// Index of `bit` among the slots present in this bucket.
    #[inline(always)]
    fn offset(&self, bit: u32) -> usize {
        let mask_before = !(!0 << bit);
        (self.mask() & mask_before).count_ones() as usize
    }

    fn get(&self, bit: u32, widths: SlotWidths) -> Option<Slot> {
        if !self.contains(bit) {
            return None;
        }
        let layout = BucketLayout::new(self.len(), widths);
        Some(layout.read(&self.words, self.offset(bit)))
    }

    fn set(&mut self, bit: u32, widths: SlotWidths, slot: Slot) {
        assert!(self.contains(bit));
        let layout = BucketLayout::new(self.len(), widths);
        let offset = self.offset(bit);
        layout.write(&mut self.words, offset, slot);
    }

    /// Replaces the allocation by one sized for `mask`, filling slot `i` of the new bucket with
    /// `fill(i)`.
    fn rebuild(
        &mut self,
        mask: OccupancyMask,
        widths: SlotWidths,
        mut fill: impl FnMut(usize) -> Slot,
    ) {
        if mask == 0 {
            self.words = Box::default();
            return;
        }
        let len = mask.count_ones() as usize;
        let layout = BucketLayout::new(len, widths);
        let mut words = vec![0; layout.words].into_boxed_slice();
        words[0] = mask;
        for index in 0..len {
            layout.write(&mut words, index, fill(index));
        }
        self.words = words;
    }

    fn insert_at(&mut self, bit: u32, widths: SlotWidths, slot: Slot) {
        assert!(!self.contains(bit));
        let old = BucketLayout::new(self.len(), widths);
        let at = self.offset(bit);
        let old_words = std::mem::take(&mut self.words);
        let mask = old_words.first().copied().unwrap_or(0) | 1 << bit;
        self.rebuild(mask, widths, |index| match index.cmp(&at) {
            std::cmp::Ordering::Less => old.read(&old_words, index),
            std::cmp::Ordering::Equal => slot,
            std::cmp::Ordering::Greater => old.read(&old_words, index - 1),
        });
    }

    fn remove_at(&mut self, bit: u32, widths: SlotWidths) -> Option<Slot> {
        if !self.contains(bit) {
            return None;
        }
        let old = BucketLayout::new(self.len(), widths);
        let at = self.offset(bit);
        let old_words = std::mem::take(&mut self.words);
        let removed = old.read(&old_words, at);
        let mask = old_words[0] & !(1 << bit);
        self.rebuild(mask, widths, |index| {
            old.read(&old_words, if index < at { index } else { index + 1 })
        });
        Some(removed)
    }
}

/// Storage that groups positions into buckets of [`BUCKET_SIZE`], each allocating only for its
/// occupied slots.
///
/// Inserting into a bucket with `m` occupied slots allocates a fresh bucket for `m + 1` slots
/// and copies the old contents over, so the cost is bounded by the bucket size and never by the
/// table size.
#[derive(Clone)]
pub struct BucketedStorage {
    buckets: Vec<Bucket>,
    table_size: usize,
    widths: SlotWidths,
}

impl fmt::Debug for BucketedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketedStorage")
            .field("table_size", &self.table_size)
            .field("widths", &self.widths)
            .field("len", &self.buckets.iter().map(Bucket::len).sum::<usize>())
            .finish()
    }
}

impl BucketedStorage {
    fn with_table_size(table_size: usize, widths: SlotWidths) -> Self {
        Self {
            buckets: vec![Bucket::default(); table_size.div_ceil(BUCKET_SIZE)],
            table_size,
            widths,
        }
    }

    /// Number of words currently allocated by the bucket containing `pos`.
    pub fn bucket_allocation_words(&self, pos: usize) -> usize {
        self.buckets[table_pos_to_bucket(pos).0].words.len()
    }

    #[inline(always)]
    fn locate(&self, pos: usize) -> (usize, u32) {
        assert!(pos < self.table_size, "position {pos} out of bounds");
        table_pos_to_bucket(pos)
    }
}

impl Storage for BucketedStorage {
    fn new(table_size: usize, widths: SlotWidths, _config: &TableConfig) -> Self {
        Self::with_table_size(table_size, widths)
    }

    fn empty_like(&self, table_size: usize, widths: SlotWidths) -> Self {
        Self::with_table_size(table_size, widths)
    }

    fn table_size(&self) -> usize {
        self.table_size
    }

    fn widths(&self) -> SlotWidths {
        self.widths
    }

    #[inline]
    fn is_empty_at(&self, pos: usize) -> bool {
        let (bucket, bit) = self.locate(pos);
        !self.buckets[bucket].contains(bit)
    }

    #[inline]
    fn get(&self, pos: usize) -> Option<Slot> {
        let (bucket, bit) = self.locate(pos);
        self.buckets[bucket].get(bit, self.widths)
    }

    fn allocate(&mut self, pos: usize, slot: Slot) {
        let (bucket, bit) = self.locate(pos);
        self.buckets[bucket].insert_at(bit, self.widths, slot);
    }

    fn set(&mut self, pos: usize, slot: Slot) {
        let (bucket, bit) = self.locate(pos);
        self.buckets[bucket].set(bit, self.widths, slot);
    }

    fn take(&mut self, pos: usize) -> Option<Slot> {
        let (bucket, bit) = self.locate(pos);
        self.buckets[bucket].remove_at(bit, self.widths)
    }

    fn heap_size(&self) -> usize {
        self.buckets.capacity() * std::mem::size_of::<Bucket>()
            + self
                .buckets
                .iter()
                .map(|bucket| bucket.words.len() * std::mem::size_of::<u64>())
                .sum::<usize>()
    }

    fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        for bucket in &self.buckets {
            write_u64(writer, bucket.mask())?;
            if let Some(data) = bucket.words.get(1..) {
                write_words(writer, data)?;
            }
        }
        Ok(())
    }

    fn read_from(
        reader: &mut impl Read,
        table_size: usize,
        widths: SlotWidths,
        size: usize,
    ) -> Result<Self, DeserializeError> {
        // Buckets are pushed as their masks arrive, a short stream fails before the table
        // size is ever allocated.
        let mut buckets = vec![];
        let mut total = 0;
        let bucket_count = table_size.div_ceil(BUCKET_SIZE);
        for index in 0..bucket_count {
            let mask = read_u64(reader)?;
            let positions = table_size - index * BUCKET_SIZE;
            if index + 1 == bucket_count && positions < BUCKET_SIZE && mask >> positions != 0 {
                return Err(DeserializeError::Inconsistent(
                    "occupancy mask marks positions past the table end",
                ));
            }
            if mask == 0 {
                buckets.push(Bucket::default());
                continue;
            }
            let layout = BucketLayout::new(mask.count_ones() as usize, widths);
            let data = read_words(reader, layout.words - 1)?;
            let mut words = Vec::with_capacity(layout.words);
            words.push(mask);
            words.extend(data);
            buckets.push(Bucket {
                words: words.into_boxed_slice(),
            });
            total += mask.count_ones() as usize;
        }
        if total != size {
            return Err(DeserializeError::Inconsistent(
                "occupied slot count differs from the table size",
            ));
        }
        Ok(Self {
            buckets,
            table_size,
            widths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTHS: SlotWidths = SlotWidths {
        quotient: 11,
        value: 23,
    };

    fn slot(n: u64) -> Slot {
        Slot {
            quotient: n % 2048,
            value: n * 1000 % (1 << 23),
        }
    }

    #[test]
    fn slots_keep_their_positions() {
        let mut storage = BucketedStorage::new(256, WIDTHS, &TableConfig::default());
        let positions = [200, 3, 64, 63, 65, 0, 255, 4, 130];
        for (n, &pos) in positions.iter().enumerate() {
            assert!(storage.is_empty_at(pos));
            storage.allocate(pos, slot(n as u64));
        }
        for (n, &pos) in positions.iter().enumerate() {
            assert_eq!(storage.get(pos), Some(slot(n as u64)));
        }
        assert_eq!(storage.get(1), None);

        storage.set(64, slot(77));
        assert_eq!(storage.get(64), Some(slot(77)));
        assert_eq!(storage.get(63), Some(slot(3)));
        assert_eq!(storage.get(65), Some(slot(4)));

        assert_eq!(storage.take(3), Some(slot(1)));
        assert_eq!(storage.take(3), None);
        assert_eq!(storage.get(0), Some(slot(5)));
        assert_eq!(storage.get(4), Some(slot(7)));
    }

    #[test]
    fn allocation_is_proportional_to_bucket_occupancy() {
        let mut storage = BucketedStorage::new(1 << 12, WIDTHS, &TableConfig::default());
        assert_eq!(storage.bucket_allocation_words(100), 0);
        for m in 0..BUCKET_SIZE {
            storage.allocate(64 + m, slot(m as u64));
            let expected = BucketLayout::new(m + 1, WIDTHS).words;
            assert_eq!(storage.bucket_allocation_words(64), expected);
            assert_eq!(expected, 1 + ((m + 1) * 34).div_ceil(64));
        }
        assert_eq!(storage.bucket_allocation_words(0), 0);
        assert_eq!(storage.bucket_allocation_words(128), 0);

        for m in 0..BUCKET_SIZE {
            storage.take(64 + m);
        }
        assert_eq!(storage.bucket_allocation_words(64), 0);
    }

    #[test]
    fn serialization_checks_counts() {
        let mut storage = BucketedStorage::new(32, WIDTHS, &TableConfig::default());
        storage.allocate(5, slot(5));
        storage.allocate(31, slot(31));
        let mut bytes = vec![];
        storage.write_to(&mut bytes).unwrap();

        let read = BucketedStorage::read_from(&mut &bytes[..], 32, WIDTHS, 2).unwrap();
        assert_eq!(read.get(5), Some(slot(5)));
        assert_eq!(read.get(31), Some(slot(31)));
        assert!(BucketedStorage::read_from(&mut &bytes[..], 32, WIDTHS, 3).is_err());
        assert!(BucketedStorage::read_from(&mut &bytes[..], 16, WIDTHS, 2).is_err());
    }
}
