//! The compact hash table, mapping integer keys to integer values.
use std::{
    fmt,
    io::{self, Read, Write},
};

use bit_layout::{bits_for, significant_bits};

use crate::{
    config::TableConfig,
    error::{ConfigError, DeserializeError},
    hash::{InvertibleHash, XorShiftMix},
    index::{CvIndex, IndexStructure},
    io::{read_u8, write_u8},
    size_manager::{Decomposed, SizeManager},
    storage::{BucketedStorage, Slot, SlotWidths, Storage},
};

/// Hash map from `u64` keys to `u64` values using close to the minimum number of bits per entry.
///
/// Keys are hashed with an invertible hash of just enough bits, split into an initial address
/// and a quotient, and only the quotient is stored. Key and value fields are exactly as wide as
/// the widest key and value inserted so far: inserting a wider one rebuilds the table with
/// wider fields, and so does doubling the capacity when the load factor is exceeded. A rebuild
/// runs to completion inside the insert that triggered it.
///
/// The storage backend `S` and the collision strategy `I` are independent; see the aliases in
/// the crate root for the common combinations.
///
/// # Examples
///
/// ```
/// use compact_hash::CompactHashMap;
///
/// let mut map = <CompactHashMap>::new();
/// map.insert(3, 30);
/// map.insert(11, 110);
/// assert_eq!(map.get(11), Some(110));
/// assert_eq!(map.get(19), None);
/// assert_eq!(map.len(), 2);
/// ```
#[derive(Clone)]
pub struct CompactHashMap<S = BucketedStorage, I = CvIndex, H = XorShiftMix> {
    sizes: SizeManager,
    key_width: u32,
    value_width: u32,
    storage: S,
    index: I,
    hasher: H,
    config: TableConfig,
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> Default for CompactHashMap<S, I, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> fmt::Debug for CompactHashMap<S, I, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.for_each(|key, value| {
            map.entry(&key, &value);
        });
        map.finish()
    }
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> CompactHashMap<S, I, H> {
    /// Creates an empty map with the default configuration.
    pub fn new() -> Self {
        match Self::with_config(TableConfig::default()) {
            Ok(map) => map,
            Err(err) => unreachable!("default configuration is valid: {err}"),
        }
    }

    /// Creates an empty map with room for about `capacity` slots before growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut map = Self::new();
        map.config.capacity = capacity;
        map.clear();
        map
    }

    /// Creates an empty map with the given configuration.
    pub fn with_config(config: TableConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sizes = SizeManager::new(config.capacity, config.max_load_factor)?;
        let key_width = config.key_width;
        let value_width = config.value_width;
        let widths = slot_widths(&sizes, key_width, value_width);
        Ok(Self {
            storage: S::new(sizes.capacity(), widths, &config),
            index: I::new(sizes.capacity(), &config),
            sizes,
            key_width,
            value_width,
            hasher: H::default(),
            config,
        })
    }

    /// Number of entries.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.sizes.size()
    }

    /// Returns `true` if the map has no entries.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, always a power of two.
    pub fn capacity(&self) -> usize {
        self.sizes.capacity()
    }

    /// Current key width in bits.
    pub fn key_width(&self) -> u32 {
        self.key_width
    }

    /// Current value width in bits.
    pub fn value_width(&self) -> u32 {
        self.value_width
    }

    /// Widths of the fields stored per slot.
    pub fn slot_widths(&self) -> SlotWidths {
        self.storage.widths()
    }

    /// Current maximum load factor.
    pub fn max_load_factor(&self) -> f32 {
        self.sizes.max_load_factor()
    }

    /// Replaces the maximum load factor, which must lie in `(0, 1]`.
    ///
    /// Takes effect at the next insertion.
    pub fn set_max_load_factor(&mut self, max_load_factor: f32) -> Result<(), ConfigError> {
        self.sizes.set_max_load_factor(max_load_factor)?;
        self.config.max_load_factor = max_load_factor;
        Ok(())
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The collision resolution structure.
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Heap memory used by storage and index in bytes.
    pub fn heap_size(&self) -> usize {
        self.storage.heap_size() + self.index.heap_size()
    }

    /// Width of the hash the keys are mapped to.
    #[inline(always)]
    fn hash_width(&self) -> u32 {
        hash_width(&self.sizes, self.key_width)
    }

    #[inline]
    fn decompose(&self, key: u64) -> Decomposed {
        self.sizes
            .decompose_hashed_value(self.hasher.hash(key, self.hash_width()))
    }

    #[inline]
    fn locate(&self, key: u64) -> Option<usize> {
        if bits_for(key) > self.key_width {
            return None;
        }
        let Decomposed {
            initial_address,
            quotient,
        } = self.decompose(key);
        self.index
            .lookup(&self.sizes, &self.storage, initial_address, quotient)
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, key: u64) -> Option<u64> {
        self.locate(key)
            .map(|pos| self.storage.occupied(pos).value)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: u64) -> bool {
        self.locate(key).is_some()
    }

    /// Inserts `value` for `key`, returning the previous value.
    pub fn insert(&mut self, key: u64, value: u64) -> Option<u64> {
        self.widen_for(key, value);
        if let Some(pos) = self.locate(key) {
            let slot = self.storage.occupied(pos);
            self.storage.set(pos, Slot { value, ..slot });
            return Some(slot.value);
        }
        self.insert_new(key, value);
        None
    }

    /// Returns the value stored for `key`, inserting `default()` first if absent.
    ///
    /// The second component is `true` if the entry was inserted by this call.
    pub fn get_or_insert_with(&mut self, key: u64, default: impl FnOnce() -> u64) -> (u64, bool) {
        self.widen_for(key, 0);
        if let Some(pos) = self.locate(key) {
            return (self.storage.occupied(pos).value, false);
        }
        let value = default();
        self.widen_for(key, value);
        self.insert_new(key, value);
        (value, true)
    }

    /// Returns the value stored for `key`, inserting `0` first if absent.
    ///
    /// # Panics
    ///
    /// On flat storage whose empty value is `0` inserting a missing key panics, as `0` cannot be
    /// stored there. Use [`get_or_insert_with`](CompactHashMap::get_or_insert_with) with a
    /// nonzero default instead.
    pub fn at(&mut self, key: u64) -> u64 {
        self.get_or_insert_with(key, || 0).0
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: u64) -> Option<u64> {
        if bits_for(key) > self.key_width {
            return None;
        }
        let Decomposed {
            initial_address,
            quotient,
        } = self.decompose(key);
        let slot = self
            .index
            .remove(&self.sizes, &mut self.storage, initial_address, quotient)?;
        self.sizes.set_size(self.sizes.size() - 1);
        Some(slot.value)
    }

    /// Removes every entry and restores the capacity and widths the map was configured with.
    pub fn clear(&mut self) {
        let sizes = match SizeManager::new(self.config.capacity, self.sizes.max_load_factor()) {
            Ok(sizes) => sizes,
            Err(err) => unreachable!("load factor was validated before: {err}"),
        };
        self.key_width = self.config.key_width;
        self.value_width = self.config.value_width;
        let widths = slot_widths(&sizes, self.key_width, self.value_width);
        self.storage = self.storage.empty_like(sizes.capacity(), widths);
        self.index = self.index.empty_like(sizes.capacity());
        self.sizes = sizes;
    }

    /// Ensures the map can hold `additional` more entries without growing.
    pub fn reserve(&mut self, additional: usize) {
        let target = self.len() + additional;
        let mut capacity = self.capacity();
        let mut probe = self.sizes.clone();
        while probe.needs_to_grow_capacity(target) {
            capacity = probe.grown_capacity();
            probe = match SizeManager::new(capacity, probe.max_load_factor()) {
                Ok(probe) => probe,
                Err(err) => unreachable!("load factor was validated before: {err}"),
            };
        }
        if capacity != self.capacity() {
            self.rebuild(capacity, self.key_width, self.value_width);
        }
    }

    /// Calls `f(key, value)` for every entry.
    pub fn for_each(&self, mut f: impl FnMut(u64, u64)) {
        let hash_width = self.hash_width();
        self.index
            .for_each_occupied(&self.sizes, &self.storage, |initial_address, _, slot| {
                let hashed = self
                    .sizes
                    .compose_hashed_value(initial_address, slot.quotient);
                f(self.hasher.unhash(hashed, hash_width), slot.value);
            });
    }

    /// Collects all entries into a vector, in table order.
    pub fn entries(&self) -> Vec<(u64, u64)> {
        let mut entries = Vec::with_capacity(self.len());
        self.for_each(|key, value| entries.push((key, value)));
        entries
    }

    /// Widens the key and value fields to at least the given widths.
    ///
    /// Fields never shrink, so widths below the current ones are ignored. Reserving the final
    /// widths up front avoids the rebuilds that widening one entry at a time would cause.
    ///
    /// # Panics
    ///
    /// Panics if a width exceeds 64 bits.
    pub fn reserve_widths(&mut self, key_width: u32, value_width: u32) {
        assert!(
            key_width <= 64 && value_width <= 64,
            "field widths are limited to 64 bits, got key {key_width} and value {value_width}"
        );
        let key_width = self.key_width.max(key_width);
        let value_width = self.value_width.max(value_width);
        if key_width != self.key_width || value_width != self.value_width {
            self.rebuild(self.capacity(), key_width, value_width);
        }
    }

    fn widen_for(&mut self, key: u64, value: u64) {
        self.reserve_widths(bits_for(key), significant_bits(value));
    }

    /// Inserts a key known to be absent, growing first if needed.
    fn insert_new(&mut self, key: u64, value: u64) {
        let new_size = self.len() + 1;
        if self.sizes.needs_to_grow_capacity(new_size) {
            self.rebuild(self.sizes.grown_capacity(), self.key_width, self.value_width);
        }
        let Decomposed {
            initial_address,
            quotient,
        } = self.decompose(key);
        let placement = self.index.lookup_insert(
            &self.sizes,
            &mut self.storage,
            initial_address,
            Slot { quotient, value },
        );
        debug_assert!(!placement.found);
        self.sizes.set_size(new_size);
    }

    /// Moves every entry into a fresh storage and index pair of the given geometry.
    ///
    /// Stored hashes are only recomputed when the hash width changes, otherwise the composed
    /// hash is split again for the new capacity.
    fn rebuild(&mut self, capacity: usize, key_width: u32, value_width: u32) {
        log::debug!(
            "rebuilding compact hash table with {} entries: capacity {} -> {}, key width {} -> {}, value width {} -> {}",
            self.len(),
            self.capacity(),
            capacity,
            self.key_width,
            key_width,
            self.value_width,
            value_width,
        );
        let mut sizes = match SizeManager::new(capacity, self.sizes.max_load_factor()) {
            Ok(sizes) => sizes,
            Err(err) => unreachable!("load factor was validated before: {err}"),
        };
        let widths = slot_widths(&sizes, key_width, value_width);
        let mut storage = self.storage.empty_like(sizes.capacity(), widths);
        let mut index = self.index.empty_like(sizes.capacity());

        let old_hash_width = self.hash_width();
        let new_hash_width = hash_width(&sizes, key_width);
        self.index
            .for_each_occupied(&self.sizes, &self.storage, |initial_address, _, slot| {
                let mut hashed = self
                    .sizes
                    .compose_hashed_value(initial_address, slot.quotient);
                if old_hash_width != new_hash_width {
                    let key = self.hasher.unhash(hashed, old_hash_width);
                    hashed = self.hasher.hash(key, new_hash_width);
                }
                let Decomposed {
                    initial_address,
                    quotient,
                } = sizes.decompose_hashed_value(hashed);
                let slot = Slot {
                    quotient,
                    value: slot.value,
                };
                index.lookup_insert(&sizes, &mut storage, initial_address, slot);
            });

        sizes.set_size(self.len());
        self.sizes = sizes;
        self.key_width = key_width;
        self.value_width = value_width;
        self.storage = storage;
        self.index = index;
    }

    /// Appends the serialized map to `writer`.
    ///
    /// The format is the size manager state, the key, value and hash widths as single bytes,
    /// the index state and finally the storage state, all in native byte order.
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        self.sizes.write_to(writer)?;
        write_u8(writer, self.key_width as u8)?;
        write_u8(writer, self.value_width as u8)?;
        write_u8(writer, self.hash_width() as u8)?;
        self.index.write_to(writer)?;
        self.storage.write_to(writer)
    }

    /// Reads a map serialized by [`write_to`](CompactHashMap::write_to).
    ///
    /// Parameters that are not part of the stream, like the initial capacity restored by
    /// [`clear`](CompactHashMap::clear), take their default values.
    pub fn read_from(reader: &mut impl Read) -> Result<Self, DeserializeError> {
        let sizes = SizeManager::read_from(reader)?;
        let key_width = read_u8(reader)? as u32;
        let value_width = read_u8(reader)? as u32;
        let stored_hash_width = read_u8(reader)? as u32;
        if !(1..=64).contains(&key_width) {
            return Err(DeserializeError::Width {
                what: "key",
                width: key_width,
            });
        }
        if value_width > 64 {
            return Err(DeserializeError::Width {
                what: "value",
                width: value_width,
            });
        }
        if stored_hash_width != hash_width(&sizes, key_width) {
            return Err(DeserializeError::Width {
                what: "hash",
                width: stored_hash_width,
            });
        }
        let widths = slot_widths(&sizes, key_width, value_width);
        let index = I::read_from(reader, sizes.capacity())?;
        let storage = S::read_from(reader, sizes.capacity(), widths, sizes.size())?;
        index.validate(&sizes, &storage)?;
        let config = TableConfig {
            max_load_factor: sizes.max_load_factor(),
            key_width,
            value_width,
            ..TableConfig::default()
        };
        Ok(Self {
            sizes,
            key_width,
            value_width,
            storage,
            index,
            hasher: H::default(),
            config,
        })
    }
}

fn hash_width(sizes: &SizeManager, key_width: u32) -> u32 {
    key_width.max(sizes.capacity_log2() + 1)
}

fn slot_widths(sizes: &SizeManager, key_width: u32, value_width: u32) -> SlotWidths {
    SlotWidths {
        quotient: hash_width(sizes, key_width) - sizes.capacity_log2(),
        value: value_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hash::IdentityHash,
        index::{DisplacementIndex, LayeredDisplacement},
    };

    #[test]
    fn colliding_keys_stay_separate() {
        let config = TableConfig::default().with_capacity(8).with_max_load_factor(1.0);
        let mut map =
            CompactHashMap::<BucketedStorage, CvIndex, IdentityHash>::with_config(config.clone())
                .unwrap();
        for key in [3, 11, 19, 4] {
            assert_eq!(map.insert(key, key * 10), None);
        }
        assert_eq!(map.capacity(), 8);
        for key in [3, 11, 19, 4] {
            assert_eq!(map.get(key), Some(key * 10));
        }

        type Layered = DisplacementIndex<LayeredDisplacement>;
        let mut map =
            CompactHashMap::<BucketedStorage, Layered, IdentityHash>::with_config(config).unwrap();
        for key in [3, 11, 19, 4] {
            assert_eq!(map.insert(key, key * 10), None);
        }
        for key in [3, 11, 19, 4] {
            assert_eq!(map.get(key), Some(key * 10));
        }
    }

    #[test]
    fn widths_follow_inserted_data() {
        let mut map = <CompactHashMap>::new();
        assert_eq!((map.key_width(), map.value_width()), (1, 1));
        map.insert(1, 1);
        assert_eq!((map.key_width(), map.value_width()), (1, 1));
        map.insert(1000, 5);
        assert_eq!((map.key_width(), map.value_width()), (10, 3));
        map.insert(7, u64::MAX);
        assert_eq!(map.value_width(), 64);
        map.insert(u64::MAX, 0);
        assert_eq!(map.key_width(), 64);
        assert_eq!(map.get(1000), Some(5));
        assert_eq!(map.get(7), Some(u64::MAX));
        assert_eq!(map.get(u64::MAX), Some(0));
        assert_eq!(map.get(1), Some(1));
    }

    #[test]
    fn quotient_width_shrinks_as_capacity_grows() {
        let mut map = <CompactHashMap>::new();
        map.insert(1 << 20, 1);
        let before = map.slot_widths().quotient;
        assert_eq!(before, 21 - map.sizes.capacity_log2());
        map.reserve(1000);
        assert!(map.capacity() >= 2048);
        assert_eq!(map.slot_widths().quotient, 21 - map.sizes.capacity_log2());
        assert_eq!(map.get(1 << 20), Some(1));
    }

    #[test]
    fn clear_restores_configuration() {
        let mut map = <CompactHashMap>::with_capacity(16);
        for key in 0..100 {
            map.insert(key, key + 1);
        }
        assert!(map.capacity() > 16);
        map.clear();
        assert_eq!(map.capacity(), 16);
        assert!(map.is_empty());
        assert_eq!(map.get(5), None);
        assert_eq!((map.key_width(), map.value_width()), (1, 1));
    }

    #[test]
    fn at_inserts_zero_once() {
        let mut map = <CompactHashMap>::new();
        map.insert(4, 9);
        assert_eq!(map.at(4), 9);
        assert_eq!(map.at(12), 0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(12), Some(0));
        map.insert(12, 3);
        assert_eq!(map.at(12), 3);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn reserved_widths_are_kept() {
        let mut map = <CompactHashMap>::new();
        map.insert(5, 2);
        map.reserve_widths(40, 20);
        assert_eq!((map.key_width(), map.value_width()), (40, 20));
        map.reserve_widths(8, 8);
        assert_eq!((map.key_width(), map.value_width()), (40, 20));
        map.insert(1 << 39, (1 << 20) - 1);
        assert_eq!((map.key_width(), map.value_width()), (40, 20));
        assert_eq!(map.get(5), Some(2));
        assert_eq!(map.get(1 << 39), Some((1 << 20) - 1));
    }

    #[test]
    #[should_panic(expected = "limited to 64 bits")]
    fn reserving_overwide_fields_panics() {
        <CompactHashMap>::new().reserve_widths(65, 1);
    }
}
