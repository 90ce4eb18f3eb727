//! Set front-end over the compact hash table.
use std::{
    fmt,
    io::{self, Read, Write},
};

use crate::{
    config::TableConfig,
    error::{ConfigError, DeserializeError},
    hash::{InvertibleHash, XorShiftMix},
    index::{CvIndex, IndexStructure},
    map::CompactHashMap,
    storage::{BucketedStorage, Storage},
};

/// Set of `u64` keys storing only the quotient of each hashed key.
///
/// This is a [`CompactHashMap`] whose values have zero width. Every key is stored with the value
/// `0`, so with [`FlatStorage`] an empty value of `0` is replaced by `1`.
///
/// [`FlatStorage`]: crate::storage::FlatStorage
#[derive(Clone)]
pub struct CompactHashSet<S = BucketedStorage, I = CvIndex, H = XorShiftMix> {
    table: CompactHashMap<S, I, H>,
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> Default for CompactHashSet<S, I, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> fmt::Debug for CompactHashSet<S, I, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        self.table.for_each(|key, _| {
            set.entry(&key);
        });
        set.finish()
    }
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> CompactHashSet<S, I, H> {
    /// Creates an empty set.
    pub fn new() -> Self {
        match Self::with_config(TableConfig::default()) {
            Ok(set) => set,
            Err(err) => unreachable!("default configuration is valid: {err}"),
        }
    }

    /// Creates an empty set with the given configuration, ignoring its value width.
    ///
    /// An empty value of `0` is replaced by `1`, as `0` is the value of every stored key.
    pub fn with_config(config: TableConfig) -> Result<Self, ConfigError> {
        let config = TableConfig {
            value_width: 0,
            empty_value: if config.empty_value == 0 {
                1
            } else {
                config.empty_value
            },
            ..config
        };
        Ok(Self {
            table: CompactHashMap::with_config(config)?,
        })
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set has no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns `true` if `key` is present.
    pub fn contains(&self, key: u64) -> bool {
        self.table.contains_key(key)
    }

    /// Adds `key`, returning `true` if it was not present before.
    pub fn insert(&mut self, key: u64) -> bool {
        self.table.get_or_insert_with(key, || 0).1
    }

    /// Same as [`insert`](CompactHashSet::insert) but reports whether the key was found.
    pub fn lookup_insert(&mut self, key: u64) -> bool {
        !self.insert(key)
    }

    /// Removes `key`, returning `true` if it was present.
    pub fn remove(&mut self, key: u64) -> bool {
        self.table.remove(key).is_some()
    }

    /// Removes every key and restores the configured capacity and key width.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Calls `f` for every key.
    pub fn for_each(&self, mut f: impl FnMut(u64)) {
        self.table.for_each(|key, _| f(key));
    }

    /// Collects all keys into a vector, in table order.
    pub fn keys(&self) -> Vec<u64> {
        let mut keys = Vec::with_capacity(self.len());
        self.for_each(|key| keys.push(key));
        keys
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Current key width in bits.
    pub fn key_width(&self) -> u32 {
        self.table.key_width()
    }

    /// Heap memory in bytes.
    pub fn heap_size(&self) -> usize {
        self.table.heap_size()
    }

    /// Appends the serialized set to `writer`, in the format of [`CompactHashMap::write_to`].
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        self.table.write_to(writer)
    }

    /// Reads a set serialized by [`write_to`](CompactHashSet::write_to).
    pub fn read_from(reader: &mut impl Read) -> Result<Self, DeserializeError> {
        let table = CompactHashMap::read_from(reader)?;
        if table.value_width() != 0 {
            return Err(DeserializeError::Width {
                what: "set value",
                width: table.value_width(),
            });
        }
        Ok(Self { table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_only() {
        let mut set = <CompactHashSet>::new();
        assert!(set.insert(5));
        assert!(!set.insert(5));
        assert!(set.lookup_insert(5));
        assert!(!set.lookup_insert(6));
        assert!(set.contains(6));
        assert_eq!(set.table.slot_widths().value, 0);
        assert!(set.remove(5));
        assert!(!set.contains(5));
        assert_eq!(set.keys(), vec![6]);
    }

    #[test]
    fn flat_empty_value_avoids_zero() {
        use crate::storage::FlatStorage;

        let set = CompactHashSet::<FlatStorage>::new();
        assert_eq!(set.table.storage().empty_value(), 1);
        let config = TableConfig::default().with_empty_value(7);
        let set = CompactHashSet::<FlatStorage>::with_config(config).unwrap();
        assert_eq!(set.table.storage().empty_value(), 7);
    }
}
