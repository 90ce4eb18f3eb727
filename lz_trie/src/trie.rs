//! Trie dictionaries backed by a compact hash table.
use std::fmt;

use compact_hash::{
    BucketedStorage, CompactHashMap, ConfigError, CvIndex, IndexStructure, InvertibleHash,
    Storage, TableConfig, XorShiftMix,
};

/// Id of a dictionary phrase.
pub type FactorId = u64;

/// A node of a trie dictionary, as returned by its lookups.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TrieNode {
    /// Id of the phrase this node represents.
    pub id: FactorId,
    /// Whether the lookup that returned this node created it.
    pub is_new: bool,
}

impl TrieNode {
    /// Node for an already existing phrase.
    pub fn existing(id: FactorId) -> Self {
        Self { id, is_new: false }
    }
}

/// Operations an LZ-family compressor needs from its phrase dictionary.
pub trait LzTrie {
    /// Registers the root node for `symbol`, assigning it the next free id.
    ///
    /// Panics if `symbol` already has a root node.
    fn add_rootnode(&mut self, symbol: u8) -> TrieNode;

    /// Returns the root node registered for `symbol`.
    ///
    /// Panics if no root node was registered for `symbol`.
    fn get_rootnode(&self, symbol: u8) -> TrieNode;

    /// Returns the child of `parent` for `symbol`, creating it if absent.
    ///
    /// A created child receives the id [`size`][Self::size] returned before the call.
    fn find_or_insert(&mut self, parent: TrieNode, symbol: u8) -> TrieNode;

    /// Removes all phrases and registers the root nodes again with their original ids.
    fn clear(&mut self);

    /// Number of phrases, which is also the next id to be assigned.
    fn size(&self) -> usize;
}

/// Trie dictionary storing one table entry per edge.
///
/// A root node for `symbol` is stored under the key `symbol` and the child of the node with id
/// `p` for `symbol` under `((p + 1) << 8) | symbol`, so root and child keys never collide. The
/// stored value is the node's id plus one, which keeps zero free for the sentinel of flat
/// storage.
#[derive(Clone)]
pub struct CompactHashTrie<S = BucketedStorage, I = CvIndex, H = XorShiftMix> {
    table: CompactHashMap<S, I, H>,
    roots: Vec<u8>,
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> fmt::Debug for CompactHashTrie<S, I, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactHashTrie")
            .field("size", &self.size())
            .field("roots", &self.roots.len())
            .field("capacity", &self.table.capacity())
            .finish()
    }
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> CompactHashTrie<S, I, H> {
    /// Creates a trie without any root nodes.
    pub fn new(config: TableConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            table: CompactHashMap::with_config(config)?,
            roots: vec![],
        })
    }

    /// Creates a trie for LZ78, with the empty phrase as single root of id 0.
    ///
    /// The root is registered for symbol 0, which is how [`lz78`][crate::lz78] finds it.
    pub fn lz78(config: TableConfig) -> Result<Self, ConfigError> {
        let mut trie = Self::new(config)?;
        trie.add_rootnode(0);
        Ok(trie)
    }

    /// Creates a trie for LZW, with one root per byte value whose id equals that byte.
    pub fn lzw(config: TableConfig) -> Result<Self, ConfigError> {
        let mut trie = Self::new(config)?;
        for symbol in 0..=u8::MAX {
            trie.add_rootnode(symbol);
        }
        Ok(trie)
    }

    /// The underlying table.
    pub fn table(&self) -> &CompactHashMap<S, I, H> {
        &self.table
    }

    /// Heap memory used by the dictionary in bytes.
    pub fn heap_size(&self) -> usize {
        self.table.heap_size() + self.roots.capacity()
    }

    fn insert_node(&mut self, key: u64) -> TrieNode {
        let next_id = self.table.len() as u64;
        let (value, is_new) = self.table.get_or_insert_with(key, || next_id + 1);
        TrieNode {
            id: value - 1,
            is_new,
        }
    }
}

fn child_key(parent: FactorId, symbol: u8) -> u64 {
    debug_assert!(parent < 1 << 55, "phrase id {parent} out of range");
    ((parent + 1) << 8) | symbol as u64
}

impl<S: Storage, I: IndexStructure, H: InvertibleHash> LzTrie for CompactHashTrie<S, I, H> {
    fn add_rootnode(&mut self, symbol: u8) -> TrieNode {
        let node = self.insert_node(symbol as u64);
        assert!(node.is_new, "root node for symbol {symbol} registered twice");
        self.roots.push(symbol);
        node
    }

    fn get_rootnode(&self, symbol: u8) -> TrieNode {
        match self.table.get(symbol as u64) {
            Some(value) => TrieNode::existing(value - 1),
            None => panic!("no root node registered for symbol {symbol}"),
        }
    }

    #[inline]
    fn find_or_insert(&mut self, parent: TrieNode, symbol: u8) -> TrieNode {
        self.insert_node(child_key(parent.id, symbol))
    }

    fn clear(&mut self) {
        log::trace!(
            "resetting dictionary of {} phrases using {} bytes",
            self.size(),
            self.heap_size()
        );
        self.table.clear();
        for &symbol in &self.roots {
            let next_id = self.table.len() as u64;
            self.table.insert(symbol as u64, next_id + 1);
        }
    }

    fn size(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use compact_hash::{DisplacementIndex, FlatStorage, LayeredDisplacement};

    use super::*;

    #[test]
    fn roots_and_children() {
        let mut trie = <CompactHashTrie>::lz78(TableConfig::default()).unwrap();
        let root = trie.get_rootnode(0);
        assert_eq!(root, TrieNode::existing(0));

        let a = trie.find_or_insert(root, b'a');
        assert_eq!(a, TrieNode { id: 1, is_new: true });
        let b = trie.find_or_insert(root, b'b');
        assert_eq!(b, TrieNode { id: 2, is_new: true });
        let ab = trie.find_or_insert(a, b'b');
        assert_eq!(ab, TrieNode { id: 3, is_new: true });
        assert_eq!(trie.find_or_insert(root, b'a'), TrieNode::existing(1));
        assert_eq!(trie.find_or_insert(a, b'b'), TrieNode::existing(3));
        assert_eq!(trie.size(), 4);

        trie.clear();
        assert_eq!(trie.size(), 1);
        assert_eq!(trie.get_rootnode(0), root);
        assert_eq!(trie.find_or_insert(root, b'b'), TrieNode { id: 1, is_new: true });
    }

    #[test]
    fn lzw_roots_are_bytes() {
        let mut trie =
            CompactHashTrie::<FlatStorage, DisplacementIndex<LayeredDisplacement>>::lzw(
                TableConfig::default(),
            )
            .unwrap();
        assert_eq!(trie.size(), 256);
        for symbol in 0..=u8::MAX {
            assert_eq!(trie.get_rootnode(symbol).id, symbol as u64);
        }
        let node = trie.find_or_insert(trie.get_rootnode(0), 0);
        assert_eq!(node, TrieNode { id: 256, is_new: true });
        trie.clear();
        assert_eq!(trie.size(), 256);
        assert_eq!(trie.get_rootnode(255).id, 255);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_root() {
        let mut trie = <CompactHashTrie>::lz78(TableConfig::default()).unwrap();
        trie.add_rootnode(0);
    }

    #[test]
    #[should_panic(expected = "no root node")]
    fn missing_root() {
        let trie = <CompactHashTrie>::lz78(TableConfig::default()).unwrap();
        trie.get_rootnode(1);
    }
}
