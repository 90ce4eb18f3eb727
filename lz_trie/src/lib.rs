//! LZ78 and LZW dictionaries stored in a compact hash table.
//!
//! A dictionary of phrases is a trie where every node extends its parent's phrase by one
//! byte. [`CompactHashTrie`] stores each edge as a single table entry, keyed by the parent id
//! and the byte, with the child's id as value. Ids are handed out densely in insertion order,
//! so a dictionary of `n` phrases uses exactly the ids `0..n`.
//!
//! The [`lz78`] and [`lzw`] modules factorize byte strings with any [`LzTrie`] and decode the
//! resulting factors again.
pub mod lz78;
pub mod lzw;
mod phrases;
pub mod trie;

use thiserror::Error;

pub use trie::{CompactHashTrie, FactorId, LzTrie, TrieNode};

/// Error when decoding a factor sequence.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// A factor refers to a phrase that is not in the dictionary.
    #[error("factor {index} refers past the end of a dictionary of {dictionary_size} phrases")]
    UnknownPhrase {
        /// The referenced phrase id.
        index: FactorId,
        /// Size of the dictionary when the factor was decoded.
        dictionary_size: usize,
    },
}
