//! LZ78 factorization.
//!
//! Every factor names the longest dictionary phrase that prefixes the remaining input,
//! followed by the byte after it, and the concatenation of both becomes a new phrase.
use crate::{phrases::Phrases, DecodeError, FactorId, LzTrie};

/// An LZ78 factor, the phrase `index` extended by `literal`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Lz78Factor {
    /// Id of the referenced phrase, 0 for the empty phrase.
    pub index: FactorId,
    /// Byte following the referenced phrase.
    pub literal: u8,
}

/// Factorizes `input` using `trie`, which must contain a single root for symbol 0 with id 0.
///
/// When the dictionary reaches `max_dict_size` phrases, it is cleared. The last factor may
/// repeat an existing phrase when the input ends inside one.
pub fn factorize(
    trie: &mut impl LzTrie,
    input: &[u8],
    max_dict_size: Option<usize>,
) -> Vec<Lz78Factor> {
    let root = trie.get_rootnode(0);
    let mut factors = vec![];
    let mut resets = 0usize;
    let mut node = root;
    let mut pending = None;

    for &literal in input {
        let child = trie.find_or_insert(node, literal);
        if child.is_new {
            factors.push(Lz78Factor {
                index: node.id,
                literal,
            });
            if max_dict_size.is_some_and(|max| trie.size() >= max) {
                trie.clear();
                resets += 1;
            }
            node = root;
            pending = None;
        } else {
            pending = Some(Lz78Factor {
                index: node.id,
                literal,
            });
            node = child;
        }
    }
    factors.extend(pending);

    log::debug!(
        "lz78: {} bytes in {} factors, {} dictionary resets",
        input.len(),
        factors.len(),
        resets
    );
    factors
}

/// Decodes factors produced by [`factorize`] with the same `max_dict_size`.
pub fn decode(
    factors: &[Lz78Factor],
    max_dict_size: Option<usize>,
) -> Result<Vec<u8>, DecodeError> {
    let mut phrases = Phrases::with_empty_root();
    let mut output = vec![];
    for factor in factors {
        let index = phrases.check(factor.index)?;
        phrases.expand_into(index, &mut output);
        output.push(factor.literal);
        phrases.push(index, factor.literal);
        phrases.reset_if_full(max_dict_size);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use compact_hash::TableConfig;

    use super::*;
    use crate::CompactHashTrie;

    fn factor(index: FactorId, literal: u8) -> Lz78Factor {
        Lz78Factor { index, literal }
    }

    #[test]
    fn small_factorization() {
        let mut trie = <CompactHashTrie>::lz78(TableConfig::default()).unwrap();
        let factors = factorize(&mut trie, b"aaab", None);
        assert_eq!(factors, [factor(0, b'a'), factor(1, b'a'), factor(0, b'b')]);
        assert_eq!(trie.size(), 4);
        assert_eq!(decode(&factors, None).unwrap(), b"aaab");
    }

    #[test]
    fn input_ending_inside_a_phrase() {
        let mut trie = <CompactHashTrie>::lz78(TableConfig::default()).unwrap();
        let factors = factorize(&mut trie, b"abaab", None);
        assert_eq!(
            factors,
            [factor(0, b'a'), factor(0, b'b'), factor(1, b'a'), factor(0, b'b')]
        );
        assert_eq!(trie.size(), 4);
        assert_eq!(decode(&factors, None).unwrap(), b"abaab");
    }

    #[test]
    fn unknown_phrase() {
        assert_eq!(
            decode(&[factor(0, b'x'), factor(2, b'y')], None),
            Err(DecodeError::UnknownPhrase {
                index: 2,
                dictionary_size: 2
            })
        );
    }
}
