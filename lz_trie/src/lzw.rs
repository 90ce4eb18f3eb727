//! LZW factorization.
//!
//! The dictionary starts with every single byte, using the byte value as id. Every factor
//! names the longest dictionary phrase that prefixes the remaining input, and that phrase
//! extended by the next byte becomes a new phrase.
use crate::{phrases::Phrases, DecodeError, FactorId, LzTrie};

/// Factorizes `input` using `trie`, which must contain a root for every byte with the byte as id.
///
/// When the dictionary reaches `max_dict_size` phrases, it is cleared.
pub fn factorize(
    trie: &mut impl LzTrie,
    input: &[u8],
    max_dict_size: Option<usize>,
) -> Vec<FactorId> {
    let Some((&first, rest)) = input.split_first() else {
        return vec![];
    };
    let mut factors = vec![];
    let mut resets = 0usize;
    let mut node = trie.get_rootnode(first);

    for &symbol in rest {
        let child = trie.find_or_insert(node, symbol);
        if child.is_new {
            factors.push(node.id);
            if max_dict_size.is_some_and(|max| trie.size() >= max) {
                trie.clear();
                resets += 1;
            }
            node = trie.get_rootnode(symbol);
        } else {
            node = child;
        }
    }
    factors.push(node.id);

    log::debug!(
        "lzw: {} bytes in {} factors, {} dictionary resets",
        input.len(),
        factors.len(),
        resets
    );
    factors
}

/// Decodes factors produced by [`factorize`] with the same `max_dict_size`.
pub fn decode(factors: &[FactorId], max_dict_size: Option<usize>) -> Result<Vec<u8>, DecodeError> {
    let mut phrases = Phrases::with_byte_roots();
    let mut output = vec![];
    let mut previous: Option<usize> = None;
    for &factor in factors {
        let start = output.len();
        let index = match (phrases.check(factor), previous) {
            (Ok(index), _) => {
                phrases.expand_into(index, &mut output);
                index
            }
            // The factor names the phrase that is only added below, which is the previous
            // phrase extended by its own first byte.
            (Err(_), Some(previous)) if factor == phrases.len() as FactorId => {
                phrases.expand_into(previous, &mut output);
                output.push(output[start]);
                factor as usize
            }
            (Err(err), _) => return Err(err),
        };
        if let Some(previous) = previous {
            phrases.push(previous, output[start]);
            phrases.reset_if_full(max_dict_size);
        }
        previous = Some(index);
    }
    Ok(output)
}
