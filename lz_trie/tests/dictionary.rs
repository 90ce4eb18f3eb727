#![allow(missing_docs)] // test only
use std::collections::HashMap;

use compact_hash::{
    BucketedStorage, CvIndex, DisplacementIndex, EliasGammaDisplacement, FixedDisplacement,
    FlatStorage, IndexStructure, LayeredDisplacement, Storage, TableConfig,
};
use lz_trie::{lz78, lzw, CompactHashTrie, FactorId, LzTrie, TrieNode};
use rand::prelude::*;

fn rng(seed: u64) -> rand_pcg::Pcg64 {
    rand_pcg::Pcg64::seed_from_u64(seed)
}

/// Text with plenty of repetitions: random runs over a small alphabet mixed with copies of
/// earlier parts.
fn repetitive_text(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    let mut text = Vec::with_capacity(len);
    while text.len() < len {
        if text.len() > 16 && rng.gen_bool(0.6) {
            let start = rng.gen_range(0..text.len() - 8);
            let copy_len = rng.gen_range(1..(text.len() - start).min(64));
            for i in 0..copy_len {
                text.push(text[start + i]);
            }
        } else {
            for _ in 0..rng.gen_range(1..8) {
                text.push(b"acgt"[rng.gen_range(0..4)]);
            }
        }
    }
    text.truncate(len);
    text
}

fn trie_density<S: Storage, I: IndexStructure>() {
    lzdict_logger::test_setup("debug");
    let mut rng = rng(7);
    for lzw in [false, true] {
        let mut trie = if lzw {
            CompactHashTrie::<S, I>::lzw(TableConfig::default()).unwrap()
        } else {
            CompactHashTrie::<S, I>::lz78(TableConfig::default()).unwrap()
        };
        let initial_size = trie.size();
        assert_eq!(initial_size, if lzw { 256 } else { 1 });

        let mut model: HashMap<(FactorId, u8), FactorId> = HashMap::new();
        let mut next_id = initial_size as FactorId;
        for _ in 0..20000 {
            let parent = TrieNode::existing(rng.gen_range(0..next_id));
            let symbol = rng.gen_range(0..16u8);
            let node = trie.find_or_insert(parent, symbol);
            match model.get(&(parent.id, symbol)) {
                Some(&id) => assert_eq!(node, TrieNode::existing(id)),
                None => {
                    assert_eq!(node, TrieNode { id: next_id, is_new: true });
                    model.insert((parent.id, symbol), next_id);
                    next_id += 1;
                }
            }
            assert_eq!(trie.size() as FactorId, next_id);
        }
        assert_eq!(trie.size(), initial_size + model.len());

        trie.clear();
        assert_eq!(trie.size(), initial_size);
        let root = trie.get_rootnode(0);
        assert_eq!(root.id, 0);
        let node = trie.find_or_insert(root, 1);
        assert_eq!(node, TrieNode { id: initial_size as FactorId, is_new: true });
    }
}

fn lz78_round_trips<S: Storage, I: IndexStructure>() {
    let mut rng = rng(78);
    let texts = [
        vec![],
        b"a".to_vec(),
        b"abracadabra abracadabra".to_vec(),
        vec![0; 5000],
        repetitive_text(&mut rng, 50000),
        (0..20000).map(|_| rng.gen()).collect(),
    ];
    for text in &texts {
        for max_dict_size in [None, Some(2), Some(100), Some(4096)] {
            let mut trie = CompactHashTrie::<S, I>::lz78(TableConfig::default()).unwrap();
            let factors = lz78::factorize(&mut trie, text, max_dict_size);
            if let Some(max) = max_dict_size {
                assert!(trie.size() < max.max(2));
            }
            assert_eq!(&lz78::decode(&factors, max_dict_size).unwrap(), text);
        }
    }
}

fn lzw_round_trips<S: Storage, I: IndexStructure>() {
    let mut rng = rng(84);
    let texts = [
        vec![],
        b"a".to_vec(),
        b"TOBEORNOTTOBEORTOBEORNOT".to_vec(),
        vec![7; 5000],
        repetitive_text(&mut rng, 50000),
        (0..20000).map(|_| rng.gen()).collect(),
    ];
    for text in &texts {
        for max_dict_size in [None, Some(257), Some(300), Some(4096)] {
            let mut trie = CompactHashTrie::<S, I>::lzw(TableConfig::default()).unwrap();
            let factors = lzw::factorize(&mut trie, text, max_dict_size);
            if let Some(max) = max_dict_size {
                assert!(trie.size() < max);
                assert!(factors.iter().all(|&factor| factor < max as FactorId));
            }
            assert_eq!(&lzw::decode(&factors, max_dict_size).unwrap(), text);
        }
    }
}

/// All strategies must produce the same factors, as they only differ in how phrases are stored.
fn same_factors_as_reference<S: Storage, I: IndexStructure>() {
    let text = repetitive_text(&mut rng(3), 20000);
    let mut reference = <CompactHashTrie>::lzw(TableConfig::default()).unwrap();
    let mut trie = CompactHashTrie::<S, I>::lzw(TableConfig::default()).unwrap();
    assert_eq!(
        lzw::factorize(&mut trie, &text, Some(1000)),
        lzw::factorize(&mut reference, &text, Some(1000))
    );
}

macro_rules! strategy_tests {
    ($($name:ident: $storage:ty, $index:ty;)*) => {$(
        mod $name {
            use super::*;

            #[test]
            fn trie_density() {
                super::trie_density::<$storage, $index>();
            }

            #[test]
            fn lz78_round_trips() {
                super::lz78_round_trips::<$storage, $index>();
            }

            #[test]
            fn lzw_round_trips() {
                super::lzw_round_trips::<$storage, $index>();
            }

            #[test]
            fn same_factors_as_reference() {
                super::same_factors_as_reference::<$storage, $index>();
            }
        }
    )*};
}

strategy_tests! {
    sparse_cv: BucketedStorage, CvIndex;
    plain_cv: FlatStorage, CvIndex;
    sparse_layered: BucketedStorage, DisplacementIndex<LayeredDisplacement>;
    plain_layered: FlatStorage, DisplacementIndex<LayeredDisplacement>;
    sparse_elias: BucketedStorage, DisplacementIndex<EliasGammaDisplacement>;
    plain_elias: FlatStorage, DisplacementIndex<EliasGammaDisplacement>;
    sparse_fixed: BucketedStorage, DisplacementIndex<FixedDisplacement>;
    plain_fixed: FlatStorage, DisplacementIndex<FixedDisplacement>;
}

#[test]
fn dictionary_resets_bound_the_table() {
    let text = repetitive_text(&mut rng(11), 100000);
    let mut trie = <CompactHashTrie>::lz78(TableConfig::default().with_capacity(1024)).unwrap();
    let factors = lz78::factorize(&mut trie, &text, Some(500));
    assert!(trie.size() < 500);
    assert!(trie.table().capacity() <= 1024);
    assert_eq!(lz78::decode(&factors, Some(500)).unwrap(), text);
}

#[test]
#[should_panic(expected = "registered twice")]
fn duplicate_lzw_root() {
    let mut trie = <CompactHashTrie>::lzw(TableConfig::default()).unwrap();
    trie.add_rootnode(b'x');
}
