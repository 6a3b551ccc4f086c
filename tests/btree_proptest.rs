//! Property tests: the tree behaves like a `BTreeMap` of first-inserted
//! values.

use std::collections::BTreeMap;

use proptest::prelude::*;
use tempfile::tempdir;
use yase_btree::{BTree, BTreeOptions, Entry};

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        // short keys over a tiny alphabet share long prefixes
        prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c']), 0..12),
        prop::collection::vec(any::<u8>(), 0..40),
        prop::collection::vec(Just(b'q'), 200..=254),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_inserts_match_btreemap(
        ops in prop::collection::vec((key_strategy(), any::<u64>(), any::<u64>()), 1..300),
        key_limit in 4usize..12,
    ) {
        let dir = tempdir().unwrap();
        let options = BTreeOptions::default().with_max_key_count(key_limit);
        let mut tree = BTree::create(dir.path().join("prop.btree"), options).unwrap();
        let mut model = BTreeMap::new();

        for (key, value, count) in &ops {
            let fresh = !model.contains_key(key);
            if fresh {
                model.insert(key.clone(), (*value, *count));
            }
            prop_assert_eq!(tree.insert(key, *value, *count).unwrap(), fresh);
        }

        let report = tree.check_integrity().unwrap();
        prop_assert_eq!(report.entries, model.len() as u64);

        let scanned: Vec<(Vec<u8>, (u64, u64))> = tree
            .iter()
            .map(|e| e.map(|e| (e.key, (e.value, e.doc_count))).unwrap())
            .collect();
        let expected: Vec<(Vec<u8>, (u64, u64))> = model.clone().into_iter().collect();
        prop_assert_eq!(scanned, expected);

        for (key, (value, count)) in &model {
            let entry = tree.get(key).unwrap().unwrap();
            prop_assert_eq!((entry.value, entry.doc_count), (*value, *count));
        }
    }

    #[test]
    fn prop_bulk_build_matches_sorted_input(
        keys in prop::collection::btree_set(key_strategy(), 0..400),
        key_limit in 4usize..10,
        start in key_strategy(),
    ) {
        let dir = tempdir().unwrap();
        let options = BTreeOptions::default().with_max_key_count(key_limit);
        let records: Vec<Entry> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| Entry::new(k.clone(), i as u64, (i % 3) as u64))
            .collect();
        let tree = BTree::build_from_sorted(dir.path().join("bulk.btree"), records.clone(), options).unwrap();

        tree.check_integrity().unwrap();
        let all: Vec<Entry> = tree.iter().map(|e| e.unwrap()).collect();
        prop_assert_eq!(&all, &records);

        let tail: Vec<Entry> = tree.iter_from(&start).map(|e| e.unwrap()).collect();
        let expected: Vec<Entry> = records.into_iter().filter(|r| r.key >= start).collect();
        prop_assert_eq!(tail, expected);
    }
}
