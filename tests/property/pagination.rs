//! Paged directory listings over layered sources

use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use veneer::{LayeredFileSystem, MemorySource, Node};

fn source(names: &BTreeSet<String>) -> MemorySource {
    let mut source = MemorySource::new();
    for name in names {
        source.insert(&format!("dir/{}", name), name.as_bytes());
    }
    source
}

fn layered(primary: &BTreeSet<String>, fallback: &BTreeSet<String>) -> LayeredFileSystem {
    LayeredFileSystem::from_sources(Arc::new(source(primary)), Arc::new(source(fallback)))
}

fn drain(dir: &mut Box<dyn Node>, page: Option<usize>) -> Vec<String> {
    let mut all = Vec::new();
    loop {
        let batch = dir.read_entries(page).unwrap();
        if batch.is_empty() {
            return all;
        }
        all.extend(batch.into_iter().map(|e| e.name));
    }
}

fn names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-f]{1,2}", 1..12)
}

/// A first page of `k` followed by an unbounded read lists the same names, in
/// the same order, as one unbounded read.
#[test]
fn test_split_listing_equals_full_listing() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(names(), names(), 1usize..16), |(primary, fallback, k)| {
            let fs = layered(&primary, &fallback);
            let full = drain(&mut fs.open("dir").unwrap(), None);

            let mut dir = fs.open("dir").unwrap();
            let mut split: Vec<String> = dir
                .read_entries(Some(k))
                .unwrap()
                .into_iter()
                .map(|e| e.name)
                .collect();
            prop_assert!(split.len() <= k);
            split.extend(drain(&mut dir, None));

            prop_assert_eq!(split, full);
            Ok(())
        })
        .unwrap();
}

/// Every name in any layer appears exactly once, primary names first.
#[test]
fn test_listing_is_union_without_duplicates() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(names(), names(), 1usize..5), |(primary, fallback, page)| {
            let fs = layered(&primary, &fallback);
            let listed = drain(&mut fs.open("dir").unwrap(), Some(page));

            let unique: BTreeSet<String> = listed.iter().cloned().collect();
            prop_assert_eq!(unique.len(), listed.len());
            let union: BTreeSet<String> = primary.union(&fallback).cloned().collect();
            prop_assert_eq!(&unique, &union);

            let head: Vec<String> = primary.iter().cloned().collect();
            prop_assert_eq!(&listed[..primary.len()], head.as_slice());
            Ok(())
        })
        .unwrap();
}
