//! Fuzz testing for multi-index table operations.
//!
//! Applies an arbitrary operation sequence to a table carrying a tree
//! index and an insertion-order index, with a BTreeSet as the reference
//! model. Every index invariant is re-verified after each mutation.

#![no_main]

use std::collections::BTreeSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use rowdex::{InsertionOrderIndex, Table, TreeIndex, U32Key};

#[derive(Debug, Arbitrary)]
enum Operation {
    Insert(u32),
    EraseValue(u32),
    EraseAt(u16),
    Find(u32),
    Range(u32, u32),
    Clear,
}

fuzz_target!(|operations: Vec<Operation>| {
    let mut table: Table<u32, (TreeIndex<U32Key>, InsertionOrderIndex)> =
        Table::new((TreeIndex::new(U32Key), InsertionOrderIndex::new()));
    let mut model: BTreeSet<u32> = BTreeSet::new();

    for op in operations {
        match op {
            Operation::Insert(value) => {
                let fresh = model.insert(value);
                assert_eq!(table.insert(value).is_ok(), fresh);
            }
            Operation::EraseValue(value) => {
                let had = model.remove(&value);
                assert_eq!(table.erase_match(value).is_some(), had);
            }
            Operation::EraseAt(raw) => {
                if !table.is_empty() {
                    let pos = raw as usize % table.len();
                    let gone = table.erase_at(pos);
                    assert!(model.remove(&gone));
                }
            }
            Operation::Find(value) => {
                assert_eq!(table.find(value).is_some(), model.contains(&value));
            }
            Operation::Range(a, b) => {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                let got: Vec<u32> = table.range(lo, hi).copied().collect();
                let want: Vec<u32> = model.range(lo..hi).copied().collect();
                assert_eq!(got, want);
            }
            Operation::Clear => {
                table.clear();
                model.clear();
            }
        }

        assert_eq!(table.len(), model.len());
        table.verify().unwrap();

        let ordered: Vec<u32> = table.ordered().copied().collect();
        let expect: Vec<u32> = model.iter().copied().collect();
        assert_eq!(ordered, expect);
    }
});
