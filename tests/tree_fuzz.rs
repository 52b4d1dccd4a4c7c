//! # Tree Index Fuzz
//!
//! Randomly mutates a tree-indexed table to hunt for buggy state
//! transitions, verifying every structural invariant after each operation.
//! The seed comes from wall time and is printed so a failure can be
//! replayed.

use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rowdex::{Table, TreeIndex, U32Key};

fn seeded_rng() -> StdRng {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed);
    eprintln!("tree fuzz seed: {seed}");
    StdRng::seed_from_u64(seed)
}

#[test]
fn randomized_mutations_keep_every_invariant() {
    let mut rng = seeded_rng();
    let mut table: Table<u32, (TreeIndex<U32Key>,)> = Table::new((TreeIndex::new(U32Key),));
    let mut mirror: HashSet<u32> = HashSet::new();

    type FuzzTable = Table<u32, (TreeIndex<U32Key>,)>;

    fn random_insert(table: &mut FuzzTable, mirror: &mut HashSet<u32>, rng: &mut StdRng) {
        let value = rng.gen::<u32>();
        table.upsert(value, |_, _| {});
        mirror.insert(value);
    }
    fn random_erase(table: &mut FuzzTable, mirror: &mut HashSet<u32>, rng: &mut StdRng) {
        if !table.is_empty() {
            let pos = rng.gen_range(0..table.len());
            let gone = table.erase_at(pos);
            assert!(mirror.remove(&gone));
        }
    }
    fn random_lookup(table: &FuzzTable, rng: &mut StdRng) {
        if !table.is_empty() {
            let pos = rng.gen_range(0..table.len());
            let value = table.rows()[pos];
            assert_eq!(table.find(value), Some(&table.rows()[pos]));
        }
    }

    // First pass: twice as many insertions as erasures.
    for _ in 0..1000 {
        match rng.gen_range(0..4) {
            0 | 1 => random_insert(&mut table, &mut mirror, &mut rng),
            2 => random_erase(&mut table, &mut mirror, &mut rng),
            _ => random_lookup(&table, &mut rng),
        }
        table.verify().unwrap();
        assert_eq!(table.len(), mirror.len());
    }

    // Second pass: twice as many erasures as insertions.
    for _ in 0..1000 {
        match rng.gen_range(0..4) {
            0 => random_insert(&mut table, &mut mirror, &mut rng),
            1 | 2 => random_erase(&mut table, &mut mirror, &mut rng),
            _ => random_lookup(&table, &mut rng),
        }
        table.verify().unwrap();
        assert_eq!(table.len(), mirror.len());
    }

    // Drain what's left; the tree must come back to a clean empty state.
    while !table.is_empty() {
        let gone = table.erase_at(table.len() - 1);
        assert!(mirror.remove(&gone));
        table.verify().unwrap();
    }
    assert!(mirror.is_empty());
    assert_eq!(table.ordered().next(), None);
}
