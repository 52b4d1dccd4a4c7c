//! # Hash Index
//!
//! Open-addressed hash index over row numbers. The index stores no keys of
//! its own: every slot is a bare `u32` row number, and all key extraction,
//! equality and hashing go through the index's [`HashKey`] adapter against
//! the table's row store.
//!
//! ## Slot States
//!
//! ```text
//! Slot value          Meaning
//! ----------          -------
//! u32::MAX            empty - probing stops here
//! u32::MAX - 1        tombstone - probing continues past here
//! anything else       occupied, holds a row number
//! ```
//!
//! The slot array length is always a power of two; a probe of hash `h`
//! starts at bucket `h & (len - 1)` and walks linearly with wrap-around.
//!
//! ## Tombstones and Rehash
//!
//! Erasure writes a tombstone rather than disturbing probe chains. Before
//! an insert, if occupied slots + tombstones + the incoming entry would
//! reach three quarters of the array, the index rehashes. The new length is
//! sized to the *live* entry count only:
//!
//! ```text
//! new_len = smallest power of two (>= 4) with new_len * 3/4 >= live + 1
//! ```
//!
//! so a churn-heavy workload sheds its tombstones without growing, and the
//! array shrinks back once live occupancy no longer justifies its size. An
//! insert/erase cycle repeated a million times holds capacity below 10.
//!
//! Rehash walks occupied slots only and re-derives each row's hash through
//! the adapter; tombstones are dropped.

use eyre::{ensure, Result};
use tracing::trace;

use crate::index::{ProbeIndex, TableIndex};
use crate::keys::{HashKey, IndexKey};

const EMPTY: u32 = u32::MAX;
const TOMBSTONE: u32 = u32::MAX - 1;

/// Open-addressed index of row numbers, keyed through adapter `K`.
#[derive(Clone, Debug, Default)]
pub struct HashIndex<K> {
    adapter: K,
    slots: Vec<u32>,
    occupied: u32,
    tombstones: u32,
}

impl<K> HashIndex<K> {
    pub fn new(adapter: K) -> Self {
        Self {
            adapter,
            slots: Vec::new(),
            occupied: 0,
            tombstones: 0,
        }
    }

    /// Number of rows registered.
    pub fn len(&self) -> usize {
        self.occupied as usize
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Current slot array length.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Register row `pos` under `probe`. Returns the existing row number if
    /// the key is already present; the index is unchanged in that case.
    pub fn insert<R>(&mut self, rows: &[R], pos: u32, probe: K::Probe<'_>) -> Result<(), u32>
    where
        K: HashKey<R>,
    {
        let needed = (self.occupied + self.tombstones + 1) as usize;
        if needed * 4 >= self.slots.len() * 3 {
            self.rehash(rows, self.occupied as usize + 1);
        }

        let mask = self.slots.len() - 1;
        let mut i = self.adapter.hash(probe) as usize & mask;
        let mut tombstone: Option<usize> = None;
        loop {
            match self.slots[i] {
                EMPTY => {
                    if let Some(t) = tombstone {
                        self.slots[t] = pos;
                        self.tombstones -= 1;
                    } else {
                        self.slots[i] = pos;
                    }
                    self.occupied += 1;
                    return Ok(());
                }
                TOMBSTONE => {
                    if tombstone.is_none() {
                        tombstone = Some(i);
                    }
                }
                other => {
                    if self.adapter.matches(&rows[other as usize], probe) {
                        return Err(other);
                    }
                }
            }
            i = (i + 1) & mask;
        }
    }

    /// Row number matching `probe`, if any. Never allocates.
    pub fn find<R>(&self, rows: &[R], probe: K::Probe<'_>) -> Option<u32>
    where
        K: HashKey<R>,
    {
        if self.slots.is_empty() {
            return None;
        }
        let mask = self.slots.len() - 1;
        let mut i = self.adapter.hash(probe) as usize & mask;
        loop {
            match self.slots[i] {
                EMPTY => return None,
                TOMBSTONE => {}
                other => {
                    if self.adapter.matches(&rows[other as usize], probe) {
                        return Some(other);
                    }
                }
            }
            i = (i + 1) & mask;
        }
    }

    /// Remove row `pos`. The slot is located by row number; `probe` is only
    /// consulted for its hash, so the row store itself is not read.
    pub fn erase<R>(&mut self, rows: &[R], pos: u32, probe: K::Probe<'_>)
    where
        K: HashKey<R>,
    {
        debug_assert!(rows
            .get(pos as usize)
            .map_or(true, |row| self.adapter.matches(row, probe)));
        debug_assert!(!self.slots.is_empty());

        let mask = self.slots.len() - 1;
        let mut i = self.adapter.hash(probe) as usize & mask;
        loop {
            match self.slots[i] {
                p if p == pos => {
                    self.slots[i] = TOMBSTONE;
                    self.tombstones += 1;
                    self.occupied -= 1;
                    return;
                }
                EMPTY => {
                    debug_assert!(false, "row {pos} not present in hash index");
                    return;
                }
                _ => {}
            }
            i = (i + 1) & mask;
        }
    }

    /// Renumber `old` to `new`; the relocated row now lives at `rows[new]`.
    pub fn move_row<R>(&mut self, rows: &[R], old: u32, new: u32)
    where
        K: HashKey<R>,
    {
        let probe = self.adapter.key(&rows[new as usize]);
        let mask = self.slots.len() - 1;
        let mut i = self.adapter.hash(probe) as usize & mask;
        loop {
            match self.slots[i] {
                p if p == old => {
                    self.slots[i] = new;
                    return;
                }
                EMPTY => {
                    debug_assert!(false, "row {old} not present in hash index");
                    return;
                }
                _ => {}
            }
            i = (i + 1) & mask;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.occupied = 0;
        self.tombstones = 0;
    }

    /// Size the slot array for `total` live rows, rehashing current entries.
    pub fn reserve<R>(&mut self, rows: &[R], total: usize)
    where
        K: HashKey<R>,
    {
        if total * 4 >= self.slots.len() * 3 {
            let live = total.max(self.occupied as usize + 1);
            self.rehash(rows, live);
        }
    }

    fn rehash<R>(&mut self, rows: &[R], live: usize)
    where
        K: HashKey<R>,
    {
        let mut len = 4usize;
        while len * 3 < live * 4 {
            len <<= 1;
        }
        trace!(
            old_len = self.slots.len(),
            new_len = len,
            dropped = self.tombstones,
            "hash index rehash"
        );

        let old = std::mem::replace(&mut self.slots, vec![EMPTY; len]);
        self.tombstones = 0;
        let mask = len - 1;
        for slot in old {
            if slot == EMPTY || slot == TOMBSTONE {
                continue;
            }
            let probe = self.adapter.key(&rows[slot as usize]);
            let mut i = self.adapter.hash(probe) as usize & mask;
            while self.slots[i] != EMPTY {
                i = (i + 1) & mask;
            }
            self.slots[i] = slot;
        }
    }
}

impl<R, K: HashKey<R>> TableIndex<R> for HashIndex<K> {
    fn insert_row(&mut self, rows: &[R], pos: u32) -> Result<(), u32> {
        let probe = self.adapter.key(&rows[pos as usize]);
        self.insert(rows, pos, probe)
    }

    fn erase_row(&mut self, rows: &[R], pos: u32) {
        let probe = self.adapter.key(&rows[pos as usize]);
        self.erase(rows, pos, probe);
    }

    fn move_row(&mut self, rows: &[R], old: u32, new: u32) {
        self.move_row(rows, old, new);
    }

    fn clear(&mut self) {
        self.clear();
    }

    fn reserve(&mut self, rows: &[R], total: usize) {
        self.reserve(rows, total);
    }

    fn check(&self, rows: &[R]) -> Result<()> {
        ensure!(
            self.occupied as usize == rows.len(),
            "hash index holds {} rows, table has {}",
            self.occupied,
            rows.len()
        );
        if !self.slots.is_empty() {
            let used = (self.occupied + self.tombstones) as usize;
            ensure!(
                used * 4 < self.slots.len() * 3,
                "hash index load factor exceeded: {} of {} slots used",
                used,
                self.slots.len()
            );
        }
        let mut seen = 0usize;
        for &slot in &self.slots {
            if slot == EMPTY || slot == TOMBSTONE {
                continue;
            }
            ensure!(
                (slot as usize) < rows.len(),
                "hash index references row {} beyond table of {}",
                slot,
                rows.len()
            );
            seen += 1;
        }
        ensure!(
            seen == self.occupied as usize,
            "hash index occupancy count drifted: counted {}, recorded {}",
            seen,
            self.occupied
        );
        Ok(())
    }
}

impl<R, K: HashKey<R>> ProbeIndex<R> for HashIndex<K> {
    type Probe<'p> = K::Probe<'p>;

    fn find_row(&self, rows: &[R], probe: Self::Probe<'_>) -> Option<u32> {
        self.find(rows, probe)
    }
}
