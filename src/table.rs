//! # Table Coordinator
//!
//! A [`Table`] owns a dense row store (`Vec<R>`) and a tuple of indexes
//! declared at construction. Every mutation fans out to every index in
//! declared order; lookups go to one index, chosen by position or by type.
//!
//! ## Row Numbers and Swap-Erase
//!
//! Rows are addressed by dense `u32` row numbers. Erasure swap-removes:
//! the last row relocates into the vacated slot and every index is told to
//! renumber it. Row numbers and row references are therefore only stable
//! until the next mutation, and plain iteration (`iter()`, `rows()`) walks
//! row-number order, which equals insertion order only until the first
//! erase scrambles it. Ordered iteration goes through an ordered index.
//!
//! ## Transactional Insert
//!
//! ```text
//! insert(row):
//!   1. append row to the store, making row number n
//!   2. register n with each index, in declared order
//!   3. a duplicate in any index rolls the earlier registrations back
//!      in reverse order, pops the row, and reports the error;
//!      the table is byte-identical to its pre-insert state
//! ```
//!
//! `upsert` turns the duplicate into a merge-callback invocation and
//! `find_or_create` builds the row lazily; both share the same rollback
//! path underneath.
//!
//! ## Example
//!
//! ```
//! use rowdex::{HashIndex, StrKey, Table};
//!
//! let mut table = Table::new((HashIndex::new(StrKey),));
//! table.insert("foo".to_string())?;
//! table.insert("bar".to_string())?;
//!
//! assert_eq!(table.find("bar"), Some(&"bar".to_string()));
//! assert!(table.insert("foo".to_string()).is_err());
//! assert_eq!(table.len(), 2);
//! # Ok::<(), eyre::Report>(())
//! ```

use eyre::{bail, ensure, Result};
use tracing::debug;

use crate::index::{GetIndex, IndexAt, IndexTuple, Nth, OrderedIndex, Probe, ProbeIndex, RangedIndex};

/// Row numbers must stay clear of the hash index sentinels.
const MAX_ROWS: usize = (u32::MAX - 2) as usize;

/// Multi-index table: rows stored once, reachable through every index in
/// `I` (a tuple of index values).
#[derive(Clone, Debug)]
pub struct Table<R, I> {
    rows: Vec<R>,
    indexes: I,
}

impl<R, I: Default> Default for Table<R, I> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            indexes: I::default(),
        }
    }
}

impl<R, I> Table<R, I> {
    /// A table indexed by the given tuple of indexes. Lookups address them
    /// by position (`find_at::<N>`) or by type (`find_by::<Ix, _>`);
    /// position 0 is the default.
    pub fn new(indexes: I) -> Self {
        Self {
            rows: Vec::new(),
            indexes,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in row-number order.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn get(&self, n: usize) -> Option<&R> {
        self.rows.get(n)
    }

    /// Iterate rows in row-number order.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    /// The index at position `N`.
    pub fn index_at<const N: usize>(&self) -> &Nth<I, N>
    where
        I: IndexAt<N>,
    {
        <I as IndexAt<N>>::index_at(&self.indexes)
    }
}

impl<'t, R, I> IntoIterator for &'t Table<R, I> {
    type Item = &'t R;
    type IntoIter = std::slice::Iter<'t, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl<R, I: IndexTuple<R>> Table<R, I> {
    /// Insert a row. Fails without observable effect if any index already
    /// holds a row with the same key.
    pub fn insert(&mut self, row: R) -> Result<&mut R> {
        ensure!(self.rows.len() < MAX_ROWS, "table is full");
        let pos = self.rows.len() as u32;
        self.rows.push(row);
        match self.indexes.insert_all(&self.rows, pos) {
            Ok(()) => Ok(&mut self.rows[pos as usize]),
            Err(existing) => {
                debug!(row = pos, existing, "insert rolled back");
                self.rows.pop();
                bail!("inserted row already exists in table");
            }
        }
    }

    /// Insert every row from an iterator; stops at the first duplicate.
    pub fn insert_all<T>(&mut self, rows: T) -> Result<()>
    where
        T: IntoIterator<Item = R>,
    {
        for row in rows {
            self.insert(row)?;
        }
        Ok(())
    }

    /// Insert a row, or merge it into the existing row that holds its key:
    /// `merge(existing, incoming)` runs and the existing row survives.
    /// Returns the surviving row.
    pub fn upsert(&mut self, row: R, merge: impl FnOnce(&mut R, R)) -> &mut R {
        assert!(self.rows.len() < MAX_ROWS, "table is full");
        let pos = self.rows.len() as u32;
        self.rows.push(row);
        match self.indexes.insert_all(&self.rows, pos) {
            Ok(()) => &mut self.rows[pos as usize],
            Err(existing) => {
                if let Some(row) = self.rows.pop() {
                    merge(&mut self.rows[existing as usize], row);
                }
                &mut self.rows[existing as usize]
            }
        }
    }

    /// Erase the row at `pos` and return it. The last row is relocated
    /// into the vacated slot and renumbered in every index.
    pub fn erase_at(&mut self, pos: usize) -> R {
        assert!(pos < self.rows.len(), "row {pos} out of bounds");
        let pos32 = pos as u32;
        self.indexes.erase_all(&self.rows, pos32);
        let last = self.rows.len() - 1;
        let row = self.rows.swap_remove(pos);
        if pos != last {
            self.indexes.move_all(&self.rows, last as u32, pos32);
        }
        row
    }

    /// Erase every row the predicate selects; returns how many went. The
    /// slot of an erased row is re-examined, since swap-erase relocates a
    /// yet-unvisited row into it.
    pub fn erase_all(&mut self, mut predicate: impl FnMut(&R) -> bool) -> usize {
        let mut erased = 0;
        let mut n = 0;
        while n < self.rows.len() {
            if predicate(&self.rows[n]) {
                self.erase_at(n);
                erased += 1;
            } else {
                n += 1;
            }
        }
        erased
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.indexes.clear_all();
    }

    /// Prepare for `total` rows.
    pub fn reserve(&mut self, total: usize) {
        self.rows.reserve(total.saturating_sub(self.rows.len()));
        self.indexes.reserve_all(&self.rows, total);
    }

    /// Check every index against the row store.
    pub fn verify(&self) -> Result<()> {
        self.indexes.check_all(&self.rows)
    }

    /// Find through the index at position `N`.
    pub fn find_at<const N: usize>(&self, probe: Probe<'_, R, Nth<I, N>>) -> Option<&R>
    where
        I: IndexAt<N>,
        Nth<I, N>: ProbeIndex<R>,
    {
        let index = <I as IndexAt<N>>::index_at(&self.indexes);
        index
            .find_row(&self.rows, probe)
            .map(|n| &self.rows[n as usize])
    }

    /// Find through the default index (position 0).
    pub fn find(&self, probe: Probe<'_, R, Nth<I, 0>>) -> Option<&R>
    where
        I: IndexAt<0>,
        Nth<I, 0>: ProbeIndex<R>,
    {
        self.find_at::<0>(probe)
    }

    /// Find through the index of type `Ix`. The marker parameter is
    /// inferred; use `find_by::<SomeIndex<_>, _>(probe)`.
    pub fn find_by<Ix, M>(&self, probe: Probe<'_, R, Ix>) -> Option<&R>
    where
        I: GetIndex<Ix, M>,
        Ix: ProbeIndex<R>,
    {
        self.indexes
            .get()
            .find_row(&self.rows, probe)
            .map(|n| &self.rows[n as usize])
    }

    /// Find through index `N`, or insert the row `create` builds. The
    /// constructor runs only on a miss; a cross-key duplicate from the
    /// freshly built row rolls back fully and fails.
    pub fn find_or_create_at<const N: usize, F>(
        &mut self,
        probe: Probe<'_, R, Nth<I, N>>,
        create: F,
    ) -> Result<&mut R>
    where
        I: IndexAt<N>,
        Nth<I, N>: ProbeIndex<R>,
        F: FnOnce() -> R,
    {
        let index = <I as IndexAt<N>>::index_at(&self.indexes);
        if let Some(n) = index.find_row(&self.rows, probe) {
            return Ok(&mut self.rows[n as usize]);
        }
        ensure!(self.rows.len() < MAX_ROWS, "table is full");
        let pos = self.rows.len() as u32;
        self.rows.push(create());
        match self.indexes.insert_all(&self.rows, pos) {
            Ok(()) => Ok(&mut self.rows[pos as usize]),
            Err(existing) => {
                debug!(row = pos, existing, "find_or_create rolled back");
                self.rows.pop();
                bail!("inserted row already exists in table");
            }
        }
    }

    /// `find_or_create_at` on the default index.
    pub fn find_or_create<F>(&mut self, probe: Probe<'_, R, Nth<I, 0>>, create: F) -> Result<&mut R>
    where
        I: IndexAt<0>,
        Nth<I, 0>: ProbeIndex<R>,
        F: FnOnce() -> R,
    {
        self.find_or_create_at::<0, F>(probe, create)
    }

    /// Erase the row matching `probe` on index `N`; returns it if found.
    pub fn erase_match_at<const N: usize>(&mut self, probe: Probe<'_, R, Nth<I, N>>) -> Option<R>
    where
        I: IndexAt<N>,
        Nth<I, N>: ProbeIndex<R>,
    {
        let index = <I as IndexAt<N>>::index_at(&self.indexes);
        let n = index.find_row(&self.rows, probe)?;
        Some(self.erase_at(n as usize))
    }

    /// `erase_match_at` on the default index.
    pub fn erase_match(&mut self, probe: Probe<'_, R, Nth<I, 0>>) -> Option<R>
    where
        I: IndexAt<0>,
        Nth<I, 0>: ProbeIndex<R>,
    {
        self.erase_match_at::<0>(probe)
    }

    /// Ordered iteration through the index at position `N`.
    pub fn ordered_at<const N: usize>(
        &self,
    ) -> Rows<'_, R, <Nth<I, N> as OrderedIndex<R>>::RowIter<'_>>
    where
        I: IndexAt<N>,
        Nth<I, N>: OrderedIndex<R>,
    {
        let index = <I as IndexAt<N>>::index_at(&self.indexes);
        Rows {
            rows: &self.rows,
            inner: index.iter_rows(),
        }
    }

    /// Ordered iteration through the default index.
    pub fn ordered(&self) -> Rows<'_, R, <Nth<I, 0> as OrderedIndex<R>>::RowIter<'_>>
    where
        I: IndexAt<0>,
        Nth<I, 0>: OrderedIndex<R>,
    {
        self.ordered_at::<0>()
    }

    /// Rows with `lower <= key < upper` on the index at position `N`.
    pub fn range_at<const N: usize>(
        &self,
        lower: Probe<'_, R, Nth<I, N>>,
        upper: Probe<'_, R, Nth<I, N>>,
    ) -> Rows<'_, R, <Nth<I, N> as OrderedIndex<R>>::RowIter<'_>>
    where
        I: IndexAt<N>,
        Nth<I, N>: RangedIndex<R>,
    {
        let index = <I as IndexAt<N>>::index_at(&self.indexes);
        Rows {
            rows: &self.rows,
            inner: index.iter_between(&self.rows, lower, upper),
        }
    }

    /// `range_at` on the default index.
    pub fn range(
        &self,
        lower: Probe<'_, R, Nth<I, 0>>,
        upper: Probe<'_, R, Nth<I, 0>>,
    ) -> Rows<'_, R, <Nth<I, 0> as OrderedIndex<R>>::RowIter<'_>>
    where
        I: IndexAt<0>,
        Nth<I, 0>: RangedIndex<R>,
    {
        self.range_at::<0>(lower, upper)
    }

    /// Rows with key `>= probe` on the index at position `N`.
    pub fn seek_at<const N: usize>(
        &self,
        probe: Probe<'_, R, Nth<I, N>>,
    ) -> Rows<'_, R, <Nth<I, N> as OrderedIndex<R>>::RowIter<'_>>
    where
        I: IndexAt<N>,
        Nth<I, N>: RangedIndex<R>,
    {
        let index = <I as IndexAt<N>>::index_at(&self.indexes);
        Rows {
            rows: &self.rows,
            inner: index.iter_from(&self.rows, probe),
        }
    }

    /// `seek_at` on the default index.
    pub fn seek(
        &self,
        probe: Probe<'_, R, Nth<I, 0>>,
    ) -> Rows<'_, R, <Nth<I, 0> as OrderedIndex<R>>::RowIter<'_>>
    where
        I: IndexAt<0>,
        Nth<I, 0>: RangedIndex<R>,
    {
        self.seek_at::<0>(probe)
    }
}

/// Iterator adapter resolving row numbers to row references.
#[derive(Clone, Debug)]
pub struct Rows<'t, R, It> {
    rows: &'t [R],
    inner: It,
}

impl<'t, R, It> Iterator for Rows<'t, R, It>
where
    It: Iterator<Item = u32>,
{
    type Item = &'t R;

    fn next(&mut self) -> Option<&'t R> {
        self.inner.next().map(|n| &self.rows[n as usize])
    }
}

impl<'t, R, It> DoubleEndedIterator for Rows<'t, R, It>
where
    It: DoubleEndedIterator<Item = u32>,
{
    fn next_back(&mut self) -> Option<&'t R> {
        self.inner.next_back().map(|n| &self.rows[n as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashIndex;
    use crate::keys::{HashKey, StrKey, U32Key};
    use crate::order::InsertionOrderIndex;
    use crate::TreeIndex;

    fn hash_table() -> Table<String, (HashIndex<StrKey>,)> {
        Table::new((HashIndex::new(StrKey),))
    }

    #[test]
    fn insert_find_iterate() {
        let mut table = hash_table();
        assert_eq!(table.find("foo"), None);

        table.insert("foo".into()).unwrap();
        table.insert("bar".into()).unwrap();
        table.insert("baz".into()).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.find("foo").map(String::as_str), Some("foo"));
        assert_eq!(table.find("fop"), None);

        let order: Vec<&str> = table.iter().map(String::as_str).collect();
        assert_eq!(order, vec!["foo", "bar", "baz"]);
        table.verify().unwrap();
    }

    #[test]
    fn swap_erase_scrambles_iteration_order() {
        let mut table = hash_table();
        for s in ["foo", "bar", "baz"] {
            table.insert(s.into()).unwrap();
        }

        assert!(table.erase_match("foo").is_some());
        assert_eq!(table.len(), 2);
        let order: Vec<&str> = table.iter().map(String::as_str).collect();
        assert_eq!(order, vec!["baz", "bar"]);
        table.verify().unwrap();
    }

    #[test]
    fn duplicate_insert_is_fully_rolled_back() {
        let mut table = hash_table();
        for s in ["foo", "bar", "baz"] {
            table.insert(s.into()).unwrap();
        }

        let err = table.insert("bar".into()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(table.len(), 3);
        for s in ["foo", "bar", "baz"] {
            assert!(table.find(s).is_some());
        }
        table.verify().unwrap();

        // The rejected key can still be erased and re-inserted cleanly.
        assert!(table.erase_match("bar").is_some());
        table.insert("bar".into()).unwrap();
        table.verify().unwrap();
    }

    #[test]
    fn upsert_merges_on_duplicate() {
        let mut table = hash_table();
        table.upsert("qux".into(), |_, _| panic!("no duplicate yet"));

        let mut merged = false;
        table.upsert("qux".into(), |existing, incoming| {
            assert_eq!(existing, "qux");
            assert_eq!(incoming, "qux");
            merged = true;
        });
        assert!(merged);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn erase_all_reexamines_swapped_slots() {
        let mut table = hash_table();
        for s in ["foo", "bar", "baz", "qux", "corge", "grault", "garply"] {
            table.insert(s.into()).unwrap();
        }
        table.insert("baa".into()).unwrap();

        let erased = table.erase_all(|s| s.starts_with("ba"));
        assert_eq!(erased, 3);
        assert_eq!(table.len(), 5);
        assert_eq!(table.find("bar"), None);
        assert_eq!(table.find("baz"), None);
        assert_eq!(table.find("baa"), None);
        assert!(table.find("foo").is_some());
        table.verify().unwrap();
    }

    #[test]
    fn find_or_create_builds_at_most_once() {
        let mut table = hash_table();
        table.insert("grault".into()).unwrap();

        let row = table
            .find_or_create("grault", || panic!("row already exists"))
            .unwrap();
        assert_eq!(row, "grault");

        table
            .find_or_create("waldo", || "waldo".to_string())
            .unwrap();
        assert_eq!(table.len(), 2);
        table
            .find_or_create("waldo", || panic!("second call must not build"))
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn tree_table_ordered_iteration() {
        let mut table: Table<String, (TreeIndex<StrKey>,)> =
            Table::new((TreeIndex::new(StrKey),));
        for s in ["foo", "bar", "baz"] {
            table.insert(s.into()).unwrap();
        }

        let ordered: Vec<&str> = table.ordered().map(String::as_str).collect();
        assert_eq!(ordered, vec!["bar", "baz", "foo"]);

        let reversed: Vec<&str> = table.ordered().rev().map(String::as_str).collect();
        assert_eq!(reversed, vec!["foo", "baz", "bar"]);
    }

    #[test]
    fn addressing_by_position_and_type() {
        #[derive(Clone, Debug, PartialEq)]
        struct Pair {
            name: String,
            num: u32,
        }

        #[derive(Clone, Copy, Default)]
        struct NameKey;
        impl crate::IndexKey<Pair> for NameKey {
            type Probe<'p> = &'p str;
            fn key<'r>(&self, row: &'r Pair) -> &'r str {
                &row.name
            }
            fn matches(&self, row: &Pair, probe: &str) -> bool {
                row.name == probe
            }
        }
        impl crate::HashKey<Pair> for NameKey {
            fn hash(&self, probe: &str) -> u32 {
                crate::HashKey::<String>::hash(&StrKey, probe)
            }
        }

        #[derive(Clone, Copy, Default)]
        struct NumKey;
        impl crate::IndexKey<Pair> for NumKey {
            type Probe<'p> = u32;
            fn key<'r>(&self, row: &'r Pair) -> u32 {
                row.num
            }
            fn matches(&self, row: &Pair, probe: u32) -> bool {
                row.num == probe
            }
        }
        impl crate::HashKey<Pair> for NumKey {
            fn hash(&self, probe: u32) -> u32 {
                U32Key.hash(probe)
            }
        }

        let mut table = Table::new((HashIndex::new(NameKey), HashIndex::new(NumKey)));
        table
            .insert(Pair {
                name: "foo".into(),
                num: 123,
            })
            .unwrap();
        table
            .insert(Pair {
                name: "bar".into(),
                num: 456,
            })
            .unwrap();

        assert_eq!(table.find_at::<0>("foo").map(|p| p.num), Some(123));
        assert_eq!(
            table.find_at::<1>(123).map(|p| p.name.as_str()),
            Some("foo")
        );
        assert_eq!(
            table
                .find_by::<HashIndex<NameKey>, _>("bar")
                .map(|p| p.num),
            Some(456)
        );
        assert_eq!(
            table
                .find_by::<HashIndex<NumKey>, _>(456)
                .map(|p| p.name.as_str()),
            Some("bar")
        );

        // Duplicate on either key is rejected and fully rolled back.
        assert!(table
            .insert(Pair {
                name: "foo".into(),
                num: 999,
            })
            .is_err());
        assert!(table
            .insert(Pair {
                name: "quux".into(),
                num: 123,
            })
            .is_err());
        assert_eq!(table.len(), 2);
        table.verify().unwrap();
    }

    #[test]
    fn insertion_order_survives_moves_of_the_table() {
        let mut table: Table<u32, (InsertionOrderIndex,)> =
            Table::new((InsertionOrderIndex::new(),));
        let values = [12u32, 34, 56, 78, 111, 222, 333, 444, 555, 666, 777, 888, 999];
        for v in values {
            table.insert(v).unwrap();
        }

        let moved = table;
        let order: Vec<u32> = moved.ordered().copied().collect();
        assert_eq!(order, values.to_vec());

        let taken = {
            let mut slot = moved;
            std::mem::take(&mut slot)
        };
        assert_eq!(taken.len(), 13);
        let order: Vec<u32> = taken.ordered().copied().collect();
        assert_eq!(order, values.to_vec());
    }

    #[test]
    fn clear_empties_table_and_indexes() {
        let mut table: Table<u32, (TreeIndex<U32Key>, InsertionOrderIndex)> =
            Table::new((TreeIndex::new(U32Key), InsertionOrderIndex::new()));
        for v in 0..50 {
            table.insert(v).unwrap();
        }
        table.clear();
        assert!(table.is_empty());
        table.verify().unwrap();

        for v in 0..29 {
            table.insert(v).unwrap();
        }
        assert_eq!(table.len(), 29);
        table.verify().unwrap();
    }
}
