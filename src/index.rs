//! # Index Capabilities and Static Composition
//!
//! A table owns its indexes as a tuple, composed into the table's type
//! rather than dispatched through trait objects. This module defines the
//! capability traits every index kind implements, the fan-out trait the
//! table drives the whole tuple through, and the two addressing schemes
//! (by position, by index type) the table's lookup methods use.
//!
//! ## Capability Traits
//!
//! - [`TableIndex`]: membership maintenance. Every index participates in
//!   insert/erase/relocation so the table's invariants hold.
//! - [`ProbeIndex`]: key lookup (hash and tree indexes).
//! - [`OrderedIndex`]: full ordered iteration (tree and insertion-order
//!   indexes).
//! - [`RangedIndex`]: positioned iteration, seek and range (tree index).
//!
//! ## Fan-Out and Rollback
//!
//! [`IndexTuple::insert_all`] registers a row with each index in declared
//! order. If an index reports a duplicate, the registrations that already
//! succeeded are undone in reverse order and the existing row number is
//! returned; the tuple is then exactly as it was before the call.

use eyre::Result;

/// Membership maintenance: the operations every index kind supports.
///
/// `pos` always refers to a row already present in `rows`; implementations
/// derive the row's key through their own adapter.
pub trait TableIndex<R> {
    /// Register the row at `pos`. On a key collision, returns the existing
    /// row number and leaves the index unchanged.
    fn insert_row(&mut self, rows: &[R], pos: u32) -> Result<(), u32>;

    /// Remove the row at `pos`. The row is still present in `rows`.
    fn erase_row(&mut self, rows: &[R], pos: u32);

    /// Renumber `old` to `new` after a swap-erase relocated the row. The
    /// row is addressed at `rows[new]` by the time this is called.
    fn move_row(&mut self, rows: &[R], old: u32, new: u32);

    /// Drop every entry.
    fn clear(&mut self);

    /// Prepare for a table of `total` rows.
    fn reserve(&mut self, rows: &[R], total: usize);

    /// Check internal invariants against the row store.
    fn check(&self, rows: &[R]) -> Result<()> {
        let _ = rows;
        Ok(())
    }
}

/// Key lookup by probe.
pub trait ProbeIndex<R>: TableIndex<R> {
    /// Lookup key type, from the index's adapter.
    type Probe<'p>: Copy;

    /// Row number matching the probe, if any.
    fn find_row(&self, rows: &[R], probe: Self::Probe<'_>) -> Option<u32>;
}

/// Full ordered iteration over row numbers.
pub trait OrderedIndex<R>: TableIndex<R> {
    type RowIter<'s>: DoubleEndedIterator<Item = u32>
    where
        Self: 's;

    fn iter_rows(&self) -> Self::RowIter<'_>;
}

/// Positioned ordered iteration: seek and half-open ranges.
pub trait RangedIndex<R>: ProbeIndex<R> + OrderedIndex<R> {
    /// Iterate rows with key `>= probe`, to the end.
    fn iter_from<'s>(&'s self, rows: &[R], probe: Self::Probe<'_>) -> Self::RowIter<'s>;

    /// Iterate rows with `lower <= key < upper`. `lower` must not order
    /// after `upper`.
    fn iter_between<'s>(
        &'s self,
        rows: &[R],
        lower: Self::Probe<'_>,
        upper: Self::Probe<'_>,
    ) -> Self::RowIter<'s>;
}

/// Probe type of an index, for signatures.
pub type Probe<'p, R, Ix> = <Ix as ProbeIndex<R>>::Probe<'p>;

/// Index type at tuple position `N`, for signatures.
pub type Nth<I, const N: usize> = <I as IndexAt<N>>::Index;

/// Fan-out over a tuple of indexes, in declared order.
pub trait IndexTuple<R> {
    /// Register `pos` with every index. On a duplicate, previously
    /// registered indexes are rolled back in reverse order and the existing
    /// row number is returned.
    fn insert_all(&mut self, rows: &[R], pos: u32) -> Result<(), u32>;

    fn erase_all(&mut self, rows: &[R], pos: u32);

    fn move_all(&mut self, rows: &[R], old: u32, new: u32);

    fn clear_all(&mut self);

    fn reserve_all(&mut self, rows: &[R], total: usize);

    fn check_all(&self, rows: &[R]) -> Result<()>;
}

impl<R, A> IndexTuple<R> for (A,)
where
    A: TableIndex<R>,
{
    fn insert_all(&mut self, rows: &[R], pos: u32) -> Result<(), u32> {
        self.0.insert_row(rows, pos)
    }

    fn erase_all(&mut self, rows: &[R], pos: u32) {
        self.0.erase_row(rows, pos);
    }

    fn move_all(&mut self, rows: &[R], old: u32, new: u32) {
        self.0.move_row(rows, old, new);
    }

    fn clear_all(&mut self) {
        self.0.clear();
    }

    fn reserve_all(&mut self, rows: &[R], total: usize) {
        self.0.reserve(rows, total);
    }

    fn check_all(&self, rows: &[R]) -> Result<()> {
        self.0.check(rows)
    }
}

impl<R, A, B> IndexTuple<R> for (A, B)
where
    A: TableIndex<R>,
    B: TableIndex<R>,
{
    fn insert_all(&mut self, rows: &[R], pos: u32) -> Result<(), u32> {
        self.0.insert_row(rows, pos)?;
        if let Err(existing) = self.1.insert_row(rows, pos) {
            self.0.erase_row(rows, pos);
            return Err(existing);
        }
        Ok(())
    }

    fn erase_all(&mut self, rows: &[R], pos: u32) {
        self.0.erase_row(rows, pos);
        self.1.erase_row(rows, pos);
    }

    fn move_all(&mut self, rows: &[R], old: u32, new: u32) {
        self.0.move_row(rows, old, new);
        self.1.move_row(rows, old, new);
    }

    fn clear_all(&mut self) {
        self.0.clear();
        self.1.clear();
    }

    fn reserve_all(&mut self, rows: &[R], total: usize) {
        self.0.reserve(rows, total);
        self.1.reserve(rows, total);
    }

    fn check_all(&self, rows: &[R]) -> Result<()> {
        self.0.check(rows)?;
        self.1.check(rows)
    }
}

impl<R, A, B, C> IndexTuple<R> for (A, B, C)
where
    A: TableIndex<R>,
    B: TableIndex<R>,
    C: TableIndex<R>,
{
    fn insert_all(&mut self, rows: &[R], pos: u32) -> Result<(), u32> {
        self.0.insert_row(rows, pos)?;
        if let Err(existing) = self.1.insert_row(rows, pos) {
            self.0.erase_row(rows, pos);
            return Err(existing);
        }
        if let Err(existing) = self.2.insert_row(rows, pos) {
            self.1.erase_row(rows, pos);
            self.0.erase_row(rows, pos);
            return Err(existing);
        }
        Ok(())
    }

    fn erase_all(&mut self, rows: &[R], pos: u32) {
        self.0.erase_row(rows, pos);
        self.1.erase_row(rows, pos);
        self.2.erase_row(rows, pos);
    }

    fn move_all(&mut self, rows: &[R], old: u32, new: u32) {
        self.0.move_row(rows, old, new);
        self.1.move_row(rows, old, new);
        self.2.move_row(rows, old, new);
    }

    fn clear_all(&mut self) {
        self.0.clear();
        self.1.clear();
        self.2.clear();
    }

    fn reserve_all(&mut self, rows: &[R], total: usize) {
        self.0.reserve(rows, total);
        self.1.reserve(rows, total);
        self.2.reserve(rows, total);
    }

    fn check_all(&self, rows: &[R]) -> Result<()> {
        self.0.check(rows)?;
        self.1.check(rows)?;
        self.2.check(rows)
    }
}

impl<R, A, B, C, D> IndexTuple<R> for (A, B, C, D)
where
    A: TableIndex<R>,
    B: TableIndex<R>,
    C: TableIndex<R>,
    D: TableIndex<R>,
{
    fn insert_all(&mut self, rows: &[R], pos: u32) -> Result<(), u32> {
        self.0.insert_row(rows, pos)?;
        if let Err(existing) = self.1.insert_row(rows, pos) {
            self.0.erase_row(rows, pos);
            return Err(existing);
        }
        if let Err(existing) = self.2.insert_row(rows, pos) {
            self.1.erase_row(rows, pos);
            self.0.erase_row(rows, pos);
            return Err(existing);
        }
        if let Err(existing) = self.3.insert_row(rows, pos) {
            self.2.erase_row(rows, pos);
            self.1.erase_row(rows, pos);
            self.0.erase_row(rows, pos);
            return Err(existing);
        }
        Ok(())
    }

    fn erase_all(&mut self, rows: &[R], pos: u32) {
        self.0.erase_row(rows, pos);
        self.1.erase_row(rows, pos);
        self.2.erase_row(rows, pos);
        self.3.erase_row(rows, pos);
    }

    fn move_all(&mut self, rows: &[R], old: u32, new: u32) {
        self.0.move_row(rows, old, new);
        self.1.move_row(rows, old, new);
        self.2.move_row(rows, old, new);
        self.3.move_row(rows, old, new);
    }

    fn clear_all(&mut self) {
        self.0.clear();
        self.1.clear();
        self.2.clear();
        self.3.clear();
    }

    fn reserve_all(&mut self, rows: &[R], total: usize) {
        self.0.reserve(rows, total);
        self.1.reserve(rows, total);
        self.2.reserve(rows, total);
        self.3.reserve(rows, total);
    }

    fn check_all(&self, rows: &[R]) -> Result<()> {
        self.0.check(rows)?;
        self.1.check(rows)?;
        self.2.check(rows)?;
        self.3.check(rows)
    }
}

/// Marker carrying a tuple position, used to disambiguate by-type access.
pub struct At<const N: usize>;

/// Access to the index at tuple position `N`.
pub trait IndexAt<const N: usize> {
    type Index;

    fn index_at(&self) -> &Self::Index;

    fn index_at_mut(&mut self) -> &mut Self::Index;
}

/// Access to an index by its type. The marker parameter is inferred from
/// the unique tuple position holding `Ix`; two indexes of the same type
/// must be addressed by position instead.
pub trait GetIndex<Ix, Marker> {
    fn get(&self) -> &Ix;

    fn get_mut(&mut self) -> &mut Ix;
}

macro_rules! impl_index_access {
    ($( ($($T:ident),+) => $N:literal, $Pick:ident, $i:tt; )+) => {$(
        impl<$($T),+> IndexAt<$N> for ($($T,)+) {
            type Index = $Pick;

            fn index_at(&self) -> &$Pick {
                &self.$i
            }

            fn index_at_mut(&mut self) -> &mut $Pick {
                &mut self.$i
            }
        }

        impl<$($T),+> GetIndex<$Pick, At<$N>> for ($($T,)+) {
            fn get(&self) -> &$Pick {
                &self.$i
            }

            fn get_mut(&mut self) -> &mut $Pick {
                &mut self.$i
            }
        }
    )+}
}

impl_index_access! {
    (A) => 0, A, 0;
    (A, B) => 0, A, 0;
    (A, B) => 1, B, 1;
    (A, B, C) => 0, A, 0;
    (A, B, C) => 1, B, 1;
    (A, B, C) => 2, C, 2;
    (A, B, C, D) => 0, A, 0;
    (A, B, C, D) => 1, B, 1;
    (A, B, C, D) => 2, C, 2;
    (A, B, C, D) => 3, D, 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Index stub that records calls and rejects configured rows.
    #[derive(Default)]
    struct Recorder {
        present: Vec<u32>,
        reject: Option<(u32, u32)>,
        log: Vec<String>,
    }

    impl TableIndex<u32> for Recorder {
        fn insert_row(&mut self, _rows: &[u32], pos: u32) -> Result<(), u32> {
            if let Some((bad, existing)) = self.reject {
                if pos == bad {
                    self.log.push(format!("reject {pos}"));
                    return Err(existing);
                }
            }
            self.present.push(pos);
            self.log.push(format!("insert {pos}"));
            Ok(())
        }

        fn erase_row(&mut self, _rows: &[u32], pos: u32) {
            self.present.retain(|&p| p != pos);
            self.log.push(format!("erase {pos}"));
        }

        fn move_row(&mut self, _rows: &[u32], old: u32, new: u32) {
            for p in &mut self.present {
                if *p == old {
                    *p = new;
                }
            }
            self.log.push(format!("move {old}->{new}"));
        }

        fn clear(&mut self) {
            self.present.clear();
        }

        fn reserve(&mut self, _rows: &[u32], _total: usize) {}
    }

    #[test]
    fn duplicate_in_second_index_rolls_back_first() {
        let mut tuple = (
            Recorder::default(),
            Recorder {
                reject: Some((1, 0)),
                ..Recorder::default()
            },
        );
        let rows = [10u32, 20];

        assert_eq!(tuple.insert_all(&rows, 0), Ok(()));
        assert_eq!(tuple.insert_all(&rows, 1), Err(0));

        assert_eq!(tuple.0.present, vec![0]);
        assert_eq!(tuple.1.present, vec![0]);
        assert_eq!(tuple.0.log, vec!["insert 0", "insert 1", "erase 1"]);
    }

    #[test]
    fn duplicate_in_third_index_rolls_back_in_reverse_order() {
        let mut tuple = (
            Recorder::default(),
            Recorder::default(),
            Recorder {
                reject: Some((0, 7)),
                ..Recorder::default()
            },
        );
        let rows = [10u32];

        assert_eq!(tuple.insert_all(&rows, 0), Err(7));
        assert!(tuple.0.present.is_empty());
        assert!(tuple.1.present.is_empty());
        assert_eq!(tuple.1.log, vec!["insert 0", "erase 0"]);
    }

    #[test]
    fn tuple_access_by_position_and_type() {
        struct Alpha;
        struct Beta;
        let mut tuple = (Alpha, Beta);

        let _: &Alpha = <(Alpha, Beta) as IndexAt<0>>::index_at(&tuple);
        let _: &Beta = <(Alpha, Beta) as IndexAt<1>>::index_at(&tuple);
        let _: &Alpha = GetIndex::<Alpha, _>::get(&tuple);
        let _: &mut Beta = GetIndex::<Beta, _>::get_mut(&mut tuple);
    }
}
