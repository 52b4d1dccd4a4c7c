//! # Key Adapters
//!
//! An index never compares rows directly. Each index owns a small adapter
//! object that extracts the key it indexes on, tests a stored row against a
//! probe, and (depending on the index kind) hashes or orders probes.
//!
//! ## Probe Types
//!
//! The probe type is decoupled from the row type through the `Probe<'p>`
//! associated type. This is what lets an owned `String` row be looked up by
//! a borrowed `&str`, or lets two indexes over the same row type use
//! entirely different keys (content vs. length):
//!
//! ```
//! use rowdex::{IndexKey, HashKey};
//!
//! struct LenKey;
//!
//! impl IndexKey<String> for LenKey {
//!     type Probe<'p> = usize;
//!     fn key<'r>(&self, row: &'r String) -> usize { row.len() }
//!     fn matches(&self, row: &String, probe: usize) -> bool { row.len() == probe }
//! }
//!
//! impl HashKey<String> for LenKey {
//!     fn hash(&self, probe: usize) -> u32 { probe as u32 }
//! }
//! ```
//!
//! `key()` must return a value usable as a probe for the same adapter, so
//! an index can re-derive a row's slot during rehash and relocation.
//!
//! Adapters must be pure: a row's effective key may not change while the
//! row is resident in a table, or every index invariant is void.

use xxhash_rust::xxh3::xxh3_64;

/// Key extraction and equality for one index over rows of type `R`.
pub trait IndexKey<R> {
    /// Lookup key accepted by this index. May borrow from the caller or
    /// from a stored row.
    type Probe<'p>: Copy;

    /// Extract the probe-compatible key of a stored row.
    fn key<'r>(&self, row: &'r R) -> Self::Probe<'r>;

    /// Does a stored row match a probe?
    fn matches(&self, row: &R, probe: Self::Probe<'_>) -> bool;
}

/// Adapter for hash indexes.
pub trait HashKey<R>: IndexKey<R> {
    /// Hash of a probe. Rows hash through `hash(key(row))`.
    fn hash(&self, probe: Self::Probe<'_>) -> u32;
}

/// Adapter for ordered indexes.
pub trait OrderedKey<R>: IndexKey<R> {
    /// Is the stored row's key strictly before the probe?
    fn is_before(&self, row: &R, probe: Self::Probe<'_>) -> bool;
}

/// Whole-string key for any row that exposes a `&str` view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrKey;

impl<R: AsRef<str>> IndexKey<R> for StrKey {
    type Probe<'p> = &'p str;

    fn key<'r>(&self, row: &'r R) -> &'r str {
        row.as_ref()
    }

    fn matches(&self, row: &R, probe: &str) -> bool {
        row.as_ref() == probe
    }
}

impl<R: AsRef<str>> HashKey<R> for StrKey {
    fn hash(&self, probe: &str) -> u32 {
        xxh3_64(probe.as_bytes()) as u32
    }
}

impl<R: AsRef<str>> OrderedKey<R> for StrKey {
    fn is_before(&self, row: &R, probe: &str) -> bool {
        row.as_ref() < probe
    }
}

/// Identity key for `u32` rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct U32Key;

impl IndexKey<u32> for U32Key {
    type Probe<'p> = u32;

    fn key<'r>(&self, row: &'r u32) -> u32 {
        *row
    }

    fn matches(&self, row: &u32, probe: u32) -> bool {
        *row == probe
    }
}

impl HashKey<u32> for U32Key {
    fn hash(&self, probe: u32) -> u32 {
        xxh3_64(&probe.to_le_bytes()) as u32
    }
}

impl OrderedKey<u32> for U32Key {
    fn is_before(&self, row: &u32, probe: u32) -> bool {
        *row < probe
    }
}
