//! # rowdex - Embedded Multi-Index Table
//!
//! rowdex is an in-process container for rows that need more than one
//! lookup path: every row is stored exactly once in a dense row store, and
//! any number of independent secondary indexes resolve keys back to it.
//! It is a building block for caches, symbol tables and small relational
//! stores inside larger systems, not a database: no persistence, no
//! threading, no I/O.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------+
//! |                 Table<R, (I0, I1, ...)>          |
//! |  insert / upsert / find_or_create / erase_* ...  |
//! +-----------------+--------------------------------+
//! |  Row store      |  Index tuple, declared order   |
//! |  Vec<R>, dense  |  +---------------------------+ |
//! |  u32 row nums,  |  | HashIndex      (probe)    | |
//! |  swap-erase     |  | TreeIndex      (ordered)  | |
//! |                 |  | InsertionOrderIndex       | |
//! +-----------------+--+---------------------------+-+
//!                      | key adapters (IndexKey /  |
//!                      | HashKey / OrderedKey)     |
//!                      +---------------------------+
//! ```
//!
//! Indexes store bare `u32` row numbers and read the row store through
//! caller-supplied key adapters, so one table can be indexed by owned
//! string content, by string length, and by insertion order at once, each
//! index probed by its own key type.
//!
//! ## Guarantees
//!
//! - **One copy per row.** Indexes never hold keys or rows, only row
//!   numbers; relocations broadcast synchronously to every index.
//! - **Transactional insert.** A duplicate detected by any index rolls
//!   back the registrations that preceded it; a failed insert leaves the
//!   table byte-identical.
//! - **Bounded hash growth.** The hash index sheds tombstones by rehashing
//!   at a size fitted to live occupancy, so churn cannot grow it.
//! - **Checked tree shape.** `verify()` walks every B-tree invariant;
//!   the fuzz suites run it after each mutation.
//!
//! ## Quick Start
//!
//! ```
//! use rowdex::{StrKey, Table, TreeIndex};
//!
//! let mut table = Table::new((TreeIndex::new(StrKey),));
//! table.insert_all(["grault", "corge", "garply"].map(String::from))?;
//!
//! assert_eq!(table.find("corge").map(String::as_str), Some("corge"));
//! let sorted: Vec<&str> = table.ordered().map(String::as_str).collect();
//! assert_eq!(sorted, vec!["corge", "garply", "grault"]);
//! # Ok::<(), eyre::Report>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`table`]: the coordinator owning rows and the index tuple
//! - [`hash`]: open-addressed hash index with tombstone shedding
//! - [`btree`]: B-tree index with range scans and structural verification
//! - [`order`]: insertion-order index
//! - [`keys`]: key-adapter traits and stock adapters
//! - [`index`]: capability traits and static index-tuple composition

pub mod btree;
pub mod hash;
pub mod index;
pub mod keys;
pub mod order;
pub mod table;

pub use btree::TreeIndex;
pub use hash::HashIndex;
pub use index::{
    At, GetIndex, IndexAt, IndexTuple, Nth, OrderedIndex, Probe, ProbeIndex, RangedIndex,
    TableIndex,
};
pub use keys::{HashKey, IndexKey, OrderedKey, StrKey, U32Key};
pub use order::InsertionOrderIndex;
pub use table::{Rows, Table};
