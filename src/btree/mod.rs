//! # B-Tree Index
//!
//! In-memory B-tree over row numbers: [`tree::TreeIndex`] holds the
//! operations, [`node`] the fixed-fanout node layout and arena cells, and
//! [`iter`] the linked-leaf ordered walk.
//!
//! The tree gives the table its ordered capabilities: sorted iteration in
//! both directions, `seek` to the first key at or above a probe, and
//! half-open range scans, at O(log n) per descent.

pub mod iter;
pub mod node;
pub mod tree;

pub use iter::TreeRowIter;
pub use node::{Leaf, Node, Parent, Slot, FANOUT, HALF, MAX_CHILDREN};
pub use tree::TreeIndex;
