//! # Tree Index
//!
//! B-tree over row numbers, ordered by row keys through an [`OrderedKey`]
//! adapter. Like the hash index, the tree stores nothing but `u32` row
//! numbers; every comparison reads the row store through the adapter.
//!
//! ## Arena
//!
//! Nodes live in a `Vec<Node>` addressed by `u32` node id, with a free
//! list of recycled ids. Node 0 is permanently the root: a root split
//! moves the old root's content into a fresh node and rewrites node 0 as a
//! parent of the two halves, and a root collapse moves the surviving
//! child's content back into node 0. `clear()` resets the arena to a
//! single empty root leaf and empties the free list, so no bookkeeping
//! survives from the previous tree shape.
//!
//! ## Insert
//!
//! ```text
//! 1. Descend from the root, recording (parent, child slot) per level
//! 2. Binary-search the target leaf; a key match reports the existing
//!    row and changes nothing
//! 3. Room in the leaf: shift and store
//! 4. Full leaf: gather the 15 entries, keep the lower half in place,
//!    move the upper half to a new right sibling, hand the right half's
//!    minimum to the parent as separator
//! 5. A full parent splits the same way; its middle key promotes without
//!    staying behind in either half
//! 6. When the path is exhausted the root itself split
//! ```
//!
//! ## Erase
//!
//! Removing a leaf minimum rewrites the one ancestor separator that
//! tracked it. A leaf that drops below half occupancy borrows from
//! whichever sibling is fuller, provided that sibling is more than half
//! full, else merges; interior borrows rotate through the parent
//! separator, interior merges fold the separator into the merged node.
//! Underflow propagates; a root parent left with a single child collapses.
//!
//! ## Relocation
//!
//! Swap-erase in the table renumbers one row per erase. `move_row`
//! descends by the relocated row's key and rewrites its leaf slot, plus
//! the one ancestor separator when the row was a subtree minimum.
//!
//! `verify()` walks the whole structure and checks every invariant; the
//! fuzz suites call it after each mutation.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;
use tracing::trace;

use super::iter::{Pos, TreeRowIter};
use super::node::{Leaf, Node, Parent, Slot, FANOUT, HALF, MAX_CHILDREN};
use crate::index::{OrderedIndex, ProbeIndex, RangedIndex, TableIndex};
use crate::keys::{IndexKey, OrderedKey};

/// Descent record: ancestor node id and the child slot taken.
type Path = SmallVec<[(u32, usize); 12]>;

/// Rebalancing choice for an under-full node.
enum Plan {
    BorrowLeft(u32),
    BorrowRight(u32),
    MergeLeft(u32),
    MergeRight(u32),
}

fn plan(left: Option<(u32, usize)>, right: Option<(u32, usize)>) -> Plan {
    match (left, right) {
        (Some((l, ll)), Some((r, rl))) => {
            if ll > HALF && ll >= rl {
                Plan::BorrowLeft(l)
            } else if rl > HALF {
                Plan::BorrowRight(r)
            } else {
                Plan::MergeLeft(l)
            }
        }
        (Some((l, ll)), None) => {
            if ll > HALF {
                Plan::BorrowLeft(l)
            } else {
                Plan::MergeLeft(l)
            }
        }
        (None, Some((r, rl))) => {
            if rl > HALF {
                Plan::BorrowRight(r)
            } else {
                Plan::MergeRight(r)
            }
        }
        (None, None) => unreachable!("non-root node with no siblings"),
    }
}

/// Aggregate of a verified subtree.
struct Span {
    count: usize,
    first: u32,
    last: u32,
}

/// Ordered index over row numbers, keyed through adapter `K`.
#[derive(Clone, Debug)]
pub struct TreeIndex<K> {
    adapter: K,
    nodes: Vec<Node>,
    free: Vec<u32>,
    /// Parent levels above the leaves.
    height: u32,
    begin_leaf: u32,
    end_leaf: u32,
}

impl<K: Default> Default for TreeIndex<K> {
    fn default() -> Self {
        Self::new(K::default())
    }
}

impl<K> TreeIndex<K> {
    pub fn new(adapter: K) -> Self {
        Self {
            adapter,
            nodes: vec![Node::Leaf(Leaf::new())],
            free: Vec::new(),
            height: 0,
            begin_leaf: 0,
            end_leaf: 0,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::Leaf(Leaf::new()));
        self.free.clear();
        self.height = 0;
        self.begin_leaf = 0;
        self.end_leaf = 0;
    }

    pub fn reserve(&mut self, total: usize) {
        let want = total / HALF + 2;
        self.nodes.reserve(want.saturating_sub(self.nodes.len()));
    }

    fn alloc(&mut self, node: Node) -> u32 {
        if let Some(id) = self.free.pop() {
            self.nodes[id as usize] = node;
            id
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as u32
        }
    }

    fn release(&mut self, id: u32) {
        debug_assert!(id != 0, "the root is never released");
        self.free.push(id);
    }

    fn leaf(&self, id: u32) -> &Leaf {
        self.nodes[id as usize].leaf()
    }

    fn leaf_mut(&mut self, id: u32) -> &mut Leaf {
        self.nodes[id as usize].leaf_mut()
    }

    fn parent(&self, id: u32) -> &Parent {
        self.nodes[id as usize].parent()
    }

    fn parent_mut(&mut self, id: u32) -> &mut Parent {
        self.nodes[id as usize].parent_mut()
    }

    fn end_pos(&self) -> Pos {
        let id = self.end_leaf;
        (id, self.leaf(id).len())
    }

    /// Ordered iteration over every row number.
    pub fn iter_rows(&self) -> TreeRowIter<'_> {
        TreeRowIter::new(&self.nodes, (self.begin_leaf, 0), self.end_pos())
    }

    fn key_le_probe<R>(&self, rows: &[R], row: u32, probe: K::Probe<'_>) -> bool
    where
        K: OrderedKey<R>,
    {
        let r = &rows[row as usize];
        self.adapter.is_before(r, probe) || self.adapter.matches(r, probe)
    }

    /// Child slot a probe descends into: the number of separators at or
    /// below the probe.
    fn child_for<R>(&self, rows: &[R], parent: &Parent, probe: K::Probe<'_>) -> usize
    where
        K: OrderedKey<R>,
    {
        let mut lo = 0usize;
        let mut hi = parent.key_count();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key_le_probe(rows, parent.keys[mid].row(), probe) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// First leaf position whose key is `>= probe`.
    fn leaf_lower_bound<R>(&self, rows: &[R], leaf: &Leaf, probe: K::Probe<'_>) -> usize
    where
        K: OrderedKey<R>,
    {
        let mut lo = 0usize;
        let mut hi = leaf.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let row = leaf.rows[mid].row();
            if self.adapter.is_before(&rows[row as usize], probe) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn descend<R>(&self, rows: &[R], probe: K::Probe<'_>) -> (u32, Path)
    where
        K: OrderedKey<R>,
    {
        let mut path = Path::new();
        let mut node = 0u32;
        for _ in 0..self.height {
            let parent = self.nodes[node as usize].parent();
            let ci = self.child_for(rows, parent, probe);
            path.push((node, ci));
            node = parent.children[ci];
        }
        (node, path)
    }

    /// Normalized position of the first entry with key `>= probe`.
    fn lower_bound<R>(&self, rows: &[R], probe: K::Probe<'_>) -> Pos
    where
        K: OrderedKey<R>,
    {
        let (leaf_id, _) = self.descend(rows, probe);
        let leaf = self.leaf(leaf_id);
        let j = self.leaf_lower_bound(rows, leaf, probe);
        if j == leaf.len() && leaf.next != 0 {
            (leaf.next, 0)
        } else {
            (leaf_id, j)
        }
    }

    /// Row number matching `probe`, if any.
    pub fn find<R>(&self, rows: &[R], probe: K::Probe<'_>) -> Option<u32>
    where
        K: OrderedKey<R>,
    {
        let (leaf_id, _) = self.descend(rows, probe);
        let leaf = self.leaf(leaf_id);
        let j = self.leaf_lower_bound(rows, leaf, probe);
        if j < leaf.len() {
            let row = leaf.rows[j].row();
            if self.adapter.matches(&rows[row as usize], probe) {
                return Some(row);
            }
        }
        None
    }

    /// Register row `pos` under `probe`. Returns the existing row number if
    /// the key is already present; the tree is unchanged in that case.
    pub fn insert<R>(&mut self, rows: &[R], pos: u32, probe: K::Probe<'_>) -> Result<(), u32>
    where
        K: OrderedKey<R>,
    {
        let (leaf_id, path) = self.descend(rows, probe);
        let j = {
            let leaf = self.leaf(leaf_id);
            let j = self.leaf_lower_bound(rows, leaf, probe);
            if j < leaf.len() {
                let row = leaf.rows[j].row();
                if self.adapter.matches(&rows[row as usize], probe) {
                    return Err(row);
                }
            }
            j
        };

        if !self.leaf(leaf_id).is_full() {
            self.leaf_mut(leaf_id).insert_at(j, pos);
            return Ok(());
        }

        // Redistribute the 15 entries across the old leaf and a new right
        // sibling, then hand the right half's minimum to the parent.
        let mut merged = [0u32; FANOUT + 1];
        {
            let leaf = self.leaf(leaf_id);
            for k in 0..j {
                merged[k] = leaf.rows[k].row();
            }
            merged[j] = pos;
            for k in j..FANOUT {
                merged[k + 1] = leaf.rows[k].row();
            }
        }
        let mid = (FANOUT + 1) / 2;

        let old_next = self.leaf(leaf_id).next;
        let mut right = Leaf::new();
        right.prev = leaf_id;
        right.next = old_next;
        for (k, &row) in merged[mid..].iter().enumerate() {
            right.rows[k] = Slot::new(row);
        }
        let right_id = self.alloc(Node::Leaf(right));

        {
            let leaf = self.leaf_mut(leaf_id);
            leaf.rows = [Slot::VACANT; FANOUT];
            for (k, &row) in merged[..mid].iter().enumerate() {
                leaf.rows[k] = Slot::new(row);
            }
            leaf.next = right_id;
        }
        if old_next != 0 {
            self.leaf_mut(old_next).prev = right_id;
        } else {
            self.end_leaf = right_id;
        }

        self.insert_into_parent(path, merged[mid], right_id);
        Ok(())
    }

    fn insert_into_parent(&mut self, mut path: Path, mut sep: u32, mut right: u32) {
        while let Some((pnode, ci)) = path.pop() {
            if !self.parent(pnode).is_full() {
                self.parent_mut(pnode).insert_at(ci, sep, right);
                return;
            }

            // Full parent: redistribute 15 keys and 16 children, promoting
            // the middle key without keeping it in either half.
            let mut keys = [0u32; FANOUT + 1];
            let mut children = [0u32; MAX_CHILDREN + 1];
            {
                let parent = self.parent(pnode);
                for k in 0..ci {
                    keys[k] = parent.keys[k].row();
                }
                keys[ci] = sep;
                for k in ci..FANOUT {
                    keys[k + 1] = parent.keys[k].row();
                }
                for c in 0..=ci {
                    children[c] = parent.children[c];
                }
                children[ci + 1] = right;
                for c in ci + 1..MAX_CHILDREN {
                    children[c + 1] = parent.children[c];
                }
            }
            let mid = (FANOUT + 1) / 2;

            let mut new_right = Parent::new();
            for (k, &key) in keys[mid + 1..].iter().enumerate() {
                new_right.keys[k] = Slot::new(key);
            }
            for (c, &child) in children[mid + 1..].iter().enumerate() {
                new_right.children[c] = child;
            }
            let new_right_id = self.alloc(Node::Parent(new_right));

            {
                let parent = self.parent_mut(pnode);
                parent.keys = [Slot::VACANT; FANOUT];
                parent.children = [0u32; MAX_CHILDREN];
                for (k, &key) in keys[..mid].iter().enumerate() {
                    parent.keys[k] = Slot::new(key);
                }
                for (c, &child) in children[..=mid].iter().enumerate() {
                    parent.children[c] = child;
                }
            }

            sep = keys[mid];
            right = new_right_id;
        }

        self.split_root(sep, right);
    }

    fn split_root(&mut self, sep: u32, right: u32) {
        let old_root = std::mem::replace(&mut self.nodes[0], Node::Parent(Parent::new()));
        let was_leaf = old_root.is_leaf();
        let new_left = self.alloc(old_root);
        if was_leaf {
            let next = self.leaf(new_left).next;
            debug_assert_eq!(next, right);
            if next != 0 {
                self.leaf_mut(next).prev = new_left;
            }
            debug_assert_eq!(self.begin_leaf, 0);
            self.begin_leaf = new_left;
        }
        let root = self.nodes[0].parent_mut();
        root.keys[0] = Slot::new(sep);
        root.children[0] = new_left;
        root.children[1] = right;
        self.height += 1;
        trace!(height = self.height, "b-tree root split");
    }

    /// Remove row `pos`, keyed by `probe`.
    pub fn erase<R>(&mut self, rows: &[R], pos: u32, probe: K::Probe<'_>)
    where
        K: OrderedKey<R>,
    {
        let (leaf_id, path) = self.descend(rows, probe);
        let j = {
            let leaf = self.leaf(leaf_id);
            let j = self.leaf_lower_bound(rows, leaf, probe);
            debug_assert!(
                j < leaf.len() && leaf.rows[j].row() == pos,
                "row {pos} not present in tree index"
            );
            if j >= leaf.len() {
                return;
            }
            j
        };
        self.leaf_mut(leaf_id).remove_at(j);

        if j == 0 {
            if let Some(new_min) = self.leaf(leaf_id).rows[0].get() {
                self.replace_separator(&path, pos, new_min);
            }
        }

        if self.height == 0 {
            return;
        }
        if self.leaf(leaf_id).len() < HALF {
            self.rebalance_leaf(leaf_id, path);
        }
    }

    /// Rewrite the one ancestor separator tracking a vanished subtree
    /// minimum: the nearest ancestor entered through a non-first child.
    fn replace_separator(&mut self, path: &Path, old: u32, new: u32) {
        for &(pnode, ci) in path.iter().rev() {
            if ci > 0 {
                let parent = self.parent_mut(pnode);
                if parent.keys[ci - 1].row() == old {
                    parent.keys[ci - 1] = Slot::new(new);
                }
                return;
            }
        }
    }

    fn siblings(&self, pnode: u32, ci: usize) -> (Option<u32>, Option<u32>) {
        let parent = self.parent(pnode);
        let left = if ci > 0 {
            Some(parent.children[ci - 1])
        } else {
            None
        };
        let right = if ci < parent.key_count() {
            Some(parent.children[ci + 1])
        } else {
            None
        };
        (left, right)
    }

    fn rebalance_leaf(&mut self, node: u32, mut path: Path) {
        let Some((pnode, ci)) = path.pop() else {
            return;
        };
        let (left, right) = self.siblings(pnode, ci);
        let left = left.map(|id| (id, self.leaf(id).len()));
        let right = right.map(|id| (id, self.leaf(id).len()));

        match plan(left, right) {
            Plan::BorrowLeft(lid) => {
                let moved = {
                    let leaf = self.leaf_mut(lid);
                    let len = leaf.len();
                    leaf.remove_at(len - 1)
                };
                self.leaf_mut(node).insert_at(0, moved);
                self.parent_mut(pnode).keys[ci - 1] = Slot::new(moved);
            }
            Plan::BorrowRight(rid) => {
                let moved = self.leaf_mut(rid).remove_at(0);
                let len = self.leaf(node).len();
                self.leaf_mut(node).insert_at(len, moved);
                let new_first = self.leaf(rid).rows[0].row();
                self.parent_mut(pnode).keys[ci] = Slot::new(new_first);
            }
            Plan::MergeLeft(lid) => {
                self.merge_leaves(lid, node);
                self.parent_mut(pnode).remove_at(ci - 1);
                self.rebalance_parent(pnode, path);
            }
            Plan::MergeRight(rid) => {
                self.merge_leaves(node, rid);
                self.parent_mut(pnode).remove_at(ci);
                self.rebalance_parent(pnode, path);
            }
        }
    }

    fn merge_leaves(&mut self, dst: u32, src: u32) {
        let (src_rows, src_len, src_next) = {
            let leaf = self.leaf(src);
            (leaf.rows, leaf.len(), leaf.next)
        };
        {
            let leaf = self.leaf_mut(dst);
            let len = leaf.len();
            debug_assert!(len + src_len <= FANOUT);
            leaf.rows[len..len + src_len].copy_from_slice(&src_rows[..src_len]);
            leaf.next = src_next;
        }
        if src_next != 0 {
            self.leaf_mut(src_next).prev = dst;
        } else {
            self.end_leaf = dst;
        }
        self.release(src);
    }

    fn rebalance_parent(&mut self, node: u32, mut path: Path) {
        if path.is_empty() {
            debug_assert_eq!(node, 0);
            let root = self.nodes[0].parent();
            if root.key_count() == 0 {
                let child = root.children[0];
                let content =
                    std::mem::replace(&mut self.nodes[child as usize], Node::Leaf(Leaf::new()));
                self.nodes[0] = content;
                self.release(child);
                self.height -= 1;
                if self.height == 0 {
                    self.begin_leaf = 0;
                    self.end_leaf = 0;
                }
                trace!(height = self.height, "b-tree root collapse");
            }
            return;
        }
        if self.parent(node).key_count() >= HALF {
            return;
        }

        let Some((pnode, ci)) = path.pop() else {
            return;
        };
        let (left, right) = self.siblings(pnode, ci);
        let left = left.map(|id| (id, self.parent(id).key_count()));
        let right = right.map(|id| (id, self.parent(id).key_count()));

        match plan(left, right) {
            Plan::BorrowLeft(lid) => {
                let (lkey, lchild) = self.parent_mut(lid).pop_back();
                let sep = self.parent(pnode).keys[ci - 1].row();
                self.parent_mut(node).push_front(sep, lchild);
                self.parent_mut(pnode).keys[ci - 1] = Slot::new(lkey);
            }
            Plan::BorrowRight(rid) => {
                let (rkey, rchild) = self.parent_mut(rid).pop_front();
                let sep = self.parent(pnode).keys[ci].row();
                self.parent_mut(node).push_back(sep, rchild);
                self.parent_mut(pnode).keys[ci] = Slot::new(rkey);
            }
            Plan::MergeLeft(lid) => {
                let sep = self.parent(pnode).keys[ci - 1].row();
                self.merge_parents(lid, node, sep);
                self.parent_mut(pnode).remove_at(ci - 1);
                self.rebalance_parent(pnode, path);
            }
            Plan::MergeRight(rid) => {
                let sep = self.parent(pnode).keys[ci].row();
                self.merge_parents(node, rid, sep);
                self.parent_mut(pnode).remove_at(ci);
                self.rebalance_parent(pnode, path);
            }
        }
    }

    fn merge_parents(&mut self, dst: u32, src: u32, sep: u32) {
        let (src_keys, src_children, src_count) = {
            let parent = self.parent(src);
            (parent.keys, parent.children, parent.key_count())
        };
        {
            let parent = self.parent_mut(dst);
            let count = parent.key_count();
            debug_assert!(count + 1 + src_count <= FANOUT);
            parent.keys[count] = Slot::new(sep);
            parent.keys[count + 1..count + 1 + src_count].copy_from_slice(&src_keys[..src_count]);
            parent.children[count + 1..count + 2 + src_count]
                .copy_from_slice(&src_children[..src_count + 1]);
        }
        self.release(src);
    }

    /// Renumber `old` to `new`; the relocated row now lives at `rows[new]`.
    /// Structure does not change.
    pub fn move_row<R>(&mut self, rows: &[R], old: u32, new: u32)
    where
        K: OrderedKey<R>,
    {
        let probe = self.adapter.key(&rows[new as usize]);
        let (leaf_id, path) = self.descend(rows, probe);
        let j = {
            let leaf = self.leaf(leaf_id);
            let j = self.leaf_lower_bound(rows, leaf, probe);
            debug_assert!(
                j < leaf.len() && leaf.rows[j].row() == old,
                "row {old} not present in tree index"
            );
            if j >= leaf.len() {
                return;
            }
            j
        };
        self.leaf_mut(leaf_id).rows[j] = Slot::new(new);
        if j == 0 {
            self.replace_separator(&path, old, new);
        }
    }

    /// Iterate rows with key `>= probe`, to the maximum.
    pub fn iter_from<R>(&self, rows: &[R], probe: K::Probe<'_>) -> TreeRowIter<'_>
    where
        K: OrderedKey<R>,
    {
        TreeRowIter::new(&self.nodes, self.lower_bound(rows, probe), self.end_pos())
    }

    /// Iterate rows with `lower <= key < upper`.
    pub fn iter_between<R>(
        &self,
        rows: &[R],
        lower: K::Probe<'_>,
        upper: K::Probe<'_>,
    ) -> TreeRowIter<'_>
    where
        K: OrderedKey<R>,
    {
        let front = self.lower_bound(rows, lower);
        let back = self.lower_bound(rows, upper);
        TreeRowIter::new(&self.nodes, front, back)
    }

    /// Walk the entire tree and check every structural invariant.
    pub fn verify<R>(&self, rows: &[R]) -> Result<()>
    where
        K: OrderedKey<R>,
    {
        let span = self.verify_node(rows, 0, self.height, true)?;
        let count = span.as_ref().map_or(0, |s| s.count);
        ensure!(
            count == rows.len(),
            "tree index holds {} rows, table has {}",
            count,
            rows.len()
        );

        let mut id = self.begin_leaf;
        let mut prev = 0u32;
        let mut leaves = 0usize;
        loop {
            let Node::Leaf(leaf) = &self.nodes[id as usize] else {
                bail!("leaf chain passes through non-leaf node {id}");
            };
            ensure!(leaf.prev == prev, "leaf {} has a broken back-link", id);
            leaves += 1;
            ensure!(leaves <= self.nodes.len(), "leaf chain cycles");
            if leaf.next == 0 {
                ensure!(
                    id == self.end_leaf,
                    "leaf chain ends at {} instead of {}",
                    id,
                    self.end_leaf
                );
                break;
            }
            prev = id;
            id = leaf.next;
        }
        Ok(())
    }

    fn verify_node<R>(
        &self,
        rows: &[R],
        node: u32,
        level: u32,
        is_root: bool,
    ) -> Result<Option<Span>>
    where
        K: OrderedKey<R>,
    {
        ensure!(
            (node as usize) < self.nodes.len(),
            "node id {} outside arena of {}",
            node,
            self.nodes.len()
        );

        if level == 0 {
            let Node::Leaf(leaf) = &self.nodes[node as usize] else {
                bail!("node {node} should be a leaf");
            };
            let len = leaf.len();
            for k in len..FANOUT {
                ensure!(
                    leaf.rows[k].is_vacant(),
                    "leaf {} has an entry after its terminator",
                    node
                );
            }
            if !is_root {
                ensure!(len >= HALF, "leaf {} below half occupancy: {}", node, len);
            }
            for k in 0..len {
                let row = leaf.rows[k].row();
                ensure!(
                    (row as usize) < rows.len(),
                    "leaf {} references row {} beyond table of {}",
                    node,
                    row,
                    rows.len()
                );
                if k > 0 {
                    let prev = leaf.rows[k - 1].row();
                    ensure!(
                        self.adapter
                            .is_before(&rows[prev as usize], self.adapter.key(&rows[row as usize])),
                        "leaf {} keys out of order at {}",
                        node,
                        k
                    );
                }
            }
            if len == 0 {
                return Ok(None);
            }
            Ok(Some(Span {
                count: len,
                first: leaf.rows[0].row(),
                last: leaf.rows[len - 1].row(),
            }))
        } else {
            let Node::Parent(parent) = &self.nodes[node as usize] else {
                bail!("node {node} should be a parent");
            };
            let key_count = parent.key_count();
            if is_root {
                ensure!(key_count >= 1, "root parent {} has no keys", node);
            } else {
                ensure!(
                    key_count >= HALF,
                    "parent {} below half occupancy: {}",
                    node,
                    key_count
                );
            }
            for k in key_count..FANOUT {
                ensure!(
                    parent.keys[k].is_vacant(),
                    "parent {} has a key after its terminator",
                    node
                );
            }

            let mut total = 0usize;
            let mut first = 0u32;
            let mut last = 0u32;
            for c in 0..=key_count {
                let Some(span) = self.verify_node(rows, parent.children[c], level - 1, false)?
                else {
                    bail!("empty node below the root under parent {node}");
                };
                if c == 0 {
                    first = span.first;
                } else {
                    let key = parent.keys[c - 1].row();
                    ensure!(
                        key == span.first,
                        "parent {} separator {} is not child {}'s minimum {}",
                        node,
                        key,
                        c,
                        span.first
                    );
                    ensure!(
                        self.adapter
                            .is_before(&rows[last as usize], self.adapter.key(&rows[key as usize])),
                        "parent {} separator {} out of order",
                        node,
                        c - 1
                    );
                }
                last = span.last;
                total += span.count;
            }
            Ok(Some(Span {
                count: total,
                first,
                last,
            }))
        }
    }
}

impl<R, K: OrderedKey<R>> TableIndex<R> for TreeIndex<K> {
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

    fn reserve(&mut self, _rows: &[R], total: usize) {
        self.reserve(total);
    }

    fn check(&self, rows: &[R]) -> Result<()> {
        self.verify(rows)
    }
}

impl<R, K: OrderedKey<R>> ProbeIndex<R> for TreeIndex<K> {
    type Probe<'p> = K::Probe<'p>;

    fn find_row(&self, rows: &[R], probe: Self::Probe<'_>) -> Option<u32> {
        self.find(rows, probe)
    }
}

impl<R, K: OrderedKey<R>> OrderedIndex<R> for TreeIndex<K> {
    type RowIter<'s>
        = TreeRowIter<'s>
    where
        Self: 's;

    fn iter_rows(&self) -> TreeRowIter<'_> {
        self.iter_rows()
    }
}

impl<R, K: OrderedKey<R>> RangedIndex<R> for TreeIndex<K> {
    fn iter_from<'s>(&'s self, rows: &[R], probe: Self::Probe<'_>) -> TreeRowIter<'s> {
        self.iter_from(rows, probe)
    }

    fn iter_between<'s>(
        &'s self,
        rows: &[R],
        lower: Self::Probe<'_>,
        upper: Self::Probe<'_>,
    ) -> TreeRowIter<'s> {
        self.iter_between(rows, lower, upper)
    }
}
