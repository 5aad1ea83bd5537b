//! An order-statistic tree over replay items.
//!
//! This is the merge engine's positional index: a self-balancing binary tree
//! of [`Item`]s in document order. Every node maintains the size of its
//! subtree plus how many of those items are visible in the *current* walk
//! position (`cur_ins`) and in the *final* document (`end_ins`), which makes
//! "find the spot `pos` current characters in" an O(log n) descent instead of
//! a scan.
//!
//! Nodes live in an arena and are addressed by [`NodeIdx`], so an index entry
//! (`items_by_lv` in the edit context) stays valid across rebalancing.

use crate::listmerge::item::{Item, INSERTED};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct NodeIdx(pub(crate) usize);

impl Default for NodeIdx {
    fn default() -> Self {
        Self(usize::MAX)
    }
}

impl NodeIdx {
    pub(crate) const NONE: NodeIdx = NodeIdx(usize::MAX);

    pub(crate) fn exists(&self) -> bool {
        self.0 != usize::MAX
    }
}

#[derive(Debug, Clone)]
struct Node {
    item: Item,
    parent: NodeIdx,
    left: NodeIdx,
    right: NodeIdx,
    height: u8,

    // Subtree aggregates, including this node.
    size: usize,
    cur_ins: usize,
    end_ins: usize,
}

impl Node {
    fn new_leaf(item: Item, parent: NodeIdx) -> Self {
        Node {
            cur_ins: (item.cur_state == INSERTED) as usize,
            end_ins: (item.end_state == INSERTED) as usize,
            item,
            parent,
            left: NodeIdx::NONE,
            right: NodeIdx::NONE,
            height: 1,
            size: 1,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ItemTree {
    nodes: Vec<Node>,
    root: NodeIdx,
}

impl ItemTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeIdx::NONE,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: NodeIdx::NONE,
        }
    }

    pub fn len(&self) -> usize {
        self.size_of(self.root)
    }

    pub fn is_empty(&self) -> bool {
        !self.root.exists()
    }

    /// Number of items with `cur_state == INSERTED`.
    #[allow(unused)]
    pub fn cur_len(&self) -> usize {
        self.cur_of(self.root)
    }

    /// Number of items with `end_state == INSERTED`.
    #[allow(unused)]
    pub fn end_len(&self) -> usize {
        self.end_of(self.root)
    }

    fn size_of(&self, n: NodeIdx) -> usize {
        if n.exists() {
            self.nodes[n.0].size
        } else {
            0
        }
    }

    fn cur_of(&self, n: NodeIdx) -> usize {
        if n.exists() {
            self.nodes[n.0].cur_ins
        } else {
            0
        }
    }

    fn end_of(&self, n: NodeIdx) -> usize {
        if n.exists() {
            self.nodes[n.0].end_ins
        } else {
            0
        }
    }

    fn height_of(&self, n: NodeIdx) -> u8 {
        if n.exists() {
            self.nodes[n.0].height
        } else {
            0
        }
    }

    pub fn item(&self, n: NodeIdx) -> &Item {
        &self.nodes[n.0].item
    }

    /// Mutable access to an item. The caller must call
    /// [`refresh_counts`](Self::refresh_counts) after changing either state.
    pub fn item_mut(&mut self, n: NodeIdx) -> &mut Item {
        &mut self.nodes[n.0].item
    }

    /// Find the node at the given in-order index. O(log n).
    pub fn node_at(&self, mut at: usize) -> NodeIdx {
        let mut n = self.root;
        loop {
            assert!(n.exists(), "Item index past end of tree");
            let node = &self.nodes[n.0];
            let lsize = self.size_of(node.left);
            if at < lsize {
                n = node.left;
            } else if at == lsize {
                return n;
            } else {
                at -= lsize + 1;
                n = node.right;
            }
        }
    }

    pub fn get(&self, at: usize) -> &Item {
        self.item(self.node_at(at))
    }

    /// The in-order index of a node. O(log n), walking parent pointers.
    pub fn index_of(&self, n: NodeIdx) -> usize {
        let mut idx = self.size_of(self.nodes[n.0].left);
        let mut c = n;
        let mut p = self.nodes[n.0].parent;
        while p.exists() {
            let pn = &self.nodes[p.0];
            if pn.right == c {
                idx += self.size_of(pn.left) + 1;
            }
            c = p;
            p = pn.parent;
        }
        idx
    }

    /// Insert an item so it lands at in-order index `at`. O(log n). Returns
    /// the new node's handle, which remains stable for the tree's lifetime.
    pub fn insert_at(&mut self, at: usize, item: Item) -> NodeIdx {
        debug_assert!(at <= self.len());

        let new = NodeIdx(self.nodes.len());

        if !self.root.exists() {
            debug_assert_eq!(at, 0);
            self.nodes.push(Node::new_leaf(item, NodeIdx::NONE));
            self.root = new;
            return new;
        }

        let mut n = self.root;
        let mut at = at;
        loop {
            let node = &self.nodes[n.0];
            let left = node.left;
            let right = node.right;
            let lsize = self.size_of(left);

            if at <= lsize {
                if left.exists() {
                    n = left;
                } else {
                    debug_assert_eq!(at, 0);
                    self.nodes.push(Node::new_leaf(item, n));
                    self.nodes[n.0].left = new;
                    break;
                }
            } else {
                at -= lsize + 1;
                if right.exists() {
                    n = right;
                } else {
                    debug_assert_eq!(at, 0);
                    self.nodes.push(Node::new_leaf(item, n));
                    self.nodes[n.0].right = new;
                    break;
                }
            }
        }

        self.rebalance_from(n);
        new
    }

    /// Re-sum `cur_ins` / `end_ins` from a node up to the root, after the
    /// caller mutated the node's item states. O(log n). Sizes and heights are
    /// untouched - state flips never move items.
    pub fn refresh_counts(&mut self, n: NodeIdx) {
        let mut n = n;
        while n.exists() {
            let node = &self.nodes[n.0];
            let cur = self.cur_of(node.left)
                + self.cur_of(node.right)
                + (node.item.cur_state == INSERTED) as usize;
            let end = self.end_of(node.left)
                + self.end_of(node.right)
                + (node.item.end_state == INSERTED) as usize;
            let parent = node.parent;

            let node = &mut self.nodes[n.0];
            node.cur_ins = cur;
            node.end_ins = end;
            n = parent;
        }
    }

    /// Find the location `target` current-visible items in. Returns
    /// `(index, end_pos)`, where index is the smallest in-order index with
    /// exactly `target` current-inserted items before it, and end_pos counts
    /// the end-inserted items in that same prefix.
    ///
    /// Equivalent to scanning items left to right, bumping a counter for each
    /// current-inserted item, and stopping the moment the counter hits
    /// `target`.
    pub fn find_by_cur_pos(&self, target: usize) -> (usize, usize) {
        if target == 0 {
            return (0, 0);
        }

        let mut n = self.root;
        let mut k = target; // 1-indexed: looking for the k-th current-inserted item.
        let mut idx = 0;
        let mut end_pos = 0;

        loop {
            assert!(n.exists(), "Current position past end of items");
            let node = &self.nodes[n.0];
            let lcur = self.cur_of(node.left);

            if k <= lcur {
                n = node.left;
                continue;
            }
            k -= lcur;
            idx += self.size_of(node.left);
            end_pos += self.end_of(node.left);

            let here = node.item.cur_state == INSERTED;
            idx += 1;
            end_pos += (node.item.end_state == INSERTED) as usize;
            if here {
                if k == 1 {
                    return (idx, end_pos);
                }
                k -= 1;
            }
            n = node.right;
        }
    }

    /// Fill an empty tree with `n` items, perfectly balanced. Item `i` is
    /// guaranteed to live at `NodeIdx(i)`.
    pub fn fill_balanced(&mut self, n: usize, mut make: impl FnMut(usize) -> Item) {
        assert!(self.is_empty() && self.nodes.is_empty());
        if n == 0 {
            return;
        }

        self.nodes.reserve(n);
        for i in 0..n {
            let item = make(i);
            self.nodes.push(Node::new_leaf(item, NodeIdx::NONE));
        }
        self.root = self.build_range(0, n, NodeIdx::NONE);
    }

    fn build_range(&mut self, lo: usize, hi: usize, parent: NodeIdx) -> NodeIdx {
        if lo >= hi {
            return NodeIdx::NONE;
        }
        let mid = (lo + hi) / 2;
        let n = NodeIdx(mid);
        self.nodes[mid].parent = parent;
        let left = self.build_range(lo, mid, n);
        let right = self.build_range(mid + 1, hi, n);
        self.nodes[mid].left = left;
        self.nodes[mid].right = right;
        self.update_node(n);
        n
    }

    /// Recompute a node's aggregates and height from its children.
    fn update_node(&mut self, n: NodeIdx) {
        let node = &self.nodes[n.0];
        let (left, right) = (node.left, node.right);
        let size = 1 + self.size_of(left) + self.size_of(right);
        let cur = self.cur_of(left)
            + self.cur_of(right)
            + (node.item.cur_state == INSERTED) as usize;
        let end = self.end_of(left)
            + self.end_of(right)
            + (node.item.end_state == INSERTED) as usize;
        let height = 1 + self.height_of(left).max(self.height_of(right));

        let node = &mut self.nodes[n.0];
        node.size = size;
        node.cur_ins = cur;
        node.end_ins = end;
        node.height = height;
    }

    fn balance_of(&self, n: NodeIdx) -> i32 {
        let node = &self.nodes[n.0];
        self.height_of(node.left) as i32 - self.height_of(node.right) as i32
    }

    /// AVL rebalance from a node up to the root, updating aggregates along
    /// the way.
    fn rebalance_from(&mut self, mut n: NodeIdx) {
        while n.exists() {
            self.update_node(n);

            let bf = self.balance_of(n);
            if bf > 1 {
                let left = self.nodes[n.0].left;
                if self.balance_of(left) < 0 {
                    self.rotate_left(left);
                }
                n = self.rotate_right(n);
            } else if bf < -1 {
                let right = self.nodes[n.0].right;
                if self.balance_of(right) > 0 {
                    self.rotate_right(right);
                }
                n = self.rotate_left(n);
            }

            n = self.nodes[n.0].parent;
        }
    }

    /// Rotate the subtree rooted at `n` to the right. Returns the new subtree
    /// root (n's old left child). Parent pointers of both rotated nodes, the
    /// moved middle subtree and the grandparent are all re-pointed.
    fn rotate_right(&mut self, n: NodeIdx) -> NodeIdx {
        let parent = self.nodes[n.0].parent;
        let pivot = self.nodes[n.0].left;
        debug_assert!(pivot.exists());
        let middle = self.nodes[pivot.0].right;

        self.nodes[n.0].left = middle;
        if middle.exists() {
            self.nodes[middle.0].parent = n;
        }

        self.nodes[pivot.0].right = n;
        self.nodes[n.0].parent = pivot;

        self.nodes[pivot.0].parent = parent;
        if parent.exists() {
            let pn = &mut self.nodes[parent.0];
            if pn.left == n {
                pn.left = pivot;
            } else {
                debug_assert_eq!(pn.right, n);
                pn.right = pivot;
            }
        } else {
            self.root = pivot;
        }

        self.update_node(n);
        self.update_node(pivot);
        pivot
    }

    /// Mirror image of [`rotate_right`](Self::rotate_right).
    fn rotate_left(&mut self, n: NodeIdx) -> NodeIdx {
        let parent = self.nodes[n.0].parent;
        let pivot = self.nodes[n.0].right;
        debug_assert!(pivot.exists());
        let middle = self.nodes[pivot.0].left;

        self.nodes[n.0].right = middle;
        if middle.exists() {
            self.nodes[middle.0].parent = n;
        }

        self.nodes[pivot.0].left = n;
        self.nodes[n.0].parent = pivot;

        self.nodes[pivot.0].parent = parent;
        if parent.exists() {
            let pn = &mut self.nodes[parent.0];
            if pn.left == n {
                pn.left = pivot;
            } else {
                debug_assert_eq!(pn.right, n);
                pn.right = pivot;
            }
        } else {
            self.root = pivot;
        }

        self.update_node(n);
        self.update_node(pivot);
        pivot
    }

    #[allow(unused)]
    pub(crate) fn dbg_check(&self) {
        if !self.root.exists() {
            return;
        }
        assert_eq!(self.nodes[self.root.0].parent, NodeIdx::NONE);
        self.dbg_check_node(self.root);
    }

    #[allow(unused)]
    fn dbg_check_node(&self, n: NodeIdx) -> (usize, usize, usize, u8) {
        let node = &self.nodes[n.0];

        let (ls, lc, le, lh) = if node.left.exists() {
            assert_eq!(self.nodes[node.left.0].parent, n);
            self.dbg_check_node(node.left)
        } else {
            (0, 0, 0, 0)
        };
        let (rs, rc, re, rh) = if node.right.exists() {
            assert_eq!(self.nodes[node.right.0].parent, n);
            self.dbg_check_node(node.right)
        } else {
            (0, 0, 0, 0)
        };

        let size = 1 + ls + rs;
        let cur = lc + rc + (node.item.cur_state == INSERTED) as usize;
        let end = le + re + (node.item.end_state == INSERTED) as usize;
        let height = 1 + lh.max(rh);

        assert_eq!(node.size, size);
        assert_eq!(node.cur_ins, cur);
        assert_eq!(node.end_ins, end);
        assert_eq!(node.height, height);
        assert!((lh as i32 - rh as i32).abs() <= 1, "Tree is unbalanced");

        (size, cur, end, height)
    }
}
