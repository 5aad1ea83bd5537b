//! The merge engine. This module implements the event-graph walker: a
//! transient structure which replays operations from the op log - in any
//! causal order - and computes where each one lands in the final document.
//!
//! The walker holds no state between merges. An [`EditContext`] is created
//! for one checkout or one merge, does its work, and is dropped.

pub(crate) mod advance_retreat;
pub(crate) mod item;
pub(crate) mod merge;

use crate::frontier::Frontier;
use crate::listmerge::item::{Item, INSERTED};
use crate::lvrange::{is_underwater, UNDERWATER_START};
use crate::ost::{ItemTree, NodeIdx};
use crate::LV;

/// A remembered location from the previous apply, so runs of typing don't pay
/// a tree descent per character. Purely a speedup - correctness never depends
/// on it.
#[derive(Debug, Copy, Clone)]
pub(crate) struct CursorHint {
    pos: usize,
    idx: usize,
    end_pos: usize,
}

/// How far past the hint a linear scan is still cheaper than a fresh descent.
const HINT_MAX_SKIP: usize = 4;

#[derive(Debug)]
pub(crate) struct EditContext {
    /// All items the walk knows about, in document order.
    pub(crate) items: ItemTree,

    /// For each delete operation (by LV), the op_id of the item it deleted.
    /// usize::MAX = not applied yet.
    del_targets: Vec<LV>,

    /// For each insert operation (by LV), the node holding its item.
    items_by_lv: Vec<NodeIdx>,

    /// The version the walk is currently sitting at.
    pub(crate) cur_version: Frontier,

    cursor_hint: Option<CursorHint>,
}

impl EditContext {
    /// Create a context covering an op log with `num_ops` operations,
    /// starting at `cur_version`, with `num_placeholders` placeholder items
    /// representing the document content at (or below) that version.
    pub(crate) fn new(num_ops: usize, cur_version: Frontier, num_placeholders: usize) -> Self {
        let mut items = ItemTree::with_capacity(num_placeholders + num_ops);
        // Placeholder i is at NodeIdx(i); item_node relies on that.
        items.fill_balanced(num_placeholders, Item::new_underwater);

        EditContext {
            items,
            del_targets: vec![usize::MAX; num_ops],
            items_by_lv: vec![NodeIdx::NONE; num_ops],
            cur_version,
            cursor_hint: None,
        }
    }

    /// The node holding the item with this op id. Underwater ids resolve to
    /// the placeholder items seeded at construction.
    pub(crate) fn item_node(&self, op_id: LV) -> NodeIdx {
        if is_underwater(op_id) {
            NodeIdx(op_id - UNDERWATER_START)
        } else {
            let node = self.items_by_lv[op_id];
            debug_assert!(node.exists(), "Item for op {op_id} not in tree");
            node
        }
    }

    pub(crate) fn index_of_item(&self, op_id: LV) -> usize {
        self.items.index_of(self.item_node(op_id))
    }

    /// Find the insert location `target` current-visible items in. Returns
    /// `(index, end_pos)`. Takes the fast path through the cursor hint when
    /// the target is just past the last apply.
    pub(crate) fn find_by_cur_pos(&self, target: usize) -> (usize, usize) {
        if let Some(h) = &self.cursor_hint {
            if target >= h.pos && target - h.pos <= HINT_MAX_SKIP {
                let mut pos = h.pos;
                let mut idx = h.idx;
                let mut end_pos = h.end_pos;
                while pos < target {
                    let item = self.items.get(idx);
                    if item.cur_state == INSERTED {
                        pos += 1;
                    }
                    if item.end_state == INSERTED {
                        end_pos += 1;
                    }
                    idx += 1;
                }
                return (idx, end_pos);
            }
        }

        self.items.find_by_cur_pos(target)
    }

    pub(crate) fn set_cursor_hint(&mut self, pos: usize, idx: usize, end_pos: usize) {
        self.cursor_hint = Some(CursorHint { pos, idx, end_pos });
    }

    pub(crate) fn clear_cursor_hint(&mut self) {
        self.cursor_hint = None;
    }
}
