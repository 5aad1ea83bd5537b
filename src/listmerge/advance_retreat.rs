//! Moving the walk backward and forward through already-applied operations.
//!
//! Before applying an operation, the walk must sit exactly at the operation's
//! parent version. `retreat1` unwinds one operation's effect on the items'
//! current state; `advance1` re-applies it. Neither touches end states - an
//! operation's effect on the final document is decided once, at apply time.

use crate::list::operation::ListOp;
use crate::list::{ListValue, OpLog};
use crate::listmerge::EditContext;
use crate::ost::NodeIdx;
use crate::LV;

impl EditContext {
    /// The item affected by this (already applied) operation, and whether the
    /// operation was an insert.
    fn target_of<T: ListValue>(&self, oplog: &OpLog<T>, lv: LV) -> (NodeIdx, bool) {
        match &oplog.ops[lv] {
            ListOp::Ins { .. } => (self.item_node(lv), true),
            ListOp::Del { .. } => {
                let target = self.del_targets[lv];
                debug_assert_ne!(target, usize::MAX, "Retreating a delete that never applied");
                (self.item_node(target), false)
            }
        }
    }

    /// Move the walk's current state back over one operation. Ranges must be
    /// retreated in descending order so a delete is unwound before the insert
    /// it deleted.
    pub(crate) fn retreat1<T: ListValue>(&mut self, oplog: &OpLog<T>, lv: LV) {
        let (node, is_ins) = self.target_of(oplog, lv);
        let item = self.items.item_mut(node);

        if is_ins {
            item.cur_state.mark_not_inserted_yet();
        } else {
            item.cur_state.undelete();
        }

        self.items.refresh_counts(node);
    }

    /// The inverse of [`retreat1`](Self::retreat1). Ranges must be advanced
    /// in ascending order.
    pub(crate) fn advance1<T: ListValue>(&mut self, oplog: &OpLog<T>, lv: LV) {
        let (node, is_ins) = self.target_of(oplog, lv);
        let item = self.items.item_mut(node);

        if is_ins {
            item.cur_state.mark_inserted();
        } else {
            item.cur_state.delete();
        }

        self.items.refresh_counts(node);
    }
}
