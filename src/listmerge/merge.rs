//! Applying operations to the walk: the integration algorithm itself.

use std::cmp::Ordering;

use crate::causalgraph::CausalGraph;
use crate::list::operation::ListOp;
use crate::list::{InlineReplace, ListValue, OpLog};
use crate::listmerge::item::{Item, INSERTED, NOT_INSERTED_YET};
use crate::listmerge::EditContext;
use crate::{Frontier, LVRange, LV};

impl EditContext {
    /// Apply one operation at the walk's current version, updating the item
    /// index and (if provided) mirroring the effect into the output snapshot.
    ///
    /// Must be called exactly once per LV, with `cur_version` equal to the
    /// operation's parents.
    pub(crate) fn apply1<T: ListValue, S: InlineReplace<T>>(
        &mut self,
        oplog: &OpLog<T>,
        mut to: Option<&mut S>,
        lv: LV,
    ) {
        match &oplog.ops[lv] {
            ListOp::Del { pos } => {
                let (mut idx, mut end_pos) = self.find_by_cur_pos(*pos);

                // The cursor points at the first item *after* pos current
                // characters. Items which aren't currently visible
                // (tombstones, or inserts this op's author hadn't seen) sit
                // between us and the item being deleted.
                loop {
                    let item = self.items.get(idx);
                    if item.cur_state == INSERTED {
                        break;
                    }
                    if item.end_state == INSERTED {
                        end_pos += 1;
                    }
                    idx += 1;
                }

                let node = self.items.node_at(idx);
                let item = self.items.item_mut(node);
                let was_visible = item.end_state == INSERTED;
                item.cur_state.delete();
                item.end_state.delete();
                let target = item.op_id;

                self.items.refresh_counts(node);
                self.del_targets[lv] = target;

                if was_visible {
                    if let Some(to) = to.as_deref_mut() {
                        to.remove_at(end_pos);
                    }
                }

                self.clear_cursor_hint();
            }

            ListOp::Ins { pos, content } => {
                let (idx, end_pos) = self.find_by_cur_pos(*pos);

                let origin_left = if idx == 0 {
                    usize::MAX
                } else {
                    self.items.get(idx - 1).op_id
                };

                // Fugue style right parent: scan for the first item that the
                // author could see. If it hangs off the same left origin as
                // us, we're its left sibling and it becomes our right parent.
                let mut right_parent = usize::MAX;
                for i in idx..self.items.len() {
                    let other = self.items.get(i);
                    if other.cur_state != NOT_INSERTED_YET {
                        if other.origin_left == origin_left {
                            right_parent = other.op_id;
                        }
                        break;
                    }
                }

                let new_item = Item {
                    op_id: lv,
                    cur_state: INSERTED,
                    end_state: INSERTED,
                    origin_left,
                    right_parent,
                };

                let (idx, end_pos) = self.integrate(&oplog.cg, &new_item, idx, end_pos);

                let node = self.items.insert_at(idx, new_item);
                self.items_by_lv[lv] = node;

                if let Some(to) = to.as_deref_mut() {
                    to.insert_at(end_pos, content.clone());
                }

                self.set_cursor_hint(pos + 1, idx + 1, end_pos + 1);
            }
        }
    }

    /// Resolve where a new item lands among concurrent not-yet-inserted
    /// items at the same position. Returns the adjusted (index, end_pos).
    ///
    /// This is the YjsMod / fugue-max scan: walk right over concurrent items,
    /// comparing left origins (and right parents on a tie), falling back to
    /// the total order over (agent, seq) when both match. The result is the
    /// same on every peer regardless of arrival order.
    fn integrate(
        &self,
        cg: &CausalGraph,
        new_item: &Item,
        mut idx: usize,
        mut end_pos: usize,
    ) -> (usize, usize) {
        let mut scan_idx = idx;
        let mut scan_end_pos = end_pos;

        let left_idx = idx as isize - 1;
        let right_idx = if new_item.right_parent == usize::MAX {
            self.items.len() as isize
        } else {
            self.index_of_item(new_item.right_parent) as isize
        };

        let mut scanning = false;

        while scan_idx < self.items.len() {
            let other = self.items.get(scan_idx);

            // Only items concurrent with us are still not-inserted-yet here.
            if other.cur_state != NOT_INSERTED_YET {
                break;
            }
            debug_assert_ne!(other.op_id, new_item.right_parent);

            let other_left_idx = if other.origin_left == usize::MAX {
                -1
            } else {
                self.index_of_item(other.origin_left) as isize
            };

            match other_left_idx.cmp(&left_idx) {
                Ordering::Less => break,
                Ordering::Greater => {} // Keep scanning.
                Ordering::Equal => {
                    let other_right_idx = if other.right_parent == usize::MAX {
                        self.items.len() as isize
                    } else {
                        self.index_of_item(other.right_parent) as isize
                    };

                    if other_right_idx == right_idx
                        && cg.lv_cmp(new_item.op_id, other.op_id) == Ordering::Less
                    {
                        // Both items agree on their surroundings and we order
                        // first. Insert here.
                        break;
                    }
                    scanning = other_right_idx < right_idx;
                }
            }

            if other.end_state == INSERTED {
                scan_end_pos += 1;
            }
            scan_idx += 1;

            if !scanning {
                idx = scan_idx;
                end_pos = scan_end_pos;
            }
        }

        (idx, end_pos)
    }

    /// Walk the op log from `range.start` to `range.end`, applying every
    /// operation in LV order. Before each run the walk retreats out of
    /// operations the run's author hadn't seen and advances into ones it had,
    /// so each op applies at exactly its parent version.
    ///
    /// `to` (when provided) is mutated to reflect every applied operation.
    pub(crate) fn traverse_and_apply<T: ListValue, S: InlineReplace<T>>(
        &mut self,
        oplog: &OpLog<T>,
        mut to: Option<&mut S>,
        range: LVRange,
    ) {
        for entry in oplog.cg.graph.iter_range(range) {
            let (only_a, only_b) = oplog
                .cg
                .graph
                .diff(self.cur_version.as_ref(), entry.parents.as_ref());

            let did_move = !only_a.is_empty() || !only_b.is_empty();

            // Retreat in descending order so deletes unwind before the
            // inserts they target.
            for r in only_a.iter().rev() {
                for lv in r.iter().rev() {
                    self.retreat1(oplog, lv);
                }
            }
            for r in only_b.iter() {
                for lv in r.iter() {
                    self.advance1(oplog, lv);
                }
            }

            if did_move {
                self.clear_cursor_hint();
            }

            for lv in entry.span.iter() {
                self.apply1(oplog, to.as_deref_mut(), lv);
            }

            self.cur_version = Frontier::new_1(entry.span.last());
        }
    }
}
