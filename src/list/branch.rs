use jumprope::JumpRopeBuf;
use smallvec::{smallvec, SmallVec};

use crate::causalgraph::graph::tools::DiffFlag;
use crate::frontier::Frontier;
use crate::list::operation::ListOp;
use crate::list::{Branch, InlineReplace, ListValue, OpLog, TextBranch};
use crate::listmerge::EditContext;
use crate::rle::AppendRle;
use crate::{LVRange, LV};

/// Replay an entire op log from scratch into a fresh snapshot sink.
pub(crate) fn checkout_into<T: ListValue, S: InlineReplace<T>>(oplog: &OpLog<T>, content: &mut S) {
    let mut ctx = EditContext::new(oplog.len(), Frontier::root(), 0);
    ctx.traverse_and_apply(oplog, Some(content), (0..oplog.len()).into());
}

/// Compute the current document content of an op log. This replays the whole
/// log; use a [`Branch`] (or [`Document`](crate::Document)) to edit
/// incrementally.
pub fn checkout<T: ListValue>(oplog: &OpLog<T>) -> Branch<T> {
    let mut content = Vec::new();
    checkout_into(oplog, &mut content);
    Branch {
        content,
        version: Frontier::from_sorted(oplog.local_version()),
    }
}

/// [`checkout`], returning just the content.
pub fn checkout_simple<T: ListValue>(oplog: &OpLog<T>) -> Vec<T> {
    checkout(oplog).content
}

/// Checkout for text op logs, materializing through a rope so splices in a
/// large document don't shuffle one flat buffer around.
pub fn checkout_simple_string(oplog: &OpLog<char>) -> String {
    let mut content = JumpRopeBuf::new();
    checkout_into(oplog, &mut content);
    content.to_string()
}

/// Apply new operations between `version` and `merge_version` to a snapshot.
///
/// When the new operations linearly extend `version` they're applied
/// positionally, character by character. Otherwise the merge engine replays
/// the conflicting region: a fresh walk is seeded with placeholder items for
/// the document below the common ancestor, silently replays the ops the
/// branch has already seen (rebuilding the walk's state), then applies the
/// new ops through the full integration machinery.
pub(crate) fn merge_changes_into_sink<T: ListValue, S: InlineReplace<T>>(
    oplog: &OpLog<T>,
    version: &mut Frontier,
    content: &mut S,
    merge_version: &[LV],
) {
    let graph = &oplog.cg.graph;

    if let Some(ff_ranges) = graph.fast_forward_ranges(version.as_ref(), merge_version) {
        for range in ff_ranges {
            for lv in range.iter() {
                apply_op_positionally(oplog, content, lv);
            }
        }
        *version = graph.version_union(version.as_ref(), merge_version);
        return;
    }

    // Both lists are built in reverse version order, then flipped.
    let mut new_ops: SmallVec<[LVRange; 4]> = smallvec![];
    let mut conflict_ops: SmallVec<[LVRange; 4]> = smallvec![];

    let common_ancestor = graph.find_conflicting(version.as_ref(), merge_version, |span, flag| {
        // Visited in reverse order. Shared spans sit above the common
        // ancestor too, so they join the conflict set - the walk needs their
        // items to position everything else.
        let target = if flag == DiffFlag::OnlyB {
            &mut new_ops
        } else {
            &mut conflict_ops
        };
        target.push_reversed_rle(span);
    });
    new_ops.reverse();
    conflict_ops.reverse();

    // Placeholders stand in for the document below the common ancestor. One
    // per version up to the branch frontier is always enough - positions are
    // bounded by the number of operations - and surplus placeholders sit
    // after every reachable position.
    let num_placeholders = version.last().map_or(0, |v| v + 1);
    let mut ctx = EditContext::new(oplog.len(), common_ancestor, num_placeholders);

    for range in &conflict_ops {
        ctx.traverse_and_apply::<T, S>(oplog, None, *range);
    }
    for range in &new_ops {
        ctx.traverse_and_apply(oplog, Some(&mut *content), *range);
    }

    *version = graph.version_union(version.as_ref(), merge_version);
}

/// Apply one operation to a snapshot at face value. Only valid when the op's
/// history is linear from the snapshot's version.
pub(crate) fn apply_op_positionally<T: ListValue, S: InlineReplace<T>>(
    oplog: &OpLog<T>,
    content: &mut S,
    lv: LV,
) {
    match &oplog.ops[lv] {
        ListOp::Ins { pos, content: val } => content.insert_at(*pos, val.clone()),
        ListOp::Del { pos } => content.remove_at(*pos),
    }
}

impl<T: ListValue> Branch<T> {
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            version: Frontier::root(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Bring this branch up to `merge_version`, merging any operations it
    /// hasn't seen.
    pub fn merge(&mut self, oplog: &OpLog<T>, merge_version: &[LV]) {
        merge_changes_into_sink(oplog, &mut self.version, &mut self.content, merge_version);
    }

    /// Bring this branch up to everything the op log knows.
    pub fn merge_all(&mut self, oplog: &OpLog<T>) {
        self.merge(oplog, oplog.local_version());
    }
}

impl TextBranch {
    pub fn new() -> Self {
        Self {
            content: JumpRopeBuf::new(),
            version: Frontier::root(),
        }
    }

    pub fn len_chars(&self) -> usize {
        self.content.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn merge(&mut self, oplog: &OpLog<char>, merge_version: &[LV]) {
        merge_changes_into_sink(oplog, &mut self.version, &mut self.content, merge_version);
    }

    pub fn merge_all(&mut self, oplog: &OpLog<char>) {
        self.merge(oplog, oplog.local_version());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_content(content: &[char]) -> String {
        content.iter().collect()
    }

    #[test]
    fn empty_oplog_checks_out_empty() {
        let oplog: OpLog<char> = OpLog::new();
        let branch = checkout(&oplog);
        assert!(branch.content.is_empty());
        assert!(branch.version.is_root());
        assert_eq!(checkout_simple_string(&oplog), "");

        let empty = Branch::<char>::new();
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert_eq!(empty, branch);

        assert!(TextBranch::new().is_empty());
    }

    #[test]
    fn sequential_edits_check_out() {
        let mut oplog: OpLog<char> = OpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        oplog.local_insert(seph, 0, "hello".chars());
        oplog.local_insert(seph, 5, " world".chars());
        oplog.local_delete(seph, 0, 1).unwrap();

        let branch = checkout(&oplog);
        assert_eq!(str_content(&branch.content), "ello world");
        assert_eq!(branch.version.as_ref(), oplog.local_version());
        assert_eq!(checkout_simple_string(&oplog), "ello world");
    }

    #[test]
    fn concurrent_root_inserts_order_by_agent() {
        // Two peers insert from an empty document. Agent names break the tie:
        // "alice" sorts before "bob", so alice's run appears first.
        let mut a: OpLog<char> = OpLog::new();
        let alice = a.get_or_create_agent_id("alice");
        a.local_insert(alice, 0, "Hello".chars());

        let mut b: OpLog<char> = OpLog::new();
        let bob = b.get_or_create_agent_id("bob");
        b.local_insert(bob, 0, "World".chars());

        a.merge_from(&b).unwrap();
        b.merge_from(&a).unwrap();

        assert_eq!(checkout_simple_string(&a), "HelloWorld");
        assert_eq!(checkout_simple_string(&b), "HelloWorld");
    }

    #[test]
    fn concurrent_insert_and_range_delete() {
        // Common ancestor "hello". One peer appends "!", the other deletes
        // everything. The deletes only ever target the ancestor characters,
        // so the "!" survives.
        let mut a: OpLog<char> = OpLog::new();
        let seph = a.get_or_create_agent_id("seph");
        a.local_insert(seph, 0, "hello".chars());

        let mut b = a.clone();
        let mike = b.get_or_create_agent_id("mike");

        a.local_insert(seph, 5, "!".chars());
        b.local_delete(mike, 0, 5).unwrap();

        a.merge_from(&b).unwrap();
        b.merge_from(&a).unwrap();

        assert_eq!(checkout_simple_string(&a), "!");
        assert_eq!(checkout_simple_string(&b), "!");
    }

    #[test]
    fn branch_merge_matches_checkout() {
        let mut a: OpLog<char> = OpLog::new();
        let alice = a.get_or_create_agent_id("alice");
        a.local_insert(alice, 0, "x".chars());

        let mut b = a.clone();
        let bob = b.get_or_create_agent_id("bob");

        // A branch which has already seen alice's concurrent edit...
        a.local_insert(alice, 1, "A".chars());
        let mut branch = checkout(&a);

        // ...merges bob's concurrent edit incrementally.
        b.local_insert(bob, 1, "B".chars());
        a.merge_from(&b).unwrap();
        branch.merge_all(&a);

        let full = checkout(&a);
        assert_eq!(branch.content, full.content);
        assert_eq!(branch.version, full.version);
        assert_eq!(str_content(&branch.content), "xAB");
    }

    #[test]
    fn fast_forward_merge_equals_full_replay() {
        let mut oplog: OpLog<char> = OpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        oplog.local_insert(seph, 0, "abc".chars());

        let mut branch = checkout(&oplog);
        assert!(str_content(&branch.content) == "abc");

        // New ops linearly extend the branch's version: the merge takes the
        // positional fast path.
        oplog.local_insert(seph, 3, "def".chars());
        assert!(oplog
            .cg
            .graph
            .can_fast_forward(branch.version.as_ref(), oplog.local_version()));

        branch.merge_all(&oplog);
        assert_eq!(str_content(&branch.content), "abcdef");
        assert_eq!(branch.content, checkout_simple(&oplog));
        assert_eq!(branch.version.as_ref(), oplog.local_version());
    }

    #[test]
    fn text_branch_merges() {
        let mut oplog: OpLog<char> = OpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        oplog.local_insert(seph, 0, "rope content".chars());
        oplog.local_delete(seph, 0, 5).unwrap();

        let mut branch = TextBranch::new();
        branch.merge_all(&oplog);
        assert_eq!(branch.content.to_string(), "content");
        assert_eq!(branch.len_chars(), 7);
    }

    #[test]
    fn double_delete_converges() {
        // Both peers delete the same character concurrently. It dies once.
        let mut a: OpLog<char> = OpLog::new();
        let seph = a.get_or_create_agent_id("seph");
        a.local_insert(seph, 0, "abc".chars());

        let mut b = a.clone();
        let mike = b.get_or_create_agent_id("mike");

        a.local_delete(seph, 1, 1).unwrap();
        b.local_delete(mike, 1, 1).unwrap();

        a.merge_from(&b).unwrap();
        b.merge_from(&a).unwrap();

        assert_eq!(checkout_simple_string(&a), "ac");
        assert_eq!(checkout_simple_string(&b), "ac");
    }
}
