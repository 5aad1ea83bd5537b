//! Tools for interacting with the causal graph as a time DAG: finding diffs
//! between versions, walking conflicting regions and moving between branches.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use smallvec::{smallvec, SmallVec};

use crate::causalgraph::graph::tools::DiffFlag::*;
use crate::causalgraph::graph::Graph;
use crate::frontier::{debug_assert_frontier_sorted, Frontier};
use crate::rle::{AppendRle, SplitableSpan};
use crate::{LVRange, LV};

/// The diff and conflict walks need to tag each queue entry based on whether
/// its part of a's history, b's history or both, without changing the sort
/// order of the heap.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum DiffFlag {
    OnlyA,
    OnlyB,
    Shared,
}

pub type DiffResult = (SmallVec<[LVRange; 4]>, SmallVec<[LVRange; 4]>);

impl Graph {
    /// Is `b` a direct (same entry or same entry run) ancestor of `a`? This is
    /// cheap to compute and catches the common cases, but misses transitive
    /// ancestry.
    pub(crate) fn is_direct_descendant_coarse(&self, a: LV, b: LV) -> bool {
        a == b || (a > b && self.entries.find_packed(a).contains(b))
    }

    /// Compare two versions by ancestry. Returns None when the versions are
    /// concurrent.
    pub fn version_cmp(&self, v1: LV, v2: LV) -> Option<Ordering> {
        match v1.cmp(&v2) {
            Ordering::Equal => Some(Ordering::Equal),
            Ordering::Less => {
                if self.version_contains(&[v2], v1) {
                    Some(Ordering::Less)
                } else {
                    None
                }
            }
            Ordering::Greater => {
                if self.version_contains(&[v1], v2) {
                    Some(Ordering::Greater)
                } else {
                    None
                }
            }
        }
    }

    /// Does the version named by `frontier` contain (dominate) `target`?
    pub fn version_contains(&self, frontier: &[LV], target: LV) -> bool {
        if frontier.contains(&target) {
            return true;
        }
        if frontier.is_empty() {
            return false;
        }

        // BFS upward through history, high to low. Branches at or below
        // target within a single entry run terminate the search; branches
        // entirely below target are discarded.
        let mut queue = BinaryHeap::new();

        for &o in frontier {
            debug_assert_ne!(o, target);
            if o > target {
                queue.push(o);
            }
        }

        while let Some(v) = queue.pop() {
            debug_assert!(v > target);

            let entry = self.entries.find_packed(v);
            // v and target in the same run means target is a linear ancestor.
            if entry.span.start <= target {
                return true;
            }

            // Drain other queued versions covered by this entry.
            while let Some(&next) = queue.peek() {
                if next >= entry.span.start {
                    queue.pop();
                } else {
                    break;
                }
            }

            for &p in entry.parents.iter() {
                #[allow(clippy::comparison_chain)]
                if p == target {
                    return true;
                } else if p > target {
                    queue.push(p);
                }
                // If p < target it can't be a descendant of target. Discard.
            }
        }

        false
    }

    /// Calculate the part of each version's history the other version hasn't
    /// seen. Returns (only in a, only in b) as ascending, coalesced ranges.
    pub fn diff(&self, a: &[LV], b: &[LV]) -> DiffResult {
        debug_assert_frontier_sorted(a);
        debug_assert_frontier_sorted(b);

        // Some simple short circuits first. Most calls to diff in practice
        // hit one of these.
        if a == b {
            return (smallvec![], smallvec![]);
        }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                // a >= b.
                return (smallvec![(b + 1..a + 1).into()], smallvec![]);
            }
            if self.is_direct_descendant_coarse(b, a) {
                // b >= a.
                return (smallvec![], smallvec![(a + 1..b + 1).into()]);
            }
        }

        self.diff_slow(a, b)
    }

    fn diff_slow(&self, a: &[LV], b: &[LV]) -> DiffResult {
        let mut only_a: SmallVec<[LVRange; 4]> = smallvec![];
        let mut only_b: SmallVec<[LVRange; 4]> = smallvec![];

        // Marks the inclusive range [start..=end] with the flag.
        let mark_run = |start: LV, end: LV, flag: DiffFlag| {
            let target = match flag {
                OnlyA => &mut only_a,
                OnlyB => &mut only_b,
                Shared => {
                    return;
                }
            };

            target.push_reversed_rle(LVRange::new(start, end + 1));
        };

        self.diff_slow_internal(a, b, mark_run);

        // The walk visits runs in descending order.
        only_a.reverse();
        only_b.reverse();
        (only_a, only_b)
    }

    fn diff_slow_internal<F>(&self, a: &[LV], b: &[LV], mut mark_run: F)
    where
        F: FnMut(LV, LV, DiffFlag),
    {
        // Sorted highest to lowest.
        let mut queue: BinaryHeap<(LV, DiffFlag)> = BinaryHeap::new();
        for &a_ord in a {
            queue.push((a_ord, OnlyA));
        }
        for &b_ord in b {
            queue.push((b_ord, OnlyB));
        }

        let mut num_shared_entries = 0;

        while let Some((mut v, mut flag)) = queue.pop() {
            if flag == Shared {
                num_shared_entries -= 1;
            }

            // Consume duplicate entries at the head of the queue.
            while let Some((peek_v, peek_flag)) = queue.peek() {
                if *peek_v != v {
                    break;
                }
                if *peek_flag != flag {
                    flag = Shared;
                }
                if *peek_flag == Shared {
                    num_shared_entries -= 1;
                }
                queue.pop();
            }

            let entry = self.entries.find_packed(v);

            // Two cases:
            // 1. The next queued item is within the same entry. Mark the
            //    segment down to it and continue with merged flags.
            // 2. It isn't. Mark the rest of the entry and queue its parents.
            while let Some((peek_v, peek_flag)) = queue.peek() {
                if *peek_v < entry.span.start {
                    break;
                }
                if *peek_flag != flag {
                    // Mark the run from the peeked version so the rest of the
                    // entry gets the merged flag.
                    mark_run(*peek_v + 1, v, flag);
                    v = *peek_v;
                    flag = Shared;
                }
                if *peek_flag == Shared {
                    num_shared_entries -= 1;
                }
                queue.pop();
            }

            mark_run(entry.span.start, v, flag);

            for &p in entry.parents.iter() {
                queue.push((p, flag));
                if flag == Shared {
                    num_shared_entries += 1;
                }
            }

            // If everything left in the queue is shared, stop.
            if queue.len() == num_shared_entries {
                break;
            }
        }
    }

    /// True when moving a branch from version `from` to `to` discards nothing
    /// - every operation in `from`'s history is also in `to`'s history.
    pub fn is_fast_forward(&self, from: &[LV], to: &[LV]) -> bool {
        let (only_a, _) = self.diff(from, to);
        only_a.is_empty()
    }

    /// A stricter test than [`is_fast_forward`](Self::is_fast_forward): the
    /// new operations must form a linear extension of `from`, so each one can
    /// be applied positionally without running the integration algorithm.
    ///
    /// Returns the new spans in ascending order when the test passes.
    pub(crate) fn fast_forward_ranges(
        &self,
        from: &[LV],
        to: &[LV],
    ) -> Option<SmallVec<[LVRange; 4]>> {
        if from == to {
            return Some(smallvec![]);
        }

        let (only_a, only_b) = self.diff(from, to);
        if !only_a.is_empty() {
            return None;
        }

        // Each new entry must have the frontier walked so far as its parents.
        let mut f = Frontier::from_sorted(from);
        for range in &only_b {
            for entry in self.iter_range(*range) {
                if entry.parents.as_ref() != f.as_ref() {
                    return None;
                }
                f = Frontier::new_1(entry.span.last());
            }
        }
        Some(only_b)
    }

    /// Whether new operations between `from` and `to` can be applied to a
    /// snapshot positionally, skipping the integration machinery entirely.
    pub fn can_fast_forward(&self, from: &[LV], to: &[LV]) -> bool {
        self.fast_forward_ranges(from, to).is_some()
    }
}

// *** Conflict walks ***

impl Graph {
    fn find_conflicting_slow<V>(&self, a: &[LV], b: &[LV], mut visit: V) -> Frontier
    where
        V: FnMut(LVRange, DiffFlag),
    {
        // Sorted highest to lowest, so the heap returns the highest points
        // first. usize::MAX (an empty frontier) sorts lowest via
        // wrapping_add(1).
        #[derive(Debug, PartialEq, Eq, Clone)]
        struct TimePoint {
            // For merges this is the highest version.
            last: LV,
            // Always sorted. Usually empty.
            merged_with: SmallVec<[LV; 1]>,
        }

        impl Ord for TimePoint {
            #[inline(always)]
            fn cmp(&self, other: &Self) -> Ordering {
                // wrapping_add(1) converts the root sentinel to 0.
                self.last
                    .wrapping_add(1)
                    .cmp(&other.last.wrapping_add(1))
                    .then_with(|| other.merged_with.is_empty().cmp(&self.merged_with.is_empty()))
            }
        }

        impl PartialOrd for TimePoint {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl From<LV> for TimePoint {
            fn from(v: LV) -> Self {
                Self {
                    last: v,
                    merged_with: Default::default(),
                }
            }
        }

        impl From<&[LV]> for TimePoint {
            fn from(version: &[LV]) -> Self {
                debug_assert_frontier_sorted(version);

                Self {
                    last: *version.last().unwrap_or(&usize::MAX),
                    merged_with: if version.len() > 1 {
                        SmallVec::from_slice(&version[..version.len() - 1])
                    } else {
                        smallvec![]
                    },
                }
            }
        }

        // The heap is sorted such that we pull the highest items first.
        let mut queue: BinaryHeap<(TimePoint, DiffFlag)> = BinaryHeap::new();
        queue.push((a.into(), OnlyA));
        queue.push((b.into(), OnlyB));

        // Loop until we've collapsed the graph down to a single element.
        let frontier: Frontier = 'outer: loop {
            let (time, mut flag) = queue.pop().unwrap();
            let t = time.last;

            if t == usize::MAX {
                break Frontier::root();
            }

            // Discard duplicate entries.
            while let Some((peek_time, peek_flag)) = queue.peek() {
                if *peek_time == time {
                    if *peek_flag != flag {
                        flag = Shared;
                    }
                    queue.pop();
                } else {
                    break;
                }
            }

            if queue.is_empty() {
                // In this order because time.last > time.merged_with.
                let mut frontier = Frontier::from_sorted(time.merged_with.as_slice());
                frontier.0.push(t);
                frontier.debug_check_sorted();
                break frontier;
            }

            // If this node is a merger, shatter it.
            if !time.merged_with.is_empty() {
                // time.last gets handled directly this iteration.
                for t in time.merged_with {
                    queue.push((t.into(), flag));
                }
            }

            let entry = self.entries.find_packed(t);

            let mut range = LVRange {
                start: entry.span.start,
                end: t + 1,
            };

            // Consume all other changes within this entry.
            loop {
                if let Some((peek_time, _peek_flag)) = queue.peek() {
                    if peek_time.last != usize::MAX && peek_time.last >= entry.span.start {
                        // The next item is within this entry. Consume it.
                        let (time, next_flag) = queue.pop().unwrap();

                        // Only emit inner items when they aren't duplicates.
                        if time.last + 1 < range.end {
                            // +1 to exclude the actual merge point from the
                            // emitted range.
                            let offset = time.last + 1 - entry.span.start;
                            debug_assert!(offset > 0);
                            let rem = range.truncate(offset);

                            visit(rem, flag);
                        }

                        if next_flag != flag {
                            flag = Shared;
                        }

                        if !time.merged_with.is_empty() {
                            // A merge point which uses part of this entry.
                            // We've already emitted the span. Queue the rest.
                            for t in time.merged_with {
                                queue.push((t.into(), next_flag));
                            }
                        }
                    } else {
                        // Emit the remainder of this entry.
                        visit(range, flag);

                        // If this entry has multiple parents, push the merge
                        // then immediately pop it, so the walk stops at the
                        // merge point.
                        queue.push((entry.parents.as_ref().into(), flag));
                        break;
                    }
                } else {
                    break 'outer Frontier::new_1(range.last());
                }
            }
        };

        frontier
    }

    /// Walk all operation spans which might be concurrent with incoming edits
    /// when moving between versions `a` and `b`.
    ///
    /// Spans are passed to `visit` in reverse version order, tagged by which
    /// side of the walk they belong to. All spans are tracked back to a
    /// single point in time - the common ancestor - which is returned.
    pub(crate) fn find_conflicting<V>(&self, a: &[LV], b: &[LV], mut visit: V) -> Frontier
    where
        V: FnMut(LVRange, DiffFlag),
    {
        // Short circuits, as in diff().
        if a == b {
            return a.into();
        }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                // a >= b.
                visit((b + 1..a + 1).into(), OnlyA);
                return Frontier::new_1(b);
            }
            if self.is_direct_descendant_coarse(b, a) {
                // b >= a.
                visit((a + 1..b + 1).into(), OnlyB);
                return Frontier::new_1(a);
            }
        }

        self.find_conflicting_slow(a, b, visit)
    }
}

// *** Dominators ***

impl Graph {
    fn find_dominators_full_internal<F, I>(&self, versions_iter: I, mut visit: F)
    where
        F: FnMut(LV, bool),
        I: Iterator<Item = LV>,
    {
        if let Some(max_size) = versions_iter.size_hint().1 {
            if max_size <= 1 {
                // All items are dominators.
                for v in versions_iter {
                    visit(v, true);
                }
                return;
            }
        }

        // The LSB of each heap entry encodes whether the version was an input
        // to the function. Normal (ancestry) entries sort above input entries
        // at the same version, so inputs reached through another version's
        // history get drained as dominated.
        fn enc_input(v: LV) -> usize {
            v << 1
        }
        fn enc_normal(v: LV) -> usize {
            (v << 1) + 1
        }
        fn dec(v_enc: usize) -> (bool, LV) {
            (v_enc % 2 == 0, v_enc >> 1)
        }

        let mut queue: BinaryHeap<usize> = versions_iter
            .map(|v| {
                if v >= usize::MAX / 2 {
                    panic!("Cannot handle version beyond usize::MAX/2");
                }
                enc_input(v)
            })
            .collect();
        let mut inputs_remaining = queue.len();

        let mut last_emitted = usize::MAX;

        while let Some(v_enc) = queue.pop() {
            let (is_input, v) = dec(v_enc);

            if is_input {
                visit(v, true);
                last_emitted = v;
                inputs_remaining -= 1;
            }

            let e = self.entries.find_packed(v);

            // Drain all queued versions within this entry. Any input among
            // them is dominated by something we've already visited.
            while let Some(&v2_enc) = queue.peek() {
                let (is_input2, v2) = dec(v2_enc);
                if v2 < e.span.start {
                    break;
                }
                queue.pop();

                if is_input2 {
                    if last_emitted != v2 {
                        visit(v2, false);
                        last_emitted = v2;
                    }
                    inputs_remaining -= 1;
                }
            }

            if inputs_remaining == 0 {
                break;
            }

            for &p in e.parents.iter() {
                queue.push(enc_normal(p));
            }
        }
    }

    /// Given some disparate set of versions (in any order), find the subset
    /// whose members are not ancestors of any other member.
    pub fn find_dominators(&self, versions: &[LV]) -> Frontier {
        if versions.len() <= 1 {
            return Frontier::from_sorted(versions);
        }

        let mut result_rev = smallvec![];
        self.find_dominators_full_internal(versions.iter().copied(), |v, is_dom| {
            if is_dom {
                result_rev.push(v);
            }
        });

        result_rev.reverse();
        Frontier(result_rev)
    }

    /// Given two versions, return the version containing all operations in
    /// both.
    pub fn version_union(&self, a: &[LV], b: &[LV]) -> Frontier {
        let mut result_rev = smallvec![];
        self.find_dominators_full_internal(
            a.iter().copied().chain(b.iter().copied()),
            |v, is_dom| {
                if is_dom {
                    result_rev.push(v);
                }
            },
        );
        result_rev.reverse();
        Frontier(result_rev)
    }
}
