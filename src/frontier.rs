use std::ops::Index;

use smallvec::SmallVec;

use crate::{LVRange, LV};

/// A frontier names a version of the document: the set of local versions with
/// no descendants in the view it describes. Almost always this is a single
/// element; multiple elements mean the version has unmerged concurrent
/// branches.
///
/// Frontiers are always sorted in ascending order and contain no duplicates.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frontier(pub SmallVec<[LV; 2]>);

/// Frontiers should always be sorted smallest to largest.
pub(crate) fn frontier_is_sorted(f: &[LV]) -> bool {
    if f.len() >= 2 {
        let mut last = f[0];
        for &v in &f[1..] {
            debug_assert!(v != last);
            if last > v {
                return false;
            }
            last = v;
        }
    }
    true
}

pub(crate) fn debug_assert_frontier_sorted(f: &[LV]) {
    debug_assert!(frontier_is_sorted(f));
}

impl Frontier {
    /// The root version - the version before any operations.
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    pub fn new_1(v: LV) -> Self {
        let mut f = SmallVec::new();
        f.push(v);
        Self(f)
    }

    pub fn from_sorted(f: &[LV]) -> Self {
        debug_assert_frontier_sorted(f);
        Self(f.into())
    }

    pub fn from_unsorted(mut f: SmallVec<[LV; 2]>) -> Self {
        f.sort_unstable();
        f.dedup();
        Self(f)
    }

    pub fn as_ref(&self) -> &[LV] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<LV> {
        self.0.last().copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LV> {
        self.0.iter()
    }

    pub fn debug_check_sorted(&self) {
        debug_assert_frontier_sorted(self.as_ref());
    }

    /// Insert a new version, keeping the set sorted. The new version must not
    /// already be present.
    pub(crate) fn insert_sorted(&mut self, new_item: LV) {
        let new_idx = self.0.binary_search(&new_item).unwrap_err();
        self.0.insert(new_idx, new_item);
        self.debug_check_sorted();
    }

    /// Advance this frontier by an operation run with the given parents. The
    /// entire run must be a known, valid extension of the frontier - parents
    /// which are missing from the frontier must already be dominated by it.
    ///
    /// This never checks ancestry transitively. That is safe because
    /// operations are only ever added in causal order.
    pub fn advance_by_known_run(&mut self, parents: &[LV], span: LVRange) {
        // Short circuit the common case where time is just advancing linearly.
        if parents.len() == 1 && self.0.len() == 1 && parents[0] == self.0[0] {
            self.0[0] = span.last();
            return;
        } else if self.as_ref() == parents {
            if self.0.is_empty() {
                self.0.push(span.last());
            } else {
                self.0.truncate(1);
                self.0[0] = span.last();
            }
            return;
        }

        assert!(!self.0.contains(&span.start));
        self.debug_check_sorted();

        self.0.retain(|o| !parents.contains(o)); // Usually removes all elements.
        self.insert_sorted(span.last());
    }

    /// Advance by a single operation: remove the op's parents from the
    /// frontier and insert the op itself.
    pub fn advance(&mut self, parents: &[LV], v: LV) {
        self.advance_by_known_run(parents, (v..v + 1).into());
    }

    /// Replace the entire frontier with a single version.
    pub(crate) fn replace_with_1(&mut self, v: LV) {
        self.0.truncate(1);
        if self.0.is_empty() {
            self.0.push(v);
        } else {
            self.0[0] = v;
        }
    }
}

impl From<&[LV]> for Frontier {
    fn from(f: &[LV]) -> Self {
        Self::from_sorted(f)
    }
}

impl Index<usize> for Frontier {
    type Output = LV;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}
