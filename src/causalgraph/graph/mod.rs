pub(crate) mod tools;

use crate::frontier::Frontier;
use crate::rle::{HasLength, HasRleKey, MergableSpan, RleVec, SplitableSpanHelpers};
use crate::{LVRange, LV};

/// One run of operations sharing structure: the half open range
/// `span.start..span.end` of local versions, where `span.start` has the named
/// parents and each subsequent version's parent is its predecessor.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GraphEntry {
    pub span: LVRange,

    /// The parents of the first version in this run. Empty when the run
    /// starts at the root of history, one item for a simple change, two or
    /// more when the run starts at a merge.
    pub parents: Frontier,
}

impl GraphEntry {
    pub fn contains(&self, v: LV) -> bool {
        self.span.contains(v)
    }

    pub fn clone_parents_at_version(&self, v: LV) -> Frontier {
        if v > self.span.start {
            Frontier::new_1(v - 1)
        } else {
            self.parents.clone()
        }
    }
}

impl HasLength for GraphEntry {
    fn len(&self) -> usize {
        self.span.len()
    }
}

impl HasRleKey for GraphEntry {
    fn rle_key(&self) -> usize {
        self.span.start
    }
}

impl MergableSpan for GraphEntry {
    fn can_append(&self, other: &Self) -> bool {
        self.span.can_append(&other.span)
            && other.parents.len() == 1
            && other.parents[0] == self.span.last()
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span);
    }

    fn prepend(&mut self, other: Self) {
        self.span.prepend(other.span);
        self.parents = other.parents;
    }
}

impl SplitableSpanHelpers for GraphEntry {
    fn truncate_h(&mut self, at: usize) -> Self {
        debug_assert!(at >= 1);

        GraphEntry {
            span: self.span.truncate_h(at),
            parents: Frontier::new_1(self.span.start + at - 1),
        }
    }
}

/// The causal graph's parents information: for every operation, which
/// operations the author had already seen when it was created. Stored RLE
/// compressed, covering `0..len` contiguously.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub(crate) entries: RleVec<GraphEntry>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_entries(&self) -> usize {
        self.entries.num_entries()
    }

    /// One past the last known local version.
    pub fn len(&self) -> usize {
        self.entries.end()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a new history entry for the specified range of versions with the
    /// named parents. Merges into the last entry when the run simply extends
    /// it.
    pub(crate) fn push(&mut self, parents: &[LV], span: LVRange) {
        debug_assert_eq!(span.start, self.len());
        for &p in parents {
            assert!(p < span.start, "Parents must be earlier than the entry");
        }

        self.entries.push(GraphEntry {
            span,
            parents: Frontier::from_sorted(parents),
        });
    }

    pub fn parents_at_version(&self, v: LV) -> Frontier {
        self.entries.find_packed(v).clone_parents_at_version(v)
    }

    pub(crate) fn iter_range(&self, range: LVRange) -> impl Iterator<Item = GraphEntry> + '_ {
        self.entries.iter_range(range)
    }

    #[allow(unused)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = GraphEntry> + '_ {
        self.iter_range((0..self.len()).into())
    }

    /// Build a graph from a list of entries. The entries may arrive in any
    /// RLE chunking, but must cover `0..len` in ascending order. Mostly
    /// useful for tests.
    pub fn from_entries(entries: &[GraphEntry]) -> Self {
        let mut graph = Self::new();
        for e in entries {
            graph.push(e.parents.as_ref(), e.span);
        }
        graph
    }

    #[allow(unused)]
    pub(crate) fn dbg_check(&self) {
        self.entries.check_packed_from_0();
        for e in self.entries.iter() {
            e.parents.debug_check_sorted();
            for &p in e.parents.iter() {
                assert!(p < e.span.start);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rle::test_splitable_methods_valid;

    #[test]
    fn graph_entry_valid() {
        test_splitable_methods_valid(GraphEntry {
            span: (10..20).into(),
            parents: Frontier::new_1(0),
        });
    }

    #[test]
    fn entries_merge_on_push() {
        let mut g = Graph::new();
        g.push(&[], (0..5).into());
        g.push(&[4], (5..10).into());
        assert_eq!(g.num_entries(), 1);
        assert_eq!(g.len(), 10);

        // A concurrent run (parents further back) must not merge.
        g.push(&[2], (10..12).into());
        assert_eq!(g.num_entries(), 2);
    }

    #[test]
    fn iter_synthesizes_parents_mid_run() {
        let mut g = Graph::new();
        g.push(&[], (0..10).into());

        let entries: Vec<_> = g.iter_range((4..8).into()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].span, (4..8).into());
        assert_eq!(entries[0].parents.as_ref(), &[3]);
    }

    #[test]
    fn test_iter_empty() {
        let g = Graph::new();
        assert!(g.is_empty());
        let entries = g.iter().collect::<Vec<_>>();
        assert!(entries.is_empty());
    }
}
