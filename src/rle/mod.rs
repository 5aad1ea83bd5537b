//! Run-length encoding primitives. Almost every collection in this crate stores
//! runs of adjacent items (version ranges, agent seq spans, graph entries)
//! rather than individual items, and these traits define how runs are measured,
//! split and merged.

use std::fmt::Debug;

use smallvec::{Array, SmallVec};

mod rle_vec;

pub use rle_vec::RleVec;

pub trait HasLength {
    /// The number of child items in this entry.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Implement this to get `SplitableSpan` via the blanket impl below.
pub trait SplitableSpanHelpers: Sized {
    /// Split the entry, returning the tail. After `truncate_h(at)`,
    /// `self.len() == at` and the returned value contains the rest.
    ///
    /// `at` must strictly obey *0 < at < entry.len()*.
    fn truncate_h(&mut self, at: usize) -> Self;

    /// The inverse of truncate - keep items from `at..len`, return `0..at`.
    fn truncate_keeping_right_h(&mut self, at: usize) -> Self
    where
        Self: Clone,
    {
        let mut other = self.clone();
        *self = other.truncate_h(at);
        other
    }
}

pub trait SplitableSpan: Clone {
    fn truncate(&mut self, at: usize) -> Self;
    fn truncate_keeping_right(&mut self, at: usize) -> Self;
}

impl<T: SplitableSpanHelpers + Clone> SplitableSpan for T {
    fn truncate(&mut self, at: usize) -> Self {
        self.truncate_h(at)
    }

    fn truncate_keeping_right(&mut self, at: usize) -> Self {
        self.truncate_keeping_right_h(at)
    }
}

pub trait MergableSpan: Clone {
    /// Whether `other` can be appended to the end of self. `can_append` is
    /// always checked immediately before `append`.
    fn can_append(&self, other: &Self) -> bool;

    /// self = self + other.
    fn append(&mut self, other: Self);

    /// self = other + self. Only called when `other.can_append(self)`.
    fn prepend(&mut self, mut other: Self) {
        other.append(self.clone());
        *self = other;
    }
}

pub trait Searchable {
    type Item: Copy + Debug;

    /// If the entry contains the item, returns the offset into the entry.
    fn get_offset(&self, loc: Self::Item) -> Option<usize>;

    fn at_offset(&self, offset: usize) -> Self::Item;
}

/// The key an entry is sorted and searched by in an RLE list.
pub trait HasRleKey {
    fn rle_key(&self) -> usize;
}

pub trait RleSpanHelpers: HasRleKey + HasLength {
    fn end(&self) -> usize {
        self.rle_key() + self.len()
    }

    fn span(&self) -> crate::LVRange {
        (self.rle_key()..self.end()).into()
    }
}

impl<V: HasRleKey + HasLength> RleSpanHelpers for V {}

/// Append helpers for list-like containers which RLE-compact on push.
pub trait AppendRle<T: MergableSpan> {
    /// Push an item, merging into the previous last item when possible.
    /// Returns true if the item was merged.
    fn push_rle(&mut self, item: T) -> bool;

    /// Push to a list sorted in reverse - the new item is merged onto the
    /// *front* of the last item when possible.
    fn push_reversed_rle(&mut self, item: T) -> bool;
}

impl<T: MergableSpan> AppendRle<T> for Vec<T> {
    fn push_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if v.can_append(&item) {
                v.append(item);
                return true;
            }
        }
        self.push(item);
        false
    }

    fn push_reversed_rle(&mut self, item: T) -> bool {
        if let Some(v) = self.last_mut() {
            if item.can_append(v) {
                v.prepend(item);
                return true;
            }
        }
        self.push(item);
        false
    }
}

impl<A: Array> AppendRle<A::Item> for SmallVec<A>
where
    A::Item: MergableSpan,
{
    fn push_rle(&mut self, item: A::Item) -> bool {
        if let Some(v) = self.last_mut() {
            if v.can_append(&item) {
                v.append(item);
                return true;
            }
        }
        self.push(item);
        false
    }

    fn push_reversed_rle(&mut self, item: A::Item) -> bool {
        if let Some(v) = self.last_mut() {
            if item.can_append(v) {
                v.prepend(item);
                return true;
            }
        }
        self.push(item);
        false
    }
}

/// Iterator adaptor which merges adjacent mergeable spans.
#[derive(Debug, Clone)]
pub struct MergeIter<I: Iterator> {
    next: Option<I::Item>,
    iter: I,
}

impl<I: Iterator> Iterator for MergeIter<I>
where
    I::Item: MergableSpan,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let mut this = match self.next.take() {
            Some(v) => v,
            None => self.iter.next()?,
        };

        for next in &mut self.iter {
            if this.can_append(&next) {
                this.append(next);
            } else {
                self.next = Some(next);
                return Some(this);
            }
        }

        Some(this)
    }
}

pub trait MergeableIterator<X: MergableSpan>: Iterator<Item = X> + Sized {
    fn merge_spans(self) -> MergeIter<Self>;
}

impl<X: MergableSpan, I: Iterator<Item = X>> MergeableIterator<X> for I {
    fn merge_spans(self) -> MergeIter<Self> {
        MergeIter {
            next: None,
            iter: self,
        }
    }
}

/// An RLE value keyed at some position. The key advances as the value is
/// split, so a `KVPair(10, span)` of length 4 truncated at 1 yields
/// `KVPair(11, ..)` as the remainder.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KVPair<V>(pub usize, pub V);

impl<V: HasLength> HasLength for KVPair<V> {
    fn len(&self) -> usize {
        self.1.len()
    }
}

impl<V> HasRleKey for KVPair<V> {
    fn rle_key(&self) -> usize {
        self.0
    }
}

impl<V: SplitableSpanHelpers + Clone> SplitableSpanHelpers for KVPair<V> {
    fn truncate_h(&mut self, at: usize) -> Self {
        let remainder = self.1.truncate_h(at);
        KVPair(self.0 + at, remainder)
    }

    fn truncate_keeping_right_h(&mut self, at: usize) -> Self {
        let old_key = self.0;
        self.0 += at;
        let trimmed = self.1.truncate_keeping_right_h(at);
        KVPair(old_key, trimmed)
    }
}

impl<V: HasLength + MergableSpan> MergableSpan for KVPair<V> {
    fn can_append(&self, other: &Self) -> bool {
        other.0 == self.0 + self.1.len() && self.1.can_append(&other.1)
    }

    fn append(&mut self, other: Self) {
        self.1.append(other.1);
    }

    fn prepend(&mut self, other: Self) {
        self.1.prepend(other.1);
        self.0 = other.0;
    }
}

impl<V: Searchable> Searchable for KVPair<V> {
    type Item = V::Item;

    fn get_offset(&self, loc: Self::Item) -> Option<usize> {
        self.1.get_offset(loc)
    }

    fn at_offset(&self, offset: usize) -> Self::Item {
        self.1.at_offset(offset)
    }
}

impl<V: Default> Default for KVPair<V> {
    fn default() -> Self {
        KVPair(0, V::default())
    }
}

/// Test helper to verify an implementation of SplitableSpan meets its
/// contract. Call with an entry of length >= 2.
#[allow(unused)]
pub(crate) fn test_splitable_methods_valid<E: SplitableSpan + MergableSpan + HasLength + Debug + Eq>(
    entry: E,
) {
    assert!(entry.len() >= 2, "Call this with a larger entry");
    for i in 1..entry.len() {
        let mut start = entry.clone();
        let end = start.truncate(i);

        assert_eq!(start.len(), i);
        assert_eq!(end.len(), entry.len() - i);
        assert!(start.can_append(&end));

        let mut merge_append = start.clone();
        merge_append.append(end.clone());
        assert_eq!(merge_append, entry);

        let mut merge_prepend = end.clone();
        merge_prepend.prepend(start.clone());
        assert_eq!(merge_prepend, entry);

        let mut end2 = entry.clone();
        let start2 = end2.truncate_keeping_right(i);
        assert_eq!(end2, end);
        assert_eq!(start2, start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LVRange;

    #[test]
    fn kvpair_valid() {
        test_splitable_methods_valid(KVPair(20, LVRange::new(10, 15)));
    }

    #[test]
    fn merge_iter_merges() {
        let spans: Vec<LVRange> = vec![(0..3).into(), (3..5).into(), (8..10).into()];
        let merged: Vec<LVRange> = spans.into_iter().merge_spans().collect();
        assert_eq!(merged, &[(0..5).into(), (8..10).into()]);
    }

    #[test]
    fn push_reversed_merges_front() {
        let mut list: Vec<LVRange> = vec![];
        list.push_reversed_rle((5..10).into());
        list.push_reversed_rle((2..5).into());
        list.push_reversed_rle((0..1).into());
        assert_eq!(list, &[(2..10).into(), (0..1).into()]);
    }
}
