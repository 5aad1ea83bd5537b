use std::cmp::Ordering::*;

use crate::rle::{
    AppendRle, HasLength, HasRleKey, MergableSpan, RleSpanHelpers, Searchable, SplitableSpan,
};
use crate::LVRange;

/// A list of RLE entries, ordered by each entry's key and searched by binary
/// search. Entries are automatically merged on push when possible.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RleVec<V: HasLength + MergableSpan + Sized>(pub Vec<V>);

impl<V: HasLength + MergableSpan + Sized> RleVec<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a new value to the end of the RLE list. O(1) average time. The
    /// new item extends the last entry in the list if possible.
    ///
    /// Returns true if the item was merged into the previous item.
    pub fn push(&mut self, val: V) -> bool {
        self.0.push_rle(val)
    }

    /// Returns past the end of the last key.
    pub fn end(&self) -> usize
    where
        V: HasRleKey,
    {
        if let Some(v) = self.last_entry() {
            v.end()
        } else {
            0
        }
    }

    pub fn last_entry(&self) -> Option<&V> {
        self.0.last()
    }

    pub fn num_entries(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.0.iter()
    }
}

impl<V: HasLength + MergableSpan + HasRleKey + Clone + Sized> RleVec<V> {
    /// Find the index of the entry containing the needle via binary search.
    /// On a miss, returns the index at which a containing entry could be
    /// inserted.
    pub fn find_index(&self, needle: usize) -> Result<usize, usize> {
        self.0.binary_search_by(|entry| {
            let key = entry.rle_key();
            if needle < key {
                Greater
            } else if needle >= key + entry.len() {
                Less
            } else {
                Equal
            }
        })
    }

    /// Find the entry containing the needle, if any.
    pub fn find(&self, needle: usize) -> Option<&V> {
        self.find_index(needle).ok().map(|idx| &self.0[idx])
    }

    /// Like find(), for lists with no gaps. Panics if the needle is outside
    /// the list.
    pub fn find_packed(&self, needle: usize) -> &V {
        self.find(needle).expect("Entry for key not in list")
    }

    /// Find the entry containing the needle. Returns (entry, offset into it).
    pub fn find_with_offset(&self, needle: usize) -> Option<(&V, usize)> {
        self.find_index(needle).ok().map(|idx| {
            let entry = &self.0[idx];
            (entry, needle - entry.rle_key())
        })
    }

    /// Like find_with_offset(), for lists with no gaps.
    pub fn find_packed_with_offset(&self, needle: usize) -> (&V, usize) {
        self.find_with_offset(needle)
            .expect("Entry for key not in list")
    }

    /// Like find, except on a miss the position of the surrounding empty span
    /// is returned instead. Assumes the base of the RLE is 0.
    ///
    /// Returns (Ok(entry), offset) on a hit, otherwise
    /// (Err(empty range), offset into it).
    pub fn find_sparse(&self, needle: usize) -> (Result<&V, LVRange>, usize) {
        match self.find_index(needle) {
            Ok(idx) => {
                let entry = &self.0[idx];
                (Ok(entry), needle - entry.rle_key())
            }
            Err(idx) => {
                let next_key = if let Some(entry) = self.0.get(idx) {
                    entry.rle_key()
                } else {
                    usize::MAX
                };

                if idx == 0 {
                    (Err((0..next_key).into()), needle)
                } else {
                    let end = self.0[idx - 1].end();
                    (Err((end..next_key).into()), needle - end)
                }
            }
        }
    }

    /// Insert an item at its keyed location in the list. O(n) in the number of
    /// entries after the insertion point. The new item must not overlap any
    /// existing entry.
    pub fn insert(&mut self, val: V) {
        // Data usually gets appended to the end, check that case first.
        if self
            .last_entry()
            .map(|last| last.end() <= val.rle_key())
            .unwrap_or(true)
        {
            self.push(val);
            return;
        }

        let idx = self
            .find_index(val.rle_key())
            .expect_err("Item already exists");

        // Extend the previous / next item if possible.
        if idx >= 1 {
            let prev = &mut self.0[idx - 1];
            if prev.can_append(&val) {
                prev.append(val);
                return;
            }
        }

        if idx < self.0.len() {
            let next = &mut self.0[idx];
            debug_assert!(val.rle_key() + val.len() <= next.rle_key(), "Items overlap");

            if val.can_append(next) {
                next.prepend(val);
                return;
            }
        }

        self.0.insert(idx, val);
    }

    /// Check that the RLE is contiguous from key 0. Panics if not.
    #[allow(unused)]
    pub(crate) fn check_packed_from_0(&self) {
        let mut expect_next = 0;
        for entry in self.0.iter() {
            assert_eq!(entry.rle_key(), expect_next);
            expect_next = entry.end();
        }
    }
}

impl<V: HasLength + MergableSpan + Searchable + HasRleKey> RleVec<V> {
    pub fn get(&self, idx: usize) -> V::Item {
        let (v, offset) = self.find_packed_with_offset(idx);
        v.at_offset(offset)
    }
}

impl<V: HasLength + MergableSpan + Sized> Default for RleVec<V> {
    fn default() -> Self {
        Self(Vec::default())
    }
}

/// Iterate through a sub-range of the list, with the first and last items
/// trimmed (and mapped) to fit the requested range.
#[derive(Debug, Clone)]
pub struct RleVecRangeIter<'a, V, I, F: Fn(&V) -> I> {
    inner_iter: std::slice::Iter<'a, V>,
    range: LVRange,
    map_fn: F,
}

impl<V: HasLength + HasRleKey + MergableSpan> RleVec<V> {
    pub fn iter_range_map<I: SplitableSpan + HasLength, F: Fn(&V) -> I>(
        &self,
        range: LVRange,
        map_fn: F,
    ) -> RleVecRangeIter<'_, V, I, F> {
        let start_idx = self.find_index(range.start).unwrap_or_else(|i| i);

        RleVecRangeIter {
            inner_iter: self.0[start_idx..].iter(),
            range,
            map_fn,
        }
    }

    pub fn iter_range(&self, range: LVRange) -> RleVecRangeIter<'_, V, V, impl Fn(&V) -> V>
    where
        V: SplitableSpan,
    {
        self.iter_range_map(range, |v| v.clone())
    }
}

impl<'a, V: HasRleKey + HasLength, I: HasLength + SplitableSpan, F: Fn(&V) -> I> Iterator
    for RleVecRangeIter<'a, V, I, F>
{
    type Item = I;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.is_empty() {
            return None;
        }
        let item = self.inner_iter.next()?;

        debug_assert!(item.end() > self.range.start);

        let item_range = item.span();
        if item_range.start >= self.range.end {
            return None;
        }

        let mut item = (self.map_fn)(item);
        if item_range.end > self.range.end {
            item.truncate(self.range.end - item_range.start);
        }
        if item_range.start < self.range.start {
            item.truncate_keeping_right(self.range.start - item_range.start);
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rle::KVPair;

    #[test]
    fn rle_iter_range() {
        let mut rle: RleVec<LVRange> = RleVec::new();
        rle.push((0..10).into());

        let items = rle.iter_range((5..8).into()).collect::<Vec<_>>();
        assert_eq!(&items, &[(5..8).into()]);
    }

    #[test]
    fn iter_empty() {
        let rle: RleVec<LVRange> = RleVec::new();
        let entries_a = rle.iter().collect::<Vec<_>>();
        let entries_b = rle.iter_range((0..0).into()).collect::<Vec<_>>();
        assert!(entries_a.is_empty());
        assert!(entries_b.is_empty());
    }

    #[test]
    fn iter_range_sparse() {
        let mut rle: RleVec<LVRange> = RleVec::new();
        rle.push((0..10).into());
        rle.push((12..18).into());
        rle.push((20..30).into());

        let iter_items = rle.iter_range((5..25).into()).collect::<Vec<_>>();

        assert_eq!(
            &iter_items,
            &[(5..10).into(), (12..18).into(), (20..25).into(),]
        );
    }

    #[test]
    fn rle_finds_at_offset() {
        let mut rle: RleVec<KVPair<LVRange>> = RleVec::new();

        rle.push(KVPair(1, (1000..1002).into()));
        assert_eq!(
            rle.find_with_offset(1),
            Some((&KVPair(1, (1000..1002).into()), 0))
        );
        assert_eq!(
            rle.find_with_offset(2),
            Some((&KVPair(1, (1000..1002).into()), 1))
        );
        assert_eq!(rle.find_with_offset(3), None);

        // This should get appended.
        rle.push(KVPair(3, (1002..1003).into()));
        assert_eq!(
            rle.find_with_offset(3),
            Some((&KVPair(1, (1000..1003).into()), 2))
        );
        assert_eq!(rle.num_entries(), 1);
    }

    #[test]
    fn insert_inside() {
        let mut rle: RleVec<KVPair<LVRange>> = RleVec::new();

        rle.insert(KVPair(5, (1000..1002).into()));
        // Prepend.
        rle.insert(KVPair(3, (998..1000).into()));
        assert_eq!(rle.num_entries(), 1);

        // Append.
        rle.insert(KVPair(7, (1002..1007).into()));
        assert_eq!(rle.num_entries(), 1);

        // Items which cannot be merged.
        rle.insert(KVPair(1, (1..2).into()));
        assert_eq!(rle.num_entries(), 2);

        rle.insert(KVPair(100, (40..41).into()));
        assert_eq!(rle.num_entries(), 3);
    }

    #[test]
    fn test_find_sparse() {
        let mut rle: RleVec<KVPair<LVRange>> = RleVec::new();

        assert_eq!(rle.find_sparse(0), (Err((0..usize::MAX).into()), 0));
        assert_eq!(rle.find_sparse(10), (Err((0..usize::MAX).into()), 10));

        rle.insert(KVPair(15, (40..42).into()));
        assert_eq!(rle.find_sparse(10), (Err((0..15).into()), 10));
        assert_eq!(rle.find_sparse(15), (Ok(&rle.0[0]), 0));
        assert_eq!(rle.find_sparse(16), (Ok(&rle.0[0]), 1));
        assert_eq!(rle.find_sparse(17), (Err((17..usize::MAX).into()), 0));
        assert_eq!(rle.find_sparse(20), (Err((17..usize::MAX).into()), 3));
    }
}
