use std::fmt::{Debug, Formatter};
use std::ops::Range;

use crate::rle::{HasLength, HasRleKey, MergableSpan, Searchable, SplitableSpanHelpers};
use crate::LV;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An internal replacement for `Range<usize>` over local versions. The main
/// reason this exists is that std's Range doesn't implement Copy, and ranges
/// of versions are copied around constantly. Convert to and from std ranges
/// with `.from()` / `.into()`.
#[derive(Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LVRange {
    pub start: usize,
    pub end: usize,
}

impl LVRange {
    #[inline]
    pub fn new(start: usize, end: usize) -> LVRange {
        LVRange { start, end }
    }

    pub fn last(&self) -> usize {
        self.end - 1
    }

    pub fn contains(&self, item: usize) -> bool {
        self.start <= item && item < self.end
    }

    pub fn is_empty(&self) -> bool {
        debug_assert!(self.start <= self.end);
        self.start == self.end
    }

    pub fn iter(&self) -> Range<usize> {
        (*self).into()
    }
}

impl From<Range<usize>> for LVRange {
    fn from(range: Range<usize>) -> Self {
        LVRange {
            start: range.start,
            end: range.end,
        }
    }
}

impl From<LVRange> for Range<usize> {
    fn from(span: LVRange) -> Self {
        span.start..span.end
    }
}

impl HasLength for LVRange {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

impl SplitableSpanHelpers for LVRange {
    fn truncate_h(&mut self, at: usize) -> Self {
        let split = self.start + at;
        let other = LVRange {
            start: split,
            end: self.end,
        };

        self.end = split;
        other
    }

    #[inline]
    fn truncate_keeping_right_h(&mut self, at: usize) -> Self {
        let split = self.start + at;
        let other = LVRange {
            start: self.start,
            end: split,
        };
        self.start = split;
        other
    }
}

impl MergableSpan for LVRange {
    fn can_append(&self, other: &Self) -> bool {
        other.start == self.end
    }

    fn append(&mut self, other: Self) {
        self.end = other.end;
    }

    fn prepend(&mut self, other: Self) {
        self.start = other.start;
    }
}

impl HasRleKey for LVRange {
    fn rle_key(&self) -> usize {
        self.start
    }
}

impl Searchable for LVRange {
    type Item = usize;

    fn get_offset(&self, loc: Self::Item) -> Option<usize> {
        if loc >= self.start && loc < self.end {
            Some(loc - self.start)
        } else {
            None
        }
    }

    fn at_offset(&self, offset: usize) -> Self::Item {
        self.start + offset
    }
}

/// The id space reserved for placeholder items during a merge. Ids at or
/// above this value ("underwater" items) can never collide with a real LV.
pub(crate) const UNDERWATER_START: usize = usize::MAX / 4;

pub(crate) fn is_underwater(v: LV) -> bool {
    v >= UNDERWATER_START
}

fn write_lv(f: &mut Formatter<'_>, v: LV) -> std::fmt::Result {
    if is_underwater(v) {
        write!(f, "Underwater({})", v - UNDERWATER_START)
    } else {
        write!(f, "{v}")
    }
}

impl Debug for LVRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "V ")?;
        write_lv(f, self.start)?;
        write!(f, "..")?;
        write_lv(f, self.end)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::rle::test_splitable_methods_valid;
    use crate::LVRange;

    #[test]
    fn splitable_lvrange() {
        test_splitable_methods_valid(LVRange::new(10, 20));
    }
}
