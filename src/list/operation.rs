#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Is an operation an insert or a delete?
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ListOpKind {
    #[default]
    Ins,
    Del,
}

/// A single primitive operation: insert one value at a position, or delete
/// the value at a position. The position is the location in the document *as
/// the author saw it* when they made the edit - the whole point of the merge
/// engine is recovering what that position means for everyone else.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ListOp<T> {
    Ins { pos: usize, content: T },
    Del { pos: usize },
}

impl<T> ListOp<T> {
    pub fn pos(&self) -> usize {
        match self {
            ListOp::Ins { pos, .. } => *pos,
            ListOp::Del { pos } => *pos,
        }
    }

    pub fn kind(&self) -> ListOpKind {
        match self {
            ListOp::Ins { .. } => ListOpKind::Ins,
            ListOp::Del { .. } => ListOpKind::Del,
        }
    }
}
