//! An event-graph walker text CRDT.
//!
//! This crate reconstructs the converged state of a shared sequence (usually
//! a text document) from an append-only log of editing operations with
//! arbitrary causal history. Unlike classic CRDT implementations, no CRDT
//! metadata lives alongside the document between edits - the integration
//! structures are rebuilt transiently, and only when a merge actually
//! contains concurrent changes.
//!
//! The important pieces:
//!
//! - [`CausalGraph`]: who did what, after seeing what. RLE-compressed
//!   storage of each operation's (agent, seq) identity and parents, plus the
//!   ancestry queries (diff, conflict walks, dominators) everything else is
//!   built on.
//! - [`OpLog`]: the causal graph plus the operations themselves.
//! - [`Branch`] / [`Document`] / [`TextDocument`]: materialized document
//!   state, with incremental merging.
//!
//! The merge engine itself (an internal module) implements the
//! retreat/advance/apply walk over the graph, with a fugue-style
//! concurrent-insert resolution, backed by an order-statistic tree for
//! O(log n) positional lookups.
//!
//! ```
//! use egwalker::TextDocument;
//!
//! let mut a = TextDocument::new();
//! let alice = a.get_or_create_agent_id("alice");
//! a.insert(alice, 0, "hi");
//!
//! let mut b = TextDocument::open(a.oplog.clone());
//! let bob = b.get_or_create_agent_id("bob");
//!
//! a.insert(alice, 2, "!");
//! b.insert(bob, 2, "?");
//!
//! a.merge_remote(&b.oplog).unwrap();
//! b.merge_remote(&a.oplog).unwrap();
//! assert_eq!(a.text(), b.text());
//! ```

use std::fmt::{Display, Formatter};

pub mod causalgraph;
pub mod list;

mod frontier;
mod listmerge;
mod lvrange;
mod ost;
mod rle;

pub use causalgraph::remote_ids::{CGDiffEntry, RawVersion};
pub use causalgraph::summary::{VSEntry, VersionSummary};
pub use causalgraph::CausalGraph;
pub use frontier::Frontier;
pub use list::operation::{ListOp, ListOpKind};
pub use list::{
    checkout, checkout_simple, checkout_simple_string, Branch, Document, InlineReplace, ListValue,
    OpLog, TextBranch, TextDocument,
};
pub use lvrange::LVRange;

/// A local version: the dense index of one operation in the local op log.
/// Local versions are assigned in arrival order, so the same operation
/// usually has different LVs on different peers. [`RawVersion`] is the
/// stable, shareable name.
pub type LV = usize;

/// An interned agent. Stable only within one causal graph; the agent's
/// *name* is the portable identity.
pub type AgentId = u32;

/// Everything that can go wrong at the CRDT boundary.
///
/// All of these are fatal for the operation that produced them: the
/// underlying structures are left unchanged (or must be discarded, for
/// errors surfaced mid-merge), and retrying without different input will
/// fail again.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CrdtError {
    /// A raw (agent, seq) version which isn't present in the causal graph.
    UnknownVersion(RawVersion),
    /// Tried to delete a zero-length range.
    InvalidLength,
    /// An insert operation arrived without its content.
    MissingContent,
    /// Tried to locally assign a seq the agent has already used.
    DuplicateAgentSeq { agent: AgentId, seq: usize },
    /// The causal graph and op log disagree about the next version. The op
    /// log is corrupt.
    InvariantBroken,
}

impl Display for CrdtError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CrdtError::UnknownVersion(rv) => {
                write!(f, "Unknown version ({}, {})", rv.0, rv.1)
            }
            CrdtError::InvalidLength => f.write_str("Invalid length 0"),
            CrdtError::MissingContent => f.write_str("Insert is missing content"),
            CrdtError::DuplicateAgentSeq { agent, seq } => {
                write!(f, "Seq {seq} already assigned for agent {agent}")
            }
            CrdtError::InvariantBroken => f.write_str("Op log invariant broken"),
        }
    }
}

impl std::error::Error for CrdtError {}
