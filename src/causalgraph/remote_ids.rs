//! Conversion between local versions and the stable (agent, seq) identities
//! peers use to name operations, plus the in-memory transport form of a
//! causal graph diff.

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::causalgraph::agent_span::AgentSpan;
use crate::causalgraph::CausalGraph;
use crate::frontier::Frontier;
use crate::rle::HasLength;
use crate::{CrdtError, LVRange, LV};

/// The globally stable name of one operation: (agent, seq). Unlike local
/// versions, raw versions mean the same thing on every peer.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawVersion(pub SmartString, pub usize);

impl<S: Into<SmartString>> From<(S, usize)> for RawVersion {
    fn from((agent, seq): (S, usize)) -> Self {
        RawVersion(agent.into(), seq)
    }
}

/// One run of a serialized causal graph diff: `len` operations from `agent`
/// starting at `seq`, with the named parents for the first of them. This is
/// the transport format between op logs; no byte encoding is prescribed
/// (serde gives it one for free under the `serde` feature).
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CGDiffEntry {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: SmallVec<[RawVersion; 2]>,
}

impl CausalGraph {
    pub fn lv_to_raw(&self, v: LV) -> RawVersion {
        let (agent, seq) = self.agent_assignment.lv_to_agent_version(v);
        RawVersion(self.agent_assignment.get_agent_name(agent).into(), seq)
    }

    pub fn try_raw_to_lv(&self, rv: &RawVersion) -> Result<LV, CrdtError> {
        let agent = self
            .agent_assignment
            .get_agent_id(&rv.0)
            .ok_or_else(|| CrdtError::UnknownVersion(rv.clone()))?;

        self.agent_assignment.client_data[agent as usize]
            .try_seq_to_lv(rv.1)
            .ok_or_else(|| CrdtError::UnknownVersion(rv.clone()))
    }

    /// Does this graph know the named operation?
    pub fn has_raw_version(&self, rv: &RawVersion) -> bool {
        self.try_raw_to_lv(rv).is_ok()
    }

    pub fn raw_to_frontier<'a, I: Iterator<Item = &'a RawVersion>>(
        &self,
        iter: I,
    ) -> Result<Frontier, CrdtError> {
        let mut versions: SmallVec<[LV; 2]> = SmallVec::new();
        for rv in iter {
            versions.push(self.try_raw_to_lv(rv)?);
        }
        Ok(Frontier::from_unsorted(versions))
    }

    pub fn frontier_to_raw(&self, frontier: &[LV]) -> SmallVec<[RawVersion; 2]> {
        frontier.iter().map(|&v| self.lv_to_raw(v)).collect()
    }

    /// Serialize the named (ascending) ranges of this graph for transmission.
    /// The ranges are usually the `only_b` half of a
    /// [`diff`](crate::causalgraph::graph::Graph::diff).
    pub fn serialize_diff(&self, ranges: &[LVRange]) -> Vec<CGDiffEntry> {
        let mut result = vec![];
        for &r in ranges {
            for e in self.iter_range(r) {
                result.push(CGDiffEntry {
                    agent: self
                        .agent_assignment
                        .get_agent_name(e.span.agent)
                        .into(),
                    seq: e.span.seq_range.start,
                    len: e.span.seq_range.len(),
                    parents: e.parents.iter().map(|&p| self.lv_to_raw(p)).collect(),
                });
            }
        }
        result
    }

    /// Ingest one serialized diff entry. Returns the range of local versions
    /// actually added (empty when the entry was already known).
    pub(crate) fn merge_partial_entry(&mut self, e: &CGDiffEntry) -> Result<LVRange, CrdtError> {
        let agent = self.get_or_create_agent_id(&e.agent);
        let parents = self.raw_to_frontier(e.parents.iter())?;

        Ok(self.merge_and_assign(
            parents.as_ref(),
            AgentSpan {
                agent,
                seq_range: (e.seq..e.seq + e.len).into(),
            },
        ))
    }

    /// Ingest a serialized diff. Entries must arrive in causal order (parents
    /// before children), which [`serialize_diff`](Self::serialize_diff)
    /// guarantees. Returns the range of local versions added; already-known
    /// prefixes are skipped.
    pub fn merge_partial_versions(&mut self, entries: &[CGDiffEntry]) -> Result<LVRange, CrdtError> {
        let start = self.len();

        for e in entries {
            self.merge_partial_entry(e)?;
        }

        Ok((start..self.len()).into())
    }
}
