use smallvec::{smallvec, SmallVec};
use smartstring::alias::String as SmartString;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::causalgraph::CausalGraph;
use crate::frontier::Frontier;
use crate::rle::{AppendRle, HasLength, MergeableIterator, RleSpanHelpers};
use crate::{LVRange, LV};

/// All the versions an agent has seen, named by (agent, seq range) pairs.
/// The summary is what peers exchange to figure out what to send each other.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VSEntry {
    pub name: SmartString,
    /// Coalesced, ascending seq ranges.
    pub versions: SmallVec<[LVRange; 2]>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VersionSummary(pub Vec<VSEntry>);

impl CausalGraph {
    /// Summarize everything this graph knows, for transmission to a peer.
    pub fn summarize_version(&self) -> VersionSummary {
        VersionSummary(
            self.agent_assignment
                .client_data
                .iter()
                .map(|c| VSEntry {
                    name: c.name.clone(),
                    versions: c.item_times.iter().map(|e| e.span()).merge_spans().collect(),
                })
                .collect(),
        )
    }

    /// Walk a foreign summary against the local graph. Returns the frontier
    /// of everything both sides know (extended by `seed`), and the portion of
    /// the summary this graph has never seen (None when fully known).
    pub fn intersect_with_summary(
        &self,
        summary: &VersionSummary,
        seed: &[LV],
    ) -> (Frontier, Option<VersionSummary>) {
        let mut known: SmallVec<[LV; 4]> = seed.into();
        let mut remainder: Option<Vec<VSEntry>> = None;

        for entry in &summary.0 {
            let agent = self.agent_assignment.get_agent_id(&entry.name);
            let mut unknown: SmallVec<[LVRange; 2]> = smallvec![];

            for &seq_range in &entry.versions {
                let mut r = seq_range;
                while !r.is_empty() {
                    let void = match agent {
                        Some(a) => {
                            let cd = &self.agent_assignment.client_data[a as usize];
                            match cd.item_times.find_sparse(r.start) {
                                (Ok(kv), offset) => {
                                    let lv_start = kv.1.start + offset;
                                    let len = (kv.end() - r.start).min(r.len());
                                    known.push(lv_start + len - 1);
                                    r.start += len;
                                    continue;
                                }
                                (Err(void), _) => void,
                            }
                        }
                        None => (r.start..usize::MAX).into(),
                    };

                    let len = void.end.min(r.end) - r.start;
                    unknown.push_rle((r.start..r.start + len).into());
                    r.start += len;
                }
            }

            if !unknown.is_empty() {
                remainder.get_or_insert_with(Vec::new).push(VSEntry {
                    name: entry.name.clone(),
                    versions: unknown,
                });
            }
        }

        (self.graph.find_dominators(&known), remainder.map(VersionSummary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_merges_adjacent_runs() {
        let mut cg = CausalGraph::new();
        let seph = cg.get_or_create_agent_id("seph");
        let mike = cg.get_or_create_agent_id("mike");

        cg.assign_local_op(seph, 2);
        cg.assign_local_op(mike, 3);
        cg.assign_local_op(seph, 2);

        let summary = cg.summarize_version();
        assert_eq!(
            summary,
            VersionSummary(vec![
                VSEntry {
                    name: "seph".into(),
                    versions: smallvec![(0..4).into()],
                },
                VSEntry {
                    name: "mike".into(),
                    versions: smallvec![(0..3).into()],
                },
            ])
        );
    }

    #[test]
    fn intersect_fully_known() {
        let mut cg = CausalGraph::new();
        let seph = cg.get_or_create_agent_id("seph");
        cg.assign_local_op(seph, 5);

        let summary = cg.summarize_version();
        let (frontier, remainder) = cg.intersect_with_summary(&summary, &[]);
        assert_eq!(frontier.as_ref(), &[4]);
        assert!(remainder.is_none());
    }

    #[test]
    fn intersect_with_unknown_agent_and_gap() {
        let mut cg = CausalGraph::new();
        let seph = cg.get_or_create_agent_id("seph");
        cg.assign_local_op(seph, 3);

        let summary = VersionSummary(vec![
            VSEntry {
                name: "seph".into(),
                versions: smallvec![(0..5).into()],
            },
            VSEntry {
                name: "mike".into(),
                versions: smallvec![(0..2).into()],
            },
        ]);

        let (frontier, remainder) = cg.intersect_with_summary(&summary, &[]);
        assert_eq!(frontier.as_ref(), &[2]);
        assert_eq!(
            remainder,
            Some(VersionSummary(vec![
                VSEntry {
                    name: "seph".into(),
                    versions: smallvec![(3..5).into()],
                },
                VSEntry {
                    name: "mike".into(),
                    versions: smallvec![(0..2).into()],
                },
            ]))
        );
    }

    #[test]
    fn intersect_seed_joins_frontier() {
        let mut cg = CausalGraph::new();
        let seph = cg.get_or_create_agent_id("seph");
        let mike = cg.get_or_create_agent_id("mike");
        cg.assign_local_op_with_parents(&[], seph, 2);
        cg.assign_local_op_with_parents(&[], mike, 2);

        // A summary which only knows about seph.
        let summary = VersionSummary(vec![VSEntry {
            name: "seph".into(),
            versions: smallvec![(0..2).into()],
        }]);

        let (frontier, remainder) = cg.intersect_with_summary(&summary, &[3]);
        assert_eq!(frontier.as_ref(), &[1, 3]);
        assert!(remainder.is_none());
    }
}
