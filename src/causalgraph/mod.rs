pub mod agent_assignment;
pub mod agent_span;
pub mod entry;
pub mod graph;
pub mod remote_ids;
pub mod summary;

use std::cmp::Ordering;

use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::causalgraph::entry::CGEntry;
use crate::causalgraph::graph::Graph;
use crate::frontier::Frontier;
use crate::rle::{HasLength, KVPair, MergableSpan, RleSpanHelpers};
use crate::{AgentId, CrdtError, LVRange, LV};

/// The causal graph stores the identity (agent, seq) and parents of every
/// operation the local peer knows about, RLE compressed. It makes no mention
/// of what the operations *do* - that's the op log's job.
#[derive(Clone, Debug, Default)]
pub struct CausalGraph {
    /// Mapping between local versions and stable (agent, seq) identities.
    pub agent_assignment: AgentAssignment,

    /// Parents of every operation. This is used for diff and
    /// version-contains queries, which are needed to merge remote changes.
    pub graph: Graph,

    /// The version resulting from merging everything in the graph. Cached
    /// here because it's cheap to maintain and constantly needed.
    pub version: Frontier,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next local version; also the number of operations known.
    pub fn len(&self) -> usize {
        let len = self.agent_assignment.len();
        debug_assert_eq!(len, self.graph.len());
        len
    }

    pub fn is_empty(&self) -> bool {
        self.agent_assignment.is_empty()
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.agent_assignment.get_or_create_agent_id(name)
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.agent_assignment.get_agent_name(agent)
    }

    pub fn next_seq_for_agent(&self, agent: AgentId) -> usize {
        self.agent_assignment.next_seq_for_agent(agent)
    }

    pub fn lv_to_agent_version(&self, v: LV) -> AgentVersion {
        self.agent_assignment.lv_to_agent_version(v)
    }

    pub fn try_agent_version_to_lv(&self, av: AgentVersion) -> Option<LV> {
        self.agent_assignment.try_agent_version_to_lv(av)
    }

    /// Deterministic total order over concurrent versions: agent name
    /// (lexicographic), then seq.
    pub fn lv_cmp(&self, a: LV, b: LV) -> Ordering {
        self.agent_assignment.tie_break_versions(a, b)
    }

    /// Assign a run of `num` new operations to `agent` at the agent's next
    /// seq, with explicit parents.
    pub fn assign_local_op_with_parents(
        &mut self,
        parents: &[LV],
        agent: AgentId,
        num: usize,
    ) -> LVRange {
        let start = self.len();
        let span: LVRange = (start..start + num).into();

        self.agent_assignment
            .assign_next_lv_to_client_known(agent, span);
        self.graph.push(parents, span);
        self.version.advance_by_known_run(parents, span);
        span
    }

    /// Assign a run of `num` new operations to `agent`, parented at the
    /// current version.
    pub fn assign_local_op(&mut self, agent: AgentId, num: usize) -> LVRange {
        let parents = self.version.clone();
        self.assign_local_op_with_parents(parents.as_ref(), agent, num)
    }

    /// Assign a run of operations to `agent` starting at a caller-supplied
    /// seq, parented at the current version. The seq must not land below the
    /// agent's next seq - re-using assigned sequence numbers is never
    /// recoverable.
    pub fn try_assign_local_seq(
        &mut self,
        agent: AgentId,
        seq: usize,
        num: usize,
    ) -> Result<LVRange, CrdtError> {
        let next = self.next_seq_for_agent(agent);
        if seq < next {
            return Err(CrdtError::DuplicateAgentSeq { agent, seq });
        }

        let start = self.len();
        let span: LVRange = (start..start + num).into();

        let client_data = &mut self.agent_assignment.client_data[agent as usize];
        client_data.item_times.push(KVPair(seq, span));
        self.agent_assignment.client_with_lv.push(KVPair(
            start,
            AgentSpan {
                agent,
                seq_range: (seq..seq + num).into(),
            },
        ));

        let parents = self.version.clone();
        self.graph.push(parents.as_ref(), span);
        self.version.advance_by_known_run(parents.as_ref(), span);
        Ok(span)
    }

    /// Merge a (possibly partially known) span of operations into the causal
    /// graph. Returns the range of local versions actually added - empty when
    /// the entire span was already known.
    ///
    /// There are 3 cases:
    /// 1. The span is entirely known. Nothing happens.
    /// 2. The span is entirely new (the common case). All of it is appended.
    /// 3. Some prefix is known. The overlap must be at the start, because
    ///    each operation's predecessors must arrive before it; the new suffix
    ///    is appended with the last known op as its parent.
    pub fn merge_and_assign(&mut self, parents: &[LV], span: AgentSpan) -> LVRange {
        let lv_start = self.len();
        let client_data = &mut self.agent_assignment.client_data[span.agent as usize];

        match client_data.item_times.find_index(span.seq_range.last()) {
            Ok(_idx) => {
                // The last ID is known, so the entire span is. Case 1.
                (lv_start..lv_start).into()
            }
            Err(idx) => {
                // idx is the index where the span could be inserted to
                // maintain seq order.
                if idx >= 1 {
                    let prev_entry = &mut client_data.item_times.0[idx - 1];
                    let previous_end = prev_entry.end();

                    if previous_end >= span.seq_range.start {
                        // Case 3 (or case 2 with an exactly adjacent entry).
                        let actual_len = span.seq_range.end - previous_end;
                        let lv_span: LVRange = (lv_start..lv_start + actual_len).into();
                        let new_entry = KVPair(previous_end, lv_span);

                        self.agent_assignment.client_with_lv.push(KVPair(
                            lv_start,
                            AgentSpan {
                                agent: span.agent,
                                seq_range: (previous_end..span.seq_range.end).into(),
                            },
                        ));

                        if previous_end > span.seq_range.start {
                            // Known prefix trimmed. The suffix hangs off the
                            // last known op from this run.
                            let p = prev_entry.1.last();
                            self.graph.push(&[p], lv_span);
                            self.version.advance_by_known_run(&[p], lv_span);
                        } else {
                            self.graph.push(parents, lv_span);
                            self.version.advance_by_known_run(parents, lv_span);
                        }

                        if prev_entry.can_append(&new_entry) {
                            prev_entry.append(new_entry);
                        } else {
                            client_data.item_times.0.insert(idx, new_entry);
                        }

                        return lv_span;
                    }
                }

                // Case 2: no overlap with the previous element.
                let lv_span = (lv_start..lv_start + span.len()).into();
                client_data
                    .item_times
                    .0
                    .insert(idx, KVPair(span.seq_range.start, lv_span));
                self.agent_assignment
                    .client_with_lv
                    .push(KVPair(lv_start, span));
                self.graph.push(parents, lv_span);
                self.version.advance_by_known_run(parents, lv_span);
                lv_span
            }
        }
    }

    /// Iterate the causal graph entries covering `range`, splitting on both
    /// graph entry and agent assignment boundaries. Entries which don't start
    /// at an entry boundary get `[start - 1]` synthesized as their parents.
    pub fn iter_range(&self, range: LVRange) -> impl Iterator<Item = CGEntry> + '_ {
        CGEntryIter {
            cg: self,
            lv: range.start,
            end: range.end,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = CGEntry> + '_ {
        self.iter_range((0..self.len()).into())
    }

    /// Deep consistency check. Panics when any invariant is broken.
    #[allow(unused)]
    pub fn dbg_check(&self) {
        assert_eq!(self.agent_assignment.len(), self.graph.len());
        self.agent_assignment.dbg_check();
        self.graph.dbg_check();

        // The cached version must match a from-scratch replay of the graph.
        let mut expected = Frontier::root();
        for e in self.graph.entries.iter() {
            expected.advance_by_known_run(e.parents.as_ref(), e.span);
        }
        assert_eq!(expected, self.version);
    }
}

struct CGEntryIter<'a> {
    cg: &'a CausalGraph,
    lv: LV,
    end: LV,
}

impl<'a> Iterator for CGEntryIter<'a> {
    type Item = CGEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.lv >= self.end {
            return None;
        }

        let (ge, g_offset) = self.cg.graph.entries.find_packed_with_offset(self.lv);
        let (aa, a_offset) = self
            .cg
            .agent_assignment
            .client_with_lv
            .find_packed_with_offset(self.lv);

        let len = (ge.span.end - self.lv)
            .min(aa.end() - self.lv)
            .min(self.end - self.lv);

        let parents = if g_offset == 0 {
            ge.parents.clone()
        } else {
            Frontier::new_1(self.lv - 1)
        };

        let seq_start = aa.1.seq_range.start + a_offset;
        let entry = CGEntry {
            start: self.lv,
            parents,
            span: AgentSpan {
                agent: aa.1.agent,
                seq_range: (seq_start..seq_start + len).into(),
            },
        };

        self.lv += len;
        Some(entry)
    }
}
