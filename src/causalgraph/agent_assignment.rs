use std::cmp::Ordering;

use smartstring::alias::String as SmartString;

use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::rle::{HasLength, KVPair, RleVec};
use crate::{AgentId, LVRange, LV};

/// Per-agent record: the agent's name and the RLE map from its sequence
/// numbers to runs of local versions.
#[derive(Clone, Debug)]
pub(crate) struct ClientData {
    /// The agent's stable, globally unique name.
    pub(crate) name: SmartString,

    /// A packed in-order list of all operations from this agent, keyed by seq
    /// and mapping to the span of local versions.
    ///
    /// A single agent may have edited multiple concurrent branches, so while
    /// the LV spans here *almost* always ascend with seq, they don't have to.
    /// The list supports interior insertion for that case (never overlap).
    pub(crate) item_times: RleVec<KVPair<LVRange>>,
}

impl ClientData {
    pub fn get_next_seq(&self) -> usize {
        self.item_times.end()
    }

    #[inline]
    pub(crate) fn try_seq_to_lv(&self, seq: usize) -> Option<LV> {
        let (entry, offset) = self.item_times.find_with_offset(seq)?;
        Some(entry.1.start + offset)
    }
}

/// The two-way mapping between local versions and stable (agent, seq)
/// identities.
#[derive(Clone, Debug, Default)]
pub struct AgentAssignment {
    /// Maps local versions to (agent, seq) spans. The list is packed.
    pub(crate) client_with_lv: RleVec<KVPair<AgentSpan>>,

    /// Per-agent data, indexed by AgentId. Maps (agent, seq) back to local
    /// versions.
    pub(crate) client_data: Vec<ClientData>,
}

impl AgentAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.client_data
            .iter()
            .position(|client_data| client_data.name == name)
            .map(|id| id as AgentId)
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        if let Some(id) = self.get_agent_id(name) {
            id
        } else {
            self.client_data.push(ClientData {
                name: SmartString::from(name),
                item_times: RleVec::new(),
            });
            (self.client_data.len() - 1) as AgentId
        }
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.client_data[agent as usize].name.as_str()
    }

    pub fn len(&self) -> usize {
        self.client_with_lv.end()
    }

    pub fn is_empty(&self) -> bool {
        self.client_with_lv.is_empty()
    }

    pub fn next_seq_for_agent(&self, agent: AgentId) -> usize {
        self.client_data[agent as usize].get_next_seq()
    }

    pub(crate) fn lv_to_agent_version(&self, v: LV) -> AgentVersion {
        debug_assert_ne!(v, usize::MAX);
        self.client_with_lv.get(v)
    }

    pub(crate) fn lv_span_to_agent_span(&self, v: LVRange) -> AgentSpan {
        debug_assert_ne!(v.start, usize::MAX);

        let (loc, offset) = self.client_with_lv.find_packed_with_offset(v.start);
        let start = loc.1.seq_range.start + offset;
        let end = usize::min(loc.1.seq_range.end, start + v.len());
        AgentSpan {
            agent: loc.1.agent,
            seq_range: LVRange { start, end },
        }
    }

    pub(crate) fn try_agent_version_to_lv(&self, (agent, seq): AgentVersion) -> Option<LV> {
        debug_assert_ne!(agent, AgentId::MAX);

        self.client_data
            .get(agent as usize)
            .and_then(|c| c.try_seq_to_lv(seq))
    }

    /// Assign the next run of local versions to the named agent, at the
    /// agent's next sequence number.
    pub(crate) fn assign_next_lv_to_client_known(&mut self, agent: AgentId, span: LVRange) {
        debug_assert_eq!(span.start, self.len());

        let client_data = &mut self.client_data[agent as usize];

        let next_seq = client_data.get_next_seq();
        client_data.item_times.push(KVPair(next_seq, span));

        self.client_with_lv.push(KVPair(
            span.start,
            AgentSpan {
                agent,
                seq_range: LVRange {
                    start: next_seq,
                    end: next_seq + span.len(),
                },
            },
        ));
    }

    /// Order two stable identities by agent name (lexicographic), then seq.
    /// This is the deterministic tie break used when integrating concurrent
    /// inserts at the same position.
    pub(crate) fn tie_break_agent_versions(&self, v1: AgentVersion, v2: AgentVersion) -> Ordering {
        if v1 == v2 {
            Ordering::Equal
        } else {
            let c1 = &self.client_data[v1.0 as usize];
            let c2 = &self.client_data[v2.0 as usize];

            c1.name.cmp(&c2.name).then(v1.1.cmp(&v2.1))
        }
    }

    pub(crate) fn tie_break_versions(&self, v1: LV, v2: LV) -> Ordering {
        if v1 == v2 {
            Ordering::Equal
        } else {
            self.tie_break_agent_versions(
                self.lv_to_agent_version(v1),
                self.lv_to_agent_version(v2),
            )
        }
    }

    #[allow(unused)]
    pub(crate) fn dbg_check(&self) {
        self.client_with_lv.check_packed_from_0();

        // Every assignment entry must be mirrored in the owning agent's map,
        // and vice versa.
        let mut total_mapped = 0;
        for (agent, c) in self.client_data.iter().enumerate() {
            for e in c.item_times.iter() {
                total_mapped += e.len();
                let span = self.lv_span_to_agent_span(e.1);
                assert_eq!(span.agent as usize, agent);
                assert_eq!(span.seq_range.start, e.0);
            }
        }
        assert_eq!(total_mapped, self.len());
    }
}
