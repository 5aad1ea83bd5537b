use crate::rle::{HasLength, MergableSpan, Searchable};
use crate::{AgentId, LVRange};

/// A (agent, seq) pair identifying a single operation by its stable identity.
pub type AgentVersion = (AgentId, usize);

/// A run of sequence numbers from a single agent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AgentSpan {
    pub agent: AgentId,
    pub seq_range: LVRange,
}

impl HasLength for AgentSpan {
    fn len(&self) -> usize {
        self.seq_range.len()
    }
}

impl MergableSpan for AgentSpan {
    fn can_append(&self, other: &Self) -> bool {
        self.agent == other.agent && self.seq_range.can_append(&other.seq_range)
    }

    fn append(&mut self, other: Self) {
        self.seq_range.append(other.seq_range);
    }

    fn prepend(&mut self, other: Self) {
        self.seq_range.prepend(other.seq_range);
    }
}

impl Searchable for AgentSpan {
    type Item = AgentVersion;

    fn get_offset(&self, (agent, seq): AgentVersion) -> Option<usize> {
        if agent == self.agent {
            self.seq_range.get_offset(seq)
        } else {
            None
        }
    }

    fn at_offset(&self, offset: usize) -> AgentVersion {
        (self.agent, self.seq_range.at_offset(offset))
    }
}
