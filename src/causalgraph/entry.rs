use crate::causalgraph::agent_span::AgentSpan;
use crate::frontier::Frontier;
use crate::rle::HasLength;
use crate::{LVRange, LV};


/// One run of the causal graph, as yielded by
/// [`CausalGraph::iter_range`](crate::CausalGraph::iter_range): a contiguous
/// range of local versions from a single agent, where the first version has
/// the named parents and each subsequent version's parent is its predecessor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CGEntry {
    pub start: LV,
    pub parents: Frontier,
    pub span: AgentSpan,
}

impl CGEntry {
    pub fn lv_range(&self) -> LVRange {
        (self.start..self.start + self.len()).into()
    }
}

impl HasLength for CGEntry {
    fn len(&self) -> usize {
        self.span.len()
    }
}
