use crate::causalgraph::agent_span::AgentSpan;
use crate::list::operation::{ListOp, ListOpKind};
use crate::list::{ListValue, OpLog};
use crate::rle::HasLength;
use crate::{AgentId, CrdtError, RawVersion, LV};

impl<T: ListValue> OpLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of operations stored (also the next local version).
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.ops.len(), self.cg.len());
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.cg.get_or_create_agent_id(name)
    }

    /// The version covering every operation in the log.
    pub fn local_version(&self) -> &[LV] {
        self.cg.version.as_ref()
    }

    pub fn op_at(&self, v: LV) -> &ListOp<T> {
        &self.ops[v]
    }

    /// Append a run of locally created inserts, one op per element, parented
    /// at the log's current version. Returns the last assigned LV.
    pub fn local_insert<I: IntoIterator<Item = T>>(
        &mut self,
        agent: AgentId,
        pos: usize,
        content: I,
    ) -> LV {
        let mut len = 0;
        for (i, val) in content.into_iter().enumerate() {
            self.ops.push(ListOp::Ins {
                pos: pos + i,
                content: val,
            });
            len += 1;
        }
        assert!(len > 0, "Insert must insert something");

        let span = self.cg.assign_local_op(agent, len);
        debug_assert_eq!(span.end, self.ops.len());
        span.last()
    }

    /// Append a run of locally created deletes. All `len` ops delete at the
    /// same position - each one deletes the next character that slides into
    /// `pos`. Returns the last assigned LV.
    pub fn local_delete(&mut self, agent: AgentId, pos: usize, len: usize) -> Result<LV, CrdtError> {
        if len == 0 {
            return Err(CrdtError::InvalidLength);
        }

        for _ in 0..len {
            self.ops.push(ListOp::Del { pos });
        }

        let span = self.cg.assign_local_op(agent, len);
        debug_assert_eq!(span.end, self.ops.len());
        Ok(span.last())
    }

    /// Ingest a single foreign operation with an explicit identity and
    /// parents. Returns false (without changing anything) when the operation
    /// is already known. The parents must name operations this log already
    /// has.
    pub fn push_op(
        &mut self,
        id: RawVersion,
        parents: &[RawVersion],
        kind: ListOpKind,
        pos: usize,
        content: Option<T>,
    ) -> Result<bool, CrdtError> {
        if kind == ListOpKind::Ins && content.is_none() {
            return Err(CrdtError::MissingContent);
        }

        let parents = self.cg.raw_to_frontier(parents.iter())?;
        let agent = self.cg.get_or_create_agent_id(&id.0);

        let added = self.cg.merge_and_assign(
            parents.as_ref(),
            AgentSpan {
                agent,
                seq_range: (id.1..id.1 + 1).into(),
            },
        );

        if added.is_empty() {
            return Ok(false);
        }
        if added.start != self.ops.len() {
            return Err(CrdtError::InvariantBroken);
        }

        self.ops.push(match kind {
            ListOpKind::Ins => ListOp::Ins {
                pos,
                content: content.unwrap(),
            },
            ListOpKind::Del => ListOp::Del { pos },
        });
        Ok(true)
    }

    /// Merge every operation from `src` that this log hasn't seen, preserving
    /// each operation's identity and parents. Idempotent, and commutative in
    /// the set of operations known afterwards.
    pub fn merge_from(&mut self, src: &OpLog<T>) -> Result<(), CrdtError> {
        // Figure out what src has that we don't: summarize ourselves,
        // intersect against src's graph, and diff from the common frontier.
        let summary = self.cg.summarize_version();
        let (common, _remainder) = src.cg.intersect_with_summary(&summary, &[]);
        let (only_a, only_b) = src.cg.graph.diff(common.as_ref(), src.local_version());
        debug_assert!(only_a.is_empty());

        for range in only_b {
            // Ship each range through the serialized diff form - the same
            // path a network sync takes - and append the matching op slice,
            // skipping any prefix we turned out to already know.
            let entries = src.cg.serialize_diff(std::slice::from_ref(&range));

            let mut src_lv = range.start;
            for e in &entries {
                let added = self.cg.merge_partial_entry(e)?;
                let skip = e.len - added.len();

                for lv in src_lv + skip..src_lv + e.len {
                    self.ops.push(src.ops[lv].clone());
                }
                debug_assert_eq!(self.ops.len(), self.cg.len());

                src_lv += e.len;
            }
            debug_assert_eq!(src_lv, range.end);
        }

        Ok(())
    }

    /// Deep consistency check: the causal graph invariants hold and the op
    /// list covers exactly the graph.
    pub fn dbg_check(&self) {
        assert_eq!(self.ops.len(), self.cg.len());
        self.cg.dbg_check();
    }
}
