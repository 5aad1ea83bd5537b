use jumprope::JumpRopeBuf;

use crate::frontier::{debug_assert_frontier_sorted, Frontier};
use crate::list::branch::{apply_op_positionally, checkout, checkout_into};
use crate::list::{Branch, Document, ListValue, OpLog, TextBranch, TextDocument};
use crate::{AgentId, CrdtError, LV};

impl<T: ListValue> Document<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an op log, replaying it in full to build the document snapshot.
    pub fn open(oplog: OpLog<T>) -> Self {
        let branch = checkout(&oplog);
        Self { oplog, branch }
    }

    /// Restore a document from a cached snapshot taken at `version`. The
    /// snapshot must be the checkout of the op log at that version; nothing
    /// is replayed.
    pub fn restore(oplog: OpLog<T>, content: Vec<T>, version: Frontier) -> Self {
        Self {
            oplog,
            branch: Branch { content, version },
        }
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.oplog.get_or_create_agent_id(name)
    }

    pub fn content(&self) -> &[T] {
        &self.branch.content
    }

    pub fn len(&self) -> usize {
        self.branch.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branch.content.is_empty()
    }

    pub fn local_version(&self) -> &[LV] {
        self.branch.version.as_ref()
    }

    /// Insert values locally. The snapshot, op log and version advance
    /// together - no merge machinery involved.
    pub fn insert(&mut self, agent: AgentId, pos: usize, values: &[T]) {
        debug_assert_eq!(self.branch.version.as_ref(), self.oplog.local_version());

        for (i, v) in values.iter().enumerate() {
            self.branch.content.insert(pos + i, v.clone());
        }
        let last = self.oplog.local_insert(agent, pos, values.iter().cloned());
        self.branch.version.replace_with_1(last);
    }

    /// Delete `len` values at `pos` locally.
    pub fn delete(&mut self, agent: AgentId, pos: usize, len: usize) -> Result<(), CrdtError> {
        debug_assert_eq!(self.branch.version.as_ref(), self.oplog.local_version());

        let last = self.oplog.local_delete(agent, pos, len)?;
        self.branch.content.drain(pos..pos + len);
        self.branch.version.replace_with_1(last);
        Ok(())
    }

    /// Merge all operations from a remote peer's op log. When the new
    /// operations linearly extend our version they're patched in
    /// positionally; any concurrency falls back to a full replay.
    pub fn merge_remote(&mut self, remote: &OpLog<T>) -> Result<(), CrdtError> {
        self.oplog.merge_from(remote)?;

        let heads = Frontier::from_sorted(self.oplog.local_version());
        let ff = self
            .oplog
            .cg
            .graph
            .fast_forward_ranges(self.branch.version.as_ref(), heads.as_ref());

        if let Some(ranges) = ff {
            for range in ranges {
                for lv in range.iter() {
                    apply_op_positionally(&self.oplog, &mut self.branch.content, lv);
                }
            }
            self.branch.version = heads;
        } else {
            self.branch = checkout(&self.oplog);
        }
        Ok(())
    }

    pub fn dbg_check(&self) {
        self.oplog.dbg_check();
        debug_assert_frontier_sorted(self.branch.version.as_ref());
        let expected = checkout(&self.oplog);
        assert_eq!(self.branch.content, expected.content);
        assert_eq!(self.branch.version, expected.version);
    }
}

impl TextDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(oplog: OpLog<char>) -> Self {
        let mut content = JumpRopeBuf::new();
        checkout_into(&oplog, &mut content);
        let version = Frontier::from_sorted(oplog.local_version());
        Self {
            oplog,
            branch: TextBranch { content, version },
        }
    }

    /// Restore from a cached string snapshot taken at `version`. O(len) to
    /// copy the text; nothing is replayed.
    pub fn restore(oplog: OpLog<char>, text: &str, version: Frontier) -> Self {
        let mut content = JumpRopeBuf::new();
        content.insert(0, text);
        Self {
            oplog,
            branch: TextBranch { content, version },
        }
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.oplog.get_or_create_agent_id(name)
    }

    pub fn text(&self) -> String {
        self.branch.content.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.branch.content.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.branch.content.is_empty()
    }

    pub fn local_version(&self) -> &[LV] {
        self.branch.version.as_ref()
    }

    pub fn insert(&mut self, agent: AgentId, pos: usize, content: &str) {
        debug_assert_eq!(self.branch.version.as_ref(), self.oplog.local_version());

        self.branch.content.insert(pos, content);
        let last = self.oplog.local_insert(agent, pos, content.chars());
        self.branch.version.replace_with_1(last);
    }

    pub fn delete(&mut self, agent: AgentId, pos: usize, len: usize) -> Result<(), CrdtError> {
        debug_assert_eq!(self.branch.version.as_ref(), self.oplog.local_version());

        let last = self.oplog.local_delete(agent, pos, len)?;
        self.branch.content.remove(pos..pos + len);
        self.branch.version.replace_with_1(last);
        Ok(())
    }

    pub fn merge_remote(&mut self, remote: &OpLog<char>) -> Result<(), CrdtError> {
        self.oplog.merge_from(remote)?;

        let heads = Frontier::from_sorted(self.oplog.local_version());
        let ff = self
            .oplog
            .cg
            .graph
            .fast_forward_ranges(self.branch.version.as_ref(), heads.as_ref());

        if let Some(ranges) = ff {
            for range in ranges {
                for lv in range.iter() {
                    apply_op_positionally(&self.oplog, &mut self.branch.content, lv);
                }
            }
            self.branch.version = heads;
        } else {
            let mut content = JumpRopeBuf::new();
            checkout_into(&self.oplog, &mut content);
            self.branch = TextBranch {
                content,
                version: heads,
            };
        }
        Ok(())
    }

    pub fn dbg_check(&self) {
        self.oplog.dbg_check();
        let mut expected = JumpRopeBuf::new();
        checkout_into(&self.oplog, &mut expected);
        assert_eq!(self.branch.content, expected);
        assert_eq!(self.branch.version.as_ref(), self.oplog.local_version());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_edits_keep_snapshot_in_sync() {
        let mut doc = TextDocument::new();
        assert!(doc.is_empty());
        let seph = doc.get_or_create_agent_id("seph");

        doc.insert(seph, 0, "hello");
        doc.insert(seph, 5, " world");
        doc.delete(seph, 0, 6).unwrap();

        assert_eq!(doc.text(), "world");
        doc.dbg_check();
    }

    #[test]
    fn open_and_restore_round_trip() {
        let mut doc = TextDocument::new();
        let seph = doc.get_or_create_agent_id("seph");
        doc.insert(seph, 0, "snapshot me");

        let opened = TextDocument::open(doc.oplog.clone());
        assert_eq!(opened.text(), "snapshot me");
        assert_eq!(opened.local_version(), doc.local_version());

        // Restoring from the cached text skips the replay entirely.
        let restored = TextDocument::restore(
            doc.oplog.clone(),
            &doc.text(),
            Frontier::from_sorted(doc.local_version()),
        );
        assert_eq!(restored.text(), "snapshot me");
        restored.dbg_check();

        let generic: Document<char> = Document::open(doc.oplog.clone());
        assert_eq!(generic.len(), doc.len_chars());
        assert!(!generic.is_empty());
        generic.dbg_check();
    }

    #[test]
    fn delete_zero_len_leaves_doc_untouched() {
        let mut doc = TextDocument::new();
        let seph = doc.get_or_create_agent_id("seph");
        doc.insert(seph, 0, "abc");

        assert_eq!(doc.delete(seph, 1, 0), Err(CrdtError::InvalidLength));
        assert_eq!(doc.text(), "abc");
        doc.dbg_check();
    }

    #[test]
    fn merge_remote_fast_forwards_sequential_history() {
        let mut doc = TextDocument::new();
        let seph = doc.get_or_create_agent_id("seph");
        doc.insert(seph, 0, "abc");

        // The remote peer has our ops plus a linear extension.
        let mut remote = doc.oplog.clone();
        let mike = remote.get_or_create_agent_id("mike");
        remote.local_insert(mike, 3, "def".chars());

        doc.merge_remote(&remote).unwrap();
        assert_eq!(doc.text(), "abcdef");
        doc.dbg_check();
    }

    #[test]
    fn merge_remote_with_concurrency_replays() {
        let mut a = TextDocument::new();
        let alice = a.get_or_create_agent_id("alice");
        a.insert(alice, 0, "x");

        let mut b = TextDocument::open(a.oplog.clone());
        let bob = b.get_or_create_agent_id("bob");

        a.insert(alice, 1, "A");
        b.insert(bob, 1, "B");

        a.merge_remote(&b.oplog).unwrap();
        b.merge_remote(&a.oplog).unwrap();

        assert_eq!(a.text(), "xAB");
        assert_eq!(b.text(), "xAB");
        a.dbg_check();
        b.dbg_check();
    }

    #[test]
    fn generic_document_works_with_any_value_type() {
        let mut doc: Document<u32> = Document::new();
        let seph = doc.get_or_create_agent_id("seph");

        doc.insert(seph, 0, &[10, 20, 30]);
        doc.delete(seph, 1, 1).unwrap();
        assert_eq!(doc.content(), &[10, 30]);

        let restored = Document::restore(
            doc.oplog.clone(),
            doc.content().to_vec(),
            Frontier::from_sorted(doc.local_version()),
        );
        assert_eq!(restored.content(), &[10, 30]);
        doc.dbg_check();
    }
}
