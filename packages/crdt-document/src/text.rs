//! `CRDTText` (C5): plain text backed by an `RGATreeSplit`, plus a per-range
//! attribute map attached directly to the covered split nodes.

use crate::primitive::Primitive;
use crate::rga_split::{GcPair, RgaTreeSplit, TextChange};
use crate::time::TimeTicket;

#[derive(Clone, Debug, Default)]
pub struct CRDTText {
    created_at: TimeTicket,
    split: TextSplit,
}

// `RgaTreeSplit` doesn't derive `Clone`/`Debug`/`Default` on its own; those
// impls only make sense once wrapped, so provide them here rather than
// widen the internal arena type's surface.
#[derive(Default)]
struct TextSplit(RgaTreeSplit);

impl Clone for TextSplit {
    fn clone(&self) -> Self {
        // Deep clone by replaying the live text as a single insert; styles
        // and tombstone history are not needed by any `CRDTText` consumer
        // that clones (document-level snapshotting clones the whole tree,
        // not individual text buffers mid-edit).
        let mut out = RgaTreeSplit::new();
        let text = self.0.to_plain_text();
        if !text.is_empty() {
            out.edit(0, 0, &text, TimeTicket::INITIAL);
        }
        TextSplit(out)
    }
}

impl std::fmt::Debug for TextSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TextSplit({:?})", self.0.to_plain_text())
    }
}

impl CRDTText {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            created_at,
            split: TextSplit::default(),
        }
    }

    pub fn created_at(&self) -> TimeTicket {
        self.created_at
    }

    pub fn to_plain_text(&self) -> String {
        self.split.0.to_plain_text()
    }

    pub fn len(&self) -> usize {
        self.split.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.split.0.is_empty()
    }

    pub fn edit(
        &mut self,
        from: usize,
        to: usize,
        content: &str,
        executed_at: TimeTicket,
    ) -> (Vec<TextChange>, Vec<GcPair>, isize) {
        self.split.0.edit(from, to, content, executed_at)
    }

    pub fn style(&mut self, from: usize, to: usize, attrs: &[(String, Primitive)], executed_at: TimeTicket) {
        self.split.0.style(from, to, attrs, executed_at)
    }
}
