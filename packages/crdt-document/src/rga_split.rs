//! `RGATreeSplit` (C3): a position-addressable text buffer built from
//! splittable, tombstone-carrying nodes.
//!
//! Grounded on the teacher's doubly-linked, log-driven commit discipline in
//! `tree.rs` (detach/attach plus an explicit per-node state record), applied
//! here to a content buffer instead of a parent/child tree: nodes form a
//! single `prev`/`next` chain in document order, and a separate `ins_prev`
//! pointer records the RGA origin used to break ties between concurrent
//! inserts at the same anchor.

use std::collections::HashMap;

use crate::rht::Rht;
use crate::time::TimeTicket;

/// `(id, offset)` — the split-node identity a position falls in.
pub type SplitNodeKey = (TimeTicket, u32);

struct SplitNode {
    id: TimeTicket,
    offset: u32,
    content: String,
    removed_at: Option<TimeTicket>,
    ins_prev: Option<usize>,
    prev: Option<usize>,
    next: Option<usize>,
    styles: Rht<crate::primitive::Primitive>,
}

/// One tombstoned-or-inserted run reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub from: usize,
    pub to: usize,
    pub content: Option<String>,
}

/// A `(parent, child)` link that must be unlinked once GC-safe (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcPair {
    pub parent: SplitNodeKey,
    pub child: SplitNodeKey,
}

pub struct RgaTreeSplit {
    arena: Vec<SplitNode>,
    index: HashMap<SplitNodeKey, usize>,
    head: usize,
}

impl Default for RgaTreeSplit {
    fn default() -> Self {
        let head = SplitNode {
            id: TimeTicket::INITIAL,
            offset: 0,
            content: String::new(),
            removed_at: None,
            ins_prev: None,
            prev: None,
            next: None,
            styles: Rht::new(),
        };
        let mut index = HashMap::new();
        index.insert((TimeTicket::INITIAL, 0), 0usize);
        Self {
            arena: vec![head],
            index,
            head: 0,
        }
    }
}

impl RgaTreeSplit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (non-tombstoned) character count.
    pub fn len(&self) -> usize {
        self.to_plain_text().chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        let mut cur = self.arena[self.head].next;
        while let Some(idx) = cur {
            let node = &self.arena[idx];
            if node.removed_at.is_none() {
                out.push_str(&node.content);
            }
            cur = node.next;
        }
        out
    }

    fn find_by_anchor_and_id(&self, anchor: usize, id: TimeTicket) -> usize {
        // Walk the chain of direct RGA siblings of `anchor` (nodes whose
        // `ins_prev == anchor`), skipping any whose id sorts after `id`
        // (later tickets are placed immediately after the anchor).
        let mut cursor = anchor;
        loop {
            let next = self.arena[cursor].next;
            let Some(next_idx) = next else { break };
            let next_node = &self.arena[next_idx];
            if next_node.ins_prev != Some(anchor) {
                break;
            }
            if next_node.id.after(&id) {
                cursor = next_idx;
            } else {
                break;
            }
        }
        cursor
    }

    fn link_after(&mut self, after: usize, new_idx: usize) {
        let next = self.arena[after].next;
        self.arena[new_idx].prev = Some(after);
        self.arena[new_idx].next = next;
        self.arena[after].next = Some(new_idx);
        if let Some(next_idx) = next {
            self.arena[next_idx].prev = Some(new_idx);
        }
    }

    /// Insert `content` as one new node anchored right after `anchor`,
    /// honoring the RGA tie-break rule among concurrent siblings.
    fn insert_content(&mut self, anchor: usize, id: TimeTicket, content: String) -> usize {
        let target = self.find_by_anchor_and_id(anchor, id);
        let node = SplitNode {
            id,
            offset: 0,
            content,
            removed_at: None,
            ins_prev: Some(anchor),
            prev: None,
            next: None,
            styles: Rht::new(),
        };
        let new_idx = self.arena.len();
        self.arena.push(node);
        self.index.insert((id, 0), new_idx);
        self.link_after(target, new_idx);
        new_idx
    }

    /// Find or create the node whose content begins exactly at `char_idx` in
    /// the live text, splitting an existing node if necessary (I5). Returns
    /// the arena index of the node immediately *before* that boundary (the
    /// anchor a subsequent insert should attach to), so that an index of 0
    /// resolves to the head sentinel.
    fn split_at(&mut self, char_idx: usize) -> usize {
        if char_idx == 0 {
            return self.head;
        }
        let mut remaining = char_idx;
        let mut cur = self.arena[self.head].next;
        while let Some(idx) = cur {
            let removed = self.arena[idx].removed_at.is_some();
            let len = self.arena[idx].content.chars().count();
            if !removed {
                if remaining < len {
                    return self.split_node_at(idx, remaining);
                }
                remaining -= len;
                if remaining == 0 {
                    return idx;
                }
            }
            cur = self.arena[idx].next;
        }
        // char_idx was at or beyond the end of the live text; the last live
        // node (or head, if the document is empty) is the correct anchor.
        self.last_live_idx().unwrap_or(self.head)
    }

    fn last_live_idx(&self) -> Option<usize> {
        let mut cur = self.arena[self.head].next;
        let mut last = None;
        while let Some(idx) = cur {
            if self.arena[idx].removed_at.is_none() {
                last = Some(idx);
            }
            cur = self.arena[idx].next;
        }
        last
    }

    /// Split node `idx` so a new node begins at local offset `at` within its
    /// live content; returns the index of the left (pre-split) node, which
    /// is what callers anchor to. Idempotent: if `at == 0` it's already a
    /// boundary, and a split that has already happened is detected via the
    /// `(id, offset)` index.
    fn split_node_at(&mut self, idx: usize, at: usize) -> usize {
        if at == 0 {
            return self.arena[idx].prev.unwrap_or(self.head);
        }
        let id = self.arena[idx].id;
        let base_offset = self.arena[idx].offset;
        let new_offset = base_offset + at as u32;
        if let Some(&existing) = self.index.get(&(id, new_offset)) {
            return self.arena[existing].prev.unwrap_or(idx);
        }

        let full: Vec<char> = self.arena[idx].content.chars().collect();
        let (left, right): (String, String) = (
            full[..at].iter().collect(),
            full[at..].iter().collect(),
        );
        let removed_at = self.arena[idx].removed_at;
        let old_next = self.arena[idx].next;

        self.arena[idx].content = left;

        let right_node = SplitNode {
            id,
            offset: new_offset,
            content: right,
            removed_at,
            ins_prev: self.arena[idx].ins_prev,
            prev: Some(idx),
            next: old_next,
            styles: Rht::new(),
        };
        let right_idx = self.arena.len();
        self.arena.push(right_node);
        self.index.insert((id, new_offset), right_idx);
        self.arena[idx].next = Some(right_idx);
        if let Some(next_idx) = old_next {
            self.arena[next_idx].prev = Some(right_idx);
        }
        idx
    }

    /// Delete `[from, to)` and insert `content` at `from`; returns the
    /// reported changes, GC pairs for tombstoned runs, and the live-length
    /// delta.
    pub fn edit(
        &mut self,
        from: usize,
        to: usize,
        content: &str,
        executed_at: TimeTicket,
    ) -> (Vec<TextChange>, Vec<GcPair>, isize) {
        let left_anchor = self.split_at(from);

        let mut changes = Vec::new();
        let mut gc_pairs = Vec::new();
        let mut removed_chars = 0isize;

        // Nothing to tombstone for a pure insert; the right boundary is
        // only meaningful (and only split) when there is a range to delete.
        if to > from {
            let right_boundary = self.split_at(to);
            let mut cur = self.arena[left_anchor].next;
            while let Some(idx) = cur {
                if idx == right_boundary {
                    break;
                }
                let next = self.arena[idx].next;
                if self.arena[idx].removed_at.is_none() {
                    let len = self.arena[idx].content.chars().count();
                    self.arena[idx].removed_at = Some(executed_at);
                    removed_chars += len as isize;
                    changes.push(TextChange {
                        from,
                        to: from,
                        content: None,
                    });
                    if let Some(parent) = self.arena[idx].ins_prev {
                        gc_pairs.push(GcPair {
                            parent: (self.arena[parent].id, self.arena[parent].offset),
                            child: (self.arena[idx].id, self.arena[idx].offset),
                        });
                    }
                }
                cur = next;
            }
        }

        let mut inserted_chars = 0isize;
        if !content.is_empty() {
            self.insert_content(left_anchor, executed_at, content.to_string());
            inserted_chars = content.chars().count() as isize;
            changes.push(TextChange {
                from,
                to: from,
                content: Some(content.to_string()),
            });
        }

        (changes, gc_pairs, inserted_chars - removed_chars)
    }

    /// Attach `attrs` to every live node covering `[from, to)`; does not
    /// tombstone any text.
    pub fn style(
        &mut self,
        from: usize,
        to: usize,
        attrs: &[(String, crate::primitive::Primitive)],
        executed_at: TimeTicket,
    ) {
        let left_anchor = self.split_at(from);
        let right_boundary = self.split_at(to);

        let mut cur = self.arena[left_anchor].next;
        while let Some(idx) = cur {
            if idx == right_boundary {
                break;
            }
            if self.arena[idx].removed_at.is_none() {
                for (key, value) in attrs {
                    self.arena[idx].styles.set(key.clone(), value.clone(), executed_at);
                }
            }
            cur = self.arena[idx].next;
        }
    }

    /// Index (into live text) of the start of the node identified by `key`,
    /// or `None` if unknown. Used by index<->position duality helpers.
    pub fn index_of(&self, key: SplitNodeKey) -> Option<usize> {
        let target = *self.index.get(&key)?;
        let mut count = 0usize;
        let mut cur = self.arena[self.head].next;
        while let Some(idx) = cur {
            if idx == target {
                return Some(count);
            }
            if self.arena[idx].removed_at.is_none() {
                count += self.arena[idx].content.chars().count();
            }
            cur = self.arena[idx].next;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ActorID;

    fn ticket(lamport: u64) -> TimeTicket {
        TimeTicket::new(lamport, 0, ActorID(1))
    }

    #[test]
    fn split_then_delete_preserves_surrounding_content() {
        let mut split = RgaTreeSplit::new();
        split.edit(0, 0, "ABCD", ticket(1));
        assert_eq!(split.to_plain_text(), "ABCD");

        split.edit(1, 3, "12", ticket(2));
        assert_eq!(split.to_plain_text(), "A12D");
    }

    #[test]
    fn concurrent_inserts_at_same_anchor_order_by_descending_ticket() {
        let mut a = RgaTreeSplit::new();
        a.edit(0, 0, "X", ticket(1));
        // Two more actors insert at position 0 concurrently; apply in
        // arrival order lowest-ticket-first and highest-ticket-first and
        // confirm both converge to the same final text.
        let mut b = RgaTreeSplit::new();
        b.edit(0, 0, "X", ticket(1));

        a.edit(0, 0, "A", ticket(2));
        a.edit(0, 0, "B", ticket(3));

        b.edit(0, 0, "B", ticket(3));
        b.edit(0, 0, "A", ticket(2));

        assert_eq!(a.to_plain_text(), b.to_plain_text());
    }

    #[test]
    fn style_does_not_change_text() {
        let mut split = RgaTreeSplit::new();
        split.edit(0, 0, "hello", ticket(1));
        split.style(
            0,
            5,
            &[("bold".to_string(), crate::primitive::Primitive::Bool(true))],
            ticket(2),
        );
        assert_eq!(split.to_plain_text(), "hello");
    }
}
