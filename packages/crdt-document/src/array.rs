//! `CRDTArray` (C5): an ordered sequence backed by a move-aware linked RGA.
//!
//! Grounded on the teacher's detach/attach-with-position discipline in
//! `tree.rs`, adapted from parent/child trees to a single flat sequence, with
//! the RGA tie-break (`rga_split.rs`) reused for concurrent inserts and
//! extended to moves, which break ties by `executedAt` instead of node id.

use crate::element::Element;
use crate::time::TimeTicket;

struct ArrayNode {
    id: TimeTicket,
    /// Position tie-break key: the element's `createdAt` until it is moved,
    /// then the `executedAt` of its most recent winning move.
    sort_key: TimeTicket,
    element: Element,
    ins_prev: Option<usize>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct CRDTArray {
    created_at: TimeTicket,
    list: ArrayList,
}

#[derive(Default)]
struct ArrayList {
    arena: Vec<ArrayNode>,
    by_id: std::collections::HashMap<TimeTicket, usize>,
    head: usize,
}

impl Clone for ArrayList {
    fn clone(&self) -> Self {
        if self.arena.is_empty() {
            return ArrayList::default();
        }
        let mut out = ArrayList {
            arena: Vec::with_capacity(self.arena.len()),
            by_id: std::collections::HashMap::new(),
            head: 0,
        };
        out.arena.push(ArrayNode {
            id: TimeTicket::INITIAL,
            sort_key: TimeTicket::INITIAL,
            element: Element::primitive(TimeTicket::INITIAL, crate::primitive::Primitive::Null),
            ins_prev: None,
            prev: None,
            next: None,
        });
        let mut cur = self.arena[self.head].next;
        let mut prev_idx = 0usize;
        while let Some(idx) = cur {
            let src = &self.arena[idx];
            let new_idx = out.arena.len();
            out.arena.push(ArrayNode {
                id: src.id,
                sort_key: src.sort_key,
                element: src.element.deepcopy(),
                ins_prev: src.ins_prev,
                prev: Some(prev_idx),
                next: None,
            });
            out.arena[prev_idx].next = Some(new_idx);
            out.by_id.insert(src.id, new_idx);
            prev_idx = new_idx;
            cur = src.next;
        }
        out
    }
}

impl std::fmt::Debug for ArrayList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.live_iter().map(|(_, e)| e))
            .finish()
    }
}

impl ArrayList {
    fn head_sentinel() -> ArrayNode {
        ArrayNode {
            id: TimeTicket::INITIAL,
            sort_key: TimeTicket::INITIAL,
            element: Element::primitive(TimeTicket::INITIAL, crate::primitive::Primitive::Null),
            ins_prev: None,
            prev: None,
            next: None,
        }
    }

    fn ensure_head(&mut self) {
        if self.arena.is_empty() {
            self.arena.push(Self::head_sentinel());
        }
    }

    fn find_anchor(&self, anchor: usize, sort_key: TimeTicket) -> usize {
        let mut cursor = anchor;
        loop {
            let Some(next_idx) = self.arena[cursor].next else {
                break;
            };
            let next = &self.arena[next_idx];
            if next.ins_prev != Some(anchor) {
                break;
            }
            if next.sort_key.after(&sort_key) {
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

    fn unlink(&mut self, idx: usize) {
        let prev = self.arena[idx].prev;
        let next = self.arena[idx].next;
        if let Some(p) = prev {
            self.arena[p].next = next;
        }
        if let Some(n) = next {
            self.arena[n].prev = prev;
        }
        self.arena[idx].prev = None;
        self.arena[idx].next = None;
    }

    fn anchor_for(&self, prev_id: Option<TimeTicket>) -> usize {
        prev_id
            .and_then(|id| self.by_id.get(&id).copied())
            .unwrap_or(self.head)
    }

    fn insert(&mut self, prev_id: Option<TimeTicket>, element: Element) {
        self.ensure_head();
        let anchor = self.anchor_for(prev_id);
        let id = element.created_at();
        let target = self.find_anchor(anchor, id);
        let new_idx = self.arena.len();
        self.arena.push(ArrayNode {
            id,
            sort_key: id,
            element,
            ins_prev: Some(anchor),
            prev: None,
            next: None,
        });
        self.link_after(target, new_idx);
        self.by_id.insert(id, new_idx);
    }

    /// Reposition `target` right after `after_id` (or the head if `None`).
    /// Returns `false` if a newer move already won the race.
    fn move_after(
        &mut self,
        after_id: Option<TimeTicket>,
        target_id: TimeTicket,
        executed_at: TimeTicket,
    ) -> bool {
        let Some(&target_idx) = self.by_id.get(&target_id) else {
            return false;
        };
        if !self.arena[target_idx].element.mark_moved(executed_at) {
            return false;
        }
        self.unlink(target_idx);
        let anchor = self.anchor_for(after_id);
        let slot = self.find_anchor(anchor, executed_at);
        self.arena[target_idx].sort_key = executed_at;
        self.arena[target_idx].ins_prev = Some(anchor);
        self.link_after(slot, target_idx);
        true
    }

    fn remove(&mut self, target_id: TimeTicket, executed_at: TimeTicket) -> bool {
        let Some(&idx) = self.by_id.get(&target_id) else {
            return false;
        };
        self.arena[idx].element.remove(executed_at)
    }

    fn live_iter(&self) -> impl Iterator<Item = (TimeTicket, &Element)> {
        LiveIter {
            list: self,
            cur: self.arena.get(self.head).and_then(|h| h.next),
        }
    }

    fn predecessor_of(&self, id: TimeTicket) -> Option<TimeTicket> {
        let idx = *self.by_id.get(&id)?;
        let mut cur = self.arena[idx].prev;
        while let Some(p) = cur {
            if p == self.head {
                return None;
            }
            if self.arena[p].element.is_removed() {
                cur = self.arena[p].prev;
                continue;
            }
            return Some(self.arena[p].id);
        }
        None
    }
}

struct LiveIter<'a> {
    list: &'a ArrayList,
    cur: Option<usize>,
}

impl<'a> Iterator for LiveIter<'a> {
    type Item = (TimeTicket, &'a Element);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.cur {
            let node = &self.list.arena[idx];
            self.cur = node.next;
            if !node.element.is_removed() {
                return Some((node.id, &node.element));
            }
        }
        None
    }
}

impl CRDTArray {
    pub fn new(created_at: TimeTicket) -> Self {
        Self {
            created_at,
            list: ArrayList::default(),
        }
    }

    pub fn created_at(&self) -> TimeTicket {
        self.created_at
    }

    pub fn insert_after(&mut self, prev_id: Option<TimeTicket>, element: Element) {
        self.list.insert(prev_id, element);
    }

    pub fn move_after(
        &mut self,
        after_id: Option<TimeTicket>,
        target_id: TimeTicket,
        executed_at: TimeTicket,
    ) -> bool {
        self.list.move_after(after_id, target_id, executed_at)
    }

    pub fn move_front(&mut self, target_id: TimeTicket, executed_at: TimeTicket) -> bool {
        self.list.move_after(None, target_id, executed_at)
    }

    pub fn move_last(&mut self, target_id: TimeTicket, executed_at: TimeTicket) -> bool {
        let last = self.list.live_iter().last().map(|(id, _)| id);
        self.list.move_after(last, target_id, executed_at)
    }

    pub fn remove(&mut self, target_id: TimeTicket, executed_at: TimeTicket) -> bool {
        self.list.remove(target_id, executed_at)
    }

    /// Predecessor of `next_id` among live elements, for `insertBefore`.
    pub fn predecessor_of(&self, next_id: TimeTicket) -> Option<TimeTicket> {
        self.list.predecessor_of(next_id)
    }

    pub fn len(&self) -> usize {
        self.list.live_iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.list.live_iter().nth(index).map(|(_, e)| e)
    }

    /// Looks up a member by its own id regardless of tombstone state. Used
    /// by the root's path registry, which must still reach removed
    /// elements pinned for GC.
    pub fn get_by_id_raw(&self, id: TimeTicket) -> Option<&Element> {
        self.list
            .by_id
            .get(&id)
            .map(|&idx| &self.list.arena[idx].element)
    }

    /// Mutable counterpart of `get_by_id_raw`, used to navigate into a
    /// nested container to apply an operation targeting a deeper parent.
    pub fn get_by_id_raw_mut(&mut self, id: TimeTicket) -> Option<&mut Element> {
        let idx = *self.list.by_id.get(&id)?;
        Some(&mut self.list.arena[idx].element)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.list.live_iter().map(|(_, e)| e)
    }

    pub fn elements(&self) -> Vec<(TimeTicket, &Element)> {
        self.list.live_iter().collect()
    }

    /// -1 on miss, matching the host-language `indexOf` boundary behavior.
    pub fn index_of(&self, target_id: TimeTicket) -> isize {
        self.list
            .live_iter()
            .position(|(id, _)| id == target_id)
            .map(|i| i as isize)
            .unwrap_or(-1)
    }

    /// Searches backward from `from_index`; a negative `from_index` wraps
    /// from `length + from_index`.
    pub fn last_index_of(&self, target_id: TimeTicket, from_index: isize) -> isize {
        let len = self.len() as isize;
        let start = if from_index < 0 {
            len + from_index
        } else {
            from_index
        };
        if start < 0 {
            return -1;
        }
        let start = start.min(len - 1);
        if start < 0 {
            return -1;
        }
        for i in (0..=start).rev() {
            if let Some((id, _)) = self.list.live_iter().nth(i as usize) {
                if id == target_id {
                    return i;
                }
            }
        }
        -1
    }

    /// Desugars to remove+insert. Clamps `start`/`delete_count` exactly like
    /// the host-language `Array.prototype.splice`.
    pub fn splice(
        &mut self,
        start: isize,
        delete_count: isize,
        items: Vec<Element>,
        executed_at: TimeTicket,
    ) {
        let len = self.len() as isize;
        let start = if start < 0 {
            (len + start).max(0)
        } else {
            start.min(len)
        };
        let delete_count = if delete_count < 0 {
            0
        } else {
            delete_count.min(len - start)
        };

        let ids: Vec<TimeTicket> = self
            .list
            .live_iter()
            .skip(start as usize)
            .take(delete_count as usize)
            .map(|(id, _)| id)
            .collect();
        for id in &ids {
            self.list.remove(*id, executed_at);
        }

        let mut prev = if start == 0 {
            None
        } else {
            self.list.live_iter().nth(start as usize - 1).map(|(id, _)| id)
        };
        for item in items {
            let id = item.created_at();
            self.list.insert(prev, item);
            prev = Some(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;
    use crate::time::ActorID;

    fn ticket(lamport: u64) -> TimeTicket {
        TimeTicket::new(lamport, 0, ActorID(1))
    }

    fn el(lamport: u64) -> Element {
        Element::primitive(ticket(lamport), Primitive::Int32(lamport as i32))
    }

    #[test]
    fn insert_after_builds_expected_order() {
        let mut a = CRDTArray::new(TimeTicket::INITIAL);
        a.insert_after(None, el(1));
        let x = ticket(1);
        a.insert_after(Some(x), el(2));
        assert_eq!(a.len(), 2);
        assert_eq!(a.index_of(ticket(1)), 0);
        assert_eq!(a.index_of(ticket(2)), 1);
    }

    #[test]
    fn move_race_larger_executed_at_wins() {
        // [x, y, z]; A moves x after z at t1, B moves x after y at t2 > t1.
        let mut arr = CRDTArray::new(TimeTicket::INITIAL);
        arr.insert_after(None, el(1)); // x
        arr.insert_after(Some(ticket(1)), el(2)); // y
        arr.insert_after(Some(ticket(2)), el(3)); // z

        arr.move_after(Some(ticket(3)), ticket(1), ticket(10)); // t1: x after z
        arr.move_after(Some(ticket(2)), ticket(1), ticket(20)); // t2: x after y (wins)

        let ids: Vec<_> = arr.elements().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![ticket(2), ticket(1), ticket(3)]);
    }

    #[test]
    fn index_of_returns_negative_one_on_miss() {
        let a = CRDTArray::new(TimeTicket::INITIAL);
        assert_eq!(a.index_of(ticket(99)), -1);
    }

    #[test]
    fn splice_truncates_when_delete_count_exceeds_length() {
        let mut a = CRDTArray::new(TimeTicket::INITIAL);
        a.insert_after(None, el(1));
        a.insert_after(Some(ticket(1)), el(2));
        a.splice(0, 100, vec![], ticket(50));
        assert_eq!(a.len(), 0);
    }

    #[test]
    fn splice_negative_delete_count_is_pure_insert() {
        let mut a = CRDTArray::new(TimeTicket::INITIAL);
        a.insert_after(None, el(1));
        a.splice(1, -1, vec![el(2)], ticket(50));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn splice_negative_start_wraps_from_end() {
        let mut a = CRDTArray::new(TimeTicket::INITIAL);
        a.insert_after(None, el(1));
        a.insert_after(Some(ticket(1)), el(2));
        a.splice(-1, 1, vec![], ticket(50));
        assert_eq!(a.len(), 1);
        assert_eq!(a.index_of(ticket(1)), 0);
    }
}
