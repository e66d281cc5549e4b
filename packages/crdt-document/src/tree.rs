//! `IndexTree` + `CRDTTree` (C4): the hierarchical document engine. Nodes
//! form a parent/child tree instead of `rga_split`'s flat chain, but sibling
//! order at a given parent is resolved with the same RGA tie-break rule
//! ("later ticket sorts earlier among concurrent inserts at the same
//! anchor"), and ancestor splitting during `edit` reuses the node-split
//! idempotency discipline from `rga_split.rs`'s `(id, offset)` index.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::primitive::Primitive;
use crate::rht::Rht;
use crate::time::TimeTicket;

pub type TreeNodeId = (TimeTicket, u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNodeKind {
    Element(String),
    Text(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataSize {
    pub data: usize,
    pub meta: usize,
}

impl std::ops::Add for DataSize {
    type Output = DataSize;
    fn add(self, rhs: DataSize) -> DataSize {
        DataSize {
            data: self.data + rhs.data,
            meta: self.meta + rhs.meta,
        }
    }
}

impl std::ops::AddAssign for DataSize {
    fn add_assign(&mut self, rhs: DataSize) {
        *self = *self + rhs;
    }
}

struct TreeNode {
    id: TreeNodeId,
    kind: TreeNodeKind,
    removed_at: Option<TimeTicket>,
    attrs: Rht<Primitive>,
    parent: Option<usize>,
    children: Vec<usize>,
    ins_prev: Option<usize>,
}

impl TreeNode {
    fn is_text(&self) -> bool {
        matches!(self.kind, TreeNodeKind::Text(_))
    }

    fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    fn own_size(&self) -> usize {
        match &self.kind {
            TreeNodeKind::Text(s) => s.chars().count(),
            TreeNodeKind::Element(_) => 1,
        }
    }
}

/// A `(parent, child)` link that must be unlinked once GC-safe (§4.7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcPair {
    pub parent: TreeNodeId,
    pub child: TreeNodeId,
}

/// One structural change reported back from `edit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeChange {
    pub from: usize,
    pub to: usize,
}

pub struct CRDTTree {
    created_at: TimeTicket,
    arena: Vec<TreeNode>,
    index: HashMap<TreeNodeId, usize>,
    root: usize,
}

impl Clone for CRDTTree {
    fn clone(&self) -> Self {
        // Rebuild via a depth-first replay so each node's `Rht<Primitive>`
        // attribute map is cloned key-by-key instead of needing `Rht` itself
        // to derive `Clone` (see `object.rs`'s `RhtElements` for the same
        // tradeoff with `Rht<Element>`).
        let mut out = CRDTTree::new(self.created_at);
        out.arena[out.root].id = self.arena[self.root].id;
        clone_children(self, self.root, &mut out, out.root);
        out
    }
}

fn clone_children(src: &CRDTTree, src_idx: usize, dst: &mut CRDTTree, dst_idx: usize) {
    for &child_idx in &src.arena[src_idx].children {
        let node = &src.arena[child_idx];
        let new_idx = dst.arena.len();
        let mut attrs = Rht::new();
        for (k, v) in node.attrs.iter() {
            attrs.set(k.to_string(), v.clone(), node.id.0);
        }
        dst.arena.push(TreeNode {
            id: node.id,
            kind: node.kind.clone(),
            removed_at: node.removed_at,
            attrs,
            parent: Some(dst_idx),
            children: Vec::new(),
            ins_prev: None,
        });
        dst.arena[dst_idx].children.push(new_idx);
        dst.index.insert(node.id, new_idx);
        clone_children(src, child_idx, dst, new_idx);
    }
}

impl std::fmt::Debug for CRDTTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CRDTTree({})", self.to_xml())
    }
}

impl CRDTTree {
    pub fn new(created_at: TimeTicket) -> Self {
        let root = TreeNode {
            id: (created_at, 0),
            kind: TreeNodeKind::Element("root".to_string()),
            removed_at: None,
            attrs: Rht::new(),
            parent: None,
            children: Vec::new(),
            ins_prev: None,
        };
        let mut index = HashMap::new();
        index.insert((created_at, 0), 0usize);
        Self {
            created_at,
            arena: vec![root],
            index,
            root: 0,
        }
    }

    pub fn created_at(&self) -> TimeTicket {
        self.created_at
    }

    /// Document-wide live size: 1 per live element node, character count per
    /// live text node.
    pub fn size(&self) -> DataSize {
        let mut total = 0usize;
        self.walk_live(self.root, &mut |idx| {
            if idx != self.root {
                total += self.arena[idx].own_size();
            }
        });
        DataSize {
            data: total,
            meta: 0,
        }
    }

    fn walk_live(&self, idx: usize, visit: &mut impl FnMut(usize)) {
        if self.arena[idx].is_removed() {
            return;
        }
        visit(idx);
        for &child in &self.arena[idx].children {
            self.walk_live(child, visit);
        }
    }

    fn find_anchor(&self, parent: usize, anchor: Option<usize>, id: TimeTicket) -> usize {
        let children = &self.arena[parent].children;
        let mut pos = match anchor {
            Some(a) => children.iter().position(|&c| c == a).map(|p| p + 1).unwrap_or(0),
            None => 0,
        };
        while pos < children.len() {
            let c = children[pos];
            if self.arena[c].ins_prev == anchor && self.arena[c].id.0.after(&id) {
                pos += 1;
            } else {
                break;
            }
        }
        pos
    }

    fn insert_child(&mut self, parent: usize, anchor: Option<usize>, kind: TreeNodeKind, id: TimeTicket) -> usize {
        self.insert_child_with_id(parent, anchor, kind, (id, 0))
    }

    /// Like `insert_child`, but lets a split reuse an existing node's own
    /// `created_at` with a bumped `offset` instead of minting a fresh
    /// ticket (I5), mirroring `rga_split.rs`'s `(id, offset)` index.
    fn insert_child_with_id(
        &mut self,
        parent: usize,
        anchor: Option<usize>,
        kind: TreeNodeKind,
        tree_id: TreeNodeId,
    ) -> usize {
        let new_idx = self.arena.len();
        self.arena.push(TreeNode {
            id: tree_id,
            kind,
            removed_at: None,
            attrs: Rht::new(),
            parent: Some(parent),
            children: Vec::new(),
            ins_prev: anchor,
        });
        let pos = self.find_anchor(parent, anchor, tree_id.0);
        self.arena[parent].children.insert(pos, new_idx);
        self.index.insert(tree_id, new_idx);
        new_idx
    }

    /// Locate the live node holding document index `target`, returning
    /// `(node_idx, offset_within_node)`. `None` only when the tree is empty.
    fn locate(&self, target: usize) -> Option<(usize, usize)> {
        let mut remaining = target;
        let mut result = None;
        self.locate_within(self.root, &mut remaining, &mut result);
        result
    }

    fn locate_within(&self, idx: usize, remaining: &mut usize, result: &mut Option<(usize, usize)>) {
        if result.is_some() || self.arena[idx].is_removed() {
            return;
        }
        if idx != self.root {
            let size = self.arena[idx].own_size();
            if self.arena[idx].is_text() {
                if *remaining <= size {
                    *result = Some((idx, *remaining));
                    return;
                }
                *remaining -= size;
                return;
            }
            if *remaining == 0 {
                *result = Some((idx, 0));
                return;
            }
            *remaining -= 1;
        }
        for &child in &self.arena[idx].children {
            self.locate_within(child, remaining, result);
            if result.is_some() {
                return;
            }
        }
        // No child absorbed the remaining budget (this node is childless, or
        // every live child undershot it): the target sits at this node's own
        // empty tail, e.g. the first insertion into a freshly split element.
        if result.is_none() && *remaining == 0 {
            *result = Some((idx, 0));
        }
    }

    /// The document-wide index at which `idx` begins.
    pub fn index_of(&self, id: TreeNodeId) -> Option<usize> {
        let target = *self.index.get(&id)?;
        let mut count = 0usize;
        let mut found = None;
        self.index_within(self.root, target, &mut count, &mut found);
        found
    }

    fn index_within(&self, idx: usize, target: usize, count: &mut usize, found: &mut Option<usize>) {
        if found.is_some() || self.arena[idx].is_removed() {
            return;
        }
        if idx == target {
            *found = Some(*count);
            return;
        }
        if idx != self.root {
            *count += self.arena[idx].own_size();
        }
        for &child in &self.arena[idx].children {
            self.index_within(child, target, count, found);
            if found.is_some() {
                return;
            }
        }
    }

    /// Ancestor chain of live-child positions down to (not including)
    /// `id`, used for `pathToPosRange`.
    pub fn path_of(&self, id: TreeNodeId) -> Option<Vec<usize>> {
        let target = *self.index.get(&id)?;
        let mut path = Vec::new();
        let mut cur = target;
        while let Some(parent) = self.arena[cur].parent {
            let pos = self.arena[parent]
                .children
                .iter()
                .filter(|&&c| !self.arena[c].is_removed())
                .position(|&c| c == cur)?;
            path.push(pos);
            cur = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Inverse of `path_of`: descend from root through live children.
    pub fn node_at_path(&self, path: &[usize]) -> Result<TreeNodeId> {
        let mut cur = self.root;
        for &step in path {
            let live: Vec<usize> = self.arena[cur]
                .children
                .iter()
                .copied()
                .filter(|&c| !self.arena[c].is_removed())
                .collect();
            cur = *live
                .get(step)
                .ok_or_else(|| Error::OutOfRange(format!("tree path step {step} out of range")))?;
        }
        Ok(self.arena[cur].id)
    }

    /// Splits the ancestor element containing `at` into two siblings so an
    /// insertion can happen exactly at `at`; repeats up to `split_level`
    /// times walking outward. Every split reuses the split node's own
    /// `created_at` with a bumped `offset` rather than consuming a ticket
    /// (I5), matching `rga_split.rs`'s `(id, offset)` split discipline.
    /// Returns `(parent_idx, anchor_idx)` for the insertion.
    fn split_for_insert(&mut self, node_idx: usize, offset: usize, split_level: u32) -> (usize, Option<usize>) {
        if self.arena[node_idx].is_text() {
            if offset == 0 {
                let parent = self.arena[node_idx].parent.unwrap_or(self.root);
                let anchor = self.arena[parent]
                    .children
                    .iter()
                    .position(|&c| c == node_idx)
                    .and_then(|p| p.checked_sub(1))
                    .map(|p| self.arena[parent].children[p]);
                return self.split_ancestors(parent, anchor, split_level);
            }
            let text = match &self.arena[node_idx].kind {
                TreeNodeKind::Text(s) => s.clone(),
                _ => unreachable!(),
            };
            let chars: Vec<char> = text.chars().collect();
            if offset >= chars.len() {
                let parent = self.arena[node_idx].parent.unwrap_or(self.root);
                return self.split_ancestors(parent, Some(node_idx), split_level);
            }
            let (left, right): (String, String) =
                (chars[..offset].iter().collect(), chars[offset..].iter().collect());
            let (orig_id, base_offset) = self.arena[node_idx].id;
            let new_id = (orig_id, base_offset + offset as u32);
            let parent = self.arena[node_idx].parent.unwrap_or(self.root);
            if !self.index.contains_key(&new_id) {
                self.arena[node_idx].kind = TreeNodeKind::Text(left);
                let _ = self.insert_child_with_id(parent, Some(node_idx), TreeNodeKind::Text(right), new_id);
            }
            return self.split_ancestors(parent, Some(node_idx), split_level);
        }
        (node_idx, self.arena[node_idx].children.last().copied())
    }

    fn split_ancestors(&mut self, parent: usize, anchor: Option<usize>, split_level: u32) -> (usize, Option<usize>) {
        if split_level == 0 || parent == self.root {
            return (parent, anchor);
        }
        let tag = match &self.arena[parent].kind {
            TreeNodeKind::Element(t) => t.clone(),
            TreeNodeKind::Text(_) => return (parent, anchor),
        };
        let split_pos = match anchor {
            Some(a) => self.arena[parent]
                .children
                .iter()
                .position(|&c| c == a)
                .map(|p| p + 1)
                .unwrap_or(0),
            None => 0,
        };
        let moved: Vec<usize> = self.arena[parent].children.split_off(split_pos);
        let (orig_id, base_offset) = self.arena[parent].id;
        let new_id = (orig_id, base_offset + 1);
        let grandparent = self.arena[parent].parent.unwrap_or(self.root);
        let new_idx = match self.index.get(&new_id) {
            Some(&existing) => existing,
            None => self.insert_child_with_id(grandparent, Some(parent), TreeNodeKind::Element(tag), new_id),
        };
        for child in moved {
            self.arena[child].parent = Some(new_idx);
            self.arena[new_idx].children.push(child);
        }
        self.split_ancestors(grandparent, Some(parent), split_level - 1)
    }

    /// Delete `[from, to)` and insert `contents` at `from`, splitting up to
    /// `split_level` ancestor elements first (§4.4).
    pub fn edit(
        &mut self,
        from: usize,
        to: usize,
        contents: Vec<TreeNodeKind>,
        split_level: u32,
        executed_at: TimeTicket,
        mut issue_next: impl FnMut() -> TimeTicket,
    ) -> Result<(Vec<TreeChange>, Vec<GcPair>, DataSize)> {
        let mut changes = Vec::new();
        let mut gc_pairs = Vec::new();
        let mut removed = DataSize::default();

        if to > from {
            let ids_in_range = self.ids_in_range(from, to);
            for idx in ids_in_range {
                if !self.arena[idx].is_removed() {
                    removed += DataSize {
                        data: self.arena[idx].own_size(),
                        meta: 0,
                    };
                    self.arena[idx].removed_at = Some(executed_at);
                    if let Some(parent) = self.arena[idx].parent {
                        gc_pairs.push(GcPair {
                            parent: self.arena[parent].id,
                            child: self.arena[idx].id,
                        });
                    }
                }
            }
            changes.push(TreeChange { from, to: from });
        }

        let (node_idx, offset) = self
            .locate(from)
            .ok_or_else(|| Error::OutOfRange(format!("tree index {from} out of range")))?;
        let (parent, mut anchor) = self.split_for_insert(node_idx, offset, split_level);

        let mut inserted = DataSize::default();
        for content in contents {
            let id = issue_next();
            inserted += DataSize {
                data: match &content {
                    TreeNodeKind::Text(s) => s.chars().count(),
                    TreeNodeKind::Element(_) => 1,
                },
                meta: 0,
            };
            let new_idx = self.insert_child(parent, anchor, content, id);
            anchor = Some(new_idx);
        }
        if inserted.data > 0 {
            changes.push(TreeChange { from, to: from });
        }

        Ok((changes, gc_pairs, inserted + removed))
    }

    fn ids_in_range(&self, from: usize, to: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut count = 0usize;
        self.collect_range(self.root, from, to, &mut count, &mut out);
        out
    }

    fn collect_range(&self, idx: usize, from: usize, to: usize, count: &mut usize, out: &mut Vec<usize>) {
        if self.arena[idx].is_removed() {
            return;
        }
        if idx != self.root {
            let start = *count;
            let size = self.arena[idx].own_size();
            if start >= from && start < to {
                out.push(idx);
            }
            *count += size;
        }
        for &child in &self.arena[idx].children {
            self.collect_range(child, from, to, count, out);
        }
    }

    /// Attaches `attrs` to every live element node in `[from, to)`; text
    /// nodes are not addressable by `style` (§4.4).
    pub fn style(&mut self, from: usize, to: usize, attrs: &[(String, Primitive)], executed_at: TimeTicket) {
        for idx in self.ids_in_range(from, to) {
            if !self.arena[idx].is_text() {
                for (k, v) in attrs {
                    self.arena[idx].attrs.set(k.clone(), v.clone(), executed_at);
                }
            }
        }
    }

    pub fn remove_style(&mut self, from: usize, to: usize, keys: &[String], executed_at: TimeTicket) {
        for idx in self.ids_in_range(from, to) {
            if !self.arena[idx].is_text() {
                for k in keys {
                    self.arena[idx].attrs.remove(k, executed_at);
                }
            }
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(self.root, &mut out);
        out
    }

    fn write_xml(&self, idx: usize, out: &mut String) {
        if self.arena[idx].is_removed() {
            return;
        }
        match &self.arena[idx].kind {
            TreeNodeKind::Text(s) => out.push_str(s),
            TreeNodeKind::Element(tag) => {
                let is_root = idx == self.root;
                if !is_root {
                    out.push('<');
                    out.push_str(tag);
                    out.push('>');
                }
                for &child in &self.arena[idx].children {
                    self.write_xml(child, out);
                }
                if !is_root {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
    }
}
