//! `ChangePack` (C8): the atomic exchange unit with the server — either a
//! delta (a list of changes) or a full snapshot.

use crate::change::Change;
use crate::checkpoint::Checkpoint;
use crate::time::TimeTicket;
use crate::version_vector::VersionVector;

#[derive(Clone, Debug)]
pub struct ChangePack {
    pub doc_key: String,
    pub checkpoint: Checkpoint,
    pub is_removed: bool,
    pub changes: Vec<Change>,
    /// Full document re-initialization; present only on a fast-forward pack.
    pub snapshot: Option<Vec<u8>>,
    pub version_vector: VersionVector,
    /// GC hint: the earliest ticket every attached replica has synced past.
    pub min_synced_ticket: Option<TimeTicket>,
}

impl ChangePack {
    pub fn new(doc_key: impl Into<String>, checkpoint: Checkpoint) -> Self {
        Self {
            doc_key: doc_key.into(),
            checkpoint,
            is_removed: false,
            changes: Vec::new(),
            snapshot: None,
            version_vector: VersionVector::new(),
            min_synced_ticket: None,
        }
    }

    /// A pack carrying only a snapshot is a fast-forward: local replay of
    /// `changes` is skipped entirely.
    pub fn is_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}
