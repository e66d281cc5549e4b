//! Per-actor causality and GC-safety thresholds (C1).
//!
//! Grounded on the teacher's `version_vector.rs`, collapsed from its
//! gap-aware ranges down to a plain "highest lamport observed" map: this
//! spec's causal-acceptance model (§4.6) buffers out-of-order operations at
//! the `Change` layer, so a CRDT structure only ever observes a version
//! vector that is already contiguous from its own point of view.

use std::collections::HashMap;

use crate::time::{ActorID, Lamport};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VersionVector {
    entries: HashMap<ActorID, Lamport>,
}

impl VersionVector {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Highest lamport observed from `actor`, or 0 if never observed.
    pub fn get(&self, actor: &ActorID) -> Lamport {
        self.entries.get(actor).copied().unwrap_or(0)
    }

    pub fn set(&mut self, actor: ActorID, lamport: Lamport) {
        self.entries.insert(actor, lamport);
    }

    /// Raise `actor`'s high-water mark to `lamport` unless already higher.
    pub fn observe(&mut self, actor: &ActorID, lamport: Lamport) {
        let entry = self.entries.entry(*actor).or_insert(0);
        if lamport > *entry {
            *entry = lamport;
        }
    }

    /// Field-wise maximum of two version vectors.
    pub fn max(&self, other: &VersionVector) -> VersionVector {
        let mut out = self.clone();
        for (actor, lamport) in &other.entries {
            out.observe(actor, *lamport);
        }
        out
    }

    /// Field-wise minimum. Actors missing from either side are treated as 0,
    /// so they drop out of the result (min with 0 is 0 and carries no
    /// information).
    pub fn min(&self, other: &VersionVector) -> VersionVector {
        let mut out = VersionVector::new();
        for actor in self.entries.keys().chain(other.entries.keys()) {
            let lamport = self.get(actor).min(other.get(actor));
            if lamport > 0 {
                out.set(*actor, lamport);
            }
        }
        out
    }

    pub fn merge(&mut self, other: &VersionVector) {
        for (actor, lamport) in &other.entries {
            self.observe(actor, *lamport);
        }
    }

    /// True iff this vector has observed everything `ticket` depends on,
    /// i.e. `self[ticket.actor] >= ticket.lamport`.
    pub fn after_or_equal(&self, actor: &ActorID, lamport: Lamport) -> bool {
        self.get(actor) >= lamport
    }

    /// True iff `self` dominates `other` on every actor in `other`.
    pub fn is_aware_of(&self, other: &VersionVector) -> bool {
        other
            .entries
            .iter()
            .all(|(actor, lamport)| self.get(actor) >= *lamport)
    }

    /// Restrict to a subset of actors.
    pub fn filter(&self, actors: &[ActorID]) -> VersionVector {
        let mut out = VersionVector::new();
        for actor in actors {
            let lamport = self.get(actor);
            if lamport > 0 {
                out.set(*actor, lamport);
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &HashMap<ActorID, Lamport> {
        &self.entries
    }
}
