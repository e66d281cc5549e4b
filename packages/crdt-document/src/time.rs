//! Logical time: actor identity and the Lamport-ordered `TimeTicket` (C1).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lamport timestamp. Strictly increasing per actor (invariant I1).
pub type Lamport = u64;

/// Opaque 128-bit identity, unique per client activation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActorID(pub u128);

impl ActorID {
    /// Sentinel actor that precedes every real actor in tie-breaking order.
    pub const INITIAL: ActorID = ActorID(0);
    /// Sentinel actor that follows every real actor in tie-breaking order.
    pub const MAX: ActorID = ActorID(u128::MAX);

    /// Mint a fresh, effectively-unique actor id for a new client activation.
    pub fn new() -> Self {
        ActorID(rand::random())
    }
}

impl Default for ActorID {
    fn default() -> Self {
        Self::new()
    }
}

/// Total order over operations: `(lamport, actor, delimiter)` lexicographic.
///
/// `delimiter` only breaks ties between tickets minted within the same
/// change (same lamport, same actor) — see `ChangeContext::issue_time_ticket`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeTicket {
    pub lamport: Lamport,
    pub delimiter: u32,
    pub actor: ActorID,
}

impl Default for TimeTicket {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl TimeTicket {
    /// Precedes every ticket that can legally be issued.
    pub const INITIAL: TimeTicket = TimeTicket {
        lamport: 0,
        delimiter: 0,
        actor: ActorID::INITIAL,
    };

    /// Follows every ticket that can legally be issued.
    pub const MAX: TimeTicket = TimeTicket {
        lamport: u64::MAX,
        delimiter: u32::MAX,
        actor: ActorID::MAX,
    };

    pub fn new(lamport: Lamport, delimiter: u32, actor: ActorID) -> Self {
        Self {
            lamport,
            delimiter,
            actor,
        }
    }

    pub fn after(&self, other: &TimeTicket) -> bool {
        self.compare(other) == std::cmp::Ordering::Greater
    }

    pub fn compare(&self, other: &TimeTicket) -> std::cmp::Ordering {
        (self.lamport, self.actor, self.delimiter).cmp(&(
            other.lamport,
            other.actor,
            other.delimiter,
        ))
    }
}

impl Ord for TimeTicket {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.compare(other)
    }
}

impl PartialOrd for TimeTicket {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_precedes_everything_and_max_follows_everything() {
        let actor = ActorID(7);
        let t = TimeTicket::new(1, 0, actor);
        assert!(t.after(&TimeTicket::INITIAL));
        assert!(TimeTicket::MAX.after(&t));
    }

    #[test]
    fn ordering_is_lamport_then_actor_then_delimiter() {
        let a = TimeTicket::new(1, 5, ActorID(1));
        let b = TimeTicket::new(2, 0, ActorID(1));
        assert!(b.after(&a));

        let c = TimeTicket::new(1, 0, ActorID(1));
        let d = TimeTicket::new(1, 0, ActorID(2));
        assert!(d.after(&c));

        let e = TimeTicket::new(1, 0, ActorID(1));
        let f = TimeTicket::new(1, 1, ActorID(1));
        assert!(f.after(&e));
    }
}
