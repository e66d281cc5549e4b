//! S5: concurrent counter increases commute, so both replicas converge to
//! the same sum regardless of the order they apply each other's deltas.

use crdt_document::counter::CRDTCounter;
use crdt_document::primitive::Primitive;
use crdt_document::time::{ActorID, TimeTicket};

fn ticket(lamport: u64, actor: ActorID) -> TimeTicket {
    TimeTicket::new(lamport, 0, actor)
}

#[test]
fn concurrent_increases_converge_regardless_of_apply_order() {
    let actor_a = ActorID(1);
    let created_at = ticket(0, actor_a);

    let mut replica_1 = CRDTCounter::new(created_at, Primitive::Int64(0)).unwrap();
    replica_1.increase(&Primitive::Int64(3)).unwrap();
    replica_1.increase(&Primitive::Int64(5)).unwrap();

    let mut replica_2 = CRDTCounter::new(created_at, Primitive::Int64(0)).unwrap();
    replica_2.increase(&Primitive::Int64(5)).unwrap();
    replica_2.increase(&Primitive::Int64(3)).unwrap();

    assert_eq!(replica_1.value, Primitive::Int64(8));
    assert_eq!(replica_2.value, Primitive::Int64(8));
}
