//! S2: two concurrent `move_after` calls targeting the same element race;
//! the larger `executedAt` wins regardless of application order, so both
//! replicas converge to the same final order.

use crdt_document::array::CRDTArray;
use crdt_document::element::Element;
use crdt_document::primitive::Primitive;
use crdt_document::time::{ActorID, TimeTicket};

fn ticket(lamport: u64, actor: ActorID) -> TimeTicket {
    TimeTicket::new(lamport, 0, actor)
}

fn seed(actor: ActorID) -> (CRDTArray, TimeTicket, TimeTicket, TimeTicket) {
    let mut array = CRDTArray::new(TimeTicket::INITIAL);
    let x = ticket(1, actor);
    let y = ticket(2, actor);
    let z = ticket(3, actor);
    array.insert_after(None, Element::primitive(x, Primitive::Str("x".into())));
    array.insert_after(Some(x), Element::primitive(y, Primitive::Str("y".into())));
    array.insert_after(Some(y), Element::primitive(z, Primitive::Str("z".into())));
    (array, x, y, z)
}

fn live_values(array: &CRDTArray) -> Vec<String> {
    (0..array.len())
        .map(|i| match &array.get(i).unwrap().value {
            crdt_document::element::ElementValue::Primitive(Primitive::Str(s)) => s.clone(),
            _ => panic!("expected string primitive"),
        })
        .collect()
}

#[test]
fn later_move_wins_regardless_of_application_order() {
    let actor_a = ActorID(1);
    let actor_b = ActorID(2);

    let move_a = ticket(10, actor_a); // A: move x after z
    let move_b = ticket(20, actor_b); // B: move x after y, strictly later

    let (mut replica_1, x, y, z) = seed(actor_a);
    replica_1.move_after(Some(z), x, move_a);
    replica_1.move_after(Some(y), x, move_b);

    let (mut replica_2, x2, y2, z2) = seed(actor_a);
    replica_2.move_after(Some(y2), x2, move_b);
    replica_2.move_after(Some(z2), x2, move_a);

    assert_eq!(live_values(&replica_1), vec!["y", "x", "z"]);
    assert_eq!(live_values(&replica_1), live_values(&replica_2));
}
