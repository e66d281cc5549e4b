//! Property tests for strong eventual consistency: any permutation of the
//! same set of concurrent operations must converge to the same state.

use proptest::prelude::*;

use crdt_document::array::CRDTArray;
use crdt_document::element::{Element, ElementValue};
use crdt_document::object::CRDTObject;
use crdt_document::primitive::Primitive;
use crdt_document::time::{ActorID, TimeTicket};

fn ticket(lamport: u64, actor: u64) -> TimeTicket {
    TimeTicket::new(lamport, 0, ActorID(actor as u128))
}

#[derive(Clone, Debug)]
enum ObjOp {
    Set { actor: u64, lamport: u64, value: i64 },
    Remove { actor: u64, lamport: u64 },
}

fn obj_op_strategy() -> impl Strategy<Value = ObjOp> {
    (0u64..4, 1u64..20, -5i64..5, any::<bool>()).prop_map(|(actor, lamport, value, is_remove)| {
        if is_remove {
            ObjOp::Remove { actor, lamport }
        } else {
            ObjOp::Set { actor, lamport, value }
        }
    })
}

fn apply_obj_ops(ops: &[ObjOp]) -> CRDTObject {
    let mut obj = CRDTObject::new(TimeTicket::INITIAL);
    for op in ops {
        match op {
            ObjOp::Set { actor, lamport, value } => {
                let at = ticket(*lamport, *actor);
                obj.set("k", Element::primitive(at, Primitive::Int64(*value)));
            }
            ObjOp::Remove { actor, lamport } => {
                let at = ticket(*lamport, *actor);
                obj.remove("k", at);
            }
        }
    }
    obj
}

fn obj_snapshot(obj: &CRDTObject) -> Option<Primitive> {
    obj.get("k").map(|e| match &e.value {
        ElementValue::Primitive(p) => p.clone(),
        _ => unreachable!(),
    })
}

proptest! {
    #[test]
    fn object_set_remove_converges_under_any_permutation(ops in prop::collection::vec(obj_op_strategy(), 1..6)) {
        let baseline = obj_snapshot(&apply_obj_ops(&ops));

        let mut permuted = ops.clone();
        permuted.reverse();
        prop_assert_eq!(obj_snapshot(&apply_obj_ops(&permuted)), baseline.clone());

        // rotate by one as a second, distinct ordering
        if ops.len() > 1 {
            let mut rotated = ops.clone();
            rotated.rotate_left(1);
            prop_assert_eq!(obj_snapshot(&apply_obj_ops(&rotated)), baseline);
        }
    }
}

#[derive(Clone, Debug)]
struct MoveOp {
    target_lamport: u64,
    executed_at_lamport: u64,
}

fn move_op_strategy() -> impl Strategy<Value = MoveOp> {
    (0u64..3, 10u64..50).prop_map(|(target_lamport, executed_at_lamport)| MoveOp {
        target_lamport,
        executed_at_lamport,
    })
}

fn apply_move_ops(ops: &[MoveOp]) -> Vec<i64> {
    let mut array = CRDTArray::new(TimeTicket::INITIAL);
    let mut ids = Vec::new();
    let mut last = None;
    for i in 0..3u64 {
        let id = ticket(i + 1, 0);
        array.insert_after(last, Element::primitive(id, Primitive::Int64(i as i64)));
        ids.push(id);
        last = Some(id);
    }

    for op in ops {
        let target = ids[(op.target_lamport % 3) as usize];
        let executed_at = ticket(op.executed_at_lamport, 9);
        array.move_front(target, executed_at);
    }

    (0..array.len())
        .map(|i| match &array.get(i).unwrap().value {
            ElementValue::Primitive(Primitive::Int64(v)) => *v,
            _ => unreachable!(),
        })
        .collect()
}

proptest! {
    #[test]
    fn array_move_front_converges_under_any_permutation(ops in prop::collection::vec(move_op_strategy(), 1..6)) {
        let baseline = apply_move_ops(&ops);

        let mut permuted = ops.clone();
        permuted.reverse();
        prop_assert_eq!(apply_move_ops(&permuted), baseline.clone());

        if ops.len() > 1 {
            let mut rotated = ops.clone();
            rotated.rotate_left(1);
            prop_assert_eq!(apply_move_ops(&rotated), baseline);
        }
    }
}
