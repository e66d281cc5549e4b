//! S3: inserting then overlapping-deleting text splits the run into
//! addressable nodes and tombstones exactly the deleted span, rather than
//! dropping it outright so concurrent remote ops can still resolve against
//! it. The gc-pending split nodes `CRDTText::edit` reports are registered
//! with the owning `CRDTRoot` by `EditOperation::execute` (see `root.rs`'s
//! element-level GC for the counterpart at whole-element granularity).

use crdt_document::element::ElementValue;
use crdt_document::ops::{EditOperation, Operation, SetOperation};
use crdt_document::root::CRDTRoot;
use crdt_document::text::CRDTText;
use crdt_document::time::{ActorID, TimeTicket};

fn ticket(lamport: u64) -> TimeTicket {
    TimeTicket::new(lamport, 0, ActorID(1))
}

#[test]
fn overlapping_edit_leaves_one_tombstoned_run() {
    let mut text = CRDTText::new(TimeTicket::INITIAL);
    text.edit(0, 0, "ABCD", ticket(1));
    assert_eq!(text.to_plain_text(), "ABCD");
    assert_eq!(text.len(), 4);

    let (changes, gc_pairs, delta) = text.edit(1, 3, "12", ticket(2));
    assert_eq!(text.to_plain_text(), "A12D");
    assert_eq!(text.len(), 4);
    assert_eq!(delta, 0, "2 chars removed, 2 chars inserted nets to zero");
    assert_eq!(gc_pairs.len(), 1, "the deleted \"BC\" run becomes one gc-pending node");
    assert!(!changes.is_empty());
}

#[test]
fn overlapping_delete_registers_a_gc_pair_on_the_owning_root() {
    let mut root = CRDTRoot::new(TimeTicket::INITIAL);
    let text_created_at = ticket(1);

    Operation::Set(SetOperation {
        parent: root.object().created_at(),
        key: "t".into(),
        value: ElementValue::Text(CRDTText::new(text_created_at)),
        executed_at: text_created_at,
    })
    .execute_local(&mut root)
    .unwrap();

    Operation::Edit(EditOperation {
        parent: text_created_at,
        from: 0,
        to: 0,
        content: "ABCD".into(),
        attrs: Vec::new(),
        executed_at: ticket(2),
    })
    .execute_local(&mut root)
    .unwrap();
    assert_eq!(root.gc_pair_count(), 0);

    Operation::Edit(EditOperation {
        parent: text_created_at,
        from: 1,
        to: 3,
        content: "12".into(),
        attrs: Vec::new(),
        executed_at: ticket(3),
    })
    .execute_local(&mut root)
    .unwrap();
    assert_eq!(
        root.gc_pair_count(),
        1,
        "EditOperation::execute must thread the deleted run's GcPair into the root registry"
    );
}

#[test]
fn deleting_the_whole_buffer_then_reinserting_converges() {
    let mut text = CRDTText::new(TimeTicket::INITIAL);
    text.edit(0, 0, "hello", ticket(1));
    text.edit(0, 5, "", ticket(2));
    assert_eq!(text.to_plain_text(), "");
    text.edit(0, 0, "world", ticket(3));
    assert_eq!(text.to_plain_text(), "world");
}
