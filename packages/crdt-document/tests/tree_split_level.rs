//! S4: editing at the boundary between "a" and "b" with `split_level = 2`
//! splits both ancestor elements (`<b>` then `<p>`), landing the split point
//! between two freshly created siblings without inserting any new content,
//! and without minting a ticket per split (I5): each split reuses the split
//! node's own `(created_at, offset)` identity.

use std::cell::Cell;
use std::rc::Rc;

use crdt_document::time::{ActorID, TimeTicket};
use crdt_document::tree::{CRDTTree, TreeNodeKind};

fn ticket(lamport: u64) -> TimeTicket {
    TimeTicket::new(lamport, 0, ActorID(1))
}

fn issuer(start: u64) -> impl FnMut() -> TimeTicket {
    let mut n = start;
    move || {
        n += 1;
        ticket(n)
    }
}

/// Wraps `issuer` to count how many tickets it actually hands out, so a test
/// can assert against Testable Property 6 (`len(contents) + 1` tickets
/// consumed per edit, counting the edit's own `executed_at`).
fn counting_issuer(start: u64, calls: Rc<Cell<u32>>) -> impl FnMut() -> TimeTicket {
    let mut inner = issuer(start);
    move || {
        calls.set(calls.get() + 1);
        inner()
    }
}

#[test]
fn split_level_two_splits_both_ancestors() {
    let mut tree = CRDTTree::new(TimeTicket::INITIAL);

    // <doc><p><b>ab</b></p></doc>
    tree.edit(0, 0, vec![TreeNodeKind::Element("p".into())], 0, ticket(1), issuer(1))
        .unwrap();
    tree.edit(1, 1, vec![TreeNodeKind::Element("b".into())], 0, ticket(10), issuer(10))
        .unwrap();
    tree.edit(2, 2, vec![TreeNodeKind::Text("ab".into())], 0, ticket(20), issuer(20))
        .unwrap();
    assert_eq!(tree.to_xml(), "<p><b>ab</b></p>");
    let size_before = tree.size();

    // split both <b> and <p> between "a" and "b"; contents stay empty since
    // the split itself produces the second <b>/<p> pair
    let issue_calls = Rc::new(Cell::new(0u32));
    tree.edit(3, 3, vec![], 2, ticket(30), counting_issuer(30, issue_calls.clone()))
        .unwrap();

    assert_eq!(tree.to_xml(), "<p><b>a</b></p><p><b>b</b></p>");
    let size_after = tree.size();
    assert_eq!(
        size_after.data,
        size_before.data + 2,
        "splitting 2 ancestor levels adds exactly 2 new element nodes"
    );
    assert_eq!(
        issue_calls.get(),
        0,
        "Testable Property 6: contents=[] consumes 0 extra tickets beyond the edit's own executed_at \
         (I5: ancestor splits reuse (created_at, offset), they don't mint new tickets)"
    );
}
