//! End to end scenarios: peers diverge, merge in various orders, and must
//! land on identical documents.

use egwalker::{checkout_simple, checkout_simple_string, OpLog, TextDocument};

#[test]
fn empty_oplog() {
    let oplog: OpLog<char> = OpLog::new();
    assert_eq!(checkout_simple_string(&oplog), "");
    assert!(oplog.local_version().is_empty());
}

#[test]
fn concurrent_runs_order_by_agent_name() {
    // Two peers, starting from nothing. alice types "Hello", bob types
    // "World". After merging both ways, everyone has all ten letters with
    // alice's run first - the tie breaks on agent name alone.
    let mut a = TextDocument::new();
    let alice = a.get_or_create_agent_id("alice");
    a.insert(alice, 0, "Hello");

    let mut b = TextDocument::new();
    let bob = b.get_or_create_agent_id("bob");
    b.insert(bob, 0, "World");

    a.merge_remote(&b.oplog).unwrap();
    b.merge_remote(&a.oplog).unwrap();

    assert_eq!(a.text(), "HelloWorld");
    assert_eq!(b.text(), "HelloWorld");
    a.dbg_check();
    b.dbg_check();
}

#[test]
fn insert_survives_concurrent_range_delete() {
    // Common ancestor "hello". alice appends "!" while bob deletes the
    // entire word. Only the "!" survives on both peers.
    let mut a = TextDocument::new();
    let alice = a.get_or_create_agent_id("alice");
    a.insert(alice, 0, "hello");

    let mut b = TextDocument::open(a.oplog.clone());
    let bob = b.get_or_create_agent_id("bob");

    a.insert(alice, 5, "!");
    b.delete(bob, 0, 5).unwrap();

    a.merge_remote(&b.oplog).unwrap();
    b.merge_remote(&a.oplog).unwrap();

    assert_eq!(a.text(), "!");
    assert_eq!(b.text(), "!");
}

#[test]
fn three_way_insert_converges_regardless_of_topology() {
    // Three peers insert at the same position of the shared "x". All merge
    // orders give "x" followed by the inserts in agent name order.
    let mut base = TextDocument::new();
    let seph = base.get_or_create_agent_id("seph");
    base.insert(seph, 0, "x");

    let mut a = TextDocument::open(base.oplog.clone());
    let alice = a.get_or_create_agent_id("alice");
    a.insert(alice, 1, "A");

    let mut b = TextDocument::open(base.oplog.clone());
    let bob = b.get_or_create_agent_id("bob");
    b.insert(bob, 1, "B");

    let mut c = TextDocument::open(base.oplog.clone());
    let carol = c.get_or_create_agent_id("carol");
    c.insert(carol, 1, "C");

    // Ring topology...
    a.merge_remote(&b.oplog).unwrap();
    b.merge_remote(&c.oplog).unwrap();
    c.merge_remote(&a.oplog).unwrap();
    // ...then finish the exchange.
    a.merge_remote(&c.oplog).unwrap();
    b.merge_remote(&a.oplog).unwrap();

    assert_eq!(a.text(), "xABC");
    assert_eq!(b.text(), "xABC");
    assert_eq!(c.text(), "xABC");
    a.dbg_check();
}

#[test]
fn same_position_tie_break_follows_agent_labels() {
    let run = |first_agent: &str, second_agent: &str| -> String {
        let mut base = TextDocument::new();
        let seph = base.get_or_create_agent_id("seph");
        base.insert(seph, 0, "ab");

        let mut x = TextDocument::open(base.oplog.clone());
        let xa = x.get_or_create_agent_id(first_agent);
        x.insert(xa, 1, "X");

        let mut y = TextDocument::open(base.oplog.clone());
        let ya = y.get_or_create_agent_id(second_agent);
        y.insert(ya, 1, "Y");

        x.merge_remote(&y.oplog).unwrap();
        y.merge_remote(&x.oplog).unwrap();
        assert_eq!(x.text(), y.text());
        x.text()
    };

    // "A" < "B": X's author wins the tie and X comes first.
    assert_eq!(run("A", "B"), "aXYb");
    // Relabel the agents and the tie flips.
    assert_eq!(run("B", "A"), "aYXb");
}

#[test]
fn merge_is_commutative_and_idempotent() {
    let mut base: OpLog<char> = OpLog::new();
    let seph = base.get_or_create_agent_id("seph");
    base.local_insert(seph, 0, "shared".chars());

    let mut y = base.clone();
    let alice = y.get_or_create_agent_id("alice");
    y.local_insert(alice, 6, "-alice".chars());
    y.local_delete(alice, 0, 2).unwrap();

    let mut z = base.clone();
    let bob = z.get_or_create_agent_id("bob");
    z.local_insert(bob, 0, "bob-".chars());

    let mut x1 = base.clone();
    x1.merge_from(&y).unwrap();
    x1.merge_from(&z).unwrap();

    let mut x2 = base.clone();
    x2.merge_from(&z).unwrap();
    x2.merge_from(&y).unwrap();

    assert_eq!(checkout_simple(&x1), checkout_simple(&x2));

    // Merging again changes nothing.
    let before = checkout_simple(&x1);
    let len_before = x1.len();
    x1.merge_from(&y).unwrap();
    x1.merge_from(&z).unwrap();
    assert_eq!(x1.len(), len_before);
    assert_eq!(checkout_simple(&x1), before);

    x1.dbg_check();
    x2.dbg_check();
}

#[test]
fn documents_with_equal_op_sets_check_out_identically() {
    // Build the same set of ops along two completely different merge paths,
    // then verify the checkouts agree byte for byte.
    let mut a = TextDocument::new();
    let alice = a.get_or_create_agent_id("alice");
    a.insert(alice, 0, "base text");

    let mut b = TextDocument::open(a.oplog.clone());
    let bob = b.get_or_create_agent_id("bob");

    a.delete(alice, 0, 5).unwrap();
    a.insert(alice, 0, "my ");
    b.insert(bob, 9, " and more");
    b.delete(bob, 0, 1).unwrap();

    a.merge_remote(&b.oplog).unwrap();
    b.merge_remote(&a.oplog).unwrap();

    assert_eq!(a.text(), b.text());
    assert_eq!(
        checkout_simple_string(&a.oplog),
        checkout_simple_string(&b.oplog)
    );
    a.dbg_check();
    b.dbg_check();
}

#[test]
fn fast_forward_equals_full_replay() {
    let mut doc = TextDocument::new();
    let seph = doc.get_or_create_agent_id("seph");
    doc.insert(seph, 0, "abc");

    let mut remote = doc.oplog.clone();
    let mike = remote.get_or_create_agent_id("mike");
    remote.local_insert(mike, 3, "def".chars());

    assert!(remote
        .cg
        .graph
        .can_fast_forward(doc.local_version(), remote.local_version()));

    doc.merge_remote(&remote).unwrap();
    assert_eq!(doc.text(), "abcdef");
    assert_eq!(doc.text(), checkout_simple_string(&doc.oplog));
}

#[test]
fn big_sequential_document_checks_out() {
    // 50k sequential inserts through the rope sink.
    let mut doc = TextDocument::new();
    let seph = doc.get_or_create_agent_id("seph");

    let mut expected = String::with_capacity(50_000);
    for i in 0..50_000usize {
        let c = (b'a' + (i % 26) as u8) as char;
        expected.push(c);
        let mut buf = [0u8; 4];
        doc.insert(seph, i, c.encode_utf8(&mut buf));
    }

    assert_eq!(doc.len_chars(), 50_000);
    assert_eq!(doc.text(), expected);
    assert_eq!(checkout_simple_string(&doc.oplog), expected);
}
