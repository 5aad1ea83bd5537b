//! Randomized editing and merging. Each fuzzer is seeded, so failures
//! reproduce.

use rand::prelude::*;

use egwalker::{checkout_simple_string, TextBranch, TextDocument};

fn random_str(len: usize, rng: &mut SmallRng) -> String {
    let alphabet: Vec<char> = "abcdefghijklmnop_".chars().collect();
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

fn make_random_change(
    doc: &mut TextDocument,
    mut model: Option<&mut String>,
    agent: u32,
    rng: &mut SmallRng,
) {
    let doc_len = doc.len_chars();
    let insert_weight = if doc_len < 100 { 0.6 } else { 0.4 };

    if doc_len == 0 || rng.gen_bool(insert_weight) {
        let pos = rng.gen_range(0..=doc_len);
        let len = rng.gen_range(1..3);
        let content = random_str(len, rng);

        if let Some(model) = model.as_deref_mut() {
            let char_idx = model.char_indices().nth(pos).map_or(model.len(), |(i, _)| i);
            model.insert_str(char_idx, &content);
        }
        doc.insert(agent, pos, &content);
    } else {
        let pos = rng.gen_range(0..doc_len);
        let len = rng.gen_range(1..=usize::min(5, doc_len - pos));

        if let Some(model) = model.as_deref_mut() {
            let start = model.char_indices().nth(pos).unwrap().0;
            let end = model
                .char_indices()
                .nth(pos + len)
                .map_or(model.len(), |(i, _)| i);
            model.replace_range(start..end, "");
        }
        doc.delete(agent, pos, len).unwrap();
    }
}

#[test]
fn random_single_document() {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut doc = TextDocument::new();
    let agent = doc.get_or_create_agent_id("seph");
    let mut expected = String::new();

    for i in 0..500 {
        make_random_change(&mut doc, Some(&mut expected), agent, &mut rng);
        assert_eq!(doc.text(), expected);

        if i % 100 == 99 {
            // The snapshot must match a from-scratch replay at every point.
            doc.dbg_check();
        }
    }
}

#[test]
fn fuzz_concurrency() {
    let mut rng = SmallRng::seed_from_u64(20);

    for round in 0..30 {
        let mut docs = [
            TextDocument::new(),
            TextDocument::new(),
            TextDocument::new(),
        ];

        // A branch shadowing doc 0, merged incrementally. Unlike the
        // documents (which fall back to a full replay on concurrency), this
        // exercises the placeholder-seeded merge path.
        let mut shadow = TextBranch::new();

        // Every doc knows every agent so ids line up.
        for doc in docs.iter_mut() {
            for a in 0..3 {
                doc.get_or_create_agent_id(format!("agent {a}").as_str());
            }
        }

        for i in 0..100 {
            // Generate some operations.
            for _ in 0..2 {
                let doc_idx = rng.gen_range(0..docs.len());
                let doc = &mut docs[doc_idx];
                make_random_change(doc, None, doc_idx as u32, &mut rng);
            }

            // Then merge two random documents.
            let a_idx = rng.gen_range(0..docs.len());
            let b_idx = rng.gen_range(0..docs.len());

            if a_idx != b_idx {
                let (a_idx, b_idx) = if a_idx < b_idx {
                    (a_idx, b_idx)
                } else {
                    (b_idx, a_idx)
                };
                let (start, end) = docs.split_at_mut(b_idx);
                let a = &mut start[a_idx];
                let b = &mut end[0];

                a.merge_remote(&b.oplog).unwrap();
                b.merge_remote(&a.oplog).unwrap();

                if a.text() != b.text() {
                    panic!(
                        "Docs {a_idx} and {b_idx} diverged in round {round} iteration {i}:\n{}\n{}",
                        a.text(),
                        b.text()
                    );
                }
            }

            shadow.merge_all(&docs[0].oplog);
            assert_eq!(
                shadow.content.to_string(),
                docs[0].text(),
                "incremental branch merge diverged in round {round} iteration {i}"
            );
        }

        // Converge everyone and check full equality.
        for i in 1..docs.len() {
            let (first, rest) = docs.split_at_mut(i);
            let a = &mut first[0];
            let b = &mut rest[0];
            a.merge_remote(&b.oplog).unwrap();
            b.merge_remote(&a.oplog).unwrap();
        }
        // One more pass so doc 1 and 2 see each other through doc 0.
        for i in 1..docs.len() {
            let (first, rest) = docs.split_at_mut(i);
            let a = &mut first[0];
            let b = &mut rest[0];
            a.merge_remote(&b.oplog).unwrap();
            b.merge_remote(&a.oplog).unwrap();
        }

        let expected = checkout_simple_string(&docs[0].oplog);
        for doc in docs.iter() {
            assert_eq!(doc.text(), expected);
            doc.dbg_check();
        }
    }
}
