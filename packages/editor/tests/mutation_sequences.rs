//! Randomized tests for long mutation sequences
//!
//! This tests:
//! - Fingerprint sensitivity to text and format edits
//! - Decoration idempotence and visible-text preservation
//! - Key uniqueness and queue drain after random sessions

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use storyloom_editor::{
    fingerprint, Association, AssociationDetails, Block, Catalog, ChapterRef, ChapterTree,
    EditSession, KeyId, Mutation, ParagraphNode, Place, Scanner,
};
use storyloom_model::TextFormat;

const WORDS: &[&str] = &[
    "the", "night", "Aria", "ari", "walked", "Bram", "bramble", "to", "Eastport", "and", "back",
    "ARIA", "sword", "of", "Ash", "ashen", "",
];

fn catalog() -> Catalog {
    let entry = |id: &str, name: &str, kind: &str, aliases: &str, case_sensitive: bool| Association {
        association_id: id.to_string(),
        association_name: name.to_string(),
        association_type: kind.to_string(),
        short_description: String::new(),
        portrait: None,
        details: AssociationDetails {
            aliases: aliases.to_string(),
            case_sensitive,
            extended_description: String::new(),
        },
    };
    Catalog::new(&[
        entry("1", "Aria", "character", "Ari", false),
        entry("2", "Bram", "character", "", true),
        entry("3", "Eastport", "place", "the port", false),
        entry("4", "Sword of Ash", "item", "Ash", false),
    ])
}

fn random_sentence(rng: &mut StdRng) -> String {
    let len = rng.gen_range(0..12);
    (0..len)
        .map(|_| *WORDS.choose(rng).unwrap_or(&"x"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn random_tree(rng: &mut StdRng, paragraphs: usize) -> ChapterTree {
    ChapterTree::new(ChapterRef::new("s", "c")).with_paragraphs(
        (0..paragraphs)
            .map(|i| ParagraphNode::new(format!("p{}", i)).with_text(random_sentence(rng)))
            .collect(),
    )
}

#[test]
fn test_fingerprint_changes_on_random_edits() {
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..200 {
        let mut tree = random_tree(&mut rng, 3);
        let index = rng.gen_range(0..tree.paragraphs.len());
        let key = tree.paragraphs[index].key_id().clone();
        let len = tree.paragraphs[index].char_len();
        let before = fingerprint(&tree);

        let mutation = if len > 0 && rng.gen_bool(0.5) {
            let offset = rng.gen_range(0..len);
            Mutation::FormatText {
                key_id: key,
                offset,
                length: rng.gen_range(1..=len - offset),
                format: TextFormat::BOLD,
                enable: true,
            }
        } else {
            Mutation::InsertText {
                key_id: key,
                offset: rng.gen_range(0..=len),
                text: "q".to_string(),
            }
        };
        mutation.apply(&mut tree).unwrap();

        assert_ne!(before, fingerprint(&tree), "{:?}", mutation);
    }
}

#[test]
fn test_decoration_is_idempotent_and_keeps_text() {
    let mut rng = StdRng::seed_from_u64(23);
    let scanner = Scanner::new(catalog());

    for _ in 0..100 {
        let mut tree = random_tree(&mut rng, 4);
        let text_before: Vec<String> = tree.paragraphs.iter().map(|p| p.text_content()).collect();

        scanner.scan(&mut tree);
        let decorated = tree.clone();
        let second = scanner.scan(&mut tree);

        assert!(!second.changed());
        assert_eq!(tree, decorated);
        let text_after: Vec<String> = tree.paragraphs.iter().map(|p| p.text_content()).collect();
        assert_eq!(text_before, text_after);
    }
}

#[test]
fn test_decoration_survives_catalog_removal() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut tree = random_tree(&mut rng, 6);
    let text_before = tree.text_content();

    Scanner::new(catalog()).scan(&mut tree);
    Scanner::new(Catalog::default()).scan(&mut tree);

    assert_eq!(tree.text_content(), text_before);
    assert!(tree.paragraphs.iter().all(|p| p.references().next().is_none()));
}

fn random_mutation(rng: &mut StdRng, keys: &[KeyId]) -> Mutation {
    let Some(key) = keys.choose(rng).cloned() else {
        return Mutation::InsertParagraph {
            after: None,
            key_id: None,
            text: "fresh start".to_string(),
        };
    };

    match rng.gen_range(0..7) {
        0 => Mutation::InsertParagraph {
            after: Some(key),
            key_id: None,
            text: "Aria returned".to_string(),
        },
        1 => Mutation::RemoveParagraph { key_id: key },
        2 => Mutation::MoveParagraph {
            key_id: key,
            index: rng.gen_range(0..=keys.len()),
        },
        3 => Mutation::SplitParagraph {
            key_id: key,
            offset: rng.gen_range(0..4),
            new_key_id: None,
        },
        4 => Mutation::MergeWithPrevious { key_id: key },
        5 => Mutation::DeleteText {
            key_id: key,
            offset: rng.gen_range(0..4),
            length: rng.gen_range(0..6),
        },
        _ => Mutation::InsertText {
            key_id: key,
            offset: rng.gen_range(0..4),
            text: " Bram ".to_string(),
        },
    }
}

#[test]
fn test_random_sessions_keep_keys_unique_and_drain() {
    let mut rng = StdRng::seed_from_u64(99);
    let chapter = ChapterRef::new("s", "c");
    let blocks: Vec<Block> = (0..5)
        .zip(Place::sequence(5))
        .map(|(i, place)| {
            Block::from_paragraph(
                &ParagraphNode::new(format!("p{}", i)).with_text("Aria and Bram"),
                Some(place),
            )
            .unwrap()
        })
        .collect();

    let mut session = EditSession::new("fuzz");
    session.set_catalog(catalog()).unwrap();
    session.open_chapter(chapter.clone(), &blocks);

    for step in 0..300 {
        let mutation = random_mutation(&mut rng, &session.key_ids());
        // invalid offsets and first-paragraph merges are expected rejections
        let _ = session.apply(mutation);

        let keys = session.key_ids();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len(), "duplicate key at step {}", step);
        assert!(session.pipeline().unwrap().document().is_ordered());

        if step % 25 == 0 {
            for op in session.take_batch() {
                session.acknowledge(op.id, &[]).unwrap();
            }
        }
    }

    for op in session.take_batch() {
        session.acknowledge(op.id, &[]).unwrap();
    }
    assert!(!session.has_pending_changes());
    assert_eq!(session.to_blocks().len(), session.key_ids().len());
}
