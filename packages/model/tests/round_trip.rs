//! Block round-trip over randomly constructed paragraphs

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use storyloom_model::{
    Block, ElementFormat, EntityType, InlineNode, ParagraphNode, Place, ReferenceNode,
    TextFormat, TextNode,
};

const WORDS: &[&str] = &["the", "Aria", "sword", "ñandú", "rode", "north", " ", "—", "城"];

fn random_paragraph(rng: &mut StdRng, index: usize) -> ParagraphNode {
    let children = (0..rng.gen_range(0..6))
        .map(|_| {
            let text: String = (0..rng.gen_range(1..4))
                .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
                .collect::<Vec<_>>()
                .join(" ");
            if rng.gen_bool(0.25) {
                InlineNode::Reference(ReferenceNode {
                    text,
                    entity_id: format!("ent-{}", rng.gen_range(0..10)),
                    description: "somebody".to_string(),
                    entity_type: EntityType::Place,
                    portrait: rng.gen_bool(0.5).then(|| "p.png".to_string()),
                    class_modifier: None,
                })
            } else {
                InlineNode::Text(
                    TextNode::new(text)
                        .with_format(TextFormat::from_bits(rng.gen_range(0..256)))
                        .with_style(if rng.gen_bool(0.3) { "color: red" } else { "" }),
                )
            }
        })
        .collect();

    let mut paragraph = ParagraphNode::new(format!("p{}", index)).with_children(children);
    paragraph.indent = rng.gen_range(0..3);
    paragraph.format = if rng.gen_bool(0.5) {
        ElementFormat::Justify
    } else {
        ElementFormat::Unset
    };
    paragraph
}

#[test]
fn test_round_trip_preserves_text_key_and_order() {
    let mut rng = StdRng::seed_from_u64(42);
    let places = Place::sequence(200);

    for (index, place) in places.into_iter().enumerate() {
        let paragraph = random_paragraph(&mut rng, index);
        let block = Block::from_paragraph(&paragraph, Some(place.clone())).unwrap();

        let json = serde_json::to_string(&block).unwrap();
        let parsed: Block = serde_json::from_str(&json).unwrap();
        let restored = parsed.to_paragraph().unwrap();

        assert_eq!(restored.key_id(), paragraph.key_id());
        assert_eq!(restored.text_content(), paragraph.text_content());
        assert_eq!(restored.children, paragraph.children);
        assert_eq!(parsed.place, Some(place));
    }
}

#[test]
fn test_block_without_chunk_fails_to_restore() {
    let block = Block::key_only("p7".into());
    assert!(block.to_paragraph().is_err());
}
