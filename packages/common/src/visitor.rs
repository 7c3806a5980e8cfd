use storyloom_model::{ChapterTree, InlineNode, ParagraphNode, ReferenceNode, TextNode};

/// Visitor pattern for traversing chapter trees immutably
///
/// Traversal is depth-first in document order. Override specific visit_*
/// methods to act on nodes; call the matching walk_* function to keep
/// descending.
pub trait Visitor: Sized {
    fn visit_chapter(&mut self, tree: &ChapterTree) {
        walk_chapter(self, tree);
    }

    fn visit_paragraph(&mut self, paragraph: &ParagraphNode) {
        walk_paragraph(self, paragraph);
    }

    fn visit_inline(&mut self, paragraph: &ParagraphNode, index: usize, node: &InlineNode) {
        walk_inline(self, paragraph, index, node);
    }

    fn visit_text(&mut self, _paragraph: &ParagraphNode, _index: usize, _text: &TextNode) {
        // Leaf node, no children to walk
    }

    fn visit_reference(
        &mut self,
        _paragraph: &ParagraphNode,
        _index: usize,
        _reference: &ReferenceNode,
    ) {
        // Leaf node, no children to walk
    }
}

/// Mutable visitor pattern for transforming chapter trees
///
/// Inline nodes are replaced rather than edited, so the mutable walk stops at
/// paragraphs: implementors rewrite `paragraph.children` wholesale.
pub trait VisitorMut: Sized {
    fn visit_chapter_mut(&mut self, tree: &mut ChapterTree) {
        walk_chapter_mut(self, tree);
    }

    fn visit_paragraph_mut(&mut self, _paragraph: &mut ParagraphNode) {}
}

pub fn walk_chapter<V: Visitor>(visitor: &mut V, tree: &ChapterTree) {
    for paragraph in &tree.paragraphs {
        visitor.visit_paragraph(paragraph);
    }
}

pub fn walk_paragraph<V: Visitor>(visitor: &mut V, paragraph: &ParagraphNode) {
    for (index, child) in paragraph.children.iter().enumerate() {
        visitor.visit_inline(paragraph, index, child);
    }
}

pub fn walk_inline<V: Visitor>(
    visitor: &mut V,
    paragraph: &ParagraphNode,
    index: usize,
    node: &InlineNode,
) {
    match node {
        InlineNode::Text(text) => visitor.visit_text(paragraph, index, text),
        InlineNode::Reference(reference) => visitor.visit_reference(paragraph, index, reference),
    }
}

pub fn walk_chapter_mut<V: VisitorMut>(visitor: &mut V, tree: &mut ChapterTree) {
    for paragraph in &mut tree.paragraphs {
        visitor.visit_paragraph_mut(paragraph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_model::{ChapterRef, EntityType};

    #[derive(Default)]
    struct Collector {
        seen: Vec<String>,
    }

    impl Visitor for Collector {
        fn visit_text(&mut self, paragraph: &ParagraphNode, index: usize, text: &TextNode) {
            self.seen
                .push(format!("{}/{}:text:{}", paragraph.key_id(), index, text.text()));
        }

        fn visit_reference(
            &mut self,
            paragraph: &ParagraphNode,
            index: usize,
            reference: &ReferenceNode,
        ) {
            self.seen
                .push(format!("{}/{}:ref:{}", paragraph.key_id(), index, reference.text));
        }
    }

    #[test]
    fn test_walk_is_depth_first_in_order() {
        let tree = ChapterTree::new(ChapterRef::new("s", "c")).with_paragraphs(vec![
            ParagraphNode::new("p1").with_children(vec![
                TextNode::new("Hi ").into(),
                ReferenceNode {
                    text: "Aria".to_string(),
                    entity_id: "e1".to_string(),
                    description: String::new(),
                    entity_type: EntityType::Character,
                    portrait: None,
                    class_modifier: None,
                }
                .into(),
            ]),
            ParagraphNode::new("p2").with_text("Bye"),
        ]);

        let mut collector = Collector::default();
        collector.visit_chapter(&tree);

        assert_eq!(
            collector.seen,
            vec!["p1/0:text:Hi ", "p1/1:ref:Aria", "p2/0:text:Bye"]
        );
    }
}
