//! # Update Listeners
//!
//! Listeners run after every committed mutation, before fingerprints are
//! taken, and may rewrite the tree to keep derived state consistent. The
//! entity [`Scanner`](crate::Scanner) is the main one.
//!
//! Listeners are:
//! - **Idempotent**: running one twice in a row changes nothing the second time
//! - **Ordered**: they run in registration order
//! - **Named**: registering a listener with an existing name replaces it

use storyloom_model::ChapterTree;
use tracing::trace;

use crate::mutations::MutationEffect;

/// What triggered the update
#[derive(Debug, Clone, Default)]
pub struct UpdateContext {
    pub version: u64,
    /// `None` when the update was not caused by a mutation (catalog change, load)
    pub effect: Option<MutationEffect>,
}

/// Rewrites the tree after a committed update. Returns whether it changed anything.
pub trait UpdateListener: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn on_update(&mut self, tree: &mut ChapterTree, context: &UpdateContext) -> bool;
}

/// Merges adjacent text with equal formatting and drops empty text nodes
#[derive(Debug, Default)]
pub struct NormalizeText;

impl UpdateListener for NormalizeText {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn on_update(&mut self, tree: &mut ChapterTree, _context: &UpdateContext) -> bool {
        tree.paragraphs
            .iter_mut()
            .fold(false, |changed, paragraph| paragraph.normalize() || changed)
    }
}

#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: Vec<Box<dyn UpdateListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with text normalization installed
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NormalizeText);
        registry
    }

    pub fn register(&mut self, listener: impl UpdateListener + 'static) {
        let listener: Box<dyn UpdateListener> = Box::new(listener);
        match self.listeners.iter().position(|l| l.name() == listener.name()) {
            Some(index) => self.listeners[index] = listener,
            None => self.listeners.push(listener),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Runs every listener once, in order
    pub fn run(&mut self, tree: &mut ChapterTree, context: &UpdateContext) -> bool {
        let mut changed = false;
        for listener in self.listeners.iter_mut() {
            if listener.on_update(tree, context) {
                trace!(listener = listener.name(), version = context.version, "Listener changed tree");
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_model::{ChapterRef, ParagraphNode, TextNode};

    #[derive(Debug, Default)]
    struct Counter {
        calls: usize,
    }

    impl UpdateListener for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn on_update(&mut self, _tree: &mut ChapterTree, _context: &UpdateContext) -> bool {
            self.calls += 1;
            false
        }
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = ListenerRegistry::with_defaults();
        registry.register(Counter::default());
        registry.register(Counter::default());

        assert_eq!(registry.names(), vec!["normalize", "counter"]);
    }

    #[test]
    fn test_normalize_merges_adjacent_text() {
        let mut tree = ChapterTree::new(ChapterRef::new("s", "c")).with_paragraphs(vec![
            ParagraphNode::new("p1").with_children(vec![
                TextNode::new("Hel").into(),
                TextNode::new("").into(),
                TextNode::new("lo").into(),
            ]),
        ]);

        let mut registry = ListenerRegistry::with_defaults();
        assert!(registry.run(&mut tree, &UpdateContext::default()));
        assert_eq!(tree.paragraphs[0].children.len(), 1);
        assert!(!registry.run(&mut tree, &UpdateContext::default()));
    }
}
