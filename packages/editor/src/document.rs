//! # Document Handle
//!
//! One open chapter and its editing state.
//!
//! The tree is the source of truth for content and paragraph order. Alongside
//! it the document tracks each paragraph's persisted [`Place`] and the
//! generator that mints provisional keys for new paragraphs.
//!
//! ## Lifecycle
//!
//! ```text
//! Blocks → Tree → Mutations → Blocks
//!   ↓       ↓         ↓          ↓
//! Store   Edit    Version++    Queue
//! ```

use std::collections::HashMap;
use storyloom_model::{Block, ChapterRef, ChapterTree, IdGenerator, KeyId, ParagraphNode, Place};
use tracing::{debug, warn};

use crate::mutations::MutationEffect;
use crate::{EditorError, Mutation};

#[derive(Debug, Clone)]
pub struct Document {
    /// Current version number (increments on each applied mutation)
    pub version: u64,

    tree: ChapterTree,
    places: HashMap<KeyId, Place>,
    ids: IdGenerator,
}

impl Document {
    /// Empty chapter
    pub fn new(chapter: ChapterRef) -> Self {
        Self::from_tree(ChapterTree::new(chapter))
    }

    /// Document over an existing tree; paragraphs have no places yet
    pub fn from_tree(tree: ChapterTree) -> Self {
        let ids = IdGenerator::new(&tree.chapter).resume(tree.paragraphs.iter().map(|p| p.key_id()));
        Self {
            version: 0,
            tree,
            places: HashMap::new(),
            ids,
        }
    }

    /// Load persisted blocks. Blocks are ordered by place (unplaced ones last,
    /// in the order given); blocks that fail to decode are skipped.
    pub fn from_blocks(chapter: ChapterRef, blocks: &[Block]) -> Self {
        let mut sorted: Vec<&Block> = blocks.iter().collect();
        sorted.sort_by(|a, b| match (&a.place, &b.place) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        let mut tree = ChapterTree::new(chapter);
        let mut places = HashMap::new();
        for block in sorted {
            if tree.position(&block.key_id).is_some() {
                warn!(key_id = %block.key_id, "Skipping duplicate block");
                continue;
            }
            match block.to_paragraph() {
                Ok(paragraph) => {
                    if let Some(place) = &block.place {
                        places.insert(block.key_id.clone(), place.clone());
                    }
                    tree.paragraphs.push(paragraph);
                }
                Err(e) => warn!(key_id = %block.key_id, error = %e, "Skipping undecodable block"),
            }
        }

        debug!(chapter = %tree.chapter, paragraphs = tree.paragraphs.len(), "Loaded chapter");
        let mut document = Self::from_tree(tree);
        document.places = places;
        document
    }

    pub fn tree(&self) -> &ChapterTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut ChapterTree {
        &mut self.tree
    }

    pub fn chapter(&self) -> &ChapterRef {
        &self.tree.chapter
    }

    pub fn paragraph(&self, key_id: &KeyId) -> Option<&ParagraphNode> {
        self.tree.get(key_id)
    }

    /// Apply a mutation, minting keys for any paragraph it creates
    pub fn apply(&mut self, mutation: Mutation) -> Result<MutationEffect, EditorError> {
        let mutation = mutation.resolve_keys(&mut self.ids);
        let effect = mutation.apply(&mut self.tree)?;
        self.version += 1;
        Ok(effect)
    }

    pub fn place(&self, key_id: &KeyId) -> Option<&Place> {
        self.places.get(key_id)
    }

    pub(crate) fn forget_place(&mut self, key_id: &KeyId) {
        self.places.remove(key_id);
    }

    /// Give `key_id` a place between its current neighbors. Returns `None`
    /// when a neighbor is unplaced or the neighbors are out of order.
    pub(crate) fn place_between_neighbors(&mut self, key_id: &KeyId) -> Option<Place> {
        let index = self.tree.position(key_id)?;
        let before = match index.checked_sub(1) {
            Some(i) => Some(self.places.get(self.tree.paragraphs[i].key_id())?),
            None => None,
        };
        let after = match self.tree.paragraphs.get(index + 1) {
            Some(next) => Some(self.places.get(next.key_id())?),
            None => None,
        };

        let place = Place::between(before, after).ok()?;
        self.places.insert(key_id.clone(), place.clone());
        Some(place)
    }

    /// Whether every paragraph is placed and places ascend in tree order
    pub fn is_ordered(&self) -> bool {
        let mut previous: Option<&Place> = None;
        for paragraph in &self.tree.paragraphs {
            let Some(place) = self.places.get(paragraph.key_id()) else {
                return false;
            };
            if previous.is_some_and(|p| p >= place) {
                return false;
            }
            previous = Some(place);
        }
        true
    }

    /// Replace every place with an evenly spaced sequence in tree order
    pub fn resequence(&mut self) {
        let places = Place::sequence(self.tree.paragraphs.len());
        self.places = self
            .tree
            .paragraphs
            .iter()
            .map(|p| p.key_id().clone())
            .zip(places)
            .collect();
        debug!(chapter = %self.tree.chapter, paragraphs = self.places.len(), "Resequenced places");
    }

    /// `{key_id, place}` for every placed paragraph, in tree order
    pub fn order_blocks(&self) -> Vec<Block> {
        self.tree
            .paragraphs
            .iter()
            .filter_map(|p| {
                self.places
                    .get(p.key_id())
                    .map(|place| Block::order(p.key_id().clone(), place.clone()))
            })
            .collect()
    }

    /// Full save records for the whole chapter; paragraphs that fail to
    /// serialize are logged and left out.
    pub fn to_blocks(&self) -> Vec<Block> {
        self.tree
            .paragraphs
            .iter()
            .filter_map(|p| match Block::from_paragraph(p, self.places.get(p.key_id()).cloned()) {
                Ok(block) => Some(block),
                Err(e) => {
                    warn!(key_id = %p.key_id(), error = %e, "Excluding paragraph from export");
                    None
                }
            })
            .collect()
    }

    /// Swap a provisional key for the one the store assigned
    pub fn reconcile_key(&mut self, old: &KeyId, new: KeyId) -> bool {
        if old == &new || self.tree.position(&new).is_some() {
            return false;
        }
        let Some(paragraph) = self.tree.get_mut(old) else {
            return false;
        };
        paragraph.assign_key(new.clone());
        if let Some(place) = self.places.remove(old) {
            self.places.insert(new, place);
        }
        true
    }
}
