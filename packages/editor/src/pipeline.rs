//! # Editing Pipeline
//!
//! Coordinates one commit: Mutate → Listeners → Fingerprint → Diff
//!
//! The Pipeline manages:
//! - Applying mutations to the document
//! - Running update listeners (normalization, entity decorations)
//! - Per-paragraph fingerprints for dirty detection
//! - Turning the difference into saves, deletes and a reorder

use std::collections::{HashMap, HashSet};
use storyloom_model::{Block, ChapterTree, KeyId};
use tracing::{debug, instrument, warn};

use crate::fingerprint::{fingerprint, fingerprint_paragraph, Fingerprint};
use crate::listeners::{ListenerRegistry, UpdateContext, UpdateListener};
use crate::mutations::MutationEffect;
use crate::scanner::Scanner;
use crate::{Document, EditorError, Mutation};

/// Persistence work produced by one commit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Full blocks for new or changed paragraphs, in tree order
    pub saves: Vec<Block>,
    pub deletes: Vec<KeyId>,
    /// Full `{key_id, place}` map when paragraph order changed
    pub reorder: Option<Vec<Block>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.saves.is_empty() && self.deletes.is_empty() && self.reorder.is_none()
    }
}

/// Result of pipeline execution
#[derive(Debug, Clone)]
pub struct Commit {
    /// New version number
    pub version: u64,

    /// Whole-chapter fingerprint after the commit
    pub fingerprint: Fingerprint,

    /// Whether the chapter fingerprint moved
    pub changed: bool,

    pub effect: Option<MutationEffect>,

    pub changes: ChangeSet,
}

/// Manages the edit → persist pipeline for one chapter
#[derive(Debug)]
pub struct Pipeline {
    document: Document,
    listeners: ListenerRegistry,
    fingerprints: HashMap<KeyId, Fingerprint>,
    last_fingerprint: Fingerprint,
}

impl Pipeline {
    /// Runs listeners over the loaded chapter and takes the baseline
    /// fingerprints. Opening a chapter queues nothing.
    pub fn new(document: Document, scanner: Scanner) -> Self {
        let mut listeners = ListenerRegistry::with_defaults();
        listeners.register(scanner);

        let mut pipeline = Self {
            document,
            listeners,
            fingerprints: HashMap::new(),
            last_fingerprint: Fingerprint::default(),
        };

        let context = UpdateContext {
            version: pipeline.document.version,
            effect: None,
        };
        pipeline.listeners.run(pipeline.document.tree_mut(), &context);
        pipeline.take_baseline();
        pipeline
    }

    /// Apply mutation and compute what needs persisting
    ///
    /// This:
    /// 1. Applies the mutation
    /// 2. Runs update listeners
    /// 3. Re-fingerprints paragraphs
    /// 4. Diffs against the previous commit
    #[instrument(skip(self, mutation), fields(chapter = %self.document.chapter()))]
    pub fn apply_mutation(&mut self, mutation: Mutation) -> Result<Commit, EditorError> {
        let effect = self.document.apply(mutation)?;
        Ok(self.commit(Some(effect)))
    }

    /// Swap the decoration scanner (catalog changed) and rescan
    pub fn set_scanner(&mut self, scanner: Scanner) -> Commit {
        self.listeners.register(scanner);
        self.commit(None)
    }

    /// Register an additional listener, replacing one with the same name
    pub fn register_listener(&mut self, listener: impl UpdateListener + 'static) {
        self.listeners.register(listener);
    }

    fn commit(&mut self, effect: Option<MutationEffect>) -> Commit {
        let context = UpdateContext {
            version: self.document.version,
            effect: effect.clone(),
        };
        self.listeners.run(self.document.tree_mut(), &context);

        let changes = self.diff(effect.as_ref());
        let current = fingerprint(self.document.tree());
        let changed = current != self.last_fingerprint;
        self.last_fingerprint = current.clone();

        debug!(
            version = self.document.version,
            fingerprint = %current,
            saves = changes.saves.len(),
            deletes = changes.deletes.len(),
            reorder = changes.reorder.is_some(),
            "Committed"
        );

        Commit {
            version: self.document.version,
            fingerprint: current,
            changed,
            effect,
            changes,
        }
    }

    fn diff(&mut self, effect: Option<&MutationEffect>) -> ChangeSet {
        let mut changes = ChangeSet::default();

        let live: HashSet<KeyId> = self.document.tree().key_ids().into_iter().collect();
        let mut gone: Vec<KeyId> = self
            .fingerprints
            .keys()
            .filter(|key| !live.contains(*key))
            .cloned()
            .collect();
        gone.sort();
        for key in &gone {
            self.fingerprints.remove(key);
            self.document.forget_place(key);
        }
        changes.deletes = gone;

        let inserted: Vec<KeyId> = self
            .document
            .tree()
            .key_ids()
            .into_iter()
            .filter(|key| !self.fingerprints.contains_key(key))
            .collect();

        // New paragraphs slot in between their neighbors; a move or an
        // unplaceable insert renumbers the chapter instead
        let mut reorder = false;
        if let Some(MutationEffect::Moved(key)) = effect {
            self.document.forget_place(key);
            self.document.place_between_neighbors(key);
            reorder = true;
        }
        for key in &inserted {
            if self.document.place_between_neighbors(key).is_none() {
                reorder = true;
            }
        }
        if !self.document.is_ordered() {
            self.document.resequence();
            reorder = true;
        }
        if reorder {
            changes.reorder = Some(self.document.order_blocks());
        }

        for paragraph in &self.document.tree().paragraphs {
            let key = paragraph.key_id();
            let current = fingerprint_paragraph(paragraph);
            let dirty = self.fingerprints.get(key) != Some(&current);
            if !dirty {
                continue;
            }

            match Block::from_paragraph(paragraph, self.document.place(key).cloned()) {
                Ok(block) => {
                    changes.saves.push(block);
                    self.fingerprints.insert(key.clone(), current);
                }
                Err(e) => warn!(key_id = %key, error = %e, "Excluding paragraph from save batch"),
            }
        }

        changes
    }

    fn take_baseline(&mut self) {
        let tree = self.document.tree();
        self.fingerprints = tree
            .paragraphs
            .iter()
            .map(|p| (p.key_id().clone(), fingerprint_paragraph(p)))
            .collect();
        self.last_fingerprint = fingerprint(tree);
    }

    /// Adopt a store-assigned key for a provisional one
    pub fn reconcile_key(&mut self, old: &KeyId, new: KeyId) -> bool {
        if !self.document.reconcile_key(old, new.clone()) {
            return false;
        }
        // the key is part of the paragraph fingerprint
        self.fingerprints.remove(old);
        if let Some(paragraph) = self.document.paragraph(&new) {
            self.fingerprints
                .insert(new.clone(), fingerprint_paragraph(paragraph));
        }
        self.last_fingerprint = fingerprint(self.document.tree());
        true
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tree(&self) -> &ChapterTree {
        self.document.tree()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.last_fingerprint
    }

    pub fn listener_names(&self) -> Vec<&'static str> {
        self.listeners.names()
    }
}
