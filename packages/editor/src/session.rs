//! # Edit Session Management
//!
//! One client's editing state: the open chapter, the operation queue, the
//! entity catalog and the current selection.
//!
//! Every committed mutation feeds its change set into the queue. Navigating
//! away from a chapter either flushes its pending operations (hands them to
//! the caller for sending) or discards them.

use serde::{Deserialize, Serialize};
use storyloom_model::{Block, ChapterRef, KeyId};
use tracing::{debug, info, warn};

use crate::interaction::{EditorAction, InteractionRouter, PointerEvent};
use crate::pipeline::{ChangeSet, Commit};
use crate::queue::{DbOperation, IdAssignment, OperationId, OperationQueue, QueuedOperation};
use crate::scanner::{Catalog, Scanner, ScannerOptions};
use crate::{Document, EditorError, Mutation, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosePolicy {
    /// Hand pending operations back for a final send
    #[default]
    Flush,
    /// Drop pending operations
    Discard,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub scanner: ScannerOptions,
    pub close_policy: ClosePolicy,
}

/// What was left when a chapter was closed
#[derive(Debug, Clone, Default)]
pub struct ClosedChapter {
    pub chapter: Option<ChapterRef>,
    /// Operations to send before the chapter is released (flush only)
    pub flushed: Vec<QueuedOperation>,
    pub discarded: usize,
}

/// Single edit session
#[derive(Debug)]
pub struct EditSession {
    /// Unique session identifier
    pub id: String,

    queue: OperationQueue,
    pipeline: Option<Pipeline>,
    catalog: Catalog,
    options: SessionOptions,
    router: InteractionRouter,

    /// Current text selection reported by the host
    selection: Option<String>,
}

impl EditSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_options(id, SessionOptions::default())
    }

    pub fn with_options(id: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            id: id.into(),
            queue: OperationQueue::new(),
            pipeline: None,
            catalog: Catalog::default(),
            options,
            router: InteractionRouter::new(),
            selection: None,
        }
    }

    fn scanner(&self) -> Scanner {
        Scanner::with_options(self.catalog.clone(), self.options.scanner)
    }

    /// Open a chapter from persisted blocks, closing any open one first
    pub fn open_chapter(&mut self, chapter: ChapterRef, blocks: &[Block]) -> ClosedChapter {
        let closed = self.close_chapter(self.options.close_policy);
        let document = Document::from_blocks(chapter.clone(), blocks);
        self.pipeline = Some(Pipeline::new(document, self.scanner()));
        info!(session = %self.id, chapter = %chapter, "Opened chapter");
        closed
    }

    /// Release the open chapter
    pub fn close_chapter(&mut self, policy: ClosePolicy) -> ClosedChapter {
        let Some(pipeline) = self.pipeline.take() else {
            return ClosedChapter::default();
        };
        let chapter = pipeline.document().chapter().clone();
        self.selection = None;

        let closed = match policy {
            ClosePolicy::Flush => ClosedChapter {
                flushed: self.queue.take_batch(Some(&chapter)),
                chapter: Some(chapter.clone()),
                discarded: 0,
            },
            ClosePolicy::Discard => {
                let discarded = self.queue.discard(&chapter);
                if discarded > 0 {
                    warn!(session = %self.id, chapter = %chapter, discarded, "Discarded unsent changes");
                }
                ClosedChapter {
                    chapter: Some(chapter.clone()),
                    flushed: Vec::new(),
                    discarded,
                }
            }
        };
        debug!(session = %self.id, chapter = %chapter, ?policy, "Closed chapter");
        closed
    }

    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn chapter(&self) -> Option<&ChapterRef> {
        self.pipeline.as_ref().map(|p| p.document().chapter())
    }

    fn pipeline_mut(&mut self) -> Result<&mut Pipeline, EditorError> {
        self.pipeline.as_mut().ok_or(EditorError::NoOpenChapter)
    }

    /// Commit a mutation and queue whatever it changed
    pub fn apply(&mut self, mutation: Mutation) -> Result<Commit, EditorError> {
        let commit = self.pipeline_mut()?.apply_mutation(mutation)?;
        self.enqueue(&commit.changes)?;
        Ok(commit)
    }

    /// Replace the entity catalog and rescan the open chapter
    pub fn set_catalog(&mut self, catalog: Catalog) -> Result<Option<Commit>, EditorError> {
        self.catalog = catalog;
        let scanner = self.scanner();
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(None);
        };
        let commit = pipeline.set_scanner(scanner);
        self.enqueue(&commit.changes)?;
        Ok(Some(commit))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn enqueue(&mut self, changes: &ChangeSet) -> Result<(), EditorError> {
        if changes.is_empty() {
            return Ok(());
        }
        let chapter = self.pipeline_mut()?.document().chapter().clone();

        for key in &changes.deletes {
            self.queue.enqueue(DbOperation::delete(&chapter, key.clone()));
        }
        for block in &changes.saves {
            self.queue.mark_dirty(&chapter, &block.key_id);
            self.queue.enqueue(DbOperation::save(&chapter, block.clone()));
        }
        if let Some(order) = &changes.reorder {
            self.queue.enqueue(DbOperation::sync_order(&chapter, order.clone()));
        }
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Option<String>) {
        self.selection = selection;
    }

    /// Route a pointer event; falls back to the stored selection
    pub fn route(&self, event: &PointerEvent) -> Option<EditorAction> {
        let pipeline = self.pipeline.as_ref()?;
        if event.selection.is_none() && self.selection.is_some() {
            let mut event = event.clone();
            event.selection = self.selection.clone();
            return self.router.route(pipeline.tree(), &event);
        }
        self.router.route(pipeline.tree(), event)
    }

    pub fn queue(&self) -> &OperationQueue {
        &self.queue
    }

    /// Snapshot of everything pending, marked in flight
    pub fn take_batch(&mut self) -> Vec<QueuedOperation> {
        self.queue.take_batch(None)
    }

    /// The store accepted an operation and may have assigned real ids
    pub fn acknowledge(
        &mut self,
        id: OperationId,
        assignments: &[IdAssignment],
    ) -> Result<(), EditorError> {
        let operation = self.queue.ack(id)?;
        if assignments.is_empty() {
            return Ok(());
        }

        let chapter = operation.chapter();
        let open = self
            .pipeline
            .as_mut()
            .filter(|pipeline| pipeline.document().chapter() == &chapter);

        // queued operations follow the tree; a rename the tree refuses is not applied to them either
        let adopted: Vec<IdAssignment> = match open {
            Some(pipeline) => assignments
                .iter()
                .filter(|assignment| {
                    if pipeline.reconcile_key(&assignment.client, assignment.server.clone()) {
                        debug!(client = %assignment.client, server = %assignment.server, "Adopted store id");
                        return true;
                    }
                    let document = pipeline.document();
                    let conflict = document.paragraph(&assignment.client).is_some()
                        || document.paragraph(&assignment.server).is_some();
                    if conflict {
                        warn!(
                            client = %assignment.client,
                            server = %assignment.server,
                            "Store id clashes with the open chapter, keeping provisional key"
                        );
                    }
                    !conflict
                })
                .cloned()
                .collect(),
            None => assignments.to_vec(),
        };
        self.queue.reconcile(&chapter, &adopted);
        Ok(())
    }

    /// The send failed; the operation stays queued for the next drain
    pub fn fail(&mut self, id: OperationId) -> Result<(), EditorError> {
        self.queue.fail(id)?;
        Ok(())
    }

    /// Drives the generic "changes pending" indicator
    pub fn has_pending_changes(&self) -> bool {
        self.queue.has_pending_changes()
    }

    /// Current chapter as persisted blocks
    pub fn to_blocks(&self) -> Vec<Block> {
        self.pipeline
            .as_ref()
            .map(|p| p.document().to_blocks())
            .unwrap_or_default()
    }

    pub fn key_ids(&self) -> Vec<KeyId> {
        self.pipeline
            .as_ref()
            .map(|p| p.tree().key_ids())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{OperationType, SyncState};
    use storyloom_model::{ParagraphNode, Place};

    fn blocks(texts: &[(&str, &str)]) -> Vec<Block> {
        texts
            .iter()
            .zip(Place::sequence(texts.len()))
            .map(|((key, text), place)| {
                Block::from_paragraph(&ParagraphNode::new(*key).with_text(*text), Some(place)).unwrap()
            })
            .collect()
    }

    fn session() -> EditSession {
        let mut session = EditSession::new("client-1");
        session.open_chapter(ChapterRef::new("s1", "c1"), &blocks(&[("p1", "Hello"), ("p2", "World")]));
        session
    }

    #[test]
    fn test_apply_without_chapter() {
        let mut session = EditSession::new("client-1");
        let result = session.apply(Mutation::RemoveParagraph {
            key_id: KeyId::from("p1"),
        });
        assert!(matches!(result, Err(EditorError::NoOpenChapter)));
    }

    #[test]
    fn test_open_queues_nothing() {
        let session = session();
        assert!(!session.has_pending_changes());
        assert_eq!(session.key_ids().len(), 2);
    }

    #[test]
    fn test_ack_with_assignment_adopts_server_id() {
        let mut session = session();
        let commit = session
            .apply(Mutation::InsertParagraph {
                after: Some(KeyId::from("p2")),
                key_id: None,
                text: "New".to_string(),
            })
            .unwrap();
        let provisional = commit.changes.saves[0].key_id.clone();
        assert!(provisional.is_provisional());

        let batch = session.take_batch();
        assert_eq!(batch.len(), 1);
        session
            .acknowledge(
                batch[0].id,
                &[IdAssignment {
                    client: provisional.clone(),
                    server: KeyId::from("501"),
                }],
            )
            .unwrap();

        assert_eq!(session.key_ids()[2], KeyId::from("501"));
        assert!(!session.has_pending_changes());
        let chapter = session.chapter().unwrap().clone();
        assert_eq!(session.queue().state(&chapter, &KeyId::from("501")), SyncState::Clean);
    }

    #[test]
    fn test_clashing_assignment_leaves_tree_and_queue_alone() {
        let mut session = EditSession::new("client-1");
        session.open_chapter(ChapterRef::new("s1", "c1"), &blocks(&[("p1", "Hello"), ("1001", "Taken")]));
        let commit = session
            .apply(Mutation::InsertParagraph {
                after: Some(KeyId::from("1001")),
                key_id: None,
                text: "New".to_string(),
            })
            .unwrap();
        let provisional = commit.changes.saves[0].key_id.clone();
        let batch = session.take_batch();
        session
            .apply(Mutation::InsertText {
                key_id: provisional.clone(),
                offset: 3,
                text: "er".to_string(),
            })
            .unwrap();

        session
            .acknowledge(
                batch[0].id,
                &[IdAssignment {
                    client: provisional.clone(),
                    server: KeyId::from("1001"),
                }],
            )
            .unwrap();

        assert_eq!(session.key_ids()[2], provisional);
        let chapter = session.chapter().unwrap().clone();
        let pending = session.queue().pending_for(&chapter);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation.key_id(), Some(&provisional));
    }

    #[test]
    fn test_close_with_flush_returns_pending() {
        let mut session = session();
        session
            .apply(Mutation::InsertText {
                key_id: KeyId::from("p1"),
                offset: 5,
                text: "!".to_string(),
            })
            .unwrap();

        let closed = session.close_chapter(ClosePolicy::Flush);

        assert_eq!(closed.flushed.len(), 1);
        assert_eq!(closed.flushed[0].operation.kind, OperationType::Save);
        assert!(session.chapter().is_none());
    }

    #[test]
    fn test_close_with_discard_drops_pending() {
        let mut session = session();
        session
            .apply(Mutation::RemoveParagraph {
                key_id: KeyId::from("p2"),
            })
            .unwrap();

        let closed = session.close_chapter(ClosePolicy::Discard);

        assert_eq!(closed.discarded, 1);
        assert!(!session.has_pending_changes());
    }
}
