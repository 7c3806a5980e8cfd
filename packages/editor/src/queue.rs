//! # Operation Queue
//!
//! Pending persistence intents, last write wins per key.
//!
//! Each paragraph key holds at most one pending `save` or `delete`; each
//! chapter holds at most one pending `syncOrder`. A newer intent replaces the
//! older one and moves to the back of the replay list, which only decides
//! network dispatch order.
//!
//! ## Paragraph states
//!
//! ```text
//! clean → dirty → queued → in-flight → clean
//!                    ↑          │
//!                    └─ failed ─┘
//! ```
//!
//! Batches handed to the transport are snapshots: later edits enqueue new
//! operations instead of touching what is already in flight.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use storyloom_model::{Block, ChapterRef, KeyId};
use thiserror::Error;
use tracing::{debug, trace, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(OperationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    Save,
    Delete,
    SyncOrder,
}

/// A queued persistence intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbOperation {
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub story_id: String,
    pub chapter_id: String,
    /// Milliseconds since the Unix epoch
    pub time: i64,
    pub blocks: Vec<Block>,
    #[serde(rename = "orderList", default, skip_serializing_if = "Option::is_none")]
    pub order_list: Option<Vec<KeyId>>,
}

impl DbOperation {
    fn new(kind: OperationType, chapter: &ChapterRef, blocks: Vec<Block>) -> Self {
        Self {
            kind,
            story_id: chapter.story_id.clone(),
            chapter_id: chapter.chapter_id.clone(),
            time: Utc::now().timestamp_millis(),
            blocks,
            order_list: None,
        }
    }

    pub fn save(chapter: &ChapterRef, block: Block) -> Self {
        Self::new(OperationType::Save, chapter, vec![block])
    }

    /// Carries only the key; chunk and place are dropped
    pub fn delete(chapter: &ChapterRef, key_id: KeyId) -> Self {
        Self::new(OperationType::Delete, chapter, vec![Block::key_only(key_id)])
    }

    /// Full `{key_id, place}` map for the chapter
    pub fn sync_order(chapter: &ChapterRef, blocks: Vec<Block>) -> Self {
        let order = blocks.iter().map(|b| b.key_id.clone()).collect();
        let mut operation = Self::new(OperationType::SyncOrder, chapter, blocks);
        operation.order_list = Some(order);
        operation
    }

    pub fn chapter(&self) -> ChapterRef {
        ChapterRef::new(self.story_id.clone(), self.chapter_id.clone())
    }

    /// The paragraph a save or delete targets
    pub fn key_id(&self) -> Option<&KeyId> {
        match self.kind {
            OperationType::SyncOrder => None,
            OperationType::Save | OperationType::Delete => self.blocks.first().map(|b| &b.key_id),
        }
    }

    fn queue_key(&self) -> Option<OpKey> {
        let chapter = self.chapter();
        match self.kind {
            OperationType::SyncOrder => Some(OpKey::Order(chapter)),
            _ => self.key_id().map(|key| OpKey::Paragraph(chapter, key.clone())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(u64);

impl OperationId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for OperationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OperationId,
    pub operation: DbOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OpKey {
    Paragraph(ChapterRef, KeyId),
    Order(ChapterRef),
}

impl OpKey {
    fn chapter(&self) -> &ChapterRef {
        match self {
            OpKey::Paragraph(chapter, _) | OpKey::Order(chapter) => chapter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Clean,
    Dirty,
    Queued,
    InFlight,
    Failed,
}

/// Store-assigned id for a provisional key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAssignment {
    pub client: KeyId,
    pub server: KeyId,
}

#[derive(Debug, Default)]
pub struct OperationQueue {
    next_id: u64,
    pending: HashMap<OpKey, QueuedOperation>,
    replay: BTreeMap<OperationId, OpKey>,
    in_flight: BTreeMap<OperationId, (OpKey, DbOperation)>,
    states: HashMap<(ChapterRef, KeyId), SyncState>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an operation, superseding any pending one for the same key
    pub fn enqueue(&mut self, operation: DbOperation) -> Option<OperationId> {
        let Some(key) = operation.queue_key() else {
            warn!(kind = ?operation.kind, "Dropping operation without a key");
            return None;
        };

        let id = OperationId(self.next_id);
        self.next_id += 1;

        if let Some(previous) = self.pending.remove(&key) {
            self.replay.remove(&previous.id);
            trace!(superseded = %previous.id, by = %id, kind = ?operation.kind, "Superseded pending operation");
        }

        if let OpKey::Paragraph(chapter, key_id) = &key {
            self.states
                .insert((chapter.clone(), key_id.clone()), SyncState::Queued);
        }

        self.replay.insert(id, key.clone());
        self.pending.insert(key, QueuedOperation { id, operation });
        Some(id)
    }

    /// Snapshot pending operations in creation order and mark them in flight
    pub fn take_batch(&mut self, chapter: Option<&ChapterRef>) -> Vec<QueuedOperation> {
        let ids: Vec<OperationId> = self
            .replay
            .iter()
            .filter(|(_, key)| chapter.map_or(true, |c| key.chapter() == c))
            .map(|(id, _)| *id)
            .collect();

        let mut batch = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(key) = self.replay.remove(&id) else {
                continue;
            };
            let Some(queued) = self.pending.remove(&key) else {
                continue;
            };
            if let OpKey::Paragraph(chapter, key_id) = &key {
                self.states
                    .insert((chapter.clone(), key_id.clone()), SyncState::InFlight);
            }
            self.in_flight
                .insert(id, (key, queued.operation.clone()));
            batch.push(queued);
        }

        if !batch.is_empty() {
            debug!(operations = batch.len(), "Took batch");
        }
        batch
    }

    /// The store accepted an operation; returns the operation that was sent
    pub fn ack(&mut self, id: OperationId) -> Result<DbOperation, QueueError> {
        let (key, operation) = self
            .in_flight
            .remove(&id)
            .ok_or(QueueError::UnknownOperation(id))?;

        if let OpKey::Paragraph(chapter, key_id) = &key {
            let state_key = (chapter.clone(), key_id.clone());
            if self.pending.contains_key(&key) {
                // a newer operation for this key is still queued
            } else if operation.kind == OperationType::Delete {
                self.states.remove(&state_key);
            } else {
                self.states.insert(state_key, SyncState::Clean);
            }
        }
        trace!(id = %id, kind = ?operation.kind, "Acknowledged");
        Ok(operation)
    }

    /// The send failed; requeue unless something newer replaced it meanwhile
    pub fn fail(&mut self, id: OperationId) -> Result<(), QueueError> {
        let (key, operation) = self
            .in_flight
            .remove(&id)
            .ok_or(QueueError::UnknownOperation(id))?;

        if self.pending.contains_key(&key) {
            debug!(id = %id, "Failed operation already superseded");
            return Ok(());
        }

        if let OpKey::Paragraph(chapter, key_id) = &key {
            self.states
                .insert((chapter.clone(), key_id.clone()), SyncState::Failed);
        }
        self.replay.insert(id, key.clone());
        self.pending.insert(key, QueuedOperation { id, operation });
        Ok(())
    }

    /// Rewrite queued operations after the store assigned real ids
    pub fn reconcile(&mut self, chapter: &ChapterRef, assignments: &[IdAssignment]) {
        for assignment in assignments {
            let old = OpKey::Paragraph(chapter.clone(), assignment.client.clone());
            if let Some(mut queued) = self.pending.remove(&old) {
                rename_blocks(&mut queued.operation, assignment);
                let new = OpKey::Paragraph(chapter.clone(), assignment.server.clone());
                self.replay.insert(queued.id, new.clone());
                self.pending.insert(new, queued);
            }

            if let Some(queued) = self.pending.get_mut(&OpKey::Order(chapter.clone())) {
                rename_blocks(&mut queued.operation, assignment);
            }

            for (key, operation) in self.in_flight.values_mut() {
                if key.chapter() != chapter {
                    continue;
                }
                if *key == old {
                    *key = OpKey::Paragraph(chapter.clone(), assignment.server.clone());
                }
                rename_blocks(operation, assignment);
            }

            if let Some(state) = self
                .states
                .remove(&(chapter.clone(), assignment.client.clone()))
            {
                self.states
                    .insert((chapter.clone(), assignment.server.clone()), state);
            }
        }
    }

    /// Drop everything pending for a chapter; returns how many were dropped
    pub fn discard(&mut self, chapter: &ChapterRef) -> usize {
        let keys: Vec<OpKey> = self
            .pending
            .keys()
            .filter(|key| key.chapter() == chapter)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(queued) = self.pending.remove(key) {
                self.replay.remove(&queued.id);
            }
        }
        // late outcomes for these become unknown operations
        let before = self.in_flight.len();
        self.in_flight.retain(|_, (key, _)| key.chapter() != chapter);
        self.states.retain(|(c, _), _| c != chapter);
        keys.len() + before - self.in_flight.len()
    }

    /// Edited but not yet queued
    pub fn mark_dirty(&mut self, chapter: &ChapterRef, key_id: &KeyId) {
        self.states
            .insert((chapter.clone(), key_id.clone()), SyncState::Dirty);
    }

    pub fn state(&self, chapter: &ChapterRef, key_id: &KeyId) -> SyncState {
        self.states
            .get(&(chapter.clone(), key_id.clone()))
            .copied()
            .unwrap_or(SyncState::Clean)
    }

    /// Pending operations for a chapter in dispatch order
    pub fn pending_for(&self, chapter: &ChapterRef) -> Vec<&QueuedOperation> {
        self.replay
            .values()
            .filter(|key| key.chapter() == chapter)
            .filter_map(|key| self.pending.get(key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Anything queued or in flight (drives the "changes pending" indicator)
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty() || !self.in_flight.is_empty()
    }
}

fn rename_blocks(operation: &mut DbOperation, assignment: &IdAssignment) {
    for block in operation.blocks.iter_mut() {
        if block.key_id == assignment.client {
            block.key_id = assignment.server.clone();
        }
    }
    if let Some(order) = operation.order_list.as_mut() {
        for key in order.iter_mut() {
            if *key == assignment.client {
                *key = assignment.server.clone();
            }
        }
    }
}
