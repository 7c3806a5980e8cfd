//! In-memory remote store.
//!
//! Honours the request bodies of the real store: provisional keys get a
//! server id on first sight (reported back as an [`IdAssignment`]), deletes
//! are idempotent, and an order map may mention keys whose save has not
//! arrived yet.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use storyloom_editor::IdAssignment;
use storyloom_model::{Block, ChapterRef, KeyId, Place, SerializedNode};
use tracing::{debug, warn};

use crate::error::{StoreError, TransportError, TransportResult};
use crate::store::{RemoteStore, StoreRequest, StoreResponse};

#[derive(Debug, Clone, Default)]
struct StoredBlock {
    chunk: Option<SerializedNode>,
    place: Option<Place>,
}

#[derive(Debug, Default)]
struct ChapterRecord {
    blocks: HashMap<KeyId, StoredBlock>,
}

#[derive(Debug)]
struct StoreState {
    chapters: HashMap<ChapterRef, ChapterRecord>,
    /// Provisional key → server key
    aliases: HashMap<KeyId, KeyId>,
    next_id: u64,
    failures: usize,
    requests: usize,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            chapters: HashMap::new(),
            aliases: HashMap::new(),
            next_id: 1000,
            failures: 0,
            requests: 0,
        }
    }
}

impl StoreState {
    /// Server key for a block key, minting one for unseen provisional keys
    fn resolve(&mut self, key_id: &KeyId, assigned: &mut Vec<IdAssignment>) -> KeyId {
        if !key_id.is_provisional() {
            return key_id.clone();
        }
        let server = match self.aliases.get(key_id) {
            Some(server) => server.clone(),
            None => {
                self.next_id += 1;
                let server = KeyId::new(self.next_id.to_string());
                self.aliases.insert(key_id.clone(), server.clone());
                server
            }
        };
        if !assigned.iter().any(|a| &a.client == key_id) {
            assigned.push(IdAssignment {
                client: key_id.clone(),
                server: server.clone(),
            });
        }
        server
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `count` sends fail as unreachable
    pub fn inject_failures(&self, count: usize) {
        self.lock().failures = count;
    }

    /// Requests received so far, failed ones included
    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    /// Seed a chapter with persisted blocks, replacing what was there
    pub fn load_chapter(&self, chapter: &ChapterRef, blocks: Vec<Block>) {
        let record = ChapterRecord {
            blocks: blocks
                .into_iter()
                .map(|b| {
                    (
                        b.key_id,
                        StoredBlock {
                            chunk: b.chunk,
                            place: b.place,
                        },
                    )
                })
                .collect(),
        };
        self.lock().chapters.insert(chapter.clone(), record);
    }

    /// Stored blocks ordered by place; unplaced blocks last, by key
    pub fn chapter_blocks(&self, chapter: &ChapterRef) -> Vec<Block> {
        let state = self.lock();
        let Some(record) = state.chapters.get(chapter) else {
            return Vec::new();
        };

        let mut blocks: Vec<Block> = record
            .blocks
            .iter()
            .map(|(key_id, stored)| Block {
                key_id: key_id.clone(),
                chunk: stored.chunk.clone(),
                place: stored.place.clone(),
            })
            .collect();
        blocks.sort_by(|a, b| match (&a.place, &b.place) {
            (Some(x), Some(y)) => x.cmp(y).then_with(|| a.key_id.cmp(&b.key_id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.key_id.cmp(&b.key_id),
        });
        blocks
    }

    /// Apply a request without the transport layer
    pub fn apply(&self, request: &StoreRequest) -> Result<StoreResponse, StoreError> {
        let mut state = self.lock();
        let chapter = request.chapter();
        let mut assigned = Vec::new();

        match request {
            StoreRequest::Save { body, .. } => {
                for block in &body.blocks {
                    if block.key_id.is_empty() {
                        return Err(StoreError::MissingKey);
                    }
                    if block.chunk.is_none() {
                        return Err(StoreError::MissingChunk(block.key_id.clone()));
                    }
                }
                for block in &body.blocks {
                    let key_id = state.resolve(&block.key_id, &mut assigned);
                    let record = state.chapters.entry(chapter.clone()).or_default();
                    let stored = record.blocks.entry(key_id).or_default();
                    stored.chunk = block.chunk.clone();
                    if block.place.is_some() {
                        stored.place = block.place.clone();
                    }
                }
            }

            StoreRequest::Delete { body, .. } => {
                for block in &body.blocks {
                    let key_id = match state.aliases.get(&block.key_id) {
                        Some(server) => server.clone(),
                        None => block.key_id.clone(),
                    };
                    let removed = state
                        .chapters
                        .get_mut(&chapter)
                        .and_then(|record| record.blocks.remove(&key_id));
                    if removed.is_none() {
                        debug!(key_id = %key_id, "Delete for unknown block");
                    }
                }
            }

            StoreRequest::SyncOrder { body, .. } => {
                if body.chapter_id != chapter.chapter_id {
                    return Err(StoreError::ChapterMismatch {
                        expected: chapter.chapter_id.clone(),
                        found: body.chapter_id.clone(),
                    });
                }
                for block in &body.blocks {
                    let key_id = state.resolve(&block.key_id, &mut assigned);
                    let record = state.chapters.entry(chapter.clone()).or_default();
                    // order may arrive before the save; keep a chunkless placeholder
                    let stored = record.blocks.entry(key_id).or_default();
                    stored.place = block.place.clone();
                }
            }
        }

        debug!(
            method = request.method(),
            path = %request.path(),
            assigned = assigned.len(),
            "Store applied request"
        );
        Ok(StoreResponse { assigned })
    }
}

impl RemoteStore for InMemoryStore {
    async fn send(&self, request: &StoreRequest) -> TransportResult<StoreResponse> {
        {
            let mut state = self.lock();
            state.requests += 1;
            if state.failures > 0 {
                state.failures -= 1;
                warn!(path = %request.path(), "Injected transport failure");
                return Err(TransportError::Unreachable("injected failure".to_string()));
            }
        }
        Ok(self.apply(request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeleteBody, OrderBody, SaveBody};
    use storyloom_model::ParagraphNode;

    fn chapter() -> ChapterRef {
        ChapterRef::new("s1", "c1")
    }

    fn save(key: &str, text: &str, place: &str) -> StoreRequest {
        let block = Block::from_paragraph(
            &ParagraphNode::new(key).with_text(text),
            Some(Place::parse(place).unwrap()),
        )
        .unwrap();
        StoreRequest::Save {
            story_id: "s1".to_string(),
            chapter_id: "c1".to_string(),
            body: SaveBody {
                blocks: vec![block],
            },
        }
    }

    #[test]
    fn test_provisional_keys_get_server_ids() {
        let store = InMemoryStore::new();

        let first = store.apply(&save("draft-abc-0", "Hello", "h")).unwrap();
        let again = store.apply(&save("draft-abc-0", "Hello!", "h")).unwrap();

        assert_eq!(first.assigned.len(), 1);
        assert_eq!(first.assigned, again.assigned);
        let blocks = store.chapter_blocks(&chapter());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].key_id, first.assigned[0].server);
        assert_eq!(blocks[0].to_paragraph().unwrap().text_content(), "Hello!");
    }

    #[test]
    fn test_save_without_chunk_is_rejected() {
        let store = InMemoryStore::new();
        let request = StoreRequest::Save {
            story_id: "s1".to_string(),
            chapter_id: "c1".to_string(),
            body: SaveBody {
                blocks: vec![Block::key_only(KeyId::from("p1"))],
            },
        };

        assert_eq!(
            store.apply(&request),
            Err(StoreError::MissingChunk(KeyId::from("p1")))
        );
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        store.apply(&save("p1", "a", "h")).unwrap();
        let delete = StoreRequest::Delete {
            story_id: "s1".to_string(),
            chapter_id: "c1".to_string(),
            body: DeleteBody {
                blocks: vec![Block::key_only(KeyId::from("p1"))],
            },
        };

        store.apply(&delete).unwrap();
        store.apply(&delete).unwrap();
        assert!(store.chapter_blocks(&chapter()).is_empty());
    }

    #[test]
    fn test_order_before_save_keeps_placeholder() {
        let store = InMemoryStore::new();
        store.apply(&save("p1", "a", "h")).unwrap();
        let order = StoreRequest::SyncOrder {
            story_id: "s1".to_string(),
            chapter_id: "c1".to_string(),
            body: OrderBody {
                chapter_id: "c1".to_string(),
                blocks: vec![
                    Block::order(KeyId::from("p2"), Place::parse("c").unwrap()),
                    Block::order(KeyId::from("p1"), Place::parse("m").unwrap()),
                ],
            },
        };
        store.apply(&order).unwrap();

        let blocks = store.chapter_blocks(&chapter());
        assert_eq!(blocks[0].key_id, KeyId::from("p2"));
        assert!(blocks[0].chunk.is_none());

        store.apply(&save("p2", "b", "c")).unwrap();
        let blocks = store.chapter_blocks(&chapter());
        assert!(blocks[0].chunk.is_some());
        assert_eq!(blocks[1].place.as_ref().map(Place::as_str), Some("m"));
    }

    #[test]
    fn test_order_for_other_chapter_is_rejected() {
        let store = InMemoryStore::new();
        let order = StoreRequest::SyncOrder {
            story_id: "s1".to_string(),
            chapter_id: "c1".to_string(),
            body: OrderBody {
                chapter_id: "c2".to_string(),
                blocks: Vec::new(),
            },
        };
        assert!(matches!(
            store.apply(&order),
            Err(StoreError::ChapterMismatch { .. })
        ));
    }
}
