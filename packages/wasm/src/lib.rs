use serde::Serialize;
use storyloom_editor::{
    Block, Catalog, ChapterRef, ClosePolicy, Commit, EditSession, IdAssignment, Mutation,
    OperationId, PointerEvent, QueuedOperation,
};
use storyloom_sync::StoreRequest;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn js_error(context: &str, error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, error))
}

fn to_json(value: &impl Serialize) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| js_error("Serialization error", e))
}

/// Commit summary handed to the host after every edit
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitSummary {
    version: u64,
    fingerprint: String,
    changed: bool,
    saves: usize,
    deletes: usize,
    reordered: bool,
}

impl From<&Commit> for CommitSummary {
    fn from(commit: &Commit) -> Self {
        Self {
            version: commit.version,
            fingerprint: commit.fingerprint.to_string(),
            changed: commit.changed,
            saves: commit.changes.saves.len(),
            deletes: commit.changes.deletes.len(),
            reordered: commit.changes.reorder.is_some(),
        }
    }
}

/// A queued operation as an HTTP request the host should send
#[derive(Serialize)]
struct OutgoingRequest {
    id: u64,
    method: &'static str,
    path: String,
    body: serde_json::Value,
}

fn outgoing(batch: &[QueuedOperation]) -> Vec<OutgoingRequest> {
    batch
        .iter()
        .map(|queued| {
            let request = StoreRequest::from_operation(&queued.operation);
            OutgoingRequest {
                id: queued.id.value(),
                method: request.method(),
                path: request.path(),
                body: request.body(),
            }
        })
        .collect()
}

/// Editing session for one chapter, driven from JavaScript.
///
/// Everything crosses the boundary as JSON strings; the host owns the
/// network and reports each send back with `ack` or `fail`.
#[wasm_bindgen]
pub struct StoryEditor {
    session: EditSession,
}

#[wasm_bindgen]
impl StoryEditor {
    #[wasm_bindgen(constructor)]
    pub fn new(story_id: &str, chapter_id: &str, blocks_json: &str) -> Result<StoryEditor, JsValue> {
        let blocks: Vec<Block> =
            serde_json::from_str(blocks_json).map_err(|e| js_error("Invalid blocks", e))?;
        let mut session = EditSession::new(format!("{}/{}", story_id, chapter_id));
        session.open_chapter(ChapterRef::new(story_id, chapter_id), &blocks);
        Ok(StoryEditor { session })
    }

    /// Replace the entity catalog; returns whether the chapter changed
    #[wasm_bindgen(js_name = setCatalog)]
    pub fn set_catalog(&mut self, associations_json: &str) -> Result<bool, JsValue> {
        let catalog =
            Catalog::from_json(associations_json).map_err(|e| js_error("Invalid catalog", e))?;
        let commit = self
            .session
            .set_catalog(catalog)
            .map_err(|e| js_error("Catalog error", e))?;
        Ok(commit.is_some_and(|c| c.changed))
    }

    /// Apply a mutation (`{"kind": "insert_text", ...}`) and return a commit summary
    pub fn apply(&mut self, mutation_json: &str) -> Result<String, JsValue> {
        let mutation: Mutation =
            serde_json::from_str(mutation_json).map_err(|e| js_error("Invalid mutation", e))?;
        let commit = self
            .session
            .apply(mutation)
            .map_err(|e| js_error("Edit rejected", e))?;
        to_json(&CommitSummary::from(&commit))
    }

    #[wasm_bindgen(js_name = setSelection)]
    pub fn set_selection(&mut self, selection: Option<String>) {
        self.session.set_selection(selection);
    }

    /// Route a pointer event; `undefined` means the host handles it
    pub fn route(&self, event_json: &str) -> Result<Option<String>, JsValue> {
        let event: PointerEvent =
            serde_json::from_str(event_json).map_err(|e| js_error("Invalid pointer event", e))?;
        self.session
            .route(&event)
            .map(|action| to_json(&action))
            .transpose()
    }

    /// Pending operations as requests, marked in flight
    #[wasm_bindgen(js_name = takeBatch)]
    pub fn take_batch(&mut self) -> Result<String, JsValue> {
        to_json(&outgoing(&self.session.take_batch()))
    }

    /// The store accepted request `id`; `response_json` is its response body
    pub fn ack(&mut self, id: u64, response_json: &str) -> Result<(), JsValue> {
        let assigned = if response_json.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<storyloom_sync::StoreResponse>(response_json)
                .map_err(|e| js_error("Invalid store response", e))?
                .assigned
        };
        self.session
            .acknowledge(OperationId::from(id), &assigned)
            .map_err(|e| js_error("Ack failed", e))
    }

    pub fn fail(&mut self, id: u64) -> Result<(), JsValue> {
        self.session
            .fail(OperationId::from(id))
            .map_err(|e| js_error("Fail failed", e))
    }

    /// Close the chapter; returns the requests still to send (empty when discarding)
    pub fn close(&mut self, discard: bool) -> Result<String, JsValue> {
        let policy = if discard {
            ClosePolicy::Discard
        } else {
            ClosePolicy::Flush
        };
        let closed = self.session.close_chapter(policy);
        to_json(&outgoing(&closed.flushed))
    }

    pub fn fingerprint(&self) -> Option<String> {
        self.session
            .pipeline()
            .map(|pipeline| pipeline.fingerprint().to_string())
    }

    #[wasm_bindgen(js_name = hasPendingChanges)]
    pub fn has_pending_changes(&self) -> bool {
        self.session.has_pending_changes()
    }

    #[wasm_bindgen(js_name = toBlocks)]
    pub fn to_blocks(&self) -> Result<String, JsValue> {
        to_json(&self.session.to_blocks())
    }
}

/// Assignments in a store response, for hosts that reconcile on their own
#[wasm_bindgen(js_name = parseAssignments)]
pub fn parse_assignments(response_json: &str) -> Result<String, JsValue> {
    let response: storyloom_sync::StoreResponse =
        serde_json::from_str(response_json).map_err(|e| js_error("Invalid store response", e))?;
    let assigned: &[IdAssignment] = &response.assigned;
    to_json(&assigned)
}
