//! # Remote Store Protocol
//!
//! Each queued [`DbOperation`] becomes one HTTP-shaped request:
//!
//! | operation   | method | path                                     | body                           |
//! |-------------|--------|------------------------------------------|--------------------------------|
//! | `save`      | PUT    | `/stories/{story}/chapters/{chapter}`        | `{ blocks }`                   |
//! | `delete`    | DELETE | `/stories/{story}/chapters/{chapter}/blocks` | `{ blocks: [{ key_id }] }`     |
//! | `syncOrder` | PUT    | `/stories/{story}/chapters/{chapter}/order`  | `{ chapter_id, blocks: [{ key_id, place }] }` |
//!
//! Responses may carry id assignments for provisional keys.

use serde::{Deserialize, Serialize};
use storyloom_editor::{DbOperation, IdAssignment, OperationType};
use storyloom_model::{Block, ChapterRef};

use crate::error::TransportResult;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveBody {
    pub blocks: Vec<Block>,
}

/// Blocks carry `key_id` only
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeleteBody {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBody {
    pub chapter_id: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreRequest {
    Save {
        story_id: String,
        chapter_id: String,
        body: SaveBody,
    },
    Delete {
        story_id: String,
        chapter_id: String,
        body: DeleteBody,
    },
    SyncOrder {
        story_id: String,
        chapter_id: String,
        body: OrderBody,
    },
}

impl StoreRequest {
    pub fn from_operation(operation: &DbOperation) -> Self {
        let story_id = operation.story_id.clone();
        let chapter_id = operation.chapter_id.clone();
        match operation.kind {
            OperationType::Save => StoreRequest::Save {
                story_id,
                chapter_id,
                body: SaveBody {
                    blocks: operation.blocks.clone(),
                },
            },
            OperationType::Delete => StoreRequest::Delete {
                story_id,
                chapter_id,
                body: DeleteBody {
                    blocks: operation
                        .blocks
                        .iter()
                        .map(|b| Block::key_only(b.key_id.clone()))
                        .collect(),
                },
            },
            OperationType::SyncOrder => StoreRequest::SyncOrder {
                body: OrderBody {
                    chapter_id: chapter_id.clone(),
                    blocks: operation.blocks.clone(),
                },
                story_id,
                chapter_id,
            },
        }
    }

    pub fn chapter(&self) -> ChapterRef {
        match self {
            StoreRequest::Save {
                story_id,
                chapter_id,
                ..
            }
            | StoreRequest::Delete {
                story_id,
                chapter_id,
                ..
            }
            | StoreRequest::SyncOrder {
                story_id,
                chapter_id,
                ..
            } => ChapterRef::new(story_id.clone(), chapter_id.clone()),
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            StoreRequest::Save { .. } | StoreRequest::SyncOrder { .. } => "PUT",
            StoreRequest::Delete { .. } => "DELETE",
        }
    }

    pub fn path(&self) -> String {
        let chapter = self.chapter();
        let base = format!(
            "/stories/{}/chapters/{}",
            chapter.story_id, chapter.chapter_id
        );
        match self {
            StoreRequest::Save { .. } => base,
            StoreRequest::Delete { .. } => format!("{}/blocks", base),
            StoreRequest::SyncOrder { .. } => format!("{}/order", base),
        }
    }

    /// JSON body exactly as sent over the wire
    pub fn body(&self) -> serde_json::Value {
        let body = match self {
            StoreRequest::Save { body, .. } => serde_json::to_value(body),
            StoreRequest::Delete { body, .. } => serde_json::to_value(body),
            StoreRequest::SyncOrder { body, .. } => serde_json::to_value(body),
        };
        // plain structs of strings always serialize
        body.unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreResponse {
    #[serde(default)]
    pub assigned: Vec<IdAssignment>,
}

/// Where queued operations are sent. Timeouts and retries below the
/// request level belong to the implementation.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn send(&self, request: &StoreRequest) -> TransportResult<StoreResponse>;
}

impl<S: RemoteStore + ?Sized> RemoteStore for &S {
    async fn send(&self, request: &StoreRequest) -> TransportResult<StoreResponse> {
        (**self).send(request).await
    }
}

impl<S: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<S> {
    async fn send(&self, request: &StoreRequest) -> TransportResult<StoreResponse> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_model::{KeyId, ParagraphNode, Place};

    fn chapter() -> ChapterRef {
        ChapterRef::new("s1", "c1")
    }

    #[test]
    fn test_save_request_shape() {
        let block = Block::from_paragraph(
            &ParagraphNode::new("p1").with_text("Hi"),
            Some(Place::parse("h").unwrap()),
        )
        .unwrap();
        let request = StoreRequest::from_operation(&DbOperation::save(&chapter(), block));

        assert_eq!(request.method(), "PUT");
        assert_eq!(request.path(), "/stories/s1/chapters/c1");
        let body = request.body();
        assert_eq!(body["blocks"][0]["key_id"], "p1");
        assert_eq!(body["blocks"][0]["place"], "h");
        assert_eq!(body["blocks"][0]["chunk"]["type"], "paragraph");
    }

    #[test]
    fn test_delete_request_carries_key_only() {
        let request =
            StoreRequest::from_operation(&DbOperation::delete(&chapter(), KeyId::from("p7")));

        assert_eq!(request.method(), "DELETE");
        assert_eq!(request.path(), "/stories/s1/chapters/c1/blocks");
        assert_eq!(
            request.body(),
            serde_json::json!({ "blocks": [{ "key_id": "p7" }] })
        );
    }

    #[test]
    fn test_order_request_shape() {
        let blocks = vec![
            Block::order(KeyId::from("b"), Place::parse("c").unwrap()),
            Block::order(KeyId::from("a"), Place::parse("m").unwrap()),
        ];
        let request = StoreRequest::from_operation(&DbOperation::sync_order(&chapter(), blocks));

        assert_eq!(request.path(), "/stories/s1/chapters/c1/order");
        assert_eq!(
            request.body(),
            serde_json::json!({
                "chapter_id": "c1",
                "blocks": [
                    { "key_id": "b", "place": "c" },
                    { "key_id": "a", "place": "m" }
                ]
            })
        );
    }
}
