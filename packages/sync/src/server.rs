//! HTTP front for [`InMemoryStore`], for running a browser host locally.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storyloom_model::{Block, ChapterRef};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::StoreError;
use crate::memory::InMemoryStore;
use crate::store::{DeleteBody, OrderBody, SaveBody, StoreRequest, StoreResponse};

pub type SharedStore = Arc<InMemoryStore>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterResponse {
    pub blocks: Vec<Block>,
}

struct ApiError(StoreError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/stories/:story_id/chapters/:chapter_id",
            get(load_chapter).put(save_blocks),
        )
        .route(
            "/stories/:story_id/chapters/:chapter_id/blocks",
            delete(delete_blocks),
        )
        .route(
            "/stories/:story_id/chapters/:chapter_id/order",
            put(sync_order),
        )
        .with_state(store)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process is stopped
pub async fn serve(addr: impl ToSocketAddrs, store: SharedStore) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Store server listening");
    axum::serve(listener, router(store)).await
}

async fn load_chapter(
    State(store): State<SharedStore>,
    Path((story_id, chapter_id)): Path<(String, String)>,
) -> Json<ChapterResponse> {
    let blocks = store.chapter_blocks(&ChapterRef::new(story_id, chapter_id));
    Json(ChapterResponse { blocks })
}

async fn save_blocks(
    State(store): State<SharedStore>,
    Path((story_id, chapter_id)): Path<(String, String)>,
    Json(body): Json<SaveBody>,
) -> Result<Json<StoreResponse>, ApiError> {
    let request = StoreRequest::Save {
        story_id,
        chapter_id,
        body,
    };
    store.apply(&request).map(Json).map_err(ApiError)
}

async fn delete_blocks(
    State(store): State<SharedStore>,
    Path((story_id, chapter_id)): Path<(String, String)>,
    Json(body): Json<DeleteBody>,
) -> Result<Json<StoreResponse>, ApiError> {
    let request = StoreRequest::Delete {
        story_id,
        chapter_id,
        body,
    };
    store.apply(&request).map(Json).map_err(ApiError)
}

async fn sync_order(
    State(store): State<SharedStore>,
    Path((story_id, chapter_id)): Path<(String, String)>,
    Json(body): Json<OrderBody>,
) -> Result<Json<StoreResponse>, ApiError> {
    let request = StoreRequest::SyncOrder {
        story_id,
        chapter_id,
        body,
    };
    store.apply(&request).map(Json).map_err(ApiError)
}
