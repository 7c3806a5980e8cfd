//! Error types for the store protocol

use storyloom_model::KeyId;
use thiserror::Error;

/// The store refused a request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Block {0} has no chunk")]
    MissingChunk(KeyId),

    #[error("Block has an empty key")]
    MissingKey,

    #[error("Order body is for chapter {found}, request path is {expected}")]
    ChapterMismatch { expected: String, found: String },
}

impl StoreError {
    /// HTTP status the dev server answers with
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::MissingChunk(_) | StoreError::MissingKey => 422,
            StoreError::ChapterMismatch { .. } => 400,
        }
    }
}

/// A send did not reach an accepting store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Store responded {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Request rejected: {0}")]
    Rejected(#[from] StoreError),
}

pub type TransportResult<T> = Result<T, TransportError>;
