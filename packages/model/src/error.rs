use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("{node} node is missing its identity")]
    MissingIdentity { node: &'static str },

    #[error("Block {0} has no chunk")]
    MissingChunk(String),

    #[error("Unexpected node: expected {expected}, found {found}")]
    UnexpectedNode {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Invalid place key: {0:?}")]
    InvalidPlace(String),

    #[error("Malformed chunk: {0}")]
    MalformedChunk(String),
}

impl ModelError {
    pub fn missing_identity(node: &'static str) -> Self {
        Self::MissingIdentity { node }
    }

    pub fn unexpected_node(expected: &'static str, found: &'static str) -> Self {
        Self::UnexpectedNode { expected, found }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::MalformedChunk(e.to_string())
    }
}
