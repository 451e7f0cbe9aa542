//! Error taxonomy shared across the ingest and query paths

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    /// Bad user input: unknown language, malformed cursor, write query on the
    /// read-only surface.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A file record, AST node, or file version that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Two distinct children claimed the same ordinal under one parent.
    /// Fatal for the current ingest; the transaction is rolled back.
    #[error("ordering conflict: parent {parent} already has a child at index {child_index}")]
    OrderingConflict { parent: i64, child_index: usize },

    /// Storage-level failure: connection, timeout, unexpected constraint.
    #[error("backend failure: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GraphError::Backend(_) | GraphError::Io(_))
    }
}
