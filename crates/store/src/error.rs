//! Error types for the chunk store.

/// Errors produced by the chunk store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("nothing uploaded for {0}")]
    NotFound(String),

    #[error("chunk {missing} of {name} is missing")]
    Gap { name: String, missing: u64 },

    #[error("chunk {index} of {name}: expected {expected} bytes, received {actual}")]
    SizeMismatch {
        name: String,
        index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("metadata error: {0}")]
    Meta(#[from] serde_json::Error),
}
