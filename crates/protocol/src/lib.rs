//! Wire types shared by the ferryload client engine and the chunk store.
//!
//! The HTTP shape mirrors the reference deployment:
//!
//! ```text
//! GET  /upload/check/{filename}/{hash}/{size}
//!        -> {"code":10002}                                  not found
//!        -> {"code":10001,"uploadedSize":N,"startNum":K}    partial
//!        -> {"code":10003}                                  complete
//! POST /upload/file            multipart: hash, index, size, filename, file
//! POST /upload/merge?filename= -> {"message": "..."}
//! ```

pub mod constants;
pub mod messages;
pub mod types;

pub use constants::CheckCode;
pub use messages::{CheckResponse, ChunkForm, MergeResponse};
pub use types::{CheckOutcome, FileIdentity};

/// Errors produced while decoding wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown check code: {0}")]
    UnknownCode(u32),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
