use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::{CheckCode, FIELD_FILENAME, FIELD_HASH, FIELD_INDEX, FIELD_SIZE};
use crate::types::CheckOutcome;

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Body of the check endpoint's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub code: CheckCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_num: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<CheckOutcome> for CheckResponse {
    fn from(outcome: CheckOutcome) -> Self {
        match outcome {
            CheckOutcome::Complete => Self {
                code: CheckCode::Complete,
                uploaded_size: None,
                start_num: None,
                message: Some("file already exists".into()),
            },
            CheckOutcome::Partial {
                uploaded_bytes,
                resume_index,
            } => Self {
                code: CheckCode::Partial,
                uploaded_size: Some(uploaded_bytes),
                start_num: Some(resume_index),
                message: None,
            },
            CheckOutcome::NotFound => Self {
                code: CheckCode::NotFound,
                uploaded_size: None,
                start_num: None,
                message: Some("file not found".into()),
            },
        }
    }
}

impl TryFrom<CheckResponse> for CheckOutcome {
    type Error = ProtocolError;

    fn try_from(resp: CheckResponse) -> Result<Self, Self::Error> {
        match resp.code {
            CheckCode::Complete => Ok(CheckOutcome::Complete),
            CheckCode::NotFound => Ok(CheckOutcome::NotFound),
            CheckCode::Partial => Ok(CheckOutcome::Partial {
                uploaded_bytes: resp
                    .uploaded_size
                    .ok_or(ProtocolError::MissingField("uploadedSize"))?,
                resume_index: resp
                    .start_num
                    .ok_or(ProtocolError::MissingField("startNum"))?,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk upload
// ---------------------------------------------------------------------------

/// Text fields of a multipart chunk upload (the payload travels as the
/// `file` part).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkForm {
    pub hash: String,
    pub index: u64,
    /// Payload length in bytes.
    pub size: u64,
    pub filename: String,
}

impl ChunkForm {
    /// Returns the text fields as `(name, value)` pairs in wire order.
    pub fn fields(&self) -> [(&'static str, String); 4] {
        [
            (FIELD_HASH, self.hash.clone()),
            (FIELD_INDEX, self.index.to_string()),
            (FIELD_SIZE, self.size.to_string()),
            (FIELD_FILENAME, self.filename.clone()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Body of the merge endpoint's response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResponse {
    pub message: String,
}

impl MergeResponse {
    pub fn merged(filename: &str) -> Self {
        Self {
            message: format!("{filename} merged successfully"),
        }
    }
}
