use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// `GET /upload/check/{filename}/{hash}/{size}`.
pub const CHECK_PATH: &str = "/upload/check";

/// `POST /upload/file` (multipart chunk upload).
pub const CHUNK_PATH: &str = "/upload/file";

/// `POST /upload/merge?filename=`.
pub const MERGE_PATH: &str = "/upload/merge";

/// Query parameter carrying the file name on merge.
pub const MERGE_QUERY_FILENAME: &str = "filename";

/// Multipart field names of a chunk upload.
pub const FIELD_HASH: &str = "hash";
pub const FIELD_INDEX: &str = "index";
pub const FIELD_SIZE: &str = "size";
pub const FIELD_FILENAME: &str = "filename";
pub const FIELD_FILE: &str = "file";

/// Numeric status codes returned by the check endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CheckCode {
    /// Some chunks are on the server; resume from `startNum`.
    Partial,
    /// Nothing is known about the file.
    NotFound,
    /// The final artifact exists.
    Complete,
}

impl CheckCode {
    pub const PARTIAL: u32 = 10001;
    pub const NOT_FOUND: u32 = 10002;
    pub const COMPLETE: u32 = 10003;

    pub fn as_u32(self) -> u32 {
        match self {
            CheckCode::Partial => Self::PARTIAL,
            CheckCode::NotFound => Self::NOT_FOUND,
            CheckCode::Complete => Self::COMPLETE,
        }
    }
}

impl TryFrom<u32> for CheckCode {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            Self::PARTIAL => Ok(CheckCode::Partial),
            Self::NOT_FOUND => Ok(CheckCode::NotFound),
            Self::COMPLETE => Ok(CheckCode::Complete),
            other => Err(ProtocolError::UnknownCode(other)),
        }
    }
}

impl From<CheckCode> for u32 {
    fn from(code: CheckCode) -> Self {
        code.as_u32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&CheckCode::Partial).unwrap(), "10001");
        assert_eq!(serde_json::to_string(&CheckCode::NotFound).unwrap(), "10002");
        assert_eq!(serde_json::to_string(&CheckCode::Complete).unwrap(), "10003");
    }

    #[test]
    fn unknown_code_rejected() {
        assert!(matches!(
            CheckCode::try_from(200),
            Err(ProtocolError::UnknownCode(200))
        ));
        assert!(serde_json::from_str::<CheckCode>("10004").is_err());
    }
}
