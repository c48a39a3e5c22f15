//! Error types for the log index

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LsfError>;

#[derive(Error, Debug)]
pub enum LsfError {
    /// Record framing was lost mid-stream. Fatal for the whole log.
    #[error("Corrupt log at byte {offset}: {reason}")]
    CorruptLog { offset: u64, reason: String },

    /// Missing or unparsable schema resource. Callers fall back to the
    /// bundled schema.
    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    #[error("Unknown message type id: {0}")]
    UnknownType(u16),

    /// Payload does not match its schema, or the record runs past the end of
    /// the buffer.
    #[error("Malformed record at byte {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    /// Message values do not fit their definition when encoding.
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Record index out of range: {0}")]
    RecordOutOfRange(usize),

    #[error("Invalid index file: {0}")]
    InvalidIndexFile(String),

    #[error("No log file found in {0}")]
    NoLogFile(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LsfError {
    /// Stable error tag for callers that report failures by code.
    pub fn code(&self) -> &'static str {
        match self {
            LsfError::CorruptLog { .. } => "CORRUPT_LOG",
            LsfError::SchemaLoad(_) => "SCHEMA_LOAD",
            LsfError::UnknownType(_) => "UNKNOWN_TYPE",
            LsfError::MalformedRecord { .. } => "MALFORMED_RECORD",
            LsfError::Encode(_) => "ENCODE",
            LsfError::RecordOutOfRange(_) => "RECORD_OUT_OF_RANGE",
            LsfError::InvalidIndexFile(_) => "INVALID_INDEX_FILE",
            LsfError::NoLogFile(_) => "NO_LOG_FILE",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Whether the error concerns one record's payload only. Streams skip
    /// such records and carry on; any other error ends the stream.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            LsfError::MalformedRecord { .. } | LsfError::UnknownType(_)
        )
    }

    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        LsfError::CorruptLog {
            offset: offset as u64,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        LsfError::MalformedRecord {
            offset: offset as u64,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LsfError::corrupt(10, "bad sync").code(), "CORRUPT_LOG");
        assert_eq!(LsfError::UnknownType(7).code(), "UNKNOWN_TYPE");
        assert_eq!(LsfError::malformed(0, "short").code(), "MALFORMED_RECORD");
        let io = LsfError::from(std::io::Error::new(std::io::ErrorKind::Other, "x"));
        assert_eq!(io.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_record_local_errors() {
        assert!(LsfError::malformed(20, "CRC mismatch").is_record_local());
        assert!(LsfError::UnknownType(4242).is_record_local());
        assert!(!LsfError::corrupt(0, "bad sync").is_record_local());
        assert!(!LsfError::RecordOutOfRange(3).is_record_local());
    }

    #[test]
    fn test_error_display_includes_offset() {
        let err = LsfError::corrupt(1234, "bad sync number");
        assert_eq!(err.to_string(), "Corrupt log at byte 1234: bad sync number");
    }
}
