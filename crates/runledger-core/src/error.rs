//! Error taxonomy for task invocation.
//!
//! Every failure an adapter can surface to its caller is one of these variants.
//! None of them are recovered inside the core; they propagate out of
//! `invoke` / `invoke_returning_run` unchanged.

use thiserror::Error;

/// Errors produced while validating, dispatching, recording or persisting a run.
#[derive(Debug, Error)]
pub enum Error {
    /// A declared schema string is not valid JSON, fails JSON Schema
    /// meta-validation, or is not a `type: object` schema with `properties`.
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),

    /// The caller supplied plain text where the task's input schema requires
    /// structured data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A structured value failed validation against a well-formed schema.
    #[error("{0}")]
    SchemaViolation(String),

    /// The backend returned structured data for a plaintext task or the reverse.
    #[error("unexpected output shape: {0}")]
    UnexpectedOutputShape(String),

    /// The concrete adapter's call to its backend failed.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// A provider identifier could not be mapped to a concrete backend.
    #[error("provider resolution failed: {0}")]
    ProviderResolution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_displays_message_verbatim() {
        let err = Error::SchemaViolation("x is not an integer".into());
        assert_eq!(err.to_string(), "x is not an integer");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
