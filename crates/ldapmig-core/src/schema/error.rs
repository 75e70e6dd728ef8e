//! Schema definition parse errors.

use thiserror::Error;

/// Error while reading an attribute type or object class definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at offset {offset})")]
pub struct SchemaParseError {
    /// The error message.
    pub message: String,
    /// Byte offset in the definition where the error occurred.
    pub offset: usize,
}

impl SchemaParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}
