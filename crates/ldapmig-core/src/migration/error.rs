//! Migration-specific error types.

use crate::ldif::LdifError;
use crate::target::TargetError;
use thiserror::Error;

/// Executor pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Perform each change.
    Apply,
    /// Finalize and validate once every change is applied.
    Post,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Apply => write!(f, "apply"),
            Pass::Post => write!(f, "post"),
        }
    }
}

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The target accessor failed.
    #[error("target error: {0}")]
    Target(#[from] TargetError),

    /// More than one target object class shares an oid. The target schema
    /// was loaded incorrectly; generation cannot continue.
    #[error("{count} target object classes share oid {oid}")]
    AmbiguousObjectClass {
        /// The shared oid.
        oid: String,
        /// Number of target classes carrying it.
        count: usize,
    },

    /// An action failed during execution.
    #[error("{pass} pass failed at action {index} ({description}): {message}")]
    ActionFailed {
        /// Pass that was running.
        pass: Pass,
        /// Position of the action in the plan.
        index: usize,
        /// One-line action description.
        description: String,
        /// Underlying error.
        message: String,
    },

    /// A post-condition did not hold after the apply pass.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Data file error.
    #[error("ldif error: {0}")]
    Ldif(#[from] LdifError),

    /// IO error while staging data.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal storage error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}
