//! Target directory service accessor contract.
//!
//! The migration engine never speaks the management protocol itself. It
//! drives a [`TargetAccessor`], which a protocol client (or the in-memory
//! target used for rehearsals and tests) implements.

use crate::schema::{AttributeType, ObjectClass};
use crate::source::IndexDecl;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors reported by a target accessor.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The requested backend, index, plugin or schema element does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The element or value is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A server-side task finished unsuccessfully.
    #[error("task {task} failed with exit code {exit_code}")]
    TaskFailed {
        /// Task identifier.
        task: String,
        /// Exit code reported by the server.
        exit_code: i32,
    },

    /// Any other protocol or server failure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Target snapshot could not be encoded or decoded.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl TargetError {
    /// Whether this is the distinct not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TargetError::NotFound(_))
    }

    /// Whether this is the distinct already-present condition.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, TargetError::AlreadyExists(_))
    }
}

/// Treat "already exists" as success. Returns `Ok(false)` when the value
/// was already present.
pub fn tolerate_existing(result: Result<(), TargetError>) -> Result<bool, TargetError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

/// A backend (storage unit rooted at a suffix) on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Backend name.
    pub name: String,
    /// Suffix DN.
    pub suffix: String,
}

/// Target plugins the migration configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Plugin {
    MemberOf,
    ReferentialIntegrity,
    AttributeUniqueness,
}

impl Plugin {
    /// Referential integrity: attributes whose DN values are maintained.
    pub const REFINT_MEMBERSHIP_ATTRIBUTE: &'static str = "referint-membership-attribute";
    /// Referential integrity: update delay in seconds, 0 is synchronous.
    pub const REFINT_UPDATE_DELAY: &'static str = "referint-update-delay";

    /// Plugin entry common name on the target.
    pub fn cn(&self) -> &'static str {
        match self {
            Plugin::MemberOf => "MemberOf Plugin",
            Plugin::ReferentialIntegrity => "referential integrity postoperation",
            Plugin::AttributeUniqueness => "attribute uniqueness",
        }
    }

    /// Attribute holding the plugin's entry scope.
    pub fn scope_attribute(&self) -> &'static str {
        match self {
            Plugin::MemberOf => "memberOfEntryScope",
            Plugin::ReferentialIntegrity => "nsslapd-pluginEntryScope",
            Plugin::AttributeUniqueness => "uniqueness-subtrees",
        }
    }
}

impl std::fmt::Display for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cn())
    }
}

/// One attribute uniqueness plugin instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessConfig {
    /// Instance name, unique across the target.
    pub name: String,
    /// Attribute whose values must be unique.
    pub attribute: String,
    /// Subtree the constraint applies to.
    pub subtree: String,
}

/// Kind of an asynchronous server-side task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Reindex,
    MemberOfFixup,
    Import,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Reindex => write!(f, "reindex"),
            TaskKind::MemberOfFixup => write!(f, "memberof fixup"),
            TaskKind::Import => write!(f, "import"),
        }
    }
}

/// Handle to a server-side task that can be waited on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTask {
    /// Task identifier on the server.
    pub id: String,
    /// What the task does.
    pub kind: TaskKind,
}

/// Query and mutation interface of a live target directory service.
///
/// Methods take `&self`: implementations are handles to a remote service
/// and manage their own interior state.
pub trait TargetAccessor {
    /// All attribute types the target knows.
    fn attribute_types(&self) -> Result<Vec<AttributeType>, TargetError>;

    /// All object classes the target knows.
    fn object_classes(&self) -> Result<Vec<ObjectClass>, TargetError>;

    /// The backend serving `suffix`. Must return [`TargetError::NotFound`]
    /// when there is none, distinct from any other failure.
    fn backend(&self, suffix: &str) -> Result<Backend, TargetError>;

    /// Create a backend.
    fn create_backend(&self, name: &str, suffix: &str) -> Result<Backend, TargetError>;

    /// Index definitions configured on a backend.
    fn indexes(&self, backend: &Backend) -> Result<Vec<IndexDecl>, TargetError>;

    /// Add an index definition.
    fn add_index(&self, backend: &Backend, index: &IndexDecl) -> Result<(), TargetError>;

    /// Start rebuilding every index of a backend.
    fn reindex(&self, backend: &Backend) -> Result<ServerTask, TargetError>;

    /// Add an attribute type to the schema.
    fn add_attribute_type(&self, attr: &AttributeType) -> Result<(), TargetError>;

    /// Add an object class to the schema.
    fn add_object_class(&self, class: &ObjectClass) -> Result<(), TargetError>;

    /// Enable a plugin. May only take effect after a restart.
    fn enable_plugin(&self, plugin: Plugin) -> Result<(), TargetError>;

    /// Whether a plugin is enabled and active.
    fn plugin_enabled(&self, plugin: Plugin) -> Result<bool, TargetError>;

    /// Replace a single-valued plugin setting.
    fn set_plugin_attribute(&self, plugin: Plugin, attr: &str, value: &str) -> Result<(), TargetError>;

    /// Add a value to a multi-valued plugin setting. Returns
    /// [`TargetError::AlreadyExists`] when the value is present.
    fn add_plugin_value(&self, plugin: Plugin, attr: &str, value: &str) -> Result<(), TargetError>;

    /// Add `suffix` to the plugin's entry scope. Returns
    /// [`TargetError::AlreadyExists`] when it is already in scope.
    fn add_plugin_scope(&self, plugin: Plugin, suffix: &str) -> Result<(), TargetError>;

    /// Start a memberOf fixup task over `suffix`.
    fn memberof_fixup(&self, suffix: &str) -> Result<ServerTask, TargetError>;

    /// Create an attribute uniqueness plugin instance.
    fn create_uniqueness_plugin(&self, config: &UniquenessConfig) -> Result<(), TargetError>;

    /// Start a bulk import of an LDIF file into a backend.
    fn import_ldif(&self, backend: &Backend, path: &Path) -> Result<ServerTask, TargetError>;

    /// Block until a task completes. Returns [`TargetError::TaskFailed`]
    /// when it completed unsuccessfully.
    fn wait_task(&self, task: &ServerTask) -> Result<(), TargetError>;

    /// Restart the service.
    fn restart(&self) -> Result<(), TargetError>;
}
