//! Directory service migration engine.
//!
//! Plans and executes the migration of a directory deployment (schema,
//! databases, indexes, overlays and data) onto a live target service.
//!
//! - [`schema`]: attribute type and object class model, RFC 4512 parser
//! - [`source`]: the parsed source deployment
//! - [`target`]: the accessor contract a target implements
//! - [`migration`]: plan generation and two-pass execution
//! - [`ldif`]: LDIF reading and writing
//! - [`memory`]: in-memory target with JSON snapshots

pub mod ldif;
pub mod memory;
pub mod migration;
pub mod schema;
pub mod source;
pub mod target;

pub use ldif::{LdifError, LdifReader, LdifRecord, LdifWriter};
pub use memory::{InMemoryTarget, TargetSnapshot};
pub use migration::{
    ExecutionJournal, ExecutionResult, ExecutorConfig, MigrationAction, MigrationError,
    MigrationExecutor, MigrationOptions, MigrationPlan,
};
pub use schema::{
    parse_attribute_type, parse_object_class, AttributeType, ClassKind, ObjectClass, Resolver,
    SchemaElement, SchemaParseError,
};
pub use source::{Database, IndexDecl, IndexKind, Overlay, OverlayKind, SourceConfig};
pub use target::{Backend, Plugin, ServerTask, TargetAccessor, TargetError, TaskKind, UniquenessConfig};
