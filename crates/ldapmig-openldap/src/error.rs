//! Errors while reading a slapd.d tree.

use ldapmig_core::{LdifError, SchemaParseError};
use std::path::PathBuf;
use thiserror::Error;

/// Error while reading an OpenLDAP configuration directory.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A file or directory could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid LDIF.
    #[error("invalid LDIF in {}: {source}", path.display())]
    Ldif {
        path: PathBuf,
        #[source]
        source: LdifError,
    },

    /// A configuration file must hold exactly one entry.
    #[error("{} holds {count} entries, expected exactly one", path.display())]
    EntryCount { path: PathBuf, count: usize },

    /// A schema definition could not be parsed.
    #[error("invalid schema definition in {}: {source}: {definition}", path.display())]
    Schema {
        path: PathBuf,
        definition: String,
        #[source]
        source: SchemaParseError,
    },

    /// A required attribute is absent.
    #[error("{} has no {attribute}", path.display())]
    MissingAttribute { path: PathBuf, attribute: &'static str },

    /// An index declaration could not be read.
    #[error("invalid index declaration in {}: {value}", path.display())]
    InvalidIndex { path: PathBuf, value: String },
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            source,
        }
    }
}
