//! OpenLDAP `slapd.d` reader.
//!
//! Turns a cn=config directory tree into the source model consumed by
//! `ldapmig-core` plan generation.
//!
//! ```ignore
//! let source = ldapmig_openldap::load_source("/etc/openldap/slapd.d")?;
//! let plan = MigrationPlan::generate(&source, &target, &MigrationOptions::default())?;
//! ```

pub mod error;
pub mod parser;

pub use error::SourceError;
pub use parser::{load_source, SlapdConfig};
