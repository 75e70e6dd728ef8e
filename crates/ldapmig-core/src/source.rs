//! Source deployment model.
//!
//! An already-parsed, read-only view of the deployment being migrated:
//! schema, databases with their indexes, and the overlays attached to each
//! database. Parsers for vendor configuration formats produce this model.

use crate::schema::{AttributeType, ObjectClass};
use serde::{Deserialize, Serialize};

/// Kind of index maintained for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// Equality (`eq`).
    Equality,
    /// Presence (`pres`).
    Presence,
    /// Substring (`sub`).
    Substring,
    /// Approximate (`approx`).
    Approximate,
}

impl IndexKind {
    /// Parse a vendor index keyword. The substring variants (`subinitial`,
    /// `subany`, `subfinal`) all map to `Substring`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "eq" | "equality" => Some(IndexKind::Equality),
            "pres" | "presence" => Some(IndexKind::Presence),
            "sub" | "subinitial" | "subany" | "subfinal" | "substr" => Some(IndexKind::Substring),
            "approx" => Some(IndexKind::Approximate),
            _ => None,
        }
    }

    /// Short keyword used in rendering.
    pub fn keyword(&self) -> &'static str {
        match self {
            IndexKind::Equality => "eq",
            IndexKind::Presence => "pres",
            IndexKind::Substring => "sub",
            IndexKind::Approximate => "approx",
        }
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// An index declaration: one attribute and the kinds maintained for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDecl {
    /// Indexed attribute.
    pub attribute: String,
    /// Index kinds, in declaration order.
    pub kinds: Vec<IndexKind>,
}

impl IndexDecl {
    /// Create an index declaration.
    pub fn new(attribute: impl Into<String>, kinds: impl IntoIterator<Item = IndexKind>) -> Self {
        Self {
            attribute: attribute.into(),
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for IndexDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&str> = self.kinds.iter().map(IndexKind::keyword).collect();
        write!(f, "{},{}", self.attribute, kinds.join(","))
    }
}

/// Overlay type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    MemberOf,
    ReferentialIntegrity,
    AttributeUniqueness,
    Unknown,
}

impl std::fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayKind::MemberOf => write!(f, "memberof"),
            OverlayKind::ReferentialIntegrity => write!(f, "refint"),
            OverlayKind::AttributeUniqueness => write!(f, "unique"),
            OverlayKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for OverlayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memberof" => Ok(OverlayKind::MemberOf),
            "refint" | "referentialintegrity" => Ok(OverlayKind::ReferentialIntegrity),
            "unique" | "attributeuniqueness" => Ok(OverlayKind::AttributeUniqueness),
            "unknown" => Ok(OverlayKind::Unknown),
            other => Err(format!("unknown overlay kind '{}'", other)),
        }
    }
}

/// An overlay attached to a source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Overlay {
    /// Group membership back-links. `attributes` holds the group member
    /// attribute(s) the overlay follows.
    MemberOf { attributes: Vec<String> },
    /// Referential integrity for the listed DN-valued attributes.
    ReferentialIntegrity { attributes: Vec<String> },
    /// Uniqueness enforcement for the listed attributes.
    AttributeUniqueness { attributes: Vec<String> },
    /// Anything without an automated equivalent on the target.
    Unknown {
        name: String,
        object_classes: Vec<String>,
    },
}

impl Overlay {
    /// Type tag of this overlay.
    pub fn kind(&self) -> OverlayKind {
        match self {
            Overlay::MemberOf { .. } => OverlayKind::MemberOf,
            Overlay::ReferentialIntegrity { .. } => OverlayKind::ReferentialIntegrity,
            Overlay::AttributeUniqueness { .. } => OverlayKind::AttributeUniqueness,
            Overlay::Unknown { .. } => OverlayKind::Unknown,
        }
    }

    /// Configured attributes; empty for unknown overlays.
    pub fn attributes(&self) -> &[String] {
        match self {
            Overlay::MemberOf { attributes }
            | Overlay::ReferentialIntegrity { attributes }
            | Overlay::AttributeUniqueness { attributes } => attributes,
            Overlay::Unknown { .. } => &[],
        }
    }
}

/// A source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    /// Suffix DN, unique across the deployment.
    pub suffix: String,
    /// Opaque stable identifier.
    pub identifier: String,
    /// Index declarations in source order.
    pub indexes: Vec<IndexDecl>,
    /// Overlays in source order.
    pub overlays: Vec<Overlay>,
}

impl Database {
    /// Create a database with no indexes or overlays.
    pub fn new(suffix: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            identifier: identifier.into(),
            indexes: Vec::new(),
            overlays: Vec::new(),
        }
    }

    /// Add an index declaration.
    pub fn with_index(mut self, index: IndexDecl) -> Self {
        self.indexes.push(index);
        self
    }

    /// Add an overlay.
    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlays.push(overlay);
        self
    }

    /// Backend name on the target: the identifier reduced to alphanumerics.
    /// Backend names on the target are restricted to `[A-Za-z0-9]`; an
    /// identifier with no usable characters falls back to the suffix.
    pub fn backend_name(&self) -> String {
        let alnum = |s: &str| -> String { s.chars().filter(|c| c.is_ascii_alphanumeric()).collect() };
        let name = alnum(&self.identifier);
        if name.is_empty() {
            alnum(&self.suffix)
        } else {
            name
        }
    }
}

/// The complete source deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Attribute types in source order.
    pub attributes: Vec<AttributeType>,
    /// Object classes in source order.
    pub classes: Vec<ObjectClass>,
    /// Databases in source order.
    pub databases: Vec<Database>,
}

impl SourceConfig {
    /// Create an empty source config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute type.
    pub fn with_attribute(mut self, attr: AttributeType) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Add an object class.
    pub fn with_class(mut self, class: ObjectClass) -> Self {
        self.classes.push(class);
        self
    }

    /// Add a database.
    pub fn with_database(mut self, database: Database) -> Self {
        self.databases.push(database);
        self
    }

    /// Find a database by suffix (case-insensitive).
    pub fn database(&self, suffix: &str) -> Option<&Database> {
        self.databases
            .iter()
            .find(|db| db.suffix.eq_ignore_ascii_case(suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_kind_keywords() {
        assert_eq!(IndexKind::from_keyword("EQ"), Some(IndexKind::Equality));
        assert_eq!(IndexKind::from_keyword("subinitial"), Some(IndexKind::Substring));
        assert_eq!(IndexKind::from_keyword("nolang"), None);
        assert_eq!(IndexKind::Presence.to_string(), "pres");
    }

    #[test]
    fn test_index_decl_display() {
        let decl = IndexDecl::new("uid", [IndexKind::Equality, IndexKind::Substring]);
        assert_eq!(decl.to_string(), "uid,eq,sub");
    }

    #[test]
    fn test_overlay_kind() {
        let overlay = Overlay::ReferentialIntegrity {
            attributes: vec!["member".into()],
        };
        assert_eq!(overlay.kind(), OverlayKind::ReferentialIntegrity);
        assert_eq!(overlay.attributes(), ["member".to_string()]);

        let unknown = Overlay::Unknown {
            name: "{3}syncprov".into(),
            object_classes: vec!["olcSyncProvConfig".into()],
        };
        assert!(unknown.attributes().is_empty());
        assert_eq!("refint".parse::<OverlayKind>(), Ok(OverlayKind::ReferentialIntegrity));
        assert!("ppolicy".parse::<OverlayKind>().is_err());
    }

    #[test]
    fn test_backend_name() {
        let db = Database::new("dc=example,dc=com", "8f0a5c2e-1b3d-4c5e-9f7a-0123456789ab");
        assert_eq!(db.backend_name(), "8f0a5c2e1b3d4c5e9f7a0123456789ab");

        let db = Database::new("dc=x", "{1}mdb");
        assert_eq!(db.backend_name(), "1mdb");
    }

    #[test]
    fn test_database_lookup() {
        let config = SourceConfig::new().with_database(Database::new("dc=Example,dc=com", "a"));
        assert!(config.database("dc=example,dc=com").is_some());
        assert!(config.database("dc=example,dc=net").is_none());
    }
}
