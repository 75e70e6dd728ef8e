//! Object class definitions.

use super::lexer::escape_qdstring;
use super::resolver::Resolver;
use super::{render_extensions, render_names, render_oids, SchemaElement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of an object class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClassKind {
    /// Abstract class (e.g. `top`).
    Abstract,
    /// Structural class. The default when no kind keyword is present.
    #[default]
    Structural,
    /// Auxiliary class.
    Auxiliary,
}

impl std::fmt::Display for ClassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassKind::Abstract => write!(f, "ABSTRACT"),
            ClassKind::Structural => write!(f, "STRUCTURAL"),
            ClassKind::Auxiliary => write!(f, "AUXILIARY"),
        }
    }
}

/// An object class definition (RFC 4512 `ObjectClassDescription`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectClass {
    /// Numeric object identifier.
    pub oid: String,
    /// Case-insensitive aliases, never empty.
    pub names: Vec<String>,
    /// Free-text description.
    pub desc: Option<String>,
    /// Marked obsolete.
    pub obsolete: bool,
    /// Superior classes.
    pub sup: Vec<String>,
    /// Class kind.
    pub kind: ClassKind,
    /// Mandatory attributes.
    pub must: Vec<String>,
    /// Optional attributes.
    pub may: Vec<String>,
    /// `X-` extensions in declaration order.
    pub extensions: Vec<(String, Vec<String>)>,
}

impl ObjectClass {
    /// Create a structural class with a single name.
    pub fn new(oid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            names: vec![name.into()],
            desc: None,
            obsolete: false,
            sup: Vec::new(),
            kind: ClassKind::default(),
            must: Vec::new(),
            may: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Add another alias.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Add a superior class.
    pub fn with_sup(mut self, sup: impl Into<String>) -> Self {
        self.sup.push(sup.into());
        self
    }

    /// Set the kind.
    pub fn with_kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add mandatory attributes.
    pub fn with_must<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must.extend(attrs.into_iter().map(Into::into));
        self
    }

    /// Add optional attributes.
    pub fn with_may<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.may.extend(attrs.into_iter().map(Into::into));
        self
    }

    /// Compare the semantically meaningful parts of two class definitions
    /// that share an oid.
    ///
    /// Superiors and MUST and MAY membership are compared through
    /// `resolver`, so `mail` and `rfc822Mailbox` count as the same
    /// attribute and `SUP person` matches `SUP 2.5.6.6`. `SUP top` and a
    /// missing SUP are equivalent.
    pub fn inconsistent(&self, other: &ObjectClass, resolver: &Resolver) -> bool {
        self.kind != other.kind
            || superiors(&self.sup, resolver) != superiors(&other.sup, resolver)
            || resolver.resolve_set(&self.must) != resolver.resolve_set(&other.must)
            || resolver.resolve_set(&self.may) != resolver.resolve_set(&other.may)
    }
}

fn superiors(sup: &[String], resolver: &Resolver) -> BTreeSet<String> {
    sup.iter()
        .map(|s| resolver.resolve_class(s))
        .filter(|s| s != "top" && s != "2.5.6.0")
        .collect()
}

impl SchemaElement for ObjectClass {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn names(&self) -> &[String] {
        &self.names
    }

    fn definition(&self) -> String {
        let mut out = format!("( {} NAME {}", self.oid, render_names(&self.names));

        if let Some(desc) = &self.desc {
            out.push_str(&format!(" DESC '{}'", escape_qdstring(desc)));
        }
        if self.obsolete {
            out.push_str(" OBSOLETE");
        }
        if !self.sup.is_empty() {
            out.push_str(&format!(" SUP {}", render_oids(&self.sup)));
        }
        out.push_str(&format!(" {}", self.kind));
        if !self.must.is_empty() {
            out.push_str(&format!(" MUST {}", render_oids(&self.must)));
        }
        if !self.may.is_empty() {
            out.push_str(&format!(" MAY {}", render_oids(&self.may)));
        }
        render_extensions(&mut out, &self.extensions);

        out.push_str(" )");
        out
    }
}
