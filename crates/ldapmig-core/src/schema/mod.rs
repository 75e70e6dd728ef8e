//! Directory schema model.
//!
//! Attribute types and object classes are identified by their numeric oid.
//! Names are case-insensitive aliases and are never used as a matching key:
//! vendors disagree on casing and alias sets for the same element.

pub mod attribute;
pub mod class;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolver;

pub use attribute::AttributeType;
pub use class::{ClassKind, ObjectClass};
pub use error::SchemaParseError;
pub use parser::{parse_attribute_type, parse_object_class};
pub use resolver::Resolver;

use lexer::escape_qdstring;

/// Behaviour shared by attribute types and object classes.
pub trait SchemaElement {
    /// Numeric object identifier, the identity key.
    fn oid(&self) -> &str;

    /// Aliases in declaration order.
    fn names(&self) -> &[String];

    /// RFC 4512 definition string.
    fn definition(&self) -> String;

    /// First declared name, or the oid when there is none.
    fn primary_name(&self) -> &str {
        self.names()
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| self.oid())
    }

    /// Case-insensitive name membership.
    fn has_name(&self, name: &str) -> bool {
        self.names().iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// `oid (name, alias)` label used in plan rendering.
    fn label(&self) -> String {
        format!("{} ({})", self.oid(), self.names().join(", "))
    }
}

/// Strip the `{n}` ordering prefix OpenLDAP puts in front of values of
/// ordered attributes such as `olcAttributeTypes`.
pub fn strip_ordering_prefix(value: &str) -> &str {
    let trimmed = value.trim_start();
    if let Some(rest) = trimmed.strip_prefix('{') {
        if let Some(close) = rest.find('}') {
            if rest[..close].chars().all(|c| c.is_ascii_digit() || c == '-') {
                return &rest[close + 1..];
            }
        }
    }
    trimmed
}

/// Syntax oid without its length bound.
pub fn syntax_oid(syntax: &str) -> &str {
    match syntax.find('{') {
        Some(pos) => &syntax[..pos],
        None => syntax,
    }
}

fn render_names(names: &[String]) -> String {
    match names {
        [single] => format!("'{}'", escape_qdstring(single)),
        _ => {
            let quoted: Vec<String> = names
                .iter()
                .map(|n| format!("'{}'", escape_qdstring(n)))
                .collect();
            format!("( {} )", quoted.join(" "))
        }
    }
}

fn render_oids(oids: &[String]) -> String {
    match oids {
        [single] => single.clone(),
        _ => format!("( {} )", oids.join(" $ ")),
    }
}

fn render_extensions(out: &mut String, extensions: &[(String, Vec<String>)]) {
    for (name, values) in extensions {
        out.push_str(&format!(" {} {}", name, render_names(values)));
    }
}
