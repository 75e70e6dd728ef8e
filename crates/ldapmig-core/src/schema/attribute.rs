//! Attribute type definitions.

use super::lexer::escape_qdstring;
use super::{render_names, syntax_oid, SchemaElement};
use serde::{Deserialize, Serialize};

/// An attribute type definition (RFC 4512 `AttributeTypeDescription`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeType {
    /// Numeric object identifier.
    pub oid: String,
    /// Case-insensitive aliases, never empty.
    pub names: Vec<String>,
    /// Free-text description.
    pub desc: Option<String>,
    /// Marked obsolete.
    pub obsolete: bool,
    /// Superior attribute type.
    pub sup: Option<String>,
    /// Equality matching rule.
    pub equality: Option<String>,
    /// Ordering matching rule.
    pub ordering: Option<String>,
    /// Substring matching rule.
    pub substr: Option<String>,
    /// Syntax oid, possibly with a length bound (`...15{256}`).
    pub syntax: Option<String>,
    /// Restricted to a single value.
    pub single_value: bool,
    /// Collective attribute.
    pub collective: bool,
    /// Not modifiable by clients.
    pub no_user_modification: bool,
    /// Usage (`userApplications`, `directoryOperation`, ...).
    pub usage: Option<String>,
    /// `X-` extensions in declaration order.
    pub extensions: Vec<(String, Vec<String>)>,
}

impl AttributeType {
    /// Create an attribute type with a single name and no other properties.
    pub fn new(oid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            names: vec![name.into()],
            desc: None,
            obsolete: false,
            sup: None,
            equality: None,
            ordering: None,
            substr: None,
            syntax: None,
            single_value: false,
            collective: false,
            no_user_modification: false,
            usage: None,
            extensions: Vec::new(),
        }
    }

    /// Add another alias.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Set the description.
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Set the superior type.
    pub fn with_sup(mut self, sup: impl Into<String>) -> Self {
        self.sup = Some(sup.into());
        self
    }

    /// Set the syntax.
    pub fn with_syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }

    /// Set the equality matching rule.
    pub fn with_equality(mut self, rule: impl Into<String>) -> Self {
        self.equality = Some(rule.into());
        self
    }

    /// Mark single-valued.
    pub fn single_valued(mut self) -> Self {
        self.single_value = true;
        self
    }

    /// Compare the semantically meaningful parts of two definitions that
    /// share an oid.
    ///
    /// Names, description, obsolescence and extensions are cosmetic. The
    /// syntax length bound is advisory and ignored. Syntax and matching
    /// rules are only compared when both sides declare one: a type that
    /// omits them inherits them from its superior.
    pub fn inconsistent(&self, other: &AttributeType) -> bool {
        let syntax_differs = match (&self.syntax, &other.syntax) {
            (Some(a), Some(b)) => syntax_oid(a) != syntax_oid(b),
            _ => false,
        };

        let sup_differs = match (&self.sup, &other.sup) {
            (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
            (None, None) => false,
            _ => true,
        };

        let equality_differs = match (&self.equality, &other.equality) {
            (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
            _ => false,
        };

        syntax_differs || sup_differs || equality_differs || self.single_value != other.single_value
    }
}

impl SchemaElement for AttributeType {
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
        if let Some(sup) = &self.sup {
            out.push_str(&format!(" SUP {}", sup));
        }
        if let Some(rule) = &self.equality {
            out.push_str(&format!(" EQUALITY {}", rule));
        }
        if let Some(rule) = &self.ordering {
            out.push_str(&format!(" ORDERING {}", rule));
        }
        if let Some(rule) = &self.substr {
            out.push_str(&format!(" SUBSTR {}", rule));
        }
        if let Some(syntax) = &self.syntax {
            out.push_str(&format!(" SYNTAX {}", syntax));
        }
        if self.single_value {
            out.push_str(" SINGLE-VALUE");
        }
        if self.collective {
            out.push_str(" COLLECTIVE");
        }
        if self.no_user_modification {
            out.push_str(" NO-USER-MODIFICATION");
        }
        if let Some(usage) = &self.usage {
            out.push_str(&format!(" USAGE {}", usage));
        }
        super::render_extensions(&mut out, &self.extensions);

        out.push_str(" )");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.15";

    fn mail() -> AttributeType {
        AttributeType::new("0.9.2342.19200300.100.1.3", "mail")
            .with_name("rfc822Mailbox")
            .with_equality("caseIgnoreIA5Match")
            .with_syntax("1.3.6.1.4.1.1466.115.121.1.26{256}")
    }

    #[test]
    fn test_identical_is_consistent() {
        assert!(!mail().inconsistent(&mail()));
    }

    #[test]
    fn test_cosmetic_differences_ignored() {
        let mut other = mail();
        other.names = vec!["MAIL".to_string()];
        other.desc = Some("RFC1274: RFC822 Mailbox".to_string());
        other.extensions = vec![("X-ORIGIN".to_string(), vec!["RFC 4524".to_string()])];
        assert!(!mail().inconsistent(&other));
    }

    #[test]
    fn test_syntax_length_bound_ignored() {
        let mut other = mail();
        other.syntax = Some("1.3.6.1.4.1.1466.115.121.1.26".to_string());
        assert!(!mail().inconsistent(&other));
    }

    #[test]
    fn test_syntax_change_is_inconsistent() {
        let mut other = mail();
        other.syntax = Some(DIRECTORY_STRING.to_string());
        assert!(mail().inconsistent(&other));
    }

    #[test]
    fn test_inherited_syntax_is_tolerated() {
        let openldap = AttributeType::new("2.5.4.3", "cn")
            .with_name("commonName")
            .with_desc("RFC4519: common name(s)")
            .with_sup("name");
        let dirsrv = AttributeType::new("2.5.4.3", "cn")
            .with_name("commonName")
            .with_sup("name")
            .with_equality("caseIgnoreMatch")
            .with_syntax(DIRECTORY_STRING);
        assert!(!openldap.inconsistent(&dirsrv));
        assert!(!dirsrv.inconsistent(&openldap));

        let ia5 = openldap.with_syntax("1.3.6.1.4.1.1466.115.121.1.26");
        assert!(ia5.inconsistent(&dirsrv));
    }

    #[test]
    fn test_single_value_change_is_inconsistent() {
        assert!(mail().inconsistent(&mail().single_valued()));
    }

    #[test]
    fn test_sup_compared_case_insensitively() {
        let a = AttributeType::new("2.5.4.3", "cn").with_sup("name");
        let b = AttributeType::new("2.5.4.3", "cn").with_sup("NAME");
        let c = AttributeType::new("2.5.4.3", "cn");
        assert!(!a.inconsistent(&b));
        assert!(a.inconsistent(&c));
    }

    #[test]
    fn test_missing_equality_rule_is_tolerated() {
        let mut other = mail();
        other.equality = None;
        assert!(!mail().inconsistent(&other));

        other.equality = Some("caseExactIA5Match".to_string());
        assert!(mail().inconsistent(&other));
    }

    #[test]
    fn test_definition_rendering() {
        assert_eq!(
            mail().definition(),
            "( 0.9.2342.19200300.100.1.3 NAME ( 'mail' 'rfc822Mailbox' ) \
             EQUALITY caseIgnoreIA5Match SYNTAX 1.3.6.1.4.1.1466.115.121.1.26{256} )"
        );
    }
}
