//! Schema identifier resolution for class comparison.

use super::attribute::AttributeType;
use super::class::ObjectClass;
use super::SchemaElement;
use std::collections::{BTreeSet, HashMap};

/// Maps attribute and object class names (case-insensitive) and oids to a
/// canonical identifier, the element's oid. Attributes and classes live in
/// separate namespaces.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    canonical: HashMap<String, String>,
    classes: HashMap<String, String>,
}

impl Resolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver from a set of attribute types.
    pub fn from_attributes<'a>(attrs: impl IntoIterator<Item = &'a AttributeType>) -> Self {
        let mut resolver = Self::new();
        resolver.extend(attrs);
        resolver
    }

    /// Register more attribute types. Identifiers already known keep their
    /// first mapping, so the earliest registered schema is authoritative.
    pub fn extend<'a>(&mut self, attrs: impl IntoIterator<Item = &'a AttributeType>) {
        for attr in attrs {
            register(&mut self.canonical, attr);
        }
    }

    /// Register object classes, with the same precedence as [`Resolver::extend`].
    pub fn extend_classes<'a>(&mut self, classes: impl IntoIterator<Item = &'a ObjectClass>) {
        for class in classes {
            register(&mut self.classes, class);
        }
    }

    /// Resolve one attribute identifier. Unknown identifiers resolve to
    /// their lowercase form.
    pub fn resolve(&self, ident: &str) -> String {
        lookup(&self.canonical, ident)
    }

    /// Resolve a list of attribute identifiers into a set.
    pub fn resolve_set(&self, idents: &[String]) -> BTreeSet<String> {
        idents.iter().map(|i| self.resolve(i)).collect()
    }

    /// Resolve one object class identifier.
    pub fn resolve_class(&self, ident: &str) -> String {
        lookup(&self.classes, ident)
    }

    /// Number of known identifiers.
    pub fn len(&self) -> usize {
        self.canonical.len() + self.classes.len()
    }

    /// Whether no identifiers are known.
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty() && self.classes.is_empty()
    }
}

fn register(map: &mut HashMap<String, String>, element: &impl SchemaElement) {
    let oid = element.oid().to_string();
    map.entry(oid.to_ascii_lowercase()).or_insert_with(|| oid.clone());
    for name in element.names() {
        map.entry(name.to_ascii_lowercase())
            .or_insert_with(|| oid.clone());
    }
}

fn lookup(map: &HashMap<String, String>, ident: &str) -> String {
    let key = ident.to_ascii_lowercase();
    match map.get(&key) {
        Some(oid) => oid.clone(),
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_names_and_oid() {
        let resolver = Resolver::from_attributes(&[
            AttributeType::new("2.5.4.3", "cn").with_name("commonName")
        ]);
        assert_eq!(resolver.resolve("cn"), "2.5.4.3");
        assert_eq!(resolver.resolve("COMMONNAME"), "2.5.4.3");
        assert_eq!(resolver.resolve("2.5.4.3"), "2.5.4.3");
        assert_eq!(resolver.len(), 3);
    }

    #[test]
    fn test_unknown_identifier_lowercased() {
        let resolver = Resolver::new();
        assert!(resolver.is_empty());
        assert_eq!(resolver.resolve("OrgUnit"), "orgunit");
    }

    #[test]
    fn test_first_registration_wins() {
        let mut resolver = Resolver::from_attributes(&[AttributeType::new("1.1.1", "shared")]);
        resolver.extend(&[AttributeType::new("2.2.2", "shared")]);
        assert_eq!(resolver.resolve("shared"), "1.1.1");
    }

    #[test]
    fn test_classes_resolved_separately() {
        let mut resolver = Resolver::from_attributes(&[AttributeType::new("2.5.4.3", "cn")]);
        resolver.extend_classes(&[ObjectClass::new("2.5.6.6", "person")]);
        assert_eq!(resolver.resolve_class("PERSON"), "2.5.6.6");
        assert_eq!(resolver.resolve_class("2.5.6.6"), "2.5.6.6");
        assert_eq!(resolver.resolve("person"), "person");
        assert_eq!(resolver.resolve_class("cn"), "cn");
    }
}
