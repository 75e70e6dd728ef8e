//! Schema reconciliation.
//!
//! Source elements are matched against the target strictly by oid. Names
//! are never used as a substitute key.

use super::action::MigrationAction;
use super::error::MigrationError;
use super::options::MigrationOptions;
use crate::schema::{AttributeType, ObjectClass, Resolver};
use crate::source::SourceConfig;
use crate::target::TargetAccessor;
use tracing::{debug, warn};

/// Append schema actions: every source attribute, then every source class.
pub(crate) fn plan_schema(
    source: &SourceConfig,
    target: &dyn TargetAccessor,
    options: &MigrationOptions,
    actions: &mut Vec<MigrationAction>,
) -> Result<(), MigrationError> {
    let target_attributes = target.attribute_types()?;
    let target_classes = target.object_classes()?;

    let mut resolver = Resolver::from_attributes(&target_attributes);
    resolver.extend(&source.attributes);
    resolver.extend_classes(&target_classes);
    resolver.extend_classes(&source.classes);

    for attr in &source.attributes {
        if let Some(action) = reconcile_attribute(attr, &target_attributes, options) {
            actions.push(action);
        }
    }
    for class in &source.classes {
        if let Some(action) = reconcile_class(class, &target_classes, &resolver, options)? {
            actions.push(action);
        }
    }
    Ok(())
}

/// Classify one source attribute type.
pub fn reconcile_attribute(
    attr: &AttributeType,
    target: &[AttributeType],
    options: &MigrationOptions,
) -> Option<MigrationAction> {
    if options.is_do_not_migrate(&attr.oid) {
        debug!(oid = %attr.oid, "attribute type excluded");
        return None;
    }
    if options.exclusions.is_unsupported(&attr.oid) {
        return Some(MigrationAction::SchemaAttributeUnsupported {
            attribute: attr.clone(),
        });
    }

    let matches: Vec<&AttributeType> = target.iter().filter(|t| t.oid == attr.oid).collect();
    match matches.as_slice() {
        [] => Some(MigrationAction::SchemaAttributeCreate {
            attribute: attr.clone(),
        }),
        [existing] => attr.inconsistent(existing).then(|| {
            MigrationAction::SchemaAttributeInconsistent {
                source: attr.clone(),
                target: (*existing).clone(),
            }
        }),
        many => {
            warn!(oid = %attr.oid, count = many.len(), "ambiguous attribute type on target");
            Some(MigrationAction::SchemaAttributeAmbiguous {
                source: attr.clone(),
                matches: many.iter().map(|m| (*m).clone()).collect(),
            })
        }
    }
}

/// Classify one source object class. More than one target class with the
/// same oid is fatal.
pub fn reconcile_class(
    class: &ObjectClass,
    target: &[ObjectClass],
    resolver: &Resolver,
    options: &MigrationOptions,
) -> Result<Option<MigrationAction>, MigrationError> {
    if options.is_do_not_migrate(&class.oid) {
        debug!(oid = %class.oid, "object class excluded");
        return Ok(None);
    }
    if options.exclusions.is_unsupported(&class.oid) {
        return Ok(Some(MigrationAction::SchemaClassUnsupported {
            class: class.clone(),
        }));
    }

    let matches: Vec<&ObjectClass> = target.iter().filter(|t| t.oid == class.oid).collect();
    match matches.as_slice() {
        [] => Ok(Some(MigrationAction::SchemaClassCreate {
            class: class.clone(),
        })),
        [existing] => Ok(class.inconsistent(existing, resolver).then(|| {
            MigrationAction::SchemaClassInconsistent {
                source: class.clone(),
                target: (*existing).clone(),
            }
        })),
        many => Err(MigrationError::AmbiguousObjectClass {
            oid: class.oid.clone(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::exclusions::ExclusionSets;

    const DIRECTORY_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.15";

    fn attr(oid: &str, name: &str) -> AttributeType {
        AttributeType::new(oid, name).with_syntax(DIRECTORY_STRING)
    }

    #[test]
    fn test_attribute_classification() {
        let options = MigrationOptions::default();
        let target = vec![attr("1.1.1", "same"), attr("1.1.2", "changed").single_valued()];

        assert!(reconcile_attribute(&attr("1.1.1", "same"), &target, &options).is_none());
        assert!(matches!(
            reconcile_attribute(&attr("1.1.2", "changed"), &target, &options),
            Some(MigrationAction::SchemaAttributeInconsistent { .. })
        ));
        assert!(matches!(
            reconcile_attribute(&attr("1.1.3", "new"), &target, &options),
            Some(MigrationAction::SchemaAttributeCreate { .. })
        ));
    }

    #[test]
    fn test_name_overlap_is_not_a_match() {
        let options = MigrationOptions::default();
        let target = vec![attr("1.1.1", "shared")];
        assert!(matches!(
            reconcile_attribute(&attr("2.2.2", "shared"), &target, &options),
            Some(MigrationAction::SchemaAttributeCreate { .. })
        ));
    }

    #[test]
    fn test_ambiguous_attribute() {
        let options = MigrationOptions::default();
        let target = vec![attr("1.1.1", "a"), attr("1.1.1", "b")];
        match reconcile_attribute(&attr("1.1.1", "a"), &target, &options) {
            Some(MigrationAction::SchemaAttributeAmbiguous { matches, .. }) => {
                assert_eq!(matches.len(), 2)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exclusions_checked_first() {
        let options = MigrationOptions::new().with_exclusions(
            ExclusionSets::empty()
                .with_do_not_migrate(["1.1.1"])
                .with_unsupported(["1.1.2"]),
        );
        let target = vec![attr("1.1.2", "x"), attr("1.1.2", "y")];

        assert!(reconcile_attribute(&attr("1.1.1", "skip"), &[], &options).is_none());
        assert!(matches!(
            reconcile_attribute(&attr("1.1.2", "x"), &target, &options),
            Some(MigrationAction::SchemaAttributeUnsupported { .. })
        ));
    }

    #[test]
    fn test_class_exclusions_checked_before_ambiguity() {
        let options = MigrationOptions::new().with_exclusions(
            ExclusionSets::empty()
                .with_do_not_migrate(["1.2.1", "1.2.3"])
                .with_unsupported(["1.2.2", "1.2.3"]),
        );
        let target = vec![
            ObjectClass::new("1.2.1", "a"),
            ObjectClass::new("1.2.1", "b"),
            ObjectClass::new("1.2.2", "c"),
            ObjectClass::new("1.2.2", "d"),
            ObjectClass::new("1.2.3", "e"),
            ObjectClass::new("1.2.3", "f"),
        ];
        let resolver = Resolver::new();

        let skipped = reconcile_class(&ObjectClass::new("1.2.1", "a"), &target, &resolver, &options);
        assert!(matches!(skipped, Ok(None)));

        match reconcile_class(&ObjectClass::new("1.2.2", "c"), &target, &resolver, &options) {
            Ok(Some(MigrationAction::SchemaClassUnsupported { class })) => {
                assert_eq!(class.oid, "1.2.2")
            }
            other => panic!("unexpected {:?}", other),
        }

        // Do-not-migrate wins over unsupported.
        let both = reconcile_class(&ObjectClass::new("1.2.3", "e"), &target, &resolver, &options);
        assert!(matches!(both, Ok(None)));
    }

    #[test]
    fn test_unsupported_class_without_target_match() {
        let options = MigrationOptions::new()
            .with_exclusions(ExclusionSets::empty().with_unsupported(["1.2.9"]));
        let action = reconcile_class(&ObjectClass::new("1.2.9", "legacy"), &[], &Resolver::new(), &options)
            .unwrap();
        assert!(matches!(action, Some(MigrationAction::SchemaClassUnsupported { .. })));
    }

    #[test]
    fn test_ambiguous_class_is_fatal() {
        let options = MigrationOptions::default();
        let target = vec![ObjectClass::new("1.2.1", "a"), ObjectClass::new("1.2.1", "b")];
        let err = reconcile_class(&ObjectClass::new("1.2.1", "a"), &target, &Resolver::new(), &options)
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::AmbiguousObjectClass { ref oid, count: 2 } if oid == "1.2.1"
        ));
    }

    #[test]
    fn test_class_compared_through_resolver() {
        let options = MigrationOptions::default();
        let resolver = Resolver::from_attributes(&[
            AttributeType::new("2.5.4.3", "cn").with_name("commonName")
        ]);
        let source = ObjectClass::new("1.2.2", "thing").with_must(["cn"]);
        let target = vec![ObjectClass::new("1.2.2", "thing").with_must(["commonName"])];
        assert!(reconcile_class(&source, &target, &resolver, &options)
            .unwrap()
            .is_none());

        let target = vec![ObjectClass::new("1.2.2", "thing").with_must(["sn"])];
        assert!(matches!(
            reconcile_class(&source, &target, &resolver, &options).unwrap(),
            Some(MigrationAction::SchemaClassInconsistent { .. })
        ));
    }
}
