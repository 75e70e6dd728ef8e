//! Backend and index planning.

use super::action::MigrationAction;
use super::error::MigrationError;
use super::options::MigrationOptions;
use super::overlay::plan_overlay;
use crate::source::{Database, SourceConfig};
use crate::target::TargetAccessor;
use tracing::debug;

/// Append backend, index and overlay actions for every source database.
///
/// A database's backend and index actions always precede its overlay
/// actions, since plugin configuration assumes the backend exists.
pub(crate) fn plan_databases(
    source: &SourceConfig,
    target: &dyn TargetAccessor,
    options: &MigrationOptions,
    actions: &mut Vec<MigrationAction>,
) -> Result<(), MigrationError> {
    for database in &source.databases {
        plan_backend(database, target, actions)?;

        for overlay in &database.overlays {
            if options.skip_overlays.contains(&overlay.kind()) {
                debug!(suffix = %database.suffix, overlay = %overlay.kind(), "overlay skipped");
                continue;
            }
            actions.extend(plan_overlay(database, overlay));
        }
    }
    Ok(())
}

/// Append the create-or-reconcile actions for one database, ending with a
/// single reindex.
pub fn plan_backend(
    database: &Database,
    target: &dyn TargetAccessor,
    actions: &mut Vec<MigrationAction>,
) -> Result<(), MigrationError> {
    let suffix = &database.suffix;

    match target.backend(suffix) {
        Ok(backend) => {
            let existing = target.indexes(&backend)?;
            for index in &database.indexes {
                let present = existing
                    .iter()
                    .any(|i| i.attribute.eq_ignore_ascii_case(&index.attribute));
                if !present {
                    actions.push(MigrationAction::DatabaseIndexCreate {
                        suffix: suffix.clone(),
                        index: index.clone(),
                    });
                }
            }
            debug!(%suffix, backend = %backend.name, "reconciled existing backend");
        }
        Err(e) if e.is_not_found() => {
            actions.push(MigrationAction::DatabaseCreate {
                suffix: suffix.clone(),
                name: database.backend_name(),
            });
            actions.extend(database.indexes.iter().map(|index| {
                MigrationAction::DatabaseIndexCreate {
                    suffix: suffix.clone(),
                    index: index.clone(),
                }
            }));
            debug!(%suffix, "backend will be created");
        }
        Err(e) => return Err(e.into()),
    }

    actions.push(MigrationAction::DatabaseReindex {
        suffix: suffix.clone(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTarget;
    use crate::source::{IndexDecl, IndexKind, Overlay, OverlayKind};

    fn database() -> Database {
        Database::new("dc=test", "test")
            .with_index(IndexDecl::new("uid", [IndexKind::Equality]))
            .with_index(IndexDecl::new("cn", [IndexKind::Equality, IndexKind::Substring]))
            .with_index(IndexDecl::new("mail", [IndexKind::Presence]))
    }

    #[test]
    fn test_absent_backend() {
        let target = InMemoryTarget::new();
        let mut actions = Vec::new();
        plan_backend(&database(), &target, &mut actions).unwrap();

        let kinds: Vec<&str> = actions.iter().map(MigrationAction::kind_name).collect();
        assert_eq!(
            kinds,
            [
                "DatabaseCreate",
                "DatabaseIndexCreate",
                "DatabaseIndexCreate",
                "DatabaseIndexCreate",
                "DatabaseReindex"
            ]
        );
    }

    #[test]
    fn test_existing_backend_missing_one_index() {
        let target = InMemoryTarget::new();
        let backend = target.create_backend("test", "dc=test").unwrap();
        target
            .add_index(&backend, &IndexDecl::new("UID", [IndexKind::Equality]))
            .unwrap();
        target
            .add_index(&backend, &IndexDecl::new("mail", [IndexKind::Presence]))
            .unwrap();

        let mut actions = Vec::new();
        plan_backend(&database(), &target, &mut actions).unwrap();
        assert_eq!(
            actions,
            vec![
                MigrationAction::DatabaseIndexCreate {
                    suffix: "dc=test".into(),
                    index: IndexDecl::new("cn", [IndexKind::Equality, IndexKind::Substring]),
                },
                MigrationAction::DatabaseReindex {
                    suffix: "dc=test".into()
                },
            ]
        );
    }

    #[test]
    fn test_overlays_follow_backend_and_skip() {
        let source = SourceConfig::new().with_database(
            database()
                .with_overlay(Overlay::MemberOf {
                    attributes: vec!["member".into()],
                })
                .with_overlay(Overlay::AttributeUniqueness {
                    attributes: vec!["uid".into()],
                }),
        );
        let target = InMemoryTarget::new();
        let options = MigrationOptions::new().with_skip_overlay(OverlayKind::AttributeUniqueness);

        let mut actions = Vec::new();
        plan_databases(&source, &target, &options, &mut actions).unwrap();

        let reindex = actions
            .iter()
            .position(|a| matches!(a, MigrationAction::DatabaseReindex { .. }))
            .unwrap();
        assert_eq!(actions[reindex + 1], MigrationAction::PluginMemberOfEnable);
        assert_eq!(actions.len(), reindex + 4);
        assert!(!actions
            .iter()
            .any(|a| matches!(a, MigrationAction::PluginUniqueConfigure { .. })));
    }
}
