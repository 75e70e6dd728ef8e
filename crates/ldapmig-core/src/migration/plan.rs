//! Migration plan generation.
//!
//! The plan is a single ordered action list populated by the planners in a
//! fixed sequence: schema, then per database its backend, indexes and
//! overlays, then data imports. Schema must exist before backends hold
//! data using it, backends before plugins scoped to them, and plugins
//! before imports so that attributes they maintain are recognized.

use super::action::{MigrationAction, Stage};
use super::current_timestamp;
use super::error::MigrationError;
use super::options::MigrationOptions;
use super::{backend, import, reconcile};
use crate::source::SourceConfig;
use crate::target::TargetAccessor;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Generate a unique migration ID.
pub fn generate_migration_id() -> [u8; 16] {
    let ts = current_timestamp();
    let mut id = [0u8; 16];
    id[0..8].copy_from_slice(&ts.to_be_bytes());
    let hash = ts.wrapping_mul(0x517cc1b727220a95);
    id[8..16].copy_from_slice(&hash.to_be_bytes());
    id
}

/// An ordered, reviewable migration plan.
///
/// `actions` may be edited freely before execution; edits are not validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Unique migration ID.
    pub id: [u8; 16],
    /// When the plan was created (microseconds since epoch).
    pub created_at: u64,
    /// Ordered actions.
    pub actions: Vec<MigrationAction>,
}

impl MigrationPlan {
    /// An empty plan.
    pub fn new() -> Self {
        Self {
            id: generate_migration_id(),
            created_at: current_timestamp(),
            actions: Vec::new(),
        }
    }

    /// Plan the migration of `source` onto the current state of `target`.
    ///
    /// Reads the target but never modifies it. Fails only on target errors
    /// and on the impossible state of two target classes sharing an oid.
    pub fn generate(
        source: &SourceConfig,
        target: &dyn TargetAccessor,
        options: &MigrationOptions,
    ) -> Result<Self, MigrationError> {
        let mut plan = Self::new();

        if !options.skip_schema {
            reconcile::plan_schema(source, target, options, &mut plan.actions)?;
        }
        if !options.skip_config {
            backend::plan_databases(source, target, options, &mut plan.actions)?;
        }
        if !options.skip_entries {
            import::plan_imports(options, &mut plan.actions);
        }

        info!(
            migration = %plan.id_hex(),
            actions = plan.len(),
            advisories = plan.advisories().count(),
            "migration plan generated"
        );
        Ok(plan)
    }

    /// Hex form of the ID.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over the actions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, MigrationAction> {
        self.actions.iter()
    }

    /// Actions belonging to a stage, in plan order.
    pub fn actions_in_stage(&self, stage: Stage) -> Vec<&MigrationAction> {
        self.actions.iter().filter(|a| a.stage() == stage).collect()
    }

    /// Detection-only actions an operator must review.
    pub fn advisories(&self) -> impl Iterator<Item = &MigrationAction> {
        self.actions.iter().filter(|a| a.is_advisory())
    }

    /// Whether executing the plan restarts the target.
    pub fn requires_restart(&self) -> bool {
        self.actions.iter().any(MigrationAction::requires_restart)
    }
}

impl Default for MigrationPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MigrationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for action in &self.actions {
            writeln!(f, "{}", action.describe())?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a MigrationPlan {
    type Item = &'a MigrationAction;
    type IntoIter = std::slice::Iter<'a, MigrationAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryTarget, TargetSnapshot};
    use crate::schema::{AttributeType, ObjectClass};
    use crate::source::{Database, IndexDecl, IndexKind, Overlay};
    use pretty_assertions::assert_eq;

    fn source() -> SourceConfig {
        SourceConfig::new()
            .with_attribute(AttributeType::new("9.9.9.1", "testAttr"))
            .with_database(
                Database::new("dc=test", "test")
                    .with_index(IndexDecl::new("uid", [IndexKind::Equality]))
                    .with_overlay(Overlay::MemberOf {
                        attributes: vec!["member".into()],
                    }),
            )
    }

    #[test]
    fn test_stage_order() {
        let target = InMemoryTarget::new();
        let options = MigrationOptions::new().with_ldif_import("dc=test", "/data/test.ldif");
        let plan = MigrationPlan::generate(&source(), &target, &options).unwrap();

        let stages: Vec<Stage> = plan.iter().map(MigrationAction::stage).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted);
        assert_eq!(plan.actions_in_stage(Stage::Import).len(), 1);
        assert!(plan.requires_restart());
    }

    #[test]
    fn test_skip_toggles() {
        let target = InMemoryTarget::new();
        let base = MigrationOptions::new().with_ldif_import("dc=test", "/data/test.ldif");

        let plan = MigrationPlan::generate(&source(), &target, &base.clone().with_skip_schema(true)).unwrap();
        assert!(plan.actions_in_stage(Stage::Schema).is_empty());
        assert!(!plan.actions_in_stage(Stage::Database).is_empty());

        let plan = MigrationPlan::generate(&source(), &target, &base.clone().with_skip_config(true)).unwrap();
        assert!(plan.actions_in_stage(Stage::Database).is_empty());
        assert!(plan.actions_in_stage(Stage::Plugin).is_empty());
        assert_eq!(plan.actions_in_stage(Stage::Schema).len(), 1);

        let plan = MigrationPlan::generate(&source(), &target, &base.with_skip_entries(true)).unwrap();
        assert!(plan.actions_in_stage(Stage::Import).is_empty());
        assert_eq!(plan.len(), 7);
    }

    #[test]
    fn test_generation_does_not_modify_target() {
        let target = InMemoryTarget::new();
        let before = target.snapshot();
        MigrationPlan::generate(&source(), &target, &MigrationOptions::default()).unwrap();
        assert_eq!(target.snapshot(), before);
    }

    #[test]
    fn test_ambiguous_class_aborts() {
        let mut snapshot = TargetSnapshot::default();
        snapshot.classes = vec![ObjectClass::new("9.9.9.2", "a"), ObjectClass::new("9.9.9.2", "b")];
        let target = InMemoryTarget::from_snapshot(snapshot);
        let source = SourceConfig::new().with_class(ObjectClass::new("9.9.9.2", "a"));

        let err = MigrationPlan::generate(&source, &target, &MigrationOptions::default()).unwrap_err();
        assert!(matches!(err, MigrationError::AmbiguousObjectClass { .. }));
    }

    #[test]
    fn test_rendering() {
        let target = InMemoryTarget::new();
        let plan = MigrationPlan::generate(&source(), &target, &MigrationOptions::default()).unwrap();
        assert_eq!(
            plan.to_string(),
            "SchemaAttributeCreate -> 9.9.9.1 (testAttr)\n\
             DatabaseCreate -> dc=test (test)\n\
             DatabaseIndexCreate -> dc=test uid,eq\n\
             DatabaseReindex -> dc=test\n\
             PluginMemberOfEnable\n\
             PluginMemberOfScope -> dc=test\n\
             PluginMemberOfFixup -> dc=test\n"
        );
        assert_eq!(plan.id_hex().len(), 32);
    }

    #[test]
    fn test_plan_serializes() {
        let target = InMemoryTarget::new();
        let plan = MigrationPlan::generate(&source(), &target, &MigrationOptions::default()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"action\":\"plugin_member_of_enable\""));
        let back: MigrationPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
