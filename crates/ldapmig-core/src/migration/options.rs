//! Plan generation and execution settings.

use super::exclusions::ExclusionSets;
use crate::source::OverlayKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Settings for plan generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Do-not-migrate and unsupported oid sets.
    pub exclusions: ExclusionSets,
    /// Extra oids treated as do-not-migrate.
    pub skip_schema_oids: BTreeSet<String>,
    /// Overlay kinds not to migrate.
    pub skip_overlays: BTreeSet<OverlayKind>,
    /// Extra attributes stripped from imported entries.
    pub skip_entry_attributes: Vec<String>,
    /// Skip the schema stage.
    pub skip_schema: bool,
    /// Skip backends, indexes and plugins.
    pub skip_config: bool,
    /// Skip data imports.
    pub skip_entries: bool,
    /// Suffix to data file. `None` generates no imports.
    pub ldif_imports: Option<BTreeMap<String, PathBuf>>,
}

impl MigrationOptions {
    /// Create options with the compiled-in exclusion sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the exclusion sets.
    pub fn with_exclusions(mut self, exclusions: ExclusionSets) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Treat an additional oid as do-not-migrate.
    pub fn with_skip_schema_oid(mut self, oid: impl Into<String>) -> Self {
        self.skip_schema_oids.insert(oid.into());
        self
    }

    /// Do not migrate overlays of this kind.
    pub fn with_skip_overlay(mut self, kind: OverlayKind) -> Self {
        self.skip_overlays.insert(kind);
        self
    }

    /// Strip an additional attribute from imported entries.
    pub fn with_skip_entry_attribute(mut self, attr: impl Into<String>) -> Self {
        self.skip_entry_attributes.push(attr.into());
        self
    }

    /// Skip the schema stage.
    pub fn with_skip_schema(mut self, skip: bool) -> Self {
        self.skip_schema = skip;
        self
    }

    /// Skip backends, indexes and plugins.
    pub fn with_skip_config(mut self, skip: bool) -> Self {
        self.skip_config = skip;
        self
    }

    /// Skip data imports.
    pub fn with_skip_entries(mut self, skip: bool) -> Self {
        self.skip_entries = skip;
        self
    }

    /// Import `path` into the backend serving `suffix`.
    pub fn with_ldif_import(mut self, suffix: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.ldif_imports
            .get_or_insert_with(BTreeMap::new)
            .insert(suffix.into(), path.into());
        self
    }

    /// Whether an oid is excluded without a trace.
    pub fn is_do_not_migrate(&self, oid: &str) -> bool {
        self.exclusions.is_do_not_migrate(oid) || self.skip_schema_oids.contains(oid)
    }
}

/// Settings for plan execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Log every action without touching the target.
    pub dry_run: bool,
    /// Restart the target between the passes when an applied action needs it.
    pub restart_between_passes: bool,
    /// Directory for transformed data files.
    pub staging_dir: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            restart_between_passes: true,
            staging_dir: std::env::temp_dir().join("ldapmig"),
        }
    }
}

impl ExecutorConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_restart_between_passes(mut self, restart: bool) -> Self {
        self.restart_between_passes = restart;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = MigrationOptions::default();
        assert!(options.ldif_imports.is_none());
        assert!(!options.skip_schema && !options.skip_config && !options.skip_entries);
        assert!(options.is_do_not_migrate("1.2.840.113556.1.2.102"));
    }

    #[test]
    fn test_builder() {
        let options = MigrationOptions::new()
            .with_skip_schema_oid("9.9.9.9")
            .with_skip_overlay(OverlayKind::AttributeUniqueness)
            .with_ldif_import("dc=b", "/tmp/b.ldif")
            .with_ldif_import("dc=a", "/tmp/a.ldif");

        assert!(options.is_do_not_migrate("9.9.9.9"));
        assert!(options.skip_overlays.contains(&OverlayKind::AttributeUniqueness));
        let suffixes: Vec<&String> = options.ldif_imports.as_ref().unwrap().keys().collect();
        assert_eq!(suffixes, ["dc=a", "dc=b"]);
    }

    #[test]
    fn test_executor_config() {
        let config = ExecutorConfig::default();
        assert!(config.restart_between_passes);
        assert!(!config.dry_run);

        let config = config.with_dry_run(true).with_staging_dir("/var/tmp/stage");
        assert!(config.dry_run);
        assert_eq!(config.staging_dir, PathBuf::from("/var/tmp/stage"));
    }
}
