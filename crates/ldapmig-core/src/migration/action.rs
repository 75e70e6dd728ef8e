//! Migration actions.
//!
//! One closed variant per action kind. An action carries only the data it
//! needs to execute and describe itself; ordering is purely its position
//! in the plan.

use super::error::MigrationError;
use super::import;
use crate::schema::{AttributeType, ObjectClass, SchemaElement};
use crate::source::IndexDecl;
use crate::target::{tolerate_existing, Plugin, TargetAccessor, UniquenessConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Plan stage an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Schema,
    Database,
    Plugin,
    Import,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Schema => write!(f, "schema"),
            Stage::Database => write!(f, "database"),
            Stage::Plugin => write!(f, "plugin"),
            Stage::Import => write!(f, "import"),
        }
    }
}

/// Execution context shared by all actions of a run.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Directory for transformed data files.
    pub staging_dir: PathBuf,
}

impl ActionContext {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }
}

/// A single migration action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MigrationAction {
    /// Attribute absent on the target.
    SchemaAttributeCreate { attribute: AttributeType },
    /// Attribute present with a different definition. Detection only.
    SchemaAttributeInconsistent {
        source: AttributeType,
        target: AttributeType,
    },
    /// More than one target attribute carries the oid. Detection only.
    SchemaAttributeAmbiguous {
        source: AttributeType,
        matches: Vec<AttributeType>,
    },
    /// Attribute the target cannot represent.
    SchemaAttributeUnsupported { attribute: AttributeType },
    /// Class absent on the target.
    SchemaClassCreate { class: ObjectClass },
    /// Class present with a different definition. Detection only.
    SchemaClassInconsistent {
        source: ObjectClass,
        target: ObjectClass,
    },
    /// Class the target cannot represent.
    SchemaClassUnsupported { class: ObjectClass },
    /// Create a backend.
    DatabaseCreate { suffix: String, name: String },
    /// Add an index definition to a backend.
    DatabaseIndexCreate { suffix: String, index: IndexDecl },
    /// Rebuild every index of a backend.
    DatabaseReindex { suffix: String },
    /// Transform a data file and bulk import it.
    DatabaseLdifImport {
        suffix: String,
        path: PathBuf,
        strip_attributes: Vec<String>,
    },
    PluginMemberOfEnable,
    PluginMemberOfScope { suffix: String },
    PluginMemberOfFixup { suffix: String },
    /// Enable referential integrity with synchronous updates.
    PluginRefintEnable,
    PluginRefintAttributes { attribute: String },
    PluginRefintScope { suffix: String },
    /// One uniqueness plugin instance for one attribute.
    PluginUniqueConfigure {
        suffix: String,
        attribute: String,
        name: String,
    },
    /// Overlay with no automated equivalent.
    PluginUnknownManual {
        suffix: String,
        name: String,
        object_classes: Vec<String>,
    },
}

impl MigrationAction {
    /// Action kind name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            MigrationAction::SchemaAttributeCreate { .. } => "SchemaAttributeCreate",
            MigrationAction::SchemaAttributeInconsistent { .. } => "SchemaAttributeInconsistent",
            MigrationAction::SchemaAttributeAmbiguous { .. } => "SchemaAttributeAmbiguous",
            MigrationAction::SchemaAttributeUnsupported { .. } => "SchemaAttributeUnsupported",
            MigrationAction::SchemaClassCreate { .. } => "SchemaClassCreate",
            MigrationAction::SchemaClassInconsistent { .. } => "SchemaClassInconsistent",
            MigrationAction::SchemaClassUnsupported { .. } => "SchemaClassUnsupported",
            MigrationAction::DatabaseCreate { .. } => "DatabaseCreate",
            MigrationAction::DatabaseIndexCreate { .. } => "DatabaseIndexCreate",
            MigrationAction::DatabaseReindex { .. } => "DatabaseReindex",
            MigrationAction::DatabaseLdifImport { .. } => "DatabaseLdifImport",
            MigrationAction::PluginMemberOfEnable => "PluginMemberOfEnable",
            MigrationAction::PluginMemberOfScope { .. } => "PluginMemberOfScope",
            MigrationAction::PluginMemberOfFixup { .. } => "PluginMemberOfFixup",
            MigrationAction::PluginRefintEnable => "PluginRefintEnable",
            MigrationAction::PluginRefintAttributes { .. } => "PluginRefintAttributes",
            MigrationAction::PluginRefintScope { .. } => "PluginRefintScope",
            MigrationAction::PluginUniqueConfigure { .. } => "PluginUniqueConfigure",
            MigrationAction::PluginUnknownManual { .. } => "PluginUnknownManual",
        }
    }

    /// Key fields of the action, for rendering.
    pub fn detail(&self) -> String {
        match self {
            MigrationAction::SchemaAttributeCreate { attribute }
            | MigrationAction::SchemaAttributeUnsupported { attribute } => attribute.label(),
            MigrationAction::SchemaAttributeInconsistent { source, target } => format!(
                "{} source: {} target: {}",
                source.label(),
                source.definition(),
                target.definition()
            ),
            MigrationAction::SchemaAttributeAmbiguous { source, matches } => {
                let labels: Vec<String> = matches.iter().map(|m| m.label()).collect();
                format!("{} matches: [{}]", source.label(), labels.join("; "))
            }
            MigrationAction::SchemaClassCreate { class }
            | MigrationAction::SchemaClassUnsupported { class } => class.label(),
            MigrationAction::SchemaClassInconsistent { source, target } => format!(
                "{} source: {} target: {}",
                source.label(),
                source.definition(),
                target.definition()
            ),
            MigrationAction::DatabaseCreate { suffix, name } => format!("{} ({})", suffix, name),
            MigrationAction::DatabaseIndexCreate { suffix, index } => {
                format!("{} {}", suffix, index)
            }
            MigrationAction::DatabaseLdifImport { suffix, path, .. } => {
                format!("{} < {}", suffix, path.display())
            }
            MigrationAction::PluginMemberOfEnable | MigrationAction::PluginRefintEnable => {
                String::new()
            }
            MigrationAction::DatabaseReindex { suffix }
            | MigrationAction::PluginMemberOfScope { suffix }
            | MigrationAction::PluginMemberOfFixup { suffix }
            | MigrationAction::PluginRefintScope { suffix } => suffix.clone(),
            MigrationAction::PluginRefintAttributes { attribute } => attribute.clone(),
            MigrationAction::PluginUniqueConfigure {
                suffix,
                attribute,
                name,
            } => format!("{} {} ({})", suffix, attribute, name),
            MigrationAction::PluginUnknownManual {
                suffix,
                name,
                object_classes,
            } => format!(
                "{} {} [{}] requires manual migration",
                suffix,
                name,
                object_classes.join(", ")
            ),
        }
    }

    /// One-line human-readable description.
    pub fn describe(&self) -> String {
        let detail = self.detail();
        if detail.is_empty() {
            self.kind_name().to_string()
        } else {
            format!("{} -> {}", self.kind_name(), detail)
        }
    }

    /// Plan stage of the action.
    pub fn stage(&self) -> Stage {
        match self {
            MigrationAction::SchemaAttributeCreate { .. }
            | MigrationAction::SchemaAttributeInconsistent { .. }
            | MigrationAction::SchemaAttributeAmbiguous { .. }
            | MigrationAction::SchemaAttributeUnsupported { .. }
            | MigrationAction::SchemaClassCreate { .. }
            | MigrationAction::SchemaClassInconsistent { .. }
            | MigrationAction::SchemaClassUnsupported { .. } => Stage::Schema,
            MigrationAction::DatabaseCreate { .. }
            | MigrationAction::DatabaseIndexCreate { .. }
            | MigrationAction::DatabaseReindex { .. } => Stage::Database,
            MigrationAction::DatabaseLdifImport { .. } => Stage::Import,
            MigrationAction::PluginMemberOfEnable
            | MigrationAction::PluginMemberOfScope { .. }
            | MigrationAction::PluginMemberOfFixup { .. }
            | MigrationAction::PluginRefintEnable
            | MigrationAction::PluginRefintAttributes { .. }
            | MigrationAction::PluginRefintScope { .. }
            | MigrationAction::PluginUniqueConfigure { .. }
            | MigrationAction::PluginUnknownManual { .. } => Stage::Plugin,
        }
    }

    /// Whether the change only takes effect after a target restart.
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            MigrationAction::PluginMemberOfEnable
                | MigrationAction::PluginRefintEnable
                | MigrationAction::PluginUniqueConfigure { .. }
        )
    }

    /// Whether the action only reports something for an operator to handle.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            MigrationAction::SchemaAttributeInconsistent { .. }
                | MigrationAction::SchemaAttributeAmbiguous { .. }
                | MigrationAction::SchemaAttributeUnsupported { .. }
                | MigrationAction::SchemaClassInconsistent { .. }
                | MigrationAction::SchemaClassUnsupported { .. }
                | MigrationAction::PluginUnknownManual { .. }
        )
    }

    /// Perform the change. Re-applying an already applied action succeeds.
    pub fn apply(&self, target: &dyn TargetAccessor, ctx: &ActionContext) -> Result<(), MigrationError> {
        match self {
            MigrationAction::SchemaAttributeCreate { attribute } => {
                let created = tolerate_existing(target.add_attribute_type(attribute))?;
                info!(oid = %attribute.oid, created, "attribute type added");
            }
            MigrationAction::SchemaAttributeInconsistent { source, .. } => {
                warn!(oid = %source.oid, "attribute type differs on target, resolve manually");
            }
            MigrationAction::SchemaAttributeAmbiguous { source, matches } => {
                warn!(oid = %source.oid, matches = matches.len(), "attribute type is ambiguous on target, resolve manually");
            }
            MigrationAction::SchemaAttributeUnsupported { attribute } => {
                info!(oid = %attribute.oid, "attribute type not supported by target, skipped");
            }
            MigrationAction::SchemaClassCreate { class } => {
                let created = tolerate_existing(target.add_object_class(class))?;
                info!(oid = %class.oid, created, "object class added");
            }
            MigrationAction::SchemaClassInconsistent { source, .. } => {
                warn!(oid = %source.oid, "object class differs on target, resolve manually");
            }
            MigrationAction::SchemaClassUnsupported { class } => {
                info!(oid = %class.oid, "object class not supported by target, skipped");
            }
            MigrationAction::DatabaseCreate { suffix, name } => {
                let created = tolerate_existing(target.create_backend(name, suffix).map(|_| ()))?;
                info!(%suffix, backend = %name, created, "backend created");
            }
            MigrationAction::DatabaseIndexCreate { suffix, index } => {
                let backend = target.backend(suffix)?;
                let created = tolerate_existing(target.add_index(&backend, index))?;
                info!(%suffix, index = %index, created, "index added");
            }
            MigrationAction::DatabaseReindex { suffix } => {
                let backend = target.backend(suffix)?;
                let task = target.reindex(&backend)?;
                debug!(%suffix, task = %task.id, "waiting for reindex");
                target.wait_task(&task)?;
                info!(%suffix, "reindex complete");
            }
            MigrationAction::DatabaseLdifImport {
                suffix,
                path,
                strip_attributes,
            } => {
                import::import_ldif(target, suffix, path, strip_attributes, &ctx.staging_dir)?;
            }
            MigrationAction::PluginMemberOfEnable => {
                target.enable_plugin(Plugin::MemberOf)?;
                info!(plugin = %Plugin::MemberOf, "plugin enabled");
            }
            MigrationAction::PluginMemberOfScope { suffix } => {
                add_scope(target, Plugin::MemberOf, suffix)?;
            }
            MigrationAction::PluginMemberOfFixup { suffix } => {
                let task = target.memberof_fixup(suffix)?;
                debug!(%suffix, task = %task.id, "waiting for memberof fixup");
                target.wait_task(&task)?;
                info!(%suffix, "memberof fixup complete");
            }
            MigrationAction::PluginRefintEnable => {
                let plugin = Plugin::ReferentialIntegrity;
                target.enable_plugin(plugin)?;
                target.set_plugin_attribute(plugin, Plugin::REFINT_UPDATE_DELAY, "0")?;
                info!(%plugin, "plugin enabled");
            }
            MigrationAction::PluginRefintAttributes { attribute } => {
                let added = tolerate_existing(target.add_plugin_value(
                    Plugin::ReferentialIntegrity,
                    Plugin::REFINT_MEMBERSHIP_ATTRIBUTE,
                    attribute,
                ))?;
                info!(%attribute, added, "referential integrity attribute configured");
            }
            MigrationAction::PluginRefintScope { suffix } => {
                add_scope(target, Plugin::ReferentialIntegrity, suffix)?;
            }
            MigrationAction::PluginUniqueConfigure {
                suffix,
                attribute,
                name,
            } => {
                let config = UniquenessConfig {
                    name: name.clone(),
                    attribute: attribute.clone(),
                    subtree: suffix.clone(),
                };
                let created = tolerate_existing(target.create_uniqueness_plugin(&config))?;
                info!(%suffix, %attribute, instance = %name, created, "uniqueness plugin configured");
            }
            MigrationAction::PluginUnknownManual { suffix, name, .. } => {
                warn!(%suffix, overlay = %name, "overlay has no equivalent, migrate manually");
            }
        }
        Ok(())
    }

    /// Finalize or validate once every action has been applied.
    pub fn post(&self, target: &dyn TargetAccessor) -> Result<(), MigrationError> {
        match self {
            MigrationAction::SchemaAttributeCreate { attribute } => {
                if !target.attribute_types()?.iter().any(|a| a.oid == attribute.oid) {
                    return Err(MigrationError::Validation(format!(
                        "attribute type {} missing on target",
                        attribute.oid
                    )));
                }
            }
            MigrationAction::SchemaClassCreate { class } => {
                if !target.object_classes()?.iter().any(|c| c.oid == class.oid) {
                    return Err(MigrationError::Validation(format!(
                        "object class {} missing on target",
                        class.oid
                    )));
                }
            }
            MigrationAction::DatabaseCreate { suffix, .. } => match target.backend(suffix) {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    return Err(MigrationError::Validation(format!(
                        "backend for {} missing on target",
                        suffix
                    )))
                }
                Err(e) => return Err(e.into()),
            },
            MigrationAction::PluginMemberOfEnable => verify_enabled(target, Plugin::MemberOf)?,
            MigrationAction::PluginRefintEnable => {
                verify_enabled(target, Plugin::ReferentialIntegrity)?
            }
            MigrationAction::SchemaAttributeInconsistent { .. }
            | MigrationAction::SchemaAttributeAmbiguous { .. }
            | MigrationAction::SchemaAttributeUnsupported { .. }
            | MigrationAction::SchemaClassInconsistent { .. }
            | MigrationAction::SchemaClassUnsupported { .. }
            | MigrationAction::DatabaseIndexCreate { .. }
            | MigrationAction::DatabaseReindex { .. }
            | MigrationAction::DatabaseLdifImport { .. }
            | MigrationAction::PluginMemberOfScope { .. }
            | MigrationAction::PluginMemberOfFixup { .. }
            | MigrationAction::PluginRefintAttributes { .. }
            | MigrationAction::PluginRefintScope { .. }
            | MigrationAction::PluginUniqueConfigure { .. }
            | MigrationAction::PluginUnknownManual { .. } => {}
        }
        Ok(())
    }
}

impl std::fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

fn add_scope(target: &dyn TargetAccessor, plugin: Plugin, suffix: &str) -> Result<(), MigrationError> {
    let added = tolerate_existing(target.add_plugin_scope(plugin, suffix))?;
    info!(%plugin, %suffix, added, "plugin scope configured");
    Ok(())
}

fn verify_enabled(target: &dyn TargetAccessor, plugin: Plugin) -> Result<(), MigrationError> {
    if target.plugin_enabled(plugin)? {
        Ok(())
    } else {
        Err(MigrationError::Validation(format!(
            "{} is enabled but not active, the target must be restarted",
            plugin
        )))
    }
}
