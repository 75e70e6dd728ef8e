//! Overlay to plugin dispatch.
//!
//! Each overlay kind maps to a fixed, ordered list of action templates.
//! Later templates depend on the side effects of earlier ones, so the
//! order in each table is part of the contract.

use super::action::MigrationAction;
use crate::source::{Database, Overlay, OverlayKind};
use tracing::debug;

/// One step of an overlay's plugin configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTemplate {
    MemberOfEnable,
    MemberOfScope,
    MemberOfFixup,
    RefintEnable,
    /// Expanded once per configured attribute.
    RefintAttributes,
    RefintScope,
    /// Expanded once per configured attribute.
    UniqueConfigure,
    UnknownManual,
}

const MEMBER_OF: &[ActionTemplate] = &[
    ActionTemplate::MemberOfEnable,
    ActionTemplate::MemberOfScope,
    ActionTemplate::MemberOfFixup,
];

const REFERENTIAL_INTEGRITY: &[ActionTemplate] = &[
    ActionTemplate::RefintEnable,
    ActionTemplate::RefintAttributes,
    ActionTemplate::RefintScope,
];

const ATTRIBUTE_UNIQUENESS: &[ActionTemplate] = &[ActionTemplate::UniqueConfigure];

const UNKNOWN: &[ActionTemplate] = &[ActionTemplate::UnknownManual];

/// Ordered templates for an overlay kind.
pub fn templates(kind: OverlayKind) -> &'static [ActionTemplate] {
    match kind {
        OverlayKind::MemberOf => MEMBER_OF,
        OverlayKind::ReferentialIntegrity => REFERENTIAL_INTEGRITY,
        OverlayKind::AttributeUniqueness => ATTRIBUTE_UNIQUENESS,
        OverlayKind::Unknown => UNKNOWN,
    }
}

/// Name of the uniqueness plugin instance for an attribute of a database.
/// Unique across databases.
pub fn uniqueness_instance_name(attribute: &str, database: &Database) -> String {
    format!("{}-{}-unique", attribute, database.backend_name())
}

impl ActionTemplate {
    /// Instantiate for one overlay of one database.
    pub fn instantiate(&self, database: &Database, overlay: &Overlay) -> Vec<MigrationAction> {
        let suffix = database.suffix.clone();
        match self {
            ActionTemplate::MemberOfEnable => vec![MigrationAction::PluginMemberOfEnable],
            ActionTemplate::MemberOfScope => vec![MigrationAction::PluginMemberOfScope { suffix }],
            ActionTemplate::MemberOfFixup => vec![MigrationAction::PluginMemberOfFixup { suffix }],
            ActionTemplate::RefintEnable => vec![MigrationAction::PluginRefintEnable],
            ActionTemplate::RefintAttributes => overlay
                .attributes()
                .iter()
                .map(|attribute| MigrationAction::PluginRefintAttributes {
                    attribute: attribute.clone(),
                })
                .collect(),
            ActionTemplate::RefintScope => vec![MigrationAction::PluginRefintScope { suffix }],
            ActionTemplate::UniqueConfigure => overlay
                .attributes()
                .iter()
                .map(|attribute| MigrationAction::PluginUniqueConfigure {
                    suffix: suffix.clone(),
                    attribute: attribute.clone(),
                    name: uniqueness_instance_name(attribute, database),
                })
                .collect(),
            ActionTemplate::UnknownManual => match overlay {
                Overlay::Unknown {
                    name,
                    object_classes,
                } => vec![MigrationAction::PluginUnknownManual {
                    suffix,
                    name: name.clone(),
                    object_classes: object_classes.clone(),
                }],
                other => vec![MigrationAction::PluginUnknownManual {
                    suffix,
                    name: other.kind().to_string(),
                    object_classes: Vec::new(),
                }],
            },
        }
    }
}

/// Expand one overlay into its action sequence.
pub fn plan_overlay(database: &Database, overlay: &Overlay) -> Vec<MigrationAction> {
    let kind = overlay.kind();
    debug!(suffix = %database.suffix, overlay = %kind, "planning overlay");
    templates(kind)
        .iter()
        .flat_map(|template| template.instantiate(database, overlay))
        .collect()
}
