//! Schema exclusion sets.
//!
//! Consulted before any oid matching. Both sets are plain data: the
//! defaults are compiled in and callers may extend or replace them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Schema the target provisions itself, or operational attributes the
/// source carries that must never be recreated.
pub const DEFAULT_DO_NOT_MIGRATE: &[&str] = &[
    // memberOf, maintained by the target's MemberOf plugin
    "1.2.840.113556.1.2.102",
    // RFC 4512 operational attributes
    "2.5.18.1",
    "2.5.18.2",
    "2.5.18.3",
    "2.5.18.4",
    "2.5.18.9",
    "2.5.18.10",
    "2.5.21.9",
    // entryUUID, entryDN
    "1.3.6.1.1.16.4",
    "1.3.6.1.1.20",
    // entryCSN, contextCSN
    "1.3.6.1.4.1.4203.666.1.7",
    "1.3.6.1.4.1.4203.666.1.25",
    // password policy (draft-behera), shipped by the target
    "1.3.6.1.4.1.42.2.27.8.1.1",
    "1.3.6.1.4.1.42.2.27.8.1.2",
    "1.3.6.1.4.1.42.2.27.8.1.3",
    "1.3.6.1.4.1.42.2.27.8.1.4",
    "1.3.6.1.4.1.42.2.27.8.1.5",
    "1.3.6.1.4.1.42.2.27.8.1.6",
    "1.3.6.1.4.1.42.2.27.8.1.7",
    "1.3.6.1.4.1.42.2.27.8.1.8",
    "1.3.6.1.4.1.42.2.27.8.1.9",
    "1.3.6.1.4.1.42.2.27.8.1.10",
    "1.3.6.1.4.1.42.2.27.8.1.11",
    "1.3.6.1.4.1.42.2.27.8.1.12",
    "1.3.6.1.4.1.42.2.27.8.1.13",
    "1.3.6.1.4.1.42.2.27.8.1.14",
    "1.3.6.1.4.1.42.2.27.8.1.15",
    "1.3.6.1.4.1.42.2.27.8.1.16",
    "1.3.6.1.4.1.42.2.27.8.1.17",
    "1.3.6.1.4.1.42.2.27.8.2.1",
];

/// Elements whose syntax or semantics the target cannot represent.
pub const DEFAULT_UNSUPPORTED: &[&str] = &[
    // authPassword and its auxiliary class
    "1.3.6.1.4.1.4203.1.3.4",
    "1.3.6.1.4.1.4203.1.4.7",
    // OpenLDAProotDSE
    "1.3.6.1.4.1.4203.1.4.1",
    // olcModuleList, olcOverlayConfig
    "1.3.6.1.4.1.4203.1.12.2.4.0.8",
    "1.3.6.1.4.1.4203.1.12.2.4.0.5",
];

/// The do-not-migrate and unsupported oid sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSets {
    /// Skipped silently, no action emitted.
    pub do_not_migrate: BTreeSet<String>,
    /// Recorded as an unsupported marker.
    pub unsupported: BTreeSet<String>,
}

impl Default for ExclusionSets {
    fn default() -> Self {
        Self {
            do_not_migrate: DEFAULT_DO_NOT_MIGRATE.iter().map(|s| s.to_string()).collect(),
            unsupported: DEFAULT_UNSUPPORTED.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExclusionSets {
    /// Sets with no entries.
    pub fn empty() -> Self {
        Self {
            do_not_migrate: BTreeSet::new(),
            unsupported: BTreeSet::new(),
        }
    }

    /// Add oids to the do-not-migrate set.
    pub fn with_do_not_migrate<I, S>(mut self, oids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.do_not_migrate.extend(oids.into_iter().map(Into::into));
        self
    }

    /// Add oids to the unsupported set.
    pub fn with_unsupported<I, S>(mut self, oids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsupported.extend(oids.into_iter().map(Into::into));
        self
    }

    pub fn is_do_not_migrate(&self, oid: &str) -> bool {
        self.do_not_migrate.contains(oid)
    }

    pub fn is_unsupported(&self, oid: &str) -> bool {
        self.unsupported.contains(oid)
    }
}
