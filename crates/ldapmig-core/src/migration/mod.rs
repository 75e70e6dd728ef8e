//! Migration planning and execution.
//!
//! Plan generation compares a parsed source deployment with the live
//! state of a target and produces an ordered list of actions:
//!
//! | Stage | Decides | Emits |
//! |-------|---------|-------|
//! | Schema | per oid: absent, consistent, inconsistent, ambiguous, excluded | create / inconsistent / ambiguous / unsupported |
//! | Database | per suffix: backend absent or present, indexes missing | create, index create, reindex |
//! | Plugin | per overlay kind, a fixed template sequence | enable, scope, fixup, attributes, instances, manual markers |
//! | Import | per configured data file | import |
//!
//! Inconsistent and ambiguous schema is reported, never repaired.
//!
//! # Example
//!
//! ```ignore
//! use ldapmig_core::migration::{ExecutorConfig, MigrationExecutor, MigrationOptions, MigrationPlan};
//!
//! let plan = MigrationPlan::generate(&source, &target, &MigrationOptions::default())?;
//! print!("{}", plan);
//!
//! let result = MigrationExecutor::new(&target, ExecutorConfig::default()).execute(&plan)?;
//! println!("applied {} of {} actions", result.applied, result.total);
//! ```

pub mod action;
pub mod backend;
pub mod error;
pub mod exclusions;
pub mod executor;
pub mod import;
pub mod options;
pub mod overlay;
pub mod plan;
pub mod reconcile;
pub mod state;

// Action types
pub use action::{ActionContext, MigrationAction, Stage};

// Error types
pub use error::{MigrationError, Pass};

// Configuration
pub use exclusions::{ExclusionSets, DEFAULT_DO_NOT_MIGRATE, DEFAULT_UNSUPPORTED};
pub use options::{ExecutorConfig, MigrationOptions};

// Planning
pub use backend::plan_backend;
pub use import::{stage_ldif, transform_record, MEMBER_OF_ATTRIBUTE, MEMBER_OF_CLASS, NON_PORTABLE_ATTRIBUTES};
pub use overlay::{plan_overlay, templates, ActionTemplate};
pub use plan::{generate_migration_id, MigrationPlan};
pub use reconcile::{reconcile_attribute, reconcile_class};

// Execution
pub use executor::{ExecutionResult, MigrationExecutor};
pub use state::{ActionProgress, ExecutionJournal, ExecutionState, ExecutionStatus, StepStatus};

/// Microseconds since the Unix epoch, 0 if the clock is before it.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
