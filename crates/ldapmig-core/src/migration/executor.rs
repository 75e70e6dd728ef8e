//! Plan executor.
//!
//! Runs a plan in two strict passes over the same ordered list: `apply` on
//! every action, then `post` on every action. Between the passes the
//! target is restarted once when an applied action needs it. A failure
//! aborts the pass; nothing is rolled back.

use super::action::{ActionContext, MigrationAction};
use super::error::{MigrationError, Pass};
use super::options::ExecutorConfig;
use super::plan::MigrationPlan;
use super::state::{ExecutionJournal, ExecutionState, ExecutionStatus};
use crate::target::TargetAccessor;
use tracing::{debug, error, info, warn};

/// Result of a plan execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Plan ID.
    pub migration_id: [u8; 16],
    /// Final status.
    pub status: ExecutionStatus,
    /// Actions whose apply completed.
    pub applied: usize,
    /// Actions whose post completed.
    pub posted: usize,
    /// Total actions.
    pub total: usize,
    /// The target was restarted between passes.
    pub restarted: bool,
    /// Descriptions of detection-only actions.
    pub warnings: Vec<String>,
}

/// Executes plans against one target.
pub struct MigrationExecutor<'a> {
    target: &'a dyn TargetAccessor,
    journal: Option<ExecutionJournal>,
    config: ExecutorConfig,
}

impl<'a> MigrationExecutor<'a> {
    /// Create an executor.
    pub fn new(target: &'a dyn TargetAccessor, config: ExecutorConfig) -> Self {
        Self {
            target,
            journal: None,
            config,
        }
    }

    /// Record every run in a journal.
    pub fn with_journal(mut self, journal: ExecutionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a plan.
    pub fn execute(&self, plan: &MigrationPlan) -> Result<ExecutionResult, MigrationError> {
        let dry_run = self.config.dry_run;
        let mut state = ExecutionState::new(plan.id, plan.iter().map(MigrationAction::describe), dry_run);
        state.start();
        self.record(&state)?;

        let ctx = ActionContext::new(&self.config.staging_dir);
        let mut result = ExecutionResult {
            migration_id: plan.id,
            status: ExecutionStatus::Applying,
            applied: 0,
            posted: 0,
            total: plan.len(),
            restarted: false,
            warnings: plan.advisories().map(MigrationAction::describe).collect(),
        };

        info!(migration = %plan.id_hex(), actions = plan.len(), dry_run, "apply pass");
        for (index, action) in plan.iter().enumerate() {
            if let Some(progress) = state.actions.get_mut(index) {
                progress.start_apply();
            }

            let outcome = if dry_run {
                info!(index, "would apply: {}", action);
                Ok(())
            } else {
                debug!(index, action = action.kind_name(), "applying");
                action.apply(self.target, &ctx)
            };

            match outcome {
                Ok(()) => {
                    if let Some(progress) = state.actions.get_mut(index) {
                        progress.complete_apply();
                    }
                    result.applied += 1;
                }
                Err(e) => return Err(self.abort(&mut state, Pass::Apply, index, action, e)),
            }
            self.record(&state)?;
        }

        let needs_restart = plan.iter().any(MigrationAction::requires_restart);
        if !dry_run && needs_restart {
            if self.config.restart_between_passes {
                state.start_restart();
                self.record(&state)?;
                info!("restarting target");
                if let Err(e) = self.target.restart() {
                    let e = MigrationError::from(e);
                    error!(error = %e, "restart failed");
                    state.fail(e.to_string());
                    self.record(&state)?;
                    return Err(e);
                }
                result.restarted = true;
            } else {
                warn!("plan requires a restart but restarts are disabled");
            }
        }

        state.start_post();
        self.record(&state)?;
        info!(migration = %plan.id_hex(), "post pass");
        for (index, action) in plan.iter().enumerate() {
            if let Some(progress) = state.actions.get_mut(index) {
                progress.start_post();
            }

            let outcome = if dry_run {
                info!(index, "would finalize: {}", action);
                Ok(())
            } else {
                action.post(self.target)
            };

            match outcome {
                Ok(()) => {
                    if let Some(progress) = state.actions.get_mut(index) {
                        progress.complete_post();
                    }
                    result.posted += 1;
                }
                Err(e) => return Err(self.abort(&mut state, Pass::Post, index, action, e)),
            }
            self.record(&state)?;
        }

        state.complete();
        self.record(&state)?;
        if let Some(journal) = &self.journal {
            journal.flush()?;
        }

        result.status = ExecutionStatus::Complete;
        info!(
            migration = %plan.id_hex(),
            applied = result.applied,
            posted = result.posted,
            restarted = result.restarted,
            warnings = result.warnings.len(),
            "migration complete"
        );
        Ok(result)
    }

    fn abort(
        &self,
        state: &mut ExecutionState,
        pass: Pass,
        index: usize,
        action: &MigrationAction,
        cause: MigrationError,
    ) -> MigrationError {
        let message = cause.to_string();
        error!(%pass, index, action = action.kind_name(), error = %message, "action failed");

        if let Some(progress) = state.actions.get_mut(index) {
            progress.fail(message.clone());
        }
        state.fail(format!("{} pass failed at action {}", pass, index));
        if let Err(e) = self.record(state) {
            warn!(error = %e, "could not record failed run");
        }

        MigrationError::ActionFailed {
            pass,
            index,
            description: action.describe(),
            message,
        }
    }

    fn record(&self, state: &ExecutionState) -> Result<(), MigrationError> {
        match &self.journal {
            Some(journal) => journal.save(state),
            None => Ok(()),
        }
    }
}
