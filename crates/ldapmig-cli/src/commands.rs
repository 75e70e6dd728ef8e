//! Subcommand implementations.

use crate::formatter::create_formatter;
use crate::{MigrateArgs, PlanArgs, StatusArgs};
use ldapmig_core::{ExecutionJournal, InMemoryTarget, MigrationExecutor, MigrationPlan, SourceConfig};
use std::path::Path;
use tracing::info;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load the target snapshot, or start from an empty target.
fn load_target(path: &Path) -> Result<InMemoryTarget, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(InMemoryTarget::load(path)?)
    } else {
        info!(path = %path.display(), "no target snapshot, starting empty");
        Ok(InMemoryTarget::new())
    }
}

fn load_source(args: &PlanArgs) -> Result<SourceConfig, Box<dyn std::error::Error>> {
    Ok(ldapmig_openldap::load_source(&args.source)?)
}

/// Print the plan.
pub fn plan(args: &PlanArgs) -> CommandResult {
    let source = load_source(args)?;
    let target = load_target(&args.target)?;
    let plan = MigrationPlan::generate(&source, &target, &args.into_options())?;

    println!("{}", create_formatter(args.format).format_plan(&plan)?);
    Ok(())
}

/// Generate and execute the plan, then write the target snapshot back.
pub fn migrate(args: &MigrateArgs) -> CommandResult {
    let formatter = create_formatter(args.plan.format);
    let source = load_source(&args.plan)?;
    let target = load_target(&args.plan.target)?;
    let plan = MigrationPlan::generate(&source, &target, &args.plan.into_options())?;
    println!("{}", formatter.format_plan(&plan)?);

    let mut executor = MigrationExecutor::new(&target, args.into_executor_config());
    if let Some(dir) = &args.state_dir {
        executor = executor.with_journal(ExecutionJournal::open_path(dir)?);
    }
    let outcome = executor.execute(&plan);

    // A partial migration is kept: the next run plans from it.
    if !args.dry_run {
        target.snapshot().save(&args.plan.target)?;
        info!(path = %args.plan.target.display(), "target snapshot written");
    }

    let result = outcome?;
    println!("{}", formatter.format_result(&result)?);
    Ok(())
}

/// List recorded runs.
pub fn status(args: &StatusArgs) -> CommandResult {
    let journal = ExecutionJournal::open_path(&args.state_dir)?;
    let runs = journal.list()?;
    println!("{}", create_formatter(args.format).format_runs(&runs)?);
    Ok(())
}
