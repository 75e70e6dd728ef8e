//! ldapmig command-line tool
//!
//! Plans and executes the migration of an OpenLDAP slapd.d deployment onto a
//! target described by a JSON snapshot.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod formatter;

use clap::{Args, Parser, Subcommand};
use formatter::OutputFormat;
use ldapmig_core::{ExecutorConfig, MigrationOptions, OverlayKind};
use std::path::PathBuf;
use thiserror::Error;

/// ldapmig command-line tool
#[derive(Parser, Debug)]
#[command(name = "ldapmig")]
#[command(version, about = "Directory service migration planner and executor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the migration plan without executing it
    Plan(PlanArgs),
    /// Generate and execute the migration plan
    Migrate(MigrateArgs),
    /// List recorded runs
    Status(StatusArgs),
}

/// Source, target and planning options shared by `plan` and `migrate`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// slapd.d configuration directory
    #[arg(short, long)]
    pub source: PathBuf,

    /// Target snapshot (JSON); a missing file is an empty target
    #[arg(short, long)]
    pub target: PathBuf,

    /// Data file to import into a database, as SUFFIX=PATH
    #[arg(long = "ldif", value_parser = parse_ldif_import)]
    pub ldif: Vec<(String, PathBuf)>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Do not migrate schema
    #[arg(long)]
    pub skip_schema: bool,

    /// Do not migrate databases, indexes or overlays
    #[arg(long)]
    pub skip_config: bool,

    /// Do not import data files
    #[arg(long)]
    pub skip_entries: bool,

    /// Schema oid to leave alone
    #[arg(long = "skip-schema-oid")]
    pub skip_schema_oids: Vec<String>,

    /// Overlay kind to leave alone (memberof, refint, unique, unknown)
    #[arg(long = "skip-overlay")]
    pub skip_overlays: Vec<OverlayKind>,

    /// Attribute to strip from imported entries
    #[arg(long = "skip-entry-attribute")]
    pub skip_entry_attributes: Vec<String>,
}

impl PlanArgs {
    /// Planning options.
    pub fn into_options(&self) -> MigrationOptions {
        let mut options = MigrationOptions::new()
            .with_skip_schema(self.skip_schema)
            .with_skip_config(self.skip_config)
            .with_skip_entries(self.skip_entries);
        for oid in &self.skip_schema_oids {
            options = options.with_skip_schema_oid(oid);
        }
        for kind in &self.skip_overlays {
            options = options.with_skip_overlay(*kind);
        }
        for attr in &self.skip_entry_attributes {
            options = options.with_skip_entry_attribute(attr);
        }
        for (suffix, path) in &self.ldif {
            options = options.with_ldif_import(suffix, path);
        }
        options
    }
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Log every action without touching the target
    #[arg(long)]
    pub dry_run: bool,

    /// Do not restart the target between passes
    #[arg(long)]
    pub no_restart: bool,

    /// Directory of the run journal
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Directory for staged data files
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,
}

impl MigrateArgs {
    /// Executor configuration.
    pub fn into_executor_config(&self) -> ExecutorConfig {
        let config = ExecutorConfig::new()
            .with_dry_run(self.dry_run)
            .with_restart_between_passes(!self.no_restart);
        match &self.staging_dir {
            Some(dir) => config.with_staging_dir(dir),
            None => config,
        }
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Directory of the run journal
    #[arg(long)]
    pub state_dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,
}

/// Command-line argument errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("expected SUFFIX=PATH, got {0:?}")]
    InvalidLdifImport(String),
}

fn parse_ldif_import(value: &str) -> Result<(String, PathBuf), CliError> {
    // Suffixes contain '='; the path follows the last one.
    match value.rsplit_once('=') {
        Some((suffix, path)) if !suffix.is_empty() && !path.is_empty() => {
            Ok((suffix.to_string(), PathBuf::from(path)))
        }
        _ => Err(CliError::InvalidLdifImport(value.to_string())),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ldapmig=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Plan(args) => commands::plan(&args),
        Command::Migrate(args) => commands::migrate(&args),
        Command::Status(args) => commands::status(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ldif_import() {
        let (suffix, path) = parse_ldif_import("dc=example,dc=com=/tmp/example.ldif").unwrap();
        assert_eq!(suffix, "dc=example,dc=com");
        assert_eq!(path, PathBuf::from("/tmp/example.ldif"));

        assert!(parse_ldif_import("/tmp/example.ldif").is_err());
        assert!(parse_ldif_import("dc=example=").is_err());
    }

    #[test]
    fn test_args_into_options() {
        let cli = Cli::parse_from([
            "ldapmig",
            "migrate",
            "--source",
            "slapd.d",
            "--target",
            "target.json",
            "--ldif",
            "dc=test=test.ldif",
            "--skip-overlay",
            "refint",
            "--skip-entry-attribute",
            "pwdHistory",
            "--no-restart",
        ]);
        let Command::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };

        let options = args.plan.into_options();
        assert!(options.skip_overlays.contains(&OverlayKind::ReferentialIntegrity));
        assert_eq!(options.skip_entry_attributes, vec!["pwdHistory".to_string()]);
        assert_eq!(
            options.ldif_imports.unwrap().get("dc=test"),
            Some(&PathBuf::from("test.ldif"))
        );

        let config = args.into_executor_config();
        assert!(!config.restart_between_passes);
        assert!(!config.dry_run);
    }
}
