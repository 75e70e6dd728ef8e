//! Output formatters for plans, run results and the journal.

use clap::ValueEnum;
use comfy_table::Table;
use ldapmig_core::migration::ExecutionState;
use ldapmig_core::{ExecutionResult, MigrationPlan};
use serde_json::json;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per action
    Text,
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format a migration plan.
    fn format_plan(&self, plan: &MigrationPlan) -> Result<String, serde_json::Error>;

    /// Format the result of an execution.
    fn format_result(&self, result: &ExecutionResult) -> Result<String, serde_json::Error>;

    /// Format recorded runs.
    fn format_runs(&self, runs: &[ExecutionState]) -> Result<String, serde_json::Error>;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

fn result_summary(result: &ExecutionResult) -> String {
    format!(
        "migration {} {}: applied {}/{}, finalized {}/{}{}",
        hex::encode(result.migration_id),
        result.status,
        result.applied,
        result.total,
        result.posted,
        result.total,
        if result.restarted { ", target restarted" } else { "" }
    )
}

/// Plain text formatter.
pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_plan(&self, plan: &MigrationPlan) -> Result<String, serde_json::Error> {
        if plan.is_empty() {
            return Ok("Nothing to migrate".to_string());
        }
        let mut output = plan.to_string();
        if plan.requires_restart() {
            output.push_str("-- the target will be restarted between passes\n");
        }
        Ok(output)
    }

    fn format_result(&self, result: &ExecutionResult) -> Result<String, serde_json::Error> {
        let mut output = result_summary(result);
        for warning in &result.warnings {
            output.push_str(&format!("\nmanual: {}", warning));
        }
        Ok(output)
    }

    fn format_runs(&self, runs: &[ExecutionState]) -> Result<String, serde_json::Error> {
        if runs.is_empty() {
            return Ok("No recorded runs".to_string());
        }
        let lines: Vec<String> = runs
            .iter()
            .map(|run| {
                let mut line = format!(
                    "{} {} applied {}/{} finalized {}/{}",
                    run.id_hex(),
                    run.status,
                    run.applied_count(),
                    run.actions.len(),
                    run.posted_count(),
                    run.actions.len()
                );
                if run.dry_run {
                    line.push_str(" (dry run)");
                }
                if let Some(error) = &run.error {
                    line.push_str(&format!(": {}", error));
                }
                line
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_plan(&self, plan: &MigrationPlan) -> Result<String, serde_json::Error> {
        let mut table = Table::new();
        table.set_header(vec!["#", "Stage", "Action", "Detail", "Restart"]);
        for (index, action) in plan.iter().enumerate() {
            table.add_row(vec![
                index.to_string(),
                action.stage().to_string(),
                action.kind_name().to_string(),
                action.detail(),
                if action.requires_restart() { "yes" } else { "" }.to_string(),
            ]);
        }
        Ok(table.to_string())
    }

    fn format_result(&self, result: &ExecutionResult) -> Result<String, serde_json::Error> {
        let mut table = Table::new();
        table.set_header(vec!["Migration", "Status", "Applied", "Finalized", "Total", "Restarted"]);
        table.add_row(vec![
            hex::encode(result.migration_id),
            result.status.to_string(),
            result.applied.to_string(),
            result.posted.to_string(),
            result.total.to_string(),
            result.restarted.to_string(),
        ]);

        let mut output = table.to_string();
        if !result.warnings.is_empty() {
            let mut warnings = Table::new();
            warnings.set_header(vec!["Manual follow-up"]);
            for warning in &result.warnings {
                warnings.add_row(vec![warning]);
            }
            output.push('\n');
            output.push_str(&warnings.to_string());
        }
        Ok(output)
    }

    fn format_runs(&self, runs: &[ExecutionState]) -> Result<String, serde_json::Error> {
        let mut table = Table::new();
        table.set_header(vec!["Migration", "Status", "Applied", "Finalized", "Dry run", "Error"]);
        for run in runs {
            table.add_row(vec![
                run.id_hex(),
                run.status.to_string(),
                format!("{}/{}", run.applied_count(), run.actions.len()),
                format!("{}/{}", run.posted_count(), run.actions.len()),
                run.dry_run.to_string(),
                run.error.clone().unwrap_or_default(),
            ]);
        }
        Ok(table.to_string())
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_plan(&self, plan: &MigrationPlan) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(plan)
    }

    fn format_result(&self, result: &ExecutionResult) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&json!({
            "migration_id": hex::encode(result.migration_id),
            "status": result.status.to_string(),
            "applied": result.applied,
            "posted": result.posted,
            "total": result.total,
            "restarted": result.restarted,
            "warnings": result.warnings,
        }))
    }

    fn format_runs(&self, runs: &[ExecutionState]) -> Result<String, serde_json::Error> {
        let runs: Vec<serde_json::Value> = runs
            .iter()
            .map(|run| {
                json!({
                    "migration_id": run.id_hex(),
                    "status": run.status.to_string(),
                    "dry_run": run.dry_run,
                    "restarted": run.restarted,
                    "started_at": run.started_at,
                    "completed_at": run.completed_at,
                    "error": run.error,
                    "actions": run.actions.iter().map(|a| json!({
                        "index": a.index,
                        "description": a.description,
                        "apply": a.apply.to_string(),
                        "post": a.post.to_string(),
                        "error": a.error,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&runs)
    }
}
