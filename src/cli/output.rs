//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::change::AggregatedState;
use crate::environment::Environment;
use crate::orchestrator::PromotedResource;
use crate::resource::{DiffEntry, SyncAction};
use crate::sync::{EntryStatus, SyncPlan, SyncReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan entry row for table display.
#[derive(Tabled)]
struct PlanEntryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Key")]
    business_key: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Environment row for table display.
#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Promotes to")]
    targets: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a promotion plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &SyncPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &SyncPlan) -> String {
        if plan.is_noop() {
            return format!(
                "{} Environments are in sync - nothing to publish.\n",
                "\u{2713}".green()
            );
        }

        let mut output = String::new();

        let _ = write!(output, "\n\u{1f4cb} Promotion Plan\n");
        let _ = write!(
            output,
            "   {} -> {}\n\n",
            plan.source_environment_id, plan.target_environment_id
        );

        // Create entry table, noops left out
        let rows: Vec<PlanEntryRow> = plan
            .entries
            .iter()
            .filter(|entry| entry.action != SyncAction::Unchanged)
            .enumerate()
            .map(|(i, entry)| PlanEntryRow {
                index: i + 1,
                action: Self::format_action(entry.action),
                resource_type: entry.resource_type.to_string(),
                business_key: entry.business_key.clone(),
                detail: Self::truncate(&Self::entry_detail(entry), 40),
            })
            .collect();

        if !rows.is_empty() {
            let table = Table::new(rows).to_string();
            output.push_str(&table);
            output.push('\n');
        }

        // Summary
        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete, {} unchanged\n",
            plan.count(SyncAction::Create).to_string().green(),
            plan.count(SyncAction::Update).to_string().yellow(),
            plan.count(SyncAction::Delete).to_string().red(),
            plan.count(SyncAction::Unchanged)
        );

        output
    }

    /// Formats a publish report.
    #[must_use]
    pub fn format_report(&self, report: &SyncReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a publish report as text.
    fn format_report_text(report: &SyncReport) -> String {
        let status = if report.success {
            format!("{} Publish complete", "\u{2713}".green())
        } else {
            format!("{} Publish finished with failures", "\u{2717}".red())
        };

        let mut output = format!("{status}\n\n");
        let _ = writeln!(output, "   Created: {}", report.created);
        let _ = writeln!(output, "   Updated: {}", report.updated);
        let _ = writeln!(output, "   Deleted: {}", report.deleted);
        let _ = writeln!(output, "   Unchanged: {}", report.unchanged);
        let _ = writeln!(output, "   Skipped: {}", report.skipped);

        let troubled: Vec<_> = report
            .entries
            .iter()
            .filter(|entry| {
                matches!(entry.status, EntryStatus::Conflict | EntryStatus::Failed)
            })
            .collect();

        if !troubled.is_empty() {
            let _ = write!(output, "\n{} Needs attention:\n", "\u{26a0}".yellow());
            for entry in troubled {
                let _ = writeln!(
                    output,
                    "   - [{}] {} '{}': {}",
                    Self::format_status(entry.status),
                    entry.resource_type,
                    entry.business_key,
                    entry.detail.as_deref().unwrap_or("no detail recorded")
                );
            }
        }

        output
    }

    /// Formats the environments in a bundle.
    #[must_use]
    pub fn format_environments(&self, environments: &[Environment]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(environments).unwrap_or_default(),
            OutputFormat::Text => {
                if environments.is_empty() {
                    return "No environments in bundle.\n".to_string();
                }

                let mut output = String::new();
                let _ = write!(output, "\n\u{1f4e6} Environments\n\n");

                let rows: Vec<EnvironmentRow> = environments
                    .iter()
                    .map(|env| EnvironmentRow {
                        id: env.id.clone(),
                        name: env.name.clone(),
                        targets: if env.promotion_targets.is_empty() {
                            "-".to_string()
                        } else {
                            env.promotion_targets.join(", ")
                        },
                    })
                    .collect();

                let table = Table::new(rows).to_string();
                output.push_str(&table);
                output.push('\n');

                output
            }
        }
    }

    /// Formats a replayed change state.
    #[must_use]
    pub fn format_aggregated(&self, state: &AggregatedState) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&AggregatedJson::from(state)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = write!(
                    output,
                    "\n\u{1f4be} Replayed state for {} '{}'\n\n",
                    state.resource_type, state.resource_id
                );
                let _ = writeln!(output, "   Organization: {}", state.organization_id);
                let _ = writeln!(
                    output,
                    "   Source environment: {}",
                    state.environment_id.as_deref().unwrap_or("none recorded")
                );
                let _ = writeln!(
                    output,
                    "   Changes applied: {} ({} ops skipped)",
                    state.applied_changes, state.skipped_ops
                );

                if state.has_changes() {
                    let _ = write!(
                        output,
                        "\n{}\n",
                        serde_json::to_string_pretty(&state.state).unwrap_or_default()
                    );
                } else {
                    output.push_str("\nNo enabled changes recorded for this resource.\n");
                }

                output
            }
        }
    }

    /// Formats the outcome of a single-resource promotion.
    #[must_use]
    pub fn format_promoted(&self, resource: &PromotedResource) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(resource).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Promoted {} '{}' ({})\n\n",
                    "\u{2713}".green(),
                    resource.resource_type,
                    resource.business_key,
                    Self::format_action(resource.action)
                );

                let _ = writeln!(output, "   Record id: {}", resource.record.id);
                let _ = writeln!(output, "   Environment: {}", resource.record.environment_id);
                let _ = writeln!(output, "   Updated at: {}", resource.record.updated_at);

                output
            }
        }
    }

    /// What a plan entry will touch, for the table's detail column.
    fn entry_detail(entry: &DiffEntry) -> String {
        match entry.action {
            SyncAction::Create => "absent in target".to_string(),
            SyncAction::Delete => "only in target".to_string(),
            SyncAction::Update | SyncAction::Unchanged => entry
                .changed_fields
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Formats a sync action with color.
    fn format_action(action: SyncAction) -> String {
        match action {
            SyncAction::Create => "+create".green().to_string(),
            SyncAction::Update => "~update".yellow().to_string(),
            SyncAction::Delete => "-delete".red().to_string(),
            SyncAction::Unchanged => "noop".dimmed().to_string(),
        }
    }

    /// Formats an entry status with color.
    fn format_status(status: EntryStatus) -> String {
        match status {
            EntryStatus::Applied => "applied".green().to_string(),
            EntryStatus::Unchanged => "unchanged".dimmed().to_string(),
            EntryStatus::Skipped => "skipped".yellow().to_string(),
            EntryStatus::Conflict => "conflict".yellow().to_string(),
            EntryStatus::Failed => "failed".red().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            s.to_string()
        } else {
            format!("{}...", &s[..max_len - 3])
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    source_environment_id: String,
    target_environment_id: String,
    created_at: String,
    creates: usize,
    updates: usize,
    deletes: usize,
    unchanged: usize,
    entries: Vec<PlanEntryJson>,
}

#[derive(serde::Serialize)]
struct PlanEntryJson {
    action: String,
    resource_type: String,
    business_key: String,
    changed_fields: Vec<String>,
}

impl From<&SyncPlan> for PlanJson {
    fn from(plan: &SyncPlan) -> Self {
        Self {
            source_environment_id: plan.source_environment_id.clone(),
            target_environment_id: plan.target_environment_id.clone(),
            created_at: plan.created_at.to_rfc3339(),
            creates: plan.count(SyncAction::Create),
            updates: plan.count(SyncAction::Update),
            deletes: plan.count(SyncAction::Delete),
            unchanged: plan.count(SyncAction::Unchanged),
            entries: plan
                .entries
                .iter()
                .map(|entry| PlanEntryJson {
                    action: entry.action.to_string(),
                    resource_type: entry.resource_type.to_string(),
                    business_key: entry.business_key.clone(),
                    changed_fields: entry
                        .changed_fields
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct AggregatedJson {
    organization_id: String,
    environment_id: Option<String>,
    resource_type: String,
    resource_id: String,
    applied_changes: usize,
    skipped_ops: usize,
    state: serde_json::Value,
}

impl From<&AggregatedState> for AggregatedJson {
    fn from(state: &AggregatedState) -> Self {
        Self {
            organization_id: state.organization_id.clone(),
            environment_id: state.environment_id.clone(),
            resource_type: state.resource_type.to_string(),
            resource_id: state.resource_id.clone(),
            applied_changes: state.applied_changes,
            skipped_ops: state.skipped_ops,
            state: state.state.clone(),
        }
    }
}
