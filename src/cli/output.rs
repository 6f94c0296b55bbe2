//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::builder::Builder;
use tabled::{Table, Tabled};

use crate::config::{StackConfig, ValidationResult};
use crate::graph::{Property, ResourceGraph};
use crate::network::SubnetLayout;
use crate::planner::{ActionType, DiffResult, ExecutionResult, StackPlan};
use crate::state::StackState;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "After")]
    after: String,
}

/// Subnet row for table display.
#[derive(Tabled)]
struct SubnetRow {
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Public")]
    public: String,
    #[tabled(rename = "Private")]
    private: String,
}

/// Output row for table display.
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Output")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        result: &ValidationResult,
        config: &StackConfig,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson::new(result, config)),
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Configuration is valid", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Configuration has {} error(s):",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {}: {}", error.field.bold(), error.message);
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                let _ = write!(output, "\nStack summary:\n");
                let _ = writeln!(output, "   Project: {}", config.qualified_name());
                let _ = writeln!(output, "   Region: {}", config.project.region);
                let _ = writeln!(
                    output,
                    "   Network: {} ({}, /{} subnets)",
                    config.network.vpc_name, config.network.vpc_cidr, config.network.subnet_mask
                );
                let _ = writeln!(output, "   Database: {}", yes_no(config.database.is_some()));
                let compute = match (&config.compute, &config.autoscaling) {
                    (Some(_), Some(_)) => "autoscaling group behind a load balancer",
                    (Some(_), None) => "single instance",
                    (None, _) => "none",
                };
                let _ = writeln!(output, "   Compute: {compute}");
                let _ = writeln!(output, "   DNS: {}", yes_no(config.dns.is_some()));
                let _ = writeln!(
                    output,
                    "   Notifications: {}",
                    yes_no(config.notifications.is_some())
                );
                output
            }
        }
    }

    /// Formats the selected zones and derived subnets.
    #[must_use]
    pub fn format_subnets(&self, layout: &SubnetLayout) -> String {
        match self.format {
            OutputFormat::Json => to_json(layout),
            OutputFormat::Text => {
                let rows: Vec<SubnetRow> = layout
                    .zones
                    .iter()
                    .map(|z| SubnetRow {
                        zone: z.zone.clone(),
                        public: z.public.to_string(),
                        private: z.private.to_string(),
                    })
                    .collect();

                let mut output = format!("\nVPC {} across {} zone(s)\n\n", layout.vpc, layout.zones.len());
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats the resource graph in build order.
    #[must_use]
    pub fn format_graph(&self, graph: &ResourceGraph, order: &[&str], show_dependencies: bool) -> String {
        let entries: Vec<(&str, String, Vec<&str>)> = order
            .iter()
            .filter_map(|name| {
                let resource = graph.get(name)?;
                let dependencies = graph.dependencies(name).unwrap_or_default();
                Some((resource.name.as_str(), resource.kind.to_string(), dependencies))
            })
            .collect();

        match self.format {
            OutputFormat::Json => to_json(
                &entries
                    .iter()
                    .map(|(name, kind, dependencies)| {
                        serde_json::json!({ "name": name, "type": kind, "dependencies": dependencies })
                    })
                    .collect::<Vec<_>>(),
            ),
            OutputFormat::Text => {
                let mut builder = Builder::default();
                let mut header = vec!["#", "Resource", "Type"];
                if show_dependencies {
                    header.push("Depends on");
                }
                builder.push_record(header);
                for (i, (name, kind, dependencies)) in entries.iter().enumerate() {
                    let mut record = vec![(i + 1).to_string(), (*name).to_string(), kind.clone()];
                    if show_dependencies {
                        record.push(dependencies.join(", "));
                    }
                    builder.push_record(record);
                }

                let mut output = format!("\n{} resources in build order\n\n", entries.len());
                output.push_str(&builder.build().to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats a stack plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &StackPlan) -> String {
        match self.format {
            OutputFormat::Json => to_json(&PlanJson::from(plan)),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &StackPlan) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - the stack matches the last apply.\n",
                "✓".green()
            );
        }

        let mut output = String::new();

        let _ = write!(output, "\nStack Plan\n");
        let _ = write!(output, "   Config hash: {}\n\n", short(&plan.config_hash));

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| PlanActionRow {
                index: i + 1,
                action: Self::format_action_type(a.action_type),
                resource: a.resource_name.clone(),
                kind: Self::truncate(&a.kind, 50),
                after: a
                    .dependencies
                    .iter()
                    .map(|d| (d + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to replace, {} to delete\n",
            plan.count(ActionType::Create).to_string().green(),
            plan.count(ActionType::Update).to_string().yellow(),
            plan.count(ActionType::Replace).to_string().magenta(),
            plan.count(ActionType::Delete).to_string().red()
        );

        output
    }

    /// Formats the per-resource details of a diff.
    #[must_use]
    pub fn format_diff_details(&self, diff: &DiffResult) -> String {
        if matches!(self.format, OutputFormat::Json) {
            return to_json(
                &diff
                    .actionable_diffs()
                    .iter()
                    .map(|d| {
                        serde_json::json!({
                            "resource": d.name,
                            "change": d.diff_type.to_string(),
                            "fields": d.details.iter().map(|f| &f.field).collect::<Vec<_>>(),
                        })
                    })
                    .collect::<Vec<_>>(),
            );
        }

        let mut output = String::from("\nDetailed changes:\n");
        for resource_diff in diff.actionable_diffs() {
            let _ = writeln!(output, "   {resource_diff}");
            for detail in &resource_diff.details {
                let _ = writeln!(
                    output,
                    "      {}: {} -> {}",
                    detail.field,
                    detail.old_value.as_deref().unwrap_or("-"),
                    detail.new_value.as_deref().unwrap_or("-")
                );
            }
        }
        let _ = writeln!(output, "   ({} unchanged)", diff.unchanged);
        output
    }

    /// Formats the result of recording a plan.
    #[must_use]
    pub fn format_execution(&self, result: &ExecutionResult) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "success": result.success,
                "recorded": result.successful,
                "failed": result.failed,
                "errors": result
                    .results
                    .iter()
                    .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {e}", r.action.resource_name)))
                    .collect::<Vec<_>>(),
            })),
            OutputFormat::Text => {
                let status = if result.all_successful() {
                    format!("{} Apply recorded", "✓".green())
                } else {
                    format!("{} Apply recorded with failures", "✗".red())
                };

                let mut output = format!("{status} ({result})\n");
                for failed in result.results.iter().filter(|r| !r.success) {
                    let _ = writeln!(
                        output,
                        "   - {}: {}",
                        failed.action.resource_name,
                        failed.error.as_deref().unwrap_or("unknown error")
                    );
                }
                output
            }
        }
    }

    /// Formats published outputs.
    #[must_use]
    pub fn format_outputs(&self, outputs: &BTreeMap<String, Property>) -> String {
        match self.format {
            OutputFormat::Json => to_json(outputs),
            OutputFormat::Text => {
                let rows: Vec<OutputRow> = outputs
                    .iter()
                    .map(|(name, value)| OutputRow {
                        name: name.clone(),
                        value: serde_json::to_string(value).unwrap_or_default(),
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats recorded state.
    #[must_use]
    pub fn format_state(&self, state: &StackState) -> String {
        match self.format {
            OutputFormat::Json => to_json(state),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = write!(output, "\nState: {}/{}\n\n", state.project, state.environment);

                let _ = writeln!(output, "   Version: {}", state.version);
                let _ = writeln!(output, "   Config hash: {}", short(&state.config_hash));
                let _ = writeln!(output, "   Stack hash: {}", short(&state.stack_hash));
                let _ = writeln!(output, "   Last updated: {}", state.last_updated);
                let _ = writeln!(output, "   Resources: {}", state.resources.len());
                let _ = writeln!(output, "   Outputs: {}", state.outputs.len());
                if let Some(document) = &state.document {
                    let _ = writeln!(
                        output,
                        "   Document: {} ({}, {})",
                        document.path,
                        document.format,
                        document.written_at.format("%Y-%m-%d %H:%M")
                    );
                }

                if !state.history.is_empty() {
                    let _ = writeln!(output, "\n   Recent history ({}):", state.history.len());
                    for entry in state.history.iter().rev().take(5) {
                        let status = if entry.success { "✓".green() } else { "✗".red() };
                        let _ = writeln!(
                            output,
                            "     {status} {} - {} ({} resources)",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.operation,
                            entry.resources.len()
                        );
                    }
                }

                output
            }
        }
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Replace => "±replace".magenta().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow().to_string(), message)
    }

    fn message(&self, status: &str, marker: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({ "status": status, "message": message })),
            OutputFormat::Text => format!("{marker} {message}"),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn short(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// JSON serialization helpers

#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    project: String,
    errors: Vec<FieldJson<'a>>,
    warnings: &'a [String],
}

#[derive(Serialize)]
struct FieldJson<'a> {
    field: &'a str,
    message: &'a str,
}

impl<'a> ValidationJson<'a> {
    fn new(result: &'a ValidationResult, config: &StackConfig) -> Self {
        Self {
            valid: result.is_valid(),
            project: config.qualified_name(),
            errors: result
                .errors
                .iter()
                .map(|e| FieldJson {
                    field: &e.field,
                    message: &e.message,
                })
                .collect(),
            warnings: &result.warnings,
        }
    }
}

#[derive(Serialize)]
struct PlanJson {
    config_hash: String,
    action_count: usize,
    creates: usize,
    updates: usize,
    replaces: usize,
    deletes: usize,
    actions: Vec<ActionJson>,
}

#[derive(Serialize)]
struct ActionJson {
    action_type: String,
    resource: String,
    kind: String,
    reason: String,
    after: Vec<usize>,
}

impl From<&StackPlan> for PlanJson {
    fn from(plan: &StackPlan) -> Self {
        Self {
            config_hash: plan.config_hash.clone(),
            action_count: plan.action_count(),
            creates: plan.count(ActionType::Create),
            updates: plan.count(ActionType::Update),
            replaces: plan.count(ActionType::Replace),
            deletes: plan.count(ActionType::Delete),
            actions: plan
                .actions
                .iter()
                .map(|a| ActionJson {
                    action_type: a.action_type.to_string(),
                    resource: a.resource_name.clone(),
                    kind: a.kind.clone(),
                    reason: a.reason.clone(),
                    after: a.dependencies.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Resource, ResourceKind};
    use crate::planner::DiffEngine;

    fn graph() -> ResourceGraph {
        ResourceGraph::from_resources(vec![
            Resource::new(ResourceKind::Vpc, "vpc"),
            Resource::new(ResourceKind::InternetGateway, "igw").with("vpcId", Property::reference("vpc", "id")),
        ])
        .expect("graph")
    }

    #[test]
    fn test_plan_json() {
        let plan = StackPlan::from_diff(&DiffEngine::new().compute_diff(&graph(), None), "abcdef0123");
        let json: serde_json::Value =
            serde_json::from_str(&OutputFormatter::new(OutputFormat::Json).format_plan(&plan)).expect("json");
        assert_eq!(json["creates"], 2);
        assert_eq!(json["actions"][1]["after"], serde_json::json!([0]));
    }

    #[test]
    fn test_empty_plan_text() {
        let text = OutputFormatter::new(OutputFormat::Text).format_plan(&StackPlan::empty("cfg"));
        assert!(text.contains("No changes required"));
    }

    #[test]
    fn test_graph_text_lists_dependencies() {
        let graph = graph();
        let order = graph.topological_order().expect("order");
        let text = OutputFormatter::new(OutputFormat::Text).format_graph(&graph, &order, true);
        assert!(text.contains("2 resources in build order"));
        assert!(text.contains("aws:ec2/internetGateway:InternetGateway"));
    }

    #[test]
    fn test_short_hash_handles_short_input() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short("0123456789"), "01234567");
        assert_eq!(OutputFormatter::truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_json_message() {
        let json = OutputFormatter::new(OutputFormat::Json).warning("careful");
        assert!(json.contains("\"warning\""));
    }

    #[test]
    fn test_state_text_shows_document() {
        let mut state = crate::state::StackState::new("shop", "prod");
        state.record_document(std::path::Path::new(".stratus/stack.yaml"), "yaml", "0123456789abcdef");

        let text = OutputFormatter::new(OutputFormat::Text).format_state(&state);
        assert!(text.contains("State: shop/prod"));
        assert!(text.contains("Stack hash: 01234567"));
        assert!(text.contains("Document: .stratus/stack.yaml (yaml,"));
    }
}
