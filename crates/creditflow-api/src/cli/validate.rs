//! `creditflow validate <file>`: structural validation of a definition file.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use creditflow_core::workflow::definition::load_definition;
use creditflow_core::workflow::graph;
use creditflow_types::workflow::{CreateWorkflowRequest, ValidationReport, Workflow, WorkflowStatus};

/// Build a transient draft from a definition so the graph rules can run
/// without touching the database.
fn draft_from(request: CreateWorkflowRequest) -> Workflow {
    let now = Utc::now();
    Workflow {
        id: Uuid::nil(),
        name: request.name,
        description: request.description,
        version: request.version.unwrap_or_else(|| "1.0.0".to_string()),
        status: WorkflowStatus::Draft,
        nodes: request.nodes,
        edges: request.edges,
        created_at: now,
        updated_at: now,
    }
}

/// Validate the definition at `path` and print the report.
///
/// Returns whether the workflow is valid (warnings allowed).
pub fn validate_file(path: &Path, json: bool) -> Result<bool> {
    let request = load_definition(path)
        .with_context(|| format!("failed to load workflow definition {}", path.display()))?;
    let workflow = draft_from(request);
    let report = graph::validate(&workflow);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&workflow, &report);
    }
    Ok(report.valid)
}

fn print_report(workflow: &Workflow, report: &ValidationReport) {
    println!();
    println!(
        "  {} ({} nodes, {} edges)",
        style(&workflow.name).cyan().bold(),
        workflow.nodes.len(),
        workflow.edges.len()
    );
    println!();

    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("  {} No issues found", style("✓").green());
        println!();
        return;
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Severity").fg(Color::White),
        Cell::new("Issue").fg(Color::White),
    ]);
    for issue in &report.errors {
        table.add_row(vec![
            Cell::new("error").fg(Color::Red),
            Cell::new(issue.to_string()),
        ]);
    }
    for issue in &report.warnings {
        table.add_row(vec![
            Cell::new("warning").fg(Color::Yellow),
            Cell::new(issue.to_string()),
        ]);
    }
    println!("{table}");
    println!();

    if report.valid {
        println!("  {} Valid with {} warning(s)", style("✓").green(), report.warnings.len());
    } else {
        println!("  {} {} error(s)", style("✗").red(), report.errors.len());
    }
    println!();
}
