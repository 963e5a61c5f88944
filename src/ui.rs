//! Terminal output helpers.
//!
//! Human-readable output goes to stderr so `--output json` keeps stdout
//! machine-readable.

use anyhow::Result;
use colored::Colorize;
use declarative::protection::is_protection_change;
use declarative::{ActionType, Change, Plan, Protection};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Print an info message
pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg);
}

/// Ask for confirmation; anything but an explicit yes declines.
pub fn confirm(prompt: &str) -> Result<bool> {
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(confirmed)
}

// ============================================================================
// Plan Rendering
// ============================================================================

fn action_prefix(action: ActionType) -> String {
    match action {
        ActionType::Create => "+".green().to_string(),
        ActionType::Update => "~".yellow().to_string(),
        ActionType::Delete => "-".red().to_string(),
        ActionType::ExternalTool => "»".cyan().to_string(),
    }
}

fn namespace_of(change: &Change) -> &str {
    if change.namespace.is_empty() {
        "default"
    } else {
        &change.namespace
    }
}

/// Changes grouped by namespace, then by resource type in execution order.
fn group_changes(plan: &Plan) -> BTreeMap<&str, Vec<(&str, Vec<&Change>)>> {
    let ordered = plan
        .execution_order
        .iter()
        .filter_map(|id| plan.change(id));

    let mut grouped: BTreeMap<&str, Vec<(&str, Vec<&Change>)>> = BTreeMap::new();
    for change in ordered {
        let types = grouped.entry(namespace_of(change)).or_default();
        match types.iter_mut().find(|(t, _)| *t == change.resource_type) {
            Some((_, changes)) => changes.push(change),
            None => types.push((change.resource_type.as_str(), vec![change])),
        }
    }
    grouped
}

/// Render the overview shown before confirmation.
pub fn plan_summary(plan: &Plan) -> String {
    let mut out = String::new();
    let total = plan.execution_order.len();
    let _ = writeln!(out, "{}", format!("Plan Summary ({total} changes):").bold());

    if total == 0 {
        let _ = writeln!(out, "  No changes");
        return out;
    }

    for (namespace, types) in group_changes(plan) {
        let count: usize = types.iter().map(|(_, changes)| changes.len()).sum();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} ({count} changes)",
            format!("Namespace: {namespace}").cyan()
        );
        for (resource_type, changes) in types {
            let _ = writeln!(out, "  {resource_type} ({}):", changes.len());
            for change in changes {
                let mut line = format!(
                    "    {} {}",
                    action_prefix(change.action),
                    change.display_name()
                );
                if let Some(parent) = change.parent.as_ref().filter(|p| !p.reference.is_empty()) {
                    line.push_str(&format!(" {}", format!("(in {})", parent.reference).dimmed()));
                }
                if is_protection_change(change.protection.as_ref()) {
                    let verb = if change.protection.as_ref().is_some_and(Protection::desired) {
                        "protect"
                    } else {
                        "unprotect"
                    };
                    line.push_str(&format!(" {}", format!("[{verb}]").magenta()));
                }
                let _ = writeln!(out, "{line}");
            }
        }
    }
    out
}

/// List of resources a plan deletes, if any.
pub fn delete_warning(plan: &Plan) -> Option<String> {
    let deletes: Vec<&Change> = plan
        .changes
        .iter()
        .filter(|c| c.action == ActionType::Delete)
        .collect();
    if deletes.is_empty() {
        return None;
    }

    let mut out = format!("{}\n", "WARNING: This operation will DELETE resources:".red().bold());
    for change in deletes {
        let _ = writeln!(
            out,
            "  - {}: {} [namespace: {}]",
            change.resource_type,
            change.display_name(),
            namespace_of(change)
        );
    }
    Some(out)
}
