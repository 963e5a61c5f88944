//! Console progress output for plan execution

use colored::Colorize;
use declarative::{ActionType, Change, Error, ExecutionResult, Plan, ProgressReporter};
use std::collections::BTreeMap;
use std::io::{self, Write};

#[derive(Debug, Default, Clone, Copy)]
struct NamespaceStats {
    succeeded: usize,
    failed: usize,
    skipped: usize,
}

/// Prints one line per change as the engine works through a plan.
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    dry_run: bool,
    total: usize,
    current: usize,
    show_namespace: bool,
    namespaces: BTreeMap<String, NamespaceStats>,
}

impl ConsoleReporter<io::Stderr> {
    /// Reporter writing to stderr.
    pub fn stderr(dry_run: bool) -> Self {
        Self::new(io::stderr(), dry_run)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, dry_run: bool) -> Self {
        Self {
            out,
            dry_run,
            total: 0,
            current: 0,
            show_namespace: false,
            namespaces: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn stats(&mut self, change: &Change) -> &mut NamespaceStats {
        let namespace = if change.namespace.is_empty() {
            "default"
        } else {
            change.namespace.as_str()
        };
        self.namespaces.entry(namespace.to_string()).or_default()
    }

    fn write_namespace_summary(&mut self) {
        let _ = writeln!(self.out, "Namespace Summary:");
        for (namespace, stats) in &self.namespaces {
            let mut parts = Vec::new();
            if stats.succeeded > 0 {
                parts.push(format!("{} succeeded", stats.succeeded));
            }
            if stats.failed > 0 {
                parts.push(format!("{} failed", stats.failed));
            }
            if stats.skipped > 0 && self.dry_run {
                parts.push(format!("{} validated", stats.skipped));
            }
            if !parts.is_empty() {
                let _ = writeln!(self.out, "  {namespace}: {}", parts.join(", "));
            }
        }
        let _ = writeln!(self.out);
    }

    fn write_errors(&mut self, title: &str, result: &ExecutionResult) {
        let _ = writeln!(self.out, "\n{}", title.red());
        for error in &result.errors {
            let _ = writeln!(
                self.out,
                "  • {} {}: {}",
                error.resource_type, error.resource_name, error.error
            );
        }
    }
}

fn action_verb(action: ActionType) -> &'static str {
    match action {
        ActionType::Create => "Creating",
        ActionType::Update => "Updating",
        ActionType::Delete => "Deleting",
        ActionType::ExternalTool => "Running",
    }
}

impl<W: Write + Send> ProgressReporter for ConsoleReporter<W> {
    fn start_execution(&mut self, plan: &Plan) {
        self.total = plan.execution_order.len();
        self.current = 0;
        self.show_namespace = plan.namespaces().len() > 1;

        let header = if self.dry_run {
            "Validating changes:"
        } else {
            "Applying changes:"
        };
        let _ = writeln!(self.out, "{}", header.bold());
    }

    fn start_change(&mut self, change: &Change) {
        self.current += 1;
        self.stats(change);

        let namespace = if self.show_namespace {
            format!("[namespace: {}] ", change.namespace)
        } else {
            String::new()
        };
        let counter = format!("[{}/{}]", self.current, self.total).blue();
        // Execution-order IDs with no change behind them carry no type.
        let _ = if change.resource_type.is_empty() {
            write!(self.out, "{counter} {namespace}Change {}... ", change.id)
        } else {
            write!(
                self.out,
                "{counter} {namespace}{} {}: {}... ",
                action_verb(change.action),
                change.resource_type,
                change.display_name()
            )
        };
        let _ = self.out.flush();
    }

    fn complete_change(&mut self, change: &Change, error: Option<&Error>) {
        match error {
            Some(err) => {
                self.stats(change).failed += 1;
                let _ = writeln!(self.out, "{} Error: {err}", "✗".red());
            }
            None => {
                self.stats(change).succeeded += 1;
                let _ = writeln!(self.out, "{}", "✓".green());
            }
        }
    }

    fn skip_change(&mut self, change: &Change, reason: &str) {
        self.stats(change).skipped += 1;
        let _ = writeln!(self.out, "{}", format!("⚠ Skipped: {reason}").yellow());
    }

    fn finish_execution(&mut self, result: &ExecutionResult) {
        let _ = writeln!(self.out);
        if self.namespaces.len() > 1 {
            self.write_namespace_summary();
        }

        if result.dry_run {
            let _ = writeln!(
                self.out,
                "Dry run complete. {} changes would be applied.",
                result.skipped_count
            );
            if result.has_errors() {
                self.write_errors("Validation errors:", result);
            }
        } else {
            let _ = writeln!(
                self.out,
                "Complete. Applied {} changes.",
                result.success_count
            );
            if result.has_errors() {
                self.write_errors("Errors:", result);
            }
        }
        let _ = self.out.flush();
    }
}
