//! `apply` and `sync`: load a plan, confirm it, execute it, report
//!
//! Both commands run the same pipeline. They differ in whether DELETE
//! changes are allowed and in the mode handed to decK steps.

use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{
    ExecRunner, ExecutionResult, Executor, ExternalToolConfig, Plan, PlanMode,
};
use konnect::{GatewayServiceAdapter, HttpClient, KonnectApi};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Context;
use crate::cli::{ExecuteArgs, OutputFormat};
use crate::config::{Config, Settings};
use crate::report::ExecutionReport;
use crate::reporter::ConsoleReporter;
use crate::ui;

const STDIN: &str = "-";

pub fn run(ctx: &Context, mode: PlanMode, args: &ExecuteArgs) -> Result<()> {
    check_flags(args)?;
    let text = args.output == OutputFormat::Text;

    let settings = Settings::resolve(
        Config::load()?,
        ctx.token.as_deref(),
        ctx.base_url.as_deref(),
        args.deck_path.as_deref(),
    )?;

    if text && !ctx.quiet {
        ui::info(&format!("Using plan from: {}", plan_source(&args.plan)));
    }
    let mut plan = load_plan(&args.plan)?;
    if let Some(warning) = check_plan(&plan, mode)? {
        ui::warn(&warning);
    }

    if plan.is_empty() {
        if text {
            ui::success("No changes needed. Resources match configuration.");
            return Ok(());
        }
        return emit(&plan, &ExecutionResult::new(args.dry_run), args);
    }

    if text {
        eprint!("{}", ui::plan_summary(&plan));
        if !args.dry_run && !args.auto_approve {
            if let Some(warning) = ui::delete_warning(&plan) {
                eprintln!();
                eprint!("{warning}");
            }
            eprintln!();
            if !ui::confirm("Do you want to continue?")? {
                bail!("{mode} cancelled");
            }
        }
        eprintln!();
    }

    let api: Arc<dyn KonnectApi> = Arc::new(HttpClient::with_options(
        settings.token.clone(),
        &settings.base_url,
        settings.timeout,
    ));
    let deck = deck_config(api.clone(), &settings, mode, plan_base_dir(args));
    let mut executor = build_executor(api, args.dry_run, Some(deck));
    if text {
        executor = executor.with_reporter(Box::new(ConsoleReporter::stderr(args.dry_run)));
    }

    let result = executor.execute(&mut plan)?;
    emit(&plan, &result, args)?;

    if result.has_errors() {
        bail!("execution completed with {} errors", result.failure_count);
    }
    Ok(())
}

/// Flag combinations that cannot work, rejected before any I/O.
fn check_flags(args: &ExecuteArgs) -> Result<()> {
    let confirmable = args.dry_run || args.auto_approve;
    if args.output == OutputFormat::Json && !confirmable {
        bail!(
            "cannot use json output format without --auto-approve or --dry-run flag \
             (interactive confirmation not available with structured output)"
        );
    }
    if args.plan == Path::new(STDIN) && !confirmable {
        bail!(
            "cannot read the plan from stdin without --auto-approve or --dry-run flag \
             (no terminal available for interactive confirmation)"
        );
    }
    Ok(())
}

fn plan_source(path: &Path) -> String {
    if path == Path::new(STDIN) {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}

/// Read a plan from a file, or from stdin for `-`.
fn load_plan(path: &Path) -> Result<Plan> {
    if path != Path::new(STDIN) {
        return Plan::from_path(path);
    }
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read plan from stdin")?;
    Plan::from_json(&content).context("Failed to parse plan from stdin")
}

/// Mode rules; returns a warning to show when the plan is usable anyway.
fn check_plan(plan: &Plan, mode: PlanMode) -> Result<Option<String>> {
    if mode != PlanMode::Apply {
        return Ok(None);
    }
    if plan.has_deletes() {
        bail!("apply command cannot execute plans with DELETE operations. Use 'sync' command instead");
    }
    if plan.metadata.mode == PlanMode::Sync {
        return Ok(Some(
            "Plan was generated in sync mode but apply will skip DELETE operations".to_string(),
        ));
    }
    Ok(None)
}

fn plan_base_dir(args: &ExecuteArgs) -> Option<PathBuf> {
    args.base_dir.clone().or_else(|| {
        args.plan
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    })
}

fn deck_config(
    api: Arc<dyn KonnectApi>,
    settings: &Settings,
    mode: PlanMode,
    base_dir: Option<PathBuf>,
) -> ExternalToolConfig {
    let mut config = ExternalToolConfig::new(Box::new(ExecRunner::with_program(&settings.deck_path)))
        .with_gateway_services(Box::new(GatewayServiceAdapter::new(api)))
        .with_konnect(settings.token.clone(), settings.base_url.clone())
        .with_mode(mode);
    if let Some(dir) = base_dir {
        config = config.with_plan_base_dir(dir);
    }
    config
}

/// Engine with every Konnect adapter registered.
fn build_executor(
    api: Arc<dyn KonnectApi>,
    dry_run: bool,
    deck: Option<ExternalToolConfig>,
) -> Executor {
    let executor = Executor::new(dry_run).with_registry(konnect::register_all(api));
    match deck {
        Some(deck) => executor.with_external_tool(deck),
        None => executor,
    }
}

/// Structured output; text output was already streamed by the reporter.
fn emit(plan: &Plan, result: &ExecutionResult, args: &ExecuteArgs) -> Result<()> {
    let report = ExecutionReport::new(plan, result);
    if let Some(path) = &args.execution_report_file {
        report.write_to(path)?;
        log::info!("Wrote execution report to {}", path.display());
    }
    if args.output == OutputFormat::Json {
        println!("{}", report.to_json()?);
    }
    Ok(())
}
