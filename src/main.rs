mod cli;
mod commands;
mod config;
mod report;
mod reporter;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use declarative::PlanMode;
use std::io;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub token: Option<String>,
    pub base_url: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        token: cli.token,
        base_url: cli.base_url,
    };

    let result = match cli.command {
        Command::Apply(args) => commands::execute::run(&ctx, PlanMode::Apply, &args),
        Command::Sync(args) => commands::execute::run(&ctx, PlanMode::Sync, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "kongctl", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(err) = &result
        && let Some(konnect_err) = err.downcast_ref::<konnect::Error>()
    {
        ui::info(konnect_err.category().advice());
    }
    result
}
