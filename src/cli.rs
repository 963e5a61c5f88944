use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kongctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Apply declarative configuration plans to Kong Konnect", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Konnect personal access token
    #[arg(long, env = "KONGCTL_KONNECT_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Konnect API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create and update resources from a plan (never deletes)
    Apply(ExecuteArgs),

    /// Make Konnect match a plan, deleting managed resources it no longer lists
    Sync(ExecuteArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan execution
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct ExecuteArgs {
    /// Plan file produced by `kongctl plan`
    #[arg(long)]
    pub plan: PathBuf,

    /// Validate every change against Konnect without modifying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub auto_approve: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Directory relative decK paths resolve against (default: the plan's directory)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// decK binary to run for external tool steps
    #[arg(long)]
    pub deck_path: Option<PathBuf>,

    /// Also write the JSON execution report to this file
    #[arg(long)]
    pub execution_report_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
