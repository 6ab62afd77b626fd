//! CLI command definitions for the `busy` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod config;
pub mod interface;
pub mod policy;
pub mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Run operation playbooks with checkpoints and human intervention.
#[derive(Parser)]
#[command(name = "busy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Engine config file (default: ~/.busy/config.toml).
    #[arg(long, global = true, env = "BUSY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sample order playbook (validate-order -> process-order).
    Run(RunArgs),

    /// Print the effective engine configuration.
    Config,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Pause before every step until resumed.
    #[arg(long)]
    pub manual: bool,

    /// Who answers intervention prompts.
    #[arg(long, value_enum, default_value_t = PolicyKind::Interactive)]
    pub policy: PolicyKind,

    /// Decision taken by the auto policy when a step fails.
    #[arg(long, value_enum, default_value_t = FailureAction::Abort)]
    pub on_failure: FailureAction,

    /// Retries per step before the auto policy gives up and aborts.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Order reference fed to the first step (an empty value fails validation).
    #[arg(long, default_value = "ORD-001")]
    pub order_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    /// Prompt in the terminal.
    Interactive,
    /// Decide automatically.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailureAction {
    Retry,
    Skip,
    Abort,
}
