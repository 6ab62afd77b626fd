//! BUSY playbook runner.
//!
//! Binary name: `busy`
//!
//! Parses CLI arguments, sets up tracing, loads the engine configuration and
//! dispatches to the command handler.

mod cli;

use anyhow::Context;
use clap::Parser;

use busy_observe::{TracingOptions, default_filter, init_tracing, shutdown_tracing};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut options = TracingOptions::new(default_filter(cli.verbose, cli.quiet));
    options.enable_otel = cli.otel;
    options.json = cli.json;
    init_tracing(&options).context("Failed to initialize tracing")?;

    let config_path = cli::config::resolve_config_path(cli.config.as_deref());
    let config = busy_core::config::load_engine_config(&config_path).await;

    let result = match cli.command {
        Commands::Run(args) => cli::run::run(args, &config, cli.json, cli.quiet).await,
        Commands::Config => cli::config::show_config(&config, &config_path, cli.json),
    };

    shutdown_tracing();
    result
}
