use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rc_cli::commands::{analyze, fields, import, merge, render, validate};
use rc_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays clean on stdout
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Import(args) => import::run(&mut out, args, &config)?,
        Commands::Analyze(args) => analyze::run(&mut out, args, &config)?,
        Commands::Validate(args) => validate::run(&mut out, args, &config)?,
        Commands::Fields(args) => fields::run(&mut out, args, &config)?,
        Commands::Render(args) => render::run(&mut out, args, &config)?,
        Commands::Merge(args) => merge::run(&mut out, args, &config)?,
    }
    out.flush()?;

    Ok(())
}
