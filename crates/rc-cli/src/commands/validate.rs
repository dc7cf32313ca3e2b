//! Validate command.

use std::io::Write;

use anyhow::{Result, bail};
use clap::Args;

use super::source::SourceArgs;
use crate::Config;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Prints the validation report and fails if it has errors.
pub fn run<W: Write>(writer: &mut W, args: &ValidateArgs, config: &Config) -> Result<()> {
    let course = args.source.load(config)?;
    let report = course.validate();

    if args.json {
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
    } else {
        write!(writer, "{report}")?;
    }

    if !report.is_ok() {
        bail!("validation failed with {} error(s)", report.errors.len());
    }
    Ok(())
}
