//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::analyze::AnalyzeArgs;
use crate::commands::fields::FieldsArgs;
use crate::commands::import::ImportArgs;
use crate::commands::merge::MergeArgs;
use crate::commands::render::RenderArgs;
use crate::commands::validate::ValidateArgs;

/// Attendance registers from conferencing exports.
///
/// Reads join/leave exports, works out who was present each day, merges the
/// different spellings of each participant's name and fills register
/// templates.
#[derive(Debug, Parser)]
#[command(name = "rc", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Store an export in the database under a course.
    Import(ImportArgs),

    /// Show participants, merges and daily attendance.
    Analyze(AnalyzeArgs),

    /// Check a course for missing or suspicious data.
    Validate(ValidateArgs),

    /// Print the register fields for one day.
    Fields(FieldsArgs),

    /// Fill a register template for one day.
    Render(RenderArgs),

    /// Record a manual merge of participant names.
    Merge(MergeArgs),
}
