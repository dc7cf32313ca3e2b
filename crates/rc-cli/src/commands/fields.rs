//! Fields command: the register field map for one day.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use rc_core::{CourseDataset, FieldMap, LessonShape, day_fields};

use super::source::SourceArgs;
use crate::Config;

/// Options shared by the commands that fill one day's register.
#[derive(Debug, Args)]
pub struct DayArgs {
    /// Lesson day.
    #[arg(long)]
    pub date: NaiveDate,

    /// Subject taught that day.
    #[arg(long, default_value = "")]
    pub subject: String,

    /// Which part of the day the lesson hours cover.
    #[arg(long, default_value = "both")]
    pub shape: LessonShape,
}

impl DayArgs {
    pub fn fields(&self, course: &CourseDataset) -> Result<FieldMap> {
        day_fields(course, self.date, &self.subject, self.shape)
            .with_context(|| format!("no attendance recorded on {}", self.date))
    }
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub day: DayArgs,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &FieldsArgs, config: &Config) -> Result<()> {
    let course = args.source.load(config)?;
    let fields = args.day.fields(&course)?;

    if args.json {
        serde_json::to_writer_pretty(&mut *writer, &fields)?;
        writeln!(writer)?;
    } else {
        for (key, value) in &fields {
            writeln!(writer, "{key}={value}")?;
        }
    }
    Ok(())
}
