//! Where a command reads its course from: an export file or the database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rc_core::{CourseDataset, CourseId, CourseOptions, load_course, parse_course};
use rc_store::SqliteStore;

use crate::Config;

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Export file to read directly.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Course previously stored with `rc import`.
    #[arg(long)]
    pub course: Option<String>,
}

impl SourceArgs {
    /// Parses the course, replaying stored manual merges for database courses.
    pub fn load(&self, config: &Config) -> Result<CourseDataset> {
        let options = config.course_options();
        if let Some(path) = &self.file {
            return load_file(path, &options);
        }
        let course = self
            .course
            .as_deref()
            .context("either --file or --course is required")?;
        let course = CourseId::new(course).context("invalid course id")?;
        load_stored(&open_store(config)?, &course, &options)
    }
}

fn load_file(path: &Path, options: &CourseOptions) -> Result<CourseDataset> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_course(&text, options).with_context(|| format!("failed to parse {}", path.display()))
}

/// Loads a stored course and replays its manual merges in order.
pub fn load_stored(store: &SqliteStore, course: &CourseId, options: &CourseOptions) -> Result<CourseDataset> {
    let mut dataset = load_course(store, course, options)
        .with_context(|| format!("failed to load course {course}"))?;

    for merge in store.manual_merges(course)? {
        if let Err(e) = dataset.apply_manual_merge(&merge) {
            tracing::warn!(error = %e, names = ?merge.names, "stored merge no longer applies");
        }
    }
    Ok(dataset)
}

/// Opens the configured database, creating its directory if needed.
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    SqliteStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}
