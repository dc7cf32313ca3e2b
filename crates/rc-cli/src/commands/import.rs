//! Import command for storing exports in the local `SQLite` database.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Args;
use rc_core::{BlobKey, BlobStore, CourseId, SessionSlot, read_export};

use super::source::open_store;
use crate::Config;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Export file to store.
    pub file: PathBuf,

    /// Course to store it under.
    #[arg(long)]
    pub course: String,

    /// Day to file it under. Defaults to the first day in the export.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Part of the day the export covers.
    #[arg(long, default_value = "full")]
    pub session: SessionSlot,
}

pub fn run<W: Write>(writer: &mut W, args: &ImportArgs, config: &Config) -> Result<()> {
    let course = CourseId::new(args.course.as_str()).context("invalid course id")?;
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let rows = read_export(&text).with_context(|| format!("failed to parse {}", args.file.display()))?;

    let days: BTreeSet<NaiveDate> = rows.iter().map(rc_core::RawEventRow::day).collect();
    let Some(first_day) = days.first().copied() else {
        bail!("{} contains no attendance rows", args.file.display());
    };

    let key = BlobKey::new(course, args.date.unwrap_or(first_day), args.session);
    let mut store = open_store(config)?;
    store.put(&key, text.as_bytes())?;

    writeln!(
        writer,
        "Stored {} rows over {} day(s) as {key}",
        rows.len(),
        days.len()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_store::SqliteStore;

    const EXPORT: &str = "Host name,Name,Join time,Leave time\n\
                          Docente,Anna Rossi,19/09/2025 09:00 AM,19/09/2025 01:00 PM\n\
                          Docente,Anna Rossi,20/09/2025 09:00 AM,20/09/2025 01:00 PM\n";

    fn config(dir: &std::path::Path) -> Config {
        Config {
            database_path: dir.join("data/rc.db"),
            ..Config::default()
        }
    }

    #[test]
    fn test_import_stores_export_under_first_day() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("export.csv");
        std::fs::write(&file, EXPORT).unwrap();
        let config = config(temp.path());

        let mut output = Vec::new();
        let args = ImportArgs {
            file,
            course: "sicurezza".to_string(),
            date: None,
            session: SessionSlot::Full,
        };
        run(&mut output, &args, &config).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Stored 2 rows over 2 day(s) as sicurezza/2025-09-19/full\n"
        );
        let store = SqliteStore::open(&config.database_path).unwrap();
        let keys = store.list(&CourseId::new("sicurezza").unwrap()).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(store.get(&keys[0]).unwrap(), Some(EXPORT.as_bytes().to_vec()));
    }

    #[test]
    fn test_import_rejects_export_without_rows() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("empty.csv");
        std::fs::write(&file, "Name,Join time,Leave time\n").unwrap();

        let args = ImportArgs {
            file,
            course: "sicurezza".to_string(),
            date: None,
            session: SessionSlot::Morning,
        };
        let err = run(&mut Vec::new(), &args, &config(temp.path())).unwrap_err();
        assert!(err.to_string().contains("contains no attendance rows"));
    }
}
