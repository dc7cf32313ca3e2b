//! Merge command: record a manual merge for a stored course.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use rc_core::{CourseId, ManualMerge};

use super::source::{load_stored, open_store};
use crate::Config;

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Course previously stored with `rc import`.
    #[arg(long)]
    pub course: String,

    /// Participant name to merge. Repeat for each name.
    #[arg(long = "name", required = true, num_args = 1)]
    pub names: Vec<String>,

    /// Name to keep. Defaults to the alphabetically smallest.
    #[arg(long)]
    pub primary: Option<String>,
}

/// Checks the merge against the current course, then stores it.
///
/// Stored merges are replayed every time the course is loaded.
pub fn run<W: Write>(writer: &mut W, args: &MergeArgs, config: &Config) -> Result<()> {
    let course = CourseId::new(args.course.as_str()).context("invalid course id")?;
    let request = ManualMerge {
        names: args.names.clone(),
        primary: args.primary.clone(),
    };

    let mut store = open_store(config)?;
    let mut dataset = load_stored(&store, &course, &config.course_options())?;
    let mapping = dataset
        .apply_manual_merge(&request)
        .context("merge rejected")?;
    store.add_manual_merge(&course, &request)?;

    let folded: Vec<&str> = mapping
        .merged_names
        .iter()
        .filter(|n| **n != mapping.primary_name)
        .map(String::as_str)
        .collect();
    writeln!(
        writer,
        "Merged {} into {}",
        folded.join(", "),
        mapping.primary_name
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_core::{BlobKey, BlobStore, SessionSlot};

    const EXPORT: &str = "\
Topic,Host name,Name,Join time,Leave time
Corso,Docente,Anna Rossi,19/09/2025 09:00 AM,19/09/2025 01:00 PM
Corso,Docente,Mario Bianchi,19/09/2025 09:00 AM,19/09/2025 01:00 PM
Corso,Docente,Bianchi M,20/09/2025 09:00 AM,20/09/2025 01:00 PM
";

    fn setup(dir: &std::path::Path) -> Config {
        let config = Config {
            database_path: dir.join("rc.db"),
            ..Config::default()
        };
        let mut store = open_store(&config).unwrap();
        let key = BlobKey::new(
            CourseId::new("sicurezza").unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 9, 19).unwrap(),
            SessionSlot::Full,
        );
        store.put(&key, EXPORT.as_bytes()).unwrap();
        config
    }

    fn args(names: &[&str], primary: Option<&str>) -> MergeArgs {
        MergeArgs {
            course: "sicurezza".to_string(),
            names: names.iter().map(ToString::to_string).collect(),
            primary: primary.map(str::to_string),
        }
    }

    #[test]
    fn test_merge_is_stored_and_replayed() {
        let temp = tempfile::tempdir().unwrap();
        let config = setup(temp.path());

        let mut output = Vec::new();
        run(
            &mut output,
            &args(&["Bianchi M", "Mario Bianchi"], Some("Mario Bianchi")),
            &config,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Merged Bianchi M into Mario Bianchi\n"
        );

        let store = open_store(&config).unwrap();
        let course = CourseId::new("sicurezza").unwrap();
        let dataset = load_stored(&store, &course, &config.course_options()).unwrap();
        let names: Vec<&str> = dataset
            .participants()
            .iter()
            .map(|p| p.primary_name.as_str())
            .collect();
        assert_eq!(names, vec!["Anna Rossi", "Mario Bianchi"]);
    }

    #[test]
    fn test_rejected_merge_is_not_stored() {
        let temp = tempfile::tempdir().unwrap();
        let config = setup(temp.path());

        let err = run(&mut Vec::new(), &args(&["Anna Rossi", "Nobody"], None), &config).unwrap_err();
        assert_eq!(err.to_string(), "merge rejected");

        let store = open_store(&config).unwrap();
        let course = CourseId::new("sicurezza").unwrap();
        assert!(store.manual_merges(&course).unwrap().is_empty());
    }
}
