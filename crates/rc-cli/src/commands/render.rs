//! Render command: fill a register template for one day.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rc_core::{TemplateHandle, TemplateRenderer};

use super::fields::DayArgs;
use super::source::SourceArgs;
use crate::{Config, PlaceholderRenderer};

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub day: DayArgs,

    /// Template with `{{field}}` placeholders.
    #[arg(long)]
    pub template: PathBuf,

    /// Where to write the result. Defaults to stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run<W: Write>(writer: &mut W, args: &RenderArgs, config: &Config) -> Result<()> {
    let course = args.source.load(config)?;
    let fields = args.day.fields(&course)?;

    let template = TemplateHandle {
        name: args.template.display().to_string(),
        content: std::fs::read(&args.template)
            .with_context(|| format!("failed to read {}", args.template.display()))?,
    };
    let rendered = PlaceholderRenderer.render(&template, &fields)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(writer, "Wrote {}", path.display())?;
        }
        None => writer.write_all(&rendered)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rc_core::LessonShape;

    const EXPORT: &str = "\
Topic,Host name,Name,Join time,Leave time
Corso,Docente,Anna Rossi,19/09/2025 09:00 AM,19/09/2025 01:00 PM
Corso,Docente,Bruno Verdi,19/09/2025 09:00 AM,19/09/2025 09:30 AM
Corso,Docente,Bruno Verdi,19/09/2025 12:00 PM,19/09/2025 01:00 PM
";

    fn args(dir: &std::path::Path, output: Option<PathBuf>) -> RenderArgs {
        let export = dir.join("export.csv");
        std::fs::write(&export, EXPORT).unwrap();
        let template = dir.join("register.txt");
        std::fs::write(
            &template,
            "{{course_name}} {{day}}/{{month}}/{{year}} ({{lesson_hours}})\n\
             {{participant_1_name}} {{participant_1_absent}}\n\
             {{participant_2_name}} {{participant_2_absent}}\n",
        )
        .unwrap();

        RenderArgs {
            source: SourceArgs {
                file: Some(export),
                course: None,
            },
            day: DayArgs {
                date: NaiveDate::from_ymd_opt(2025, 9, 19).unwrap(),
                subject: String::new(),
                shape: LessonShape::Both,
            },
            template,
            output,
        }
    }

    #[test]
    fn test_renders_to_stdout() {
        let temp = tempfile::tempdir().unwrap();
        let mut output = Vec::new();
        run(&mut output, &args(temp.path(), None), &Config::default()).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Corso 19/9/2025 (09:00 - 13:00)\nAnna Rossi \nBruno Verdi X\n"
        );
    }

    #[test]
    fn test_renders_to_file() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("out.txt");
        let mut output = Vec::new();
        run(&mut output, &args(temp.path(), Some(target.clone())), &Config::default()).unwrap();

        assert!(String::from_utf8(output).unwrap().starts_with("Wrote "));
        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("Corso 19/9/2025"));
    }
}
