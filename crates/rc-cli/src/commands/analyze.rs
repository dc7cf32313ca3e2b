//! Analyze command: roster, merges and attendance for a course.

use std::io::{self, Write};

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use rc_core::interval::format_hour_range;
use rc_core::{AliasMapping, CourseDataset, CourseStats, LessonShape};
use serde::Serialize;

use super::source::SourceArgs;
use crate::Config;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Lesson shape used for the hour ranges.
    #[arg(long, default_value = "both")]
    pub shape: LessonShape,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

// ========== Report Data ==========

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantRow {
    pub order: u32,
    pub name: String,
    pub email: Option<String>,
    /// Other names merged into this participant.
    pub aliases: Vec<String>,
    pub days_present: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateRow {
    pub name: String,
    pub score: f64,
    pub tier: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuggestionRow {
    pub target: String,
    pub candidates: Vec<CandidateRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayRow {
    pub date: NaiveDate,
    pub lesson_hours: String,
    pub present: usize,
    pub total: usize,
    pub absent: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeReport {
    pub course_name: Option<String>,
    pub organizer: Option<String>,
    pub stats: CourseStats,
    pub participants: Vec<ParticipantRow>,
    pub merges: Vec<AliasMapping>,
    pub suggestions: Vec<SuggestionRow>,
    pub days: Vec<DayRow>,
}

/// Collects everything the report shows.
pub fn build_report(course: &CourseDataset, shape: LessonShape) -> AnalyzeReport {
    let participants = course
        .participants()
        .into_iter()
        .map(|p| ParticipantRow {
            order: p.master_order,
            name: p.primary_name.clone(),
            email: p.email.clone(),
            aliases: p
                .aliases
                .iter()
                .filter(|a| **a != p.primary_name)
                .cloned()
                .collect(),
            days_present: p.days_present.len(),
        })
        .collect();

    let suggestions = course
        .pending_suggestions()
        .iter()
        .map(|s| SuggestionRow {
            target: s.target_name.clone(),
            candidates: s
                .scored_candidates()
                .map(|(name, score)| CandidateRow {
                    name: name.to_string(),
                    score: score.value(),
                    tier: score.tier().as_str(),
                })
                .collect(),
        })
        .collect();

    let days = course
        .attendance_by_day()
        .into_iter()
        .map(|day| DayRow {
            date: day.date,
            lesson_hours: format_hour_range(&course.lesson_hours(day.date, shape), course.rules()),
            present: day.present_count(),
            total: day.participants.len(),
            absent: day
                .participants
                .iter()
                .filter(|p| !p.attendance.is_present)
                .map(|p| p.name.clone())
                .collect(),
        })
        .collect();

    AnalyzeReport {
        course_name: course.course_name().map(str::to_string),
        organizer: course.organizer().map(|o| o.primary_name.clone()),
        stats: course.stats(),
        participants,
        merges: course.mappings().to_vec(),
        suggestions,
        days,
    }
}

// ========== Human-Readable Output ==========

pub fn write_report<W: Write>(writer: &mut W, report: &AnalyzeReport) -> io::Result<()> {
    writeln!(writer, "Course: {}", report.course_name.as_deref().unwrap_or("-"))?;
    writeln!(writer, "Organizer: {}", report.organizer.as_deref().unwrap_or("-"))?;
    writeln!(
        writer,
        "Days: {}  Participants: {}  Sessions: {}  Merged: {}",
        report.stats.total_days,
        report.stats.participant_count,
        report.stats.total_sessions,
        report.stats.merged_identities
    )?;

    writeln!(writer)?;
    writeln!(writer, "PARTICIPANTS")?;
    for p in &report.participants {
        write!(
            writer,
            "{:>4}  {:<24}  {:<24}  {:>2} day(s)",
            p.order,
            p.name,
            p.email.as_deref().unwrap_or("-"),
            p.days_present
        )?;
        if !p.aliases.is_empty() {
            write!(writer, "  aka {}", p.aliases.join(", "))?;
        }
        writeln!(writer)?;
    }

    if !report.merges.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "MERGES")?;
        for m in &report.merges {
            let folded: Vec<&str> = m
                .merged_names
                .iter()
                .filter(|n| **n != m.primary_name)
                .map(String::as_str)
                .collect();
            writeln!(
                writer,
                "  {} <- {}  ({}, {:.2})",
                m.primary_name,
                folded.join(", "),
                m.kind,
                m.confidence.value()
            )?;
        }
    }

    if !report.suggestions.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "SUGGESTIONS")?;
        for s in &report.suggestions {
            let candidates: Vec<String> = s
                .candidates
                .iter()
                .map(|c| format!("{} ({:.2} {})", c.name, c.score, c.tier))
                .collect();
            writeln!(writer, "  {} ? {}", s.target, candidates.join(", "))?;
        }
    }

    writeln!(writer)?;
    writeln!(writer, "ATTENDANCE")?;
    for day in &report.days {
        write!(
            writer,
            "  {}  {}  {}/{} present",
            day.date, day.lesson_hours, day.present, day.total
        )?;
        if !day.absent.is_empty() {
            write!(writer, "  absent: {}", day.absent.join(", "))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

// ========== Public Interface ==========

pub fn run<W: Write>(writer: &mut W, args: &AnalyzeArgs, config: &Config) -> Result<()> {
    let course = args.source.load(config)?;
    let report = build_report(&course, args.shape);
    if args.json {
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
    } else {
        write_report(writer, &report)?;
    }
    Ok(())
}
