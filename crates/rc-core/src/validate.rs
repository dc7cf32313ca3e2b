//! Non-blocking checks on a parsed course.
//!
//! Errors mean the course cannot produce meaningful documents; warnings point
//! at data worth a second look. Neither stops the pipeline.

use std::fmt;

use serde::Serialize;

use crate::course::CourseDataset;

/// Days with fewer distinct names than this are reported as sparse.
pub const SPARSE_DAY_THRESHOLD: usize = 3;

/// One validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    MissingCourseName,
    NoDays,
    NoParticipants,
    NoOrganizer,
    MissingEmails { count: usize },
    SparseDays { count: usize },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCourseName => f.write_str("course name is missing"),
            Self::NoDays => f.write_str("no lesson days found"),
            Self::NoParticipants => f.write_str("no participants found"),
            Self::NoOrganizer => f.write_str("no organizer identified"),
            Self::MissingEmails { count } => write!(f, "{count} participant(s) without email"),
            Self::SparseDays { count } => write!(
                f,
                "{count} day(s) with fewer than {SPARSE_DAY_THRESHOLD} participants"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() && self.warnings.is_empty() {
            return writeln!(f, "OK");
        }
        for error in &self.errors {
            writeln!(f, "error: {error}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}

pub(crate) fn validate(course: &CourseDataset) -> ValidationReport {
    let mut report = ValidationReport::default();
    let participants = course.participants();

    if course.course_name().is_none() {
        report.errors.push(Finding::MissingCourseName);
    }
    if course.days().next().is_none() {
        report.errors.push(Finding::NoDays);
    }
    if participants.is_empty() {
        report.errors.push(Finding::NoParticipants);
    }

    if course.organizer().is_none() {
        report.warnings.push(Finding::NoOrganizer);
    }
    let missing_emails = participants.iter().filter(|p| p.email.is_none()).count();
    if missing_emails > 0 {
        report.warnings.push(Finding::MissingEmails {
            count: missing_emails,
        });
    }
    let sparse = course
        .days()
        .filter(|d| d.participant_names.len() < SPARSE_DAY_THRESHOLD)
        .count();
    if sparse > 0 {
        report.warnings.push(Finding::SparseDays { count: sparse });
    }

    tracing::debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validated course"
    );
    report
}
