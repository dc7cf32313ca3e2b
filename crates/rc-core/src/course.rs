//! Turning an export into a course dataset.
//!
//! The pipeline runs in four stages:
//!
//! 1. **Parsing**: group rows by calendar day and build the initial roster.
//! 2. **Alias detection**: score every pair of participants.
//! 3. **Alias merging**: fold auto-mergeable duplicates together.
//! 4. **Finalizing**: check that someone besides the organizer is left.
//!
//! Detection and merging repeat until a pass merges nothing, because a merge
//! can give an identity the email or alias that links it to a third one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::{ExportError, RawEventRow, read_export};
use crate::identity::{AliasMapping, AliasSuggestion, ParticipantIdentity, non_empty};
use crate::interval::{
    AttendanceRules, CoursePeriods, LessonShape, ProcessedAttendance, SessionInterval,
    lesson_hours, process_attendance,
};
use crate::merge::{self, ManualMerge, MergeError, MergeMode, Roster};
use crate::similarity::{MatchingRules, detect_aliases};
use crate::types::{IdentityId, MeetingId};
use crate::validate::{self, ValidationReport};

/// The person running the course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerInfo {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Knobs for one course parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseOptions {
    /// Overrides the topic column of the export.
    pub course_name: Option<String>,

    /// Overrides the organizer columns of the export.
    pub organizer: Option<OrganizerInfo>,

    /// Apply auto-mergeable suggestions. When off, suggestions are only
    /// reported.
    pub auto_merge: bool,

    pub attendance: AttendanceRules,
    pub matching: MatchingRules,
}

impl Default for CourseOptions {
    fn default() -> Self {
        Self {
            course_name: None,
            organizer: None,
            auto_merge: true,
            attendance: AttendanceRules::default(),
            matching: MatchingRules::default(),
        }
    }
}

/// Pipeline stage, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Parsing,
    AliasDetection,
    AliasMerging,
    Finalizing,
}

impl PipelineStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::AliasDetection => "alias_detection",
            Self::AliasMerging => "alias_merging",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that abort a course parse.
#[derive(Debug, Error)]
pub enum CourseError {
    #[error("export contains no attendance rows")]
    EmptyInput,
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("no participants besides the organizer")]
    NoParticipants,
}

impl CourseError {
    /// Stage the pipeline was in when it failed.
    #[must_use]
    pub const fn stage(&self) -> PipelineStage {
        match self {
            Self::EmptyInput | Self::Export(_) => PipelineStage::Parsing,
            Self::NoParticipants => PipelineStage::Finalizing,
        }
    }
}

/// One connection of one participant, with its cleaned name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSession {
    pub name: String,
    pub email: Option<String>,
    pub interval: SessionInterval,
    pub guest: bool,
    pub waiting_room: bool,
}

/// Everything the export says about one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub course_name: Option<String>,
    pub meeting_id: Option<MeetingId>,
    pub earliest: NaiveDateTime,
    pub latest: NaiveDateTime,
    pub participant_names: BTreeSet<String>,
    /// Sessions in export order.
    pub sessions: Vec<RawSession>,
}

impl DayRecord {
    fn new(date: NaiveDate, interval: SessionInterval) -> Self {
        Self {
            date,
            course_name: None,
            meeting_id: None,
            earliest: interval.join,
            latest: interval.leave,
            participant_names: BTreeSet::new(),
            sessions: Vec::new(),
        }
    }

    /// Intervals recorded under any of the identity's names.
    pub fn intervals_for(&self, identity: &ParticipantIdentity) -> Vec<SessionInterval> {
        self.sessions
            .iter()
            .filter(|s| identity.answers_to(&s.name))
            .map(|s| s.interval)
            .collect()
    }

    /// Periods anyone attended that day.
    pub fn periods(&self, rules: &AttendanceRules) -> CoursePeriods {
        CoursePeriods::observed(self.sessions.iter().map(|s| &s.interval), rules)
    }
}

/// Counts describing a parsed course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseStats {
    pub total_days: usize,
    /// Participants after merging, organizer excluded.
    pub participant_count: usize,
    pub total_sessions: usize,
    pub merged_identities: usize,
}

/// One participant's attendance on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantAttendance {
    pub identity: IdentityId,
    pub name: String,
    pub attendance: ProcessedAttendance,
}

/// Every participant's attendance on one day, in master order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAttendance {
    pub date: NaiveDate,
    pub periods: CoursePeriods,
    pub participants: Vec<ParticipantAttendance>,
}

impl DayAttendance {
    pub fn present_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.attendance.is_present)
            .count()
    }
}

/// A parsed course: days, resolved roster and merge history.
#[derive(Debug, Clone)]
pub struct CourseDataset {
    course_name: Option<String>,
    organizer: Option<IdentityId>,
    days: BTreeMap<NaiveDate, DayRecord>,
    roster: Roster,
    mappings: Vec<AliasMapping>,
    pending: Vec<AliasSuggestion>,
    rules: AttendanceRules,
}

/// Reads an export and runs the whole pipeline over it.
///
/// # Errors
///
/// Fails if the export cannot be read, has no rows, or contains nobody but
/// the organizer.
pub fn parse_course(text: &str, options: &CourseOptions) -> Result<CourseDataset, CourseError> {
    let rows = read_export(text)?;
    build_course(rows, options)
}

/// Runs the pipeline over already-read rows.
///
/// # Errors
///
/// Fails if `rows` is empty or contains nobody but the organizer.
pub fn build_course(rows: Vec<RawEventRow>, options: &CourseOptions) -> Result<CourseDataset, CourseError> {
    tracing::debug!(stage = %PipelineStage::Parsing, rows = rows.len());
    if rows.is_empty() {
        return Err(CourseError::EmptyInput);
    }

    let course_name = options
        .course_name
        .clone()
        .and_then(|n| non_empty(Some(n)))
        .or_else(|| rows.iter().find_map(|r| non_empty(r.course_name.clone())));
    let organizer = options.organizer.clone().or_else(|| {
        rows.iter().find_map(|r| {
            let name = clean_name(r.organizer_name.as_deref()?);
            (!name.is_empty()).then(|| OrganizerInfo {
                name,
                email: r.organizer_email.clone(),
            })
        })
    });

    let days = group_by_day(rows);
    let initial = initial_roster(&days, organizer.as_ref());
    let organizer_id = initial.iter().find(|p| p.is_organizer).map(|p| p.id);
    let mut roster = Roster::new(initial);

    let mut mappings = Vec::new();
    let pending = loop {
        tracing::debug!(stage = %PipelineStage::AliasDetection, live = roster.live().len());
        let live: Vec<ParticipantIdentity> = roster.live().into_iter().cloned().collect();
        let suggestions = detect_aliases(&live, &options.matching);
        if !options.auto_merge {
            break suggestions;
        }

        tracing::debug!(stage = %PipelineStage::AliasMerging, suggestions = suggestions.len());
        let applied = merge::apply_suggestions(
            &mut roster,
            &suggestions,
            MergeMode::AutoOnly,
            &options.matching,
        );
        if applied.is_empty() {
            break suggestions;
        }
        mappings.extend(applied);
    };

    tracing::debug!(stage = %PipelineStage::Finalizing);
    if roster.live().iter().all(|p| p.is_organizer) {
        return Err(CourseError::NoParticipants);
    }

    let dataset = CourseDataset {
        course_name,
        organizer: organizer_id,
        days,
        roster,
        mappings,
        pending: pending.into_iter().filter(|s| !s.auto_merge || !options.auto_merge).collect(),
        rules: options.attendance.clone(),
    };
    tracing::info!(
        days = dataset.days.len(),
        participants = dataset.stats().participant_count,
        merges = dataset.mappings.len(),
        "course parsed"
    );
    Ok(dataset)
}

/// Trims and collapses internal whitespace.
pub fn clean_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Groups rows into calendar days by join time.
fn group_by_day(rows: Vec<RawEventRow>) -> BTreeMap<NaiveDate, DayRecord> {
    let mut days: BTreeMap<NaiveDate, DayRecord> = BTreeMap::new();

    for row in rows {
        let name = clean_name(&row.participant_name);
        if name.is_empty() {
            continue;
        }
        let interval = row.interval();
        let date = row.day();

        let day = days
            .entry(date)
            .or_insert_with(|| DayRecord::new(date, interval));
        if day.course_name.is_none() {
            day.course_name = non_empty(row.course_name);
        }
        if day.meeting_id.is_none() {
            day.meeting_id = row.meeting_id.and_then(|id| MeetingId::new(id).ok());
        }
        day.earliest = day.earliest.min(interval.join);
        day.latest = day.latest.max(interval.leave);
        day.participant_names.insert(name.clone());
        day.sessions.push(RawSession {
            name,
            email: non_empty(row.participant_email),
            interval,
            guest: row.guest,
            waiting_room: row.waiting_room,
        });
    }

    days
}

/// Organizer first, then everyone else alphabetically (ignoring case).
///
/// Each identity takes the first email recorded under its name and the days
/// its name appears on.
fn initial_roster(
    days: &BTreeMap<NaiveDate, DayRecord>,
    organizer: Option<&OrganizerInfo>,
) -> Vec<ParticipantIdentity> {
    let organizer_name = organizer.map(|o| clean_name(&o.name).to_lowercase());
    let is_organizer = |name: &str| organizer_name.as_deref() == Some(name.to_lowercase().as_str());
    let days_of = |matches: &dyn Fn(&str) -> bool| -> Vec<NaiveDate> {
        days.values()
            .filter(|d| d.participant_names.iter().any(|n| matches(n)))
            .map(|d| d.date)
            .collect()
    };
    let first_email = |matches: &dyn Fn(&str) -> bool| -> Option<String> {
        days.values()
            .flat_map(|d| &d.sessions)
            .filter(|s| matches(&s.name))
            .find_map(|s| s.email.clone())
    };

    let mut roster = Vec::new();
    if let Some(info) = organizer {
        let email = non_empty(info.email.clone()).or_else(|| first_email(&is_organizer));
        roster.push(
            ParticipantIdentity::organizer(IdentityId::new(0), clean_name(&info.name), email)
                .with_days(days_of(&is_organizer)),
        );
    }

    let mut names: Vec<&String> = days
        .values()
        .flat_map(|d| d.participant_names.iter())
        .filter(|n| !is_organizer(n))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    names.sort_by_cached_key(|n| (n.to_lowercase(), (*n).clone()));

    for (order, name) in (1u32..).zip(names) {
        let same_name = |n: &str| n == name;
        let identity = ParticipantIdentity::new(IdentityId::new(order), name.clone(), order)
            .with_email(first_email(&same_name))
            .with_days(days_of(&same_name));
        roster.push(identity);
    }
    roster
}

impl CourseDataset {
    pub fn course_name(&self) -> Option<&str> {
        self.course_name.as_deref()
    }

    pub fn rules(&self) -> &AttendanceRules {
        &self.rules
    }

    pub fn organizer(&self) -> Option<&ParticipantIdentity> {
        self.organizer.and_then(|id| self.roster.get(id))
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.days.get(&date)
    }

    /// Days in calendar order.
    pub fn days(&self) -> impl Iterator<Item = &DayRecord> {
        self.days.values()
    }

    /// Participants other than the organizer, in master order.
    pub fn participants(&self) -> Vec<&ParticipantIdentity> {
        self.roster
            .live()
            .into_iter()
            .filter(|p| !p.is_organizer)
            .collect()
    }

    /// Looks up an identity; ids of merged identities resolve to the survivor.
    pub fn participant(&self, id: IdentityId) -> Option<&ParticipantIdentity> {
        self.roster.get(id)
    }

    /// Finds the identity known under `name`, ignoring case.
    pub fn find_participant(&self, name: &str) -> Option<&ParticipantIdentity> {
        self.roster
            .find_alias(&clean_name(name))
            .and_then(|id| self.roster.get(id))
    }

    /// Merges applied so far, in order.
    pub fn mappings(&self) -> &[AliasMapping] {
        &self.mappings
    }

    /// Suggestions that were not applied automatically.
    pub fn pending_suggestions(&self) -> &[AliasSuggestion] {
        &self.pending
    }

    pub fn stats(&self) -> CourseStats {
        CourseStats {
            total_days: self.days.len(),
            participant_count: self.participants().len(),
            total_sessions: self.days.values().map(|d| d.sessions.len()).sum(),
            merged_identities: self.roster.absorbed_count(),
        }
    }

    /// Attendance of every participant on `date`.
    ///
    /// Participants who did not show up at all are included as absent.
    pub fn attendance_for_day(&self, date: NaiveDate) -> Option<DayAttendance> {
        let day = self.days.get(&date)?;
        Some(self.day_attendance(day))
    }

    /// Attendance for every day, in calendar order.
    pub fn attendance_by_day(&self) -> Vec<DayAttendance> {
        let days: Vec<&DayRecord> = self.days.values().collect();
        days.par_iter().map(|day| self.day_attendance(day)).collect()
    }

    fn day_attendance(&self, day: &DayRecord) -> DayAttendance {
        let periods = day.periods(&self.rules);
        let participants = self
            .participants()
            .into_iter()
            .map(|identity| ParticipantAttendance {
                identity: identity.id,
                name: identity.primary_name.clone(),
                attendance: process_attendance(&day.intervals_for(identity), periods, &self.rules),
            })
            .collect();
        DayAttendance {
            date: day.date,
            periods,
            participants,
        }
    }

    /// Clock hours covered by the lesson on `date`, organizer included.
    pub fn lesson_hours(&self, date: NaiveDate, shape: LessonShape) -> Vec<u32> {
        let Some(day) = self.days.get(&date) else {
            return Vec::new();
        };
        let per_identity: Vec<Vec<SessionInterval>> = self
            .roster
            .live()
            .into_iter()
            .map(|identity| day.intervals_for(identity))
            .filter(|sessions| !sessions.is_empty())
            .collect();
        lesson_hours(per_identity.iter().map(Vec::as_slice), shape, &self.rules)
    }

    /// Merges the named participants into one.
    ///
    /// # Errors
    ///
    /// See [`MergeError`].
    pub fn apply_manual_merge(&mut self, request: &ManualMerge) -> Result<AliasMapping, MergeError> {
        let mapping = merge::apply_manual_merge(&mut self.roster, request)?;
        let live: Vec<IdentityId> = self.roster.live().iter().map(|p| p.id).collect();
        self.pending.retain(|s| live.contains(&s.target));
        self.mappings.push(mapping.clone());
        Ok(mapping)
    }

    pub fn validate(&self) -> ValidationReport {
        validate::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MergeKind;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
    }

    fn row(name: &str, email: &str, day: u32, from: (u32, u32), to: (u32, u32)) -> RawEventRow {
        let at = |(h, m): (u32, u32)| date(day).and_hms_opt(h, m, 0).unwrap();
        RawEventRow {
            course_name: Some("Corso Sicurezza".into()),
            meeting_id: Some("812 3456".into()),
            organizer_name: Some("Docente".into()),
            organizer_email: Some("docente@example.org".into()),
            meeting_start: None,
            meeting_end: None,
            participant_name: name.into(),
            participant_email: (!email.is_empty()).then(|| email.into()),
            join: at(from),
            leave: at(to),
            duration_minutes: None,
            guest: false,
            waiting_room: false,
        }
    }

    fn morning(name: &str, email: &str, day: u32) -> RawEventRow {
        row(name, email, day, (9, 0), (13, 0))
    }

    /// Three days, the same person under three spellings.
    fn three_day_rows() -> Vec<RawEventRow> {
        vec![
            morning("Docente", "", 19),
            morning("G. Santambrogio", "", 19),
            morning("Anna Rossi", "anna@example.org", 19),
            morning("Mario Bianchi", "", 19),
            morning("Docente", "", 20),
            morning("giorgio s.", "giorgio@example.org", 20),
            morning("Anna Rossi", "", 20),
            row("Mario Bianchi", "", 20, (9, 0), (10, 0)),
            morning("Docente", "", 21),
            morning("Giorgio  Santambrogio", "giorgio@example.org", 21),
            morning("Anna Rossi", "", 21),
        ]
    }

    // ========== Pipeline ==========

    #[test]
    fn test_three_spellings_resolve_to_one_identity() {
        let course = build_course(three_day_rows(), &CourseOptions::default()).unwrap();

        let giorgio = course.find_participant("giorgio s.").unwrap();
        assert!(giorgio.aliases.len() >= 2);
        assert_eq!(giorgio.aliases.len(), 3);
        assert_eq!(giorgio.days_present, vec![date(19), date(20), date(21)]);
        assert_eq!(giorgio.primary_name, "G. Santambrogio");
        assert_eq!(giorgio.email.as_deref(), Some("giorgio@example.org"));
        assert!(course.find_participant("Giorgio Santambrogio").is_some_and(|p| p.id == giorgio.id));

        let organizer = course.organizer().unwrap();
        assert_eq!(organizer.master_order, 0);
        assert_eq!(organizer.aliases, vec!["Docente"]);
        assert_eq!(organizer.days_present.len(), 3);

        let names: Vec<&str> = course
            .participants()
            .iter()
            .map(|p| p.primary_name.as_str())
            .collect();
        assert_eq!(names, vec!["Anna Rossi", "G. Santambrogio", "Mario Bianchi"]);
        assert!(course.mappings().iter().all(|m| m.kind == MergeKind::Auto));

        let stats = course.stats();
        assert_eq!(stats.total_days, 3);
        assert_eq!(stats.participant_count, 3);
        assert_eq!(stats.total_sessions, 11);
        assert_eq!(stats.merged_identities, 2);
    }

    #[test]
    fn test_without_auto_merge_suggestions_are_only_reported() {
        let options = CourseOptions {
            auto_merge: false,
            ..CourseOptions::default()
        };
        let course = build_course(three_day_rows(), &options).unwrap();
        assert_eq!(course.participants().len(), 5);
        assert!(course.mappings().is_empty());
        assert!(!course.pending_suggestions().is_empty());
    }

    #[test]
    fn test_medium_pair_stays_pending_after_auto_merge() {
        let rows = vec![
            morning("Docente", "", 19),
            morning("Mario Rossi", "", 19),
            morning("Mario Rossini", "", 20),
        ];
        let course = build_course(rows, &CourseOptions::default()).unwrap();

        assert!(course.mappings().is_empty());
        assert_eq!(course.participants().len(), 2);
        let pending = course.pending_suggestions();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].target_name, "Mario Rossi");
        assert_eq!(pending[0].candidates, vec!["Mario Rossini"]);
        assert!(!pending[0].auto_merge);
    }

    #[test]
    fn test_declared_organizer_overrides_export_columns() {
        let options = CourseOptions {
            organizer: Some(OrganizerInfo {
                name: "anna rossi".into(),
                email: None,
            }),
            course_name: Some("Override".into()),
            ..CourseOptions::default()
        };
        let course = build_course(three_day_rows(), &options).unwrap();
        assert_eq!(course.course_name(), Some("Override"));
        let organizer = course.organizer().unwrap();
        assert_eq!(organizer.primary_name, "anna rossi");
        assert_eq!(organizer.email.as_deref(), Some("anna@example.org"));
        assert!(course.participants().iter().all(|p| !p.answers_to("Anna Rossi")));
        // "Docente" is now an ordinary participant.
        assert!(course.find_participant("docente").is_some_and(|p| !p.is_organizer));
    }

    #[test]
    fn test_empty_input_fails_while_parsing() {
        let err = build_course(Vec::new(), &CourseOptions::default()).unwrap_err();
        assert!(matches!(err, CourseError::EmptyInput));
        assert_eq!(err.stage(), PipelineStage::Parsing);
    }

    #[test]
    fn test_organizer_only_fails_while_finalizing() {
        let rows = vec![morning("Docente", "", 19), morning("docente", "", 20)];
        let err = build_course(rows, &CourseOptions::default()).unwrap_err();
        assert!(matches!(err, CourseError::NoParticipants));
        assert_eq!(err.stage(), PipelineStage::Finalizing);
    }

    #[test]
    fn test_parse_course_reads_text() {
        let text = "Topic,Host name,Name (Original Name),Join time,Leave time\n\
                    Corso,Docente,Docente,19/09/2025 09:00:00 AM,19/09/2025 01:00:00 PM\n\
                    Corso,Docente,Anna Rossi,19/09/2025 09:00:00 AM,19/09/2025 01:00:00 PM\n";
        let course = parse_course(text, &CourseOptions::default()).unwrap();
        assert_eq!(course.course_name(), Some("Corso"));
        assert_eq!(course.organizer().unwrap().primary_name, "Docente");
        assert_eq!(course.participants().len(), 1);
    }

    #[test]
    fn test_parse_course_surfaces_export_errors() {
        let err = parse_course("Name,Join time\n", &CourseOptions::default()).unwrap_err();
        assert!(matches!(err, CourseError::Export(ExportError::MissingColumn(_))));
        assert_eq!(err.stage(), PipelineStage::Parsing);
    }

    // ========== Days ==========

    #[test]
    fn test_days_track_span_and_cleaned_names() {
        let course = build_course(three_day_rows(), &CourseOptions::default()).unwrap();
        let day = course.day(date(21)).unwrap();
        assert_eq!(day.course_name.as_deref(), Some("Corso Sicurezza"));
        assert_eq!(day.earliest, date(21).and_hms_opt(9, 0, 0).unwrap());
        assert_eq!(day.latest, date(21).and_hms_opt(13, 0, 0).unwrap());
        assert!(day.participant_names.contains("Giorgio Santambrogio"));
        assert_eq!(course.days().count(), 3);
        assert!(course.day(date(22)).is_none());
    }

    #[test]
    fn test_clean_name_collapses_whitespace() {
        assert_eq!(clean_name("  Anna \t Rossi "), "Anna Rossi");
        assert_eq!(clean_name("   "), "");
    }

    // ========== Attendance ==========

    #[test]
    fn test_attendance_merges_alias_sessions_and_flags_absentees() {
        let course = build_course(three_day_rows(), &CourseOptions::default()).unwrap();
        let day = course.attendance_for_day(date(20)).unwrap();
        assert!(day.periods.morning);
        assert!(!day.periods.afternoon);

        let by_name = |name: &str| {
            day.participants
                .iter()
                .find(|p| p.name == name)
                .map(|p| &p.attendance)
                .unwrap()
        };
        assert!(by_name("G. Santambrogio").is_present);
        assert!(by_name("Anna Rossi").is_present);
        // Left at 10:00 with nothing after: no gap inside the period, so the
        // early exit alone does not count as absence.
        assert!(by_name("Mario Bianchi").is_present);
        assert_eq!(day.present_count(), 3);

        let day21 = course.attendance_for_day(date(21)).unwrap();
        let mario = day21.participants.iter().find(|p| p.name == "Mario Bianchi").unwrap();
        assert!(!mario.attendance.is_present);
        assert!((mario.attendance.total_absence_minutes - 999.0).abs() < 1e-9);
    }

    #[test]
    fn test_attendance_by_day_is_in_calendar_order() {
        let course = build_course(three_day_rows(), &CourseOptions::default()).unwrap();
        let all = course.attendance_by_day();
        let dates: Vec<NaiveDate> = all.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(19), date(20), date(21)]);
        assert!(all.iter().all(|d| d.participants.len() == 3));
    }

    #[test]
    fn test_lesson_hours_cover_the_morning() {
        let course = build_course(three_day_rows(), &CourseOptions::default()).unwrap();
        assert_eq!(course.lesson_hours(date(19), LessonShape::Both), vec![9, 10, 11, 12, 13]);
        assert!(course.lesson_hours(date(19), LessonShape::Afternoon).is_empty());
        assert!(course.lesson_hours(date(25), LessonShape::Both).is_empty());
    }

    // ========== Manual merges ==========

    #[test]
    fn test_manual_merge_updates_dataset() {
        let options = CourseOptions {
            auto_merge: false,
            ..CourseOptions::default()
        };
        let mut course = build_course(three_day_rows(), &options).unwrap();
        let mapping = course
            .apply_manual_merge(&ManualMerge {
                names: vec!["giorgio s.".into(), "G. Santambrogio".into()],
                primary: None,
            })
            .unwrap();

        assert_eq!(mapping.primary_name, "G. Santambrogio");
        assert_eq!(course.mappings().len(), 1);
        assert_eq!(course.participants().len(), 4);
        let merged = course.find_participant("giorgio s.").unwrap();
        assert_eq!(merged.days_present, vec![date(19), date(20)]);
    }
}
