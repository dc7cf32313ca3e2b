//! Presence calculation from join/leave intervals.
//!
//! A participant usually shows up in the export as several intervals per day
//! because every reconnect opens a new row. Presence is decided per half-day
//! period:
//!
//! 1. Split the day's intervals into morning and afternoon by join hour.
//! 2. Walk each period in join order and sum the gaps between the latest
//!    leave seen so far and the next join. Gaps up to the blip threshold are
//!    connectivity noise and do not count.
//! 3. A period the course ran in but the participant never joined costs a
//!    sentinel absence, unless the participant attended the other period.
//! 4. The participant is present if the summed absence stays within the
//!    tolerance.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Thresholds governing presence and lesson windows.
///
/// The defaults are the values the document templates were designed around
/// and should not be changed without reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceRules {
    /// Cumulative absence (minutes) still counted as present.
    /// Default: 14.
    pub absence_tolerance_minutes: f64,

    /// Gaps up to this many minutes are treated as reconnects.
    /// Default: 1.5.
    pub gap_ignore_minutes: f64,

    /// Sessions joining at or after this hour belong to the afternoon.
    /// Default: 13.
    pub afternoon_start_hour: u32,

    /// Clock hours a morning lesson may cover. Default: 9-13.
    pub morning_window: HourWindow,

    /// Clock hours an afternoon lesson may cover. Default: 14-18.
    pub afternoon_window: HourWindow,

    /// Absence charged for a period the participant skipped entirely.
    /// Default: 999.
    pub missing_period_minutes: f64,
}

impl Default for AttendanceRules {
    fn default() -> Self {
        Self {
            absence_tolerance_minutes: 14.0,
            gap_ignore_minutes: 1.5,
            afternoon_start_hour: 13,
            morning_window: HourWindow { start: 9, end: 13 },
            afternoon_window: HourWindow { start: 14, end: 18 },
            missing_period_minutes: 999.0,
        }
    }
}

/// An inclusive range of whole clock hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    #[must_use]
    pub const fn contains(&self, hour: u32) -> bool {
        hour >= self.start && hour <= self.end
    }

    /// Whole hours of `span` that fall inside the window.
    fn clip(&self, join: NaiveDateTime, leave: NaiveDateTime) -> std::ops::RangeInclusive<u32> {
        let start = join.hour().max(self.start);
        let end = leave.hour().min(self.end);
        start..=end
    }
}

/// One join-to-leave span of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionInterval {
    pub join: NaiveDateTime,
    pub leave: NaiveDateTime,
}

impl SessionInterval {
    /// Creates an interval, swapping the endpoints if they arrive reversed.
    #[must_use]
    pub fn new(join: NaiveDateTime, leave: NaiveDateTime) -> Self {
        if leave < join {
            Self {
                join: leave,
                leave: join,
            }
        } else {
            Self { join, leave }
        }
    }
}

/// Half-day period of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Morning,
    Afternoon,
}

impl Period {
    /// Classifies a session by the hour it was joined.
    pub fn of(join: NaiveDateTime, rules: &AttendanceRules) -> Self {
        if join.hour() < rules.afternoon_start_hour {
            Self::Morning
        } else {
            Self::Afternoon
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half-day periods a course actually held on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoursePeriods {
    pub morning: bool,
    pub afternoon: bool,
}

impl CoursePeriods {
    /// Derives the periods from every session observed that day.
    pub fn observed<'a>(
        sessions: impl IntoIterator<Item = &'a SessionInterval>,
        rules: &AttendanceRules,
    ) -> Self {
        let mut periods = Self::default();
        for session in sessions {
            match Period::of(session.join, rules) {
                Period::Morning => periods.morning = true,
                Period::Afternoon => periods.afternoon = true,
            }
        }
        periods
    }

    const fn ran(self, period: Period) -> bool {
        match period {
            Period::Morning => self.morning,
            Period::Afternoon => self.afternoon,
        }
    }
}

/// Attendance of one participant in one half-day period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodAttendance {
    /// Sessions in join order.
    pub sessions: Vec<SessionInterval>,
    pub first_join: Option<NaiveDateTime>,
    pub last_leave: Option<NaiveDateTime>,
    pub absence_minutes: f64,
}

impl PeriodAttendance {
    pub fn attended(&self) -> bool {
        !self.sessions.is_empty()
    }
}

/// Attendance of one participant on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAttendance {
    pub morning: PeriodAttendance,
    pub afternoon: PeriodAttendance,
    pub total_absence_minutes: f64,
    pub is_present: bool,
}

impl ProcessedAttendance {
    #[must_use]
    pub const fn period(&self, period: Period) -> &PeriodAttendance {
        match period {
            Period::Morning => &self.morning,
            Period::Afternoon => &self.afternoon,
        }
    }
}

/// Splits sessions into (morning, afternoon), each sorted by join time.
pub fn split_by_period(
    sessions: &[SessionInterval],
    rules: &AttendanceRules,
) -> (Vec<SessionInterval>, Vec<SessionInterval>) {
    let (mut morning, mut afternoon): (Vec<_>, Vec<_>) = sessions
        .iter()
        .partition(|s| Period::of(s.join, rules) == Period::Morning);
    morning.sort();
    afternoon.sort();
    (morning, afternoon)
}

/// Sums the gaps between consecutive sessions that exceed the blip threshold.
///
/// `sorted` must be ordered by join time. Each gap runs from one session's
/// leave to the next session's join; overlapping pairs give a negative gap,
/// which never counts.
#[allow(clippy::cast_precision_loss)]
pub fn gap_absence_minutes(sorted: &[SessionInterval], rules: &AttendanceRules) -> f64 {
    sorted
        .windows(2)
        .map(|pair| (pair[1].join - pair[0].leave).num_milliseconds() as f64 / 60_000.0)
        .filter(|gap| *gap > rules.gap_ignore_minutes)
        .sum()
}

/// Decides presence for one participant on one day.
///
/// `ran` says which periods the course held that day; a period the course
/// never held costs nothing.
pub fn process_attendance(
    sessions: &[SessionInterval],
    ran: CoursePeriods,
    rules: &AttendanceRules,
) -> ProcessedAttendance {
    let (morning, afternoon) = split_by_period(sessions, rules);
    let attended_any = !sessions.is_empty();

    let morning = period_attendance(morning, Period::Morning, ran, !afternoon.is_empty(), rules);
    let afternoon = period_attendance(
        afternoon,
        Period::Afternoon,
        ran,
        morning.attended(),
        rules,
    );

    let total_absence_minutes = if attended_any {
        morning.absence_minutes + afternoon.absence_minutes
    } else {
        rules.missing_period_minutes
    };

    ProcessedAttendance {
        is_present: total_absence_minutes <= rules.absence_tolerance_minutes,
        morning,
        afternoon,
        total_absence_minutes,
    }
}

fn period_attendance(
    sessions: Vec<SessionInterval>,
    period: Period,
    ran: CoursePeriods,
    attended_other: bool,
    rules: &AttendanceRules,
) -> PeriodAttendance {
    let absence_minutes = if !sessions.is_empty() {
        gap_absence_minutes(&sessions, rules)
    } else if ran.ran(period) && !attended_other {
        rules.missing_period_minutes
    } else {
        0.0
    };
    PeriodAttendance {
        first_join: sessions.iter().map(|s| s.join).min(),
        last_leave: sessions.iter().map(|s| s.leave).max(),
        sessions,
        absence_minutes,
    }
}

/// Shape of the lesson being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonShape {
    Morning,
    Afternoon,
    #[default]
    Both,
    /// Every participant span is clipped against both windows, ignoring the
    /// period it was joined in.
    Unrestricted,
}

impl LessonShape {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Both => "both",
            Self::Unrestricted => "unrestricted",
        }
    }
}

impl fmt::Display for LessonShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LessonShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "both" => Ok(Self::Both),
            "unrestricted" => Ok(Self::Unrestricted),
            _ => Err(format!("invalid lesson shape: {s}")),
        }
    }
}

/// Clock hours actually covered by anyone's attendance.
///
/// Each item of `participants` is one participant's sessions for the day (the
/// organizer can be passed like anyone else). The span from first join to
/// last leave is clipped to the lesson window and every whole hour inside it
/// is collected. The result is sorted and deduplicated.
pub fn lesson_hours<'a>(
    participants: impl IntoIterator<Item = &'a [SessionInterval]>,
    shape: LessonShape,
    rules: &AttendanceRules,
) -> Vec<u32> {
    let mut hours = BTreeSet::new();
    for sessions in participants {
        if shape == LessonShape::Unrestricted {
            if let Some((join, leave)) = span(sessions) {
                hours.extend(rules.morning_window.clip(join, leave));
                hours.extend(rules.afternoon_window.clip(join, leave));
            }
            continue;
        }

        let (morning, afternoon) = split_by_period(sessions, rules);
        if matches!(shape, LessonShape::Morning | LessonShape::Both) {
            if let Some((join, leave)) = span(&morning) {
                hours.extend(rules.morning_window.clip(join, leave));
            }
        }
        if matches!(shape, LessonShape::Afternoon | LessonShape::Both) {
            if let Some((join, leave)) = span(&afternoon) {
                hours.extend(rules.afternoon_window.clip(join, leave));
            }
        }
    }
    hours.into_iter().collect()
}

fn span(sessions: &[SessionInterval]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let join = sessions.iter().map(|s| s.join).min()?;
    let leave = sessions.iter().map(|s| s.leave).max()?;
    Some((join, leave))
}

/// Renders lesson hours as `"09:00 - 13:00 / 14:00 - 18:00"`.
///
/// One range is printed per window that has any hours; an empty list renders
/// as an empty string.
pub fn format_hour_range(hours: &[u32], rules: &AttendanceRules) -> String {
    [rules.morning_window, rules.afternoon_window]
        .iter()
        .filter_map(|window| {
            let mut inside = hours.iter().copied().filter(|h| window.contains(*h));
            let first = inside.next()?;
            let last = inside.last().unwrap_or(first);
            Some(format!("{first:02}:00 - {last:02}:00"))
        })
        .collect::<Vec<_>>()
        .join(" / ")
}
