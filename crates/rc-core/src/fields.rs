//! Flat field maps handed to the document renderer.
//!
//! A daily register template has a fixed number of participant rows, so the
//! map always carries every slot; unused slots hold empty strings.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::course::CourseDataset;
use crate::interval::{LessonShape, format_hour_range};

/// Participant rows available in a register template.
pub const PARTICIPANT_SLOTS: usize = 5;

/// Written in the absence column for participants not present.
pub const ABSENT_MARKER: &str = "X";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// Field name to value, sorted by name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Names of the per-participant fields, without the `participant_N_` prefix.
pub const SLOT_FIELDS: [&str; 6] = [
    "name",
    "morning_in",
    "morning_out",
    "afternoon_in",
    "afternoon_out",
    "absent",
];

fn slot_key(slot: usize, field: &str) -> String {
    format!("participant_{slot}_{field}")
}

fn clock(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format("%H:%M").to_string()).unwrap_or_default()
}

/// Builds the register fields for one day.
///
/// Returns `None` if the course has no record for `date`. Participants fill
/// slots in master order; the organizer never takes a slot.
pub fn day_fields(
    course: &CourseDataset,
    date: NaiveDate,
    subject: &str,
    shape: LessonShape,
) -> Option<FieldMap> {
    let attendance = course.attendance_for_day(date)?;
    let mut fields = FieldMap::new();

    fields.insert("day".into(), i64::from(date.day()).into());
    fields.insert("month".into(), i64::from(date.month()).into());
    fields.insert("year".into(), i64::from(date.year()).into());
    fields.insert(
        "lesson_hours".into(),
        format_hour_range(&course.lesson_hours(date, shape), course.rules()).into(),
    );
    fields.insert("subject".into(), subject.into());
    fields.insert(
        "course_name".into(),
        course.course_name().unwrap_or_default().into(),
    );
    fields.insert(
        "organizer_name".into(),
        course
            .organizer()
            .map(|o| o.primary_name.clone())
            .unwrap_or_default()
            .into(),
    );

    for slot in 1..=PARTICIPANT_SLOTS {
        for field in SLOT_FIELDS {
            fields.insert(slot_key(slot, field), FieldValue::Text(String::new()));
        }
    }

    let truncated = attendance.participants.len().saturating_sub(PARTICIPANT_SLOTS);
    if truncated > 0 {
        tracing::warn!(%date, truncated, "more participants than template slots");
    }

    for (slot, entry) in (1..=PARTICIPANT_SLOTS).zip(&attendance.participants) {
        let a = &entry.attendance;
        let values = [
            entry.name.clone(),
            clock(a.morning.first_join),
            clock(a.morning.last_leave),
            clock(a.afternoon.first_join),
            clock(a.afternoon.last_leave),
            if a.is_present {
                String::new()
            } else {
                ABSENT_MARKER.to_string()
            },
        ];
        for (field, value) in SLOT_FIELDS.into_iter().zip(values) {
            fields.insert(slot_key(slot, field), value.into());
        }
    }

    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{CourseOptions, parse_course};

    const EXPORT: &str = "\
Argomento;Nome organizzatore;Nome (nome originale);Ora di ingresso;Ora di uscita
Corso Sicurezza;Docente;Docente;22/09/2025 08:55:00 AM;22/09/2025 06:05:00 PM
Corso Sicurezza;Docente;Anna Rossi;22/09/2025 09:00:00 AM;22/09/2025 01:00:00 PM
Corso Sicurezza;Docente;Anna Rossi;22/09/2025 02:00:00 PM;22/09/2025 06:00:00 PM
Corso Sicurezza;Docente;Bruno Verdi;22/09/2025 09:05:00 AM;22/09/2025 12:30:00 PM
Corso Sicurezza;Docente;Bruno Verdi;22/09/2025 01:55:00 PM;22/09/2025 05:30:00 PM
Corso Sicurezza;Docente;Carla Neri;22/09/2025 02:00:00 PM;22/09/2025 06:00:00 PM
Corso Sicurezza;Docente;Dario Gialli;23/09/2025 09:00:00 AM;23/09/2025 01:00:00 PM
";

    fn fields() -> FieldMap {
        let course = parse_course(EXPORT, &CourseOptions::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 9, 22).unwrap();
        day_fields(&course, date, "Sicurezza sul lavoro", LessonShape::Both).unwrap()
    }

    fn text(fields: &FieldMap, key: &str) -> String {
        fields[key].to_string()
    }

    #[test]
    fn test_header_fields() {
        let fields = fields();
        assert_eq!(fields["day"], FieldValue::Int(22));
        assert_eq!(fields["month"], FieldValue::Int(9));
        assert_eq!(fields["year"], FieldValue::Int(2025));
        assert_eq!(text(&fields, "subject"), "Sicurezza sul lavoro");
        assert_eq!(text(&fields, "organizer_name"), "Docente");
        assert_eq!(text(&fields, "lesson_hours"), "09:00 - 13:00 / 14:00 - 18:00");
    }

    #[test]
    fn test_participants_fill_slots_in_master_order() {
        let fields = fields();
        assert_eq!(text(&fields, "participant_1_name"), "Anna Rossi");
        assert_eq!(text(&fields, "participant_1_morning_in"), "09:00");
        assert_eq!(text(&fields, "participant_1_afternoon_out"), "18:00");
        assert_eq!(text(&fields, "participant_1_absent"), "");

        assert_eq!(text(&fields, "participant_2_name"), "Bruno Verdi");
        assert_eq!(text(&fields, "participant_2_morning_out"), "12:30");
        assert_eq!(text(&fields, "participant_2_afternoon_in"), "13:55");

        // Only came in the afternoon: the morning is not held against her.
        assert_eq!(text(&fields, "participant_3_name"), "Carla Neri");
        assert_eq!(text(&fields, "participant_3_morning_in"), "");
        assert_eq!(text(&fields, "participant_3_absent"), "");

        // Not there at all that day.
        assert_eq!(text(&fields, "participant_4_name"), "Dario Gialli");
        assert_eq!(text(&fields, "participant_4_absent"), ABSENT_MARKER);
    }

    #[test]
    fn test_organizer_never_takes_a_slot_and_unused_slots_are_empty() {
        let fields = fields();
        assert!(
            (1..=PARTICIPANT_SLOTS).all(|n| text(&fields, &slot_key(n, "name")) != "Docente")
        );
        for field in SLOT_FIELDS {
            assert_eq!(text(&fields, &slot_key(5, field)), "");
        }
        assert_eq!(fields.len(), 7 + PARTICIPANT_SLOTS * SLOT_FIELDS.len());
    }

    #[test]
    fn test_unknown_day_has_no_fields() {
        let course = parse_course(EXPORT, &CourseOptions::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        assert!(day_fields(&course, date, "", LessonShape::Both).is_none());
    }

    #[test]
    fn test_excess_participants_are_truncated() {
        let mut export = String::from("Name,Join time,Leave time\n");
        for name in ["Alfa Uno", "Bravo Due", "Charlie Tre", "Delta Quattro", "Echo Cinque", "Foxtrot Sei"] {
            export.push_str(&format!("{name},22/09/2025 09:00 AM,22/09/2025 01:00 PM\n"));
        }
        let course = parse_course(&export, &CourseOptions::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 9, 22).unwrap();
        let fields = day_fields(&course, date, "", LessonShape::Morning).unwrap();
        assert_eq!(text(&fields, "participant_5_name"), "Echo Cinque");
        assert!(!fields.values().any(|v| v.to_string() == "Foxtrot Sei"));
        assert_eq!(text(&fields, "lesson_hours"), "09:00 - 13:00");
    }
}
