//! Reading attendance exports from a conferencing platform.
//!
//! An export is a delimited text file with one row per join/leave event. The
//! meeting-level columns (topic, organizer, start/end) are repeated on every
//! row. Column order varies between platform versions and locales, so columns
//! are located by header name.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::datetime::parse_export_timestamp;
use crate::interval::SessionInterval;

/// Errors from reading an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export has no {0} column")]
    MissingColumn(&'static str),
    #[error("malformed export: {0}")]
    Csv(#[from] csv::Error),
}

/// One join/leave event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventRow {
    pub course_name: Option<String>,
    pub meeting_id: Option<String>,
    pub organizer_name: Option<String>,
    pub organizer_email: Option<String>,
    pub meeting_start: Option<String>,
    pub meeting_end: Option<String>,
    pub participant_name: String,
    pub participant_email: Option<String>,
    pub join: NaiveDateTime,
    pub leave: NaiveDateTime,
    pub duration_minutes: Option<f64>,
    pub guest: bool,
    pub waiting_room: bool,
}

impl RawEventRow {
    /// Calendar day the row belongs to, by join time.
    pub fn day(&self) -> NaiveDate {
        self.join.date()
    }

    pub fn interval(&self) -> SessionInterval {
        SessionInterval::new(self.join, self.leave)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    CourseName,
    MeetingId,
    OrganizerName,
    OrganizerEmail,
    MeetingStart,
    MeetingEnd,
    ParticipantName,
    ParticipantEmail,
    Join,
    Leave,
    Duration,
    Guest,
    WaitingRoom,
}

impl Column {
    const ALL: [Self; 13] = [
        Self::CourseName,
        Self::MeetingId,
        Self::OrganizerName,
        Self::OrganizerEmail,
        Self::MeetingStart,
        Self::MeetingEnd,
        Self::ParticipantName,
        Self::ParticipantEmail,
        Self::Join,
        Self::Leave,
        Self::Duration,
        Self::Guest,
        Self::WaitingRoom,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::CourseName => "topic",
            Self::MeetingId => "meeting id",
            Self::OrganizerName => "organizer name",
            Self::OrganizerEmail => "organizer email",
            Self::MeetingStart => "start time",
            Self::MeetingEnd => "end time",
            Self::ParticipantName => "participant name",
            Self::ParticipantEmail => "participant email",
            Self::Join => "join time",
            Self::Leave => "leave time",
            Self::Duration => "duration",
            Self::Guest => "guest",
            Self::WaitingRoom => "waiting room",
        }
    }

    /// Lowercased header spellings, Italian first.
    const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::CourseName => &["argomento", "topic"],
            Self::MeetingId => &["id", "id riunione", "meeting id"],
            Self::OrganizerName => &["nome organizzatore", "host name", "host"],
            Self::OrganizerEmail => &["e-mail organizzatore", "host email", "host e-mail"],
            Self::MeetingStart => &["ora di inizio", "start time"],
            Self::MeetingEnd => &["ora di fine", "end time"],
            Self::ParticipantName => &[
                "nome (nome originale)",
                "nome",
                "name (original name)",
                "name",
                "participant",
            ],
            Self::ParticipantEmail => &["e-mail utente", "e-mail", "email", "user email"],
            Self::Join => &["ora di ingresso", "join time"],
            Self::Leave => &["ora di uscita", "leave time"],
            Self::Duration => &["durata (minuti)", "duration (minutes)", "duration"],
            Self::Guest => &["ospite", "guest"],
            Self::WaitingRoom => &["in sala d'attesa", "in waiting room"],
        }
    }

    const fn required(self) -> bool {
        matches!(self, Self::ParticipantName | Self::Join | Self::Leave)
    }
}

/// Positions of known columns in the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    slots: [Option<usize>; Column::ALL.len()],
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ExportError> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut map = Self::default();
        for (slot, column) in Column::ALL.iter().enumerate() {
            // Alias order decides between competing headers, e.g. a file with
            // both "Nome (nome originale)" and "Nome".
            map.slots[slot] = column
                .aliases()
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h == alias));
            if column.required() && map.slots[slot].is_none() {
                return Err(ExportError::MissingColumn(column.label()));
            }
        }
        Ok(map)
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: Column) -> Option<&'r str> {
        let slot = Column::ALL.iter().position(|c| *c == column)?;
        self.slots[slot]
            .and_then(|i| record.get(i))
            .filter(|v| !v.is_empty())
    }

    fn owned(&self, record: &csv::StringRecord, column: Column) -> Option<String> {
        self.get(record, column).map(str::to_string)
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Picks the delimiter occurring most often in the first non-blank line.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .map(|d| (header.bytes().filter(|b| *b == d).count(), d))
        .filter(|(count, _)| *count > 0)
        .max_by_key(|(count, _)| *count)
        .map_or(b',', |(_, d)| d)
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "sì" | "si" | "yes" | "true" | "1"
        )
    })
}

fn parse_minutes(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.replace(',', ".").parse().ok())
}

/// Parses an export.
///
/// Rows without a participant name are skipped. Unreadable timestamps fall
/// back to the current time (see [`parse_export_timestamp`]).
///
/// # Errors
///
/// Returns [`ExportError::MissingColumn`] if the name, join or leave column is
/// absent and [`ExportError::Csv`] if the text is not valid delimited data.
pub fn read_export(text: &str) -> Result<Vec<RawEventRow>, ExportError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let Some(name) = columns.get(&record, Column::ParticipantName) else {
            if record.iter().any(|f| !f.is_empty()) {
                tracing::debug!(row = line + 1, "skipping row without participant name");
            }
            continue;
        };
        let timestamp = |column| parse_export_timestamp(columns.get(&record, column).unwrap_or(""));

        rows.push(RawEventRow {
            course_name: columns.owned(&record, Column::CourseName),
            meeting_id: columns.owned(&record, Column::MeetingId),
            organizer_name: columns.owned(&record, Column::OrganizerName),
            organizer_email: columns.owned(&record, Column::OrganizerEmail),
            meeting_start: columns.owned(&record, Column::MeetingStart),
            meeting_end: columns.owned(&record, Column::MeetingEnd),
            participant_name: name.to_string(),
            participant_email: columns.owned(&record, Column::ParticipantEmail),
            join: timestamp(Column::Join),
            leave: timestamp(Column::Leave),
            duration_minutes: parse_minutes(columns.get(&record, Column::Duration)),
            guest: parse_flag(columns.get(&record, Column::Guest)),
            waiting_room: parse_flag(columns.get(&record, Column::WaitingRoom)),
        });
    }

    tracing::debug!(rows = rows.len(), "read export");
    Ok(rows)
}
