//! Attendance computation and participant identity resolution.
//!
//! This crate turns conferencing attendance exports into per-day presence
//! and a deduplicated roster:
//! - Timestamps: reading the export's ambiguous day/month format
//! - Intervals: deciding presence from join/leave gaps, per half day
//! - Similarity: scoring how likely two display names are the same person
//! - Merging: folding duplicate identities while keeping their days
//! - Course: running the whole pipeline and answering queries on the result

pub mod collab;
pub mod course;
pub mod datetime;
pub mod export;
pub mod fields;
pub mod identity;
pub mod interval;
pub mod merge;
pub mod similarity;
pub mod types;
pub mod validate;

pub use collab::{
    BlobKey, BlobStore, LoadError, MemoryStore, SessionSlot, TemplateHandle, TemplateRenderer,
    load_course,
};
pub use course::{
    CourseDataset, CourseError, CourseOptions, CourseStats, DayAttendance, DayRecord,
    OrganizerInfo, ParticipantAttendance, PipelineStage, build_course, parse_course,
};
pub use datetime::{TimestampError, parse_export_timestamp, try_parse_export_timestamp};
pub use export::{ExportError, RawEventRow, read_export};
pub use fields::{FieldMap, FieldValue, PARTICIPANT_SLOTS, day_fields};
pub use identity::{AliasMapping, AliasSuggestion, ParticipantIdentity};
pub use interval::{AttendanceRules, LessonShape, ProcessedAttendance, SessionInterval};
pub use merge::{ManualMerge, MergeError};
pub use similarity::{MatchingRules, name_similarity};
pub use types::{Confidence, ConfidenceTier, CourseId, IdentityId, MergeKind};
