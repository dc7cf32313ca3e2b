//! Seams to the outside world: byte storage and document rendering.
//!
//! The engine never touches disks or template formats itself. Exports are
//! kept in a [`BlobStore`] keyed by course, day and session, and field maps
//! are handed to a [`TemplateRenderer`].

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::course::{CourseDataset, CourseError, CourseOptions, build_course};
use crate::export::read_export;
use crate::fields::FieldMap;
use crate::types::CourseId;

/// Which part of a day a stored export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSlot {
    Morning,
    Afternoon,
    Full,
}

impl SessionSlot {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for SessionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "full" => Ok(Self::Full),
            _ => Err(format!("invalid session slot: {s}")),
        }
    }
}

/// Address of one stored export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobKey {
    pub course: CourseId,
    pub date: NaiveDate,
    pub session: SessionSlot,
}

impl BlobKey {
    pub const fn new(course: CourseId, date: NaiveDate, session: SessionSlot) -> Self {
        Self {
            course,
            date,
            session,
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.course, self.date, self.session)
    }
}

/// Read/write-by-key byte storage.
pub trait BlobStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &BlobKey) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stores `bytes` under `key`, replacing any previous value.
    fn put(&mut self, key: &BlobKey, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Keys stored for `course`, sorted by date then session.
    fn list(&self, course: &CourseId) -> Result<Vec<BlobKey>, Self::Error>;
}

/// A [`BlobStore`] that lives in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: BTreeMap<BlobKey, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, key: &BlobKey) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.blobs.get(key).cloned())
    }

    fn put(&mut self, key: &BlobKey, bytes: &[u8]) -> Result<(), Self::Error> {
        self.blobs.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, course: &CourseId) -> Result<Vec<BlobKey>, Self::Error> {
        Ok(self
            .blobs
            .keys()
            .filter(|k| &k.course == course)
            .cloned()
            .collect())
    }
}

/// Errors from loading a course out of a store.
#[derive(Debug, Error)]
pub enum LoadError<E: std::error::Error + 'static> {
    #[error("store error: {0}")]
    Store(#[source] E),
    #[error("no exports stored for course {0}")]
    NotFound(CourseId),
    #[error("export {0} is not valid UTF-8")]
    NotUtf8(BlobKey),
    #[error(transparent)]
    Course(#[from] CourseError),
}

/// Parses every export stored for `course` as one dataset.
///
/// The course id doubles as the course name when no export carries a topic.
///
/// # Errors
///
/// Fails if the store fails, nothing is stored for the course, a blob is not
/// text, or the combined rows do not form a valid course.
pub fn load_course<S: BlobStore>(
    store: &S,
    course: &CourseId,
    options: &CourseOptions,
) -> Result<CourseDataset, LoadError<S::Error>> {
    let keys = store.list(course).map_err(LoadError::Store)?;
    if keys.is_empty() {
        return Err(LoadError::NotFound(course.clone()));
    }

    let mut rows = Vec::new();
    for key in keys {
        let Some(bytes) = store.get(&key).map_err(LoadError::Store)? else {
            continue;
        };
        let text = String::from_utf8(bytes).map_err(|_| LoadError::NotUtf8(key.clone()))?;
        let parsed = read_export(&text).map_err(CourseError::from)?;
        tracing::debug!(%key, rows = parsed.len(), "loaded stored export");
        rows.extend(parsed);
    }

    let untitled = rows.iter().all(|r| r.course_name.as_deref().is_none_or(str::is_empty));
    let options = CourseOptions {
        course_name: options
            .course_name
            .clone()
            .or_else(|| untitled.then(|| course.to_string())),
        ..options.clone()
    };
    build_course(rows, &options).map_err(LoadError::from)
}

/// A template the renderer knows how to fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateHandle {
    pub name: String,
    pub content: Vec<u8>,
}

/// Fills a template with a field map.
pub trait TemplateRenderer {
    type Error: std::error::Error + Send + Sync + 'static;

    fn render(&self, template: &TemplateHandle, fields: &FieldMap) -> Result<Vec<u8>, Self::Error>;
}
