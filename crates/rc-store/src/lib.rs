//! Storage layer for attendance exports.
//!
//! Raw exports are kept verbatim, keyed by course, day and session, so a
//! course can always be re-parsed with different rules. Manual merges are
//! stored alongside and replayed in insertion order after each parse.
//!
//! # Thread Safety
//!
//! [`SqliteStore`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Open one store per thread if several threads need it.
//!
//! # Schema
//!
//! Days are stored as TEXT in `YYYY-MM-DD` form and sessions by name
//! (`morning`, `afternoon`, `full`), so keys sort naturally. `stored_at` is an
//! RFC 3339 UTC timestamp.

use std::path::Path;

use chrono::{NaiveDate, SecondsFormat, Utc};
use rc_core::{BlobKey, BlobStore, CourseId, ManualMerge, SessionSlot};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored row does not describe a valid key.
    #[error("invalid stored key {course}/{day}/{session}")]
    InvalidKey {
        course: String,
        day: String,
        session: String,
    },
    /// A stored merge could not be decoded.
    #[error("invalid stored merge for {course}: {source}")]
    InvalidMerge {
        course: String,
        #[source]
        source: serde_json::Error,
    },
}

/// SQLite-backed [`BlobStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens a store at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Opens an in-memory store, destroyed when dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Creates the schema. Idempotent.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS exports (
                course TEXT NOT NULL,
                day TEXT NOT NULL,
                session TEXT NOT NULL,
                content BLOB NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (course, day, session)
            );

            CREATE INDEX IF NOT EXISTS idx_exports_course ON exports(course);

            -- Merges requested by hand, replayed in id order.
            -- request: JSON with names and optional primary
            CREATE TABLE IF NOT EXISTS manual_merges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course TEXT NOT NULL,
                request TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_manual_merges_course ON manual_merges(course);
            ",
        )?;
        Ok(())
    }

    /// Records a manual merge for `course`.
    pub fn add_manual_merge(&mut self, course: &CourseId, merge: &ManualMerge) -> Result<(), StoreError> {
        let request = serde_json::to_string(merge).map_err(|source| StoreError::InvalidMerge {
            course: course.to_string(),
            source,
        })?;
        self.conn.execute(
            "INSERT INTO manual_merges (course, request, created_at) VALUES (?, ?, ?)",
            params![course.as_str(), request, now()],
        )?;
        tracing::debug!(%course, "stored manual merge");
        Ok(())
    }

    /// Manual merges for `course`, oldest first.
    pub fn manual_merges(&self, course: &CourseId) -> Result<Vec<ManualMerge>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT request FROM manual_merges WHERE course = ? ORDER BY id ASC")?;
        let rows = stmt.query_map([course.as_str()], |row| row.get::<_, String>(0))?;
        let mut merges = Vec::new();
        for row in rows {
            let merge = serde_json::from_str(&row?).map_err(|source| StoreError::InvalidMerge {
                course: course.to_string(),
                source,
            })?;
            merges.push(merge);
        }
        Ok(merges)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_key(course: String, day: String, session: String) -> Result<BlobKey, StoreError> {
    let parsed = (
        CourseId::new(course.clone()).ok(),
        NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok(),
        session.parse::<SessionSlot>().ok(),
    );
    match parsed {
        (Some(course), Some(date), Some(session)) => Ok(BlobKey::new(course, date, session)),
        _ => Err(StoreError::InvalidKey {
            course,
            day,
            session,
        }),
    }
}

fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl BlobStore for SqliteStore {
    type Error = StoreError;

    fn get(&self, key: &BlobKey) -> Result<Option<Vec<u8>>, StoreError> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM exports WHERE course = ? AND day = ? AND session = ?",
                params![key.course.as_str(), format_day(key.date), key.session.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    fn put(&mut self, key: &BlobKey, bytes: &[u8]) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO exports (course, day, session, content, stored_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (course, day, session)
            DO UPDATE SET content = excluded.content, stored_at = excluded.stored_at
            ",
            params![
                key.course.as_str(),
                format_day(key.date),
                key.session.as_str(),
                bytes,
                now(),
            ],
        )?;
        tracing::debug!(%key, bytes = bytes.len(), "stored export");
        Ok(())
    }

    fn list(&self, course: &CourseId) -> Result<Vec<BlobKey>, StoreError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT course, day, session
            FROM exports
            WHERE course = ?
            ORDER BY day ASC
            ",
        )?;
        let rows = stmt.query_map([course.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut keys = Vec::new();
        for row in rows {
            let (course, day, session) = row?;
            keys.push(parse_key(course, day, session)?);
        }
        // Session names do not sort in lesson order, so finish in Rust.
        keys.sort();
        Ok(keys)
    }
}
