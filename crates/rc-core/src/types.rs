//! Identifiers and scores shared by the whole crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected values for the newtypes below.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{kind} must not be blank")]
    BlankId { kind: &'static str },

    #[error("score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),
}

/// How a set of identities came to be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeKind {
    /// Applied without confirmation because the score met the auto-merge threshold.
    Auto,
    /// Requested explicitly by the caller.
    Manual,
}

impl fmt::Display for MergeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        })
    }
}

/// Declares a string identifier that cannot be blank.
macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident => $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
                let raw = raw.into();
                if raw.trim().is_empty() {
                    Err(ValidationError::BlankId { kind: $kind })
                } else {
                    Ok(Self(raw))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(raw: String) -> Result<Self, ValidationError> {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id! {
    /// Names a course in storage keys, e.g. `sicurezza-2025`.
    CourseId => "course id"
}

string_id! {
    /// Meeting number as printed by the conferencing export.
    MeetingId => "meeting id"
}

/// Stable index of a participant identity within one parsed course.
///
/// Ids are assigned once during roster construction and never reused, so an
/// id stays valid after the identity it names has been merged away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(u32);

impl IdentityId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Similarity score in \[0, 1\] attached to suggestions and merges.
///
/// Deserializing clamps instead of failing, so hand-edited records with a
/// stray `1.0000001` still load.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const MAX: Self = Self(1.0);
    pub const MIN: Self = Self(0.0);

    pub fn new(score: f64) -> Result<Self, ValidationError> {
        if (0.0..=1.0).contains(&score) {
            Ok(Self(score))
        } else {
            Err(ValidationError::ScoreOutOfRange(score))
        }
    }

    /// Forces `score` into range; NaN counts as no similarity.
    #[must_use]
    pub fn clamped(score: f64) -> Self {
        if score.is_nan() {
            Self::MIN
        } else {
            Self(score.clamp(0.0, 1.0))
        }
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn tier(self) -> ConfidenceTier {
        ConfidenceTier::of(self.0)
    }
}

impl From<f64> for Confidence {
    fn from(score: f64) -> Self {
        Self::clamped(score)
    }
}

impl From<Confidence> for f64 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Confidence buckets for similarity scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Lower bound of the high tier; also the auto-merge threshold.
    pub const HIGH: f64 = 0.80;
    /// Lower bound of the medium tier.
    pub const MEDIUM: f64 = 0.65;

    #[must_use]
    pub fn of(score: f64) -> Self {
        if score >= Self::HIGH {
            Self::High
        } else if score >= Self::MEDIUM {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
