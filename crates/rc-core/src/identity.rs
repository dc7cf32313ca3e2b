//! Resolved participants and the records describing how they were merged.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Confidence, IdentityId, MergeKind};

/// A person, possibly known under several display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    pub id: IdentityId,

    /// Name shown in reports and templates.
    pub primary_name: String,

    /// Every display name known for this person, primary name included.
    /// Never empty.
    pub aliases: Vec<String>,

    /// Best-known email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    pub is_organizer: bool,

    /// Rank in reports and template slots. 0 is reserved for the organizer.
    pub master_order: u32,

    /// Days this person appeared on, ascending.
    #[serde(default)]
    pub days_present: Vec<NaiveDate>,
}

impl ParticipantIdentity {
    /// Creates an identity known by a single name.
    pub fn new(id: IdentityId, name: impl Into<String>, master_order: u32) -> Self {
        let name = name.into();
        Self {
            id,
            aliases: vec![name.clone()],
            primary_name: name,
            email: None,
            is_organizer: false,
            master_order,
            days_present: Vec::new(),
        }
    }

    /// Creates the organizer identity, always ranked first.
    pub fn organizer(id: IdentityId, name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            email: non_empty(email),
            is_organizer: true,
            ..Self::new(id, name, 0)
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = non_empty(email);
        self
    }

    #[must_use]
    pub fn with_days(mut self, mut days: Vec<NaiveDate>) -> Self {
        days.sort_unstable();
        days.dedup();
        self.days_present = days;
        self
    }

    /// Whether `name` is one of this identity's aliases, ignoring case.
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.aliases.iter().any(|a| a.to_lowercase() == name)
    }
}

pub(crate) fn non_empty(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

/// A proposal to fold other identities into `target`.
///
/// `candidates` and `scores` are parallel and sorted by descending score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasSuggestion {
    pub target: IdentityId,
    pub target_name: String,
    pub candidates: Vec<String>,
    pub scores: Vec<Confidence>,
    /// True when the best candidate reaches the auto-merge threshold.
    pub auto_merge: bool,
    /// Best candidate score.
    pub confidence: Confidence,
}

impl AliasSuggestion {
    /// Builds a suggestion, sorting candidates by descending score.
    pub fn new(
        target: IdentityId,
        target_name: impl Into<String>,
        mut scored: Vec<(String, Confidence)>,
        auto_threshold: f64,
    ) -> Self {
        scored.sort_by(|a, b| b.1.value().total_cmp(&a.1.value()).then_with(|| a.0.cmp(&b.0)));
        let confidence = scored.first().map_or(Confidence::MIN, |(_, c)| *c);
        let (candidates, scores) = scored.into_iter().unzip();
        Self {
            target,
            target_name: target_name.into(),
            candidates,
            scores,
            auto_merge: confidence.value() >= auto_threshold,
            confidence,
        }
    }

    /// Iterates candidates with their scores.
    pub fn scored_candidates(&self) -> impl Iterator<Item = (&str, Confidence)> {
        self.candidates
            .iter()
            .map(String::as_str)
            .zip(self.scores.iter().copied())
    }
}

/// Audit record of one completed merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasMapping {
    /// The identity that survived.
    pub identity: IdentityId,
    pub primary_name: String,
    /// All names folded together, the survivor's included.
    pub merged_names: Vec<String>,
    pub kind: MergeKind,
    pub confidence: Confidence,
}
