//! Fuzzy matching of participant display names.
//!
//! People join the same lesson as "G. Santambrogio" one day and "giorgio s."
//! the next. The score blends three views of two names:
//!
//! | metric          | weight | captures                            |
//! |-----------------|--------|-------------------------------------|
//! | containment     | 0.4    | one name being a piece of the other |
//! | edit similarity | 0.3    | typos and small spelling changes    |
//! | token Jaccard   | 0.3    | shared whole words                  |
//!
//! and adds a small boost for initials ("g" against "giorgio"). A shared
//! email overrides all of it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::identity::{AliasSuggestion, ParticipantIdentity};
use crate::types::Confidence;

const CONTAINMENT_WEIGHT: f64 = 0.4;
const EDIT_WEIGHT: f64 = 0.3;
const JACCARD_WEIGHT: f64 = 0.3;

const INITIAL_BOOST: f64 = 0.10;
const PLURAL_INITIAL_BOOST: f64 = 0.08;
const MAX_BOOST: f64 = 0.20;

/// Thresholds for surfacing and auto-applying alias suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingRules {
    /// Scores below this are not suggested at all. Default: 0.55.
    pub suggestion_floor: f64,
    /// Scores at or above this merge without confirmation. Default: 0.80.
    pub auto_merge_threshold: f64,
    /// Minimum score for two identities sharing an email. Default: 0.95.
    pub shared_email_score: f64,
}

impl Default for MatchingRules {
    fn default() -> Self {
        Self {
            suggestion_floor: 0.55,
            auto_merge_threshold: 0.80,
            shared_email_score: 0.95,
        }
    }
}

/// Per-metric view of one comparison, mostly for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub containment: f64,
    pub edit: f64,
    pub jaccard: f64,
    pub boost: f64,
    pub score: f64,
}

/// Lowercases, strips diacritics and punctuation, and collapses whitespace.
///
/// Idempotent: normalizing a normalized name returns it unchanged.
pub fn normalize_name(name: &str) -> String {
    let stripped: String = name
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokens(normalized: &str) -> BTreeSet<&str> {
    normalized.split_whitespace().collect()
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    num as f64 / den as f64
}

/// Substring containment, falling back to token containment.
///
/// Inputs must already be normalized.
pub fn containment(a: &str, b: &str) -> f64 {
    let (len_a, len_b) = (a.chars().count(), b.chars().count());
    let (shorter, longer, short_len, long_len) = if len_a <= len_b {
        (a, b, len_a, len_b)
    } else {
        (b, a, len_b, len_a)
    };
    if long_len == 0 {
        return 1.0;
    }
    if !shorter.is_empty() && longer.contains(shorter) {
        return ratio(short_len, long_len);
    }
    token_containment(&tokens(a), &tokens(b))
}

/// Share of the smaller token set found inside tokens of the other set.
///
/// With equal set sizes both directions are counted and the better one kept,
/// so the result does not depend on argument order.
fn token_containment(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    let covered = |from: &BTreeSet<&str>, within: &BTreeSet<&str>| {
        from.iter()
            .filter(|t| within.iter().any(|w| w.contains(**t)))
            .count()
    };
    let matched = match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Less => covered(a, b),
        std::cmp::Ordering::Greater => covered(b, a),
        std::cmp::Ordering::Equal => covered(a, b).max(covered(b, a)),
    };
    ratio(matched, larger)
}

/// `1 - levenshtein / max_len`, with two empty strings scoring 1.0.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - ratio(strsim::levenshtein(a, b), max_len)
}

/// Jaccard index over whitespace tokens.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokens(a), tokens(b));
    match (ta.is_empty(), tb.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => ratio(ta.intersection(&tb).count(), ta.union(&tb).count()),
    }
}

/// Bonus for initials matching the other name's words.
///
/// Each single-letter token that starts some token on the other side is
/// worth 0.10, even when that token is the same letter; each two-letter
/// token ending in the plural `s` ("gs") whose first letter starts a token
/// on the other side is worth 0.08. Capped at 0.20.
pub fn abbreviation_boost(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokens(a), tokens(b));
    let (mut initials, mut plurals) = (0u32, 0u32);
    for (mine, other) in [(&ta, &tb), (&tb, &ta)] {
        for token in mine {
            let mut chars = token.chars();
            let starts_other = |c: char| other.iter().any(|o| o.starts_with(c));
            match (chars.next(), chars.next(), chars.next()) {
                (Some(c), None, _) if starts_other(c) => initials += 1,
                (Some(c), Some('s'), None) if starts_other(c) => plurals += 1,
                _ => {}
            }
        }
    }
    (f64::from(initials) * INITIAL_BOOST + f64::from(plurals) * PLURAL_INITIAL_BOOST).min(MAX_BOOST)
}

/// Scores two raw display names, returning every component.
pub fn score_breakdown(a: &str, b: &str) -> ScoreBreakdown {
    let (na, nb) = (normalize_name(a), normalize_name(b));
    if na == nb {
        return ScoreBreakdown {
            containment: 1.0,
            edit: 1.0,
            jaccard: 1.0,
            boost: 0.0,
            score: 1.0,
        };
    }
    let containment = containment(&na, &nb);
    let edit = edit_similarity(&na, &nb);
    let jaccard = token_jaccard(&na, &nb);
    let boost = abbreviation_boost(&na, &nb);
    let blended = CONTAINMENT_WEIGHT * containment + EDIT_WEIGHT * edit + JACCARD_WEIGHT * jaccard;
    ScoreBreakdown {
        containment,
        edit,
        jaccard,
        boost,
        score: (blended + boost).min(1.0),
    }
}

/// Similarity of two raw display names in \[0, 1\].
pub fn name_similarity(a: &str, b: &str) -> f64 {
    score_breakdown(a, b).score
}

/// Similarity of two identities.
///
/// The best score over every pair of aliases is used; a shared non-empty
/// email lifts it to at least `rules.shared_email_score`.
pub fn identity_similarity(
    a: &ParticipantIdentity,
    b: &ParticipantIdentity,
    rules: &MatchingRules,
) -> f64 {
    let names = a
        .aliases
        .iter()
        .flat_map(|x| b.aliases.iter().map(move |y| name_similarity(x, y)))
        .fold(0.0, f64::max);
    match (&a.email, &b.email) {
        (Some(ea), Some(eb)) if !ea.is_empty() && ea.eq_ignore_ascii_case(eb) => {
            names.max(rules.shared_email_score)
        }
        _ => names,
    }
}

/// Where an identity stands during one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectionStatus {
    Unexamined,
    SuggestedTarget,
    /// Claimed by an earlier target with an auto-merge score.
    Absorbed,
}

/// Proposes merges among `roster`, skipping the organizer.
///
/// Identities are examined in master order. Each one that has not been
/// absorbed yet becomes a target for every still-unexamined identity scoring
/// at or above the suggestion floor. Candidates scoring at or above the
/// auto-merge threshold are absorbed and never examined as targets
/// themselves, so a merge cannot cascade within one pass.
pub fn detect_aliases(roster: &[ParticipantIdentity], rules: &MatchingRules) -> Vec<AliasSuggestion> {
    let mut ordered: Vec<&ParticipantIdentity> =
        roster.iter().filter(|p| !p.is_organizer).collect();
    ordered.sort_by_key(|p| (p.master_order, p.id));

    let mut status = vec![DetectionStatus::Unexamined; ordered.len()];
    let mut suggestions = Vec::new();

    for i in 0..ordered.len() {
        if status[i] == DetectionStatus::Absorbed {
            continue;
        }
        let target = ordered[i];

        let mut scored: Vec<(usize, f64)> = Vec::new();
        for (j, other) in ordered.iter().enumerate() {
            if j == i || status[j] != DetectionStatus::Unexamined {
                continue;
            }
            let score = identity_similarity(target, other, rules);
            if score >= rules.suggestion_floor {
                scored.push((j, score));
            }
        }
        if scored.is_empty() {
            continue;
        }

        status[i] = DetectionStatus::SuggestedTarget;
        for &(j, score) in &scored {
            if score >= rules.auto_merge_threshold {
                status[j] = DetectionStatus::Absorbed;
            }
        }

        let suggestion = AliasSuggestion::new(
            target.id,
            target.primary_name.clone(),
            scored
                .into_iter()
                .map(|(j, score)| (ordered[j].primary_name.clone(), Confidence::clamped(score)))
                .collect(),
            rules.auto_merge_threshold,
        );
        tracing::debug!(
            target = %suggestion.target_name,
            candidates = ?suggestion.candidates,
            confidence = %suggestion.confidence,
            auto = suggestion.auto_merge,
            "alias suggestion"
        );
        suggestions.push(suggestion);
    }

    suggestions
}
