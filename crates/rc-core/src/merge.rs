//! Folding duplicate identities into one.
//!
//! The roster is an arena: identities are never removed, only marked as
//! absorbed into a survivor. Ids handed out before a merge therefore keep
//! resolving (to the survivor) after it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{AliasMapping, AliasSuggestion, ParticipantIdentity};
use crate::similarity::MatchingRules;
use crate::types::{Confidence, IdentityId, MergeKind};

/// Errors from explicitly requested merges.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("no participant is known as {0:?}")]
    UnknownName(String),
    #[error("the organizer cannot be merged")]
    Organizer,
    #[error("a merge needs at least two distinct participants")]
    TooFew,
    #[error("primary name {0:?} is not among the merged names")]
    UnknownPrimary(String),
}

/// Which suggestions get applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Only suggestions flagged for auto-merge, and within them only
    /// candidates that individually reach the threshold.
    #[default]
    AutoOnly,
    /// Every candidate of every suggestion.
    Forced,
}

/// A caller-requested merge of several names into one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualMerge {
    /// Names of the identities to merge; any alias works.
    pub names: Vec<String>,
    /// Name to keep as primary. Defaults to the alphabetically smallest.
    #[serde(default)]
    pub primary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Live,
    AbsorbedInto(IdentityId),
}

#[derive(Debug, Clone)]
struct Entry {
    identity: ParticipantIdentity,
    state: EntryState,
}

/// Working set of identities for one course.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<Entry>,
    index: HashMap<IdentityId, usize>,
}

impl Roster {
    pub fn new(identities: impl IntoIterator<Item = ParticipantIdentity>) -> Self {
        let mut roster = Self::default();
        for identity in identities {
            roster.push(identity);
        }
        roster
    }

    /// Adds an identity. A duplicate id replaces nothing and is dropped.
    pub fn push(&mut self, identity: ParticipantIdentity) {
        if self.index.contains_key(&identity.id) {
            tracing::warn!(id = %identity.id, "duplicate identity id ignored");
            return;
        }
        self.index.insert(identity.id, self.entries.len());
        self.entries.push(Entry {
            identity,
            state: EntryState::Live,
        });
    }

    /// Follows merges until reaching a live identity.
    pub fn resolve(&self, id: IdentityId) -> Option<IdentityId> {
        let mut current = id;
        // Chains are acyclic: a survivor is always live when something is
        // absorbed into it.
        for _ in 0..=self.entries.len() {
            match self.entry(current)?.state {
                EntryState::Live => return Some(current),
                EntryState::AbsorbedInto(next) => current = next,
            }
        }
        None
    }

    /// Looks up an identity, following merges.
    pub fn get(&self, id: IdentityId) -> Option<&ParticipantIdentity> {
        self.resolve(id)
            .and_then(|live| self.entry(live))
            .map(|e| &e.identity)
    }

    fn entry(&self, id: IdentityId) -> Option<&Entry> {
        self.index.get(&id).map(|&slot| &self.entries[slot])
    }

    fn entry_mut(&mut self, id: IdentityId) -> Option<&mut Entry> {
        self.index.get(&id).map(|&slot| &mut self.entries[slot])
    }

    /// Live identities in master order.
    pub fn live(&self) -> Vec<&ParticipantIdentity> {
        let mut live: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.state == EntryState::Live)
            .map(|e| &e.identity)
            .collect();
        live.sort_by_key(|p| (p.master_order, p.id));
        live
    }

    /// Number of identities absorbed so far.
    pub fn absorbed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state != EntryState::Live)
            .count()
    }

    /// Live identity whose primary name is exactly `name`.
    pub fn find_primary(&self, name: &str) -> Option<IdentityId> {
        self.entries
            .iter()
            .find(|e| e.state == EntryState::Live && e.identity.primary_name == name)
            .map(|e| e.identity.id)
    }

    /// Live identity known under `name`, ignoring case.
    pub fn find_alias(&self, name: &str) -> Option<IdentityId> {
        self.live()
            .into_iter()
            .find(|p| p.answers_to(name))
            .map(|p| p.id)
    }

    /// Consumes the roster, returning live identities in master order.
    pub fn into_identities(self) -> Vec<ParticipantIdentity> {
        let mut live: Vec<_> = self
            .entries
            .into_iter()
            .filter(|e| e.state == EntryState::Live)
            .map(|e| e.identity)
            .collect();
        live.sort_by_key(|p| (p.master_order, p.id));
        live
    }

    /// Folds `source` into `target`.
    ///
    /// Returns the source's primary name, or `None` if the fold was refused
    /// (same identity, not live, or organizer involved).
    fn fold(&mut self, target: IdentityId, source: IdentityId) -> Option<String> {
        if target == source {
            return None;
        }
        let (target_ok, source_ok) = (self.foldable(target), self.foldable(source));
        if !target_ok || !source_ok {
            tracing::warn!(%target, %source, "refusing to merge organizer or absorbed identity");
            return None;
        }

        let absorbed = {
            let entry = self.entry_mut(source)?;
            entry.state = EntryState::AbsorbedInto(target);
            entry.identity.clone()
        };
        let survivor = &mut self.entry_mut(target)?.identity;
        for alias in absorbed.aliases {
            if !survivor.aliases.contains(&alias) {
                survivor.aliases.push(alias);
            }
        }
        if survivor.email.is_none() {
            survivor.email = absorbed.email;
        }
        survivor.days_present.extend(absorbed.days_present);
        survivor.days_present.sort_unstable();
        survivor.days_present.dedup();
        survivor.master_order = survivor.master_order.min(absorbed.master_order);

        tracing::debug!(into = %survivor.primary_name, from = %absorbed.primary_name, "merged identity");
        Some(absorbed.primary_name)
    }

    fn foldable(&self, id: IdentityId) -> bool {
        self.entry(id)
            .is_some_and(|e| e.state == EntryState::Live && !e.identity.is_organizer)
    }
}

/// Applies alias suggestions to the roster.
///
/// Returns one mapping per suggestion that folded at least one identity.
/// Candidates are located by primary name among live identities; names that
/// no longer resolve (already merged elsewhere) are skipped.
pub fn apply_suggestions(
    roster: &mut Roster,
    suggestions: &[AliasSuggestion],
    mode: MergeMode,
    rules: &MatchingRules,
) -> Vec<AliasMapping> {
    let mut mappings = Vec::new();
    for suggestion in suggestions {
        if mode == MergeMode::AutoOnly && !suggestion.auto_merge {
            continue;
        }
        let Some(target) = roster.resolve(suggestion.target) else {
            continue;
        };

        let mut merged_names = Vec::new();
        for (name, score) in suggestion.scored_candidates() {
            if mode == MergeMode::AutoOnly && score.value() < rules.auto_merge_threshold {
                continue;
            }
            let Some(source) = roster.find_primary(name) else {
                tracing::debug!(name, "candidate no longer on the roster");
                continue;
            };
            if let Some(folded) = roster.fold(target, source) {
                merged_names.push(folded);
            }
        }
        if merged_names.is_empty() {
            continue;
        }

        let Some(survivor) = roster.get(target) else {
            continue;
        };
        merged_names.insert(0, survivor.primary_name.clone());
        let kind = if suggestion.auto_merge {
            MergeKind::Auto
        } else {
            MergeKind::Manual
        };
        mappings.push(AliasMapping {
            identity: target,
            primary_name: survivor.primary_name.clone(),
            merged_names,
            kind,
            confidence: suggestion.confidence,
        });
    }
    mappings
}

/// Merges the identities named in `merge` into one.
///
/// Without an explicit primary the alphabetically smallest name wins and the
/// alphabetically smallest email is kept, so the result does not depend on
/// the order names were listed in. The survivor takes the best master order
/// of the group.
pub fn apply_manual_merge(roster: &mut Roster, merge: &ManualMerge) -> Result<AliasMapping, MergeError> {
    let mut ids: Vec<IdentityId> = Vec::new();
    for name in &merge.names {
        let id = roster
            .find_alias(name)
            .ok_or_else(|| MergeError::UnknownName(name.clone()))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.len() < 2 {
        return Err(MergeError::TooFew);
    }

    let group: Vec<&ParticipantIdentity> = ids.iter().filter_map(|id| roster.get(*id)).collect();
    if group.iter().any(|p| p.is_organizer) {
        return Err(MergeError::Organizer);
    }

    let primary = match &merge.primary {
        Some(wanted) => group
            .iter()
            .flat_map(|p| p.aliases.iter())
            .find(|a| a.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| MergeError::UnknownPrimary(wanted.clone()))?,
        None => group
            .iter()
            .map(|p| p.primary_name.clone())
            .min()
            .ok_or(MergeError::TooFew)?,
    };
    let email = group.iter().filter_map(|p| p.email.clone()).min();
    let target = group
        .iter()
        .find(|p| p.answers_to(&primary))
        .map_or(ids[0], |p| p.id);

    let mut merged_names = vec![];
    for id in ids.iter().copied().filter(|id| *id != target) {
        if let Some(name) = roster.fold(target, id) {
            merged_names.push(name);
        }
    }

    let survivor = roster
        .entry_mut(target)
        .map(|e| &mut e.identity)
        .ok_or(MergeError::TooFew)?;
    survivor.primary_name.clone_from(&primary);
    if !survivor.aliases.contains(&primary) {
        survivor.aliases.insert(0, primary.clone());
    }
    if email.is_some() {
        survivor.email = email;
    }
    merged_names.insert(0, primary.clone());

    Ok(AliasMapping {
        identity: target,
        primary_name: primary,
        merged_names,
        kind: MergeKind::Manual,
        confidence: Confidence::MAX,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
    }

    fn ident(id: u32, name: &str, days: &[u32]) -> ParticipantIdentity {
        ParticipantIdentity::new(IdentityId::new(id), name, id)
            .with_days(days.iter().copied().map(d).collect())
    }

    fn score(v: f64) -> Confidence {
        Confidence::new(v).unwrap()
    }

    fn suggestion(target: u32, name: &str, candidates: &[(&str, f64)]) -> AliasSuggestion {
        AliasSuggestion::new(
            IdentityId::new(target),
            name,
            candidates
                .iter()
                .map(|(n, s)| ((*n).to_string(), score(*s)))
                .collect(),
            0.80,
        )
    }

    fn sample_roster() -> Roster {
        Roster::new([
            ParticipantIdentity::organizer(IdentityId::new(0), "Docente", None),
            ident(1, "G. Santambrogio", &[19]),
            ident(2, "Giorgio Santambrogio", &[22, 20]),
            ident(3, "giorgio s.", &[20, 21])
                .with_email(Some("giorgio@example.org".into())),
            ident(4, "Anna Rossi", &[19, 20, 21]),
        ])
    }

    #[test]
    fn test_auto_merge_unions_days_and_aliases() {
        let mut roster = sample_roster();
        let before = roster.live().len();
        let suggestions = [suggestion(
            1,
            "G. Santambrogio",
            &[("Giorgio Santambrogio", 0.81), ("giorgio s.", 0.85)],
        )];

        let mappings = apply_suggestions(
            &mut roster,
            &suggestions,
            MergeMode::AutoOnly,
            &MatchingRules::default(),
        );

        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].kind, MergeKind::Auto);
        assert_eq!(
            mappings[0].merged_names,
            vec!["G. Santambrogio", "giorgio s.", "Giorgio Santambrogio"]
        );

        let merged = roster.get(IdentityId::new(1)).unwrap();
        assert_eq!(merged.days_present, vec![d(19), d(20), d(21), d(22)]);
        assert_eq!(merged.aliases.len(), 3);
        assert_eq!(merged.email.as_deref(), Some("giorgio@example.org"));
        assert!(roster.live().len() <= before);
        assert_eq!(roster.live().len(), 3);
    }

    #[test]
    fn test_absorbed_ids_resolve_to_survivor() {
        let mut roster = sample_roster();
        apply_suggestions(
            &mut roster,
            &[suggestion(1, "G. Santambrogio", &[("Giorgio Santambrogio", 0.9)])],
            MergeMode::AutoOnly,
            &MatchingRules::default(),
        );
        assert_eq!(roster.resolve(IdentityId::new(2)), Some(IdentityId::new(1)));
        assert_eq!(roster.get(IdentityId::new(2)).unwrap().primary_name, "G. Santambrogio");
        assert_eq!(roster.absorbed_count(), 1);
    }

    #[test]
    fn test_non_auto_suggestions_skipped_unless_forced() {
        let rules = MatchingRules::default();
        let suggestions = [suggestion(4, "Anna Rossi", &[("giorgio s.", 0.6)])];

        let mut roster = sample_roster();
        assert!(apply_suggestions(&mut roster, &suggestions, MergeMode::AutoOnly, &rules).is_empty());
        assert_eq!(roster.live().len(), 5);

        let mappings = apply_suggestions(&mut roster, &suggestions, MergeMode::Forced, &rules);
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].kind, MergeKind::Manual);
        assert_eq!(roster.live().len(), 4);
    }

    #[test]
    fn test_low_candidates_in_auto_suggestion_are_left_alone() {
        let mut roster = sample_roster();
        apply_suggestions(
            &mut roster,
            &[suggestion(
                1,
                "G. Santambrogio",
                &[("Giorgio Santambrogio", 0.9), ("giorgio s.", 0.6)],
            )],
            MergeMode::AutoOnly,
            &MatchingRules::default(),
        );
        assert!(roster.find_primary("giorgio s.").is_some());
    }

    #[test]
    fn test_organizer_is_never_folded() {
        let mut roster = sample_roster();
        let mappings = apply_suggestions(
            &mut roster,
            &[suggestion(1, "G. Santambrogio", &[("Docente", 0.99)])],
            MergeMode::Forced,
            &MatchingRules::default(),
        );
        assert!(mappings.is_empty());
        assert!(roster.find_primary("Docente").is_some());
    }

    #[test]
    fn test_live_roster_is_sorted_by_master_order() {
        let roster = sample_roster();
        let orders: Vec<u32> = roster.live().iter().map(|p| p.master_order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);
        let identities = roster.into_identities();
        assert_eq!(identities[0].primary_name, "Docente");
    }

    #[test]
    fn test_manual_merge_prefers_alphabetical_minimum() {
        let mut roster = sample_roster();
        let mapping = apply_manual_merge(
            &mut roster,
            &ManualMerge {
                names: vec!["giorgio s.".into(), "Giorgio Santambrogio".into()],
                primary: None,
            },
        )
        .unwrap();

        assert_eq!(mapping.primary_name, "Giorgio Santambrogio");
        assert_eq!(mapping.kind, MergeKind::Manual);
        let survivor = roster.get(mapping.identity).unwrap();
        assert_eq!(survivor.primary_name, "Giorgio Santambrogio");
        assert_eq!(survivor.days_present, vec![d(20), d(21), d(22)]);
        assert_eq!(survivor.email.as_deref(), Some("giorgio@example.org"));
        assert_eq!(survivor.master_order, 2);
    }

    #[test]
    fn test_manual_merge_with_explicit_primary() {
        let mut roster = sample_roster();
        let mapping = apply_manual_merge(
            &mut roster,
            &ManualMerge {
                names: vec!["G. Santambrogio".into(), "giorgio s.".into()],
                primary: Some("giorgio s.".into()),
            },
        )
        .unwrap();
        assert_eq!(mapping.identity, IdentityId::new(3));
        let survivor = roster.get(IdentityId::new(1)).unwrap();
        assert_eq!(survivor.primary_name, "giorgio s.");
        assert_eq!(survivor.master_order, 1);
    }

    #[test]
    fn test_manual_merge_rejects_bad_requests() {
        let mut roster = sample_roster();
        let unknown = ManualMerge {
            names: vec!["Nobody".into(), "Anna Rossi".into()],
            primary: None,
        };
        assert_eq!(
            apply_manual_merge(&mut roster, &unknown),
            Err(MergeError::UnknownName("Nobody".into()))
        );

        let single = ManualMerge {
            names: vec!["Anna Rossi".into(), "anna rossi".into()],
            primary: None,
        };
        assert_eq!(apply_manual_merge(&mut roster, &single), Err(MergeError::TooFew));

        let organizer = ManualMerge {
            names: vec!["Docente".into(), "Anna Rossi".into()],
            primary: None,
        };
        assert_eq!(apply_manual_merge(&mut roster, &organizer), Err(MergeError::Organizer));

        let bad_primary = ManualMerge {
            names: vec!["G. Santambrogio".into(), "Anna Rossi".into()],
            primary: Some("Someone Else".into()),
        };
        assert_eq!(
            apply_manual_merge(&mut roster, &bad_primary),
            Err(MergeError::UnknownPrimary("Someone Else".into()))
        );
    }
}
