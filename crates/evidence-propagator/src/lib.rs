//! Cross-Entity Evidence Propagator
//!
//! Copies recent high-diagnosticity evidence between members of a peer group,
//! attenuated. Every peer's evidence set is read before any target is
//! written, so the order entities were updated in never changes the result.

use chrono::NaiveDate;
use narrative_core::{
    Diagnosticity, EntityRecord, EvidenceImpact, EvidenceItem, EvidenceScope, Hypothesis,
    PeerGroup,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Attenuation at or above which propagated diagnosticity drops one level (else two)
const LIGHT_ATTENUATION: f64 = 0.7;

/// Deterministic id of `item` copied from `source` into `target`
pub fn propagated_id(source: &str, item_id: &str, target: &str) -> String {
    format!("prop:{source}:{item_id}->{target}")
}

/// Diagnosticity after crossing into a peer
pub fn attenuated_diagnosticity(original: Diagnosticity, attenuation: f64) -> Diagnosticity {
    if attenuation >= LIGHT_ATTENUATION {
        original.downgrade(1)
    } else {
        original.downgrade(2)
    }
}

/// Impact of a propagated item on the target's hypotheses.
///
/// Only macro and sector evidence carries a direction across entities;
/// company-specific evidence is neutral for every target hypothesis.
pub fn infer_impacts(item: &EvidenceItem, hypotheses: &[Hypothesis]) -> BTreeMap<String, EvidenceImpact> {
    hypotheses
        .iter()
        .map(|h| {
            let impact = match item.scope {
                EvidenceScope::Company => EvidenceImpact::Neutral,
                EvidenceScope::Macro | EvidenceScope::Sector => {
                    if h.sentiment.aligns_with(item.direction) {
                        EvidenceImpact::Supports
                    } else if h.sentiment.opposes(item.direction) {
                        EvidenceImpact::Contradicts
                    } else {
                        EvidenceImpact::Neutral
                    }
                }
            };
            (h.id.clone(), impact)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationSummary {
    pub copied: usize,
    pub already_present: usize,
    /// Entities that received at least one new item
    pub updated_targets: BTreeSet<String>,
}

pub struct EvidencePropagator {
    window_days: i64,
}

impl Default for EvidencePropagator {
    fn default() -> Self {
        Self::new(30)
    }
}

impl EvidencePropagator {
    pub fn new(window_days: i64) -> Self {
        Self { window_days }
    }

    /// Items of `source` eligible to cross into `group`'s other members
    pub fn candidates<'a>(
        &self,
        source: &'a EntityRecord,
        group: &PeerGroup,
        as_of: NaiveDate,
    ) -> Vec<&'a EvidenceItem> {
        source
            .evidence
            .iter()
            .filter(|item| item.active && item.propagated_from.is_none())
            .filter(|item| item.diagnosticity.is_high())
            .filter(|item| {
                let age = (as_of - item.date).num_days();
                (0..self.window_days).contains(&age)
            })
            .filter(|item| group.relevant_evidence_types.contains(&item.evidence_type))
            .collect()
    }

    /// Attenuated copy of `item` for `target`
    pub fn attenuate(&self, item: &EvidenceItem, target: &EntityRecord, group: &PeerGroup) -> EvidenceItem {
        EvidenceItem {
            id: propagated_id(&item.entity_id, &item.id, target.id()),
            entity_id: target.id().to_string(),
            evidence_type: item.evidence_type.clone(),
            scope: item.scope,
            direction: item.direction,
            diagnosticity: attenuated_diagnosticity(item.diagnosticity, group.attenuation),
            date: item.date,
            active: true,
            half_life_days: item.half_life_days / 2.0,
            impacts: infer_impacts(item, &target.hypotheses),
            summary: item.summary.clone(),
            propagated_from: Some(item.entity_id.clone()),
        }
    }

    /// Propagate across every ordered (source, target) pair of every group.
    ///
    /// Idempotent: an item whose composite id already exists on the target is
    /// not copied again.
    pub fn propagate(
        &self,
        records: &mut BTreeMap<String, EntityRecord>,
        groups: &[PeerGroup],
        as_of: NaiveDate,
    ) -> PropagationSummary {
        // Phase 1: read every peer's evidence before writing anything
        let mut pending: Vec<(String, EvidenceItem)> = Vec::new();
        for group in groups {
            for source_id in &group.members {
                let Some(source) = records.get(source_id) else {
                    continue;
                };
                let items = self.candidates(source, group, as_of);
                if items.is_empty() {
                    continue;
                }
                for target_id in group.members.iter().filter(|t| *t != source_id) {
                    let Some(target) = records.get(target_id) else {
                        continue;
                    };
                    for item in &items {
                        pending.push((target_id.clone(), self.attenuate(item, target, group)));
                    }
                }
            }
        }

        // Phase 2: write
        let mut summary = PropagationSummary::default();
        for (target_id, item) in pending {
            let Some(target) = records.get_mut(&target_id) else {
                continue;
            };
            if target.evidence.iter().any(|e| e.id == item.id) {
                summary.already_present += 1;
                continue;
            }
            tracing::debug!(target = %target_id, id = %item.id, "Propagated evidence");
            target.evidence.push(item);
            summary.copied += 1;
            summary.updated_targets.insert(target_id);
        }

        tracing::info!(
            copied = summary.copied,
            already_present = summary.already_present,
            "Evidence propagation complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrative_core::{Entity, LayerWeights, MoveDirection, Sentiment};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn record(id: &str) -> EntityRecord {
        let entity = Entity {
            id: id.to_string(),
            name: id.to_string(),
            peer_groups: vec!["iron_ore".to_string()],
            default_weights: LayerWeights::new(0.3, 0.4, 0.3),
            narrative_model: String::new(),
            commodity_exposed: true,
        };
        let hypotheses = vec![
            Hypothesis {
                id: "T1".to_string(),
                name: "China demand".to_string(),
                sentiment: Sentiment::Bullish,
                survival_score: 40,
                rank: 1,
            },
            Hypothesis {
                id: "T2".to_string(),
                name: "Supply glut".to_string(),
                sentiment: Sentiment::Bearish,
                survival_score: 35,
                rank: 2,
            },
            Hypothesis {
                id: "T3".to_string(),
                name: "Range-bound".to_string(),
                sentiment: Sentiment::Neutral,
                survival_score: 25,
                rank: 3,
            },
        ];
        EntityRecord::new(entity, hypotheses)
    }

    fn item(id: &str, entity: &str, scope: EvidenceScope, diagnosticity: Diagnosticity, date: NaiveDate) -> EvidenceItem {
        EvidenceItem {
            id: id.to_string(),
            entity_id: entity.to_string(),
            evidence_type: "commodity_price".to_string(),
            scope,
            direction: MoveDirection::Up,
            diagnosticity,
            date,
            active: true,
            half_life_days: 20.0,
            impacts: BTreeMap::new(),
            summary: "Iron ore +8% on stimulus".to_string(),
            propagated_from: None,
        }
    }

    fn group(attenuation: f64) -> PeerGroup {
        PeerGroup {
            id: "iron_ore".to_string(),
            members: vec!["BHP".to_string(), "RIO".to_string(), "FMG".to_string()],
            relevant_evidence_types: vec!["commodity_price".to_string()],
            attenuation,
        }
    }

    fn universe() -> BTreeMap<String, EntityRecord> {
        let mut records: BTreeMap<String, EntityRecord> = ["BHP", "RIO", "FMG"]
            .iter()
            .map(|id| (id.to_string(), record(id)))
            .collect();
        let bhp = records.get_mut("BHP").unwrap();
        bhp.evidence.push(item("ev1", "BHP", EvidenceScope::Sector, Diagnosticity::VeryHigh, d(10)));
        records
    }

    #[test]
    fn test_copies_to_every_peer_attenuated() {
        let mut records = universe();
        let summary = EvidencePropagator::default().propagate(&mut records, &[group(0.8)], d(15));
        assert_eq!(summary.copied, 2);

        let rio = &records["RIO"].evidence;
        assert_eq!(rio.len(), 1);
        let copy = &rio[0];
        assert_eq!(copy.id, "prop:BHP:ev1->RIO");
        assert_eq!(copy.entity_id, "RIO");
        assert_eq!(copy.diagnosticity, Diagnosticity::High);
        assert_eq!(copy.half_life_days, 10.0);
        assert_eq!(copy.propagated_from.as_deref(), Some("BHP"));
        assert_eq!(copy.impacts["T1"], EvidenceImpact::Supports);
        assert_eq!(copy.impacts["T2"], EvidenceImpact::Contradicts);
        assert_eq!(copy.impacts["T3"], EvidenceImpact::Neutral);
    }

    #[test]
    fn test_twice_produces_no_duplicates() {
        let mut records = universe();
        let propagator = EvidencePropagator::default();
        propagator.propagate(&mut records, &[group(0.8)], d(15));
        let second = propagator.propagate(&mut records, &[group(0.8)], d(15));
        assert_eq!(second.copied, 0);
        assert_eq!(second.already_present, 2);
        assert_eq!(records["RIO"].evidence.len(), 1);
        assert_eq!(records["FMG"].evidence.len(), 1);
        // copies are never re-propagated
        assert_eq!(records["BHP"].evidence.len(), 1);
    }

    #[test]
    fn test_filters_age_diagnosticity_type_and_active() {
        let mut records = universe();
        let bhp = records.get_mut("BHP").unwrap();
        bhp.evidence.clear();
        bhp.evidence.push(item("old", "BHP", EvidenceScope::Sector, Diagnosticity::High, d(1) - chrono::Duration::days(40)));
        bhp.evidence.push(item("weak", "BHP", EvidenceScope::Sector, Diagnosticity::Medium, d(10)));
        let mut wrong_type = item("type", "BHP", EvidenceScope::Sector, Diagnosticity::High, d(10));
        wrong_type.evidence_type = "management_change".to_string();
        bhp.evidence.push(wrong_type);
        let mut inactive = item("inactive", "BHP", EvidenceScope::Sector, Diagnosticity::High, d(10));
        inactive.active = false;
        bhp.evidence.push(inactive);

        let summary = EvidencePropagator::default().propagate(&mut records, &[group(0.8)], d(15));
        assert_eq!(summary.copied, 0);
        assert!(summary.updated_targets.is_empty());
    }

    #[test]
    fn test_company_scope_is_neutral_for_target() {
        let mut records = universe();
        records.get_mut("BHP").unwrap().evidence[0].scope = EvidenceScope::Company;
        EvidencePropagator::default().propagate(&mut records, &[group(0.5)], d(15));
        let copy = &records["FMG"].evidence[0];
        assert!(copy.impacts.values().all(|i| *i == EvidenceImpact::Neutral));
        // heavy attenuation drops two levels
        assert_eq!(copy.diagnosticity, Diagnosticity::Medium);
    }

    #[test]
    fn test_reads_before_writing() {
        // RIO also has fresh evidence; BHP's copy landing on RIO first must not
        // change what RIO sends out
        let mut records = universe();
        records
            .get_mut("RIO")
            .unwrap()
            .evidence
            .push(item("ev2", "RIO", EvidenceScope::Macro, Diagnosticity::High, d(12)));
        let summary = EvidencePropagator::default().propagate(&mut records, &[group(0.8)], d(15));
        assert_eq!(summary.copied, 4);
        assert_eq!(records["FMG"].evidence.len(), 2);
        assert!(records["BHP"].evidence.iter().any(|e| e.id == "prop:RIO:ev2->BHP"));
    }

    #[test]
    fn test_diagnosticity_rule() {
        assert_eq!(attenuated_diagnosticity(Diagnosticity::VeryHigh, 0.7), Diagnosticity::High);
        assert_eq!(attenuated_diagnosticity(Diagnosticity::VeryHigh, 0.69), Diagnosticity::Medium);
        assert_eq!(attenuated_diagnosticity(Diagnosticity::High, 0.3), Diagnosticity::Low);
    }
}
