//! Static universe: tracked entities, their hypotheses and peer groups.
//!
//! Validated eagerly; any violation aborts the run before a single record is
//! written.

use anyhow::{Context, Result};
use hypothesis_engine::{apply_scores, ScoreBounds};
use narrative_core::{EngineError, EngineResult, Entity, EntityRecord, Hypothesis, PeerGroup};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const MIN_HYPOTHESES: usize = 3;
const MAX_HYPOTHESES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseEntity {
    #[serde(flatten)]
    pub entity: Entity,
    pub hypotheses: Vec<Hypothesis>,
}

impl UniverseEntity {
    pub fn id(&self) -> &str {
        &self.entity.id
    }

    /// Fresh record with initial scores and ranks
    pub fn initial_record(&self) -> EntityRecord {
        let mut hypotheses = self.hypotheses.clone();
        let scores: Vec<i32> = hypotheses.iter().map(|h| h.survival_score).collect();
        apply_scores(&mut hypotheses, &scores);
        EntityRecord::new(self.entity.clone(), hypotheses)
    }
}

/// Problems with one entity's hypothesis set: count, unique ids, bounds, total
fn hypothesis_problems(id: &str, hypotheses: &[Hypothesis], bounds: ScoreBounds) -> Vec<String> {
    let mut problems = Vec::new();
    let n = hypotheses.len();
    if !(MIN_HYPOTHESES..=MAX_HYPOTHESES).contains(&n) || !bounds.is_feasible(n) {
        problems.push(format!(
            "{id}: {n} hypotheses, expected {MIN_HYPOTHESES}-{MAX_HYPOTHESES}"
        ));
    }
    let mut hypothesis_ids = HashSet::new();
    for h in hypotheses {
        if !hypothesis_ids.insert(h.id.as_str()) {
            problems.push(format!("{id}: duplicate hypothesis {}", h.id));
        }
        if h.survival_score < bounds.floor || h.survival_score > bounds.ceiling {
            problems.push(format!(
                "{id}: hypothesis {} score {} outside [{}, {}]",
                h.id, h.survival_score, bounds.floor, bounds.ceiling
            ));
        }
    }
    let total: i32 = hypotheses.iter().map(|h| h.survival_score).sum();
    if n > 0 && total != bounds.total {
        problems.push(format!("{id}: hypothesis scores sum to {total}, expected {}", bounds.total));
    }
    problems
}

/// A stored record the passes can work on.
///
/// Records drift from the universe file when edited by hand or written by an
/// older build; such a record is malformed for this entity only.
pub fn check_record(record: &EntityRecord, bounds: ScoreBounds) -> EngineResult<()> {
    let id = record.id();
    let mut problems = hypothesis_problems(id, &record.hypotheses, bounds);
    let w = record.weights;
    if !w.is_normalised() {
        problems.push(format!(
            "{id}: stored layer weights {:.4}/{:.4}/{:.4} do not sum to 1",
            w.macro_weight, w.sector_weight, w.idio_weight
        ));
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(EngineError::MalformedRecord(problems.join("; ")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub entities: Vec<UniverseEntity>,
    #[serde(default)]
    pub peer_groups: Vec<PeerGroup>,
}

impl Universe {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read universe file {}", path.display()))?;
        let universe: Universe = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse universe file {}", path.display()))?;
        Ok(universe)
    }

    pub fn entity(&self, id: &str) -> Option<&UniverseEntity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Entity ids in processing order
    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entities.iter().map(|e| e.id().to_string()).collect();
        ids.sort();
        ids
    }

    /// Every static-configuration problem, joined into one constraint violation
    pub fn validate(&self, bounds: ScoreBounds) -> EngineResult<()> {
        let mut problems = Vec::new();

        let mut entity_ids = HashSet::new();
        for ue in &self.entities {
            let id = ue.id();
            if id.is_empty() {
                problems.push("entity with empty id".to_string());
            }
            if !entity_ids.insert(id) {
                problems.push(format!("duplicate entity {id}"));
            }

            let w = ue.entity.default_weights;
            if !w.is_normalised() {
                problems.push(format!(
                    "{id}: layer weights {:.4}/{:.4}/{:.4} do not sum to 1",
                    w.macro_weight, w.sector_weight, w.idio_weight
                ));
            }

            problems.extend(hypothesis_problems(id, &ue.hypotheses, bounds));
        }

        let mut group_ids = HashSet::new();
        for group in &self.peer_groups {
            if !group_ids.insert(group.id.as_str()) {
                problems.push(format!("duplicate peer group {}", group.id));
            }
            if !(group.attenuation > 0.0 && group.attenuation <= 1.0) {
                problems.push(format!(
                    "peer group {}: attenuation {} outside (0, 1]",
                    group.id, group.attenuation
                ));
            }
            for member in &group.members {
                if !entity_ids.contains(member.as_str()) {
                    problems.push(format!("peer group {}: unknown member {member}", group.id));
                }
            }
        }

        for ue in &self.entities {
            for group in &ue.entity.peer_groups {
                if !group_ids.contains(group.as_str()) {
                    problems.push(format!("{}: unknown peer group {group}", ue.id()));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ConstraintViolation(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe_json() -> &'static str {
        r#"{
            "entities": [
                {
                    "id": "BHP", "name": "BHP Group", "peer_groups": ["iron_ore"],
                    "default_weights": {"macro_weight": 0.3, "sector_weight": 0.4, "idio_weight": 0.3},
                    "commodity_exposed": true,
                    "hypotheses": [
                        {"id": "T1", "name": "China demand", "sentiment": "BULLISH", "survival_score": 40},
                        {"id": "T2", "name": "Supply glut", "sentiment": "BEARISH", "survival_score": 35},
                        {"id": "T3", "name": "Range-bound", "sentiment": "NEUTRAL", "survival_score": 25}
                    ]
                },
                {
                    "id": "RIO", "name": "Rio Tinto", "peer_groups": ["iron_ore"],
                    "default_weights": {"macro_weight": 0.3, "sector_weight": 0.4, "idio_weight": 0.3},
                    "hypotheses": [
                        {"id": "T1", "name": "China demand", "sentiment": "BULLISH", "survival_score": 30},
                        {"id": "T2", "name": "Supply glut", "sentiment": "BEARISH", "survival_score": 30},
                        {"id": "T3", "name": "Range-bound", "sentiment": "NEUTRAL", "survival_score": 25},
                        {"id": "T4", "name": "Copper pivot", "sentiment": "BULLISH", "survival_score": 15}
                    ]
                }
            ],
            "peer_groups": [
                {"id": "iron_ore", "members": ["BHP", "RIO"],
                 "relevant_evidence_types": ["commodity_price"], "attenuation": 0.8}
            ]
        }"#
    }

    fn universe() -> Universe {
        serde_json::from_str(universe_json()).unwrap()
    }

    #[test]
    fn test_valid_universe() {
        let u = universe();
        assert!(u.validate(ScoreBounds::default()).is_ok());
        assert_eq!(u.entity_ids(), vec!["BHP", "RIO"]);
        assert!(u.entity("RIO").unwrap().entity.peer_groups.contains(&"iron_ore".to_string()));
    }

    #[test]
    fn test_initial_record_ranks() {
        let record = universe().entity("BHP").unwrap().initial_record();
        assert_eq!(record.dominant_id(), Some("T1"));
        assert_eq!(record.hypotheses[2].rank, 3);
    }

    #[test]
    fn test_bad_weights_abort() {
        let mut u = universe();
        u.entities[0].entity.default_weights.idio_weight = 0.4;
        let err = u.validate(ScoreBounds::default()).unwrap_err();
        assert!(matches!(err, EngineError::ConstraintViolation(_)));
        assert!(err.to_string().contains("BHP"));
    }

    #[test]
    fn test_bad_hypotheses_abort() {
        let mut u = universe();
        u.entities[0].hypotheses.truncate(2);
        assert!(u.validate(ScoreBounds::default()).is_err());

        let mut u = universe();
        u.entities[1].hypotheses[3].id = "T1".to_string();
        assert!(u.validate(ScoreBounds::default()).is_err());

        let mut u = universe();
        u.entities[0].hypotheses[0].survival_score = 90;
        u.entities[0].hypotheses[1].survival_score = 5;
        u.entities[0].hypotheses[2].survival_score = 5;
        assert!(u.validate(ScoreBounds::default()).is_err());
    }

    #[test]
    fn test_drifted_record_is_malformed() {
        let u = universe();
        let mut record = u.entity("BHP").unwrap().initial_record();
        assert!(check_record(&record, ScoreBounds::default()).is_ok());

        record.hypotheses.truncate(1);
        record.hypotheses[0].survival_score = 100;
        let err = check_record(&record, ScoreBounds::default()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(_)));
        assert!(err.is_entity_scoped());

        let mut record = u.entity("BHP").unwrap().initial_record();
        record.weights.macro_weight = 0.7;
        assert!(matches!(
            check_record(&record, ScoreBounds::default()),
            Err(EngineError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_bad_peer_groups_abort() {
        let mut u = universe();
        u.peer_groups[0].members.push("FMG".to_string());
        assert!(u.validate(ScoreBounds::default()).is_err());

        let mut u = universe();
        u.peer_groups[0].attenuation = 0.0;
        assert!(u.validate(ScoreBounds::default()).is_err());

        let mut u = universe();
        u.entities[0].entity.peer_groups.push("coal".to_string());
        assert!(u.validate(ScoreBounds::default()).is_err());
    }
}
