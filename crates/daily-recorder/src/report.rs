use chrono::NaiveDate;
use narrative_core::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPass {
    Daily,
    Composite,
    Monthly,
    Backfill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityOutcome {
    Recorded,
    Skipped(String),
    Failed(String),
}

impl EntityOutcome {
    /// Missing or malformed inputs skip the entity; anything else is a failure
    pub fn from_error(err: &EngineError) -> Self {
        match err {
            EngineError::MissingInput(_)
            | EngineError::MalformedRecord(_)
            | EngineError::InsufficientHistory(_) => EntityOutcome::Skipped(err.to_string()),
            _ => EntityOutcome::Failed(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity_id: String,
    #[serde(flatten)]
    pub outcome: EntityOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    PartiallyFailed,
    Failed,
}

/// Per-entity outcomes of one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub pass: RunPass,
    pub date: NaiveDate,
    pub entities: Vec<EntityReport>,
}

impl RunReport {
    pub fn new(pass: RunPass, date: NaiveDate) -> Self {
        Self {
            pass,
            date,
            entities: Vec::new(),
        }
    }

    pub fn push(&mut self, entity_id: &str, outcome: EntityOutcome) {
        match &outcome {
            EntityOutcome::Recorded => {}
            EntityOutcome::Skipped(reason) => {
                tracing::warn!(entity = entity_id, pass = ?self.pass, "Skipped: {}", reason)
            }
            EntityOutcome::Failed(reason) => {
                tracing::error!(entity = entity_id, pass = ?self.pass, "Failed: {}", reason)
            }
        }
        self.entities.push(EntityReport {
            entity_id: entity_id.to_string(),
            outcome,
        });
    }

    pub fn count(&self, pred: impl Fn(&EntityOutcome) -> bool) -> usize {
        self.entities.iter().filter(|e| pred(&e.outcome)).count()
    }

    pub fn recorded(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Recorded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Failed(_)))
    }

    /// Failed when every entity failed, partially failed when some did
    pub fn status(&self) -> RunStatus {
        let failed = self.failed();
        if failed == 0 {
            RunStatus::Completed
        } else if failed == self.entities.len() {
            RunStatus::Failed
        } else {
            RunStatus::PartiallyFailed
        }
    }

    pub fn outcome_for(&self, entity_id: &str) -> Option<&EntityOutcome> {
        self.entities
            .iter()
            .find(|e| e.entity_id == entity_id)
            .map(|e| &e.outcome)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            pass = ?self.pass,
            date = %self.date,
            recorded = self.recorded(),
            skipped = self.skipped(),
            failed = self.failed(),
            status = ?self.status(),
            "Pass complete"
        );
    }
}
