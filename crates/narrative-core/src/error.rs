use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No price/volume for an entity on the run date. The entity is skipped.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// A record could not be decoded. The record is skipped.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Below a component's minimum sample. Reported as a status, never raised by scoring code.
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    /// Configuration bug. Aborts the whole run before any write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Remote collaborator failed or timed out. Callers degrade to a fallback.
    #[error("External service failure: {0}")]
    ExternalServiceFailure(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Per-entity errors are logged and skipped; everything else is fatal for the run.
    pub fn is_entity_scoped(&self) -> bool {
        matches!(
            self,
            EngineError::MissingInput(_)
                | EngineError::MalformedRecord(_)
                | EngineError::InsufficientHistory(_)
                | EngineError::ExternalServiceFailure(_)
                | EngineError::Store(_)
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::MalformedRecord(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
