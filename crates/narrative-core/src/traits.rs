use async_trait::async_trait;
use crate::{EngineResult, EntityRecord};

/// Per-entity record store.
///
/// The engine assumes a single writer per run: each pass loads a record,
/// mutates it and saves it back with no locking across entities.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load one record, `None` if the entity has never been written
    async fn load(&self, entity_id: &str) -> EngineResult<Option<EntityRecord>>;

    /// Persist a full record, replacing any previous version
    async fn save(&self, record: &EntityRecord) -> EngineResult<()>;

    /// Ids of all stored entities, sorted
    async fn entity_ids(&self) -> EngineResult<Vec<String>>;
}
