use async_trait::async_trait;
use dashmap::DashMap;
use narrative_core::{EngineResult, EntityRecord, RecordStore};

/// In-memory store. Backs dry runs (seeded from another store) and tests.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, EntityRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every readable record of `source` into a fresh memory store.
    ///
    /// Records that fail to load for entity-scoped reasons are left out, so a
    /// pass over the copy skips them exactly as it would over `source`.
    pub async fn snapshot_of(source: &dyn RecordStore) -> EngineResult<Self> {
        let store = Self::new();
        for id in source.entity_ids().await? {
            match source.load(&id).await {
                Ok(Some(record)) => {
                    store.records.insert(id, record);
                }
                Ok(None) => {}
                Err(e) if e.is_entity_scoped() => {
                    tracing::warn!(entity = %id, "Left out of in-memory copy: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self, entity_id: &str) -> EngineResult<Option<EntityRecord>> {
        Ok(self.records.get(entity_id).map(|r| r.value().clone()))
    }

    async fn save(&self, record: &EntityRecord) -> EngineResult<()> {
        self.records.insert(record.id().to_string(), record.clone());
        Ok(())
    }

    async fn entity_ids(&self) -> EngineResult<Vec<String>> {
        let mut ids: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonFileStore;
    use narrative_core::{Entity, LayerWeights};

    fn record(id: &str) -> EntityRecord {
        let entity = Entity {
            id: id.to_string(),
            name: id.to_string(),
            peer_groups: vec![],
            default_weights: LayerWeights::new(0.3, 0.3, 0.4),
            narrative_model: String::new(),
            commodity_exposed: false,
        };
        EntityRecord::new(entity, vec![])
    }

    #[tokio::test]
    async fn test_save_load_and_sorted_ids() {
        let store = MemoryStore::new();
        store.save(&record("RIO")).await.unwrap();
        store.save(&record("BHP")).await.unwrap();
        assert_eq!(store.entity_ids().await.unwrap(), vec!["BHP", "RIO"]);
        assert_eq!(store.load("BHP").await.unwrap().unwrap().id(), "BHP");
        assert!(store.load("FMG").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_independent_copy() {
        let source = MemoryStore::new();
        source.save(&record("BHP")).await.unwrap();
        let copy = MemoryStore::snapshot_of(&source).await.unwrap();

        let mut changed = record("BHP");
        changed.current_price = Some(45.0);
        copy.save(&changed).await.unwrap();

        assert!(source.load("BHP").await.unwrap().unwrap().current_price.is_none());
        assert_eq!(copy.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_skips_corrupt_file() {
        let dir = std::env::temp_dir().join(format!(
            "narrative-store-snapshot-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let files = JsonFileStore::new(&dir);
        files.save(&record("WOW")).await.unwrap();
        std::fs::write(dir.join("BAD.json"), b"{not json").unwrap();

        let copy = MemoryStore::snapshot_of(&files).await.unwrap();
        assert_eq!(copy.entity_ids().await.unwrap(), vec!["WOW"]);
        assert!(copy.load("BAD").await.unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
