use async_trait::async_trait;
use narrative_core::{EngineError, EngineResult, EntityRecord, RecordStore};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// `{dir}/{entity_id}.json`, written atomically via a temp file and rename
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, entity_id: &str) -> EngineResult<PathBuf> {
        let valid = !entity_id.is_empty()
            && entity_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !entity_id.starts_with('.');
        if !valid {
            return Err(EngineError::MalformedRecord(format!(
                "entity id {entity_id:?} is not a valid file name"
            )));
        }
        Ok(self.dir.join(format!("{entity_id}.json")))
    }
}

fn store_err(context: &str, path: &Path, err: std::io::Error) -> EngineError {
    EngineError::Store(format!("{context} {}: {err}", path.display()))
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn load(&self, entity_id: &str) -> EngineResult<Option<EntityRecord>> {
        let path = self.path_for(entity_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_err("read", &path, e)),
        };
        let record: EntityRecord = serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::MalformedRecord(format!("{}: {e}", path.display()))
        })?;
        Ok(Some(record))
    }

    async fn save(&self, record: &EntityRecord) -> EngineResult<()> {
        let path = self.path_for(record.id())?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| store_err("create", &self.dir, e))?;

        let body = serde_json::to_vec_pretty(record)
            .map_err(|e| EngineError::Store(format!("encode {}: {e}", record.id())))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| store_err("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| store_err("rename", &path, e))?;

        tracing::debug!(entity = record.id(), path = %path.display(), "Record saved");
        Ok(())
    }

    async fn entity_ids(&self) -> EngineResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_err("list", &self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| store_err("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
