use async_trait::async_trait;
use quiz_core::model::SessionSnapshot;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::repository::{SessionRepository, StorageError, validate_slot};

const EXTENSION: &str = "json";

/// Stores each slot as a pretty-printed JSON file in one directory.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    /// Use `dir` for save files. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, slot: &str) -> Result<PathBuf, StorageError> {
        let slot = validate_slot(slot)?;
        Ok(self.dir.join(format!("{slot}.{EXTENSION}")))
    }
}

fn io_err(e: &std::io::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl SessionRepository for JsonFileRepository {
    async fn save_snapshot(
        &self,
        slot: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let path = self.path_for(slot)?;
        let body = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_err(&e))?;
        // write-then-rename so a crash never leaves a half-written save
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(|e| io_err(&e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_err(&e))?;
        Ok(())
    }

    async fn load_snapshot(&self, slot: &str) -> Result<SessionSnapshot, StorageError> {
        let path = self.path_for(slot)?;
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(e) => return Err(io_err(&e)),
        };
        serde_json::from_slice(&body).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn list_slots(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&e)),
        };

        let mut slots = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_slot(stem).is_ok() {
                    slots.push(stem.to_string());
                }
            }
        }
        slots.sort();
        Ok(slots)
    }

    async fn delete_slot(&self, slot: &str) -> Result<(), StorageError> {
        let path = self.path_for(slot)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&e)),
        }
    }
}

// ─── TESTS ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{HistoryRecord, Outcome};

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            points: [("Maria".to_string(), 3)].into(),
            stage: [("Maria".to_string(), 1)].into(),
            history: vec![HistoryRecord {
                tutor: "Maria".into(),
                outcome: Outcome::Wrong,
            }],
            score: -0.25,
            last_outcome: Some(Outcome::Wrong),
            recent_subjects: vec!["Administrative law".into()],
            ..SessionSnapshot::default()
        }
    }

    #[tokio::test]
    async fn saves_and_loads_a_slot() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("saves"));

        repo.save_snapshot("main", &snapshot()).await.unwrap();
        assert_eq!(repo.load_snapshot("main").await.unwrap(), snapshot());
        assert_eq!(repo.list_slots().await.unwrap(), vec!["main"]);
        assert!(!dir.path().join("saves/main.json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_directory_has_no_slots() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("nope"));
        assert!(repo.list_slots().await.unwrap().is_empty());
        assert!(matches!(
            repo.load_snapshot("main").await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn older_files_with_missing_fields_still_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.json"), r#"{"score": 12.0}"#).unwrap();
        let repo = JsonFileRepository::new(dir.path());

        let snap = repo.load_snapshot("old").await.unwrap();
        assert_eq!(snap.score, 12.0);
        assert!(snap.history.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let repo = JsonFileRepository::new(dir.path());
        assert!(matches!(
            repo.load_snapshot("bad").await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn traversal_slot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path());
        assert!(matches!(
            repo.save_snapshot("../escape", &snapshot()).await,
            Err(StorageError::InvalidSlot(_))
        ));
    }
}
