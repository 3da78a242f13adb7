use std::sync::Arc;

use tracing::debug;

use quiz_core::model::SessionState;
use storage::repository::{SessionRepository, StorageError};

use crate::error::SessionStoreError;

/// Saves and restores game sessions by slot name.
#[derive(Clone)]
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
}

impl SessionStore {
    #[must_use]
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self { repo }
    }

    /// Load a slot, or start a fresh session if it was never saved.
    ///
    /// # Errors
    ///
    /// Returns `SessionStoreError` for invalid slot names or backend failures.
    pub async fn load(&self, slot: &str) -> Result<SessionState, SessionStoreError> {
        match self.repo.load_snapshot(slot).await {
            Ok(snapshot) => {
                debug!(slot, "session restored");
                Ok(SessionState::from_snapshot(snapshot))
            }
            Err(StorageError::NotFound) => {
                debug!(slot, "no saved session, starting fresh");
                Ok(SessionState::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `SessionStoreError` for invalid slot names or backend failures.
    pub async fn save(&self, slot: &str, state: &SessionState) -> Result<(), SessionStoreError> {
        self.repo.save_snapshot(slot, &state.to_snapshot()).await?;
        debug!(slot, "session saved");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionStoreError` on backend failures.
    pub async fn slots(&self) -> Result<Vec<String>, SessionStoreError> {
        Ok(self.repo.list_slots().await?)
    }

    /// # Errors
    ///
    /// Returns `SessionStoreError` for invalid slot names or backend failures.
    pub async fn delete(&self, slot: &str) -> Result<(), SessionStoreError> {
        self.repo.delete_slot(slot).await?;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use quiz_core::model::{Outcome, ScoreResult, Subject, TurnCommit, Tutor};
    use quiz_core::progression::StageProgression;
    use storage::repository::InMemoryRepository;

    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn missing_slot_starts_fresh() {
        let state = store().load("default").await.unwrap();
        assert_eq!(state, SessionState::new());
    }

    #[tokio::test]
    async fn save_then_load_restores_progress() {
        let store = store();
        let mut state = SessionState::new();
        let stage = StageProgression::default().apply(
            Tutor::Luna,
            state.progress_for(Tutor::Luna),
            Outcome::Correct,
        );
        state.commit(&TurnCommit {
            score: ScoreResult::new(Outcome::Correct, 0.75),
            stage,
        });
        state.push_recent_subject(&Subject::new("EU law: Treaties").unwrap());

        store.save("slot-1", &state).await.unwrap();
        let loaded = store.load("slot-1").await.unwrap();
        assert_eq!(loaded.progress_for(Tutor::Luna).points, 1);
        assert_eq!(loaded.recent_subjects(), ["EU law".to_string()]);
        assert_eq!(store.slots().await.unwrap(), vec!["slot-1".to_string()]);

        store.delete("slot-1").await.unwrap();
        assert!(store.slots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_slot_is_an_error() {
        assert!(store().load("../etc").await.is_err());
    }
}
