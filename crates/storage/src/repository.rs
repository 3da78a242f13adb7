use async_trait::async_trait;
use quiz_core::model::SessionSnapshot;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Longest accepted slot name.
pub const MAX_SLOT_LEN: usize = 64;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("invalid slot name: {0:?}")]
    InvalidSlot(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Check that a slot name is non-empty and safe to use as a file stem.
///
/// # Errors
///
/// Returns `StorageError::InvalidSlot` for empty, overlong or non
/// `[A-Za-z0-9_-]` names.
pub fn validate_slot(slot: &str) -> Result<&str, StorageError> {
    let ok = !slot.is_empty()
        && slot.len() <= MAX_SLOT_LEN
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(slot)
    } else {
        Err(StorageError::InvalidSlot(slot.to_string()))
    }
}

/// Repository contract for saved sessions, keyed by slot name.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist or replace the snapshot stored under `slot`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot is invalid or the write fails.
    async fn save_snapshot(&self, slot: &str, snapshot: &SessionSnapshot)
    -> Result<(), StorageError>;

    /// Fetch the snapshot stored under `slot`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if nothing was saved there.
    async fn load_snapshot(&self, slot: &str) -> Result<SessionSnapshot, StorageError>;

    /// Saved slot names, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_slots(&self) -> Result<Vec<String>, StorageError>;

    /// Remove a slot. Missing slots are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot is invalid or the delete fails.
    async fn delete_slot(&self, slot: &str) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<String, SessionSnapshot>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn save_snapshot(
        &self,
        slot: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let slot = validate_slot(slot)?;
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(slot.to_string(), snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self, slot: &str) -> Result<SessionSnapshot, StorageError> {
        let slot = validate_slot(slot)?;
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(slot).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_slots(&self) -> Result<Vec<String>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut slots: Vec<String> = guard.keys().cloned().collect();
        slots.sort();
        Ok(slots)
    }

    async fn delete_slot(&self, slot: &str) -> Result<(), StorageError> {
        let slot = validate_slot(slot)?;
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(slot);
        Ok(())
    }
}

/// Session repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(InMemoryRepository::new()),
        }
    }

    #[must_use]
    pub fn from_repository(repo: Arc<dyn SessionRepository>) -> Self {
        Self { sessions: repo }
    }
}

// ─── TESTS ─────────────────────────────────────────────────────────────────────
