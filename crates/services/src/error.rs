//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::ConfigError;
use quiz_core::exam::ExamError;
use quiz_core::lesson::LessonError;
use quiz_core::model::QuestionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by a `QuestionGenerator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GeneratorError {
    #[error("question generation is not configured")]
    Disabled,
    #[error("generator does not support {0}")]
    Unsupported(&'static str),
    #[error("generator returned an empty response")]
    EmptyResponse,
    #[error("generator request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("generator returned malformed JSON: {0}")]
    Malformed(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by an `AssetRenderer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    #[error("no asset for {tutor} at stage {stage}")]
    Missing { tutor: String, stage: u8 },
    #[error("asset backend failed: {0}")]
    Backend(String),
}

/// Errors emitted while loading external configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LlmConfigError {
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("model name cannot be empty")]
    EmptyModel,
}

/// Errors emitted by the turn orchestrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TurnError {
    /// Every subject is mastered; nothing left to sample.
    #[error("course complete: no subjects left to study")]
    CourseComplete,
    /// The generated question conflicts with the configured policy.
    #[error(transparent)]
    Config(#[from] QuestionError),
}

/// Errors emitted by `ExamService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamServiceError {
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// Errors emitted by `LessonService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonServiceError {
    #[error("course complete: no subjects left to study")]
    CourseComplete,
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Turn(#[from] TurnError),
}

/// Errors emitted by `SessionStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionStoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Session(#[from] SessionStoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Llm(#[from] LlmConfigError),
}
