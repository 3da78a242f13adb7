#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod exam_service;
pub mod generator;
pub mod lesson_service;
pub mod orchestrator;
pub mod renderer;
pub mod session_store;

pub use quiz_core::Clock;

pub use app_services::{AppOptions, AppServices};
pub use error::{
    AppServicesError, ExamServiceError, GeneratorError, LessonServiceError, LlmConfigError,
    RenderError, SessionStoreError, TurnError,
};
pub use exam_service::ExamService;
pub use generator::{LlmConfig, LlmQuestionGenerator, QuestionGenerator, QuestionRequest};
pub use lesson_service::{LessonAnswer, LessonService, LessonStart, LessonSummary};
pub use orchestrator::{PendingTurn, SessionOrchestrator, TurnPhase, TurnResult};
pub use renderer::{AssetRef, AssetRenderer, AssetRequest, StaticAssetRenderer};
pub use session_store::SessionStore;
