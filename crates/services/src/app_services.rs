use std::path::PathBuf;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use quiz_core::ConfigError;
use quiz_core::catalog;
use quiz_core::exam::ExamRules;
use quiz_core::lesson::LessonRules;
use quiz_core::progression::{ProgressionConfig, StagePolicy, StageProgression};
use quiz_core::sampler::{SamplerConfig, SubjectSampler};
use storage::JsonFileRepository;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::exam_service::ExamService;
use crate::generator::{LlmConfig, LlmQuestionGenerator, QuestionGenerator};
use crate::lesson_service::LessonService;
use crate::orchestrator::SessionOrchestrator;
use crate::renderer::StaticAssetRenderer;
use crate::session_store::SessionStore;

/// Launch options shared by every mode.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub slot: String,
    pub seed: Option<u64>,
    pub assets: Option<PathBuf>,
    pub stage_policy: StagePolicy,
    pub clock: Clock,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            slot: "default".into(),
            seed: None,
            assets: None,
            stage_policy: StagePolicy::default(),
            clock: Clock::default(),
        }
    }
}

/// Assembles app-facing services around one saved session slot.
#[derive(Clone)]
pub struct AppServices {
    slot: String,
    store: Arc<SessionStore>,
    orchestrator: Arc<SessionOrchestrator>,
    lessons: Arc<LessonService>,
    exams: Arc<ExamService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization, loading the slot
    /// or reading the generator settings fails.
    pub async fn new_sqlite(db_url: &str, options: AppOptions) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_parts(storage, llm_generator()?, options).await
    }

    /// Build services that keep one JSON file per slot under `dir`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if loading the slot or reading the generator
    /// settings fails.
    pub async fn new_json(
        dir: impl Into<PathBuf>,
        options: AppOptions,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::from_repository(Arc::new(JsonFileRepository::new(dir)));
        Self::from_parts(storage, llm_generator()?, options).await
    }

    /// Build services from an existing storage and generator.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the saved slot cannot be loaded or the
    /// progression settings are invalid.
    pub async fn from_parts(
        storage: Storage,
        generator: Arc<dyn QuestionGenerator>,
        options: AppOptions,
    ) -> Result<Self, AppServicesError> {
        let store = Arc::new(SessionStore::new(Arc::clone(&storage.sessions)));
        let state = store.load(&options.slot).await?;

        let (sampler_rng, exam_rng) = match options.seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
        };

        let sampler = SubjectSampler::new(
            catalog::default_weights(),
            catalog::syllabus(),
            SamplerConfig::default(),
            sampler_rng,
        );
        let defaults = ProgressionConfig::default();
        let progression = ProgressionConfig::new(
            defaults.increment(),
            defaults.band().step(),
            options.stage_policy,
        )
        .map_err(ConfigError::from)?;

        let lesson_rules = LessonRules::default();
        let mut orchestrator =
            SessionOrchestrator::new(state, sampler, Arc::clone(&generator))
                .with_progression(StageProgression::new(progression))
                .with_mastery_threshold(lesson_rules.mastery_threshold());
        if let Some(root) = &options.assets {
            orchestrator = orchestrator.with_renderer(Arc::new(StaticAssetRenderer::new(root)));
        }
        let orchestrator = Arc::new(orchestrator);

        let lessons = Arc::new(LessonService::new(Arc::clone(&orchestrator), lesson_rules));
        let exams = Arc::new(
            ExamService::new(ExamRules::default(), generator, exam_rng).with_clock(options.clock),
        );

        info!(slot = %options.slot, "services ready");
        Ok(Self {
            slot: options.slot,
            store,
            orchestrator,
            lessons,
            exams,
        })
    }

    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    #[must_use]
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn orchestrator(&self) -> Arc<SessionOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    #[must_use]
    pub fn lessons(&self) -> Arc<LessonService> {
        Arc::clone(&self.lessons)
    }

    #[must_use]
    pub fn exams(&self) -> Arc<ExamService> {
        Arc::clone(&self.exams)
    }

    /// Persist the current session under this slot.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the backend write fails.
    pub async fn save(&self) -> Result<(), AppServicesError> {
        let state = self.orchestrator.state().await;
        self.store.save(&self.slot, &state).await?;
        Ok(())
    }
}

fn llm_generator() -> Result<Arc<dyn QuestionGenerator>, AppServicesError> {
    let generator = LlmQuestionGenerator::new(LlmConfig::from_env()?);
    if generator.enabled() {
        info!("question generator configured");
    } else {
        info!("QUIZ_AI_API_KEY not set, every question will be a fallback");
    }
    Ok(Arc::new(generator))
}
