use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use quiz_core::catalog;
use quiz_core::lesson::LessonReport;
use quiz_core::model::{
    ChoiceLetter, DraftContext, Outcome, Question, QuestionError, QuestionId, ScoreResult,
    SessionSnapshot, SessionState, SituationalPolicy, Subject, TurnCommit, Tutor,
};
use quiz_core::progression::{StageProgression, StageUpdate};
use quiz_core::sampler::SubjectSampler;
use quiz_core::scoring::ScoreRules;

use crate::error::TurnError;
use crate::generator::{QuestionGenerator, QuestionRequest};
use crate::renderer::{AssetRef, AssetRenderer, AssetRequest};

/// Default number of correct lesson answers that retires a subject.
pub const DEFAULT_MASTERY_THRESHOLD: u32 = 8;

//
// ─── TURN ──────────────────────────────────────────────────────────────────────
//

/// Where the most recent turn stands.
///
/// `Idle → AwaitingQuestion → AwaitingAnswer → Scoring → Done`. A turn that
/// fails before its question is ready returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingQuestion,
    AwaitingAnswer,
    Scoring,
    Done,
}

/// A question handed to the learner and waiting for an answer.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    question: Question,
    stage: u8,
}

impl PendingTurn {
    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        self.question.subject()
    }

    #[must_use]
    pub fn tutor(&self) -> Tutor {
        self.question.tutor()
    }

    /// Tutor stage when the question was requested.
    #[must_use]
    pub fn stage(&self) -> u8 {
        self.stage
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.question.is_fallback()
    }
}

/// Everything the presentation layer needs after a scored turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    pub tutor: Tutor,
    pub subject: Subject,
    pub outcome: Outcome,
    pub delta: f64,
    pub new_score: f64,
    pub new_points: u32,
    pub new_stage: u8,
    pub is_punish: bool,
    pub fallback: bool,
    pub answer: Option<ChoiceLetter>,
    pub explanation: String,
    pub asset: Option<AssetRef>,
}

//
// ─── ORCHESTRATOR ──────────────────────────────────────────────────────────────
//

/// Runs game turns against one shared `SessionState`.
///
/// State is only written while scoring, inside a single lock. Generation and
/// rendering run without holding it.
pub struct SessionOrchestrator {
    state: Mutex<SessionState>,
    sampler: Mutex<SubjectSampler<StdRng>>,
    generator: Arc<dyn QuestionGenerator>,
    renderer: Option<Arc<dyn AssetRenderer>>,
    rules: ScoreRules,
    progression: StageProgression,
    policy: SituationalPolicy,
    mastery_threshold: u32,
    sequence: AtomicU64,
    phase: watch::Sender<TurnPhase>,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(
        state: SessionState,
        sampler: SubjectSampler<StdRng>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            sampler: Mutex::new(sampler),
            generator,
            renderer: None,
            rules: ScoreRules::default(),
            progression: StageProgression::default(),
            policy: SituationalPolicy::default(),
            mastery_threshold: DEFAULT_MASTERY_THRESHOLD,
            sequence: AtomicU64::new(0),
            phase: watch::channel(TurnPhase::Idle).0,
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn AssetRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: ScoreRules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_progression(mut self, progression: StageProgression) -> Self {
        self.progression = progression;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SituationalPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_mastery_threshold(mut self, threshold: u32) -> Self {
        self.mastery_threshold = threshold;
        self
    }

    #[must_use]
    pub fn rules(&self) -> &ScoreRules {
        &self.rules
    }

    #[must_use]
    pub fn mastery_threshold(&self) -> u32 {
        self.mastery_threshold
    }

    #[must_use]
    pub fn generator(&self) -> Arc<dyn QuestionGenerator> {
        Arc::clone(&self.generator)
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        *self.phase.borrow()
    }

    /// Follow phase changes as they happen.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<TurnPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: TurnPhase) {
        let previous = self.phase.send_replace(phase);
        debug!(from = ?previous, to = ?phase, "turn phase");
    }

    /// Copy of the current state.
    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.to_snapshot()
    }

    /// Draw the next subject, skipping mastered ones and avoiding recent ones.
    ///
    /// # Errors
    ///
    /// Returns `TurnError::CourseComplete` when every subject is mastered.
    pub async fn sample_subject(&self) -> Result<Subject, TurnError> {
        let (recent, mastered) = {
            let state = self.state.lock().await;
            (
                state.recent_subjects().to_vec(),
                state.mastered_subjects(self.mastery_threshold),
            )
        };
        let pick = self
            .sampler
            .lock()
            .await
            .pick_detailed(&recent, &mastered)
            .ok_or(TurnError::CourseComplete)?;
        debug!(
            subject = %pick.subject,
            attempts = pick.attempts,
            repeated = pick.repeated,
            "subject sampled"
        );
        Ok(pick.subject)
    }

    /// Sample a subject and fetch its question.
    ///
    /// # Errors
    ///
    /// Returns `TurnError::CourseComplete` when nothing is left to study, or
    /// `TurnError::Config` when the question conflicts with the situational
    /// policy.
    pub async fn begin_turn(&self) -> Result<PendingTurn, TurnError> {
        let subject = match self.sample_subject().await {
            Ok(subject) => subject,
            Err(err) => {
                self.set_phase(TurnPhase::Idle);
                return Err(err);
            }
        };
        let tutor = catalog::tutor_for_subject(subject.base());
        let stage = self.state.lock().await.progress_for(tutor).stage;
        self.prepare_question(subject, stage).await
    }

    /// Fetch a question on a given subject without sampling.
    ///
    /// # Errors
    ///
    /// Returns `TurnError::Config` when the question conflicts with the
    /// situational policy.
    pub async fn prepare_question(
        &self,
        subject: Subject,
        stage: u8,
    ) -> Result<PendingTurn, TurnError> {
        self.set_phase(TurnPhase::AwaitingQuestion);
        let tutor = catalog::tutor_for_subject(subject.base());
        let last_outcome = self.state.lock().await.last_outcome();
        let request = QuestionRequest::new(subject, tutor, stage).with_last_outcome(last_outcome);

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let fallback_id = QuestionId::new(format!("{}-{seq}", request.subject.base()));
        let produced =
            produce_question(self.generator.as_ref(), request, self.policy, fallback_id).await;
        let question = match produced {
            Ok(question) => question,
            Err(err) => {
                self.set_phase(TurnPhase::Idle);
                return Err(err.into());
            }
        };

        self.set_phase(TurnPhase::AwaitingAnswer);
        Ok(PendingTurn { question, stage })
    }

    /// Score a question without touching the session.
    #[must_use]
    pub fn score(&self, turn: &PendingTurn, choice: Option<&str>) -> ScoreResult {
        turn.question.score(&self.rules, choice)
    }

    /// Score the answer and commit score, progress and history together.
    ///
    /// `None` or a blank choice counts as omitted.
    pub async fn submit_answer(&self, turn: PendingTurn, choice: Option<&str>) -> TurnResult {
        self.set_phase(TurnPhase::Scoring);
        let tutor = turn.tutor();
        let score = self.score(&turn, choice);

        let (update, new_score) = {
            let mut state = self.state.lock().await;
            let update = self
                .progression
                .apply(tutor, state.progress_for(tutor), score.outcome);
            state.commit(&TurnCommit {
                score,
                stage: update,
            });
            state.push_recent_subject(turn.subject());
            (update, state.score())
        };

        if update.stage_changed() {
            info!(
                tutor = %tutor,
                from = update.old.stage,
                to = update.new.stage,
                "tutor stage changed"
            );
        }

        let asset = self.render(&turn, &update).await;
        self.set_phase(TurnPhase::Done);

        TurnResult {
            tutor,
            subject: turn.subject().clone(),
            outcome: score.outcome,
            delta: score.delta,
            new_score,
            new_points: update.new_points(),
            new_stage: update.new_stage(),
            is_punish: update.is_punish,
            fallback: turn.is_fallback(),
            answer: turn.question.best_letter(),
            explanation: turn.question.explanation().to_string(),
            asset,
        }
    }

    /// Register a finished lesson block, promoting the tutor on mastery.
    pub async fn complete_lesson(&self, report: &LessonReport) -> Option<StageUpdate> {
        let mut state = self.state.lock().await;
        state.record_lesson(report.lesson.clone());
        if !report.mastered {
            return None;
        }
        let tutor = report.lesson.tutor;
        let update = self.progression.promote(tutor, state.progress_for(tutor));
        state.apply_stage_update(&update);
        info!(
            tutor = %tutor,
            subject = %report.lesson.subject,
            stage = update.new_stage(),
            "lesson mastered"
        );
        Some(update)
    }

    async fn render(&self, turn: &PendingTurn, update: &StageUpdate) -> Option<AssetRef> {
        let renderer = self.renderer.as_ref()?;
        let request = AssetRequest {
            tutor: update.tutor,
            stage: update.new_stage(),
            is_punish: update.is_punish,
            tags: turn.question.tags().to_vec(),
            visual: turn.question.visual().map(str::to_string),
        };
        match renderer.render(&request).await {
            Ok(asset) => Some(asset),
            Err(err) => {
                warn!(
                    tutor = %request.tutor,
                    stage = request.stage,
                    error = %err,
                    "asset render failed"
                );
                None
            }
        }
    }
}

/// Ask the generator for a question, degrading to the fallback question on
/// any generator or validation failure.
///
/// Only a policy conflict is returned as an error.
pub(crate) async fn produce_question(
    generator: &dyn QuestionGenerator,
    request: QuestionRequest,
    policy: SituationalPolicy,
    fallback_id: QuestionId,
) -> Result<Question, QuestionError> {
    let draft = match generator.generate(&request).await {
        Ok(draft) => draft,
        Err(err) => {
            warn!(subject = %request.subject, error = %err, "question generation failed");
            return Ok(Question::fallback(
                request.subject,
                request.tutor,
                err.to_string(),
            ));
        }
    };

    let ctx = DraftContext {
        subject: request.subject.clone(),
        tutor: request.tutor,
        fallback_id,
        expect_situational: request.situational,
        policy,
    };
    match draft.validate(ctx) {
        Ok(question) => {
            if question.answer_defaulted() {
                warn!(subject = %request.subject, "answer key missing, defaulted");
            }
            Ok(question)
        }
        Err(err) if err.is_config_error() => Err(err),
        Err(err) => {
            warn!(subject = %request.subject, error = %err, "generated question rejected");
            Ok(Question::fallback(
                request.subject,
                request.tutor,
                err.to_string(),
            ))
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
