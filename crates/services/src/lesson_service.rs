use std::sync::Arc;

use tracing::{info, warn};

use quiz_core::catalog;
use quiz_core::lesson::{LessonBlock, LessonPhase, LessonReport, LessonRules};
use quiz_core::model::{Outcome, Subject, Tutor};
use quiz_core::progression::StageUpdate;

use crate::error::{LessonServiceError, TurnError};
use crate::orchestrator::{PendingTurn, SessionOrchestrator};

/// A lesson block just opened, with its teaching text.
#[derive(Debug, Clone)]
pub struct LessonStart {
    pub block: LessonBlock,
    pub teaching: String,
}

/// Result of one lesson quiz answer.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonAnswer {
    pub outcome: Outcome,
    pub phase: LessonPhase,
    pub quiz_score: u32,
    pub bonus_stage: u8,
}

/// Outcome of a closed lesson block.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonSummary {
    pub report: LessonReport,
    pub promotion: Option<StageUpdate>,
}

/// Teach-then-quiz blocks on one subject.
///
/// Quiz answers do not move points or the running score; only a mastered
/// block promotes the tutor.
#[derive(Clone)]
pub struct LessonService {
    orchestrator: Arc<SessionOrchestrator>,
    rules: LessonRules,
}

impl LessonService {
    #[must_use]
    pub fn new(orchestrator: Arc<SessionOrchestrator>, rules: LessonRules) -> Self {
        Self {
            orchestrator,
            rules,
        }
    }

    #[must_use]
    pub fn rules(&self) -> &LessonRules {
        &self.rules
    }

    /// Open a block on a subject that is not yet mastered.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::CourseComplete` when every subject is
    /// mastered.
    pub async fn start(&self) -> Result<LessonStart, LessonServiceError> {
        let subject = match self.orchestrator.sample_subject().await {
            Ok(subject) => subject,
            Err(TurnError::CourseComplete) => return Err(LessonServiceError::CourseComplete),
            Err(err) => return Err(err.into()),
        };
        Ok(self.start_on(subject).await)
    }

    /// Open a block on a chosen subject.
    pub async fn start_on(&self, subject: Subject) -> LessonStart {
        let tutor = catalog::tutor_for_subject(subject.base());
        let stage = self.orchestrator.state().await.progress_for(tutor).stage;
        let teaching = match self.orchestrator.generator().explain(&subject, tutor).await {
            Ok(text) => text,
            Err(err) => {
                warn!(subject = %subject, error = %err, "lesson text unavailable");
                default_teaching(&subject, tutor)
            }
        };
        info!(subject = %subject, tutor = %tutor, "lesson started");
        LessonStart {
            block: LessonBlock::new(self.rules, subject, tutor, stage),
            teaching,
        }
    }

    /// Next quiz question, moving the block into its quiz phase if needed.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Lesson` once the block is reporting, or a
    /// turn error for a policy conflict.
    pub async fn next_question(
        &self,
        block: &mut LessonBlock,
    ) -> Result<PendingTurn, LessonServiceError> {
        if block.phase() == LessonPhase::Teaching {
            block.start_quiz()?;
        }
        if block.question_number().is_none() {
            return Err(quiz_core::lesson::LessonError::WrongPhase {
                action: "ask a question",
                phase: block.phase().as_str(),
            }
            .into());
        }
        let turn = self
            .orchestrator
            .prepare_question(block.subject().clone(), block.bonus_stage())
            .await?;
        Ok(turn)
    }

    /// # Errors
    ///
    /// Returns `LessonServiceError::Lesson` unless the block is quizzing.
    pub fn answer(
        &self,
        block: &mut LessonBlock,
        turn: &PendingTurn,
        choice: Option<&str>,
    ) -> Result<LessonAnswer, LessonServiceError> {
        let outcome = self.orchestrator.score(turn, choice).outcome;
        let phase = block.record(outcome)?;
        Ok(LessonAnswer {
            outcome,
            phase,
            quiz_score: block.quiz_score(),
            bonus_stage: block.bonus_stage(),
        })
    }

    /// Close the block, store it and promote the tutor on mastery.
    ///
    /// # Errors
    ///
    /// Returns `LessonServiceError::Lesson` unless the quiz is over.
    pub async fn finish(&self, block: &LessonBlock) -> Result<LessonSummary, LessonServiceError> {
        let report = block.finish()?;
        let promotion = self.orchestrator.complete_lesson(&report).await;
        info!(
            subject = %report.lesson.subject,
            score = report.lesson.score,
            out_of = report.lesson.out_of,
            mastered = report.mastered,
            "lesson finished"
        );
        Ok(LessonSummary { report, promotion })
    }
}

fn default_teaching(subject: &Subject, tutor: Tutor) -> String {
    format!(
        "{tutor} will quiz you on {}. Review your notes on the topic, then answer the questions.",
        subject.label()
    )
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
