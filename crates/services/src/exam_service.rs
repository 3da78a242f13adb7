use std::sync::Arc;

use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::info;

use quiz_core::catalog;
use quiz_core::exam::{ExamError, ExamReport, ExamRules, ExamSession};
use quiz_core::model::{Question, QuestionId, SituationalPolicy};
use quiz_core::progression::MIN_STAGE;
use quiz_core::scoring::ScoreRules;

use crate::Clock;
use crate::error::ExamServiceError;
use crate::generator::{QuestionGenerator, QuestionRequest};
use crate::orchestrator::produce_question;

/// Runs timed mock exams. Exams never touch the game session.
pub struct ExamService {
    clock: Clock,
    rules: ExamRules,
    score_rules: ScoreRules,
    policy: SituationalPolicy,
    generator: Arc<dyn QuestionGenerator>,
    rng: Mutex<StdRng>,
}

impl ExamService {
    #[must_use]
    pub fn new(rules: ExamRules, generator: Arc<dyn QuestionGenerator>, rng: StdRng) -> Self {
        Self {
            clock: Clock::default(),
            rules,
            score_rules: ScoreRules::default(),
            policy: SituationalPolicy::default(),
            generator,
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_score_rules(mut self, score_rules: ScoreRules) -> Self {
        self.score_rules = score_rules;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SituationalPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn rules(&self) -> &ExamRules {
        &self.rules
    }

    /// Build a fresh roadmap and start the timer.
    pub async fn start(&self) -> ExamSession {
        let roadmap = self.rules.build_roadmap(&mut *self.rng.lock().await);
        info!(questions = roadmap.len(), "exam started");
        ExamSession::start(self.rules, roadmap, &self.clock)
    }

    /// Question at the current position, generated on first access.
    ///
    /// Returns `Ok(None)` once every position has been answered.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Expired` after the deadline, or a question error if
    /// the generated item conflicts with the situational policy.
    pub async fn current_question<'a>(
        &self,
        session: &'a mut ExamSession,
    ) -> Result<Option<&'a Question>, ExamServiceError> {
        if session.is_expired(&self.clock) {
            return Err(ExamError::Expired.into());
        }
        if let Some(subject) = session.pending_subject().cloned() {
            let index = session.current_index();
            let tutor = catalog::tutor_for_subject(subject.base());
            let request = QuestionRequest::new(subject, tutor, MIN_STAGE);
            let fallback_id = QuestionId::new(format!("exam-{}", index + 1));
            let question =
                produce_question(self.generator.as_ref(), request, self.policy, fallback_id)
                    .await?;
            session.push_question(index, question)?;
        }
        Ok(session.current_question())
    }

    /// # Errors
    ///
    /// Returns `ExamError` if the exam expired, is finished, or the current
    /// question was never fetched.
    pub fn submit(
        &self,
        session: &mut ExamSession,
        choice: Option<&str>,
    ) -> Result<(), ExamServiceError> {
        session.submit_answer(choice, &self.clock)?;
        Ok(())
    }

    #[must_use]
    pub fn finish(&self, session: &ExamSession) -> ExamReport {
        let report = session.calculate_result(&self.score_rules);
        info!(score = report.score, passed = report.passed, "exam finished");
        report
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rand::SeedableRng;

    use quiz_core::model::QuestionDraft;
    use quiz_core::time::fixed_clock;

    use super::*;
    use crate::error::GeneratorError;

    struct Offline;

    #[async_trait::async_trait]
    impl QuestionGenerator for Offline {
        async fn generate(&self, _: &QuestionRequest) -> Result<QuestionDraft, GeneratorError> {
            Err(GeneratorError::Disabled)
        }
    }

    fn service(clock: Clock) -> ExamService {
        let rules = ExamRules::new(2, 1, 1, Duration::minutes(5), 1.0).unwrap();
        ExamService::new(rules, Arc::new(Offline), StdRng::seed_from_u64(3)).with_clock(clock)
    }

    #[tokio::test]
    async fn offline_exam_uses_fallbacks_and_scores() {
        let svc = service(fixed_clock());
        let mut session = svc.start().await;
        assert_eq!(session.len(), 4);

        let mut answered = 0;
        while let Some(question) = svc.current_question(&mut session).await.unwrap() {
            assert!(question.is_fallback());
            let choice = if answered < 2 { Some("A") } else { None };
            svc.submit(&mut session, choice).unwrap();
            answered += 1;
        }
        assert_eq!(answered, 4);

        let report = svc.finish(&session);
        assert_eq!(report.correct, 2);
        assert_eq!(report.omitted, 2);
        assert!(report.passed);
    }

    #[tokio::test]
    async fn expired_exam_rejects_questions() {
        let mut clock = fixed_clock();
        let svc = service(clock);
        let mut session = svc.start().await;

        clock.advance(Duration::minutes(6));
        let svc = svc.with_clock(clock);
        let err = svc.current_question(&mut session).await.unwrap_err();
        assert!(matches!(err, ExamServiceError::Exam(ExamError::Expired)));
    }
}
