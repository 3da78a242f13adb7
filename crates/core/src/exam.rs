use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use thiserror::Error;

use crate::catalog::{KNOWLEDGE_POOL, REASONING_POOL, SITUATIONAL};
use crate::model::{Outcome, Question, Subject};
use crate::scoring::ScoreRules;
use crate::time::Clock;

/// Top of the nominal exam scale.
pub const NOMINAL_MAX_SCORE: f64 = 30.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam must contain at least one question")]
    NoQuestions,

    #[error("exam duration must be positive")]
    InvalidDuration,

    #[error("pass mark must be within 0..={max}, got {value}")]
    InvalidPassMark { value: f64, max: f64 },

    #[error("exam time is over")]
    Expired,

    #[error("all exam questions have been answered")]
    Finished,

    #[error("question {index} has not been generated yet")]
    QuestionNotReady { index: usize },

    #[error("expected question for position {expected}, got {got}")]
    OutOfOrder { expected: usize, got: usize },
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Composition, timing and pass mark of a mock exam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExamRules {
    knowledge: usize,
    reasoning: usize,
    situational: usize,
    duration: Duration,
    pass_mark: f64,
}

impl ExamRules {
    /// # Errors
    ///
    /// Returns `ExamError` for an empty exam, a non-positive duration or a pass
    /// mark outside the nominal scale.
    pub fn new(
        knowledge: usize,
        reasoning: usize,
        situational: usize,
        duration: Duration,
        pass_mark: f64,
    ) -> Result<Self, ExamError> {
        if knowledge + reasoning + situational == 0 {
            return Err(ExamError::NoQuestions);
        }
        if duration <= Duration::zero() {
            return Err(ExamError::InvalidDuration);
        }
        if !pass_mark.is_finite() || !(0.0..=NOMINAL_MAX_SCORE).contains(&pass_mark) {
            return Err(ExamError::InvalidPassMark {
                value: pass_mark,
                max: NOMINAL_MAX_SCORE,
            });
        }
        Ok(Self {
            knowledge,
            reasoning,
            situational,
            duration,
            pass_mark,
        })
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.knowledge + self.reasoning + self.situational
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn pass_mark(&self) -> f64 {
        self.pass_mark
    }

    /// Draw the ordered subject list for one exam.
    ///
    /// Knowledge and reasoning items are shuffled together; situational items
    /// always close the exam.
    pub fn build_roadmap<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Subject> {
        let mut head: Vec<&str> = Vec::with_capacity(self.knowledge + self.reasoning);
        for _ in 0..self.knowledge {
            if let Some(s) = KNOWLEDGE_POOL.choose(rng) {
                head.push(*s);
            }
        }
        for _ in 0..self.reasoning {
            if let Some(s) = REASONING_POOL.choose(rng) {
                head.push(*s);
            }
        }
        head.shuffle(rng);

        head.into_iter()
            .chain(std::iter::repeat_n(SITUATIONAL, self.situational))
            .filter_map(|s| Subject::new(s).ok())
            .collect()
    }
}

impl Default for ExamRules {
    /// 25 knowledge, 7 reasoning, 8 situational; 60 minutes; pass at 21/30.
    fn default() -> Self {
        Self {
            knowledge: 25,
            reasoning: 7,
            situational: 8,
            duration: Duration::minutes(60),
            pass_mark: 21.0,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One mock exam in progress.
///
/// Questions are generated lazily, one position at a time. The deadline is
/// checked whenever the session is read through a `Clock`.
#[derive(Debug, Clone)]
pub struct ExamSession {
    rules: ExamRules,
    roadmap: Vec<Subject>,
    questions: Vec<Question>,
    answers: BTreeMap<usize, String>,
    current_index: usize,
    started_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
}

impl ExamSession {
    #[must_use]
    pub fn start(rules: ExamRules, roadmap: Vec<Subject>, clock: &Clock) -> Self {
        let started_at = clock.now();
        Self {
            rules,
            roadmap,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            current_index: 0,
            started_at,
            deadline: started_at + rules.duration,
        }
    }

    #[must_use]
    pub fn rules(&self) -> &ExamRules {
        &self.rules
    }

    #[must_use]
    pub fn roadmap(&self) -> &[Subject] {
        &self.roadmap
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.roadmap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roadmap.is_empty()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    #[must_use]
    pub fn is_expired(&self, clock: &Clock) -> bool {
        clock.has_passed(self.deadline)
    }

    #[must_use]
    pub fn remaining(&self, clock: &Clock) -> Duration {
        clock.remaining_until(self.deadline)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_index >= self.roadmap.len()
    }

    #[must_use]
    pub fn is_over(&self, clock: &Clock) -> bool {
        self.is_complete() || self.is_expired(clock)
    }

    /// Subject at the current position if its question still has to be
    /// generated.
    #[must_use]
    pub fn pending_subject(&self) -> Option<&Subject> {
        if self.questions.len() > self.current_index {
            return None;
        }
        self.roadmap.get(self.current_index)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Store the generated question for `index`.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::OutOfOrder` unless `index` is the next position
    /// without a question, or `ExamError::Finished` past the roadmap.
    pub fn push_question(&mut self, index: usize, question: Question) -> Result<(), ExamError> {
        if index >= self.roadmap.len() {
            return Err(ExamError::Finished);
        }
        if index != self.questions.len() {
            return Err(ExamError::OutOfOrder {
                expected: self.questions.len(),
                got: index,
            });
        }
        self.questions.push(question);
        Ok(())
    }

    /// Record the answer for the current position and move on.
    ///
    /// A blank or missing choice leaves the position omitted.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::Expired` after the deadline, `ExamError::Finished`
    /// past the last position, or `ExamError::QuestionNotReady` if the current
    /// question was never generated.
    pub fn submit_answer(&mut self, choice: Option<&str>, clock: &Clock) -> Result<(), ExamError> {
        if self.is_expired(clock) {
            return Err(ExamError::Expired);
        }
        if self.is_complete() {
            return Err(ExamError::Finished);
        }
        if self.current_question().is_none() {
            return Err(ExamError::QuestionNotReady {
                index: self.current_index,
            });
        }
        if let Some(choice) = choice.map(str::trim).filter(|c| !c.is_empty()) {
            self.answers.insert(self.current_index, choice.to_string());
        }
        self.current_index += 1;
        Ok(())
    }

    /// Score every roadmap position; positions never reached count as omitted.
    #[must_use]
    pub fn calculate_result(&self, rules: &ScoreRules) -> ExamReport {
        let mut total = 0.0;
        let mut report = ExamReport {
            score: 0.0,
            passed: false,
            pass_mark: self.rules.pass_mark,
            correct: 0,
            partial: 0,
            wrong: 0,
            omitted: 0,
        };

        for index in 0..self.roadmap.len() {
            let outcome = match self.questions.get(index) {
                Some(question) => {
                    let result =
                        question.score(rules, self.answers.get(&index).map(String::as_str));
                    total += result.delta;
                    result.outcome
                }
                None => Outcome::Omitted,
            };
            match outcome {
                Outcome::Correct => report.correct += 1,
                Outcome::Partial => report.partial += 1,
                Outcome::Wrong => report.wrong += 1,
                Outcome::Omitted => report.omitted += 1,
            }
        }

        report.score = total.max(0.0);
        report.passed = report.score >= self.rules.pass_mark;
        report
    }
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExamReport {
    pub score: f64,
    pub passed: bool,
    pub pass_mark: f64,
    pub correct: usize,
    pub partial: usize,
    pub wrong: usize,
    pub omitted: usize,
}

impl ExamReport {
    #[must_use]
    pub fn score_bar(&self) -> ScoreBar {
        score_bar(self.score, self.pass_mark)
    }
}

impl fmt::Display for ExamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Score: {:.2}/30", self.score)?;
        writeln!(
            f,
            "Result: {}",
            if self.passed { "PASSED" } else { "NOT PASSED" }
        )?;
        write!(
            f,
            "({} correct / {} partial / {} wrong / {} omitted)",
            self.correct, self.partial, self.wrong, self.omitted
        )
    }
}

/// Positions on a `0..=1` bar for the score and the pass line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBar {
    pub progress: f64,
    pub pass_line: f64,
}

#[must_use]
pub fn score_bar(score: f64, pass_mark: f64) -> ScoreBar {
    let score = score.clamp(0.0, NOMINAL_MAX_SCORE);
    ScoreBar {
        progress: score / NOMINAL_MAX_SCORE,
        pass_line: pass_mark.clamp(0.0, NOMINAL_MAX_SCORE) / NOMINAL_MAX_SCORE,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::model::Tutor;
    use crate::time::{fixed_clock, fixed_now};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn placeholder(subject: &Subject) -> Question {
        // fallback questions are keyed to A
        Question::fallback(subject.clone(), Tutor::Maria, "test")
    }

    fn filled_session(clock: &Clock) -> ExamSession {
        let rules = ExamRules::default();
        let roadmap = rules.build_roadmap(&mut StdRng::seed_from_u64(5));
        let mut session = ExamSession::start(rules, roadmap, clock);
        for i in 0..session.len() {
            let q = placeholder(&session.roadmap()[i]);
            session.push_question(i, q).unwrap();
        }
        session
    }

    fn answer(session: &mut ExamSession, clock: &Clock, correct: usize, wrong: usize) {
        for _ in 0..correct {
            session.submit_answer(Some("A"), clock).unwrap();
        }
        for _ in 0..wrong {
            session.submit_answer(Some("B"), clock).unwrap();
        }
    }

    #[test]
    fn roadmap_has_fixed_composition() {
        let rules = ExamRules::default();
        let roadmap = rules.build_roadmap(&mut StdRng::seed_from_u64(1));
        assert_eq!(roadmap.len(), 40);

        let (head, tail) = roadmap.split_at(32);
        assert!(tail.iter().all(|s| s.base() == catalog::SITUATIONAL));
        assert!(head.iter().all(|s| s.base() != catalog::SITUATIONAL));
        let reasoning = head
            .iter()
            .filter(|s| catalog::REASONING_POOL.contains(&s.base()))
            .count();
        assert_eq!(reasoning, 7);
    }

    #[test]
    fn ten_correct_two_wrong_is_seven_and_not_passed() {
        let clock = fixed_clock();
        let mut session = filled_session(&clock);
        answer(&mut session, &clock, 10, 2);

        let report = session.calculate_result(&ScoreRules::default());
        assert!((report.score - 7.0).abs() < 1e-9);
        assert!(!report.passed);
        assert_eq!(report.correct, 10);
        assert_eq!(report.wrong, 2);
        assert_eq!(report.omitted, 28);
        assert!(report.to_string().contains("Score: 7.00/30"));
        assert!(report.to_string().contains("NOT PASSED"));
    }

    #[test]
    fn twenty_eight_correct_passes() {
        let clock = fixed_clock();
        let mut session = filled_session(&clock);
        answer(&mut session, &clock, 28, 0);
        let report = session.calculate_result(&ScoreRules::default());
        assert!((report.score - 21.0).abs() < 1e-9);
        assert!(report.passed);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let clock = fixed_clock();
        let mut session = filled_session(&clock);
        answer(&mut session, &clock, 0, 10);
        let report = session.calculate_result(&ScoreRules::default());
        assert_eq!(report.score, 0.0);
        assert_eq!(report.wrong, 10);
    }

    #[test]
    fn score_is_monotone_in_correct_count() {
        let clock = fixed_clock();
        let rules = ScoreRules::default();
        let mut previous = f64::MIN;
        for correct in 0..=35 {
            let mut session = filled_session(&clock);
            answer(&mut session, &clock, correct, 5);
            let score = session.calculate_result(&rules).score;
            assert!(score >= previous, "{correct}: {score} < {previous}");
            previous = score;
        }
    }

    #[test]
    fn ungenerated_positions_count_as_omitted() {
        let clock = fixed_clock();
        let rules = ExamRules::default();
        let roadmap = rules.build_roadmap(&mut StdRng::seed_from_u64(2));
        let session = ExamSession::start(rules, roadmap, &clock);
        let report = session.calculate_result(&ScoreRules::default());
        assert_eq!(report.omitted, 40);
        assert_eq!(report.score, 0.0);
    }

    #[test]
    fn submit_after_deadline_is_rejected() {
        let mut clock = fixed_clock();
        let mut session = filled_session(&clock);
        assert_eq!(session.remaining(&clock), Duration::minutes(60));

        clock.advance(Duration::minutes(60));
        assert!(session.is_expired(&clock));
        assert_eq!(
            session.submit_answer(Some("A"), &clock),
            Err(ExamError::Expired)
        );
        assert_eq!(session.deadline(), fixed_now() + Duration::minutes(60));
    }

    #[test]
    fn questions_must_arrive_in_order() {
        let clock = fixed_clock();
        let rules = ExamRules::default();
        let roadmap = rules.build_roadmap(&mut StdRng::seed_from_u64(3));
        let mut session = ExamSession::start(rules, roadmap, &clock);

        assert_eq!(
            session.submit_answer(Some("A"), &clock),
            Err(ExamError::QuestionNotReady { index: 0 })
        );
        let subject = session.pending_subject().cloned().unwrap();
        assert_eq!(
            session.push_question(1, placeholder(&subject)),
            Err(ExamError::OutOfOrder {
                expected: 0,
                got: 1
            })
        );
        session.push_question(0, placeholder(&subject)).unwrap();
        assert!(session.pending_subject().is_none());

        session.submit_answer(None, &clock).unwrap();
        assert!(session.answers().is_empty());
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn finished_exam_rejects_more_answers() {
        let clock = fixed_clock();
        let rules = ExamRules::new(1, 0, 0, Duration::minutes(1), 0.5).unwrap();
        let roadmap = rules.build_roadmap(&mut StdRng::seed_from_u64(4));
        let mut session = ExamSession::start(rules, roadmap, &clock);
        let subject = session.pending_subject().cloned().unwrap();
        session.push_question(0, placeholder(&subject)).unwrap();
        session.submit_answer(Some("a"), &clock).unwrap();

        assert!(session.is_over(&clock));
        assert_eq!(
            session.submit_answer(Some("A"), &clock),
            Err(ExamError::Finished)
        );
        assert!(session.calculate_result(&ScoreRules::default()).passed);
    }

    #[test]
    fn rules_are_validated() {
        assert_eq!(
            ExamRules::new(0, 0, 0, Duration::minutes(1), 21.0),
            Err(ExamError::NoQuestions)
        );
        assert_eq!(
            ExamRules::new(1, 0, 0, Duration::zero(), 21.0),
            Err(ExamError::InvalidDuration)
        );
        assert!(matches!(
            ExamRules::new(1, 0, 0, Duration::minutes(1), 31.0),
            Err(ExamError::InvalidPassMark { .. })
        ));
    }

    #[test]
    fn score_bar_places_pass_line() {
        let bar = score_bar(15.0, 21.0);
        assert!((bar.progress - 0.5).abs() < 1e-9);
        assert!((bar.pass_line - 0.7).abs() < 1e-9);
        assert_eq!(score_bar(-3.0, 21.0).progress, 0.0);
        assert_eq!(score_bar(45.0, 21.0).progress, 1.0);
    }
}
