use thiserror::Error;

use crate::model::{CompletedLesson, Outcome, Subject, Tutor};
use crate::progression::{MAX_STAGE, clamp_stage};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("a lesson quiz needs at least one question")]
    EmptyQuiz,

    #[error("mastery threshold {threshold} exceeds quiz length {quiz_len}")]
    ThresholdTooHigh { threshold: u32, quiz_len: u32 },

    #[error("cannot {action} while the lesson is {phase}")]
    WrongPhase {
        action: &'static str,
        phase: &'static str,
    },
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonRules {
    quiz_len: u32,
    mastery_threshold: u32,
}

impl LessonRules {
    /// # Errors
    ///
    /// Returns `LessonError` if the quiz is empty or the threshold cannot be
    /// reached.
    pub fn new(quiz_len: u32, mastery_threshold: u32) -> Result<Self, LessonError> {
        if quiz_len == 0 {
            return Err(LessonError::EmptyQuiz);
        }
        if mastery_threshold > quiz_len {
            return Err(LessonError::ThresholdTooHigh {
                threshold: mastery_threshold,
                quiz_len,
            });
        }
        Ok(Self {
            quiz_len,
            mastery_threshold,
        })
    }

    #[must_use]
    pub fn quiz_len(&self) -> u32 {
        self.quiz_len
    }

    #[must_use]
    pub fn mastery_threshold(&self) -> u32 {
        self.mastery_threshold
    }
}

impl Default for LessonRules {
    fn default() -> Self {
        Self {
            quiz_len: 10,
            mastery_threshold: 8,
        }
    }
}

//
// ─── BLOCK ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonPhase {
    Teaching,
    Quizzing { answered: u32 },
    Reporting,
}

impl LessonPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonPhase::Teaching => "teaching",
            LessonPhase::Quizzing { .. } => "quizzing",
            LessonPhase::Reporting => "reporting",
        }
    }
}

/// One teach-then-quiz block on a single subject.
///
/// The block never touches persistent progress; `finish` hands back a report
/// and the caller decides whether to promote the tutor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonBlock {
    rules: LessonRules,
    subject: Subject,
    tutor: Tutor,
    base_stage: u8,
    phase: LessonPhase,
    quiz_score: u32,
}

impl LessonBlock {
    #[must_use]
    pub fn new(rules: LessonRules, subject: Subject, tutor: Tutor, base_stage: u8) -> Self {
        Self {
            rules,
            subject,
            tutor,
            base_stage: clamp_stage(base_stage),
            phase: LessonPhase::Teaching,
            quiz_score: 0,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn tutor(&self) -> Tutor {
        self.tutor
    }

    #[must_use]
    pub fn phase(&self) -> LessonPhase {
        self.phase
    }

    #[must_use]
    pub fn quiz_score(&self) -> u32 {
        self.quiz_score
    }

    #[must_use]
    pub fn rules(&self) -> &LessonRules {
        &self.rules
    }

    /// 1-based number of the next quiz question, if quizzing.
    #[must_use]
    pub fn question_number(&self) -> Option<u32> {
        match self.phase {
            LessonPhase::Quizzing { answered } => Some(answered + 1),
            _ => None,
        }
    }

    /// Stage shown during this block: one extra level per two correct answers.
    #[must_use]
    pub fn bonus_stage(&self) -> u8 {
        let bonus = u8::try_from(self.quiz_score / 2).unwrap_or(MAX_STAGE);
        self.base_stage.saturating_add(bonus).min(MAX_STAGE)
    }

    /// # Errors
    ///
    /// Returns `LessonError::WrongPhase` unless the block is teaching.
    pub fn start_quiz(&mut self) -> Result<(), LessonError> {
        match self.phase {
            LessonPhase::Teaching => {
                self.phase = LessonPhase::Quizzing { answered: 0 };
                Ok(())
            }
            other => Err(LessonError::WrongPhase {
                action: "start the quiz",
                phase: other.as_str(),
            }),
        }
    }

    /// Count one scored quiz answer. Only `Correct` adds to the quiz score.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::WrongPhase` unless the block is quizzing.
    pub fn record(&mut self, outcome: Outcome) -> Result<LessonPhase, LessonError> {
        let LessonPhase::Quizzing { answered } = self.phase else {
            return Err(LessonError::WrongPhase {
                action: "record an answer",
                phase: self.phase.as_str(),
            });
        };
        if outcome.is_correct() {
            self.quiz_score += 1;
        }
        let answered = answered + 1;
        self.phase = if answered >= self.rules.quiz_len {
            LessonPhase::Reporting
        } else {
            LessonPhase::Quizzing { answered }
        };
        Ok(self.phase)
    }

    /// # Errors
    ///
    /// Returns `LessonError::WrongPhase` unless the block is reporting.
    pub fn finish(&self) -> Result<LessonReport, LessonError> {
        if self.phase != LessonPhase::Reporting {
            return Err(LessonError::WrongPhase {
                action: "finish",
                phase: self.phase.as_str(),
            });
        }
        Ok(LessonReport {
            lesson: CompletedLesson {
                subject: self.subject.base().to_string(),
                tutor: self.tutor,
                score: self.quiz_score,
                out_of: self.rules.quiz_len,
            },
            mastered: self.quiz_score >= self.rules.mastery_threshold,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonReport {
    pub lesson: CompletedLesson,
    pub mastered: bool,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn block(stage: u8) -> LessonBlock {
        let subject = Subject::new("Public contracts: Sole project manager").unwrap();
        LessonBlock::new(LessonRules::default(), subject, Tutor::Maria, stage)
    }

    fn run_quiz(block: &mut LessonBlock, correct: u32) {
        block.start_quiz().unwrap();
        for i in 0..block.rules().quiz_len() {
            let outcome = if i < correct {
                Outcome::Correct
            } else {
                Outcome::Wrong
            };
            block.record(outcome).unwrap();
        }
    }

    #[test]
    fn block_walks_through_all_phases() {
        let mut b = block(1);
        assert_eq!(b.phase(), LessonPhase::Teaching);
        b.start_quiz().unwrap();
        assert_eq!(b.question_number(), Some(1));

        for _ in 0..9 {
            b.record(Outcome::Correct).unwrap();
        }
        assert_eq!(b.question_number(), Some(10));
        assert_eq!(b.record(Outcome::Omitted).unwrap(), LessonPhase::Reporting);

        let report = b.finish().unwrap();
        assert_eq!(report.lesson.subject, "Public contracts");
        assert_eq!(report.lesson.score, 9);
        assert_eq!(report.lesson.out_of, 10);
        assert!(report.mastered);
    }

    #[test]
    fn seven_of_ten_is_not_mastered() {
        let mut b = block(2);
        run_quiz(&mut b, 7);
        assert!(!b.finish().unwrap().mastered);
    }

    #[test]
    fn eight_of_ten_is_mastered() {
        let mut b = block(2);
        run_quiz(&mut b, 8);
        assert!(b.finish().unwrap().mastered);
    }

    #[test]
    fn bonus_stage_grows_every_two_correct_and_caps() {
        let mut b = block(2);
        b.start_quiz().unwrap();
        assert_eq!(b.bonus_stage(), 2);
        b.record(Outcome::Correct).unwrap();
        assert_eq!(b.bonus_stage(), 2);
        b.record(Outcome::Correct).unwrap();
        assert_eq!(b.bonus_stage(), 3);
        for _ in 0..8 {
            b.record(Outcome::Correct).unwrap();
        }
        assert_eq!(b.bonus_stage(), MAX_STAGE);
    }

    #[test]
    fn partial_does_not_count_toward_quiz_score() {
        let mut b = block(1);
        b.start_quiz().unwrap();
        b.record(Outcome::Partial).unwrap();
        assert_eq!(b.quiz_score(), 0);
    }

    #[test]
    fn out_of_phase_transitions_are_rejected() {
        let mut b = block(1);
        assert!(matches!(
            b.record(Outcome::Correct),
            Err(LessonError::WrongPhase {
                phase: "teaching",
                ..
            })
        ));
        assert!(b.finish().is_err());

        run_quiz(&mut b, 3);
        assert!(matches!(
            b.start_quiz(),
            Err(LessonError::WrongPhase {
                phase: "reporting",
                ..
            })
        ));
        assert!(b.record(Outcome::Correct).is_err());
    }

    #[test]
    fn rules_are_validated() {
        assert_eq!(LessonRules::new(0, 0), Err(LessonError::EmptyQuiz));
        assert_eq!(
            LessonRules::new(5, 6),
            Err(LessonError::ThresholdTooHigh {
                threshold: 6,
                quiz_len: 5
            })
        );
    }
}
