mod ids;
mod outcome;
mod question;
mod session;
mod subject;

pub use ids::{ParseIdError, QuestionId, Tutor};
pub use outcome::{Outcome, OutcomeError, ScoreResult};
pub use question::{
    ChoiceLetter, DraftContext, Efficacy, MAX_DIFFICULTY, MAX_OPTIONS, MIN_DIFFICULTY,
    MIN_OPTIONS, Question, QuestionDraft, QuestionError, QuestionKind, SituationalPolicy,
};
pub use session::{
    CompletedLesson, HistoryEntry, HistoryRecord, LessonRecord, RECENT_SUBJECTS_MAX,
    SessionSnapshot, SessionState, TurnCommit,
};
pub use subject::{Subject, SubjectError, TOPIC_SEPARATOR, base_subject};
