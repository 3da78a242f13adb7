use thiserror::Error;

use crate::exam::ExamError;
use crate::lesson::LessonError;
use crate::model::QuestionError;
use crate::progression::StageError;
use crate::sampler::SamplerError;
use crate::scoring::ScoreConfigError;

/// Invalid engine configuration, as opposed to bad runtime input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error(transparent)]
    Score(#[from] ScoreConfigError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Question(#[from] QuestionError),
}
