use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{QuestionId, Tutor};
use crate::model::subject::Subject;

/// Smallest and largest number of options a question may carry.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 4;

/// Difficulty bounds for generated questions.
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyPrompt,

    #[error("question must have between 2 and 4 usable options, got {found}")]
    InvalidOptionCount { found: usize },

    /// Situational item without an efficacy map under the strict policy.
    ///
    /// This is a policy/configuration mismatch, not bad generator output.
    #[error("situational question for {subject} has no efficacy map")]
    MissingEfficacy { subject: String },
}

impl QuestionError {
    /// True for errors that indicate a configuration mismatch rather than
    /// malformed generator output.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, QuestionError::MissingEfficacy { .. })
    }
}

//
// ─── CHOICE LETTER ─────────────────────────────────────────────────────────────
//

/// Option label in `A..=D`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChoiceLetter(char);

impl ChoiceLetter {
    pub const A: ChoiceLetter = ChoiceLetter('A');
    pub const B: ChoiceLetter = ChoiceLetter('B');
    pub const C: ChoiceLetter = ChoiceLetter('C');
    pub const D: ChoiceLetter = ChoiceLetter('D');
    pub const ALL: [ChoiceLetter; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Build from a single character; case-insensitive.
    #[must_use]
    pub fn new(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        ('A'..='D').contains(&upper).then_some(Self(upper))
    }

    /// Lenient parse of user or generator input.
    ///
    /// Takes the first alphabetic character and uppercases it, so `"a)"`,
    /// `" B. "` and `"c"` all resolve. Returns `None` if that character is not
    /// a valid option label or the input has no letters at all.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        raw.chars()
            .find(|c| c.is_alphabetic())
            .and_then(Self::new)
    }

    #[must_use]
    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Debug for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChoiceLetter({})", self.0)
    }
}

impl fmt::Display for ChoiceLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── EFFICACY ──────────────────────────────────────────────────────────────────
//

/// How effective a situational option is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Efficacy {
    Effective,
    Neutral,
    Ineffective,
}

impl Efficacy {
    /// Lenient parse; unknown labels yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "effective" => Some(Efficacy::Effective),
            "neutral" => Some(Efficacy::Neutral),
            "ineffective" => Some(Efficacy::Ineffective),
            _ => None,
        }
    }
}

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

/// Scoring-relevant shape of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Exactly one correct letter.
    Standard { correct: ChoiceLetter },
    /// Each option carries an efficacy class; no single correct letter.
    Situational {
        efficacy: BTreeMap<ChoiceLetter, Efficacy>,
    },
    /// Deterministic stand-in used when generation failed.
    Fallback { correct: ChoiceLetter, reason: String },
}

/// What to do with a situational item that arrives without an efficacy map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SituationalPolicy {
    /// Degrade to single-letter binary scoring.
    #[default]
    Binary,
    /// Refuse the question with `QuestionError::MissingEfficacy`.
    Strict,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Immutable question presented to the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    subject: Subject,
    tutor: Tutor,
    prompt: String,
    options: BTreeMap<ChoiceLetter, String>,
    kind: QuestionKind,
    difficulty: u8,
    explanation: String,
    tags: Vec<String>,
    visual: Option<String>,
    answer_defaulted: bool,
}

impl Question {
    /// Build the deterministic fallback question for a failed generation.
    ///
    /// It carries four placeholder options and scores against `A`.
    #[must_use]
    pub fn fallback(subject: Subject, tutor: Tutor, reason: impl Into<String>) -> Self {
        let options = ChoiceLetter::ALL
            .into_iter()
            .map(|letter| (letter, format!("Option {letter} (unavailable)")))
            .collect();
        let prompt = format!(
            "A question on {} could not be generated. Pick any option to continue.",
            subject.label()
        );
        Self {
            id: QuestionId::new(format!("fallback:{}", subject.base())),
            subject,
            tutor,
            prompt,
            options,
            kind: QuestionKind::Fallback {
                correct: ChoiceLetter::A,
                reason: reason.into(),
            },
            difficulty: MIN_DIFFICULTY,
            explanation: String::new(),
            tags: Vec::new(),
            visual: None,
            answer_defaulted: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
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
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &BTreeMap<ChoiceLetter, String> {
        &self.options
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn difficulty(&self) -> u8 {
        self.difficulty
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn visual(&self) -> Option<&str> {
        self.visual.as_deref()
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self.kind, QuestionKind::Fallback { .. })
    }

    /// True when the generator's answer key was unusable and `A` or the first
    /// option was assumed.
    #[must_use]
    pub fn answer_defaulted(&self) -> bool {
        self.answer_defaulted
    }

    /// The letter to reveal after answering: the correct letter, or the first
    /// effective option of a situational item.
    #[must_use]
    pub fn best_letter(&self) -> Option<ChoiceLetter> {
        match &self.kind {
            QuestionKind::Standard { correct } | QuestionKind::Fallback { correct, .. } => {
                Some(*correct)
            }
            QuestionKind::Situational { efficacy } => efficacy
                .iter()
                .find(|(_, e)| **e == Efficacy::Effective)
                .map(|(letter, _)| *letter),
        }
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Loosely-typed question as returned by the generator.
///
/// Every field is optional; `validate` repairs what it can.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionDraft {
    pub question_id: Option<String>,
    pub kind: Option<String>,
    pub question: Option<String>,
    pub options: BTreeMap<String, String>,
    pub correct: Option<String>,
    pub efficacy: BTreeMap<String, String>,
    pub difficulty: Option<i64>,
    pub explanation: Option<String>,
    pub tags: Vec<String>,
    pub visual: Option<String>,
}

/// Facts the caller already knows about the question being validated.
#[derive(Debug, Clone)]
pub struct DraftContext {
    pub subject: Subject,
    pub tutor: Tutor,
    pub fallback_id: QuestionId,
    /// The subject is known to be situational regardless of the draft.
    pub expect_situational: bool,
    pub policy: SituationalPolicy,
}

impl QuestionDraft {
    /// Validate and normalize a generator draft.
    ///
    /// Subject and tutor always come from the context, never from the draft.
    ///
    /// # Errors
    ///
    /// - `EmptyPrompt` if there is no question text
    /// - `InvalidOptionCount` if fewer than 2 usable options remain
    /// - `MissingEfficacy` for a situational item under `SituationalPolicy::Strict`
    pub fn validate(self, ctx: DraftContext) -> Result<Question, QuestionError> {
        let prompt = self
            .question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or(QuestionError::EmptyPrompt)?
            .to_string();

        let options = normalize_options(&self.options);
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return Err(QuestionError::InvalidOptionCount {
                found: options.len(),
            });
        }

        let declared_situational = self
            .kind
            .as_deref()
            .is_some_and(|k| k.trim().eq_ignore_ascii_case("situational"));
        let efficacy = normalize_efficacy(&self.efficacy, &options);

        let mut answer_defaulted = false;
        let kind = if !efficacy.is_empty() {
            QuestionKind::Situational { efficacy }
        } else if (declared_situational || ctx.expect_situational)
            && ctx.policy == SituationalPolicy::Strict
        {
            return Err(QuestionError::MissingEfficacy {
                subject: ctx.subject.base().to_string(),
            });
        } else {
            let (correct, defaulted) = answer_key(self.correct.as_deref(), &options);
            answer_defaulted = defaulted;
            QuestionKind::Standard { correct }
        };

        let difficulty = self
            .difficulty
            .map_or(MIN_DIFFICULTY, |d| {
                let clamped = d.clamp(i64::from(MIN_DIFFICULTY), i64::from(MAX_DIFFICULTY));
                u8::try_from(clamped).unwrap_or(MIN_DIFFICULTY)
            });

        let tags = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let id = self
            .question_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or(ctx.fallback_id, QuestionId::new);

        Ok(Question {
            id,
            subject: ctx.subject,
            tutor: ctx.tutor,
            prompt,
            options,
            kind,
            difficulty,
            explanation: self.explanation.map(|e| e.trim().to_string()).unwrap_or_default(),
            tags,
            visual: self
                .visual
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            answer_defaulted,
        })
    }
}

fn normalize_options(raw: &BTreeMap<String, String>) -> BTreeMap<ChoiceLetter, String> {
    raw.iter()
        .filter_map(|(key, text)| {
            let letter = ChoiceLetter::normalize(key)?;
            let text = text.trim();
            (!text.is_empty()).then(|| (letter, text.to_string()))
        })
        .collect()
}

fn normalize_efficacy(
    raw: &BTreeMap<String, String>,
    options: &BTreeMap<ChoiceLetter, String>,
) -> BTreeMap<ChoiceLetter, Efficacy> {
    raw.iter()
        .filter_map(|(key, value)| {
            let letter = ChoiceLetter::normalize(key)?;
            if !options.contains_key(&letter) {
                return None;
            }
            Some((letter, Efficacy::parse(value)?))
        })
        .collect()
}

/// Resolve the answer key, defaulting to the first option when unusable.
fn answer_key(raw: Option<&str>, options: &BTreeMap<ChoiceLetter, String>) -> (ChoiceLetter, bool) {
    match raw
        .and_then(ChoiceLetter::normalize)
        .filter(|l| options.contains_key(l))
    {
        Some(letter) => (letter, false),
        None => (
            options.keys().next().copied().unwrap_or(ChoiceLetter::A),
            true,
        ),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
