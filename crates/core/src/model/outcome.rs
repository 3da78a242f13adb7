use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("invalid outcome label: {0}")]
    InvalidLabel(String),
}

//
// ─── OUTCOME ──────────────────────────────────────────────────────────────────
//

/// Classification of a scored answer.
///
/// - `Correct`: the right letter, or an effective situational option
/// - `Partial`: a neutral situational option (positive but reduced delta)
/// - `Wrong`: any other non-empty choice
/// - `Omitted`: no choice given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Partial,
    Wrong,
    Omitted,
}

impl Outcome {
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Outcome::Correct)
    }

    /// True whenever the outcome is anything but `Correct`.
    ///
    /// Only selects the "disappointed" asset variant downstream.
    #[must_use]
    pub fn is_punish(self) -> bool {
        !self.is_correct()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Correct => "correct",
            Outcome::Partial => "partial",
            Outcome::Wrong => "wrong",
            Outcome::Omitted => "omitted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = OutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "correct" => Ok(Outcome::Correct),
            "partial" => Ok(Outcome::Partial),
            "wrong" => Ok(Outcome::Wrong),
            "omitted" => Ok(Outcome::Omitted),
            _ => Err(OutcomeError::InvalidLabel(s.to_string())),
        }
    }
}

//
// ─── SCORE RESULT ─────────────────────────────────────────────────────────────
//

/// Pure output of the scoring rules for a single answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreResult {
    pub outcome: Outcome,
    pub delta: f64,
}

impl ScoreResult {
    #[must_use]
    pub fn new(outcome: Outcome, delta: f64) -> Self {
        Self { outcome, delta }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
