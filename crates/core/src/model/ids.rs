use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the fixed set of tutors that host the quiz.
///
/// Each tutor owns an independent points counter and stage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tutor {
    Luna,
    Stella,
    Maria,
}

impl Tutor {
    /// Every tutor, in display order.
    pub const ALL: [Tutor; 3] = [Tutor::Luna, Tutor::Stella, Tutor::Maria];

    /// Tutor used when a subject has no explicit routing.
    #[must_use]
    pub fn fallback() -> Self {
        Tutor::Stella
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tutor::Luna => "Luna",
            Tutor::Stella => "Stella",
            Tutor::Maria => "Maria",
        }
    }

    /// Lowercase slug, used for asset directories and storage keys.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Tutor::Luna => "luna",
            Tutor::Stella => "stella",
            Tutor::Maria => "maria",
        }
    }
}

/// Identifier of a generated question.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(String);

impl QuestionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Tutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tutor({})", self.as_str())
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for Tutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an identifier from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
    raw: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for Tutor {
    type Err = ParseIdError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Tutor::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseIdError {
                kind: "Tutor".to_string(),
                raw: s.to_string(),
            })
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tutor_display() {
        assert_eq!(Tutor::Maria.to_string(), "Maria");
        assert_eq!(Tutor::Luna.slug(), "luna");
    }

    #[test]
    fn test_tutor_from_str_is_lenient() {
        let t: Tutor = "  stella ".parse().unwrap();
        assert_eq!(t, Tutor::Stella);
        assert_eq!("LUNA".parse::<Tutor>().unwrap(), Tutor::Luna);
    }

    #[test]
    fn test_tutor_from_str_invalid() {
        let err = "Giulia".parse::<Tutor>().unwrap_err();
        assert!(err.to_string().contains("Tutor"));
    }

    #[test]
    fn test_tutor_roundtrip() {
        for tutor in Tutor::ALL {
            let parsed: Tutor = tutor.to_string().parse().unwrap();
            assert_eq!(parsed, tutor);
        }
    }

    #[test]
    fn test_question_id_display() {
        let id = QuestionId::new("q-42");
        assert_eq!(id.to_string(), "q-42");
        assert_eq!(format!("{id:?}"), "QuestionId(q-42)");
    }
}
