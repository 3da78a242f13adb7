use thiserror::Error;

use crate::model::{ChoiceLetter, Efficacy, Outcome, Question, QuestionKind, ScoreResult};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ScoreConfigError {
    #[error("score value {name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("a correct answer must be worth more than a wrong one")]
    InvertedScale,
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Point values for each answer outcome.
///
/// Defaults follow the exam notice:
/// - standard: correct +0.75, wrong −0.25, omitted 0
/// - situational: effective +0.75, neutral +0.375, ineffective 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreConfig {
    standard_correct: f64,
    standard_wrong: f64,
    omitted: f64,
    situational_effective: f64,
    situational_neutral: f64,
    situational_ineffective: f64,
}

impl ScoreConfig {
    /// Creates custom point values.
    ///
    /// # Errors
    ///
    /// Returns `ScoreConfigError` if any value is non-finite or if a correct
    /// standard answer is not worth more than a wrong one.
    pub fn new(
        standard_correct: f64,
        standard_wrong: f64,
        omitted: f64,
        situational_effective: f64,
        situational_neutral: f64,
        situational_ineffective: f64,
    ) -> Result<Self, ScoreConfigError> {
        for (name, value) in [
            ("standard_correct", standard_correct),
            ("standard_wrong", standard_wrong),
            ("omitted", omitted),
            ("situational_effective", situational_effective),
            ("situational_neutral", situational_neutral),
            ("situational_ineffective", situational_ineffective),
        ] {
            if !value.is_finite() {
                return Err(ScoreConfigError::NotFinite { name, value });
            }
        }
        if standard_correct <= standard_wrong {
            return Err(ScoreConfigError::InvertedScale);
        }
        Ok(Self {
            standard_correct,
            standard_wrong,
            omitted,
            situational_effective,
            situational_neutral,
            situational_ineffective,
        })
    }

    #[must_use]
    pub fn standard_correct(&self) -> f64 {
        self.standard_correct
    }

    #[must_use]
    pub fn standard_wrong(&self) -> f64 {
        self.standard_wrong
    }

    #[must_use]
    pub fn omitted(&self) -> f64 {
        self.omitted
    }

    #[must_use]
    pub fn situational_effective(&self) -> f64 {
        self.situational_effective
    }

    #[must_use]
    pub fn situational_neutral(&self) -> f64 {
        self.situational_neutral
    }

    #[must_use]
    pub fn situational_ineffective(&self) -> f64 {
        self.situational_ineffective
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            standard_correct: 0.75,
            standard_wrong: -0.25,
            omitted: 0.0,
            situational_effective: 0.75,
            situational_neutral: 0.375,
            situational_ineffective: 0.0,
        }
    }
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Maps an answer to an outcome and a point delta.
///
/// Total over its inputs: malformed choices are normalized, never rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreRules {
    config: ScoreConfig,
}

impl ScoreRules {
    #[must_use]
    pub fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Score a raw choice against a question kind.
    ///
    /// `None` and blank input count as omitted. Any other input without a
    /// valid letter is a wrong answer.
    #[must_use]
    pub fn evaluate(&self, kind: &QuestionKind, choice: Option<&str>) -> ScoreResult {
        let Some(raw) = choice.map(str::trim).filter(|c| !c.is_empty()) else {
            return self.omitted();
        };
        let chosen = ChoiceLetter::normalize(raw);

        match kind {
            QuestionKind::Standard { correct } | QuestionKind::Fallback { correct, .. } => {
                self.evaluate_standard(chosen, *correct)
            }
            QuestionKind::Situational { efficacy } => {
                let efficacy = chosen.and_then(|letter| efficacy.get(&letter).copied());
                self.evaluate_situational(efficacy)
            }
        }
    }

    fn omitted(&self) -> ScoreResult {
        ScoreResult::new(Outcome::Omitted, self.config.omitted)
    }

    fn evaluate_standard(
        &self,
        chosen: Option<ChoiceLetter>,
        correct: ChoiceLetter,
    ) -> ScoreResult {
        if chosen == Some(correct) {
            ScoreResult::new(Outcome::Correct, self.config.standard_correct)
        } else {
            ScoreResult::new(Outcome::Wrong, self.config.standard_wrong)
        }
    }

    fn evaluate_situational(&self, efficacy: Option<Efficacy>) -> ScoreResult {
        match efficacy {
            Some(Efficacy::Effective) => {
                ScoreResult::new(Outcome::Correct, self.config.situational_effective)
            }
            Some(Efficacy::Neutral) => {
                ScoreResult::new(Outcome::Partial, self.config.situational_neutral)
            }
            Some(Efficacy::Ineffective) | None => {
                ScoreResult::new(Outcome::Wrong, self.config.situational_ineffective)
            }
        }
    }
}

impl Question {
    /// Score a choice for this question.
    #[must_use]
    pub fn score(&self, rules: &ScoreRules, choice: Option<&str>) -> ScoreResult {
        rules.evaluate(self.kind(), choice)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn standard(correct: ChoiceLetter) -> QuestionKind {
        QuestionKind::Standard { correct }
    }

    fn situational() -> QuestionKind {
        let mut efficacy = BTreeMap::new();
        efficacy.insert(ChoiceLetter::A, Efficacy::Effective);
        efficacy.insert(ChoiceLetter::B, Efficacy::Neutral);
        efficacy.insert(ChoiceLetter::C, Efficacy::Ineffective);
        QuestionKind::Situational { efficacy }
    }

    #[test]
    fn standard_deltas_follow_the_notice() {
        let rules = ScoreRules::default();
        let kind = standard(ChoiceLetter::A);

        let correct = rules.evaluate(&kind, Some("A"));
        assert_eq!(correct, ScoreResult::new(Outcome::Correct, 0.75));

        let wrong = rules.evaluate(&kind, Some("B"));
        assert_eq!(wrong, ScoreResult::new(Outcome::Wrong, -0.25));

        let omitted = rules.evaluate(&kind, None);
        assert_eq!(omitted, ScoreResult::new(Outcome::Omitted, 0.0));
    }

    #[test]
    fn blank_choice_is_omitted() {
        let rules = ScoreRules::default();
        let res = rules.evaluate(&standard(ChoiceLetter::A), Some("   "));
        assert_eq!(res.outcome, Outcome::Omitted);
    }

    #[test]
    fn choice_is_normalized_before_matching() {
        let rules = ScoreRules::default();
        let kind = standard(ChoiceLetter::A);
        assert_eq!(rules.evaluate(&kind, Some("a)")).outcome, Outcome::Correct);
        assert_eq!(rules.evaluate(&kind, Some(" a. ")).outcome, Outcome::Correct);
    }

    #[test]
    fn lowercase_punctuated_answer_key_matches_plain_choice() {
        // Generator returned "a)"; the draft normalizes it to A.
        let key = ChoiceLetter::normalize("a)").unwrap();
        let res = ScoreRules::default().evaluate(&standard(key), Some("A"));
        assert_eq!(res.outcome, Outcome::Correct);
    }

    #[test]
    fn garbage_choice_is_wrong_not_a_crash() {
        let res = ScoreRules::default().evaluate(&standard(ChoiceLetter::A), Some("42"));
        assert_eq!(res, ScoreResult::new(Outcome::Wrong, -0.25));
    }

    #[test]
    fn situational_deltas_follow_efficacy() {
        let rules = ScoreRules::default();
        let kind = situational();

        assert_eq!(
            rules.evaluate(&kind, Some("A")),
            ScoreResult::new(Outcome::Correct, 0.75)
        );
        assert_eq!(
            rules.evaluate(&kind, Some("b")),
            ScoreResult::new(Outcome::Partial, 0.375)
        );
        assert_eq!(
            rules.evaluate(&kind, Some("C")),
            ScoreResult::new(Outcome::Wrong, 0.0)
        );
        // D is not mapped
        assert_eq!(
            rules.evaluate(&kind, Some("D")),
            ScoreResult::new(Outcome::Wrong, 0.0)
        );
        assert_eq!(
            rules.evaluate(&kind, None),
            ScoreResult::new(Outcome::Omitted, 0.0)
        );
    }

    #[test]
    fn fallback_scores_like_standard_against_a() {
        let kind = QuestionKind::Fallback {
            correct: ChoiceLetter::A,
            reason: "offline".into(),
        };
        let rules = ScoreRules::default();
        assert_eq!(rules.evaluate(&kind, Some("A")).outcome, Outcome::Correct);
        assert_eq!(rules.evaluate(&kind, Some("C")).outcome, Outcome::Wrong);
    }

    #[test]
    fn custom_config_is_validated() {
        assert!(matches!(
            ScoreConfig::new(f64::NAN, -0.25, 0.0, 0.75, 0.375, 0.0),
            Err(ScoreConfigError::NotFinite { name: "standard_correct", .. })
        ));
        assert_eq!(
            ScoreConfig::new(-1.0, 0.0, 0.0, 0.75, 0.375, 0.0),
            Err(ScoreConfigError::InvertedScale)
        );

        let cfg = ScoreConfig::new(1.0, -0.5, 0.0, 1.0, 0.5, 0.0).unwrap();
        let res = ScoreRules::new(cfg).evaluate(&standard(ChoiceLetter::B), Some("A"));
        assert_eq!(res.delta, -0.5);
    }
}
