use std::collections::HashSet;

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::IndexedRandom;
use thiserror::Error;

use crate::catalog::Syllabus;
use crate::model::{Subject, base_subject};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SamplerError {
    #[error("subject weights cannot be empty")]
    NoSubjects,

    #[error("subject name cannot be empty")]
    EmptyName,

    #[error("duplicate subject: {0}")]
    DuplicateSubject(String),

    #[error("weight for {subject} must be finite and > 0, got {weight}")]
    InvalidWeight { subject: String, weight: f64 },

    #[error("reroll attempts must be at least 1")]
    InvalidRerollAttempts,
}

//
// ─── WEIGHTS ───────────────────────────────────────────────────────────────────
//

/// Relative draw weights keyed by coarse subject name.
///
/// Order is preserved so a seeded sampler is reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectWeights {
    entries: Vec<(String, f64)>,
}

impl SubjectWeights {
    /// # Errors
    ///
    /// Returns `SamplerError` if the list is empty, a name is blank or
    /// repeated, or a weight is not a positive finite number.
    pub fn new<I, S>(entries: I) -> Result<Self, SamplerError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (name, weight) in entries {
            let name = base_subject(name.as_ref()).to_string();
            if name.is_empty() {
                return Err(SamplerError::EmptyName);
            }
            if !weight.is_finite() || weight <= 0.0 {
                return Err(SamplerError::InvalidWeight {
                    subject: name,
                    weight,
                });
            }
            if !seen.insert(name.clone()) {
                return Err(SamplerError::DuplicateSubject(name));
            }
            out.push((name, weight));
        }
        if out.is_empty() {
            return Err(SamplerError::NoSubjects);
        }
        Ok(Self { entries: out })
    }

    /// Built-in tables, already known to be valid.
    pub(crate) fn from_trusted(entries: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn weight_of(&self, subject: &str) -> Option<f64> {
        let base = base_subject(subject);
        self.entries
            .iter()
            .find(|(name, _)| name == base)
            .map(|(_, w)| *w)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    recency_window: usize,
    reroll_attempts: usize,
}

impl SamplerConfig {
    /// # Errors
    ///
    /// Returns `SamplerError::InvalidRerollAttempts` if `reroll_attempts` is zero.
    pub fn new(recency_window: usize, reroll_attempts: usize) -> Result<Self, SamplerError> {
        if reroll_attempts == 0 {
            return Err(SamplerError::InvalidRerollAttempts);
        }
        Ok(Self {
            recency_window,
            reroll_attempts,
        })
    }

    #[must_use]
    pub fn recency_window(&self) -> usize {
        self.recency_window
    }

    #[must_use]
    pub fn reroll_attempts(&self) -> usize {
        self.reroll_attempts
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            recency_window: 2,
            reroll_attempts: 3,
        }
    }
}

//
// ─── SAMPLER ───────────────────────────────────────────────────────────────────
//

/// Result of one draw, with the bookkeeping the orchestrator logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPick {
    pub subject: Subject,
    /// Number of weighted draws made, `1..=reroll_attempts`.
    pub attempts: usize,
    /// True if the accepted subject is inside the recency window.
    pub repeated: bool,
}

/// Weighted subject picker with soft recency avoidance.
pub struct SubjectSampler<R: Rng> {
    weights: SubjectWeights,
    syllabus: Syllabus,
    config: SamplerConfig,
    rng: R,
}

impl<R: Rng> SubjectSampler<R> {
    #[must_use]
    pub fn new(weights: SubjectWeights, syllabus: Syllabus, config: SamplerConfig, rng: R) -> Self {
        Self {
            weights,
            syllabus,
            config,
            rng,
        }
    }

    #[must_use]
    pub fn weights(&self) -> &SubjectWeights {
        &self.weights
    }

    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Draw the next subject.
    ///
    /// `recent` is the subject history, oldest first; `excluded` holds subject
    /// names that must never be returned. Both are compared on the coarse
    /// subject. Returns `None` only when every subject is excluded.
    pub fn pick(&mut self, recent: &[String], excluded: &HashSet<String>) -> Option<Subject> {
        self.pick_detailed(recent, excluded).map(|p| p.subject)
    }

    pub fn pick_detailed(
        &mut self,
        recent: &[String],
        excluded: &HashSet<String>,
    ) -> Option<SubjectPick> {
        let excluded: HashSet<&str> = excluded.iter().map(|s| base_subject(s)).collect();
        let pool: Vec<(&str, f64)> = self
            .weights
            .entries
            .iter()
            .filter(|(name, _)| !excluded.contains(name.as_str()))
            .map(|(name, w)| (name.as_str(), *w))
            .collect();
        if pool.is_empty() {
            return None;
        }

        let dist = WeightedIndex::new(pool.iter().map(|(_, w)| *w)).ok()?;
        let window_start = recent.len().saturating_sub(self.config.recency_window);
        let avoid: HashSet<&str> = recent[window_start..]
            .iter()
            .map(|s| base_subject(s))
            .collect();

        let mut attempts = 0;
        let mut chosen = pool[0].0;
        while attempts < self.config.reroll_attempts {
            attempts += 1;
            chosen = pool[dist.sample(&mut self.rng)].0;
            if !avoid.contains(chosen) {
                break;
            }
        }
        let repeated = avoid.contains(chosen);

        let mut subject = Subject::new(chosen).ok()?;
        if let Some(topic) = self.syllabus.topics_for(chosen).choose(&mut self.rng) {
            subject = subject.with_topic(topic.clone());
        }

        Some(SubjectPick {
            subject,
            attempts,
            repeated,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sampler(weights: SubjectWeights, seed: u64) -> SubjectSampler<StdRng> {
        SubjectSampler::new(
            weights,
            Syllabus::empty(),
            SamplerConfig::default(),
            StdRng::seed_from_u64(seed),
        )
    }

    #[test]
    fn weights_are_validated() {
        assert_eq!(
            SubjectWeights::new(Vec::<(String, f64)>::new()),
            Err(SamplerError::NoSubjects)
        );
        assert_eq!(
            SubjectWeights::new([(" ", 1.0)]),
            Err(SamplerError::EmptyName)
        );
        assert!(matches!(
            SubjectWeights::new([("Logic", 0.0)]),
            Err(SamplerError::InvalidWeight { .. })
        ));
        assert!(matches!(
            SubjectWeights::new([("Logic", f64::INFINITY)]),
            Err(SamplerError::InvalidWeight { .. })
        ));
        assert_eq!(
            SubjectWeights::new([("Logic", 1.0), ("Logic: Series", 2.0)]),
            Err(SamplerError::DuplicateSubject("Logic".into()))
        );
        assert_eq!(
            SamplerConfig::new(2, 0),
            Err(SamplerError::InvalidRerollAttempts)
        );
    }

    #[test]
    fn dominant_recent_subject_is_accepted_on_last_draw() {
        let weights =
            SubjectWeights::new([("Logic", 1_000_000.0), ("Public contracts", 0.000_001)])
                .unwrap();
        let mut s = sampler(weights, 7);
        let recent = vec!["Logic".to_string(), "Logic".to_string()];

        let pick = s.pick_detailed(&recent, &HashSet::new()).unwrap();
        assert_eq!(pick.subject.base(), "Logic");
        assert_eq!(pick.attempts, 3);
        assert!(pick.repeated);
    }

    #[test]
    fn subject_outside_window_is_taken_on_first_draw() {
        let weights = SubjectWeights::new([("Logic", 1.0)]).unwrap();
        let mut s = sampler(weights, 1);
        // Logic is three entries back, outside a window of 2
        let recent = vec!["Logic".into(), "Ethics".into(), "Ethics".into()];
        let pick = s.pick_detailed(&recent, &HashSet::new()).unwrap();
        assert_eq!(pick.attempts, 1);
        assert!(!pick.repeated);
    }

    #[test]
    fn recency_compares_coarse_subjects() {
        let weights = SubjectWeights::new([("Logic", 1.0)]).unwrap();
        let mut s = sampler(weights, 3);
        let recent = vec!["Logic: Series".to_string()];
        let pick = s.pick_detailed(&recent, &HashSet::new()).unwrap();
        assert!(pick.repeated);
    }

    #[test]
    fn all_excluded_yields_none() {
        let weights = SubjectWeights::new([("Logic", 1.0), ("Ethics", 2.0)]).unwrap();
        let mut s = sampler(weights, 0);
        let excluded: HashSet<String> = ["Logic".into(), "Ethics: Duties".into()].into();
        assert_eq!(s.pick(&[], &excluded), None);
    }

    #[test]
    fn syllabus_topic_is_attached() {
        let mut s = SubjectSampler::new(
            catalog::default_weights(),
            catalog::syllabus(),
            SamplerConfig::default(),
            StdRng::seed_from_u64(11),
        );
        let only: HashSet<String> = catalog::default_weights()
            .subjects()
            .filter(|name| *name != catalog::CRIMINAL_LAW)
            .map(str::to_string)
            .collect();

        let subject = s.pick(&[], &only).unwrap();
        assert_eq!(subject.base(), catalog::CRIMINAL_LAW);
        let topic = subject.topic().unwrap();
        assert!(catalog::syllabus()
            .topics_for(catalog::CRIMINAL_LAW)
            .iter()
            .any(|t| t == topic));
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let mut a = sampler(catalog::default_weights(), 99);
        let mut b = sampler(catalog::default_weights(), 99);
        for _ in 0..20 {
            assert_eq!(a.pick(&[], &HashSet::new()), b.pick(&[], &HashSet::new()));
        }
    }

    proptest! {
        #[test]
        fn never_returns_excluded_and_none_iff_pool_empty(
            seed in any::<u64>(),
            mask in proptest::collection::vec(any::<bool>(), 4),
            recent_idx in proptest::collection::vec(0usize..4, 0..5),
        ) {
            let names = ["Logic", "Ethics", "Law", "English"];
            let weights = SubjectWeights::new(
                names.iter().enumerate().map(|(i, n)| (*n, (i + 1) as f64)),
            ).unwrap();
            let excluded: HashSet<String> = names
                .iter()
                .zip(&mask)
                .filter(|(_, m)| **m)
                .map(|(n, _)| (*n).to_string())
                .collect();
            let recent: Vec<String> = recent_idx.iter().map(|i| names[*i].to_string()).collect();

            let mut s = sampler(weights, seed);
            let picked = s.pick_detailed(&recent, &excluded);
            if excluded.len() == names.len() {
                prop_assert!(picked.is_none());
            } else {
                let picked = picked.unwrap();
                prop_assert!(!excluded.contains(picked.subject.base()));
                prop_assert!((1..=3).contains(&picked.attempts));
            }
        }
    }
}
