use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between a subject and its sub-topic, e.g. `"Logic: Syllogisms"`.
pub const TOPIC_SEPARATOR: &str = ": ";

/// Strip any sub-topic suffix and surrounding whitespace from a subject label.
///
/// Every comparison of subject identity (exclusion, recency, tutor routing,
/// mastery) goes through this function.
#[must_use]
pub fn base_subject(label: &str) -> &str {
    match label.split_once(TOPIC_SEPARATOR) {
        Some((base, _)) => base.trim(),
        None => label.trim(),
    }
}

/// A sampled subject, optionally refined with a sub-topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    base: String,
    topic: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("subject name cannot be empty")]
    EmptyName,
}

impl Subject {
    /// Create a coarse subject.
    ///
    /// A label that already carries a `": topic"` suffix is split.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError::EmptyName` if the label is blank.
    pub fn new(label: impl AsRef<str>) -> Result<Self, SubjectError> {
        let label = label.as_ref();
        let base = base_subject(label);
        if base.is_empty() {
            return Err(SubjectError::EmptyName);
        }
        let topic = label
            .split_once(TOPIC_SEPARATOR)
            .map(|(_, t)| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(Self {
            base: base.to_string(),
            topic,
        })
    }

    /// Attach (or replace) a sub-topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let topic = topic.trim();
        self.topic = if topic.is_empty() {
            None
        } else {
            Some(topic.to_string())
        };
        self
    }

    /// Coarse subject key, used wherever identity matters.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Human-facing label: `"Subject"` or `"Subject: Topic"`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.topic {
            Some(topic) => format!("{}{TOPIC_SEPARATOR}{topic}", self.base),
            None => self.base.clone(),
        }
    }

    /// True if both refer to the same coarse subject.
    #[must_use]
    pub fn same_base(&self, other: &Subject) -> bool {
        self.base == other.base
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_subject_strips_topic() {
        assert_eq!(base_subject("Logic: Syllogisms"), "Logic");
        assert_eq!(base_subject("  Logic  "), "Logic");
        assert_eq!(base_subject("Public contracts"), "Public contracts");
    }

    #[test]
    fn new_splits_label_with_topic() {
        let s = Subject::new("Criminal law: Embezzlement").unwrap();
        assert_eq!(s.base(), "Criminal law");
        assert_eq!(s.topic(), Some("Embezzlement"));
        assert_eq!(s.label(), "Criminal law: Embezzlement");
    }

    #[test]
    fn empty_subject_is_rejected() {
        assert_eq!(Subject::new("   ").unwrap_err(), SubjectError::EmptyName);
    }

    #[test]
    fn topic_does_not_change_identity() {
        let a = Subject::new("Logic").unwrap();
        let b = Subject::new("Logic").unwrap().with_topic("Series");
        assert!(a.same_base(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn blank_topic_is_dropped() {
        let s = Subject::new("Logic").unwrap().with_topic("  ");
        assert_eq!(s.topic(), None);
        assert_eq!(s.to_string(), "Logic");
    }
}
