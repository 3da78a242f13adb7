use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::model::ids::Tutor;
use crate::model::outcome::{Outcome, ScoreResult};
use crate::lesson::LessonRules;
use crate::model::subject::{Subject, base_subject};
use crate::progression::{StageUpdate, TutorProgress, clamp_stage};

/// Number of recent subjects remembered for repetition avoidance.
pub const RECENT_SUBJECTS_MAX: usize = 30;

/// One scored answer in the session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tutor: Tutor,
    pub outcome: Outcome,
}

/// A finished lesson block, kept in the lesson registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedLesson {
    pub subject: String,
    pub tutor: Tutor,
    pub score: u32,
    pub out_of: u32,
}

impl CompletedLesson {
    #[must_use]
    pub fn is_mastered(&self, threshold: u32) -> bool {
        self.score >= threshold
    }
}

/// Everything one scored answer changes, committed in a single step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnCommit {
    pub score: ScoreResult,
    pub stage: StageUpdate,
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Mutable counters of one learner session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    progress: BTreeMap<Tutor, TutorProgress>,
    history: Vec<HistoryEntry>,
    history_limit: Option<usize>,
    last_outcome: Option<Outcome>,
    score: f64,
    recent_subjects: Vec<String>,
    completed_lessons: Vec<CompletedLesson>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` history entries, dropping the oldest.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self.trim_history();
        self
    }

    /// Progress of a tutor; tutors never seen start at zero points, stage 1.
    #[must_use]
    pub fn progress_for(&self, tutor: Tutor) -> TutorProgress {
        self.progress.get(&tutor).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    #[must_use]
    pub fn recent_subjects(&self) -> &[String] {
        &self.recent_subjects
    }

    #[must_use]
    pub fn completed_lessons(&self) -> &[CompletedLesson] {
        &self.completed_lessons
    }

    /// Remember a subject for repetition avoidance (coarse name only).
    pub fn push_recent_subject(&mut self, subject: &Subject) {
        self.recent_subjects.push(subject.base().to_string());
        let overflow = self.recent_subjects.len().saturating_sub(RECENT_SUBJECTS_MAX);
        self.recent_subjects.drain(..overflow);
    }

    /// Overwrite a tutor's progress with the result of a transition.
    pub fn apply_stage_update(&mut self, update: &StageUpdate) {
        self.progress.insert(update.tutor, update.new);
    }

    /// Apply score, progress, history and the last-outcome hint together.
    pub fn commit(&mut self, commit: &TurnCommit) {
        self.score = round_score(self.score + commit.score.delta);
        self.apply_stage_update(&commit.stage);
        self.history.push(HistoryEntry {
            tutor: commit.stage.tutor,
            outcome: commit.score.outcome,
        });
        self.trim_history();
        self.last_outcome = Some(commit.score.outcome);
    }

    pub fn record_lesson(&mut self, lesson: CompletedLesson) {
        self.completed_lessons.push(lesson);
    }

    /// Subjects with at least one lesson scored at or above `threshold`.
    #[must_use]
    pub fn mastered_subjects(&self, threshold: u32) -> HashSet<String> {
        self.completed_lessons
            .iter()
            .filter(|l| l.is_mastered(threshold))
            .map(|l| base_subject(&l.subject).to_string())
            .collect()
    }

    fn trim_history(&mut self) {
        if let Some(limit) = self.history_limit {
            let overflow = self.history.len().saturating_sub(limit);
            self.history.drain(..overflow);
        }
    }

    #[must_use]
    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            points: self
                .progress
                .iter()
                .map(|(t, p)| (t.to_string(), p.points))
                .collect(),
            stage: self
                .progress
                .iter()
                .map(|(t, p)| (t.to_string(), p.stage))
                .collect(),
            history: self.history.iter().map(HistoryRecord::from).collect(),
            score: self.score,
            last_outcome: self.last_outcome,
            recent_subjects: self.recent_subjects.clone(),
            completed_lessons: self
                .completed_lessons
                .iter()
                .map(LessonRecord::from)
                .collect(),
        }
    }

    /// Rebuild state from a snapshot.
    ///
    /// Unknown tutors are dropped, wherever they appear, and stages are
    /// clamped into range.
    #[must_use]
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let mut progress: BTreeMap<Tutor, TutorProgress> = BTreeMap::new();
        for (key, points) in &snapshot.points {
            if let Ok(tutor) = key.parse::<Tutor>() {
                progress.entry(tutor).or_default().points = *points;
            }
        }
        for (key, stage) in &snapshot.stage {
            if let Ok(tutor) = key.parse::<Tutor>() {
                progress.entry(tutor).or_default().stage = clamp_stage(*stage);
            }
        }

        let mut recent_subjects = snapshot.recent_subjects;
        let overflow = recent_subjects.len().saturating_sub(RECENT_SUBJECTS_MAX);
        recent_subjects.drain(..overflow);

        let history = snapshot
            .history
            .iter()
            .filter_map(HistoryRecord::to_entry)
            .collect();
        let completed_lessons = snapshot
            .completed_lessons
            .into_iter()
            .filter_map(LessonRecord::into_lesson)
            .collect();

        Self {
            progress,
            history,
            history_limit: None,
            last_outcome: snapshot.last_outcome,
            score: if snapshot.score.is_finite() {
                snapshot.score
            } else {
                0.0
            },
            recent_subjects,
            completed_lessons,
        }
    }
}

/// Round a running score to three decimals.
fn round_score(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Flat, persistable view of a `SessionState`.
///
/// Every field defaults, so files written by older versions still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    pub points: BTreeMap<String, u32>,
    pub stage: BTreeMap<String, u8>,
    pub history: Vec<HistoryRecord>,
    pub score: f64,
    pub last_outcome: Option<Outcome>,
    pub recent_subjects: Vec<String>,
    pub completed_lessons: Vec<LessonRecord>,
}

/// Stored form of a `HistoryEntry`. A missing outcome reads as omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRecord {
    pub tutor: String,
    pub outcome: Outcome,
}

impl Default for HistoryRecord {
    fn default() -> Self {
        Self {
            tutor: String::new(),
            outcome: Outcome::Omitted,
        }
    }
}

impl HistoryRecord {
    /// `None` when the tutor is not one of ours.
    #[must_use]
    pub fn to_entry(&self) -> Option<HistoryEntry> {
        let tutor = self.tutor.parse::<Tutor>().ok()?;
        Some(HistoryEntry {
            tutor,
            outcome: self.outcome,
        })
    }
}

impl From<&HistoryEntry> for HistoryRecord {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            tutor: entry.tutor.as_str().to_string(),
            outcome: entry.outcome,
        }
    }
}

/// Stored form of a `CompletedLesson`. A missing block size reads as the
/// default quiz length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonRecord {
    pub subject: String,
    pub tutor: String,
    pub score: u32,
    pub out_of: u32,
}

impl Default for LessonRecord {
    fn default() -> Self {
        Self {
            subject: String::new(),
            tutor: String::new(),
            score: 0,
            out_of: LessonRules::default().quiz_len(),
        }
    }
}

impl LessonRecord {
    /// `None` for an unknown tutor or a blank subject.
    #[must_use]
    pub fn into_lesson(self) -> Option<CompletedLesson> {
        let tutor = self.tutor.parse::<Tutor>().ok()?;
        if self.subject.trim().is_empty() {
            return None;
        }
        Some(CompletedLesson {
            subject: self.subject,
            tutor,
            score: self.score,
            out_of: self.out_of.max(1),
        })
    }
}

impl From<&CompletedLesson> for LessonRecord {
    fn from(lesson: &CompletedLesson) -> Self {
        Self {
            subject: lesson.subject.clone(),
            tutor: lesson.tutor.as_str().to_string(),
            score: lesson.score,
            out_of: lesson.out_of,
        }
    }
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        state.to_snapshot()
    }
}

impl From<SessionSnapshot> for SessionState {
    fn from(snapshot: SessionSnapshot) -> Self {
        SessionState::from_snapshot(snapshot)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
