use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Outcome, Tutor};

/// Lowest and highest stage a tutor can reach.
pub const MIN_STAGE: u8 = 1;
pub const MAX_STAGE: u8 = 5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StageError {
    #[error("stage band width must be > 0")]
    InvalidStep,

    #[error("points increment must be > 0")]
    InvalidIncrement,
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Persistent counters owned by one tutor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorProgress {
    pub points: u32,
    pub stage: u8,
}

impl TutorProgress {
    #[must_use]
    pub fn new(points: u32, stage: u8) -> Self {
        Self {
            points,
            stage: clamp_stage(stage),
        }
    }
}

impl Default for TutorProgress {
    fn default() -> Self {
        Self {
            points: 0,
            stage: MIN_STAGE,
        }
    }
}

/// Clamp any stage value into `[MIN_STAGE, MAX_STAGE]`.
#[must_use]
pub fn clamp_stage(stage: u8) -> u8 {
    stage.clamp(MIN_STAGE, MAX_STAGE)
}

//
// ─── BANDING ───────────────────────────────────────────────────────────────────
//

/// Fixed-width point bands mapping points to stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBand {
    step: u32,
}

impl StageBand {
    /// # Errors
    ///
    /// Returns `StageError::InvalidStep` if `step` is zero.
    pub fn new(step: u32) -> Result<Self, StageError> {
        if step == 0 {
            return Err(StageError::InvalidStep);
        }
        Ok(Self { step })
    }

    #[must_use]
    pub fn step(&self) -> u32 {
        self.step
    }

    /// `1` for zero points, otherwise `((points - 1) / step) + 1`, clamped.
    #[must_use]
    pub fn stage_for(&self, points: u32) -> u8 {
        if points == 0 {
            return MIN_STAGE;
        }
        let raw = (points - 1) / self.step + 1;
        u8::try_from(raw).map_or(MAX_STAGE, clamp_stage)
    }

    /// Smallest point total that lands in `stage`.
    #[must_use]
    pub fn floor_of(&self, stage: u8) -> u32 {
        let stage = clamp_stage(stage);
        if stage == MIN_STAGE {
            0
        } else {
            u32::from(stage - 1)
                .saturating_mul(self.step)
                .saturating_add(1)
        }
    }
}

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// How non-correct outcomes move a tutor backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagePolicy {
    /// Points go down by one; stage is always derived from points.
    #[default]
    Banded,
    /// Points are left alone; stage drops one level directly.
    Demote,
}

/// Increment, band width and policy for stage progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionConfig {
    increment: u32,
    band: StageBand,
    policy: StagePolicy,
}

impl ProgressionConfig {
    /// # Errors
    ///
    /// Returns `StageError` if `increment` or `step` is zero.
    pub fn new(increment: u32, step: u32, policy: StagePolicy) -> Result<Self, StageError> {
        if increment == 0 {
            return Err(StageError::InvalidIncrement);
        }
        Ok(Self {
            increment,
            band: StageBand::new(step)?,
            policy,
        })
    }

    #[must_use]
    pub fn increment(&self) -> u32 {
        self.increment
    }

    #[must_use]
    pub fn band(&self) -> StageBand {
        self.band
    }

    #[must_use]
    pub fn policy(&self) -> StagePolicy {
        self.policy
    }
}

impl Default for ProgressionConfig {
    /// One point per correct answer, five points per stage, banded policy.
    fn default() -> Self {
        Self {
            increment: 1,
            band: StageBand { step: 5 },
            policy: StagePolicy::Banded,
        }
    }
}

//
// ─── UPDATE ────────────────────────────────────────────────────────────────────
//

/// Transition produced for one tutor; applied to the session by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageUpdate {
    pub tutor: Tutor,
    pub old: TutorProgress,
    pub new: TutorProgress,
    pub is_punish: bool,
}

impl StageUpdate {
    #[must_use]
    pub fn new_points(&self) -> u32 {
        self.new.points
    }

    #[must_use]
    pub fn new_stage(&self) -> u8 {
        self.new.stage
    }

    #[must_use]
    pub fn stage_changed(&self) -> bool {
        self.old.stage != self.new.stage
    }
}

//
// ─── PROGRESSION ───────────────────────────────────────────────────────────────
//

/// Per-tutor stage state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageProgression {
    config: ProgressionConfig,
}

impl StageProgression {
    #[must_use]
    pub fn new(config: ProgressionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    #[must_use]
    pub fn stage_for_points(&self, points: u32) -> u8 {
        self.config.band.stage_for(points)
    }

    /// Compute the transition for one scored answer.
    ///
    /// `Partial` leaves both counters where they are.
    #[must_use]
    pub fn apply(&self, tutor: Tutor, current: TutorProgress, outcome: Outcome) -> StageUpdate {
        let band = self.config.band;
        let new = match (outcome, self.config.policy) {
            (Outcome::Correct, _) => {
                let points = current.points.saturating_add(self.config.increment);
                TutorProgress::new(points, band.stage_for(points))
            }
            (Outcome::Partial, StagePolicy::Banded) => {
                TutorProgress::new(current.points, band.stage_for(current.points))
            }
            (Outcome::Partial, StagePolicy::Demote) => current,
            (Outcome::Wrong | Outcome::Omitted, StagePolicy::Banded) => {
                let points = current.points.saturating_sub(1);
                TutorProgress::new(points, band.stage_for(points))
            }
            (Outcome::Wrong | Outcome::Omitted, StagePolicy::Demote) => TutorProgress::new(
                current.points,
                current.stage.saturating_sub(1).max(MIN_STAGE),
            ),
        };

        StageUpdate {
            tutor,
            old: current,
            new,
            is_punish: outcome.is_punish(),
        }
    }

    /// Raise a tutor by one stage (lesson mastery).
    ///
    /// Under the banded policy the points jump to the floor of the next band
    /// so the stage stays derivable from the points.
    #[must_use]
    pub fn promote(&self, tutor: Tutor, current: TutorProgress) -> StageUpdate {
        let target = clamp_stage(current.stage.saturating_add(1));
        let new = match self.config.policy {
            StagePolicy::Banded => {
                let points = current.points.max(self.config.band.floor_of(target));
                TutorProgress::new(points, self.config.band.stage_for(points))
            }
            StagePolicy::Demote => TutorProgress::new(current.points, target),
        };
        StageUpdate {
            tutor,
            old: current,
            new,
            is_punish: false,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(progression: &StageProgression, outcomes: &[Outcome]) -> TutorProgress {
        outcomes.iter().fold(TutorProgress::default(), |acc, o| {
            progression.apply(Tutor::Luna, acc, *o).new
        })
    }

    #[test]
    fn first_correct_answer_stays_on_stage_one() {
        let p = StageProgression::default();
        let update = p.apply(Tutor::Luna, TutorProgress::default(), Outcome::Correct);
        assert_eq!(update.new_points(), 1);
        assert_eq!(update.new_stage(), 1);
        assert!(!update.is_punish);
    }

    #[test]
    fn sixth_correct_answer_reaches_stage_two() {
        let p = StageProgression::default();
        let five = run(&p, &[Outcome::Correct; 5]);
        assert_eq!(five, TutorProgress::new(5, 1));

        let six = run(&p, &[Outcome::Correct; 6]);
        assert_eq!(six, TutorProgress::new(6, 2));
    }

    #[test]
    fn stage_is_capped_at_max() {
        let p = StageProgression::default();
        let end = run(&p, &[Outcome::Correct; 100]);
        assert_eq!(end.stage, MAX_STAGE);
        assert_eq!(end.points, 100);
    }

    #[test]
    fn banded_wrong_answer_decrements_points() {
        let p = StageProgression::default();
        let current = TutorProgress::new(6, 2);
        let update = p.apply(Tutor::Maria, current, Outcome::Wrong);
        assert_eq!(update.new, TutorProgress::new(5, 1));
        assert!(update.is_punish);
        assert!(update.stage_changed());
    }

    #[test]
    fn banded_omitted_at_zero_stays_at_zero() {
        let p = StageProgression::default();
        let update = p.apply(Tutor::Maria, TutorProgress::default(), Outcome::Omitted);
        assert_eq!(update.new, TutorProgress::default());
        assert!(update.is_punish);
    }

    #[test]
    fn partial_holds_counters_but_is_punish() {
        let p = StageProgression::default();
        let current = TutorProgress::new(7, 2);
        let update = p.apply(Tutor::Stella, current, Outcome::Partial);
        assert_eq!(update.new, current);
        assert!(update.is_punish);
    }

    #[test]
    fn demote_policy_keeps_points_and_drops_one_stage() {
        let cfg = ProgressionConfig::new(1, 10, StagePolicy::Demote).unwrap();
        let p = StageProgression::new(cfg);
        let current = TutorProgress::new(25, 3);

        let update = p.apply(Tutor::Luna, current, Outcome::Wrong);
        assert_eq!(update.new, TutorProgress::new(25, 2));

        let floor = p.apply(Tutor::Luna, TutorProgress::new(3, 1), Outcome::Omitted);
        assert_eq!(floor.new, TutorProgress::new(3, 1));

        // a correct answer re-derives the stage from points
        let back = p.apply(Tutor::Luna, update.new, Outcome::Correct);
        assert_eq!(back.new, TutorProgress::new(26, 3));
    }

    #[test]
    fn stage_derivation_is_idempotent() {
        let band = StageBand::new(5).unwrap();
        for points in 0..60 {
            assert_eq!(band.stage_for(points), band.stage_for(points));
        }
        assert_eq!(band.stage_for(0), 1);
        assert_eq!(band.stage_for(5), 1);
        assert_eq!(band.stage_for(6), 2);
        assert_eq!(band.stage_for(21), 5);
        assert_eq!(band.stage_for(u32::MAX), 5);
    }

    #[test]
    fn band_floor_round_trips_to_stage() {
        let band = StageBand::new(5).unwrap();
        for stage in MIN_STAGE..=MAX_STAGE {
            assert_eq!(band.stage_for(band.floor_of(stage)), stage);
        }
    }

    #[test]
    fn promote_moves_to_next_band() {
        let p = StageProgression::default();
        let update = p.promote(Tutor::Luna, TutorProgress::new(2, 1));
        assert_eq!(update.new, TutorProgress::new(6, 2));
        assert!(!update.is_punish);

        let capped = p.promote(Tutor::Luna, TutorProgress::new(40, 5));
        assert_eq!(capped.new, TutorProgress::new(40, 5));
    }

    #[test]
    fn promote_under_demote_policy_bumps_stage_only() {
        let cfg = ProgressionConfig::new(10, 10, StagePolicy::Demote).unwrap();
        let p = StageProgression::new(cfg);
        let update = p.promote(Tutor::Maria, TutorProgress::new(30, 2));
        assert_eq!(update.new, TutorProgress::new(30, 3));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert_eq!(
            ProgressionConfig::new(0, 5, StagePolicy::Banded),
            Err(StageError::InvalidIncrement)
        );
        assert_eq!(
            ProgressionConfig::new(1, 0, StagePolicy::Banded),
            Err(StageError::InvalidStep)
        );
    }

    fn outcome_strategy() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            Just(Outcome::Correct),
            Just(Outcome::Partial),
            Just(Outcome::Wrong),
            Just(Outcome::Omitted),
        ]
    }

    proptest! {
        #[test]
        fn banded_points_track_a_clamped_counter(
            outcomes in proptest::collection::vec(outcome_strategy(), 0..200)
        ) {
            let p = StageProgression::default();
            let mut model: i64 = 0;
            let mut state = TutorProgress::default();
            for outcome in outcomes {
                model = match outcome {
                    Outcome::Correct => model + 1,
                    Outcome::Partial => model,
                    Outcome::Wrong | Outcome::Omitted => (model - 1).max(0),
                };
                state = p.apply(Tutor::Stella, state, outcome).new;
                prop_assert!(model >= 0);
                prop_assert_eq!(i64::from(state.points), model);
                prop_assert_eq!(state.stage, p.stage_for_points(state.points));
            }
        }

        #[test]
        fn stage_stays_in_range_under_both_policies(
            outcomes in proptest::collection::vec(outcome_strategy(), 0..200),
            demote in any::<bool>(),
        ) {
            let policy = if demote { StagePolicy::Demote } else { StagePolicy::Banded };
            let p = StageProgression::new(ProgressionConfig::new(1, 5, policy).unwrap());
            let mut state = TutorProgress::default();
            for outcome in outcomes {
                state = p.apply(Tutor::Maria, state, outcome).new;
                prop_assert!((MIN_STAGE..=MAX_STAGE).contains(&state.stage));
            }
        }
    }
}
