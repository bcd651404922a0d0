//! Pet stage-transition state machine.
//!
//! # Responsibility
//! - Convert check/miss/closeout events into XP deltas.
//! - Move the pet up and down the stage ladder.
//!
//! # Invariants
//! - `stage_index` stays within the table; the terminal stage is absorbing.
//! - After any public operation `stage_xp >= 0`.
//! - Evolving resets XP to 0 on every step: overflow is discarded.
//! - De-evolving lands just under the lower stage's threshold, consuming the
//!   remaining deficit.
//! - No operation can fail; bad inputs are clamped.

use crate::model::day_key::DayKey;
use crate::model::pet::PetState;
use crate::model::stage::StageTable;

/// Stage index from which every check earns one extra XP.
pub const VETERAN_STAGE_CUTOFF: usize = 10;

const ON_TIME_CHECK_XP: i64 = 2;
const LATE_CHECK_XP: i64 = 1;
const VETERAN_BONUS_XP: i64 = 1;
const MISS_PENALTY_XP: i64 = 2;
const MILD_MORALE_PENALTY_XP: i64 = 1;
const SEVERE_MORALE_PENALTY_XP: i64 = 3;
const STRONG_DAY_BONUS_XP: i64 = 3;

/// Before/after summary of one engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetTransition {
    pub before: PetState,
    pub after: PetState,
    /// `false` only for a repeated closeout that was ignored.
    pub applied: bool,
}

impl PetTransition {
    pub fn evolved(&self) -> bool {
        self.after.stage_index > self.before.stage_index
    }

    pub fn devolved(&self) -> bool {
        self.after.stage_index < self.before.stage_index
    }
}

/// Stateless engine bound to one stage table.
#[derive(Debug, Clone, Default)]
pub struct PetEvolutionEngine {
    stages: StageTable,
}

impl PetEvolutionEngine {
    pub fn new(stages: StageTable) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &StageTable {
        &self.stages
    }

    /// Task checked off; `on_time` when inside its grace window.
    pub fn on_check(&self, pet: &mut PetState, on_time: bool) -> PetTransition {
        let before = pet.clone();
        self.normalize(pet);
        pet.stage_xp += if on_time {
            ON_TIME_CHECK_XP
        } else {
            LATE_CHECK_XP
        };
        if pet.stage_index >= VETERAN_STAGE_CUTOFF {
            pet.stage_xp += VETERAN_BONUS_XP;
        }
        self.evolve(pet);
        transition(before, pet)
    }

    /// Task skipped or missed.
    pub fn on_miss(&self, pet: &mut PetState) -> PetTransition {
        let before = pet.clone();
        self.normalize(pet);
        pet.stage_xp -= MISS_PENALTY_XP;
        self.de_evolve(pet);
        transition(before, pet)
    }

    /// End-of-day settlement; ignored when `day_key` was already closed.
    pub fn on_daily_closeout(
        &self,
        pet: &mut PetState,
        completed: i64,
        missed: i64,
        total: i64,
        day_key: DayKey,
    ) -> PetTransition {
        let before = pet.clone();
        if pet.last_closeout_day_key == Some(day_key) {
            return PetTransition {
                after: before.clone(),
                before,
                applied: false,
            };
        }
        self.normalize(pet);

        let completed = completed.max(0);
        let missed = missed.max(0);
        let total = total.max(0).max(completed.saturating_add(missed));

        pet.stage_xp -= missed;
        pet.stage_xp += morale_adjustment(completed, missed, total);
        pet.last_closeout_day_key = Some(day_key);

        self.evolve(pet);
        self.de_evolve(pet);
        transition(before, pet)
    }

    /// Advances while the current threshold is met. Each step resets XP to 0.
    pub fn evolve(&self, pet: &mut PetState) {
        while !self.stages.is_terminal(pet.stage_index)
            && pet.stage_xp >= self.stages.threshold(pet.stage_index)
        {
            pet.stage_index += 1;
            pet.stage_xp = 0;
        }
    }

    /// Steps down while XP is negative, then clamps at stage 0.
    pub fn de_evolve(&self, pet: &mut PetState) {
        while pet.stage_xp < 0 && pet.stage_index > 0 {
            pet.stage_index -= 1;
            pet.stage_xp = (self.stages.threshold(pet.stage_index) - 1 + pet.stage_xp).max(0);
        }
        if pet.stage_index == 0 && pet.stage_xp < 0 {
            pet.stage_xp = 0;
        }
    }

    /// Projection helpers for renderers.
    pub fn stage_name(&self, pet: &PetState) -> &str {
        self.stages.name_for(pet.stage_index)
    }

    pub fn stage_asset(&self, pet: &PetState) -> &str {
        self.stages.asset_for(pet.stage_index)
    }

    /// Fraction of the current threshold earned, `1.0` at the terminal stage.
    pub fn progress(&self, pet: &PetState) -> f64 {
        if self.stages.is_terminal(pet.stage_index) {
            return 1.0;
        }
        let threshold = self.stages.threshold(pet.stage_index).max(1);
        (pet.stage_xp.max(0) as f64 / threshold as f64).min(1.0)
    }

    fn normalize(&self, pet: &mut PetState) {
        pet.stage_index = pet.stage_index.min(self.stages.last_index());
        pet.stage_xp = pet.stage_xp.max(0);
    }
}

/// Ratio bonus/penalty. Integer comparisons avoid float rounding at the edges.
fn morale_adjustment(completed: i64, missed: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    if missed * 5 >= total * 3 {
        -SEVERE_MORALE_PENALTY_XP
    } else if missed * 2 > total {
        -MILD_MORALE_PENALTY_XP
    } else if completed * 5 >= total * 4 {
        STRONG_DAY_BONUS_XP
    } else {
        0
    }
}

fn transition(before: PetState, after: &PetState) -> PetTransition {
    PetTransition {
        before,
        after: after.clone(),
        applied: true,
    }
}

#[cfg(test)]
mod tests {
    use super::{morale_adjustment, PetEvolutionEngine, VETERAN_STAGE_CUTOFF};
    use crate::model::day_key::DayKey;
    use crate::model::pet::PetState;
    use crate::model::stage::StageTable;

    fn engine() -> PetEvolutionEngine {
        PetEvolutionEngine::new(StageTable::builtin())
    }

    fn pet(stage_index: usize, stage_xp: i64) -> PetState {
        PetState {
            stage_index,
            stage_xp,
            last_closeout_day_key: None,
        }
    }

    #[test]
    fn on_time_check_crosses_threshold_and_discards_overflow() {
        let mut state = pet(0, 9);
        let transition = engine().on_check(&mut state, true);
        assert_eq!((state.stage_index, state.stage_xp), (1, 0));
        assert!(transition.evolved());
    }

    #[test]
    fn late_check_earns_one_point() {
        let mut state = pet(0, 3);
        engine().on_check(&mut state, false);
        assert_eq!(state.stage_xp, 4);
    }

    #[test]
    fn veteran_bonus_applies_from_cutoff() {
        let mut below = pet(VETERAN_STAGE_CUTOFF - 1, 0);
        let mut at = pet(VETERAN_STAGE_CUTOFF, 0);
        engine().on_check(&mut below, true);
        engine().on_check(&mut at, true);
        assert_eq!(below.stage_xp, 2);
        assert_eq!(at.stage_xp, 3);
    }

    #[test]
    fn five_misses_fall_back_to_first_stage() {
        let engine = engine();
        let mut state = pet(1, 0);
        for _ in 0..5 {
            engine.on_miss(&mut state);
        }
        assert_eq!((state.stage_index, state.stage_xp), (0, 0));
    }

    #[test]
    fn single_miss_lands_just_under_lower_threshold() {
        let mut state = pet(2, 0);
        let transition = engine().on_miss(&mut state);
        // threshold(1) = 25 -> 25 - 1 - 2
        assert_eq!((state.stage_index, state.stage_xp), (1, 22));
        assert!(transition.devolved());
    }

    #[test]
    fn terminal_stage_absorbs_checks() {
        let engine = engine();
        let last = engine.stages().last_index();
        let mut state = pet(last, 0);
        for _ in 0..1000 {
            engine.on_check(&mut state, true);
        }
        assert_eq!(state.stage_index, last);
        assert_eq!(engine.progress(&state), 1.0);
    }

    #[test]
    fn morale_thresholds() {
        assert_eq!(morale_adjustment(0, 0, 0), 0);
        assert_eq!(morale_adjustment(4, 6, 10), -3);
        assert_eq!(morale_adjustment(4, 5, 10), 0);
        assert_eq!(morale_adjustment(3, 6, 11), -1);
        assert_eq!(morale_adjustment(8, 2, 10), 3);
        assert_eq!(morale_adjustment(7, 3, 10), 0);
    }

    #[test]
    fn closeout_is_ignored_for_the_same_day() {
        let engine = engine();
        let day = DayKey::parse("2026-06-01").unwrap();
        let mut state = pet(3, 20);

        let first = engine.on_daily_closeout(&mut state, 1, 3, 4, day);
        assert!(first.applied);
        let after_first = state.clone();

        let second = engine.on_daily_closeout(&mut state, 0, 4, 4, day);
        assert!(!second.applied);
        assert_eq!(state, after_first);
    }

    #[test]
    fn closeout_clamps_negative_inputs() {
        let mut state = pet(0, 5);
        engine().on_daily_closeout(&mut state, -3, -1, -8, DayKey::parse("2026-06-01").unwrap());
        assert_eq!(state.stage_xp, 5);
    }

    #[test]
    fn strong_day_bonus_can_evolve() {
        let mut state = pet(0, 8);
        engine().on_daily_closeout(&mut state, 5, 0, 5, DayKey::parse("2026-06-01").unwrap());
        assert_eq!((state.stage_index, state.stage_xp), (1, 0));
    }
}
