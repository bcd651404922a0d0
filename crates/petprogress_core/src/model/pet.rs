//! Pet progression record.

use crate::model::day_key::DayKey;
use serde::{Deserialize, Serialize};

/// Persisted pet progression.
///
/// Mutated only through `PetEvolutionEngine`; `stage_xp` is signed so the
/// engine can express a pending deficit before `de_evolve` settles it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetState {
    pub stage_index: usize,
    #[serde(rename = "stageXP")]
    pub stage_xp: i64,
    /// Last day a closeout was applied for; `None` before the first closeout.
    #[serde(default)]
    pub last_closeout_day_key: Option<DayKey>,
}

impl PetState {
    /// Fresh installation state: first stage, no XP.
    pub fn new() -> Self {
        Self::default()
    }
}
