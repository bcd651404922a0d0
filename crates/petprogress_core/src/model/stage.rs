//! Evolution stage ladder and its configuration resource.
//!
//! # Responsibility
//! - Define the ordered stage table consumed by the evolution engine.
//! - Parse and validate the `StageConfig.json` resource.
//! - Provide the built-in fallback table.
//!
//! # Invariants
//! - Stage indices are contiguous from 0.
//! - Exactly one stage is terminal and it is the last one.
//! - Every non-terminal stage requires at least 1 XP to advance.
//! - Loading never fails: any problem falls back to the built-in table.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const BUILTIN_STAGES: &[(&str, i64, &str)] = &[
    ("Frog", 10, "pet_frog"),
    ("Hermit Crab", 25, "pet_hermit"),
    ("Seahorse", 40, "pet_seahorse"),
    ("Dolphin", 55, "pet_dolphin"),
    ("Alligator", 75, "pet_alligator"),
    ("Beaver", 95, "pet_beaver"),
    ("Wolf", 120, "pet_wolf"),
    ("Bear", 145, "pet_bear"),
    ("Bison", 175, "pet_bison"),
    ("Elephant", 205, "pet_elephant"),
    ("Rhino", 240, "pet_rhino"),
    ("Baby", 285, "pet_baby"),
    ("Toddler", 335, "pet_toddler"),
    ("Adult", 390, "pet_adult"),
    ("CEO", 450, "pet_ceo"),
    ("Gold", 0, "pet_gold"),
];

/// One rung of the evolution ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub index: usize,
    pub name: String,
    /// XP required to leave this stage. Ignored for the terminal stage.
    #[serde(rename = "threshold")]
    pub threshold_xp: i64,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(rename = "asset")]
    pub asset_ref: String,
}

/// Validated, non-empty stage table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTable {
    stages: Vec<Stage>,
}

/// Stage configuration rejection reasons.
#[derive(Debug)]
pub enum StageConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Empty,
    NonContiguousIndex { position: usize, found: usize },
    MisplacedTerminal(usize),
    MissingTerminal,
    NonPositiveThreshold(usize),
}

impl Display for StageConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read stage config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse stage config: {err}"),
            Self::Empty => write!(f, "stage config contains no stages"),
            Self::NonContiguousIndex { position, found } => write!(
                f,
                "stage at position {position} has index {found}; indices must be contiguous from 0"
            ),
            Self::MisplacedTerminal(index) => {
                write!(f, "stage {index} is terminal but is not the last stage")
            }
            Self::MissingTerminal => write!(f, "last stage must be terminal"),
            Self::NonPositiveThreshold(index) => {
                write!(f, "non-terminal stage {index} must have threshold >= 1")
            }
        }
    }
}

impl Error for StageConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StageConfigDocument {
    Wrapped { stages: Vec<Stage> },
    Bare(Vec<Stage>),
}

impl StageTable {
    /// Validates an ordered stage list.
    pub fn new(stages: Vec<Stage>) -> Result<Self, StageConfigError> {
        if stages.is_empty() {
            return Err(StageConfigError::Empty);
        }
        let last = stages.len() - 1;
        for (position, stage) in stages.iter().enumerate() {
            if stage.index != position {
                return Err(StageConfigError::NonContiguousIndex {
                    position,
                    found: stage.index,
                });
            }
            if stage.is_terminal && position != last {
                return Err(StageConfigError::MisplacedTerminal(position));
            }
            if !stage.is_terminal && stage.threshold_xp < 1 {
                return Err(StageConfigError::NonPositiveThreshold(position));
            }
        }
        if !stages[last].is_terminal {
            return Err(StageConfigError::MissingTerminal);
        }
        Ok(Self { stages })
    }

    /// Parses the resource JSON.
    ///
    /// Accepts `{"stages": [...]}` or a bare array. When no stage declares
    /// `isTerminal`, the last one is marked terminal.
    pub fn from_json(raw: &str) -> Result<Self, StageConfigError> {
        let document: StageConfigDocument =
            serde_json::from_str(raw).map_err(StageConfigError::Parse)?;
        let mut stages = match document {
            StageConfigDocument::Wrapped { stages } => stages,
            StageConfigDocument::Bare(stages) => stages,
        };
        if !stages.iter().any(|stage| stage.is_terminal) {
            if let Some(last) = stages.last_mut() {
                last.is_terminal = true;
            }
        }
        Self::new(stages)
    }

    /// Loads the resource at `path`, falling back to the built-in table.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let parsed = std::fs::read_to_string(path)
            .map_err(StageConfigError::Io)
            .and_then(|raw| Self::from_json(raw.as_str()));
        match parsed {
            Ok(table) => {
                info!(
                    "event=stage_config_load module=stage status=ok stages={}",
                    table.len()
                );
                table
            }
            Err(err) => {
                warn!(
                    "event=stage_config_load module=stage status=fallback path={} error={}",
                    path.display(),
                    err
                );
                Self::builtin()
            }
        }
    }

    /// Built-in 16-stage ladder.
    pub fn builtin() -> Self {
        let last = BUILTIN_STAGES.len() - 1;
        let stages = BUILTIN_STAGES
            .iter()
            .enumerate()
            .map(|(index, (name, threshold, asset))| Stage {
                index,
                name: (*name).to_string(),
                threshold_xp: *threshold,
                is_terminal: index == last,
                asset_ref: (*asset).to_string(),
            })
            .collect();
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }

    /// Stage at `index`; out-of-range indices resolve to the last stage.
    pub fn stage(&self, index: usize) -> &Stage {
        let clamped = index.min(self.last_index());
        &self.stages[clamped]
    }

    pub fn threshold(&self, index: usize) -> i64 {
        self.stage(index).threshold_xp
    }

    pub fn is_terminal(&self, index: usize) -> bool {
        self.stage(index).is_terminal
    }

    pub fn name_for(&self, index: usize) -> &str {
        self.stage(index).name.as_str()
    }

    pub fn asset_for(&self, index: usize) -> &str {
        self.stage(index).asset_ref.as_str()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::{StageConfigError, StageTable};

    #[test]
    fn builtin_table_is_valid() {
        let table = StageTable::builtin();
        assert_eq!(table.len(), 16);
        assert_eq!(table.threshold(0), 10);
        assert!(table.is_terminal(15));
        assert!(!table.is_terminal(14));
        assert_eq!(table.asset_for(15), "pet_gold");
        assert_eq!(StageTable::new(table.stages().to_vec()).unwrap(), table);
    }

    #[test]
    fn shipped_resource_matches_builtin_table() {
        let shipped = StageTable::from_json(include_str!("../../resources/StageConfig.json"))
            .expect("shipped stage config should be valid");
        assert_eq!(shipped, StageTable::builtin());
    }

    #[test]
    fn out_of_range_lookup_clamps_to_last_stage() {
        let table = StageTable::builtin();
        assert_eq!(table.name_for(99), "Gold");
    }

    #[test]
    fn from_json_marks_last_stage_terminal_when_omitted() {
        let table = StageTable::from_json(
            r#"{"stages":[
                {"index":0,"name":"Egg","threshold":5,"asset":"pet_egg"},
                {"index":1,"name":"Chick","threshold":0,"asset":"pet_chick"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.is_terminal(1));
    }

    #[test]
    fn from_json_accepts_bare_array() {
        let table = StageTable::from_json(
            r#"[{"index":0,"name":"Egg","threshold":3,"asset":"a"},
                {"index":1,"name":"Hen","threshold":0,"asset":"b","isTerminal":true}]"#,
        )
        .unwrap();
        assert_eq!(table.last_index(), 1);
    }

    #[test]
    fn from_json_rejects_gaps_and_zero_thresholds() {
        let gap = StageTable::from_json(
            r#"[{"index":0,"name":"A","threshold":3,"asset":"a"},
                {"index":2,"name":"B","threshold":0,"asset":"b"}]"#,
        )
        .unwrap_err();
        assert!(matches!(
            gap,
            StageConfigError::NonContiguousIndex {
                position: 1,
                found: 2
            }
        ));

        let zero = StageTable::from_json(
            r#"[{"index":0,"name":"A","threshold":0,"asset":"a"},
                {"index":1,"name":"B","threshold":0,"asset":"b"}]"#,
        )
        .unwrap_err();
        assert!(matches!(zero, StageConfigError::NonPositiveThreshold(0)));
    }

    #[test]
    fn from_json_rejects_terminal_in_the_middle() {
        let err = StageTable::from_json(
            r#"[{"index":0,"name":"A","threshold":3,"asset":"a","isTerminal":true},
                {"index":1,"name":"B","threshold":0,"asset":"b"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, StageConfigError::MisplacedTerminal(0)));
    }

    #[test]
    fn load_or_default_falls_back_on_missing_or_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = StageTable::load_or_default(dir.path().join("absent.json"));
        assert_eq!(missing, StageTable::builtin());

        let corrupt = dir.path().join("StageConfig.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(StageTable::load_or_default(&corrupt), StageTable::builtin());
    }
}
