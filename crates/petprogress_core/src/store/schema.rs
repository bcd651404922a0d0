//! Wire encoding and version upgrades of the persisted `AppState` record.
//!
//! # Responsibility
//! - Encode/decode the single JSON blob.
//! - Upgrade older records in place, one registered step per version.
//!
//! # Invariants
//! - Upgrade steps are registered in strictly increasing version order.
//! - A record newer than `CURRENT_SCHEMA_VERSION` is never decoded lossy.
//! - A malformed record decodes to a fresh default, never an error.

use crate::model::state::{clamp_grace_minutes, AppState, CURRENT_SCHEMA_VERSION};
use crate::store::{StoreError, StoreResult};
use log::warn;
use serde_json::{json, Map, Value};

type RecordObject = Map<String, Value>;

#[derive(Debug, Clone, Copy)]
struct RecordMigration {
    version: u32,
    apply: fn(&mut RecordObject),
}

const RECORD_MIGRATIONS: &[RecordMigration] = &[
    RecordMigration {
        version: 2,
        apply: add_series_and_overrides,
    },
    RecordMigration {
        version: 3,
        apply: add_completions_and_settings,
    },
];

/// How a loaded record was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing stored yet.
    Fresh,
    /// Stored record was already current.
    Current,
    /// Stored record was upgraded from `from`; it must be re-saved.
    Upgraded { from: u32 },
    /// Stored record was unreadable and replaced by a default.
    Recovered,
}

/// Decoded record plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub state: AppState,
    pub outcome: LoadOutcome,
}

/// Returns the latest record version known by this binary.
pub fn latest_version() -> u32 {
    RECORD_MIGRATIONS
        .last()
        .map_or(CURRENT_SCHEMA_VERSION, |migration| migration.version)
}

pub fn encode_state(state: &AppState) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(state).map_err(StoreError::Serialize)
}

/// Decodes a stored blob, upgrading it when older than current.
pub fn decode_state(raw: &[u8]) -> StoreResult<Decoded> {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(err) => return Ok(recovered(&format!("invalid json: {err}"))),
    };
    let Value::Object(mut record) = value else {
        return Ok(recovered("record is not a json object"));
    };

    let stored_version = match record.get("schemaVersion") {
        None => 1,
        Some(raw_version) => match raw_version.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(version) => version,
            None => return Ok(recovered("schemaVersion is not an unsigned integer")),
        },
    };
    let latest = latest_version();
    if stored_version > latest {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: stored_version,
            latest_supported: latest,
        });
    }

    if stored_version < latest {
        upgrade(&mut record, stored_version);
    }

    match serde_json::from_value::<AppState>(Value::Object(record)) {
        Ok(state) => Ok(Decoded {
            state,
            outcome: if stored_version < latest {
                LoadOutcome::Upgraded {
                    from: stored_version,
                }
            } else {
                LoadOutcome::Current
            },
        }),
        Err(err) => Ok(recovered(&format!("record shape rejected: {err}"))),
    }
}

fn upgrade(record: &mut RecordObject, from: u32) {
    for migration in RECORD_MIGRATIONS {
        if migration.version <= from {
            continue;
        }
        (migration.apply)(record);
        record.insert("schemaVersion".to_string(), json!(migration.version));
    }

    let grace = record
        .get("graceMinutes")
        .and_then(Value::as_i64)
        .map(clamp_grace_minutes);
    if let Some(grace) = grace {
        record.insert("graceMinutes".to_string(), json!(grace));
    }
}

fn add_series_and_overrides(record: &mut RecordObject) {
    record.entry("series").or_insert_with(|| json!([]));
    record.entry("overrides").or_insert_with(|| json!([]));
}

fn add_completions_and_settings(record: &mut RecordObject) {
    record.entry("completions").or_insert_with(|| json!({}));
    record.entry("rolloverEnabled").or_insert(json!(false));
    record
        .entry("resetTime")
        .or_insert_with(|| json!({"hour": 0, "minute": 0}));
}

fn recovered(reason: &str) -> Decoded {
    warn!("event=state_decode module=store status=fallback reason={reason}");
    Decoded {
        state: AppState::default(),
        outcome: LoadOutcome::Recovered,
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_state, encode_state, latest_version, LoadOutcome};
    use crate::model::state::{AppState, CURRENT_SCHEMA_VERSION};
    use crate::store::StoreError;

    #[test]
    fn latest_version_matches_state_constant() {
        assert_eq!(latest_version(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn current_record_decodes_unchanged() {
        let state = AppState::default();
        let decoded = decode_state(&encode_state(&state).unwrap()).unwrap();
        assert_eq!(decoded.outcome, LoadOutcome::Current);
        assert_eq!(decoded.state, state);
    }

    #[test]
    fn garbage_recovers_to_default() {
        for raw in [&b"{ nope"[..], &b"[1,2,3]"[..], &br#"{"schemaVersion":"x"}"#[..]] {
            let decoded = decode_state(raw).unwrap();
            assert_eq!(decoded.outcome, LoadOutcome::Recovered);
            assert_eq!(decoded.state, AppState::default());
        }
    }

    #[test]
    fn newer_record_is_refused() {
        let err = decode_state(br#"{"schemaVersion": 99}"#).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedSchemaVersion {
                found: 99,
                latest_supported: 3
            }
        ));
    }

    #[test]
    fn version_one_record_is_upgraded_and_clamped() {
        let legacy = serde_json::json!({
            "tasks": [],
            "pet": {"stageIndex": 2, "stageXP": 7},
            "graceMinutes": 400
        });
        let decoded = decode_state(legacy.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.outcome, LoadOutcome::Upgraded { from: 1 });
        assert_eq!(decoded.state.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(decoded.state.grace_minutes, 180);
        assert_eq!(decoded.state.pet.stage_index, 2);
        assert_eq!(decoded.state.pet.last_closeout_day_key, None);
        assert!(decoded.state.series.is_empty());
        assert!(decoded.state.completions.is_empty());
    }
}
