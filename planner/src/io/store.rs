//! Mission persistence.
//!
//! The [`MissionStore`] trait is the checkpoint seam used by the orchestrator.
//! [`FileMissionStore`] keeps one checkpoint document per mission
//! (`<data_dir>/missions/<id>.json`), validated against the bundled schema on
//! load and rebuilt through the checkpoint codec. [`MemoryMissionStore`] backs
//! tests and embedders that do not need durability.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use jsonschema::Validator;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::codec::{MissionState, decode_state, encode_state};
use crate::core::invariants::validate_invariants;
use crate::core::types::{Mission, MissionDescriptor};

const MISSION_SCHEMA: &str = include_str!("../../schemas/mission/v1.schema.json");

/// Lookup of an unknown mission id. Recover with `downcast_ref::<MissionNotFoundError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionNotFoundError {
    pub id: String,
}

impl fmt::Display for MissionNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mission '{}' not found", self.id)
    }
}

impl std::error::Error for MissionNotFoundError {}

/// Durable mission records keyed by id.
///
/// `update` is an idempotent full-state upsert, except that a mission deleted
/// through this store stays deleted: later updates from a run still in flight
/// are dropped. Implementations synchronize internally; each mission has a
/// single writer.
pub trait MissionStore: Send + Sync {
    fn create(&self, mission: &Mission) -> Result<()>;
    fn update(&self, mission: &Mission) -> Result<()>;
    fn get(&self, id: &str) -> Result<Mission>;
    /// All missions, newest first.
    fn list(&self) -> Result<Vec<MissionDescriptor>>;
    fn delete(&self, id: &str) -> Result<()>;
}

/// One JSON checkpoint file per mission.
#[derive(Debug, Clone)]
pub struct FileMissionStore {
    dir: PathBuf,
    deleted: Arc<Mutex<HashSet<String>>>,
}

impl FileMissionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("create directory {}", dir.display()))?;
        Ok(Self {
            dir,
            deleted: Arc::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_mission_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Read the raw checkpoint document for `id`.
    pub fn load_checkpoint(&self, id: &str) -> Result<Value> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(MissionNotFoundError { id: id.to_string() }.into());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("read checkpoint {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse checkpoint {}", path.display()))?;
        validate_checkpoint(&value).with_context(|| format!("validate {}", path.display()))?;
        Ok(value)
    }

    fn write(&self, mission: &Mission) -> Result<()> {
        let path = self.path_for(&mission.id)?;
        debug!(path = %path.display(), status = %mission.status, "writing checkpoint");
        let mut buf = serde_json::to_string_pretty(&encode_state(&MissionState::from(
            mission.clone(),
        )))?;
        buf.push('\n');
        super::write_atomic(&path, &buf)
    }
}

impl MissionStore for FileMissionStore {
    fn create(&self, mission: &Mission) -> Result<()> {
        let path = self.path_for(&mission.id)?;
        if path.exists() {
            return Err(anyhow!("mission '{}' already exists", mission.id));
        }
        self.write(mission)
    }

    fn update(&self, mission: &Mission) -> Result<()> {
        let deleted = lock_deleted(&self.deleted)?;
        if deleted.contains(&mission.id) {
            debug!(mission_id = %mission.id, "mission was deleted, dropping checkpoint");
            return Ok(());
        }
        self.write(mission)
    }

    fn get(&self, id: &str) -> Result<Mission> {
        let checkpoint = self.load_checkpoint(id)?;
        let mission = decode_state(Some(&checkpoint), &Mission::with_id(id, "")).mission;
        let violations = validate_invariants(&mission);
        if !violations.is_empty() {
            warn!(mission_id = %id, violations = ?violations, "checkpoint violates invariants");
        }
        Ok(mission)
    }

    fn list(&self) -> Result<Vec<MissionDescriptor>> {
        let mut missions = Vec::new();
        let entries =
            fs::read_dir(&self.dir).with_context(|| format!("read {}", self.dir.display()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match self.get(id) {
                Ok(mission) => missions.push(mission.descriptor()),
                Err(err) => {
                    warn!(path = %path.display(), error = %format!("{err:#}"), "skipping unreadable checkpoint");
                }
            }
        }
        sort_newest_first(&mut missions);
        Ok(missions)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        let mut deleted = lock_deleted(&self.deleted)?;
        if !path.exists() {
            return Err(MissionNotFoundError { id: id.to_string() }.into());
        }
        fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        deleted.insert(id.to_string());
        Ok(())
    }
}

/// In-memory store; checkpoints still pass through the codec.
#[derive(Debug, Default)]
pub struct MemoryMissionStore {
    checkpoints: Mutex<BTreeMap<String, Value>>,
    deleted: Mutex<HashSet<String>>,
}

impl MemoryMissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Value>>> {
        self.checkpoints
            .lock()
            .map_err(|_| anyhow!("mission store lock poisoned"))
    }
}

impl MissionStore for MemoryMissionStore {
    fn create(&self, mission: &Mission) -> Result<()> {
        let mut checkpoints = self.lock()?;
        if checkpoints.contains_key(&mission.id) {
            return Err(anyhow!("mission '{}' already exists", mission.id));
        }
        checkpoints.insert(
            mission.id.clone(),
            encode_state(&MissionState::from(mission.clone())),
        );
        Ok(())
    }

    fn update(&self, mission: &Mission) -> Result<()> {
        let mut checkpoints = self.lock()?;
        if lock_deleted(&self.deleted)?.contains(&mission.id) {
            debug!(mission_id = %mission.id, "mission was deleted, dropping checkpoint");
            return Ok(());
        }
        checkpoints.insert(
            mission.id.clone(),
            encode_state(&MissionState::from(mission.clone())),
        );
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Mission> {
        let checkpoints = self.lock()?;
        let checkpoint = checkpoints
            .get(id)
            .ok_or_else(|| MissionNotFoundError { id: id.to_string() })?;
        Ok(decode_state(Some(checkpoint), &Mission::with_id(id, "")).mission)
    }

    fn list(&self) -> Result<Vec<MissionDescriptor>> {
        let checkpoints = self.lock()?;
        let mut missions: Vec<MissionDescriptor> = checkpoints
            .iter()
            .map(|(id, checkpoint)| {
                decode_state(Some(checkpoint), &Mission::with_id(id.as_str(), ""))
                    .mission
                    .descriptor()
            })
            .collect();
        sort_newest_first(&mut missions);
        Ok(missions)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut checkpoints = self.lock()?;
        if checkpoints.remove(id).is_none() {
            return Err(MissionNotFoundError { id: id.to_string() }.into());
        }
        lock_deleted(&self.deleted)?.insert(id.to_string());
        Ok(())
    }
}

fn lock_deleted(deleted: &Mutex<HashSet<String>>) -> Result<MutexGuard<'_, HashSet<String>>> {
    deleted
        .lock()
        .map_err(|_| anyhow!("deleted-mission set lock poisoned"))
}

fn sort_newest_first(missions: &mut [MissionDescriptor]) {
    missions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Ids become file names: `[A-Za-z0-9._-]` only, no leading dot.
pub fn validate_mission_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(anyhow!("mission id must not be empty"));
    }
    if id.starts_with('.') {
        return Err(anyhow!("mission id must not start with '.'"));
    }
    if id
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'))
    {
        return Err(anyhow!("mission id must be [A-Za-z0-9._-] only (got '{id}')"));
    }
    Ok(())
}

fn validate_checkpoint(checkpoint: &Value) -> Result<()> {
    static VALIDATOR: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
        let schema: Value = serde_json::from_str(MISSION_SCHEMA).map_err(|err| err.to_string())?;
        jsonschema::validator_for(&schema).map_err(|err| err.to_string())
    });
    let validator = VALIDATOR
        .as_ref()
        .map_err(|err| anyhow!("invalid mission schema: {err}"))?;
    let messages: Vec<String> = validator
        .iter_errors(checkpoint)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "checkpoint schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MissionStatus;
    use chrono::Duration;

    fn sample(goal: &str) -> Mission {
        let mut mission = Mission::new(goal);
        mission.plan = vec!["one".to_string(), "two".to_string()];
        mission.status = MissionStatus::Executing;
        mission.record_step("one".to_string(), "ok".to_string());
        mission
    }

    #[test]
    fn file_store_round_trips_missions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMissionStore::new(temp.path().join("missions")).expect("store");
        let mission = sample("goal");
        store.create(&mission).expect("create");
        assert_eq!(store.get(&mission.id).expect("get"), mission);
    }

    #[test]
    fn file_store_create_rejects_duplicates_and_update_upserts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMissionStore::new(temp.path()).expect("store");
        let mut mission = sample("goal");
        store.create(&mission).expect("create");
        assert!(store.create(&mission).is_err());

        mission.record_step("two".to_string(), "ok".to_string());
        store.update(&mission).expect("update");
        store.update(&mission).expect("update again");
        assert_eq!(store.get(&mission.id).expect("get").current_step_index, 2);
    }

    #[test]
    fn file_store_lists_newest_first_and_deletes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMissionStore::new(temp.path()).expect("store");
        let older = sample("older");
        let mut newer = sample("newer");
        newer.created_at = older.created_at + Duration::seconds(5);
        store.create(&older).expect("create older");
        store.create(&newer).expect("create newer");
        fs::write(temp.path().join("notes.txt"), "ignored").expect("write stray file");

        let goals: Vec<String> = store
            .list()
            .expect("list")
            .into_iter()
            .map(|m| m.goal)
            .collect();
        assert_eq!(goals, vec!["newer", "older"]);

        store.delete(&older.id).expect("delete");
        let err = store.delete(&older.id).unwrap_err();
        assert!(err.downcast_ref::<MissionNotFoundError>().is_some());
        assert_eq!(store.list().expect("list").len(), 1);
    }

    #[test]
    fn deleted_missions_are_not_brought_back_by_updates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file_store = FileMissionStore::new(temp.path()).expect("store");
        let memory_store = MemoryMissionStore::new();
        let stores: [&dyn MissionStore; 2] = [&file_store, &memory_store];
        for store in stores {
            let mut mission = sample("goal");
            store.create(&mission).expect("create");
            store.delete(&mission.id).expect("delete");

            mission.record_step("two".to_string(), "ok".to_string());
            store.update(&mission).expect("late update");
            let err = store.get(&mission.id).unwrap_err();
            assert!(err.downcast_ref::<MissionNotFoundError>().is_some());
            assert!(store.list().expect("list").is_empty());

            let fresh = sample("never created");
            store.update(&fresh).expect("upsert");
            assert_eq!(store.get(&fresh.id).expect("get"), fresh);
            store.delete(&fresh.id).expect("cleanup");
        }
    }

    #[test]
    fn file_store_rejects_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMissionStore::new(temp.path()).expect("store");
        fs::write(
            temp.path().join("bad.json"),
            "{\"version\": 1, \"mission\": {\"plan\": \"not a list\"}}",
        )
        .expect("write");
        let err = store.get("bad").unwrap_err();
        assert!(format!("{err:#}").contains("schema validation failed"));
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn rejects_path_like_ids() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileMissionStore::new(temp.path()).expect("store");
        assert!(store.get("../etc/passwd").is_err());
        assert!(store.get(".hidden").is_err());
    }

    #[test]
    fn memory_store_mirrors_file_store() {
        let store = MemoryMissionStore::new();
        let mission = sample("goal");
        store.create(&mission).expect("create");
        assert_eq!(store.get(&mission.id).expect("get"), mission);
        assert_eq!(store.list().expect("list").len(), 1);
        store.delete(&mission.id).expect("delete");
        let err = store.get(&mission.id).unwrap_err();
        assert!(err.downcast_ref::<MissionNotFoundError>().is_some());
    }
}
