// 💾 Progress Persistence - resume where the customer left off
//
// Two independent snapshots under fixed keys:
// - progress: pets + position + pet count + timestamp
// - owner:    the shared owner record
//
// Values are JSON with dates as ISO strings. Storage is a SQLite
// key-value table in WAL mode; an in-memory store backs tests.

use crate::entities::{OwnerRecord, PetRecord};
use crate::gift::GiftEntitlement;
use crate::steps::{StepPosition, StepTag, Topology};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub const PROGRESS_KEY: &str = "pet_intake_progress";
pub const OWNER_KEY: &str = "pet_intake_owner";

// ============================================================================
// SNAPSHOTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub pets: Vec<PetRecord>,
    pub current_entity_index: usize,
    pub current_step: StepTag,
    pub entity_count: usize,
    #[serde(default = "default_topology")]
    pub topology: Topology,
    /// Present for gift flows so spliced portrait steps survive a reload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift: Option<GiftEntitlement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub portrait_targets: Vec<usize>,
    /// Last per-pet step visited, indexed like `pets`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_steps: Vec<Option<StepTag>>,
    pub saved_at: DateTime<Utc>,
}

fn default_topology() -> Topology {
    Topology::Normal
}

impl ProgressSnapshot {
    pub fn position(&self) -> StepPosition {
        StepPosition::new(self.current_step, self.current_entity_index)
    }

    /// Snapshots still sitting on the pet-count step carry nothing to resume
    pub fn is_resumable(&self) -> bool {
        self.current_step != StepTag::PetCount
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Durable key-value storage behind the flow
pub trait ProgressStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    fn load_progress(&self) -> Result<Option<ProgressSnapshot>> {
        match self.get(PROGRESS_KEY)? {
            Some(json) => {
                let snapshot = serde_json::from_str(&json).context("Failed to parse progress snapshot")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.set(PROGRESS_KEY, &json)
    }

    fn clear_progress(&self) -> Result<()> {
        self.remove(PROGRESS_KEY)
    }

    fn load_owner(&self) -> Result<Option<OwnerRecord>> {
        match self.get(OWNER_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json).context("Failed to parse owner snapshot")?)),
            None => Ok(None),
        }
    }

    fn save_owner(&self, owner: &OwnerRecord) -> Result<()> {
        let json = serde_json::to_string(owner)?;
        self.set(OWNER_KEY, &json)
    }

    fn clear_owner(&self) -> Result<()> {
        self.remove(OWNER_KEY)
    }
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteProgressStore {
    conn: Mutex<Connection>,
}

impl SqliteProgressStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open progress database: {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteProgressStore {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("progress database lock poisoned"))?;
        f(&conn)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases stay on "memory"
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

impl ProgressStore for SqliteProgressStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            debug!(key, bytes = value.len(), "stored");
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
            debug!(key, "removed");
            Ok(())
        })
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
pub struct MemoryProgressStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().map(|v| v.contains_key(key)).unwrap_or(false)
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{PetField, Sex, Species};
    use chrono::NaiveDate;

    fn sample_snapshot() -> ProgressSnapshot {
        let mut pet = PetRecord::empty();
        pet.apply(PetField::Name("Olive".to_string()));
        pet.apply(PetField::Species(Species::Rabbit));
        pet.apply(PetField::Sex(Sex::Female));
        pet.apply(PetField::DateOfOrigin(NaiveDate::from_ymd_opt(2021, 3, 14)));

        ProgressSnapshot {
            pets: vec![pet, PetRecord::empty()],
            current_entity_index: 1,
            current_step: StepTag::Species,
            entity_count: 2,
            topology: Topology::Normal,
            gift: None,
            portrait_targets: Vec::new(),
            last_steps: vec![Some(StepTag::Location), Some(StepTag::Species)],
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_sqlite_roundtrip_revives_dates() {
        let store = SqliteProgressStore::open_in_memory().unwrap();
        let snapshot = sample_snapshot();
        store.save_progress(&snapshot).unwrap();

        let raw = store.get(PROGRESS_KEY).unwrap().unwrap();
        assert!(raw.contains("\"2021-03-14\""), "dates stored as ISO strings");

        let loaded = store.load_progress().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.pets[0].date_of_origin, NaiveDate::from_ymd_opt(2021, 3, 14));
    }

    #[test]
    fn test_sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.db");

        {
            let store = SqliteProgressStore::open(&path).unwrap();
            store.save_progress(&sample_snapshot()).unwrap();
            store.save_owner(&OwnerRecord { name: "Ana".to_string(), ..OwnerRecord::default() }).unwrap();
        }

        let store = SqliteProgressStore::open(&path).unwrap();
        assert_eq!(store.load_progress().unwrap().unwrap().entity_count, 2);
        assert_eq!(store.load_owner().unwrap().unwrap().name, "Ana");
    }

    #[test]
    fn test_clear_progress_keeps_owner() {
        let store = MemoryProgressStore::new();
        store.save_progress(&sample_snapshot()).unwrap();
        store.save_owner(&OwnerRecord::default()).unwrap();

        store.clear_progress().unwrap();
        assert!(store.load_progress().unwrap().is_none());
        assert!(store.contains(OWNER_KEY));
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let store = MemoryProgressStore::new();
        store.set(PROGRESS_KEY, "{not json").unwrap();
        assert!(store.load_progress().is_err());
    }

    #[test]
    fn test_legacy_snapshot_without_topology() {
        let store = MemoryProgressStore::new();
        let json = r#"{"pets":[{"name":"Rex"}],"current_entity_index":0,"current_step":"breed","entity_count":1,"saved_at":"2025-01-01T00:00:00Z"}"#;
        store.set(PROGRESS_KEY, json).unwrap();

        let loaded = store.load_progress().unwrap().unwrap();
        assert_eq!(loaded.topology, Topology::Normal);
        assert!(loaded.last_steps.is_empty());
        assert_eq!(loaded.pets[0].name, "Rex");
        assert!(loaded.is_resumable());
    }
}
