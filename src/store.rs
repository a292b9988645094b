// 💾 Canon Store - Versioned snapshots in SQLite
//
// Each save appends a full JSON snapshot of the registry and the timeline.
// Snapshots are content-addressed: saving an unchanged state is a no-op.
// Nothing is ever updated in place, so `history` is an audit trail.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

use crate::registry::{Entity, EntityRegistry, RegistrySnapshot};
use crate::timeline::{TimelineAnchor, TimelineManager, TimelineSnapshot};

// ============================================================================
// CANON STATE
// ============================================================================

/// Everything a project knows about its world at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonState {
    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default)]
    pub anchors: Vec<TimelineAnchor>,
}

impl CanonState {
    pub fn capture(registry: &EntityRegistry, timeline: &TimelineManager) -> Self {
        CanonState {
            entities: registry.all().to_vec(),
            anchors: timeline.all().to_vec(),
        }
    }

    /// Rebuild live stores. The timeline gets the default `TimelineConfig`.
    pub fn restore(self) -> crate::Result<(EntityRegistry, TimelineManager)> {
        let registry = EntityRegistry::from_snapshot(RegistrySnapshot {
            entities: self.entities,
        })?;
        let timeline = TimelineManager::from_snapshot(TimelineSnapshot {
            anchors: self.anchors,
        })?;
        Ok((registry, timeline))
    }

    /// SHA-256 over the serialized state
    pub fn content_hash(&self) -> Result<String> {
        let json = serde_json::to_string(self).context("Failed to serialize canon state")?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ============================================================================
// SNAPSHOT METADATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Stable identity (UUID v4)
    pub snapshot_id: String,
    pub project: String,
    pub content_hash: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(SnapshotInfo),

    /// Latest snapshot already holds this exact state
    Unchanged,
}

// ============================================================================
// CANON STORE
// ============================================================================

pub struct CanonStore {
    conn: Connection,
}

impl CanonStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open canon database: {:?}", path.as_ref()))?;
        CanonStore::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory canon database")?;
        CanonStore::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_schema(&conn)?;
        Ok(CanonStore { conn })
    }

    /// Append a snapshot of `state` for `project`, unless it matches the latest one
    pub fn save(&self, project: &str, state: &CanonState) -> Result<SaveOutcome> {
        let content_hash = state.content_hash()?;

        let latest: Option<String> = self
            .conn
            .query_row(
                "SELECT content_hash FROM canon_snapshots
                 WHERE project = ?1
                 ORDER BY id DESC LIMIT 1",
                params![project],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read latest snapshot hash")?;

        if latest.as_deref() == Some(content_hash.as_str()) {
            debug!("Canon state for {} unchanged ({})", project, &content_hash[..12]);
            return Ok(SaveOutcome::Unchanged);
        }

        let info = SnapshotInfo {
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            project: project.to_string(),
            content_hash,
            saved_at: Utc::now(),
        };
        let state_json = serde_json::to_string(state).context("Failed to serialize canon state")?;

        self.conn
            .execute(
                "INSERT INTO canon_snapshots (
                    snapshot_id, project, content_hash, state, saved_at
                ) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    info.snapshot_id,
                    info.project,
                    info.content_hash,
                    state_json,
                    info.saved_at.to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to save canon snapshot for {}", project))?;

        info!(
            "Saved canon snapshot {} for {}: {} entities, {} anchors",
            info.snapshot_id,
            project,
            state.entities.len(),
            state.anchors.len()
        );
        Ok(SaveOutcome::Saved(info))
    }

    /// Latest saved state for `project`
    pub fn load(&self, project: &str) -> Result<Option<CanonState>> {
        let state_json: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM canon_snapshots
                 WHERE project = ?1
                 ORDER BY id DESC LIMIT 1",
                params![project],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to load canon snapshot for {}", project))?;

        match state_json {
            Some(json) => {
                let state = serde_json::from_str(&json).context("Corrupt canon snapshot JSON")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Snapshot metadata for `project`, newest first
    pub fn history(&self, project: &str) -> Result<Vec<SnapshotInfo>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT snapshot_id, project, content_hash, saved_at
                 FROM canon_snapshots
                 WHERE project = ?1
                 ORDER BY id DESC",
            )
            .context("Failed to prepare snapshot history query")?;

        let snapshots = stmt
            .query_map(params![project], |row| {
                let saved_at: String = row.get(3)?;
                Ok(SnapshotInfo {
                    snapshot_id: row.get(0)?,
                    project: row.get(1)?,
                    content_hash: row.get(2)?,
                    saved_at: DateTime::parse_from_rfc3339(&saved_at)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?
                        .with_timezone(&Utc),
                })
            })
            .with_context(|| format!("Failed to query snapshot history for {}", project))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read snapshot history for {}", project))?;

        Ok(snapshots)
    }
}

fn setup_schema(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory"
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("Canon database journal mode: {}", mode);

    conn.execute(
        "CREATE TABLE IF NOT EXISTS canon_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id TEXT UNIQUE NOT NULL,
            project TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            state TEXT NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_project ON canon_snapshots(project)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
