//! SQLite-backed node store.

use super::{NodeRecord, NodeStatus, NodeStore};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

struct Migration {
    version: &'static str,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: "001",
    name: "node_state",
    sql: include_str!("migrations/001_node_state.sql"),
}];

/// Node store persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteNodeStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNodeStore {
    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::store(format!(
                    "failed to create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        debug!(path = %path.display(), "Opened workflow state database");
        Ok(store)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be migrated.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::store("database lock poisoned"))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let applied: Vec<String> = {
            let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
            stmt.query_map([], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?
        };

        for migration in MIGRATIONS {
            if applied.iter().any(|v| v == migration.version) {
                continue;
            }
            conn.execute_batch(migration.sql)?;
            conn.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, Utc::now().to_rfc3339()],
            )?;
            info!(
                version = migration.version,
                name = migration.name,
                "Applied state migration"
            );
        }
        Ok(())
    }
}

struct RawRecord {
    workflow_id: String,
    node: String,
    status: String,
    attempts: u32,
    error: Option<String>,
    run_id: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        workflow_id: row.get(0)?,
        node: row.get(1)?,
        status: row.get(2)?,
        attempts: row.get(3)?,
        error: row.get(4)?,
        run_id: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl TryFrom<RawRecord> for NodeRecord {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let run_id = Uuid::parse_str(&raw.run_id)
            .map_err(|e| Error::store(format!("invalid run id '{}': {e}", raw.run_id)))?;
        let updated_at = DateTime::parse_from_rfc3339(&raw.updated_at)
            .map_err(|e| Error::store(format!("invalid timestamp '{}': {e}", raw.updated_at)))?
            .with_timezone(&Utc);
        Ok(Self {
            workflow_id: raw.workflow_id,
            node: raw.node,
            status: raw.status.parse::<NodeStatus>()?,
            attempts: raw.attempts,
            error: raw.error,
            run_id,
            updated_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT workflow_id, node, status, attempts, error, run_id, updated_at FROM node_state";

impl NodeStore for SqliteNodeStore {
    fn get(&self, workflow_id: &str, node: &str) -> Result<Option<NodeRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE workflow_id = ?1 AND node = ?2"),
                params![workflow_id, node],
                read_row,
            )
            .optional()?;
        raw.map(NodeRecord::try_from).transpose()
    }

    fn put(&self, record: &NodeRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO node_state
                (workflow_id, node, status, attempts, error, run_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.workflow_id,
                record.node,
                record.status.to_string(),
                record.attempts,
                record.error,
                record.run_id.to_string(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list(&self, workflow_id: &str) -> Result<Vec<NodeRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE workflow_id = ?1 ORDER BY node"
        ))?;
        let rows = stmt
            .query_map(params![workflow_id], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(NodeRecord::try_from).collect()
    }
}
