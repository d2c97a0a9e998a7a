use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use super::{storage_timestamp, SessionStore, StoreError};
use crate::session::{SessionKind, SessionRecord};

const CREATE_SESSIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        time INTEGER NOT NULL,
        blocks INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        type TEXT NOT NULL
    )
"#;

/// Embedded relational store for the study log.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and its schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        Self::init(&conn)?;

        log::debug!("sqlite session store ready at {}", path.display());
        Ok(Self {
            conn: Some(conn),
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Some(conn),
            path: None,
        })
    }

    fn init(conn: &Connection) -> Result<(), StoreError> {
        conn.execute(CREATE_SESSIONS, [])?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_timestamp ON sessions(timestamp)",
            [],
        )?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }
}

impl SessionStore for SqliteStore {
    fn insert(
        &mut self,
        time: u64,
        blocks: u32,
        timestamp: &str,
        kind: SessionKind,
    ) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (time, blocks, timestamp, type) VALUES (?1, ?2, ?3, ?4)",
            params![time, blocks, timestamp, kind.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn sessions_since(&self, cutoff: &DateTime<Utc>) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, time, blocks, timestamp, type
            FROM sessions
            WHERE timestamp >= ?1
            ORDER BY timestamp DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map([storage_timestamp(cutoff)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, time, blocks, timestamp, kind) = row?;
            let kind = SessionKind::parse(&kind).ok_or_else(|| {
                StoreError::InvalidRecord(format!("session {id} has unknown type '{kind}'"))
            })?;
            records.push(SessionRecord {
                id,
                time,
                blocks,
                timestamp,
                kind,
            });
        }

        Ok(records)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| StoreError::Sqlite(err))?;
        }
        Ok(())
    }
}
