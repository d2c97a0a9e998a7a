//! Durable session storage.
//!
//! Both adapters keep the same append-only contract: a record is inserted once
//! and only ever read back; there is no update or delete path.

pub mod document;
pub mod sqlite;

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{SessionKind, SessionRecord};

pub use document::DocumentStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store is closed")]
    Closed,

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

pub trait SessionStore: Send {
    /// Append one record and return its id.
    fn insert(
        &mut self,
        time: u64,
        blocks: u32,
        timestamp: &str,
        kind: SessionKind,
    ) -> Result<i64, StoreError>;

    /// Records logged at or after `cutoff`, newest first.
    fn sessions_since(&self, cutoff: &DateTime<Utc>) -> Result<Vec<SessionRecord>, StoreError>;

    /// Release the underlying resource; later calls fail with `StoreError::Closed`.
    fn close(&mut self) -> Result<(), StoreError>;
}

impl SessionStore for Box<dyn SessionStore> {
    fn insert(
        &mut self,
        time: u64,
        blocks: u32,
        timestamp: &str,
        kind: SessionKind,
    ) -> Result<i64, StoreError> {
        (**self).insert(time, blocks, timestamp, kind)
    }

    fn sessions_since(&self, cutoff: &DateTime<Utc>) -> Result<Vec<SessionRecord>, StoreError> {
        (**self).sessions_since(cutoff)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        (**self).close()
    }
}

/// Canonical stored form: UTC, whole seconds, `Z` suffix. Keeping one shape
/// makes the text column order the same as time order.
pub fn storage_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Document,
}

/// Where and how to open the configured backend.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Database file for sqlite, root directory for documents.
    pub path: PathBuf,
    pub account: String,
}

pub fn open_store(settings: &StoreSettings) -> Result<Box<dyn SessionStore>, StoreError> {
    log::info!(
        "opening {} session store at {}",
        settings.backend,
        settings.path.display()
    );
    match settings.backend {
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&settings.path)?)),
        StoreBackend::Document => Ok(Box::new(DocumentStore::open(
            &settings.path,
            &settings.account,
        )?)),
    }
}
