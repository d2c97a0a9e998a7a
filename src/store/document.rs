//! JSON document backend, partitioned per user.
//!
//! Layout under the root directory:
//!
//! ```text
//! users.json                      account id -> user document id
//! users/<user-doc-id>/sessions.json
//! ```
//!
//! A user document id is assigned on first use and never changes afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{SessionStore, StoreError};
use crate::session::{SessionKind, SessionRecord};

const USER_INDEX: &str = "users.json";
const SESSIONS_FILE: &str = "sessions.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserIndex {
    accounts: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    user_doc_id: String,
    sessions: Vec<SessionRecord>,
    open: bool,
}

impl DocumentStore {
    pub fn open<P: AsRef<Path>>(root: P, account: &str) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let user_doc_id = ensure_user_doc_id(&root, account)?;
        let sessions_path = sessions_path(&root, &user_doc_id);
        let sessions = if sessions_path.exists() {
            serde_json::from_slice(&fs::read(&sessions_path)?)?
        } else {
            Vec::new()
        };

        Ok(Self {
            root,
            user_doc_id,
            sessions,
            open: true,
        })
    }

    pub fn user_doc_id(&self) -> &str {
        &self.user_doc_id
    }

    fn persist(&self) -> Result<(), StoreError> {
        let path = sessions_path(&self.root, &self.user_doc_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomically(&path, &serde_json::to_vec_pretty(&self.sessions)?)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }
}

impl SessionStore for DocumentStore {
    fn insert(
        &mut self,
        time: u64,
        blocks: u32,
        timestamp: &str,
        kind: SessionKind,
    ) -> Result<i64, StoreError> {
        self.ensure_open()?;
        let id = self.sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.sessions.push(SessionRecord {
            id,
            time,
            blocks,
            timestamp: timestamp.to_string(),
            kind,
        });

        if let Err(err) = self.persist() {
            // Keep memory in step with disk so a retry does not duplicate.
            self.sessions.pop();
            return Err(err);
        }
        Ok(id)
    }

    fn sessions_since(&self, cutoff: &DateTime<Utc>) -> Result<Vec<SessionRecord>, StoreError> {
        self.ensure_open()?;
        let mut found: Vec<(DateTime<Utc>, SessionRecord)> = self
            .sessions
            .iter()
            .filter_map(|record| {
                let at = record.logged_at()?.with_timezone(&Utc);
                (at >= *cutoff).then(|| (at, record.clone()))
            })
            .collect();
        found.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.id.cmp(&a.1.id)));
        Ok(found.into_iter().map(|(_, record)| record).collect())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.open = false;
        Ok(())
    }
}

/// Look up the document id for `account` without creating one.
pub fn lookup_user_doc_id(root: &Path, account: &str) -> Result<Option<String>, StoreError> {
    Ok(read_index(root)?.accounts.get(account).cloned())
}

fn ensure_user_doc_id(root: &Path, account: &str) -> Result<String, StoreError> {
    let mut index = read_index(root)?;
    if let Some(id) = index.accounts.get(account) {
        return Ok(id.clone());
    }

    let id = format!("user-{:04}", index.accounts.len() + 1);
    index.accounts.insert(account.to_string(), id.clone());
    write_atomically(&root.join(USER_INDEX), &serde_json::to_vec_pretty(&index)?)?;
    log::info!("assigned document {id} to account {account}");
    Ok(id)
}

fn read_index(root: &Path) -> Result<UserIndex, StoreError> {
    let path = root.join(USER_INDEX);
    if !path.exists() {
        return Ok(UserIndex::default());
    }
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

fn sessions_path(root: &Path, user_doc_id: &str) -> PathBuf {
    root.join("users").join(user_doc_id).join(SESSIONS_FILE)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
