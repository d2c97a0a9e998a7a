use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::format::TimeFormat;
use crate::store::{StoreBackend, StoreSettings};
use crate::timer::DurationSettings;

pub const DEFAULT_ACCOUNT: &str = "local";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub study_secs: u64,
    pub break_secs: u64,
    pub min_study_secs: u64,
    pub min_break_secs: u64,
    pub study_step_secs: u64,
    pub break_step_secs: u64,
    pub time_format: TimeFormat,
    pub backend: StoreBackend,
    pub account: Option<String>,
    pub data_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let durations = DurationSettings::default();
        Self {
            study_secs: durations.study_secs,
            break_secs: durations.break_secs,
            min_study_secs: durations.min_study_secs,
            min_break_secs: durations.min_break_secs,
            study_step_secs: durations.study_step_secs,
            break_step_secs: durations.break_step_secs,
            time_format: TimeFormat::Full,
            backend: StoreBackend::Sqlite,
            account: None,
            data_path: None,
        }
    }
}

impl Config {
    pub fn durations(&self) -> DurationSettings {
        DurationSettings {
            study_secs: self.study_secs,
            break_secs: self.break_secs,
            min_study_secs: self.min_study_secs,
            min_break_secs: self.min_break_secs,
            study_step_secs: self.study_step_secs,
            break_step_secs: self.break_step_secs,
        }
        .sanitized()
    }

    /// Resolve the storage location, preferring an explicit `data_path`.
    pub fn store_settings(&self) -> StoreSettings {
        let default_path = match self.backend {
            StoreBackend::Sqlite => AppDirs::db_path(),
            StoreBackend::Document => AppDirs::documents_dir(),
        };
        let path = self
            .data_path
            .clone()
            .or(default_path)
            .unwrap_or_else(|| match self.backend {
                StoreBackend::Sqlite => PathBuf::from("studytime_sessions.db"),
                StoreBackend::Document => PathBuf::from("studytime_documents"),
            });

        StoreSettings {
            backend: self.backend,
            path,
            account: self
                .account
                .clone()
                .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string()),
        }
    }
}

/// Read-only: settings changed in the UI last for one run and are never written back.
pub trait ConfigStore {
    fn load(&self) -> Config;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("studytime_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return Config::default(),
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!(
                    "ignoring unreadable config {}: {err}",
                    self.path.display()
                );
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = Config::default();
        fs::write(&path, serde_json::to_vec_pretty(&cfg).unwrap()).unwrap();
        assert_eq!(cfg, FileConfigStore::with_path(&path).load());
    }

    #[test]
    fn missing_or_corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Config::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{ "study_secs": 3000, "backend": "document" }"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.study_secs, 3000);
        assert_eq!(cfg.backend, StoreBackend::Document);
        assert_eq!(cfg.break_secs, 300);
        assert_eq!(cfg.time_format, TimeFormat::Full);
    }

    #[test]
    fn store_settings_prefer_explicit_path_and_default_account() {
        let cfg = Config {
            data_path: Some(PathBuf::from("/tmp/elsewhere.db")),
            ..Config::default()
        };
        let settings = cfg.store_settings();
        assert_eq!(settings.path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(settings.account, DEFAULT_ACCOUNT);
    }

    #[test]
    fn durations_are_sanitized() {
        let cfg = Config {
            study_secs: 0,
            ..Config::default()
        };
        assert_eq!(cfg.durations().study_secs, 600);
    }

    #[test]
    fn short_configured_durations_are_lifted_to_floors() {
        let cfg = Config {
            study_secs: 60,
            break_secs: 10,
            ..Config::default()
        };
        let durations = cfg.durations();
        assert_eq!(durations.study_secs, cfg.min_study_secs);
        assert_eq!(durations.break_secs, cfg.min_break_secs);

        let lowered = Config {
            study_secs: 60,
            min_study_secs: 30,
            ..Config::default()
        };
        assert_eq!(lowered.durations().study_secs, 60);
    }
}
