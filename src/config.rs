use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::location::WatchOptions;
use crate::summary::DEFAULT_DATE_FORMAT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Options for the location watch opened by each session
    pub watch: WatchOptions,
    /// chrono format for the stored run date
    pub date_format: String,
    /// Overrides the default history database location
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch: WatchOptions::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            database_path: None,
        }
    }
}

impl Config {
    pub fn resolve_db_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("runlog_history.db"))
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("ignoring unreadable config {}: {}", self.path.display(), e);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
