use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::rollup::{
    RollupOptions, DEFAULT_MIN_PHON_COUNT, DEFAULT_MIN_WORD_COUNT, DEFAULT_WINDOW_DAYS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Rows shown per trouble table in the text report
pub const DEFAULT_TOP: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window_days: usize,
    pub min_word_count: u64,
    pub min_phon_count: u64,
    pub top: usize,
    pub history_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            min_word_count: DEFAULT_MIN_WORD_COUNT,
            min_phon_count: DEFAULT_MIN_PHON_COUNT,
            top: DEFAULT_TOP,
            history_path: None,
        }
    }
}

impl Config {
    pub fn rollup_options(&self) -> RollupOptions {
        RollupOptions {
            window_days: self.window_days,
            min_word_count: self.min_word_count,
            min_phon_count: self.min_phon_count,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path().unwrap_or_else(|| PathBuf::from("elocute_config.json")),
        }
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
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
