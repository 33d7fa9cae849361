use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "FOOD_LOGBOOK_HOME";
pub const PUBLIC_URL_ENV: &str = "FOOD_LOGBOOK_PUBLIC_URL";

const SETTINGS_FILE: &str = "settings.json";
const DB_FILE: &str = "logbook.sqlite";
const PHOTO_DIR: &str = "photos";
const LOG_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogbookSettings {
    pub public_base_url: String,
    pub max_photo_bytes: u64,
    pub invalidation_capacity: usize,
}

impl Default for LogbookSettings {
    fn default() -> Self {
        Self {
            public_base_url: "/photos".to_string(),
            max_photo_bytes: 10 * 1024 * 1024,
            invalidation_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogbookConfig {
    pub data_dir: PathBuf,
    pub settings: LogbookSettings,
}

impl LogbookConfig {
    /// Defaults overlaid with `<data_dir>/settings.json` when that file exists.
    pub fn load(data_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let data_dir = data_dir.into();
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut merged = serde_json::to_value(LogbookSettings::default())?;
        if settings_path.is_file() {
            let raw = fs::read_to_string(&settings_path)?;
            let overrides: serde_json::Value = serde_json::from_str(&raw).map_err(|error| {
                AppError::Internal(format!("invalid {}: {}", settings_path.display(), error))
            })?;
            merge_json(&mut merged, overrides);
        }
        let settings: LogbookSettings = serde_json::from_value(merged).map_err(|error| {
            AppError::Internal(format!("invalid {}: {}", settings_path.display(), error))
        })?;

        Ok(Self { data_dir, settings })
    }

    pub fn from_env() -> AppResult<Self> {
        let data_dir = match std::env::var(HOME_ENV) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => default_data_dir()?,
        };
        let config = Self::load(data_dir)?;
        match std::env::var(PUBLIC_URL_ENV) {
            Ok(value) if !value.trim().is_empty() => Ok(config.with_public_base_url(value)),
            _ => Ok(config),
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.settings.public_base_url = url.into();
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn photo_dir(&self) -> PathBuf {
        self.data_dir.join(PHOTO_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

/// Current directory, falling back to the user's home.
pub fn default_data_dir() -> AppResult<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        return Ok(cwd);
    }

    #[cfg(unix)]
    {
        if let Ok(home) = std::env::var("HOME") {
            return Ok(PathBuf::from(home));
        }
    }

    #[cfg(windows)]
    {
        if let Ok(profile) = std::env::var("USERPROFILE") {
            return Ok(PathBuf::from(profile));
        }
    }

    Err(AppError::Internal("unable to determine a data directory".to_string()))
}
