use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hotkey::parse_shortcut;

const APP_DIR_NAME: &str = "remitfind";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to encode config: {0}")]
    Encode(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debounce_ms: u64,
    pub fetch_timeout_ms: u64,
    pub max_recent_searches: usize,
    pub popular_limit: usize,
    pub max_tracked_popular: usize,
    pub max_search_history: usize,
    pub open_shortcut: String,
    pub history_db_path: PathBuf,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            debounce_ms: 300,
            fetch_timeout_ms: 10_000,
            max_recent_searches: 10,
            popular_limit: 5,
            max_tracked_popular: 20,
            max_search_history: 100,
            open_shortcut: "Mod+K".to_string(),
            history_db_path: base.join("history.sqlite3"),
            config_path: base.join("config.json"),
        }
    }
}

impl Config {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    let root = std::env::var_os("APPDATA")
        .or_else(|| std::env::var_os("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
        })
        .unwrap_or_else(std::env::temp_dir);
    root.join(APP_DIR_NAME)
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    if cfg.debounce_ms > 5_000 {
        return Err("debounce_ms out of range".into());
    }

    if !(100..=120_000).contains(&cfg.fetch_timeout_ms) {
        return Err("fetch_timeout_ms out of range".into());
    }

    if !(1..=100).contains(&cfg.max_recent_searches) {
        return Err("max_recent_searches out of range".into());
    }

    if !(1..=50).contains(&cfg.popular_limit) {
        return Err("popular_limit out of range".into());
    }

    if cfg.max_tracked_popular < cfg.popular_limit {
        return Err("max_tracked_popular must be at least popular_limit".into());
    }

    if cfg.max_search_history == 0 {
        return Err("max_search_history must be positive".into());
    }

    parse_shortcut(&cfg.open_shortcut)?;

    if cfg.history_db_path.as_os_str().is_empty() {
        return Err("history_db_path is required".into());
    }

    Ok(())
}

/// Loads the config at `path` (or the default location). A missing file yields defaults.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Config::default().config_path);

    let mut cfg = match std::fs::read_to_string(&config_path) {
        Ok(raw) => parse(&config_path, &raw)?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_path,
                source,
            })
        }
    };
    cfg.config_path = config_path;

    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    let encoded = if is_toml(&cfg.config_path) {
        toml::to_string_pretty(cfg).map_err(|e| ConfigError::Encode(e.to_string()))?
    } else {
        serde_json::to_string_pretty(cfg).map_err(|e| ConfigError::Encode(e.to_string()))?
    };

    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(&cfg.config_path, encoded).map_err(|source| ConfigError::Write {
        path: cfg.config_path.clone(),
        source,
    })
}

fn parse(path: &Path, raw: &str) -> Result<Config, ConfigError> {
    let parsed = if is_toml(path) {
        toml::from_str::<Config>(raw).map_err(|e| e.to_string())
    } else {
        json5::from_str::<Config>(raw).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
