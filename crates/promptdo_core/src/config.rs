//! Application configuration.
//!
//! # Responsibility
//! - Resolve the data directory and derived paths (database, logs).
//! - Load `config.json` from the data directory when present.
//! - Apply environment overrides on top of file values.
//!
//! # Invariants
//! - Missing config file is not an error; defaults apply.
//! - A missing API key is only reported when an AI operation runs.

use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DB_FILE_NAME: &str = "promptdo.sqlite3";
const APP_DIR_NAME: &str = "promptdo";
const LOG_DIR_NAME: &str = "logs";

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "API_KEY";
pub const ENV_DATA_DIR: &str = "PROMPTDO_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "PROMPTDO_LOG_LEVEL";
pub const ENV_BASE_URL: &str = "PROMPTDO_GEMINI_BASE_URL";

/// Gemini endpoint, model and voice selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub subtask_model: String,
    pub research_model: String,
    pub speech_model: String,
    pub voice: String,
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            subtask_model: "gemini-2.5-pro".to_string(),
            research_model: "gemini-2.5-flash".to_string(),
            speech_model: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Kore".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Resolved at load time; not read from the file.
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub log_level: Option<String>,
    pub gemini: GeminiSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: None,
            gemini: GeminiSettings::default(),
        }
    }
}

/// Configuration load failure.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

impl AppConfig {
    /// Loads configuration using process environment variables.
    ///
    /// `data_dir` overrides both the environment and the platform default.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(data_dir, |key| std::env::var(key).ok())
    }

    /// Loads configuration with an injectable environment lookup.
    pub fn load_with<F>(data_dir: Option<PathBuf>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = data_dir
            .or_else(|| non_blank(env(ENV_DATA_DIR)).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        let mut config = Self::read_file(&data_dir)?;
        config.data_dir = data_dir;
        config.apply_env(env);
        Ok(config)
    }

    fn read_file(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("event=config_load module=config status=default reason=no_file");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        let config =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
        debug!("event=config_load module=config status=ok");
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = non_blank(env(ENV_API_KEY)).or_else(|| non_blank(env(ENV_API_KEY_FALLBACK)))
        {
            self.gemini.api_key = Some(key);
        }
        if let Some(level) = non_blank(env(ENV_LOG_LEVEL)) {
            self.log_level = Some(level);
        }
        if let Some(base_url) = non_blank(env(ENV_BASE_URL)) {
            self.gemini.base_url = base_url;
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
