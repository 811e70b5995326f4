//! # Store Configuration
//!
//! Where the store keeps its files and which backend it prefers.
//!
//! Values are resolved in layers, each one overriding the previous:
//!
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. the `LEARNING_STORE_DATA_DIR` / `LEARNING_STORE_BACKEND` environment
//! 4. command-line flags (applied by the binary)
//!
//! ## YAML Format
//!
//! ```yaml
//! data_directory: "/home/me/.local/share/Learning Journal"
//! backend: auto            # auto | structured | flat
//! database_file: learning_store.db
//! key_value_file: learning_store.kv.json
//! ```

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DATA_DIR_ENV: &str = "LEARNING_STORE_DATA_DIR";
pub const BACKEND_ENV: &str = "LEARNING_STORE_BACKEND";

/// Default data directory: the platform data dir, else a dot-directory in home
pub fn default_data_directory() -> PathBuf {
    match dirs::data_dir() {
        Some(data_dir) => data_dir.join("Learning Journal"),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".learning-journal"),
    }
}

fn default_database_file() -> String {
    "learning_store.db".to_string()
}

fn default_key_value_file() -> String {
    "learning_store.kv.json".to_string()
}

/// Which backend the startup probe should pick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// SQLite when usable, flat storage otherwise
    #[default]
    Auto,
    /// SQLite or fail
    Structured,
    /// Always the flat backend
    Flat,
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPreference::Auto => write!(f, "auto"),
            BackendPreference::Structured => write!(f, "structured"),
            BackendPreference::Flat => write!(f, "flat"),
        }
    }
}

impl FromStr for BackendPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "structured" | "sqlite" => Ok(BackendPreference::Structured),
            "flat" => Ok(BackendPreference::Flat),
            other => Err(anyhow!("unknown backend '{}' (expected auto, structured or flat)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the database or key-value document
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,

    #[serde(default)]
    pub backend: BackendPreference,

    /// SQLite file name inside `data_directory`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Key-value document name inside `data_directory`
    #[serde(default = "default_key_value_file")]
    pub key_value_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            backend: BackendPreference::default(),
            database_file: default_database_file(),
            key_value_file: default_key_value_file(),
        }
    }
}

impl StoreConfig {
    /// Config rooted at `data_directory` with every other value defaulted
    pub fn in_directory<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            data_directory: data_directory.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_directory.join(&self.database_file)
    }

    pub fn key_value_path(&self) -> PathBuf {
        self.data_directory.join(&self.key_value_file)
    }

    /// Parse a YAML config file; missing fields take their defaults
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml_str(&yaml_content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded store config from {:?}", path);
        Ok(config)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml_content)?)
    }

    /// Defaults, then the optional file, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config = match file {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };

        config.with_overrides(
            std::env::var(DATA_DIR_ENV).ok().as_deref(),
            std::env::var(BACKEND_ENV).ok().as_deref(),
        )
    }

    /// Apply explicit overrides; empty strings count as unset
    pub fn with_overrides(mut self, data_directory: Option<&str>, backend: Option<&str>) -> Result<Self> {
        if let Some(dir) = data_directory.map(str::trim).filter(|dir| !dir.is_empty()) {
            self.data_directory = PathBuf::from(dir);
        }

        if let Some(backend) = backend.map(str::trim).filter(|backend| !backend.is_empty()) {
            self.backend = backend
                .parse()
                .with_context(|| format!("Invalid {}", BACKEND_ENV))?;
        }

        Ok(self)
    }
}
