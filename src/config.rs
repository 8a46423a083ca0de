use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::search::stems::StemOptions;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GrimoireConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub project: ProjectConfig,
    pub search: IndexConfig,
    pub context: ContextConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// The project every request is scoped to.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub page_size: usize,
    pub snippet_chars: usize,
    pub trigrams: bool,
    /// Inputs longer than this many characters skip trigram generation. 0 disables the cap.
    pub trigram_max_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContextConfig {
    pub depth: u32,
    pub timeframe: String,
    pub max_related: usize,
    pub page_size: usize,
}

impl Default for GrimoireConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            project: ProjectConfig::default(),
            search: IndexConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8765,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_grimoire_dir()
            .join("grimoire.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "main".into(),
            path: "~/grimoire".into(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            snippet_chars: 250,
            trigrams: true,
            trigram_max_chars: 0,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            depth: 1,
            timeframe: "7d".into(),
            max_related: 10,
            page_size: 10,
        }
    }
}

impl IndexConfig {
    pub fn stem_options(&self) -> StemOptions {
        StemOptions {
            trigrams: self.trigrams,
            trigram_max_chars: (self.trigram_max_chars > 0).then_some(self.trigram_max_chars),
        }
    }
}

/// Returns `~/.grimoire/`
pub fn default_grimoire_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".grimoire")
}

/// Returns the default config file path: `~/.grimoire/config.toml`
pub fn default_config_path() -> PathBuf {
    default_grimoire_dir().join("config.toml")
}

impl GrimoireConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            GrimoireConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (GRIMOIRE_DB, GRIMOIRE_PROJECT, GRIMOIRE_PROJECT_PATH, GRIMOIRE_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GRIMOIRE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("GRIMOIRE_PROJECT") {
            self.project.name = val;
        }
        if let Ok(val) = std::env::var("GRIMOIRE_PROJECT_PATH") {
            self.project.path = val;
        }
        if let Ok(val) = std::env::var("GRIMOIRE_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the project root, expanding `~` if needed.
    pub fn resolved_project_path(&self) -> PathBuf {
        expand_tilde(&self.project.path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
