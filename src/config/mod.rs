//! YAML configuration for the modgraph binary.
//!
//! A single optional file controls the database location, the server bind
//! address, default traversal options, and display metadata. Every field
//! has a serde default, so a partial file (or none at all) works.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::types::{StopConditions, StopRule};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration, loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Defaults applied to traversals that don't specify their own options.
    #[serde(default)]
    pub traversal: TraversalConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Load from `path` when given, otherwise from the per-user default
    /// location; a missing file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };

        match candidate {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p)?;
                let config: Config = serde_yaml::from_str(&raw)
                    .map_err(|e| GraphError::Config(format!("{}: {e}", p.display())))?;
                tracing::info!(path = %p.display(), "config loaded");
                Ok(config)
            }
            Some(p) if path.is_some() => {
                Err(GraphError::Config(format!("{}: file not found", p.display())))
            }
            _ => Ok(Self::default()),
        }
    }

    /// `~/.config/modgraph/config.yaml` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "modgraph")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "modgraph")
        .map(|dirs| {
            dirs.data_dir()
                .join("modgraph.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "modgraph.db".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8077
}

/// Default traversal options; convertible into [`StopConditions`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// `null` means unbounded.
    #[serde(default)]
    pub max_depth: Option<u32>,

    #[serde(default)]
    pub stop_rules: Vec<StopRule>,
}

impl TraversalConfig {
    pub fn stop_conditions(&self) -> StopConditions {
        StopConditions {
            max_depth: self.max_depth,
            rules: self.stop_rules.clone(),
            exclude: Vec::new(),
        }
    }
}

/// Display metadata passed through to rendering clients untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Node color per entity state.
    #[serde(default = "default_state_colors")]
    pub state_colors: BTreeMap<String, String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            state_colors: default_state_colors(),
        }
    }
}

fn default_state_colors() -> BTreeMap<String, String> {
    [
        ("installed", "#97c2fc"),
        ("uninstalled", "#e5f8fc"),
        ("to install", "#939afc"),
        ("to upgrade", "#AEFCAB"),
        ("to remove", "#fcadb7"),
        ("uninstallable", "#eaeaa4"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
