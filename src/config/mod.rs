//! Configuration management

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::RenderConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub render: RenderConfig,
    pub timing: TimingConfig,
    pub editor: EditorConfig,
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Shell spawned for every session
    pub shell: String,

    /// Command written into a fresh session to launch the target CLI tool
    pub tool: String,

    /// Directory whose subdirectories are offered as projects
    pub projects_root: Option<PathBuf>,

    /// Socket directory
    pub runtime_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            tool: "claude".to_string(),
            projects_root: None,
            runtime_dir: None,
        }
    }
}

/// Delays governing the session lifecycle, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after spawn before writing the bootstrap command
    pub bootstrap_delay_ms: u64,

    /// Output silence required before a session is reported idle
    pub idle_timeout_ms: u64,

    /// Wait between killing a session and respawning it on restart
    pub restart_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bootstrap_delay_ms: 1_500,
            idle_timeout_ms: 2_000,
            restart_settle_ms: 250,
        }
    }
}

impl TimingConfig {
    pub fn bootstrap_delay(&self) -> Duration {
        Duration::from_millis(self.bootstrap_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }
}

/// Editor integration for openFile requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Command template; `{path}`, `{line}` and `{column}` are substituted
    pub open_command: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            open_command: "code --goto {path}:{line}:{column}".to_string(),
        }
    }
}

impl Config {
    /// Load config from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, or return defaults if not found
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termdeck")
            .join("config.toml")
    }

    /// Get the runtime directory for sockets
    pub fn runtime_dir(&self) -> PathBuf {
        self.general
            .runtime_dir
            .clone()
            .or_else(dirs::runtime_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join("termdeck")
    }

    /// Get the socket path the server binds and the surface connects to
    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir().join("termdeck.sock")
    }

    /// Get the directory scanned for projects
    pub fn projects_root(&self) -> PathBuf {
        self.general
            .projects_root
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
