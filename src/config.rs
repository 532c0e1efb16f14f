//! Configuration snapshots
//!
//! Reads the user-edited `config.json` (API credential, default project
//! path, server settings) into an immutable snapshot. The service never
//! mutates the file or patches a loaded snapshot in place; a reload
//! produces a fresh snapshot.

use crate::{BranchPilotError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Installer template values that count as "not configured"
const API_KEY_PLACEHOLDERS: &[&str] = &[
    "PASTE_YOUR_GEMINI_API_KEY_HERE",
    "COLE_SUA_CHAVE_API_GEMINI_AQUI",
];
const PROJECT_PATH_PLACEHOLDER: &str = "/path/to/your/project";

/// Default port when neither the CLI nor the config file sets one
pub const DEFAULT_PORT: u16 = 3000;

/// The `settings` block of config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub server_port: Option<u16>,

    #[serde(default)]
    pub default_base_branch: Option<String>,

    /// Unrecognized settings are preserved, not rejected
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Immutable view of config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default)]
    pub project_path: Option<String>,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub advanced: serde_json::Map<String, serde_json::Value>,
}

impl ConfigSnapshot {
    /// Load a snapshot from a config.json file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            BranchPilotError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            BranchPilotError::Config(format!("invalid JSON in {}: {e}", path.display()))
        })
    }

    /// Resolve which config.json to use: an explicit path, then
    /// `./config.json`, then `~/.config/branchpilot/config.json`.
    ///
    /// An explicit path is returned even when missing so the caller gets a
    /// load error instead of a silent fallback.
    pub fn discover(explicit: Option<PathBuf>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path);
        }

        let local = PathBuf::from("config.json");
        if local.exists() {
            return Some(local);
        }

        let home = Self::default_path();
        if home.exists() {
            return Some(home);
        }

        None
    }

    /// The home-directory config location
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("branchpilot");
        path.push("config.json");
        path
    }

    /// Whether a real (non-placeholder) API credential is present
    pub fn has_api_key(&self) -> bool {
        match self.gemini_api_key.as_deref() {
            Some(key) => !key.trim().is_empty() && !API_KEY_PLACEHOLDERS.contains(&key),
            None => false,
        }
    }

    /// Whether a real (non-placeholder) default project path is present
    pub fn has_project_path(&self) -> bool {
        match self.project_path.as_deref() {
            Some(path) => !path.trim().is_empty() && path != PROJECT_PATH_PLACEHOLDER,
            None => false,
        }
    }

    /// The configured project path, placeholders treated as absent
    pub fn project_path(&self) -> Option<&str> {
        if self.has_project_path() {
            self.project_path.as_deref()
        } else {
            None
        }
    }

    pub fn server_port(&self) -> u16 {
        self.settings.server_port.unwrap_or(DEFAULT_PORT)
    }

    /// The configured default base branch, empty string treated as absent
    pub fn default_base_branch(&self) -> Option<&str> {
        self.settings
            .default_base_branch
            .as_deref()
            .filter(|b| !b.trim().is_empty())
    }
}
