use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("convoy"))
}

/// Default settings file location
pub fn default_settings_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where state is kept; `~` is expanded
    pub state_file: String,
    /// How deep to look for declaration files (1 = the given directory only)
    pub declaration_depth: usize,
    /// Hosts deployed at once
    pub jobs: usize,
    pub ssh: SshSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub user: String,
    pub port: u16,
    /// Seconds to wait for a connection
    pub connect_timeout: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: "convoy-state.json".to_string(),
            declaration_depth: 1,
            jobs: 1,
            ssh: SshSettings::default(),
        }
    }
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            connect_timeout: 10,
        }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit path must exist. The default location is optional and
    /// falls back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = default_settings_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    log::debug!("No settings at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load settings from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Get expanded state file path
    pub fn state_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.state_file);
        PathBuf::from(expanded.as_ref())
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, state: Option<&Path>, jobs: Option<usize>) -> Self {
        if let Some(state) = state {
            self.state_file = state.to_string_lossy().into_owned();
        }
        if let Some(jobs) = jobs {
            self.jobs = jobs;
        }
        self.jobs = self.jobs.max(1);
        self.declaration_depth = self.declaration_depth.max(1);
        self
    }
}
