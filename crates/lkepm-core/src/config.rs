use crate::CoreError;
use lkepm_store::DeploymentLayout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LKEPM_CONFIG";

/// What `restore` does with the recycle-bin artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Duplicate it, so the recycle bin keeps a recoverable copy.
    #[default]
    Copy,
    /// Move it out of the recycle bin.
    Move,
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreMode::Copy => write!(f, "copy"),
            RestoreMode::Move => write!(f, "move"),
        }
    }
}

impl FromStr for RestoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(RestoreMode::Copy),
            "move" => Ok(RestoreMode::Move),
            other => Err(format!(
                "unknown restore mode '{other}', expected 'copy' or 'move'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Directory of the running package (the Deployed state).
    pub self_dir: PathBuf,
    /// Host-root candidates, probed in order.
    pub host_roots: Vec<PathBuf>,
    pub restore_mode: RestoreMode,
    /// Instance used by `logs` when none is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            self_dir: PathBuf::from(".."),
            host_roots: vec![
                PathBuf::from("../../.."),
                PathBuf::from("/opt/linkurious"),
            ],
            restore_mode: RestoreMode::Copy,
            instance: None,
        }
    }
}

impl ManagerConfig {
    /// Load `$LKEPM_CONFIG`, else `~/.config/lkepm/config.toml` when present,
    /// else the defaults.
    pub fn load_default() -> Result<Self, CoreError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the deployment layout, discovering the host root.
    pub fn layout(&self) -> DeploymentLayout {
        DeploymentLayout::discover(&self.self_dir, &self.host_roots)
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/lkepm/config.toml"))
}
