use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_ENV_VAR: &str = "TPCOPY_CONFIG";

/// Checksum policy defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    /// Algorithm used when a request does not name one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_algorithm: Option<String>,
    /// Proceed when the source reports no checksum.
    pub allow_empty_source_checksum: bool,
}

/// Backends known to break transport session reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuirkConfig {
    pub session_isolation_backends: Vec<String>,
}

impl Default for QuirkConfig {
    fn default() -> Self {
        Self {
            session_isolation_backends: vec!["CASTOR".into()],
        }
    }
}

impl QuirkConfig {
    /// Case-insensitive membership test against the probed backend type.
    pub fn requires_isolation(&self, backend_type: &str) -> bool {
        self.session_isolation_backends
            .iter()
            .any(|b| b.eq_ignore_ascii_case(backend_type))
    }
}

/// Transport session tuning, shared by every copy in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub session_reuse: bool,
    pub stat_on_open: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            session_reuse: true,
            stat_on_open: true,
        }
    }
}

/// Full configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    pub checksum: ChecksumConfig,
    pub quirks: QuirkConfig,
    pub transport: TransportSettings,
}

impl CopyConfig {
    /// Loads the configuration from `$TPCOPY_CONFIG` or the default path.
    ///
    /// A missing file yields defaults. A file that cannot be read or parsed
    /// is logged and also yields defaults.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            tracing::debug!("no configuration path available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Loads the configuration from `path`, failing on any error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Writes the configuration as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => default_config_path(),
    }
}

/// `$HOME/.config/tpcopy/config.json`, if `HOME` is set.
pub fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("tpcopy")
            .join("config.json"),
    )
}
