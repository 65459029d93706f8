//! Copy configuration.
//!
//! [`CopyConfig`] is the on-disk shape; [`ConfigHandle`] is the shared,
//! process-wide view the copy core reads from and the quirk detector writes
//! to.

mod handle;
mod model;

pub use handle::ConfigHandle;
pub use model::{
    CONFIG_ENV_VAR, ChecksumConfig, CopyConfig, QuirkConfig, TransportSettings,
    default_config_path,
};

/// Errors produced while loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {source}", path.display())]
    Json {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
}
