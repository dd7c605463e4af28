//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or resolving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read a settings file from disk.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse YAML in a settings file.
    #[error("failed to parse settings YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    /// The merged settings did not fit the settings schema.
    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
    /// `profile` names an entry missing from `profiles`.
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),
    /// A settings value was invalid.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
