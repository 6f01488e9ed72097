//! Error types shared by every PINION crate.

use thiserror::Error;

/// Errors raised by the PINION runtime.
#[derive(Debug, Error)]
pub enum PinionError {
    #[error("{kind} with key '{key}' already defined")]
    DuplicateKey { kind: String, key: String },

    #[error("{kind} with key '{key}' not found")]
    NotFound { kind: String, key: String },

    /// A write was routed to a key that does not name any Output.
    #[error("Unknown output key '{0}'")]
    UnknownKey(String),

    #[error("Pin {pin} of '{key}' is outside the valid range {min}..={max}")]
    PinOutOfRange {
        key: String,
        pin: u32,
        min: u32,
        max: u32,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Every problem found while validating a configuration, reported together.
    #[error("Invalid configuration ({} problem(s)):\n  - {}", .0.len(), .0.join("\n  - "))]
    InvalidConfig(Vec<String>),

    #[error("Hardware error on pin {pin}: {message}")]
    Hardware { pin: u8, message: String },

    #[error("Shift register '{bank}' faulted: {message}")]
    BankFault { bank: String, message: String },

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Plugin '{key}' failed: {message}")]
    Plugin { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias used throughout PINION.
pub type PinionResult<T> = Result<T, PinionError>;

impl PinionError {
    pub fn config(message: impl Into<String>) -> Self {
        PinionError::Config(message.into())
    }

    pub fn hardware(pin: u8, message: impl std::fmt::Display) -> Self {
        PinionError::Hardware {
            pin,
            message: message.to_string(),
        }
    }

    pub fn plugin(key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        PinionError::Plugin {
            key: key.into(),
            message: message.to_string(),
        }
    }

    pub fn communication(message: impl std::fmt::Display) -> Self {
        PinionError::Communication(message.to_string())
    }

    pub fn duplicate(kind: impl std::fmt::Display, key: impl Into<String>) -> Self {
        PinionError::DuplicateKey {
            kind: kind.to_string(),
            key: key.into(),
        }
    }

    pub fn not_found(kind: impl std::fmt::Display, key: impl Into<String>) -> Self {
        PinionError::NotFound {
            kind: kind.to_string(),
            key: key.into(),
        }
    }
}
