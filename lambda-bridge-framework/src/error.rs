//! Error types for the bridge framework.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised while starting, running or stopping the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No configuration file at {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Malformed configuration: {0}")]
    ConfigParse(String),

    #[error("Configuration rejected: {0}")]
    ConfigValidation(String),

    #[error("Cannot reach Zenoh: {0}")]
    ZenohConnection(String),

    #[error("Zenoh session failed: {0}")]
    ZenohSession(String),

    #[error("Cannot encode payload: {0}")]
    Serialization(String),

    /// A put on `key` was refused by the session.
    #[error("Put on '{key}' failed: {message}")]
    Publish { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<zenoh::Error> for BridgeError {
    fn from(err: zenoh::Error) -> Self {
        Self::ZenohSession(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<lambda_common::Error> for BridgeError {
    fn from(err: lambda_common::Error) -> Self {
        use lambda_common::Error as Common;

        match err {
            Common::Config(msg) => Self::Config(msg),
            Common::Zenoh(e) => Self::ZenohSession(e.to_string()),
            Common::Io(e) => Self::Io(e),
            Common::Path(path) => Self::Publish {
                key: path,
                message: "not a valid bus path".to_string(),
            },
            other => Self::Serialization(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_maps_to_publish() {
        let err: BridgeError = lambda_common::Error::Path("Ac/Power".to_string()).into();
        assert!(matches!(err, BridgeError::Publish { ref key, .. } if key == "Ac/Power"));
    }
}
