use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the bridge crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Zenoh(#[from] zenoh::Error),

    #[error("JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CBOR encoding failed: {0}")]
    CborEncode(String),

    #[error("CBOR decoding failed: {0}")]
    CborDecode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A bus path that cannot be mapped onto a key expression.
    #[error("Invalid bus path '{0}'")]
    Path(String),
}

impl<E: std::fmt::Debug> From<ciborium::ser::Error<E>> for Error {
    fn from(e: ciborium::ser::Error<E>) -> Self {
        Error::CborEncode(format!("{:?}", e))
    }
}

impl<E: std::fmt::Debug> From<ciborium::de::Error<E>> for Error {
    fn from(e: ciborium::de::Error<E>) -> Self {
        Error::CborDecode(format!("{:?}", e))
    }
}
