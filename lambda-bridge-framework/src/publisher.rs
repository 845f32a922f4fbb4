//! Bus value publisher for Zenoh.

use std::sync::Arc;

use lambda_common::{Format, KeyExprBuilder, TelemetryPoint, encode};

use crate::error::{BridgeError, Result};

/// Publishes bus values to Zenoh under the bridge's key expressions.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
    format: Format,
}

impl Publisher {
    pub fn new(session: Arc<zenoh::Session>, keys: KeyExprBuilder, format: Format) -> Self {
        Self {
            session,
            keys,
            format,
        }
    }

    pub fn keys(&self) -> &KeyExprBuilder {
        &self.keys
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Return a publisher with a different payload format.
    pub fn with_format(&self, format: Format) -> Self {
        Self {
            session: self.session.clone(),
            keys: self.keys.clone(),
            format,
        }
    }

    /// Publish a point under the key expression of its bus path.
    pub async fn publish(&self, point: &TelemetryPoint) -> Result<()> {
        let key = self
            .keys
            .build(&point.path)
            .map_err(|e| BridgeError::Publish {
                key: point.path.clone(),
                message: e.to_string(),
            })?;
        let payload =
            encode(point, self.format).map_err(|e| BridgeError::Serialization(e.to_string()))?;

        self.publish_raw(&key, payload).await
    }

    /// Publish raw bytes to a full key expression.
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Publish a JSON document to a full key expression.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(key, payload).await
    }
}
