//! Bridge status reporting.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::publisher::Publisher;

/// Bridge status document published to `<prefix>/@/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub bridge: String,
    pub version: String,
    /// "running" or "offline".
    pub status: String,
    /// Bus service the bridge publishes under.
    pub service: String,
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    fn with_status(
        bridge: impl Into<String>,
        version: impl Into<String>,
        service: impl Into<String>,
        status: &str,
    ) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: status.to_string(),
            service: service.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn running(
        bridge: impl Into<String>,
        version: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self::with_status(bridge, version, service, "running")
    }

    pub fn offline(
        bridge: impl Into<String>,
        version: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self::with_status(bridge, version, service, "offline")
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub async fn publish(&self, publisher: &Publisher) -> Result<()> {
        let key = publisher.keys().status_key();
        publisher.publish_json(&key, self).await
    }
}

/// Publishes the bridge status on startup and shutdown.
pub struct StatusPublisher {
    publisher: Publisher,
    bridge_name: String,
    version: String,
}

impl StatusPublisher {
    pub fn new(
        publisher: Publisher,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge_name: bridge_name.into(),
            version: version.into(),
        }
    }

    pub async fn publish_running(&self, metadata: Option<serde_json::Value>) -> Result<()> {
        let mut status = BridgeStatus::running(
            &self.bridge_name,
            &self.version,
            self.publisher.keys().service(),
        );
        if let Some(meta) = metadata {
            status = status.with_metadata(meta);
        }
        status.publish(&self.publisher).await
    }

    pub async fn publish_offline(&self) -> Result<()> {
        BridgeStatus::offline(
            &self.bridge_name,
            &self.version,
            self.publisher.keys().service(),
        )
        .publish(&self.publisher)
        .await
    }
}
