//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use lambda_common::{Format, KeyExprBuilder, connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::status::StatusPublisher;

/// Manages the bridge lifecycle.
///
/// Handles:
/// - Logging initialization (with CLI level override)
/// - Zenoh connection
/// - Task spawning, shutdown notification and abort
/// - Status publishing (optional)
/// - Shutdown on Ctrl+C
pub struct BridgeRunner<C: BridgeConfig> {
    name: String,
    version: String,
    config: C,
    session: Arc<zenoh::Session>,
    publisher: Publisher,
    status_publisher: Option<StatusPublisher>,
    tasks: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

/// How long workers get to finish after the shutdown signal before being aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Initialize logging, connect to Zenoh and create the publisher.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let level_override = args.and_then(|a| a.log_level.as_deref());
        let log_config = config.logging().with_level_override(level_override);
        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let session = Arc::new(
            connect(config.zenoh())
                .await
                .map_err(|e| BridgeError::ZenohConnection(e.to_string()))?,
        );

        let keys = KeyExprBuilder::new(config.key_prefix(), config.service_name());
        let publisher = Publisher::new(session.clone(), keys, Format::Json);

        Ok(Self {
            name,
            version,
            config,
            session,
            publisher,
            status_publisher: None,
            tasks: Vec::new(),
            shutdown: watch::channel(false).0,
        })
    }

    /// Publish "running" on startup and "offline" on shutdown.
    pub fn with_status_publishing(mut self) -> Self {
        self.status_publisher = Some(StatusPublisher::new(
            self.publisher.clone(),
            &self.name,
            &self.version,
        ));
        self
    }

    /// Set the payload format for published values.
    pub fn with_format(mut self, format: Format) -> Self {
        self.publisher = self.publisher.with_format(format);
        if self.status_publisher.is_some() {
            self.status_publisher = Some(StatusPublisher::new(
                self.publisher.clone(),
                &self.name,
                &self.version,
            ));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Receiver that flips to `true` when shutdown starts.
    ///
    /// Workers watching it get a short grace period to release resources
    /// before they are aborted.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Spawn a worker task; it is aborted on shutdown if still running.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Run until Ctrl+C.
    pub async fn run(self) -> Result<()> {
        self.run_with_metadata(None).await
    }

    /// Run until Ctrl+C, attaching `metadata` to the "running" status.
    pub async fn run_with_metadata(mut self, metadata: Option<serde_json::Value>) -> Result<()> {
        if let Some(status) = &self.status_publisher {
            if let Err(e) = status.publish_running(metadata).await {
                tracing::warn!(error = %e, "Failed to publish running status");
            }
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        tracing::info!(bridge = %self.name, "Received shutdown signal");

        self.stop_workers().await;

        if let Some(status) = &self.status_publisher {
            if let Err(e) = status.publish_offline().await {
                tracing::warn!(error = %e, "Failed to publish offline status");
            }
        }

        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }

        tracing::info!(bridge = %self.name, "Bridge stopped");
        Ok(())
    }

    /// Signal shutdown, then abort workers still running after the grace period.
    async fn stop_workers(&mut self) {
        // Receivers may already be gone.
        let _ = self.shutdown.send(true);

        let mut aborted = 0;
        for task in self.tasks.drain(..) {
            let abort = task.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                abort.abort();
                aborted += 1;
            }
        }

        if aborted > 0 {
            tracing::debug!(aborted, "Aborted workers after grace period");
        }
    }
}
