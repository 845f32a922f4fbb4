//! Getting store contents onto the bus and external writes back in.

use std::future::Future;
use std::sync::Arc;

use lambda_bridge_framework::{BridgeError, Publisher};
use lambda_common::{KeyExprBuilder, TelemetryPoint, TelemetryValue, decode_auto};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Destination for published points.
pub trait TelemetrySink: Send + Sync {
    fn publish(
        &self,
        point: &TelemetryPoint,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

impl TelemetrySink for Publisher {
    async fn publish(&self, point: &TelemetryPoint) -> Result<(), BridgeError> {
        Publisher::publish(self, point).await
    }
}

/// Statistics from a batch publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully published points.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

/// Publish `points` one by one; failures are logged and counted.
pub async fn flush<S: TelemetrySink>(sink: &S, points: &[TelemetryPoint]) -> PublishStats {
    let mut stats = PublishStats::default();

    for point in points {
        match sink.publish(point).await {
            Ok(()) => stats.success += 1,
            Err(e) => {
                stats.failed += 1;
                warn!(path = %point.path, error = %e, "Failed to publish value");
            }
        }
    }

    stats
}

/// A value someone else set on one of our bus paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalWrite {
    pub path: String,
    pub value: TelemetryValue,
}

/// Subscribe to the service's set keys and forward decoded writes to `tx`.
///
/// Returns when shutdown is signalled, the receiver is dropped or the
/// subscriber fails.
pub async fn forward_external_writes(
    session: Arc<zenoh::Session>,
    keys: KeyExprBuilder,
    tx: mpsc::Sender<ExternalWrite>,
    mut shutdown: watch::Receiver<bool>,
) {
    let key_expr = keys.set_wildcard();
    let subscriber = match session.declare_subscriber(&key_expr).await {
        Ok(sub) => sub,
        Err(e) => {
            tracing::error!(error = %e, key = %key_expr, "Failed to create subscriber");
            return;
        }
    };
    info!(key = %key_expr, "Listening for external writes");

    loop {
        let sample = tokio::select! {
            result = subscriber.recv_async() => match result {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber error");
                    return;
                }
            },
            _ = shutdown.changed() => {
                debug!("External write forwarder stopping");
                return;
            }
        };

        let key = sample.key_expr().as_str().to_string();
        let Some(path) = keys.parse_set_key(&key) else {
            warn!(key = %key, "Ignoring write on unexpected key");
            continue;
        };

        let payload = sample.payload().to_bytes();
        let value = match decode_auto::<TelemetryValue>(&payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to decode external write");
                continue;
            }
        };

        if tx.send(ExternalWrite { path, value }).await.is_err() {
            debug!("Scheduler gone, external write forwarder stopping");
            return;
        }
    }
}
