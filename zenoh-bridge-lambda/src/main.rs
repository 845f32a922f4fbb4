//! Zenoh bridge for Lambda heat pumps.
//!
//! Polls the heat pump's holding registers over Modbus TCP and publishes
//! the decoded values to Zenoh.

use anyhow::{Context, Result};
use lambda_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
use tokio::sync::mpsc;

use zenoh_bridge_lambda::client::ModbusTcpClient;
use zenoh_bridge_lambda::config::LambdaBridgeConfig;
use zenoh_bridge_lambda::cycle::PollCycle;
use zenoh_bridge_lambda::register::{HEADLINE_REGISTER, RegisterMap};
use zenoh_bridge_lambda::scheduler::{Scheduler, SchedulerConfig};
use zenoh_bridge_lambda::service::{DeviceIdentity, build_store};
use zenoh_bridge_lambda::sink::forward_external_writes;

/// Capacity of the external write queue.
const EXTERNAL_WRITE_QUEUE: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("lambda.json5");

    let config = LambdaBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let map = RegisterMap::lambda();
    let cycle = PollCycle::new(&map, config.lambda.registers.as_slice())?;
    let headline_path = map.lookup(HEADLINE_REGISTER)?.path.to_string();

    let runner = BridgeRunner::new_with_args("lambda", config, Some(&args))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let format = runner.config().lambda.serialization;
    let mut runner = runner.with_status_publishing().with_format(format);

    let lambda = runner.config().lambda.clone();
    let identity = DeviceIdentity::from_config(&lambda);
    let store = build_store(&identity, cycle.registers())?;

    tracing::info!(
        "Lambda bridge running (service: {}, device: {}:{}, interval: {}ms)",
        identity.service_name(),
        lambda.host,
        lambda.port,
        lambda.poll_interval_ms
    );

    let client = ModbusTcpClient::new(
        lambda.host.clone(),
        lambda.port,
        lambda.unit_id,
        lambda.request_timeout(),
    );

    let (write_tx, write_rx) = mpsc::channel(EXTERNAL_WRITE_QUEUE);
    let publisher = runner.publisher();
    let session = runner.session().clone();
    let forwarder_shutdown = runner.shutdown_signal();
    runner.spawn(forward_external_writes(
        session,
        publisher.keys().clone(),
        write_tx,
        forwarder_shutdown,
    ));

    let scheduler = Scheduler::new(
        client,
        publisher,
        cycle,
        store,
        SchedulerConfig {
            poll_interval: lambda.poll_interval(),
            heartbeat_interval: lambda.heartbeat_interval(),
            headline_path,
        },
    )
    .with_external_writes(write_rx)
    .with_shutdown(runner.shutdown_signal());

    runner.spawn(async move {
        scheduler.run().await;
    });

    let metadata = serde_json::json!({
        "host": lambda.host,
        "port": lambda.port,
        "unit_id": lambda.unit_id,
        "device_instance": lambda.device_instance,
        "model": lambda.model,
        "registers": lambda.registers,
        "poll_interval_ms": lambda.poll_interval_ms,
    });

    runner
        .run_with_metadata(Some(metadata))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}
