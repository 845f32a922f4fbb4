//! Lambda Bridge Framework
//!
//! Lifecycle plumbing shared by the bridge binary.
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for startup, task management and Ctrl+C shutdown
//! - [`Publisher`] for publishing bus values to Zenoh
//! - [`BridgeArgs`] for CLI argument parsing
//! - [`BridgeStatus`] for running/offline status reporting
//!
//! # Example
//!
//! ```ignore
//! use lambda_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("lambda.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("lambda", config, Some(&args)).await?;
//!     runner.spawn(my_worker(runner.publisher()));
//!
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::Publisher;
pub use runner::BridgeRunner;
pub use status::{BridgeStatus, StatusPublisher};

pub use lambda_common::{
    Format, KeyExprBuilder, LoggingConfig, TelemetryPoint, TelemetryValue, ZenohConfig,
};
