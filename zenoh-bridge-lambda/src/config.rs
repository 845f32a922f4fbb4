//! Configuration for the Lambda bridge.

use std::collections::HashSet;
use std::time::Duration;

use lambda_bridge_framework::{BridgeConfig, BridgeError};
use lambda_common::{DEFAULT_KEY_PREFIX, Format, LoggingConfig, ZenohConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::register::{RegisterError, RegisterMap};

/// Longest accepted poll interval (one day).
pub const MAX_POLL_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Longest accepted connect/read timeout (one minute).
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 60 * 1000;

/// Longest accepted heartbeat period (one week).
pub const MAX_SIGN_OF_LIFE_MINUTES: u64 = 7 * 24 * 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Register(#[from] RegisterError),
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::validation(err.to_string())
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaBridgeConfig {
    /// Zenoh connection settings
    pub zenoh: ZenohConfig,

    /// Heat pump settings
    pub lambda: LambdaConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig for LambdaBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.lambda.key_prefix
    }

    fn service_name(&self) -> String {
        lambda_common::service_name(self.lambda.device_instance)
    }

    fn validate(&self) -> lambda_bridge_framework::Result<()> {
        self.lambda.validate()?;
        Ok(())
    }
}

/// Heat pump connection and publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaConfig {
    /// Key expression prefix (default: "lambda")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Controller host name or IP address
    pub host: String,

    /// Modbus TCP port (default: 502)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Device instance, also names the bus service
    #[serde(default = "default_device_instance")]
    pub device_instance: u32,

    /// Heat pump model, shown in the product name
    #[serde(default = "default_model")]
    pub model: String,

    /// Where the heat pump sits on the AC side
    #[serde(default)]
    pub position: AcPosition,

    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Connect/read timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Heartbeat interval in minutes, 0 disables it
    #[serde(default = "default_sign_of_life_minutes")]
    pub sign_of_life_minutes: u64,

    /// Payload format for published values
    #[serde(default)]
    pub serialization: Format,

    /// Registers to poll, in poll order
    #[serde(default = "default_registers")]
    pub registers: Vec<String>,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_device_instance() -> u32 {
    40
}

fn default_model() -> String {
    "EU-L".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_sign_of_life_minutes() -> u64 {
    10
}

fn default_registers() -> Vec<String> {
    RegisterMap::lambda().names().map(str::to_string).collect()
}

/// AC position tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcPosition {
    #[default]
    AcOut,
    AcIn,
}

impl AcPosition {
    /// Numeric value published on `/Position`.
    pub fn as_u64(self) -> u64 {
        match self {
            AcPosition::AcOut => 0,
            AcPosition::AcIn => 1,
        }
    }
}

impl LambdaConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Heartbeat period, `None` when disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.sign_of_life_minutes > 0)
            .then(|| Duration::from_secs(self.sign_of_life_minutes.saturating_mul(60)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "key_prefix cannot be empty".to_string(),
            ));
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::Validation("port cannot be 0".to_string()));
        }

        if !(1..=247).contains(&self.unit_id) {
            return Err(ConfigError::Validation(format!(
                "unit_id must be 1-247, got {}",
                self.unit_id
            )));
        }

        if !(1..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Validation(format!(
                "poll_interval_ms must be 1-{}, got {}",
                MAX_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }

        if !(1..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Validation(format!(
                "request_timeout_ms must be 1-{}, got {}",
                MAX_REQUEST_TIMEOUT_MS, self.request_timeout_ms
            )));
        }

        if self.sign_of_life_minutes > MAX_SIGN_OF_LIFE_MINUTES {
            return Err(ConfigError::Validation(format!(
                "sign_of_life_minutes must be at most {}, got {}",
                MAX_SIGN_OF_LIFE_MINUTES, self.sign_of_life_minutes
            )));
        }

        if self.registers.is_empty() {
            return Err(ConfigError::Validation(
                "At least one register must be configured".to_string(),
            ));
        }

        let map = RegisterMap::lambda();
        let mut seen = HashSet::new();
        for name in &self.registers {
            map.lookup(name)?;
            if !seen.insert(name.as_str()) {
                return Err(RegisterError::Duplicate(name.clone()).into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{
            zenoh: { mode: "peer" },
            lambda: { host: "192.168.1.50" }
        }"#;

        let config: LambdaBridgeConfig = json5::from_str(json).unwrap();
        let lambda = &config.lambda;
        assert_eq!(lambda.key_prefix, "lambda");
        assert_eq!(lambda.port, 502);
        assert_eq!(lambda.unit_id, 1);
        assert_eq!(lambda.device_instance, 40);
        assert_eq!(lambda.model, "EU-L");
        assert_eq!(lambda.position, AcPosition::AcOut);
        assert_eq!(lambda.poll_interval(), Duration::from_secs(1));
        assert_eq!(lambda.heartbeat_interval(), Some(Duration::from_secs(600)));
        assert_eq!(lambda.serialization, Format::Json);
        assert_eq!(
            lambda.registers,
            vec!["state", "temp", "ttemp", "power", "energy"]
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.service_name(), "lambda_40");
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            zenoh: { mode: "client", connect: ["tcp/10.0.0.1:7447"] },
            logging: { level: "debug" },
            lambda: {
                key_prefix: "home/heating",
                host: "heatpump.local",
                port: 5020,
                unit_id: 3,
                device_instance: 7,
                model: "EU13L",
                position: "ac_in",
                poll_interval_ms: 2500,
                sign_of_life_minutes: 0,
                serialization: "cbor",
                registers: ["power", "energy"],
            }
        }"#;

        let config: LambdaBridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.key_prefix(), "home/heating");
        assert_eq!(config.service_name(), "lambda_07");
        assert_eq!(config.lambda.position.as_u64(), 1);
        assert_eq!(config.lambda.heartbeat_interval(), None);
        assert_eq!(config.lambda.serialization, Format::Cbor);
        assert_eq!(config.logging.level, "debug");
    }

    fn lambda_with(registers: &[&str]) -> LambdaConfig {
        let json = r#"{ host: "10.0.0.2" }"#;
        let mut lambda: LambdaConfig = json5::from_str(json).unwrap();
        lambda.registers = registers.iter().map(|r| r.to_string()).collect();
        lambda
    }

    #[test]
    fn test_unknown_register_rejected() {
        let lambda = lambda_with(&["state", "humidity"]);
        let err = lambda.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Register(RegisterError::UnknownRegister(ref name)) if name == "humidity"
        ));
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let lambda = lambda_with(&["power", "power"]);
        assert!(matches!(
            lambda.validate(),
            Err(ConfigError::Register(RegisterError::Duplicate(_)))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut lambda = lambda_with(&["power"]);
        lambda.unit_id = 0;
        assert!(lambda.validate().is_err());

        let mut lambda = lambda_with(&["power"]);
        lambda.unit_id = 248;
        assert!(lambda.validate().is_err());

        let mut lambda = lambda_with(&["power"]);
        lambda.poll_interval_ms = 0;
        assert!(lambda.validate().is_err());

        let mut lambda = lambda_with(&["power"]);
        lambda.host = "  ".to_string();
        assert!(lambda.validate().is_err());

        let lambda = lambda_with(&[]);
        assert!(lambda.validate().is_err());
    }

    #[test]
    fn test_periods_are_bounded() {
        let mut lambda = lambda_with(&["power"]);
        lambda.poll_interval_ms = MAX_POLL_INTERVAL_MS;
        lambda.request_timeout_ms = MAX_REQUEST_TIMEOUT_MS;
        lambda.sign_of_life_minutes = MAX_SIGN_OF_LIFE_MINUTES;
        assert!(lambda.validate().is_ok());

        let mut lambda = lambda_with(&["power"]);
        lambda.poll_interval_ms = u64::MAX;
        assert!(matches!(lambda.validate(), Err(ConfigError::Validation(_))));

        let mut lambda = lambda_with(&["power"]);
        lambda.request_timeout_ms = MAX_REQUEST_TIMEOUT_MS + 1;
        assert!(matches!(lambda.validate(), Err(ConfigError::Validation(_))));

        let mut lambda = lambda_with(&["power"]);
        lambda.sign_of_life_minutes = u64::MAX;
        assert!(matches!(lambda.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ zenoh: {{ mode: "peer" }}, lambda: {{ host: "10.0.0.2", registers: ["temp"] }} }}"#
        )
        .unwrap();

        let config = LambdaBridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.lambda.registers, vec!["temp"]);
    }

    #[test]
    fn test_load_rejects_unknown_register() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ zenoh: {{ mode: "peer" }}, lambda: {{ host: "10.0.0.2", registers: ["nope"] }} }}"#
        )
        .unwrap();

        let err = LambdaBridgeConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigValidation(_)));
    }
}
