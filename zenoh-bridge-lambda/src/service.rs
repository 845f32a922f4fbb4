//! The bus service: identity block plus measurement paths.

use lambda_common::TelemetryValue;
use tracing::error;

use crate::config::{AcPosition, LambdaConfig};
use crate::cycle::UPDATE_INDEX_PATH;
use crate::format::ValueFormat;
use crate::register::RegisterSpec;
use crate::store::{PublishStore, StoreError};

/// Product id of devices without an assigned one.
pub const PRODUCT_ID: u64 = 0xFFFF;

/// Static description of the bridged device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub process_name: String,
    pub process_version: String,
    /// Human-readable connection description.
    pub connection: String,
    pub device_instance: u32,
    pub model: String,
    pub position: AcPosition,
}

impl DeviceIdentity {
    pub fn from_config(config: &LambdaConfig) -> Self {
        Self {
            process_name: env!("CARGO_PKG_NAME").to_string(),
            process_version: env!("CARGO_PKG_VERSION").to_string(),
            connection: format!("Lambda Modbus TCP {}:{}", config.host, config.port),
            device_instance: config.device_instance,
            model: config.model.clone(),
            position: config.position,
        }
    }

    pub fn service_name(&self) -> String {
        lambda_common::service_name(self.device_instance)
    }

    pub fn product_name(&self) -> String {
        format!("LAMBDA {}", self.model)
    }
}

/// Create the store with the identity block and one writable path per register.
///
/// Measurement paths start at 0 and render with the format of their unit.
pub fn build_store(
    identity: &DeviceIdentity,
    registers: &[RegisterSpec],
) -> Result<PublishStore, StoreError> {
    let mut store = PublishStore::new(identity.service_name());

    let product_name = identity.product_name();
    let identity_paths: [(&str, TelemetryValue); 13] = [
        ("/Mgmt/ProcessName", identity.process_name.as_str().into()),
        ("/Mgmt/ProcessVersion", identity.process_version.as_str().into()),
        ("/Mgmt/Connection", identity.connection.as_str().into()),
        ("/DeviceInstance", u64::from(identity.device_instance).into()),
        ("/ProductId", PRODUCT_ID.into()),
        ("/ProductName", product_name.as_str().into()),
        ("/CustomName", product_name.as_str().into()),
        ("/FirmwareVersion", "0".into()),
        ("/Serial", "0".into()),
        ("/HardwareVersion", identity.model.as_str().into()),
        ("/Connected", 1u64.into()),
        (UPDATE_INDEX_PATH, 0u64.into()),
        ("/Position", identity.position.as_u64().into()),
    ];
    for (path, value) in identity_paths {
        store.register_path(path, value, ValueFormat::Plain, false, None)?;
    }

    for spec in registers {
        store.register_path(
            spec.path,
            0u64,
            ValueFormat::for_unit(spec.unit),
            true,
            Some(log_external_change),
        )?;
    }

    Ok(store)
}

/// Change handler of measurement paths. Only the device sets them.
fn log_external_change(path: &str, value: &TelemetryValue) {
    error!(
        severity = "critical",
        path = %path,
        value = %value,
        "Someone else updated {} to {}",
        path,
        value
    );
}
