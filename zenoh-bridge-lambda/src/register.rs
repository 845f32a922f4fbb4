//! The register map: what to read from the heat pump and how to interpret it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or querying a [`RegisterMap`].
#[derive(Debug, Error, PartialEq)]
pub enum RegisterError {
    #[error("Unknown register '{0}'")]
    UnknownRegister(String),
    #[error("Register '{name}': scale must be a positive finite number, got {scale}")]
    InvalidScale { name: String, scale: f64 },
    #[error("Register '{0}' is defined more than once")]
    Duplicate(String),
}

/// How the raw register words encode the integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Unsigned 16-bit integer (1 register)
    U16,
    /// Signed 16-bit integer (1 register)
    I16,
    /// Signed 32-bit integer (2 registers, high word first)
    I32,
}

impl Encoding {
    /// Number of 16-bit registers this encoding spans.
    pub const fn word_count(self) -> u16 {
        match self {
            Encoding::U16 | Encoding::I16 => 1,
            Encoding::I32 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::U16 => "u16",
            Encoding::I16 => "i16",
            Encoding::I32 => "i32",
        }
    }
}

/// Immutable description of one measurement register.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterSpec {
    /// Semantic identifier used in configuration (e.g. "temp").
    pub name: &'static str,
    /// Holding register address.
    pub address: u16,
    pub encoding: Encoding,
    /// Multiplier from raw integer to physical value.
    pub scale: f64,
    /// Presentation unit, empty when dimensionless.
    pub unit: &'static str,
    /// Bus path the decoded value is published under.
    pub path: &'static str,
    pub description: &'static str,
}

impl RegisterSpec {
    /// Number of registers to request; always the encoding's natural width.
    pub const fn word_count(&self) -> u16 {
        self.encoding.word_count()
    }
}

/// Registers of the Lambda EU-L heat pump, in poll order.
const LAMBDA_REGISTERS: &[RegisterSpec] = &[
    RegisterSpec {
        name: "state",
        address: 1003,
        encoding: Encoding::U16,
        scale: 1.0,
        unit: "",
        path: "/State",
        description: "Operating State",
    },
    RegisterSpec {
        name: "temp",
        address: 1004,
        encoding: Encoding::I16,
        scale: 0.01,
        unit: "°C",
        path: "/Temperature",
        description: "Flow Temperature",
    },
    RegisterSpec {
        name: "ttemp",
        address: 1016,
        encoding: Encoding::I16,
        scale: 0.1,
        unit: "°C",
        path: "/TargetTemperature",
        description: "Request Flow Temperature",
    },
    RegisterSpec {
        name: "power",
        address: 103,
        encoding: Encoding::I16,
        scale: 1.0,
        unit: "W",
        path: "/Ac/Power",
        description: "Power Consumption",
    },
    RegisterSpec {
        name: "energy",
        address: 1020,
        encoding: Encoding::I32,
        scale: 0.001,
        unit: "kWh",
        path: "/Ac/Energy/Forward",
        description: "Total Energy",
    },
];

/// Register reported by the heartbeat.
pub const HEADLINE_REGISTER: &str = "power";

/// Static table of named registers.
///
/// This is the only place addresses, widths, signedness and scales live;
/// the decoder works purely from the [`RegisterSpec`] it is handed.
#[derive(Debug, Clone)]
pub struct RegisterMap {
    registers: Vec<RegisterSpec>,
}

impl RegisterMap {
    /// Build a map from a table, checking scales and name/path uniqueness.
    pub fn new(registers: Vec<RegisterSpec>) -> Result<Self, RegisterError> {
        let mut names = HashSet::new();
        let mut paths = HashSet::new();

        for spec in &registers {
            if !spec.scale.is_finite() || spec.scale <= 0.0 {
                return Err(RegisterError::InvalidScale {
                    name: spec.name.to_string(),
                    scale: spec.scale,
                });
            }
            if !names.insert(spec.name) || !paths.insert(spec.path) {
                return Err(RegisterError::Duplicate(spec.name.to_string()));
            }
        }

        Ok(Self { registers })
    }

    /// The Lambda heat pump table.
    pub fn lambda() -> Self {
        Self {
            registers: LAMBDA_REGISTERS.to_vec(),
        }
    }

    /// Look up a register by name.
    pub fn lookup(&self, name: &str) -> Result<&RegisterSpec, RegisterError> {
        self.registers
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| RegisterError::UnknownRegister(name.to_string()))
    }

    /// All register names in table order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registers.iter().map(|spec| spec.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterSpec> {
        self.registers.iter()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::lambda()
    }
}
