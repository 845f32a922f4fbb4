//! Text rendering of bus values.

use lambda_common::TelemetryValue;

/// How a bus path renders its value as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueFormat {
    /// The value as is.
    #[default]
    Plain,
    /// `21.5°C`
    Celsius,
    /// One decimal, `1520.0W`
    Watts,
    /// Two decimals, `4711.25kWh`
    KilowattHours,
}

impl ValueFormat {
    /// Format for a register's display unit.
    pub fn for_unit(unit: &str) -> Self {
        match unit {
            "°C" => ValueFormat::Celsius,
            "W" => ValueFormat::Watts,
            "kWh" => ValueFormat::KilowattHours,
            _ => ValueFormat::Plain,
        }
    }

    /// Unit label attached to published points, `None` when dimensionless.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            ValueFormat::Plain => None,
            ValueFormat::Celsius => Some("°C"),
            ValueFormat::Watts => Some("W"),
            ValueFormat::KilowattHours => Some("kWh"),
        }
    }

    pub fn render(self, value: &TelemetryValue) -> String {
        let Some(number) = value.as_f64() else {
            return value.to_string();
        };

        match self {
            ValueFormat::Plain => value.to_string(),
            ValueFormat::Celsius => format!("{}°C", number),
            ValueFormat::Watts => format!("{:.1}W", number),
            ValueFormat::KilowattHours => format!("{:.2}kWh", number),
        }
    }
}
