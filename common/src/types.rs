use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Home Assistant style entity identifier (`domain.object_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ConfigurationError> {
        let raw = raw.into();
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        };

        match raw.split_once('.') {
            Some((domain, object_id)) if valid_part(domain) && valid_part(object_id) => {
                Ok(Self(raw))
            }
            _ => Err(ConfigurationError::InvalidEntityId(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('.').map(|(domain, _)| domain).unwrap_or("")
    }

    pub fn object_id(&self) -> &str {
        self.0.split_once('.').map(|(_, object_id)| object_id).unwrap_or("")
    }
}

impl TryFrom<String> for EntityId {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operation mode key. Modes configured without a name are keyed by their
/// position in the operation list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModeName {
    Named(String),
    Index(usize),
}

impl ModeName {
    /// Requests arrive as plain strings, so matching goes through the
    /// rendered form: `Index(2)` answers to `"2"`.
    pub fn matches(&self, requested: &str) -> bool {
        match self {
            Self::Named(name) => name == requested,
            Self::Index(index) => index.to_string() == requested,
        }
    }
}

impl fmt::Display for ModeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatingDecision {
    TurnOn,
    TurnOff,
    NoChange,
}

impl HeatingDecision {
    /// Switch payload for the actuator, `None` when nothing has to be sent.
    pub fn switch_payload(self) -> Option<&'static str> {
        match self {
            Self::TurnOn => Some("ON"),
            Self::TurnOff => Some("OFF"),
            Self::NoChange => None,
        }
    }
}

/// What the actuator is doing. `Off` until the controller has seen its first
/// usable reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacAction {
    Off,
    Idle,
    Heating,
    Cooling,
}

impl HvacAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Idle => "IDLE",
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Kelvin => "K",
        }
    }

    pub fn from_kelvin(self, kelvin: f64) -> f64 {
        match self {
            Self::Celsius => kelvin - 273.15,
            Self::Fahrenheit => (kelvin - 273.15) * 9.0 / 5.0 + 32.0,
            Self::Kelvin => kelvin,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThermostatStatus {
    pub name: String,
    pub heater: String,
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    #[serde(rename = "targetTemp")]
    pub target_temp: f32,
    #[serde(rename = "minTemp")]
    pub min_temp: f32,
    #[serde(rename = "maxTemp")]
    pub max_temp: f32,
    pub tolerance: f32,
    #[serde(rename = "operationMode")]
    pub operation_mode: String,
    #[serde(rename = "operationList")]
    pub operation_list: Vec<String>,
    pub icon: Option<String>,
    #[serde(rename = "targetSensor")]
    pub target_sensor: String,
    #[serde(rename = "heaterOn")]
    pub heater_on: bool,
    #[serde(rename = "hvacAction")]
    pub hvac_action: &'static str,
    pub unit: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_requires_domain_and_object() {
        assert!(EntityId::parse("sensor.living_room").is_ok());
        assert!(EntityId::parse("switch.heater_2").is_ok());

        for raw in ["sensor", "sensor.", ".living", "Sensor.living", "sensor.living room"] {
            assert_eq!(
                EntityId::parse(raw),
                Err(ConfigurationError::InvalidEntityId(raw.to_string()))
            );
        }
    }

    #[test]
    fn entity_id_splits_domain() {
        let id = EntityId::parse("switch.boiler").unwrap();
        assert_eq!(id.domain(), "switch");
        assert_eq!(id.object_id(), "boiler");
    }

    #[test]
    fn entity_id_rejects_invalid_json() {
        let parsed = serde_json::from_str::<EntityId>("\"not an id\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn index_mode_matches_rendered_name() {
        assert!(ModeName::Index(0).matches("0"));
        assert!(!ModeName::Index(0).matches("00"));
        assert!(ModeName::Named("night".into()).matches("night"));
        assert_eq!(ModeName::Index(3).to_string(), "3");
    }

    #[test]
    fn kelvin_conversion() {
        assert!((TemperatureUnit::Celsius.from_kelvin(293.15) - 20.0).abs() < 1e-9);
        assert!((TemperatureUnit::Fahrenheit.from_kelvin(273.15) - 32.0).abs() < 1e-9);
        assert_eq!(TemperatureUnit::Kelvin.from_kelvin(280.0), 280.0);
    }
}
