use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigurationError,
    types::{EntityId, TemperatureUnit},
};

pub const DEFAULT_NAME: &str = "Advanced Thermostat";
pub const DEFAULT_OPERATION_NAME: &str = "default";
pub const DEFAULT_TOLERANCE: f32 = 0.3;
pub const DEFAULT_MIN_TEMP: f32 = 7.0;
pub const DEFAULT_MAX_TEMP: f32 = 35.0;

/// One entry of `operation_list`. Unset fields fall back to the thermostat
/// level `target_sensor` / `target_temp`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_sensor: Option<EntityId>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub target_temp: Option<f32>,
}

impl ModeConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThermostatConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub heater: EntityId,
    pub target_sensor: EntityId,
    #[serde(default)]
    pub min_temp: Option<f32>,
    #[serde(default)]
    pub max_temp: Option<f32>,
    #[serde(default)]
    pub target_temp: Option<f32>,
    #[serde(default)]
    pub ac_mode: bool,
    #[serde(rename = "min_cycle_duration", default)]
    pub min_cycle_duration_s: Option<u64>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
    #[serde(default = "default_operation_list")]
    pub operation_list: Vec<ModeConfig>,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_tolerance() -> f32 {
    DEFAULT_TOLERANCE
}

fn default_operation_list() -> Vec<ModeConfig> {
    vec![ModeConfig::named(DEFAULT_OPERATION_NAME)]
}

impl ThermostatConfig {
    pub fn new(heater: EntityId, target_sensor: EntityId) -> Self {
        Self {
            name: default_name(),
            heater,
            target_sensor,
            min_temp: None,
            max_temp: None,
            target_temp: None,
            ac_mode: false,
            min_cycle_duration_s: None,
            tolerance: DEFAULT_TOLERANCE,
            operation_list: default_operation_list(),
            temperature_unit: TemperatureUnit::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigurationError::InvalidTolerance(self.tolerance));
        }

        let heating = self.heating();
        if heating.min_temp > heating.max_temp {
            return Err(ConfigurationError::InvalidTemperatureRange {
                min: heating.min_temp,
                max: heating.max_temp,
            });
        }

        if self.operation_list.is_empty() {
            return Err(ConfigurationError::EmptyOperationList);
        }

        let setpoints = self
            .operation_list
            .iter()
            .filter_map(|mode| mode.target_temp)
            .chain(self.target_temp);
        for value in setpoints {
            if !value.is_finite() || value < heating.min_temp || value > heating.max_temp {
                return Err(ConfigurationError::SetpointOutOfRange {
                    value,
                    min: heating.min_temp,
                    max: heating.max_temp,
                });
            }
        }
        Ok(())
    }

    pub fn heating(&self) -> HeatingConfig {
        HeatingConfig {
            tolerance: self.tolerance,
            ac_mode: self.ac_mode,
            min_cycle_ms: self
                .min_cycle_duration_s
                .map(|secs| secs.saturating_mul(1_000)),
            min_temp: self.min_temp.unwrap_or(DEFAULT_MIN_TEMP),
            max_temp: self.max_temp.unwrap_or(DEFAULT_MAX_TEMP),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatingConfig {
    pub tolerance: f32,
    pub ac_mode: bool,
    pub min_cycle_ms: Option<u64>,
    pub min_temp: f32,
    pub max_temp: f32,
}

impl Default for HeatingConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            ac_mode: false,
            min_cycle_ms: None,
            min_temp: DEFAULT_MIN_TEMP,
            max_temp: DEFAULT_MAX_TEMP,
        }
    }
}

impl HeatingConfig {
    /// Setpoint used until a mode or the user provides one.
    pub fn default_target(&self) -> f32 {
        if self.ac_mode {
            self.max_temp
        } else {
            self.min_temp
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
        }
    }
}

impl MqttConfig {
    /// `MQTT_*` environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MQTT_HOST") {
            self.host = host;
        }
        if let Some(port) = std::env::var("MQTT_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Ok(user) = std::env::var("MQTT_USER") {
            self.user = user;
        }
        if let Ok(pass) = std::env::var("MQTT_PASS") {
            self.pass = pass;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_http_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_json() -> &'static str {
        r#"{ "heater": "switch.heater", "target_sensor": "sensor.hall" }"#
    }

    #[test]
    fn defaults_apply_for_minimal_config() {
        let config: ThermostatConfig = serde_json::from_str(minimal_json()).unwrap();

        assert_eq!(config.name, DEFAULT_NAME);
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(config.operation_list, vec![ModeConfig::named("default")]);
        assert_eq!(config.min_cycle_duration_s, None);
        assert!(!config.ac_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_operation_list_and_cycle_duration() {
        let raw = r#"{
            "heater": "switch.heater",
            "target_sensor": "sensor.hall",
            "min_cycle_duration": 300,
            "operation_list": [
                { "name": "day", "target_sensor": "sensor.living", "target_temp": 21.0 },
                { "target_temp": 17.5, "icon": "mdi:weather-night" }
            ]
        }"#;
        let config: ThermostatConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.heating().min_cycle_ms, Some(300_000));
        assert_eq!(config.operation_list.len(), 2);
        assert_eq!(config.operation_list[1].name, None);
        assert_eq!(
            config.operation_list[1].icon.as_deref(),
            Some("mdi:weather-night")
        );
    }

    #[test]
    fn rejects_unknown_mode_keys() {
        let raw = r#"{
            "heater": "switch.heater",
            "target_sensor": "sensor.hall",
            "operation_list": [{ "name": "day", "setpoint": 21.0 }]
        }"#;
        assert!(serde_json::from_str::<ThermostatConfig>(raw).is_err());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let mut config: ThermostatConfig = serde_json::from_str(minimal_json()).unwrap();
        config.min_temp = Some(25.0);
        config.max_temp = Some(18.0);

        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidTemperatureRange {
                min: 25.0,
                max: 18.0
            })
        );
    }

    #[test]
    fn validate_rejects_empty_operation_list() {
        let mut config: ThermostatConfig = serde_json::from_str(minimal_json()).unwrap();
        config.operation_list.clear();

        assert_eq!(
            config.validate(),
            Err(ConfigurationError::EmptyOperationList)
        );
    }

    #[test]
    fn validate_rejects_setpoints_outside_range() {
        let mut config: ThermostatConfig = serde_json::from_str(minimal_json()).unwrap();
        config.max_temp = Some(25.0);
        config.target_temp = Some(26.0);

        assert_eq!(
            config.validate(),
            Err(ConfigurationError::SetpointOutOfRange {
                value: 26.0,
                min: DEFAULT_MIN_TEMP,
                max: 25.0
            })
        );

        config.target_temp = Some(20.0);
        config.operation_list = vec![ModeConfig {
            target_temp: Some(5.0),
            ..ModeConfig::named("frost")
        }];
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::SetpointOutOfRange { value, .. }) if value == 5.0
        ));
    }

    #[test]
    fn huge_min_cycle_saturates() {
        let mut config: ThermostatConfig = serde_json::from_str(minimal_json()).unwrap();
        config.min_cycle_duration_s = Some(u64::MAX);

        assert_eq!(config.heating().min_cycle_ms, Some(u64::MAX));
    }

    #[test]
    fn default_target_follows_ac_mode() {
        let mut heating = HeatingConfig::default();
        assert_eq!(heating.default_target(), DEFAULT_MIN_TEMP);
        heating.ac_mode = true;
        assert_eq!(heating.default_target(), DEFAULT_MAX_TEMP);
    }
}
