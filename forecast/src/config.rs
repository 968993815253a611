use serde::Deserialize;

use advanced_thermostat_common::{MqttConfig, TemperatureUnit};

use crate::{owm::ForecastError, sensor::SensorKind};

pub const DEFAULT_NAME: &str = "OWM";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForecastConfig {
    pub api_key: String,
    #[serde(default = "default_name")]
    pub name: String,
    /// Empty means every sensor kind.
    #[serde(default)]
    pub monitored_conditions: Vec<SensorKind>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl ForecastConfig {
    pub fn coordinates(&self) -> Result<(f64, f64), ForecastError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok((latitude, longitude)),
            _ => Err(ForecastError::MissingCoordinates),
        }
    }

    pub fn sensor_kinds(&self) -> Vec<SensorKind> {
        if self.monitored_conditions.is_empty() {
            SensorKind::ALL.to_vec()
        } else {
            SensorKind::ALL
                .into_iter()
                .filter(|kind| self.monitored_conditions.contains(kind))
                .collect()
        }
    }
}
