use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use advanced_thermostat_common::{ConfigurationError, EntityId, TemperatureUnit};

use crate::{config::ForecastConfig, owm::ForecastEntry};

pub const ATTRIBUTION: &str = "Data provided by OpenWeatherMap";

pub const HOURLY_SENSORS: usize = 7;
pub const DAILY_OFFSETS: std::ops::RangeInclusive<i64> = 1..=3;

/// Daily sensors follow the slot starting at this UTC hour.
const DAILY_REFERENCE_HOUR: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    ForecastWeather,
    ForecastTemperature,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [Self::ForecastWeather, Self::ForecastTemperature];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::ForecastWeather => "Forecast Condition",
            Self::ForecastTemperature => "Forecast Temperature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Position in the forecast list; slot `i` covers `3 * (i + 1)` hours.
    Slot(usize),
    /// Days ahead of today.
    Day(i64),
}

impl Horizon {
    fn suffix(self) -> String {
        match self {
            Self::Slot(index) => format!("{}h", (index + 1) * 3),
            Self::Day(offset) => format!("{offset}d"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastSensor {
    name: String,
    entity_id: EntityId,
    kind: SensorKind,
    horizon: Horizon,
    unit: TemperatureUnit,
    state: Option<String>,
    published: bool,
}

impl ForecastSensor {
    pub fn new(
        client_name: &str,
        kind: SensorKind,
        horizon: Horizon,
        unit: TemperatureUnit,
    ) -> Result<Self, ConfigurationError> {
        let name = format!("{client_name} {}_{}", kind.display_name(), horizon.suffix());
        let entity_id = EntityId::parse(format!("sensor.{}", slugify(&name)))?;

        Ok(Self {
            name,
            entity_id,
            kind,
            horizon,
            unit,
            state: None,
            published: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn unit_of_measurement(&self) -> Option<&'static str> {
        match self.kind {
            SensorKind::ForecastTemperature => Some(self.unit.symbol()),
            SensorKind::ForecastWeather => None,
        }
    }

    pub fn attributes(&self) -> serde_json::Value {
        json!({
            "friendly_name": self.name,
            "attribution": ATTRIBUTION,
            "unit_of_measurement": self.unit_of_measurement(),
        })
    }

    /// Recomputes the state from `forecast`. Returns whether it has to be
    /// published: on the first call, then whenever it changed. A horizon with
    /// no matching slot leaves the state unknown.
    pub fn update(&mut self, forecast: &[ForecastEntry], today: NaiveDate) -> bool {
        let next = self.followed(forecast, today).and_then(|slot| match self.kind {
            SensorKind::ForecastWeather => slot.status().map(str::to_string),
            SensorKind::ForecastTemperature => Some(format!("{:.1}", slot.temperature(self.unit))),
        });

        if self.published && next == self.state {
            return false;
        }
        self.published = true;
        self.state = next;
        true
    }

    fn followed<'a>(&self, forecast: &'a [ForecastEntry], today: NaiveDate) -> Option<&'a ForecastEntry> {
        match self.horizon {
            Horizon::Slot(index) => forecast.get(index),
            Horizon::Day(offset) => {
                let target = (today + Duration::days(offset))
                    .and_hms_opt(DAILY_REFERENCE_HOUR, 0, 0)?
                    .and_utc()
                    .timestamp();
                forecast.iter().find(|slot| slot.dt == target)
            }
        }
    }
}

pub fn build_sensors(config: &ForecastConfig) -> Result<Vec<ForecastSensor>, ConfigurationError> {
    let kinds = config.sensor_kinds();
    let mut sensors = Vec::new();

    for index in 0..HOURLY_SENSORS {
        for kind in &kinds {
            sensors.push(ForecastSensor::new(
                &config.name,
                *kind,
                Horizon::Slot(index),
                config.temperature_unit,
            )?);
        }
    }

    for offset in DAILY_OFFSETS {
        for kind in &kinds {
            sensors.push(ForecastSensor::new(
                &config.name,
                *kind,
                Horizon::Day(offset),
                config.temperature_unit,
            )?);
        }
    }

    Ok(sensors)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owm::tests::entry;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn utc(day: u32, hour: u32) -> i64 {
        chrono::Utc
            .with_ymd_and_hms(2026, 1, day, hour, 0, 0)
            .unwrap()
            .timestamp()
    }

    fn config(raw: &str) -> ForecastConfig {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn builds_hourly_and_daily_sensors() {
        let sensors = build_sensors(&config(r#"{ "api_key": "k" }"#)).unwrap();

        assert_eq!(sensors.len(), (HOURLY_SENSORS + 3) * 2);
        assert_eq!(sensors[0].name(), "OWM Forecast Condition_3h");
        assert_eq!(sensors[1].name(), "OWM Forecast Temperature_3h");
        assert_eq!(sensors[13].name(), "OWM Forecast Temperature_21h");
        assert_eq!(sensors[14].name(), "OWM Forecast Condition_1d");
        assert_eq!(
            sensors[19].entity_id().as_str(),
            "sensor.owm_forecast_temperature_3d"
        );
    }

    #[test]
    fn monitored_conditions_limit_sensors() {
        let sensors = build_sensors(&config(
            r#"{ "api_key": "k", "name": "Home", "monitored_conditions": ["forecast_weather"] }"#,
        ))
        .unwrap();

        assert_eq!(sensors.len(), HOURLY_SENSORS + 3);
        assert!(sensors
            .iter()
            .all(|sensor| sensor.name().starts_with("Home Forecast Condition_")));
    }

    #[test]
    fn slot_sensor_follows_list_position() {
        let forecast = vec![
            entry(utc(5, 12), 280.15, "Rain"),
            entry(utc(5, 15), 283.15, "Clouds"),
        ];
        let mut condition = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastWeather,
            Horizon::Slot(1),
            TemperatureUnit::Celsius,
        )
        .unwrap();
        let mut temperature = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastTemperature,
            Horizon::Slot(0),
            TemperatureUnit::Celsius,
        )
        .unwrap();

        assert!(condition.update(&forecast, today()));
        assert!(temperature.update(&forecast, today()));
        assert_eq!(condition.state(), Some("Clouds"));
        assert_eq!(temperature.state(), Some("7.0"));
        assert!(!temperature.update(&forecast, today()));
    }

    #[test]
    fn day_sensor_matches_afternoon_slot() {
        let forecast = vec![
            entry(utc(6, 12), 270.15, "Snow"),
            entry(utc(6, 15), 272.15, "Clear"),
            entry(utc(7, 15), 275.15, "Rain"),
        ];
        let mut tomorrow = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastWeather,
            Horizon::Day(1),
            TemperatureUnit::Celsius,
        )
        .unwrap();
        let mut in_two_days = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastTemperature,
            Horizon::Day(2),
            TemperatureUnit::Fahrenheit,
        )
        .unwrap();

        tomorrow.update(&forecast, today());
        in_two_days.update(&forecast, today());

        assert_eq!(tomorrow.state(), Some("Clear"));
        assert_eq!(in_two_days.state(), Some("35.6"));
        assert_eq!(in_two_days.unit_of_measurement(), Some("°F"));
    }

    #[test]
    fn missing_slot_leaves_state_unknown() {
        let forecast = vec![entry(utc(6, 12), 270.15, "Snow")];
        let mut sensor = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastWeather,
            Horizon::Day(3),
            TemperatureUnit::Celsius,
        )
        .unwrap();

        assert!(sensor.update(&forecast, today()));
        assert_eq!(sensor.state(), None);
        assert!(!sensor.update(&forecast, today()));

        let mut slot = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastWeather,
            Horizon::Slot(5),
            TemperatureUnit::Celsius,
        )
        .unwrap();
        assert!(slot.update(&forecast, today()));
        assert!(!slot.update(&forecast, today()));
    }

    #[test]
    fn first_update_without_forecast_reports_unknown() {
        let mut sensor = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastTemperature,
            Horizon::Day(1),
            TemperatureUnit::Celsius,
        )
        .unwrap();

        assert!(sensor.update(&[], today()));
        assert_eq!(sensor.state(), None);
        assert!(!sensor.update(&[], today()));

        let forecast = vec![entry(utc(6, 15), 283.15, "Clear")];
        assert!(sensor.update(&forecast, today()));
        assert_eq!(sensor.state(), Some("10.0"));
        assert!(sensor.update(&[], today()));
        assert_eq!(sensor.state(), None);
    }

    #[test]
    fn attributes_carry_attribution() {
        let sensor = ForecastSensor::new(
            "OWM",
            SensorKind::ForecastWeather,
            Horizon::Slot(0),
            TemperatureUnit::Celsius,
        )
        .unwrap();
        let attributes = sensor.attributes();

        assert_eq!(attributes["attribution"], ATTRIBUTION);
        assert_eq!(attributes["unit_of_measurement"], serde_json::Value::Null);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("My Home  Forecast_3h"), "my_home_forecast_3h");
        assert_eq!(slugify("-OWM-"), "owm");
    }
}
