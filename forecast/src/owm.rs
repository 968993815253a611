//! OpenWeatherMap 3-hour forecast client and the throttled data holder the
//! sensors read from.

use std::{
    future::Future,
    time::{Duration, Instant},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use advanced_thermostat_common::TemperatureUnit;

pub const MIN_TIME_BETWEEN_UPDATES: Duration = Duration::from_secs(120);

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("forecast api answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("latitude or longitude not set in forecast config")]
    MissingCoordinates,
}

#[derive(Debug, Clone, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
}

/// One 3-hour slot of the forecast.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastEntry {
    /// Reference time, unix seconds UTC.
    pub dt: i64,
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MainReadings {
    /// Kelvin, the API default.
    pub temp: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherCondition {
    pub main: String,
}

impl ForecastEntry {
    pub fn status(&self) -> Option<&str> {
        self.weather.first().map(|condition| condition.main.as_str())
    }

    /// Temperature in `unit`, rounded to one decimal.
    pub fn temperature(&self, unit: TemperatureUnit) -> f64 {
        (unit.from_kelvin(self.main.temp) * 10.0).round() / 10.0
    }
}

pub trait ForecastSource {
    fn three_hours_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = Result<Vec<ForecastEntry>, ForecastError>> + Send;
}

#[derive(Clone)]
pub struct OwmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OwmClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ForecastError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }
}

impl ForecastSource for OwmClient {
    async fn three_hours_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<ForecastEntry>, ForecastError> {
        let url = format!("{}/data/2.5/forecast", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ForecastError::Status(response.status()));
        }

        let body = response.json::<ForecastResponse>().await?;
        debug!("received {} forecast slots", body.list.len());
        Ok(body.list)
    }
}

/// Lets a call through at most once per `min_interval`, counted from the
/// last successful run.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_run: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_run: None,
        }
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.last_run
            .map(|last| now.saturating_duration_since(last) >= self.min_interval)
            .unwrap_or(true)
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_run = Some(now);
    }
}

pub struct WeatherData<C> {
    client: C,
    latitude: f64,
    longitude: f64,
    throttle: Throttle,
    forecast: Vec<ForecastEntry>,
}

impl<C: ForecastSource> WeatherData<C> {
    pub fn new(client: C, latitude: f64, longitude: f64) -> Self {
        Self {
            client,
            latitude,
            longitude,
            throttle: Throttle::new(MIN_TIME_BETWEEN_UPDATES),
            forecast: Vec::new(),
        }
    }

    /// Refreshes the forecast unless throttled. Returns whether a fetch
    /// happened; a failed fetch keeps the previous forecast and does not
    /// arm the throttle.
    pub async fn update(&mut self, now: Instant) -> Result<bool, ForecastError> {
        if !self.throttle.ready(now) {
            return Ok(false);
        }

        self.forecast = self
            .client
            .three_hours_forecast(self.latitude, self.longitude)
            .await?;
        self.throttle.mark(now);
        info!("forecast refreshed ({} slots)", self.forecast.len());
        Ok(true)
    }

    pub fn forecast(&self) -> &[ForecastEntry] {
        &self.forecast
    }
}
