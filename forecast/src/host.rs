use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use chrono::Utc;
use chrono_tz::Tz;
use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use tracing::{debug, info, warn};

use advanced_thermostat_common::{
    entity_attributes_topic, entity_state_topic, TOPIC_FORECAST_STATUS,
};

use crate::{
    config::ForecastConfig,
    owm::{OwmClient, WeatherData},
    sensor::build_sensors,
};

const SCAN_INTERVAL: Duration = Duration::from_secs(30);
const UNKNOWN_STATE: &str = "unknown";

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = load_config().await?;
    config.mqtt.apply_env_overrides();

    let (latitude, longitude) = config.coordinates()?;
    let timezone: Tz = config
        .timezone
        .parse()
        .map_err(|err| anyhow!("invalid timezone '{}': {err}", config.timezone))?;

    let client = OwmClient::new(config.api_key.clone()).context("unable to create forecast client")?;
    let mut weather = WeatherData::new(client, latitude, longitude);
    let mut sensors = build_sensors(&config)?;

    let mut mqtt_options = MqttOptions::new(
        "advanced-thermostat-forecast",
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    if !config.mqtt.user.is_empty() {
        mqtt_options.set_credentials(config.mqtt.user.clone(), config.mqtt.pass.clone());
    }
    mqtt_options.set_last_will(LastWill::new(
        TOPIC_FORECAST_STATUS,
        "offline",
        QoS::AtLeastOnce,
        true,
    ));

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 64);

    mqtt.publish(TOPIC_FORECAST_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish forecast online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("forecast mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    for sensor in &sensors {
        let body = serde_json::to_vec(&sensor.attributes())?;
        mqtt.publish(
            entity_attributes_topic(sensor.entity_id()),
            QoS::AtLeastOnce,
            true,
            body,
        )
        .await
        .context("failed to publish forecast sensor attributes")?;
    }

    info!(
        "forecast publisher started with {} sensors at ({latitude}, {longitude})",
        sensors.len()
    );

    let mut interval = tokio::time::interval(SCAN_INTERVAL);

    loop {
        interval.tick().await;

        match weather.update(Instant::now()).await {
            Ok(true) => debug!("forecast data refreshed"),
            Ok(false) => {}
            Err(err) => warn!("forecast update failed: {err}"),
        }

        let today = Utc::now().with_timezone(&timezone).date_naive();
        for sensor in sensors.iter_mut() {
            if !sensor.update(weather.forecast(), today) {
                continue;
            }

            let payload = sensor.state().unwrap_or(UNKNOWN_STATE).to_string();
            debug!("{} ({}) -> {payload}", sensor.name(), sensor.entity_id());
            mqtt.publish(
                entity_state_topic(sensor.entity_id()),
                QoS::AtLeastOnce,
                true,
                payload,
            )
            .await
            .context("failed to publish forecast sensor state")?;
        }
    }
}

async fn load_config() -> anyhow::Result<ForecastConfig> {
    let path = std::env::var("FORECAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./forecast.json"));
    let raw = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("invalid config {}", path.display()))
}
