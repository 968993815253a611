use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use advanced_thermostat_common::{
    entity_command_topic, entity_from_state_topic, ControllerError, DeviceRegistry, EntityId,
    HeatingController, HeatingDecision, ModeSwitchController, RuntimeConfig, SensorStates,
    ThermostatStatus, TOPIC_CMD_OPERATION_MODE, TOPIC_CMD_TARGET, TOPIC_CONTROLLER_STATE,
    TOPIC_CONTROLLER_STATUS, TOPIC_ENTITY_STATE_FILTER,
};

type Thermostat = ModeSwitchController<HeatingController, SensorStates>;

#[derive(Clone)]
struct AppState {
    thermostat: Arc<Mutex<Thermostat>>,
    mqtt: AsyncClient,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct ModeView {
    name: String,
    #[serde(rename = "targetSensor")]
    target_sensor: String,
    #[serde(rename = "targetTemp")]
    target_temp: Option<f32>,
    icon: Option<String>,
}

#[derive(Debug, Serialize)]
struct ModesView {
    current: String,
    modes: Vec<ModeView>,
}

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

/// Announces the thermostat on the broker; the last will covers unclean exits.
struct MqttDeviceRegistry {
    mqtt: AsyncClient,
}

impl DeviceRegistry for MqttDeviceRegistry {
    type Error = anyhow::Error;

    fn register(&mut self, status: &ThermostatStatus) -> Result<(), Self::Error> {
        self.mqtt
            .try_publish(TOPIC_CONTROLLER_STATUS, QoS::AtLeastOnce, true, "online")
            .context("failed to publish controller online status")?;
        let body = serde_json::to_vec(status)?;
        self.mqtt
            .try_publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
            .context("failed to publish initial controller state")?;
        info!("registered thermostat '{}'", status.name);
        Ok(())
    }

    fn deregister(&mut self, name: &str) {
        if let Err(err) =
            self.mqtt
                .try_publish(TOPIC_CONTROLLER_STATUS, QoS::AtLeastOnce, true, "offline")
        {
            warn!("failed to publish offline status for '{name}': {err}");
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = load_runtime_config().await?;
    runtime.mqtt.apply_env_overrides();

    let heating = HeatingController::new(runtime.thermostat.heating());
    let thermostat = ModeSwitchController::new(&runtime.thermostat, heating, SensorStates::new())
        .context("invalid thermostat configuration")?;

    let mut mqtt_options = MqttOptions::new(
        "advanced-thermostat-controller",
        runtime.mqtt.host.clone(),
        runtime.mqtt.port,
    );
    if !runtime.mqtt.user.is_empty() {
        mqtt_options.set_credentials(runtime.mqtt.user.clone(), runtime.mqtt.pass.clone());
    }
    mqtt_options.set_last_will(LastWill::new(
        TOPIC_CONTROLLER_STATUS,
        "offline",
        QoS::AtLeastOnce,
        true,
    ));

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let mut registry = MqttDeviceRegistry { mqtt: mqtt.clone() };
    thermostat.register(&mut registry)?;

    let app_state = AppState {
        thermostat: Arc::new(Mutex::new(thermostat)),
        mqtt,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_state_publish_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/modes", get(handle_get_modes))
        .route("/api/mode", post(handle_set_mode))
        .route("/api/target", post(handle_set_target))
        .with_state(app_state.clone());

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.http_port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state
        .thermostat
        .lock()
        .await
        .shutdown(&mut registry)
        .context("failed to release sensor subscription")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let path = std::env::var("THERMOSTAT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./thermostat.json"));
    let raw = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_runtime_config(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_runtime_config(raw: &[u8]) -> anyhow::Result<RuntimeConfig> {
    let runtime = serde_json::from_slice::<RuntimeConfig>(raw)?;
    runtime.thermostat.validate()?;
    Ok(runtime)
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_ENTITY_STATE_FILTER,
        TOPIC_CMD_OPERATION_MODE,
        TOPIC_CMD_TARGET,
    ];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;

            let payload = {
                let thermostat = app_state.thermostat.lock().await;
                serde_json::to_vec(&thermostat.status())
            };

            match payload {
                Ok(body) => {
                    if let Err(err) = app_state
                        .mqtt
                        .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                        .await
                    {
                        warn!("controller state publish failed: {err}");
                    }
                }
                Err(err) => warn!("controller state serialization failed: {err}"),
            }
        }
    });
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let mut thermostat = app_state.thermostat.lock().await;
    let decision = route_message(&mut thermostat, &topic, message.trim(), monotonic_ms());
    apply_decision(&app_state.mqtt, thermostat.heater(), decision).await;
    Ok(())
}

/// Dispatches one broker message to the thermostat. Sensor states only reach
/// the controller when it is subscribed to that entity.
fn route_message(
    thermostat: &mut Thermostat,
    topic: &str,
    message: &str,
    now_ms: u64,
) -> HeatingDecision {
    match topic {
        TOPIC_CMD_OPERATION_MODE => thermostat
            .set_operation_mode(message, now_ms)
            .unwrap_or_else(|err| {
                warn!("rejected operation mode command: {err}");
                HeatingDecision::NoChange
            }),
        TOPIC_CMD_TARGET => match message.parse::<f32>() {
            Ok(target) => thermostat
                .set_temperature(target, now_ms)
                .unwrap_or_else(|err| {
                    warn!("rejected target command: {err}");
                    HeatingDecision::NoChange
                }),
            Err(_) => {
                warn!("ignoring non-numeric target '{message}'");
                HeatingDecision::NoChange
            }
        },
        _ => {
            let Some(entity) = entity_from_state_topic(topic) else {
                return HeatingDecision::NoChange;
            };

            if &entity == thermostat.heater() {
                match message.to_ascii_uppercase().as_str() {
                    "ON" => thermostat.set_heater_state(true, now_ms),
                    "OFF" => thermostat.set_heater_state(false, now_ms),
                    other => warn!("unexpected heater state '{other}'"),
                }
                return HeatingDecision::NoChange;
            }

            if thermostat.sensors_mut().set_state(&entity, message) {
                thermostat.handle_sensor_update(&entity, message, now_ms)
            } else {
                HeatingDecision::NoChange
            }
        }
    }
}

fn heater_command(heater: &EntityId, decision: HeatingDecision) -> Option<(String, &'static str)> {
    decision
        .switch_payload()
        .map(|payload| (entity_command_topic(heater), payload))
}

/// Callers hold the thermostat lock, so commands reach the broker in the
/// order the decisions were made.
async fn apply_decision(mqtt: &AsyncClient, heater: &EntityId, decision: HeatingDecision) {
    let Some((topic, payload)) = heater_command(heater, decision) else {
        return;
    };

    info!("switching {heater} {payload}");
    if let Err(err) = mqtt.publish(topic, QoS::AtLeastOnce, false, payload).await {
        warn!("heater command publish failed: {err}");
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.thermostat.lock().await.status();
    Json(status)
}

async fn handle_get_modes(State(state): State<AppState>) -> impl IntoResponse {
    let thermostat = state.thermostat.lock().await;
    let modes = thermostat
        .modes()
        .iter()
        .map(|(name, mode)| ModeView {
            name: name.to_string(),
            target_sensor: mode.target_sensor.to_string(),
            target_temp: mode.target_setpoint,
            icon: mode.icon.clone(),
        })
        .collect();

    Json(ModesView {
        current: thermostat.current_mode().to_string(),
        modes,
    })
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };

    {
        let mut thermostat = state.thermostat.lock().await;
        match thermostat.set_operation_mode(value, monotonic_ms()) {
            Ok(decision) => apply_decision(&state.mqtt, thermostat.heater(), decision).await,
            Err(err) => return controller_error_response(&err),
        }
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(target) = value.parse::<f32>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };

    {
        let mut thermostat = state.thermostat.lock().await;
        match thermostat.set_temperature(target, monotonic_ms()) {
            Ok(decision) => apply_decision(&state.mqtt, thermostat.heater(), decision).await,
            Err(err) => return controller_error_response(&err),
        }
    }

    handle_get_status(State(state)).await.into_response()
}

fn controller_error_response(err: &ControllerError) -> axum::response::Response {
    let status = match err {
        ControllerError::UnknownMode(_) | ControllerError::InvalidTemperature { .. } => {
            StatusCode::BAD_REQUEST
        }
        ControllerError::Subscription(_) => StatusCode::SERVICE_UNAVAILABLE,
        ControllerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
