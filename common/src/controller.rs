use tracing::{debug, info, warn};

use crate::{
    config::ThermostatConfig,
    error::{ControllerError, SubscriptionError, UnknownModeError},
    modes::{OperationMode, OperationModeTable},
    sensors::{SensorSubscriptions, SensorValueSource, SubscriptionHandle},
    thermostat::HeatingEvaluator,
    types::{EntityId, HeatingDecision, ModeName, TemperatureUnit, ThermostatStatus},
};

/// Host-side lifecycle of the thermostat device.
pub trait DeviceRegistry {
    type Error;

    fn register(&mut self, status: &ThermostatStatus) -> Result<(), Self::Error>;

    fn deregister(&mut self, name: &str);
}

/// Thermostat with named operation modes. Each mode binds the controller to
/// its own target sensor and setpoint; heating decisions are delegated to the
/// composed evaluator.
pub struct ModeSwitchController<E, S> {
    name: String,
    heater: EntityId,
    unit: TemperatureUnit,
    min_temp: f32,
    max_temp: f32,
    tolerance: f32,

    modes: OperationModeTable,
    evaluator: E,
    sensors: S,

    current_mode: ModeName,
    active_sensor: EntityId,
    subscription: Option<SubscriptionHandle>,
    target_temp: f32,
    current_temp: Option<f32>,
}

impl<E, S> ModeSwitchController<E, S>
where
    E: HeatingEvaluator,
    S: SensorSubscriptions + SensorValueSource,
{
    /// Builds the mode table and binds the default mode's sensor. The latest
    /// reading of that sensor is picked up but not evaluated; call
    /// `control_heating` once the actuator is ready.
    pub fn new(config: &ThermostatConfig, evaluator: E, sensors: S) -> Result<Self, ControllerError> {
        config.validate()?;
        let modes = OperationModeTable::build(
            &config.operation_list,
            &config.target_sensor,
            config.target_temp,
        )?;
        let heating = config.heating();

        let current_mode = modes.default_mode().clone();
        let default = modes
            .mode(&current_mode)
            .cloned()
            .ok_or_else(|| UnknownModeError::new(current_mode.to_string()))?;

        let mut controller = Self {
            name: config.name.clone(),
            heater: config.heater.clone(),
            unit: config.temperature_unit,
            min_temp: heating.min_temp,
            max_temp: heating.max_temp,
            tolerance: heating.tolerance,
            modes,
            evaluator,
            sensors,
            current_mode,
            active_sensor: default.target_sensor.clone(),
            subscription: None,
            target_temp: default.target_setpoint.unwrap_or(heating.default_target()),
            current_temp: None,
        };

        controller.rebind(&default.target_sensor)?;
        controller.current_temp = controller.read_active_sensor();
        info!(
            "{}: starting in operation mode '{}' on {}",
            controller.name, controller.current_mode, controller.active_sensor
        );

        Ok(controller)
    }

    /// Switches to `requested`, rebinding the sensor subscription and
    /// evaluating immediately when the new sensor already has a reading.
    /// On error nothing changes.
    pub fn select(&mut self, requested: &str, now_ms: u64) -> Result<HeatingDecision, ControllerError> {
        let (name, mode): (ModeName, OperationMode) = match self.modes.get(requested) {
            Some((name, mode)) => (name.clone(), mode.clone()),
            None => return Err(UnknownModeError::new(requested).into()),
        };

        self.rebind(&mode.target_sensor)?;

        self.current_mode = name;
        if let Some(setpoint) = mode.target_setpoint {
            self.target_temp = setpoint;
        }
        info!(
            "{}: operation mode '{}' (sensor {}, target {:.1})",
            self.name, self.current_mode, self.active_sensor, self.target_temp
        );

        match self.read_active_sensor() {
            Some(temp) => {
                self.current_temp = Some(temp);
                Ok(self.control_heating(now_ms))
            }
            None => {
                debug!("{} has no reading yet, waiting for the next update", self.active_sensor);
                self.current_temp = None;
                Ok(HeatingDecision::NoChange)
            }
        }
    }

    pub fn set_operation_mode(
        &mut self,
        requested: &str,
        now_ms: u64,
    ) -> Result<HeatingDecision, ControllerError> {
        self.select(requested, now_ms)
    }

    /// Shared temperature-update handler for the bound sensor.
    pub fn handle_sensor_update(&mut self, entity: &EntityId, raw: &str, now_ms: u64) -> HeatingDecision {
        if self.subscription.is_none() || entity != &self.active_sensor {
            debug!("ignoring update from unbound sensor {entity}");
            return HeatingDecision::NoChange;
        }

        let Some(temp) = parse_temperature(raw) else {
            warn!("unable to use state '{raw}' of {entity} as a temperature");
            return HeatingDecision::NoChange;
        };

        self.current_temp = Some(temp);
        self.control_heating(now_ms)
    }

    pub fn set_temperature(&mut self, value: f32, now_ms: u64) -> Result<HeatingDecision, ControllerError> {
        if !value.is_finite() || value < self.min_temp || value > self.max_temp {
            return Err(ControllerError::InvalidTemperature {
                value,
                min: self.min_temp,
                max: self.max_temp,
            });
        }

        self.target_temp = value;
        Ok(self.control_heating(now_ms))
    }

    pub fn control_heating(&mut self, now_ms: u64) -> HeatingDecision {
        match self.current_temp {
            Some(current) => self.evaluator.evaluate(current, self.target_temp, now_ms),
            None => HeatingDecision::NoChange,
        }
    }

    pub fn set_heater_state(&mut self, on: bool, now_ms: u64) {
        self.evaluator.sync_heater_state(on, now_ms);
    }

    pub fn register<R: DeviceRegistry>(&self, registry: &mut R) -> Result<(), R::Error> {
        registry.register(&self.status())
    }

    /// Releases the live subscription and removes the device from the host.
    pub fn shutdown<R: DeviceRegistry>(&mut self, registry: &mut R) -> Result<(), SubscriptionError> {
        if let Some(handle) = self.subscription.take() {
            self.sensors.unsubscribe(handle)?;
        }
        registry.deregister(&self.name);
        info!("{}: shut down", self.name);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn heater(&self) -> &EntityId {
        &self.heater
    }

    pub fn current_mode(&self) -> &ModeName {
        &self.current_mode
    }

    pub fn operation_list(&self) -> Vec<String> {
        self.modes.names().map(ToString::to_string).collect()
    }

    pub fn modes(&self) -> &OperationModeTable {
        &self.modes
    }

    pub fn target_temp(&self) -> f32 {
        self.target_temp
    }

    pub fn current_temp(&self) -> Option<f32> {
        self.current_temp
    }

    pub fn active_sensor(&self) -> &EntityId {
        &self.active_sensor
    }

    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        self.subscription
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn status(&self) -> ThermostatStatus {
        ThermostatStatus {
            name: self.name.clone(),
            heater: self.heater.to_string(),
            current_temp: self.current_temp,
            target_temp: self.target_temp,
            min_temp: self.min_temp,
            max_temp: self.max_temp,
            tolerance: self.tolerance,
            operation_mode: self.current_mode.to_string(),
            operation_list: self.operation_list(),
            icon: self
                .modes
                .mode(&self.current_mode)
                .and_then(|mode| mode.icon.clone()),
            target_sensor: self.active_sensor.to_string(),
            heater_on: self.evaluator.is_heater_on(),
            hvac_action: self.evaluator.hvac_action().as_str(),
            unit: self.unit.symbol(),
        }
    }

    /// Unsubscribe-then-subscribe, so two subscriptions never coexist. A
    /// failed subscribe restores the previous binding; if that fails too the
    /// controller stays unbound until the next successful `select`.
    fn rebind(&mut self, sensor: &EntityId) -> Result<(), SubscriptionError> {
        let previous = self.subscription.take();
        if let Some(handle) = previous {
            if let Err(err) = self.sensors.unsubscribe(handle) {
                self.subscription = Some(handle);
                return Err(err);
            }
        }

        match self.sensors.subscribe(sensor) {
            Ok(handle) => {
                self.subscription = Some(handle);
                self.active_sensor = sensor.clone();
                Ok(())
            }
            Err(err) => {
                if previous.is_some() {
                    match self.sensors.subscribe(&self.active_sensor) {
                        Ok(restored) => self.subscription = Some(restored),
                        Err(restore_err) => warn!(
                            "{}: lost subscription to {}: {restore_err}",
                            self.name, self.active_sensor
                        ),
                    }
                }
                Err(err)
            }
        }
    }

    fn read_active_sensor(&self) -> Option<f32> {
        self.sensors
            .read(&self.active_sensor)
            .and_then(|raw| parse_temperature(&raw))
    }
}

/// Parses a sensor state; `unknown`, `unavailable` and garbage yield `None`.
pub fn parse_temperature(raw: &str) -> Option<f32> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
}
