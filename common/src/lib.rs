pub mod config;
pub mod controller;
pub mod error;
pub mod modes;
pub mod sensors;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use config::{HeatingConfig, ModeConfig, MqttConfig, RuntimeConfig, ThermostatConfig};
pub use controller::{parse_temperature, DeviceRegistry, ModeSwitchController};
pub use error::{ConfigurationError, ControllerError, SubscriptionError, UnknownModeError};
pub use modes::{OperationMode, OperationModeTable};
pub use sensors::{SensorStates, SensorSubscriptions, SensorValueSource, SubscriptionHandle};
pub use thermostat::{HeatingController, HeatingEvaluator};
pub use topics::*;
pub use types::{EntityId, HeatingDecision, HvacAction, ModeName, TemperatureUnit, ThermostatStatus};
