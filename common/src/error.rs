use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("operation_list must contain at least one mode")]
    EmptyOperationList,
    #[error("operation mode '{0}' is defined more than once")]
    DuplicateMode(String),
    #[error("invalid entity id '{0}'")]
    InvalidEntityId(String),
    #[error("min_temp {min} is above max_temp {max}")]
    InvalidTemperatureRange { min: f32, max: f32 },
    #[error("tolerance must be a finite, non-negative number (got {0})")]
    InvalidTolerance(f32),
    #[error("target temperature {value} is outside [{min}, {max}]")]
    SetpointOutOfRange { value: f32, min: f32, max: f32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation mode '{requested}'")]
pub struct UnknownModeError {
    pub requested: String,
}

impl UnknownModeError {
    pub fn new(requested: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("subscription handle {0} is not active")]
    UnknownHandle(u64),
    #[error("subscription to {entity} rejected: {reason}")]
    Rejected { entity: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    UnknownMode(#[from] UnknownModeError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error("target temperature {value} outside [{min}, {max}]")]
    InvalidTemperature { value: f32, min: f32, max: f32 },
}
