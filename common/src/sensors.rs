use std::collections::{BTreeMap, HashMap};

use crate::{error::SubscriptionError, types::EntityId};

/// Token for one live sensor-change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(pub u64);

pub trait SensorSubscriptions {
    fn subscribe(&mut self, entity: &EntityId) -> Result<SubscriptionHandle, SubscriptionError>;

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<(), SubscriptionError>;
}

pub trait SensorValueSource {
    /// Latest raw state of `entity`, `None` if it never reported.
    fn read(&self, entity: &EntityId) -> Option<String>;
}

/// Latest-state store plus listener registry. The host feeds every incoming
/// state into `set_state` and forwards it to the controller only when a
/// listener is bound to that entity.
#[derive(Debug, Default)]
pub struct SensorStates {
    states: HashMap<EntityId, String>,
    listeners: BTreeMap<SubscriptionHandle, EntityId>,
    next_handle: u64,
}

impl SensorStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the new state and reports whether anyone listens to it.
    pub fn set_state(&mut self, entity: &EntityId, value: impl Into<String>) -> bool {
        self.states.insert(entity.clone(), value.into());
        self.is_subscribed(entity)
    }

    pub fn is_subscribed(&self, entity: &EntityId) -> bool {
        self.listeners.values().any(|bound| bound == entity)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn subscribed_entities(&self) -> impl Iterator<Item = &EntityId> {
        self.listeners.values()
    }
}

impl SensorSubscriptions for SensorStates {
    fn subscribe(&mut self, entity: &EntityId) -> Result<SubscriptionHandle, SubscriptionError> {
        self.next_handle += 1;
        let handle = SubscriptionHandle(self.next_handle);
        self.listeners.insert(handle, entity.clone());
        Ok(handle)
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<(), SubscriptionError> {
        self.listeners
            .remove(&handle)
            .map(|_| ())
            .ok_or(SubscriptionError::UnknownHandle(handle.0))
    }
}

impl SensorValueSource for SensorStates {
    fn read(&self, entity: &EntityId) -> Option<String> {
        self.states.get(entity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(raw: &str) -> EntityId {
        EntityId::parse(raw).unwrap()
    }

    #[test]
    fn set_state_reports_listener() {
        let mut states = SensorStates::new();
        let hall = entity("sensor.hall");

        assert!(!states.set_state(&hall, "20.5"));
        let handle = states.subscribe(&hall).unwrap();
        assert!(states.set_state(&hall, "20.7"));
        assert_eq!(states.read(&hall).as_deref(), Some("20.7"));

        states.unsubscribe(handle).unwrap();
        assert!(!states.set_state(&hall, "20.9"));
        assert_eq!(states.listener_count(), 0);
    }

    #[test]
    fn unsubscribing_twice_fails() {
        let mut states = SensorStates::new();
        let handle = states.subscribe(&entity("sensor.hall")).unwrap();

        assert_eq!(states.unsubscribe(handle), Ok(()));
        assert_eq!(
            states.unsubscribe(handle),
            Err(SubscriptionError::UnknownHandle(handle.0))
        );
    }

    #[test]
    fn handles_are_unique() {
        let mut states = SensorStates::new();
        let first = states.subscribe(&entity("sensor.a")).unwrap();
        let second = states.subscribe(&entity("sensor.a")).unwrap();

        assert_ne!(first, second);
        assert_eq!(states.listener_count(), 2);
    }

    #[test]
    fn missing_sensor_reads_none() {
        let states = SensorStates::new();
        assert_eq!(states.read(&entity("sensor.nowhere")), None);
    }
}
