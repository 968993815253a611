use crate::types::EntityId;

pub const TOPIC_ENTITY_STATE_FILTER: &str = "homeassistant/+/+/state";

pub const TOPIC_CONTROLLER_STATE: &str = "thermostat/controller/state";
pub const TOPIC_CONTROLLER_STATUS: &str = "thermostat/controller/status";
pub const TOPIC_FORECAST_STATUS: &str = "thermostat/forecast/status";

pub const TOPIC_CMD_OPERATION_MODE: &str = "thermostat/cmnd/operation_mode";
pub const TOPIC_CMD_TARGET: &str = "thermostat/cmnd/target";

pub fn entity_state_topic(entity: &EntityId) -> String {
    format!("homeassistant/{}/{}/state", entity.domain(), entity.object_id())
}

pub fn entity_attributes_topic(entity: &EntityId) -> String {
    format!(
        "homeassistant/{}/{}/attributes",
        entity.domain(),
        entity.object_id()
    )
}

pub fn entity_command_topic(entity: &EntityId) -> String {
    format!("homeassistant/{}/{}/set", entity.domain(), entity.object_id())
}

/// Inverse of [`entity_state_topic`].
pub fn entity_from_state_topic(topic: &str) -> Option<EntityId> {
    let mut parts = topic.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("homeassistant"), Some(domain), Some(object_id), Some("state"), None) => {
            EntityId::parse(format!("{domain}.{object_id}")).ok()
        }
        _ => None,
    }
}
