use crate::{
    config::ModeConfig,
    error::ConfigurationError,
    types::{EntityId, ModeName},
};

#[derive(Debug, Clone, PartialEq)]
pub struct OperationMode {
    pub target_sensor: EntityId,
    pub target_setpoint: Option<f32>,
    pub icon: Option<String>,
}

/// Ordered, read-only mapping from mode name to its sensor/setpoint pair.
/// The first configured entry is the default mode.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationModeTable {
    entries: Vec<(ModeName, OperationMode)>,
}

impl OperationModeTable {
    pub fn build(
        specs: &[ModeConfig],
        fallback_sensor: &EntityId,
        fallback_setpoint: Option<f32>,
    ) -> Result<Self, ConfigurationError> {
        if specs.is_empty() {
            return Err(ConfigurationError::EmptyOperationList);
        }

        let mut entries: Vec<(ModeName, OperationMode)> = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let name = match &spec.name {
                Some(name) => ModeName::Named(name.clone()),
                None => ModeName::Index(index),
            };

            // Collisions are checked on the rendered name so that an unnamed
            // entry and an explicit "0" can never shadow each other.
            let rendered = name.to_string();
            if entries.iter().any(|(existing, _)| existing.matches(&rendered)) {
                return Err(ConfigurationError::DuplicateMode(rendered));
            }

            entries.push((
                name,
                OperationMode {
                    target_sensor: spec
                        .target_sensor
                        .clone()
                        .unwrap_or_else(|| fallback_sensor.clone()),
                    target_setpoint: spec.target_temp.or(fallback_setpoint),
                    icon: spec.icon.clone(),
                },
            ));
        }

        Ok(Self { entries })
    }

    pub fn default_mode(&self) -> &ModeName {
        // build() guarantees at least one entry.
        &self.entries[0].0
    }

    pub fn get(&self, requested: &str) -> Option<(&ModeName, &OperationMode)> {
        self.entries
            .iter()
            .find(|(name, _)| name.matches(requested))
            .map(|(name, mode)| (name, mode))
    }

    pub fn mode(&self, name: &ModeName) -> Option<&OperationMode> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, mode)| mode)
    }

    pub fn names(&self) -> impl Iterator<Item = &ModeName> {
        self.entries.iter().map(|(name, _)| name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModeName, &OperationMode)> {
        self.entries.iter().map(|(name, mode)| (name, mode))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
