use crate::{
    config::HeatingConfig,
    types::{HeatingDecision, HvacAction},
};

/// Decides whether the heater (or cooler, in AC mode) should switch.
pub trait HeatingEvaluator {
    fn evaluate(&mut self, current_temp: f32, target_temp: f32, now_ms: u64) -> HeatingDecision;

    fn is_heater_on(&self) -> bool;

    /// Feedback from the actuator when the switch changed outside of
    /// `evaluate`, e.g. toggled by hand.
    fn sync_heater_state(&mut self, on: bool, now_ms: u64);

    fn hvac_action(&self) -> HvacAction;
}

/// On/off thermostat with a tolerance band and an optional minimum cycle
/// duration.
#[derive(Debug, Clone)]
pub struct HeatingController {
    pub config: HeatingConfig,

    active: bool,
    heater_on: bool,
    last_state_change_ms: Option<u64>,
}

impl HeatingController {
    pub fn new(config: HeatingConfig) -> Self {
        Self {
            config,
            active: false,
            heater_on: false,
            last_state_change_ms: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_state_change_ms(&self) -> Option<u64> {
        self.last_state_change_ms
    }

    fn can_change_state(&self, now_ms: u64) -> bool {
        let Some(min_cycle_ms) = self.config.min_cycle_ms else {
            return true;
        };
        self.last_state_change_ms
            .map(|last| now_ms.saturating_sub(last) >= min_cycle_ms)
            .unwrap_or(true)
    }

    fn switch(&mut self, on: bool, now_ms: u64) -> HeatingDecision {
        self.heater_on = on;
        self.last_state_change_ms = Some(now_ms);
        if on {
            HeatingDecision::TurnOn
        } else {
            HeatingDecision::TurnOff
        }
    }
}

impl HeatingEvaluator for HeatingController {
    fn evaluate(&mut self, current_temp: f32, target_temp: f32, now_ms: u64) -> HeatingDecision {
        if !current_temp.is_finite() || !target_temp.is_finite() {
            return HeatingDecision::NoChange;
        }
        self.active = true;

        if !self.can_change_state(now_ms) {
            return HeatingDecision::NoChange;
        }

        let tolerance = self.config.tolerance;
        let too_cold = target_temp - current_temp >= tolerance;
        let too_hot = current_temp - target_temp >= tolerance;

        // In AC mode the actuator is a cooler, so the roles of the two
        // thresholds swap.
        let (should_stop, should_start) = if self.config.ac_mode {
            (too_cold, too_hot)
        } else {
            (too_hot, too_cold)
        };

        if self.heater_on {
            if should_stop {
                return self.switch(false, now_ms);
            }
        } else if should_start {
            return self.switch(true, now_ms);
        }

        HeatingDecision::NoChange
    }

    fn is_heater_on(&self) -> bool {
        self.heater_on
    }

    fn sync_heater_state(&mut self, on: bool, now_ms: u64) {
        if self.heater_on != on {
            self.heater_on = on;
            self.last_state_change_ms = Some(now_ms);
        }
    }

    fn hvac_action(&self) -> HvacAction {
        if !self.active {
            return HvacAction::Off;
        }
        match (self.heater_on, self.config.ac_mode) {
            (true, true) => HvacAction::Cooling,
            (true, false) => HvacAction::Heating,
            (false, _) => HvacAction::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> HeatingController {
        HeatingController::new(HeatingConfig::default())
    }

    #[test]
    fn turns_on_when_below_tolerance() {
        let mut heating = controller();

        assert_eq!(heating.evaluate(19.8, 20.0, 0), HeatingDecision::NoChange);
        assert!(heating.is_active());
        assert_eq!(heating.evaluate(19.5, 20.0, 0), HeatingDecision::TurnOn);
        assert!(heating.is_heater_on());
        assert_eq!(heating.hvac_action(), HvacAction::Heating);
    }

    #[test]
    fn turns_off_when_above_tolerance() {
        let mut heating = controller();
        heating.sync_heater_state(true, 0);

        assert_eq!(heating.evaluate(20.2, 20.0, 10), HeatingDecision::NoChange);
        assert_eq!(heating.evaluate(20.5, 20.0, 10), HeatingDecision::TurnOff);
        assert!(!heating.is_heater_on());
        assert_eq!(heating.hvac_action(), HvacAction::Idle);
    }

    #[test]
    fn ac_mode_inverts_thresholds() {
        let mut heating = HeatingController::new(HeatingConfig {
            ac_mode: true,
            ..HeatingConfig::default()
        });

        assert_eq!(heating.evaluate(19.0, 20.0, 0), HeatingDecision::NoChange);
        assert_eq!(heating.evaluate(21.0, 20.0, 0), HeatingDecision::TurnOn);
        assert_eq!(heating.hvac_action(), HvacAction::Cooling);
        assert_eq!(heating.evaluate(19.5, 20.0, 0), HeatingDecision::TurnOff);
    }

    #[test]
    fn min_cycle_blocks_early_switching() {
        let mut heating = HeatingController::new(HeatingConfig {
            min_cycle_ms: Some(300_000),
            ..HeatingConfig::default()
        });

        assert_eq!(heating.evaluate(18.0, 20.0, 1_000), HeatingDecision::TurnOn);
        assert_eq!(heating.evaluate(23.0, 20.0, 200_000), HeatingDecision::NoChange);
        assert!(heating.is_heater_on());
        assert_eq!(heating.evaluate(23.0, 20.0, 301_000), HeatingDecision::TurnOff);
    }

    #[test]
    fn first_switch_is_not_blocked_by_min_cycle() {
        let mut heating = HeatingController::new(HeatingConfig {
            min_cycle_ms: Some(600_000),
            ..HeatingConfig::default()
        });

        assert_eq!(heating.evaluate(15.0, 20.0, 5), HeatingDecision::TurnOn);
    }

    #[test]
    fn external_switch_restarts_cycle() {
        let mut heating = HeatingController::new(HeatingConfig {
            min_cycle_ms: Some(60_000),
            ..HeatingConfig::default()
        });

        heating.sync_heater_state(true, 1_000);
        assert_eq!(heating.last_state_change_ms(), Some(1_000));
        assert_eq!(heating.evaluate(25.0, 20.0, 30_000), HeatingDecision::NoChange);
        assert_eq!(heating.evaluate(25.0, 20.0, 61_000), HeatingDecision::TurnOff);
    }

    #[test]
    fn action_is_off_until_first_reading() {
        let mut heating = controller();
        assert_eq!(heating.hvac_action(), HvacAction::Off);

        assert_eq!(heating.evaluate(20.0, 20.0, 0), HeatingDecision::NoChange);
        assert_eq!(heating.hvac_action(), HvacAction::Idle);
    }

    #[test]
    fn non_finite_reading_is_ignored() {
        let mut heating = controller();
        assert_eq!(heating.evaluate(f32::NAN, 20.0, 0), HeatingDecision::NoChange);
        assert!(!heating.is_active());
        assert_eq!(heating.hvac_action(), HvacAction::Off);
    }
}
