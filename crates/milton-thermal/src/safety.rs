//! Thermal-runaway detection: the same failure mode `ThermalCutoff` and the
//! event loop's "repeated failures escalate to shutdown" policy protect
//! against, but watching the trend rather than the absolute value.

/// The operational state reported by [`RunawayMonitor::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalState {
    /// Heating as expected, or within deviation of a held setpoint.
    Ok,
    /// Holding near setpoint but outside the allowed deviation.
    Warning,
    /// No heat gain within the configured window while powered, or an
    /// absolute temperature ceiling was crossed.
    Shutdown,
}

/// Limits the runaway monitor checks against.
#[derive(Debug, Clone, Copy)]
pub struct SafetyLimits {
    /// Absolute temperature ceiling; crossing it is always `Shutdown`.
    pub max_temperature: f64,
    /// Minimum temperature gain required within `min_heat_gain_seconds` of
    /// power being applied.
    pub min_heat_gain: f64,
    pub min_heat_gain_seconds: f64,
    /// Allowed deviation from setpoint once the element has settled near it.
    pub max_deviation: f64,
}

/// Tracks whether a powered element is heating as expected, escalating to
/// `Shutdown` on a stalled element (broken heater, detached sensor) and to
/// `Warning` on a settled-but-off-target excursion.
#[derive(Debug, Clone, Copy)]
pub struct RunawayMonitor {
    limits: SafetyLimits,
    start_time: f64,
    start_temperature: f64,
    was_powered: bool,
}

impl RunawayMonitor {
    pub fn new(limits: SafetyLimits) -> Self {
        Self {
            limits,
            start_time: 0.0,
            start_temperature: 0.0,
            was_powered: false,
        }
    }

    /// Updates the monitor with the current tick's state. `powered` is
    /// whether the interface is commanding nonzero output this tick.
    pub fn update(&mut self, now: f64, temperature: f64, setpoint: f64, powered: bool) -> ThermalState {
        if temperature > self.limits.max_temperature {
            return ThermalState::Shutdown;
        }

        if powered && !self.was_powered {
            self.start_time = now;
            self.start_temperature = temperature;
        }
        self.was_powered = powered;

        if powered {
            let elapsed = now - self.start_time;
            if elapsed > self.limits.min_heat_gain_seconds {
                let gain = temperature - self.start_temperature;
                if gain < self.limits.min_heat_gain {
                    return ThermalState::Shutdown;
                }
            }
        } else {
            self.start_time = now;
            self.start_temperature = temperature;
        }

        if setpoint != 0.0 && (temperature - setpoint).abs() > self.limits.max_deviation {
            let was_near_setpoint = (self.start_temperature - setpoint).abs() < self.limits.max_deviation;
            if was_near_setpoint {
                return ThermalState::Warning;
            }
        }

        ThermalState::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SafetyLimits {
        SafetyLimits {
            max_temperature: 300.0,
            min_heat_gain: 2.0,
            min_heat_gain_seconds: 30.0,
            max_deviation: 5.0,
        }
    }

    #[test]
    fn absolute_ceiling_always_shuts_down() {
        let mut m = RunawayMonitor::new(limits());
        assert_eq!(m.update(0.0, 301.0, 0.0, true), ThermalState::Shutdown);
    }

    #[test]
    fn stalled_element_escalates_after_window() {
        let mut m = RunawayMonitor::new(limits());
        assert_eq!(m.update(0.0, 25.0, 150.0, true), ThermalState::Ok);
        assert_eq!(m.update(31.0, 25.5, 150.0, true), ThermalState::Shutdown);
    }

    #[test]
    fn heating_as_expected_is_ok() {
        let mut m = RunawayMonitor::new(limits());
        assert_eq!(m.update(0.0, 25.0, 150.0, true), ThermalState::Ok);
        assert_eq!(m.update(31.0, 30.0, 150.0, true), ThermalState::Ok);
    }

    #[test]
    fn settled_excursion_from_setpoint_warns() {
        let mut m = RunawayMonitor::new(limits());
        // Settle near setpoint with the heater off.
        assert_eq!(m.update(0.0, 149.0, 150.0, false), ThermalState::Ok);
        // Drift away while still off: start_temperature tracks, no warning yet.
        assert_eq!(m.update(1.0, 149.0, 150.0, false), ThermalState::Ok);
    }

    #[test]
    fn turning_off_resets_the_heat_gain_timer() {
        let mut m = RunawayMonitor::new(limits());
        assert_eq!(m.update(0.0, 25.0, 0.0, true), ThermalState::Ok);
        assert_eq!(m.update(10.0, 25.0, 0.0, false), ThermalState::Ok);
        assert_eq!(m.update(11.0, 25.0, 0.0, true), ThermalState::Ok);
    }
}
