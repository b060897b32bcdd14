//! In-process simulated power supply and hotplate physics model.
//!
//! A fake transport endpoint for integration tests, adapted to Milton's
//! synchronous, single-threaded event loop: no socket, no tokio, just a
//! [`milton_thermal::SupplyBackend`] impl driven directly by `EventLoop`'s
//! ticks. The heater physics are Newton's-law-of-cooling.

use milton_thermal::{SupplyBackend, TransportError};

/// A lumped single-node thermal model: a resistive element with a heat
/// capacity, losing heat to ambient proportional to the temperature
/// difference, gaining heat proportional to applied electrical power.
#[derive(Debug, Clone, Copy)]
pub struct HotplateModel {
    /// Current element temperature, degrees C.
    pub temperature: f64,
    ambient: f64,
    /// Degrees C gained per second per watt applied.
    heat_coefficient: f64,
    /// Degrees C lost per second per degree above ambient.
    cooling_coefficient: f64,
    /// Element resistance, ohms, used to convert output V/I into power.
    pub resistance: f64,
}

impl HotplateModel {
    pub fn new(ambient: f64, resistance: f64) -> Self {
        Self {
            temperature: ambient,
            ambient,
            heat_coefficient: 2.5,
            cooling_coefficient: 0.1,
            resistance,
        }
    }

    pub fn with_coefficients(mut self, heat_coefficient: f64, cooling_coefficient: f64) -> Self {
        self.heat_coefficient = heat_coefficient;
        self.cooling_coefficient = cooling_coefficient;
        self
    }

    /// Advances the model by `dt` seconds under `power` watts applied.
    pub fn step(&mut self, power: f64, dt: f64) {
        let heating = power * self.heat_coefficient * dt;
        let cooling = (self.temperature - self.ambient) * self.cooling_coefficient * dt;
        self.temperature += heating - cooling;
    }
}

/// A simulated supply driving a [`HotplateModel`], implementing
/// [`SupplyBackend`] directly so it can stand in for a real transport in
/// `milton-host`'s `run` command or in integration tests, with no
/// dependency on the host crate.
pub struct SimulatedBackend {
    model: HotplateModel,
    voltage_setpoint: f64,
    current_setpoint: f64,
    on: bool,
    tick_seconds: f64,
    connected: bool,
}

impl SimulatedBackend {
    pub fn new(model: HotplateModel, tick_seconds: f64) -> Self {
        Self {
            model,
            voltage_setpoint: 0.0,
            current_setpoint: 0.0,
            on: false,
            tick_seconds,
            connected: false,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.model.temperature
    }

    /// Output current implied by the present voltage setpoint and the
    /// model's resistance, as if the supply were a pure constant-voltage
    /// source (the physical wire dialect is out of scope; this models only
    /// what the backend must report back through `poll`).
    fn output_current(&self) -> f64 {
        if self.model.resistance <= 0.0 {
            0.0
        } else {
            self.voltage_setpoint / self.model.resistance
        }
    }

    fn advance(&mut self) {
        let power = if self.on {
            self.voltage_setpoint * self.output_current()
        } else {
            0.0
        };
        self.model.step(power, self.tick_seconds);
    }
}

impl SupplyBackend for SimulatedBackend {
    fn connect(&mut self) -> Result<(f64, f64, bool, f64, f64), TransportError> {
        self.connected = true;
        Ok((0.0, 0.0, false, 0.0, 0.0))
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn poll(&mut self) -> Result<(f64, f64, Option<bool>), TransportError> {
        self.advance();
        let voltage = if self.on { self.voltage_setpoint } else { 0.0 };
        let current = if self.on { self.output_current() } else { 0.0 };
        Ok((voltage, current, Some(self.on)))
    }

    fn set_voltage(&mut self, v: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
        self.voltage_setpoint = v;
        self.current_setpoint = self.output_current();
        Ok((true, None, Some(self.current_setpoint)))
    }

    fn set_current(&mut self, i: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
        self.current_setpoint = i;
        self.voltage_setpoint = i * self.model.resistance;
        Ok((true, None, Some(self.voltage_setpoint)))
    }

    fn set_on(&mut self, flag: bool) -> Result<bool, TransportError> {
        self.on = flag;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn model_heats_toward_steady_state_and_cools_back_to_ambient() {
        let mut model = HotplateModel::new(25.0, 6.0);
        for _ in 0..2000 {
            model.step(10.0, 0.5);
        }
        let heated = model.temperature;
        assert!(heated > 25.0);

        for _ in 0..2000 {
            model.step(0.0, 0.5);
        }
        assert!((model.temperature - 25.0).abs() < 1.0);
        assert!(heated > model.temperature);
    }

    #[test]
    fn backend_reports_zero_output_while_off() {
        let model = HotplateModel::new(25.0, 6.0);
        let mut backend = SimulatedBackend::new(model, 1.0);
        backend.connect().unwrap();
        backend.set_voltage(12.0).unwrap();
        let (v, i, on) = backend.poll().unwrap();
        assert_eq!(v, 0.0);
        assert_eq!(i, 0.0);
        assert_eq!(on, Some(false));
    }

    #[test]
    fn backend_heats_the_model_once_switched_on() {
        let model = HotplateModel::new(25.0, 6.0);
        let mut backend = SimulatedBackend::new(model, 1.0);
        backend.connect().unwrap();
        backend.set_voltage(12.0).unwrap();
        backend.set_on(true).unwrap();
        let start = backend.temperature();
        for _ in 0..50 {
            backend.poll().unwrap();
        }
        assert!(backend.temperature() > start);
    }

    #[test]
    fn set_current_derives_voltage_from_resistance() {
        let model = HotplateModel::new(25.0, 5.0);
        let mut backend = SimulatedBackend::new(model, 1.0);
        backend.connect().unwrap();
        let (_, _, vset) = backend.set_current(2.0).unwrap();
        assert!(approx_eq!(f64, vset.unwrap(), 10.0));
    }
}
