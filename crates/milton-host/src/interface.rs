//! Abstraction over a programmable DC power supply: calibrated poll/set,
//! constant-voltage/constant-current bias, limit clamping, and the
//! one-request-per-tick discipline the event loop's timer callback depends
//! on.

use milton_thermal::{ChannelCalibration, SupplyBackend};

use crate::error::MiltonError;

/// Hard electrical limits the interface clamps every setpoint against.
#[derive(Debug, Clone, Copy)]
pub struct ElectricalLimits {
    pub vmin: f64,
    pub vmax: f64,
    pub imin: f64,
    pub imax: f64,
    pub pmax: f64,
}

/// Calibrated, limit-clamped power supply interface.
pub struct PowerSupplyInterface {
    backend: Box<dyn SupplyBackend>,
    voltage: ChannelCalibration,
    current: ChannelCalibration,
    limits: ElectricalLimits,
    on: bool,
    last_voltage_setpoint: f64,
    last_current_setpoint: f64,
    last_output_voltage: f64,
    last_output_current: f64,
}

impl PowerSupplyInterface {
    pub fn new(
        backend: Box<dyn SupplyBackend>,
        voltage: ChannelCalibration,
        current: ChannelCalibration,
        limits: ElectricalLimits,
    ) -> Self {
        Self {
            backend,
            voltage,
            current,
            limits,
            on: false,
            last_voltage_setpoint: 0.0,
            last_current_setpoint: 0.0,
            last_output_voltage: 0.0,
            last_output_current: 0.0,
        }
    }

    pub fn connect(&mut self) -> Result<(), MiltonError> {
        let (vset, iset, on, vout, iout) = self.backend.connect()?;
        self.last_voltage_setpoint = self.voltage.setpoint_for(vset);
        self.last_current_setpoint = self.current.setpoint_for(iset);
        self.on = on;
        self.last_output_voltage = self.voltage.output_for(vout);
        self.last_output_current = self.current.output_for(iout);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.backend.disconnect();
    }

    /// Polls the transport and writes calibrated readings into `status`.
    pub fn poll(&mut self, status: &mut milton_thermal::StatusRecord) -> Result<(), MiltonError> {
        let (vout, iout, on) = self.backend.poll()?;
        self.last_output_voltage = self.voltage.output_for(vout);
        self.last_output_current = self.current.output_for(iout);
        if let Some(on) = on {
            self.on = on;
        }
        status.voltage = self.last_output_voltage;
        status.current = self.last_output_current;
        status.power = self.last_output_voltage * self.last_output_current;
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn get_output_voltage(&self) -> f64 {
        self.last_output_voltage
    }

    pub fn get_output_current(&self) -> f64 {
        self.last_output_current
    }

    pub fn get_voltage_setpoint(&self) -> f64 {
        self.last_voltage_setpoint
    }

    pub fn get_current_setpoint(&self) -> f64 {
        self.last_current_setpoint
    }

    pub fn get_voltage_limits(&self) -> (f64, f64) {
        (self.limits.vmin, self.limits.vmax)
    }

    pub fn get_current_limits(&self) -> (f64, f64) {
        (self.limits.imin, self.limits.imax)
    }

    pub fn get_power_limits(&self) -> f64 {
        self.limits.pmax
    }

    pub fn on(&mut self, flag: bool) -> Result<(), MiltonError> {
        let ok = self.backend.set_on(flag)?;
        if ok {
            self.on = flag;
            Ok(())
        } else {
            Err(MiltonError::SetpointRejected("on/off request rejected".into()))
        }
    }

    /// Requests a cooked voltage setpoint, clamped to the voltage envelope.
    pub fn set_voltage(&mut self, v: f64) -> Result<(), MiltonError> {
        let clamped = v.clamp(self.limits.vmin, self.limits.vmax);
        let raw = self.voltage.requested_for(clamped);
        let (ok, on, iset) = self.backend.set_voltage(raw)?;
        if !ok {
            return Err(MiltonError::SetpointRejected(format!("voltage setpoint {v} rejected")));
        }
        self.last_voltage_setpoint = clamped;
        if let Some(on) = on {
            self.on = on;
        }
        if let Some(iset) = iset {
            self.last_current_setpoint = self.current.setpoint_for(iset);
        }
        Ok(())
    }

    /// Requests a cooked current setpoint, clamped to the current envelope.
    pub fn set_current(&mut self, i: f64) -> Result<(), MiltonError> {
        let clamped = i.clamp(self.limits.imin, self.limits.imax);
        let raw = self.current.requested_for(clamped);
        let (ok, on, vset) = self.backend.set_current(raw)?;
        if !ok {
            return Err(MiltonError::SetpointRejected(format!("current setpoint {i} rejected")));
        }
        self.last_current_setpoint = clamped;
        if let Some(on) = on {
            self.on = on;
        }
        if let Some(vset) = vset {
            self.last_voltage_setpoint = self.voltage.setpoint_for(vset);
        }
        Ok(())
    }

    /// Sets output power by biasing toward constant-voltage (`v = sqrt(p*R)`),
    /// deriving R from the last poll when not supplied. Clamps to the power
    /// envelope and to the implied current limit (`p/v`).
    pub fn set_power(&mut self, p: f64, resistance: Option<f64>) -> Result<(), MiltonError> {
        let p = p.clamp(0.0, self.limits.pmax);

        let r = match resistance {
            Some(r) => r,
            None => {
                if self.last_output_current <= 0.0 {
                    return Err(MiltonError::ResistanceUnavailable);
                }
                self.last_output_voltage / self.last_output_current
            }
        };

        let mut v = (p * r).sqrt();
        let implied_current = if v > 0.0 { p / v } else { 0.0 };
        if implied_current > self.limits.imax {
            v = p / self.limits.imax;
        }

        self.set_voltage(v)
    }

    pub fn reset_calibration(&mut self) {
        self.voltage = ChannelCalibration::default();
        self.current = ChannelCalibration::default();
    }

    pub fn shutdown(&mut self) {
        let _ = self.set_voltage(0.0);
        let _ = self.on(false);
        self.disconnect();
    }
}

impl Drop for PowerSupplyInterface {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milton_thermal::TransportError;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeBackend {
        voltage: f64,
        current: f64,
        on: bool,
        reject_voltage: bool,
    }

    impl SupplyBackend for FakeBackend {
        fn connect(&mut self) -> Result<(f64, f64, bool, f64, f64), TransportError> {
            Ok((0.0, 0.0, false, 0.0, 0.0))
        }
        fn disconnect(&mut self) {}
        fn poll(&mut self) -> Result<(f64, f64, Option<bool>), TransportError> {
            Ok((self.voltage, self.current, Some(self.on)))
        }
        fn set_voltage(&mut self, v: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
            if self.reject_voltage {
                return Ok((false, None, None));
            }
            self.voltage = v;
            Ok((true, Some(true), None))
        }
        fn set_current(&mut self, i: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
            self.current = i;
            Ok((true, Some(true), None))
        }
        fn set_on(&mut self, flag: bool) -> Result<bool, TransportError> {
            self.on = flag;
            Ok(true)
        }
    }

    fn limits() -> ElectricalLimits {
        ElectricalLimits {
            vmin: 0.0,
            vmax: 30.0,
            imin: 0.0,
            imax: 10.0,
            pmax: 150.0,
        }
    }

    #[test]
    fn set_power_prefers_constant_voltage_and_derives_resistance_from_last_poll() {
        let backend = Box::new(FakeBackend { voltage: 10.0, current: 2.0, on: true, reject_voltage: false });
        let mut iface = PowerSupplyInterface::new(
            backend,
            ChannelCalibration::default(),
            ChannelCalibration::default(),
            limits(),
        );
        let mut status = milton_thermal::StatusRecord::new(milton_thermal::Event::TimerEvent, 0.0, 1.0);
        iface.poll(&mut status).unwrap();

        // R = 10/2 = 5. p=20 => v = sqrt(100) = 10
        iface.set_power(20.0, None).unwrap();
        assert!((iface.get_voltage_setpoint() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn set_power_fails_without_resistance_when_current_is_zero() {
        let backend = Box::new(FakeBackend { voltage: 0.0, current: 0.0, on: false, reject_voltage: false });
        let mut iface = PowerSupplyInterface::new(
            backend,
            ChannelCalibration::default(),
            ChannelCalibration::default(),
            limits(),
        );
        let result = iface.set_power(20.0, None);
        assert!(matches!(result, Err(MiltonError::ResistanceUnavailable)));
    }

    #[test]
    fn set_voltage_clamps_to_the_electrical_envelope() {
        let backend = Box::new(FakeBackend { voltage: 0.0, current: 0.0, on: false, reject_voltage: false });
        let mut iface = PowerSupplyInterface::new(
            backend,
            ChannelCalibration::default(),
            ChannelCalibration::default(),
            limits(),
        );
        iface.set_voltage(1000.0).unwrap();
        assert!((iface.get_voltage_setpoint() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_setpoint_surfaces_as_an_error() {
        let backend = Box::new(FakeBackend { voltage: 0.0, current: 0.0, on: false, reject_voltage: true });
        let mut iface = PowerSupplyInterface::new(
            backend,
            ChannelCalibration::default(),
            ChannelCalibration::default(),
            limits(),
        );
        let result = iface.set_voltage(5.0);
        assert!(matches!(result, Err(MiltonError::SetpointRejected(_))));
    }

    #[test]
    fn shutdown_turns_output_off_and_disconnects() {
        let log = Rc::new(RefCell::new(Vec::new()));

        struct LoggingBackend {
            log: Rc<RefCell<Vec<&'static str>>>,
        }
        impl SupplyBackend for LoggingBackend {
            fn connect(&mut self) -> Result<(f64, f64, bool, f64, f64), TransportError> {
                Ok((0.0, 0.0, false, 0.0, 0.0))
            }
            fn disconnect(&mut self) {
                self.log.borrow_mut().push("disconnect");
            }
            fn poll(&mut self) -> Result<(f64, f64, Option<bool>), TransportError> {
                Ok((0.0, 0.0, Some(false)))
            }
            fn set_voltage(&mut self, _v: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
                self.log.borrow_mut().push("set_voltage");
                Ok((true, Some(false), None))
            }
            fn set_current(&mut self, _i: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
                Ok((true, None, None))
            }
            fn set_on(&mut self, _flag: bool) -> Result<bool, TransportError> {
                self.log.borrow_mut().push("set_on");
                Ok(true)
            }
        }

        let backend = Box::new(LoggingBackend { log: log.clone() });
        let mut iface = PowerSupplyInterface::new(
            backend,
            ChannelCalibration::default(),
            ChannelCalibration::default(),
            limits(),
        );
        iface.shutdown();
        assert_eq!(*log.borrow(), vec!["set_voltage", "set_on", "disconnect"]);
    }
}
