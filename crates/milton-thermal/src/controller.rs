//! Feed-forward + PI control with back-calculation anti-windup, power-limit
//! curves and hard thermal cutoff.

use crate::calibration::CalibrationTable;
use crate::error::PiecewiseLinearError;
use crate::piecewise::PiecewiseLinear;
use crate::predictor::Predictor;
use crate::status::StatusRecord;

/// A temperature → maximum-allowed-power curve. Monotonic non-increasing is
/// typical but not required.
#[derive(Debug, Clone, Default)]
pub struct PowerLimitCurve(PiecewiseLinear);

impl PowerLimitCurve {
    pub fn new(curve: PiecewiseLinear) -> Self {
        Self(curve)
    }

    pub fn estimate(&self, temperature: f64) -> Result<f64, PiecewiseLinearError> {
        self.0.estimate(temperature)
    }
}

/// Turns a status record into a next-period power command.
pub trait Controller {
    /// Reads raw electrical fields, inverts the RTD table and writes
    /// `resistance`/`temperature` into `status`.
    ///
    /// # Errors
    ///
    /// Returns [`PiecewiseLinearError`] if the RTD calibration table is empty.
    fn get_temperature(&self, status: &mut StatusRecord) -> Result<(), PiecewiseLinearError>;

    /// Resolves `status.ambient` per the five-step priority order, writing
    /// the resolved value back. Idempotent: a second call on the same
    /// status returns the same value and makes no further change.
    fn get_ambient(&self, status: &mut StatusRecord) -> f64;

    /// Computes required power from the predictor's feed-forward term and
    /// the PI loop on predicted-vs-scheduled temperature.
    fn get_required_power(&mut self, status: &StatusRecord) -> Result<f64, PiecewiseLinearError>;

    /// Applies the power-limit curve and hard cutoff to `power`, writing the
    /// final value into `status.set_power`.
    fn get_power_limited(
        &self,
        status: &mut StatusRecord,
        power: f64,
    ) -> Result<f64, PiecewiseLinearError>;

    fn set_power_limit(&mut self, curve: Option<PowerLimitCurve>);
    fn set_cutoff_temperature(&mut self, cutoff: Option<f64>);
    fn enable_limits(&mut self, enabled: bool);
    fn enable_cutoff(&mut self, enabled: bool);
}

/// Feed-forward + PI controller with back-calculation anti-windup
/// (`HybridPI`).
pub struct HybridPi {
    pub kp: f64,
    pub ki: f64,
    /// Back-calculation gain. Defaults to `ki/kp` when `None`.
    pub kaw: Option<f64>,
    pub pmin: f64,
    pub pmax: f64,
    /// Ambient temperature used when nothing else resolves it.
    pub ambient_default: f64,
    integral: f64,
    rtd: CalibrationTable,
    predictor: Box<dyn Predictor>,
    power_limit: Option<PowerLimitCurve>,
    cutoff: Option<f64>,
    limits_enabled: bool,
    cutoff_enabled: bool,
}

impl HybridPi {
    pub fn new(
        kp: f64,
        ki: f64,
        pmin: f64,
        pmax: f64,
        rtd: CalibrationTable,
        predictor: Box<dyn Predictor>,
    ) -> Self {
        Self {
            kp,
            ki,
            kaw: None,
            pmin,
            pmax,
            ambient_default: 25.0,
            integral: 0.0,
            rtd,
            predictor,
            power_limit: None,
            cutoff: None,
            limits_enabled: true,
            cutoff_enabled: true,
        }
    }

    fn kaw(&self) -> f64 {
        self.kaw.unwrap_or_else(|| {
            if self.kp.abs() < f64::EPSILON {
                0.0
            } else {
                self.ki / self.kp
            }
        })
    }

    /// Mutable access to the predictor, e.g. for tuning or passthrough tests.
    pub fn predictor_mut(&mut self) -> &mut dyn Predictor {
        self.predictor.as_mut()
    }

    pub fn predictor(&self) -> &dyn Predictor {
        self.predictor.as_ref()
    }
}

impl Controller for HybridPi {
    fn get_temperature(&self, status: &mut StatusRecord) -> Result<(), PiecewiseLinearError> {
        let resistance = if status.current.abs() > 1e-9 {
            Some(status.voltage / status.current)
        } else {
            None
        };
        status.resistance = resistance;

        let temperature = match resistance {
            Some(r) => self.rtd.temperature_for_resistance(r)?,
            None => status.temperature,
        };
        status.temperature = temperature;
        Ok(())
    }

    fn get_ambient(&self, status: &mut StatusRecord) -> f64 {
        if let Some(a) = status.ambient {
            return a;
        }

        let default = self.ambient_default;
        let resolved = if let Some(device_ambient) = status.device_ambient {
            device_ambient
        } else if let Some(device_temperature) = status.device_temperature {
            if (device_temperature - default).abs() <= 5.0 {
                device_temperature
            } else {
                default
            }
        } else if (status.temperature - default).abs() <= 5.0 {
            status.temperature
        } else {
            default
        };

        status.ambient = Some(resolved);
        resolved
    }

    fn get_required_power(&mut self, status: &StatusRecord) -> Result<f64, PiecewiseLinearError> {
        let feedforward = self.predictor.predict_power(status)?;
        let predict = status.predict_temperature.unwrap_or(status.temperature);
        let now_temperature = status.now_temperature.unwrap_or(predict);
        let error = predict - now_temperature;
        let period = status.period;

        let integral_unsat = self.integral + error * self.ki * period;
        let power_unsat = feedforward + self.kp * error + self.ki * integral_unsat;
        let power_sat = power_unsat.clamp(self.pmin, self.pmax);

        let saturated_same_direction = (power_unsat > self.pmax && error > 0.0)
            || (power_unsat < self.pmin && error < 0.0);
        let mut integral_next = if saturated_same_direction {
            self.integral
        } else {
            integral_unsat
        };

        integral_next += self.kaw() * (power_sat - power_unsat);
        let bound = 0.2 * self.pmax;
        self.integral = integral_next.clamp(-bound, bound);

        Ok(power_sat)
    }

    fn get_power_limited(
        &self,
        status: &mut StatusRecord,
        power: f64,
    ) -> Result<f64, PiecewiseLinearError> {
        let stage_disables_cutoff = status.field("stage-disable-cutoff").unwrap_or(0.0) != 0.0;
        let stage_disables_limits = status.field("stage-disable-limits").unwrap_or(0.0) != 0.0;

        if self.cutoff_enabled && !stage_disables_cutoff {
            if let Some(cutoff) = self.cutoff {
                if status.temperature >= cutoff {
                    status.set_power = Some(0.0);
                    return Ok(0.0);
                }
            }
        }

        let limited = if self.limits_enabled && !stage_disables_limits {
            match &self.power_limit {
                Some(curve) => power.min(curve.estimate(status.temperature)?),
                None => power,
            }
        } else {
            power
        };

        status.set_power = Some(limited);
        Ok(limited)
    }

    fn set_power_limit(&mut self, curve: Option<PowerLimitCurve>) {
        self.power_limit = curve;
    }

    fn set_cutoff_temperature(&mut self, cutoff: Option<f64>) {
        self.cutoff = cutoff;
    }

    fn enable_limits(&mut self, enabled: bool) {
        self.limits_enabled = enabled;
    }

    fn enable_cutoff(&mut self, enabled: bool) {
        self.cutoff_enabled = enabled;
    }
}
