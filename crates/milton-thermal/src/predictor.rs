//! Predictors: map heating-element temperature (and, for feed-forward,
//! applied power) onto an estimate of hotplate-surface temperature.

use crate::error::PiecewiseLinearError;
use crate::piecewise::PiecewiseLinear;
use crate::status::StatusRecord;

/// Common contract for all predictor variants.
///
/// `predict_temperature` must write `predict_temperature` into `status`,
/// update the predictor's internal prior, and be deterministic: called
/// twice from the same prior state on the same status it returns the same
/// value both times (it is not idempotent across state-mutating calls).
pub trait Predictor {
    fn predict_temperature(&mut self, status: &mut StatusRecord) -> f64;

    /// The feed-forward power needed to reach `status.then_temperature`.
    /// Variants without a power-driven model contribute no feed-forward term.
    fn predict_power(&self, _status: &StatusRecord) -> Result<f64, PiecewiseLinearError> {
        Ok(0.0)
    }
}

/// A predictor that reports the heating-element temperature unchanged.
/// Used for testing the rest of the control pipeline in isolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Predictor for PassThrough {
    fn predict_temperature(&mut self, status: &mut StatusRecord) -> f64 {
        let t = status.temperature;
        status.predict_temperature = Some(t);
        t
    }
}

/// Two cascaded single-pole IIRs mapping heating-element temperature to
/// estimated hotplate-surface temperature.
#[derive(Debug, Clone, Copy)]
pub struct DoubleLpf {
    /// Inner filter time constant, seconds.
    pub tau_inner: f64,
    /// Outer filter's offset term: `tau_outer = gradient*intermediate + offset`.
    pub outer_offset: f64,
    /// Outer filter's gradient term.
    pub outer_gradient: f64,
    intermediate: Option<f64>,
}

impl DoubleLpf {
    pub fn new(tau_inner: f64, outer_offset: f64, outer_gradient: f64) -> Self {
        Self {
            tau_inner,
            outer_offset,
            outer_gradient,
            intermediate: None,
        }
    }

    fn alpha_inner(&self, period: f64) -> f64 {
        period / (period + self.tau_inner)
    }

    fn tau_outer(&self, intermediate: f64, period: f64) -> f64 {
        (self.outer_gradient * intermediate + self.outer_offset).max(period)
    }

    fn alpha_outer(&self, intermediate: f64, period: f64) -> f64 {
        period / (period + self.tau_outer(intermediate, period))
    }

    /// The inner filter's last computed intermediate value, if any.
    pub fn intermediate(&self) -> Option<f64> {
        self.intermediate
    }
}

impl Predictor for DoubleLpf {
    fn predict_temperature(&mut self, status: &mut StatusRecord) -> f64 {
        let period = status.period;
        let elem = status.temperature;

        let first_call = self.intermediate.is_none();
        let prev_intermediate = self
            .intermediate
            .unwrap_or_else(|| status.ambient.unwrap_or(elem));
        let alpha_i = self.alpha_inner(period);
        let intermediate = alpha_i * elem + (1.0 - alpha_i) * prev_intermediate;
        self.intermediate = Some(intermediate);

        let predict = if first_call {
            elem
        } else {
            let ambient = status.ambient.unwrap_or(elem);
            let alpha_o = self.alpha_outer(intermediate, period);
            alpha_o * ambient + (1.0 - alpha_o) * intermediate
        };

        status.predict_temperature = Some(predict);
        predict
    }
}

/// Extends [`DoubleLpf`] with a power-driven element-temperature model,
/// used to invert the cascade and recover the feed-forward power needed to
/// reach a requested next hotplate temperature.
///
/// `tau_power`/`gain` are temperature-indexed tables: steady-state element
/// temperature is approximated as `ambient + power * gain(T)`, with the
/// element filter's own time constant `tau_power(T)`.
#[derive(Debug, Clone)]
pub struct DoubleLpfPower {
    base: DoubleLpf,
    tau_power: PiecewiseLinear,
    gain: PiecewiseLinear,
}

impl DoubleLpfPower {
    pub fn new(base: DoubleLpf, tau_power: PiecewiseLinear, gain: PiecewiseLinear) -> Self {
        Self {
            base,
            tau_power,
            gain,
        }
    }
}

impl Predictor for DoubleLpfPower {
    fn predict_temperature(&mut self, status: &mut StatusRecord) -> f64 {
        self.base.predict_temperature(status)
    }

    /// Computes the power needed this tick so that, following the cascade
    /// forward one period, the predicted hotplate temperature reaches
    /// `status.then_temperature`.
    ///
    /// Inverts stage by stage (outer, then inner, then the power-driven
    /// element model), linearizing each stage's `alpha` around the current
    /// operating point rather than the value being solved for — the
    /// standard feed-forward approximation for a cascade of first-order
    /// filters over one tick.
    ///
    /// # Errors
    ///
    /// Returns [`PiecewiseLinearError`] if `tau_power`/`gain` are empty.
    fn predict_power(&self, status: &StatusRecord) -> Result<f64, PiecewiseLinearError> {
        let period = status.period;
        let ambient = status.ambient.unwrap_or(status.temperature);
        let target = status.then_temperature.unwrap_or(status.temperature);
        let elem = status.temperature;
        let prev_intermediate = self.base.intermediate().unwrap_or(elem);

        // Invert the outer stage using the current intermediate to fix alpha.
        let alpha_o = self.base.alpha_outer(prev_intermediate, period);
        let intermediate_needed = if (1.0 - alpha_o).abs() < f64::EPSILON {
            prev_intermediate
        } else {
            (target - alpha_o * ambient) / (1.0 - alpha_o)
        };

        // Invert the inner stage.
        let alpha_i = self.base.alpha_inner(period);
        let elem_needed = if alpha_i.abs() < f64::EPSILON {
            elem
        } else {
            (intermediate_needed - (1.0 - alpha_i) * prev_intermediate) / alpha_i
        };

        // Invert the power-driven element model.
        let tau_p = self.tau_power.estimate(elem)?;
        let gain = self.gain.estimate(elem)?;
        let alpha_p = period / (period + tau_p);
        let ss_needed = if alpha_p.abs() < f64::EPSILON {
            elem_needed
        } else {
            (elem_needed - (1.0 - alpha_p) * elem) / alpha_p
        };

        if gain.abs() < f64::EPSILON {
            return Ok(0.0);
        }
        Ok((ss_needed - ambient) / gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(predictor: &mut DoubleLpf, elem: f64, ambient: f64, period: f64) -> f64 {
        let mut status = StatusRecord::new(crate::status::Event::TimerEvent, 0.0, period);
        status.temperature = elem;
        status.ambient = Some(ambient);
        predictor.predict_temperature(&mut status)
    }

    #[test]
    fn double_lpf_converges_toward_element_temperature_over_many_ticks() {
        let mut predictor = DoubleLpf::new(20.0, 300.0, 0.0);
        let mut predict = tick(&mut predictor, 100.0, 25.0, 1.0);
        assert_eq!(predict, 100.0, "first call reports T_elem unchanged");
        for _ in 0..19 {
            predict = tick(&mut predictor, 100.0, 25.0, 1.0);
        }
        let expected = 25.0 + 75.0 * (1.0 - (-1.0f64).exp()) * (300.0 / 301.0);
        assert!(
            (predict - expected).abs() < 0.5,
            "predict = {predict}, expected ~= {expected}"
        );
    }

    #[test]
    fn feed_forward_power_is_finite_and_directionally_sane() {
        let base = DoubleLpf::new(20.0, 300.0, 0.0);
        let tau_power = PiecewiseLinear::from_points([(0.0, 30.0), (300.0, 30.0)]);
        let gain = PiecewiseLinear::from_points([(0.0, 2.0), (300.0, 2.0)]);
        let mut predictor = DoubleLpfPower::new(base, tau_power, gain);

        let mut status = StatusRecord::new(crate::status::Event::TimerEvent, 0.0, 1.0);
        status.temperature = 100.0;
        status.ambient = Some(25.0);
        predictor.predict_temperature(&mut status);

        status.then_temperature = Some(150.0);
        let power = predictor.predict_power(&status).unwrap();
        assert!(power.is_finite());
        // Asking for a higher target than ambient should call for positive power.
        assert!(power > 0.0);
    }
}
