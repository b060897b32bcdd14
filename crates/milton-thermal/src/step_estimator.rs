//! First-order step-response fitting.
//!
//! Recovers a thermal time constant (and, given a thermal resistance, heat
//! capacity) from a recorded response approaching a final value from an
//! initial one, by ordinary least squares on the log-linearized decay.

use crate::error::FirstOrderStepError;

/// Fit diagnostics, kept around so the regression quality is testable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepFit {
    pub n: usize,
    pub sum_x: f64,
    pub sum_y: f64,
    pub sum_xx: f64,
    pub sum_xy: f64,
    pub gradient: f64,
    pub intercept: f64,
    /// Recovered time constant, seconds.
    pub tau: f64,
    /// Recovered step amplitude (`|final - initial|` as fit, not as given).
    pub amplitude: f64,
    /// Heat capacitance `tau / resistance`, if a thermal resistance was supplied.
    pub capacitance: Option<f64>,
}

/// Fits `ln(|final - y|) = a*t + b` on the usable portion of a step response.
#[derive(Debug, Clone, Copy)]
pub struct FirstOrderStepEstimator {
    /// Fraction of the total step (0..1) beyond which samples are discarded
    /// as too close to steady state to usefully constrain the fit.
    pub threshold_fraction: f64,
}

impl Default for FirstOrderStepEstimator {
    fn default() -> Self {
        Self {
            threshold_fraction: 0.8,
        }
    }
}

impl FirstOrderStepEstimator {
    /// Creates an estimator using the default 80% threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an estimator with a custom threshold fraction.
    pub fn with_threshold_fraction(threshold_fraction: f64) -> Self {
        Self { threshold_fraction }
    }

    /// Fits a step response.
    ///
    /// `samples` are `(time, value)` pairs in any order. `initial` and
    /// `final_value` bound the step; the fit direction is inferred from
    /// `sign(final_value - initial)`. `post_peak_cutoff`, if given, discards
    /// samples with `time` beyond it. `thermal_resistance`, if given,
    /// additionally yields a heat capacitance.
    ///
    /// # Errors
    ///
    /// Returns [`FirstOrderStepError`] if fewer than two samples survive the
    /// discard window.
    pub fn fit(
        &self,
        samples: &[(f64, f64)],
        initial: f64,
        final_value: f64,
        post_peak_cutoff: Option<f64>,
        thermal_resistance: Option<f64>,
    ) -> Result<StepFit, FirstOrderStepError> {
        let total = final_value - initial;
        let rising = total >= 0.0;

        let mut n = 0usize;
        let (mut sum_x, mut sum_y, mut sum_xx, mut sum_xy) = (0.0, 0.0, 0.0, 0.0);

        for &(t, y) in samples {
            if let Some(cutoff) = post_peak_cutoff {
                if t > cutoff {
                    continue;
                }
            }
            let progress = if total != 0.0 {
                (y - initial) / total
            } else {
                0.0
            };
            if progress >= self.threshold_fraction {
                continue;
            }
            let diff = if rising { final_value - y } else { y - final_value };
            if diff <= 0.0 {
                continue;
            }
            let ln_diff = diff.ln();
            n += 1;
            sum_x += t;
            sum_y += ln_diff;
            sum_xx += t * t;
            sum_xy += t * ln_diff;
        }

        if n < 2 {
            return Err(FirstOrderStepError);
        }

        let nf = n as f64;
        let denom = nf * sum_xx - sum_x * sum_x;
        let gradient = (nf * sum_xy - sum_x * sum_y) / denom;
        let intercept = (sum_y - gradient * sum_x) / nf;

        let tau = -1.0 / gradient;
        let amplitude = intercept.exp();
        let capacitance = thermal_resistance.map(|r| tau / r);

        Ok(StepFit {
            n,
            sum_x,
            sum_y,
            sum_xx,
            sum_xy,
            gradient,
            intercept,
            tau,
            amplitude,
            capacitance,
        })
    }
}
