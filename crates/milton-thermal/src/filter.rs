//! Single-pole IIR low-pass filtering and steady-state detection.
//!
//! Generalizes a fixed-`alpha` low-pass filter into a time-constant/period
//! driven form (alpha is derived from `tau` and the tick period rather than
//! supplied directly), and adds a steady-state gate on top of it.

use crate::error::SteadyStateError;

/// A single-pole discrete IIR low-pass filter.
///
/// `alpha = period / (period + tau)`; `next = alpha * x + (1 - alpha) * prev`.
/// `prev` is initialized to the first sample passed to [`LowPassFilter::next`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LowPassFilter {
    tau: f64,
    period: f64,
    prev: Option<f64>,
}

impl LowPassFilter {
    /// Creates a filter with time constant `tau` (seconds, `tau >= 0`) and
    /// sample period `period` (seconds, `period > 0`).
    pub fn new(tau: f64, period: f64) -> Self {
        assert!(period > 0.0, "period must be positive");
        assert!(tau >= 0.0, "tau must be non-negative");
        Self {
            tau,
            period,
            prev: None,
        }
    }

    /// Updates the time constant used by subsequent samples.
    pub fn set_tau(&mut self, tau: f64) {
        assert!(tau >= 0.0, "tau must be non-negative");
        self.tau = tau;
    }

    /// The filter's smoothing factor for the current `tau`/`period`.
    pub fn alpha(&self) -> f64 {
        self.period / (self.period + self.tau)
    }

    /// The filter's current output, if it has seen a sample.
    pub fn value(&self) -> Option<f64> {
        self.prev
    }

    /// Feeds a new sample and returns the filtered output.
    pub fn next(&mut self, x: f64) -> f64 {
        let out = match self.prev {
            None => x,
            Some(prev) => {
                let alpha = self.alpha();
                alpha * x + (1.0 - alpha) * prev
            }
        };
        self.prev = Some(out);
        out
    }

    /// Resets the filter so the next sample re-seeds it.
    pub fn reset(&mut self) {
        self.prev = None;
    }
}

/// Detects a steady-state condition from an exponentially smoothed delta
/// between successive samples, with hysteresis against chatter near the
/// threshold.
#[derive(Debug, Clone, Copy)]
pub struct SteadyStateDetector {
    smoothing: f64,
    threshold: f64,
    reset_bound: f64,
    required_samples: u32,
    dfilt: f64,
    counter: u32,
    last_sample: Option<f64>,
}

impl SteadyStateDetector {
    /// Creates a detector.
    ///
    /// # Errors
    ///
    /// Returns [`SteadyStateError`] if `0 < smoothing < 1`, `threshold > 0`,
    /// `reset_bound > threshold` or `required_samples >= 1` does not hold.
    pub fn new(
        smoothing: f64,
        threshold: f64,
        reset_bound: f64,
        required_samples: u32,
    ) -> Result<Self, SteadyStateError> {
        if !(smoothing > 0.0 && smoothing < 1.0) {
            return Err(SteadyStateError::InvalidSmoothing);
        }
        if !(threshold > 0.0) {
            return Err(SteadyStateError::InvalidThreshold);
        }
        if !(reset_bound > threshold) {
            return Err(SteadyStateError::InvalidReset);
        }
        if required_samples < 1 {
            return Err(SteadyStateError::InvalidSamples);
        }
        Ok(Self {
            smoothing,
            threshold,
            reset_bound,
            required_samples,
            dfilt: 0.0,
            counter: 0,
            last_sample: None,
        })
    }

    /// Feeds a new sample, updates the internal smoothed delta and counter,
    /// and returns whether the tail window now satisfies the steady-state
    /// condition.
    pub fn check(&mut self, sample: f64) -> bool {
        let delta = match self.last_sample {
            Some(last) => sample - last,
            None => 0.0,
        };
        self.last_sample = Some(sample);

        self.dfilt = self.smoothing * self.dfilt + (1.0 - self.smoothing) * delta;

        if self.dfilt.abs() >= self.reset_bound {
            self.counter = 0;
        } else {
            self.counter += 1;
        }

        self.counter >= self.required_samples
    }

    /// Clears all internal state (smoothed delta, counter, last sample).
    pub fn reset(&mut self) {
        self.dfilt = 0.0;
        self.counter = 0;
        self.last_sample = None;
    }
}
