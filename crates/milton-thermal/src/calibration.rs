//! Calibration tables: RTD resistance/temperature and per-channel supply
//! calibration.
//!
//! Generalizes a closed-form `thermistor::SteinhartHart` conversion into a
//! measured-point `PiecewiseLinear` lookup, since Milton's RTD calibration
//! is supplied as a list of `(resistance, temperature)` points rather than
//! fit coefficients.

use crate::error::PiecewiseLinearError;
use crate::piecewise::PiecewiseLinear;

/// An RTD calibration table: measured resistance maps to estimated
/// temperature, and its inverse maps a target temperature back to the
/// resistance that would produce it.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    forward: PiecewiseLinear, // resistance -> temperature
    inverse: PiecewiseLinear, // temperature -> resistance
}

impl CalibrationTable {
    /// Rebuilds the table from a list of `(resistance, temperature)` points.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut forward = PiecewiseLinear::new();
        let mut inverse = PiecewiseLinear::new();
        for (r, t) in points {
            forward.add_point(r, t);
            inverse.add_point(t, r);
        }
        Self { forward, inverse }
    }

    /// Estimated temperature for a measured resistance.
    pub fn temperature_for_resistance(&self, resistance: f64) -> Result<f64, PiecewiseLinearError> {
        self.forward.estimate(resistance)
    }

    /// Resistance that would produce the given temperature, for forward use
    /// (e.g. feed-forward power estimation against a target temperature).
    pub fn resistance_for_temperature(&self, temperature: f64) -> Result<f64, PiecewiseLinearError> {
        self.inverse.estimate(temperature)
    }
}

fn estimate_or_identity(table: &PiecewiseLinear, x: f64) -> f64 {
    table.estimate(x).unwrap_or(x)
}

/// The three calibration tables for one electrical channel (voltage or
/// current), each defaulting to the identity transform when empty.
#[derive(Debug, Clone, Default)]
pub struct ChannelCalibration {
    /// What to ask the supply for (`requested`) to achieve a calibrated
    /// `actual` output: `requested(actual)`.
    requested: PiecewiseLinear,
    /// What a raw `sampled` reading really represents, cooked: `output(sampled)`.
    output: PiecewiseLinear,
    /// What the supply stores internally for a cooked `requested` value:
    /// `setpoint(requested)`.
    setpoint: PiecewiseLinear,
}

impl ChannelCalibration {
    /// A channel calibration with all three tables at the identity transform.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Sets the `requested(actual)` table.
    pub fn set_requested(&mut self, table: PiecewiseLinear) {
        self.requested = table;
    }

    /// Sets the `output(sampled)` table.
    pub fn set_output(&mut self, table: PiecewiseLinear) {
        self.output = table;
    }

    /// Sets the `setpoint(requested)` table.
    pub fn set_setpoint(&mut self, table: PiecewiseLinear) {
        self.setpoint = table;
    }

    /// What to ask the supply for, to achieve `actual` on this channel.
    pub fn requested_for(&self, actual: f64) -> f64 {
        estimate_or_identity(&self.requested, actual)
    }

    /// The cooked value a raw `sampled` reading represents.
    pub fn output_for(&self, sampled: f64) -> f64 {
        estimate_or_identity(&self.output, sampled)
    }

    /// What the supply will store internally for a cooked `requested` value.
    pub fn setpoint_for(&self, requested: f64) -> f64 {
        estimate_or_identity(&self.setpoint, requested)
    }
}

/// Supply calibration: one [`ChannelCalibration`] per electrical channel.
#[derive(Debug, Clone, Default)]
pub struct SupplyCalibration {
    pub voltage: ChannelCalibration,
    pub current: ChannelCalibration,
}
