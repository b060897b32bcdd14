//! The power-supply backend contract: nine backend-private hooks a concrete
//! supply driver must implement. This is the narrow, transport-agnostic trait
//! driver implements; the calibrated, CLI-configured wrapper around it
//! (limit clamping, one-request-per-tick bookkeeping) is a host concern and
//! lives outside this crate. Kept here, alongside the `Controller`/
//! `Predictor` traits, so a simulated backend can implement it without
//! depending on the host binary crate.

use thiserror::Error;

/// Transport-level failures a backend hook can report. The host crate maps
/// these onto its own richer error enum.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("failed to connect to power supply: {0}")]
    ConnectFailure(String),
    #[error("power supply transport timed out")]
    Timeout,
    #[error("power supply rejected setpoint: {0}")]
    SetpointRejected(String),
}

/// The nine backend-private hooks a supply driver implements. Each call is at
/// most one round trip to the supply; a caller observing the one-request-per-tick
/// discipline never calls more than one hook per public setter per tick.
pub trait SupplyBackend {
    /// Connects the transport, returning `(voltage_setpoint, current_setpoint, on, output_voltage, output_current)`.
    fn connect(&mut self) -> Result<(f64, f64, bool, f64, f64), TransportError>;
    fn disconnect(&mut self);
    /// Returns `(output_voltage, output_current, on)`; `on` is `None` when
    /// the transport cannot report on-state cheaply in a poll.
    fn poll(&mut self) -> Result<(f64, f64, Option<bool>), TransportError>;
    /// Returns `(accepted, on, iset)`; `iset` is `Some` when setting the
    /// voltage setpoint also moved the current setpoint.
    fn set_voltage(&mut self, v: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError>;
    fn set_current(&mut self, i: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError>;
    fn set_on(&mut self, flag: bool) -> Result<bool, TransportError>;
}
