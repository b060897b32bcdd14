//! # Milton Thermal
//!
//! `milton-thermal` provides the control-theory core of Milton, a closed-loop
//! controller for a resistive heating element driven by a programmable DC
//! power supply.
//!
//! ## Components
//!
//! - **Piecewise-linear lookup** ([`piecewise`]): interpolation/extrapolation
//!   table shared by calibration curves, power-limit curves and profiles.
//! - **Filtering** ([`filter`]): a single-pole IIR low-pass filter and a
//!   steady-state detector with hysteresis.
//! - **Step response fitting** ([`step_estimator`]): recovers thermal time
//!   constant and heat capacity from a recorded step response.
//! - **Calibration** ([`calibration`]): RTD resistance-to-temperature curves
//!   and per-channel supply calibration tables.
//! - **Prediction** ([`predictor`]): cascaded-filter models that estimate
//!   hotplate-surface temperature from heating-element temperature and power.
//! - **Control** ([`controller`]): feed-forward + PI control with
//!   back-calculation anti-windup, power-limit curves and cutoff.
//! - **Profiles** ([`profile`]): time-parameterized reflow setpoint schedules.
//! - **Status & history** ([`status`], [`history`]): the per-tick data
//!   carrier and the append-only run record.
//! - **Offline fitting** ([`search`], [`tuner`]): n-dimensional grid-descent
//!   optimization used to fit predictor/controller parameters.
//! - **Runaway detection** ([`safety`]): watches heat gain over time while
//!   powered, independent of the cutoff/power-limit policy in [`controller`].
//! - **Backend contract** ([`interface`]): the transport-agnostic hooks a
//!   concrete supply driver (or a simulated one) implements.

pub mod calibration;
pub mod controller;
pub mod error;
pub mod filter;
pub mod history;
pub mod interface;
pub mod piecewise;
pub mod predictor;
pub mod profile;
pub mod safety;
pub mod search;
pub mod status;
pub mod step_estimator;
pub mod tuner;

pub use calibration::{CalibrationTable, ChannelCalibration, SupplyCalibration};
pub use controller::{Controller, HybridPi, PowerLimitCurve};
pub use error::{
    FirstOrderStepError, PiecewiseLinearError, SearchError, SteadyStateError,
};
pub use filter::{LowPassFilter, SteadyStateDetector};
pub use history::RunHistory;
pub use interface::{SupplyBackend, TransportError};
pub use piecewise::PiecewiseLinear;
pub use predictor::{DoubleLpf, DoubleLpfPower, PassThrough, Predictor};
pub use profile::{Profile, Stage};
pub use safety::{RunawayMonitor, SafetyLimits, ThermalState};
pub use search::{Axis, MinimumSearch};
pub use status::{Event, StatusRecord};
pub use step_estimator::{FirstOrderStepEstimator, StepFit};
pub use tuner::{Tuner, TunerResult};
