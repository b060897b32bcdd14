//! Error kinds owned by the thermal-control core.
//!
//! These are narrower than `milton_host::error::MiltonError` — each covers
//! exactly one component's failure mode and is wrapped by the host crate's
//! top-level error via `#[from]`.

use thiserror::Error;

/// [`crate::piecewise::PiecewiseLinear::estimate`] called on an empty table.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot estimate from an empty piecewise-linear table")]
pub struct PiecewiseLinearError;

/// [`crate::filter::SteadyStateDetector`] constructed with out-of-range parameters.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SteadyStateError {
    #[error("smoothing factor must satisfy 0 < s < 1")]
    InvalidSmoothing,
    #[error("threshold must be positive")]
    InvalidThreshold,
    #[error("reset bound must exceed threshold")]
    InvalidReset,
    #[error("required sample count must be at least 1")]
    InvalidSamples,
}

/// [`crate::step_estimator::FirstOrderStepEstimator::fit`] lacked enough usable samples.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("fewer than two usable samples survived the fit window")]
pub struct FirstOrderStepError;

/// [`crate::search::MinimumSearch::run`] exceeded its contraction depth cap.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("grid search exceeded its depth cap without converging")]
pub struct SearchError;
