//! Offline parameter fitting: wraps [`MinimumSearch`] around a biased
//! sum-of-squared-errors objective computed over a filtered slice of a
//! recorded [`RunHistory`].

use crate::error::SearchError;
use crate::history::RunHistory;
use crate::search::{Axis, MinimumSearch};
use crate::status::StatusRecord;

/// The result of a tuning run: the winning parameter vector and the
/// package tag of the model it was fit against.
#[derive(Debug, Clone)]
pub struct TunerResult {
    pub parameters: Vec<f64>,
    pub package: String,
    pub sse: f64,
}

/// Fits a model's parameters to recorded history by minimizing a biased SSE.
///
/// The bias weights later samples more heavily (`weight = (i+1)/n`), on the
/// premise that early samples are closer to the excitation's own transient
/// and less representative of steady-state model error.
pub struct Tuner<'h> {
    history: &'h RunHistory,
    time_cutoff: Option<f64>,
    temperature_cutoff: Option<f64>,
    search: MinimumSearch,
}

impl<'h> Tuner<'h> {
    pub fn new(history: &'h RunHistory) -> Self {
        Self {
            history,
            time_cutoff: None,
            temperature_cutoff: None,
            search: MinimumSearch::default(),
        }
    }

    /// Only samples with `now <= cutoff` are used.
    pub fn with_time_cutoff(mut self, cutoff: f64) -> Self {
        self.time_cutoff = Some(cutoff);
        self
    }

    /// Only samples with `temperature <= cutoff` are used.
    pub fn with_temperature_cutoff(mut self, cutoff: f64) -> Self {
        self.temperature_cutoff = Some(cutoff);
        self
    }

    pub fn with_search(mut self, search: MinimumSearch) -> Self {
        self.search = search;
        self
    }

    fn filtered(&self) -> Vec<&StatusRecord> {
        self.history
            .iter()
            .filter(|s| self.time_cutoff.map_or(true, |c| s.now <= c))
            .filter(|s| self.temperature_cutoff.map_or(true, |c| s.temperature <= c))
            .collect()
    }

    /// Minimizes `model(params, sample) - target(sample)` squared error,
    /// biased toward later samples, over `axes`. `package` is recorded on
    /// the result for the caller's predictor registry.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the underlying grid search exceeds its
    /// depth cap.
    pub fn tune(
        &self,
        axes: Vec<Axis>,
        package: impl Into<String>,
        model: impl Fn(&[f64], &StatusRecord) -> f64,
        target: impl Fn(&StatusRecord) -> f64,
    ) -> Result<TunerResult, SearchError> {
        let samples = self.filtered();
        let n = samples.len().max(1) as f64;

        let objective = |params: &[f64]| -> f64 {
            samples
                .iter()
                .enumerate()
                .map(|(i, sample)| {
                    let weight = (i as f64 + 1.0) / n;
                    let error = model(params, sample) - target(sample);
                    weight * error * error
                })
                .sum()
        };

        let parameters = self.search.run(axes, objective)?;
        let sse = objective(&parameters);

        Ok(TunerResult {
            parameters,
            package: package.into(),
            sse,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Event;

    fn history_with_linear_samples() -> RunHistory {
        let mut h = RunHistory::new();
        for i in 0..20 {
            let now = i as f64;
            let mut s = StatusRecord::new(Event::TimerEvent, now, 1.0);
            s.temperature = 2.0 * now + 5.0;
            h.push(s);
        }
        h
    }

    #[test]
    fn recovers_linear_model_parameters() {
        let history = history_with_linear_samples();
        let tuner = Tuner::new(&history);

        let axes = vec![Axis::new(-10.0, 10.0), Axis::new(-10.0, 10.0)];
        let result = tuner
            .tune(
                axes,
                "linear",
                |params, sample| params[0] * sample.now + params[1],
                |sample| sample.temperature,
            )
            .unwrap();

        assert_eq!(result.package, "linear");
        assert!((result.parameters[0] - 2.0).abs() < 0.1, "{:?}", result.parameters);
        assert!((result.parameters[1] - 5.0).abs() < 0.5, "{:?}", result.parameters);
        assert!(result.sse < 1.0, "sse = {}", result.sse);
    }

    #[test]
    fn time_cutoff_restricts_the_fit_window() {
        let history = history_with_linear_samples();
        let tuner = Tuner::new(&history).with_time_cutoff(5.0);
        let filtered = tuner.filtered();
        assert!(filtered.iter().all(|s| s.now <= 5.0));
        assert_eq!(filtered.len(), 6);
    }
}
