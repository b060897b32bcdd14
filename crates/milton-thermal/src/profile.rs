//! Time-parameterized reflow setpoint schedules.

use crate::piecewise::PiecewiseLinear;
use crate::status::StatusRecord;

/// One stage of a reflow profile: hold for `seconds`, ramping linearly to
/// `temperature` by the stage's end.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub seconds: f64,
    pub temperature: f64,
    pub fan: Option<f64>,
    pub disable_limits: bool,
    pub disable_cutoff: bool,
}

impl Stage {
    pub fn new(name: impl Into<String>, seconds: f64, temperature: f64) -> Self {
        Self {
            name: name.into(),
            seconds,
            temperature,
            fan: None,
            disable_limits: false,
            disable_cutoff: false,
        }
    }
}

/// A profile engine: an ordered stage list and the time-vs-temperature curve
/// it builds from them, plus per-tick lookahead (`then`/`now`/anticipation).
#[derive(Debug, Clone)]
pub struct Profile {
    stages: Vec<Stage>,
    curve: PiecewiseLinear,
    /// `when` of the final stage boundary; the terminal condition.
    last_when: f64,
}

impl Profile {
    /// Builds the profile from an ordered stage list, accumulating stage
    /// durations into absolute `when` timestamps. Each stage ramps linearly
    /// from the previous stage's target temperature to its own, reaching it
    /// by the `when` its own duration completes; the first stage holds flat
    /// at its own target for lack of a prior value. A curve point is placed
    /// at each boundary labeled with the *incoming* stage (the one whose
    /// segment starts there), plus one at `when=0` labeling the first
    /// segment, so the label tie-break at an interior boundary picks the
    /// stage beginning there rather than the one ending. Time past the
    /// terminal `when` is reported as the sentinel stage `"end"` by
    /// [`Profile::stage_at`] directly — a label on the curve's own last
    /// point is never selected by [`PiecewiseLinear`]'s tie-break rule.
    pub fn new(stages: Vec<Stage>) -> Self {
        let mut curve = PiecewiseLinear::new();
        let mut when = 0.0;

        if let Some(first) = stages.first() {
            curve.add_named_point(when, first.temperature, first.name.clone());
        }

        for (i, stage) in stages.iter().enumerate() {
            when += stage.seconds;
            let label = stages
                .get(i + 1)
                .map(|next| next.name.clone())
                .unwrap_or_else(|| "end".to_string());
            curve.add_named_point(when, stage.temperature, label);
        }

        Self {
            stages,
            curve,
            last_when: when,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The estimated target temperature at time `t`.
    pub fn estimate(&self, t: f64) -> f64 {
        self.curve.estimate(t).unwrap_or(0.0)
    }

    /// The name of the stage active at time `t`, or `"end"` once `t` passes
    /// the terminal boundary.
    pub fn stage_at(&self, t: f64) -> Option<&str> {
        if t > self.last_when {
            return Some("end");
        }
        self.curve.estimate_labeled(t).ok().and_then(|(_, l)| l)
    }

    /// The stage attributes active at time `t`, if `t` falls within a
    /// configured stage (as opposed to past the terminal boundary).
    pub fn attributes_at(&self, t: f64) -> Option<&Stage> {
        let name = self.stage_at(t)?;
        self.stages.iter().find(|s| s.name == name)
    }

    /// True once `now`, rounded to the nearest period, reaches or exceeds
    /// the last stage boundary.
    pub fn is_terminal(&self, now: f64, period: f64) -> bool {
        if period <= 0.0 {
            return now >= self.last_when;
        }
        let rounded = (now / period).round() * period;
        rounded >= self.last_when
    }

    /// Runs one tick of profile lookahead, writing `then-temperature`,
    /// `now-temperature` and `stage` into `status`. If `anticipate_steps`
    /// (the controller's anticipation horizon, `k`) is `Some(k)` with
    /// `k >= 1`, additionally writes `anticipate-temperature` and
    /// `anticipate-period`.
    pub fn tick(&self, status: &mut StatusRecord, anticipate_steps: Option<u32>) {
        let now = status.now;
        let period = status.period;
        let then = now + period;

        status.then_temperature = Some(self.estimate(then));
        status.now_temperature = Some(self.estimate(now));
        status.stage_name = self.stage_at(then).map(|s| s.to_string());

        if let Some(k) = anticipate_steps {
            if k >= 1 {
                let horizon = (k as f64 + 1.0) * period;
                status.anticipate_temperature = Some(self.estimate(now + horizon));
                status.anticipate_period = Some(horizon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Event;

    fn sample() -> Profile {
        Profile::new(vec![
            Stage::new("preheat", 90.0, 150.0),
            Stage::new("soak", 60.0, 180.0),
        ])
    }

    #[test]
    fn stage_boundaries_and_terminal_condition() {
        let p = sample();
        assert_eq!(p.stage_at(90.0), Some("soak"));
        assert_eq!(p.stage_at(151.0), Some("end"));
        assert!(p.is_terminal(150.0, 1.0));
        assert!(!p.is_terminal(149.0, 1.0));
    }

    #[test]
    fn tick_writes_then_and_now_temperature() {
        let p = sample();
        let mut status = StatusRecord::new(Event::TimerEvent, 30.0, 1.0);
        p.tick(&mut status, None);
        assert!(status.then_temperature.is_some());
        assert!(status.now_temperature.is_some());
        assert!(status.anticipate_temperature.is_none());
    }

    #[test]
    fn anticipation_horizon_is_k_plus_one_periods() {
        let p = sample();
        let mut status = StatusRecord::new(Event::TimerEvent, 30.0, 1.0);
        p.tick(&mut status, Some(2));
        assert_eq!(status.anticipate_period, Some(3.0));
        let expected = p.estimate(33.0);
        assert_eq!(status.anticipate_temperature, Some(expected));
    }

    #[test]
    fn single_stage_profile_holds_constant() {
        let p = Profile::new(vec![Stage::new("bake", 10.0, 200.0)]);
        assert!((p.estimate(0.0) - 200.0).abs() < 1e-9);
        assert!((p.estimate(10.0) - 200.0).abs() < 1e-9);
        assert!(p.is_terminal(11.0, 1.0));
    }
}
