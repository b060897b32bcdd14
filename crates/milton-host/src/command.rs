//! Command dispatch: a capability-struct-based `Command` trait, replacing
//! a duck-typed `can('timerEvent')` style callback with a value the event
//! loop inspects once at construction.

use milton_thermal::{Controller, HybridPi, Profile, RunHistory, StatusRecord};

use crate::error::MiltonError;

/// Which optional lifecycle hooks a command implements. Inspected once by
/// `EventLoop` at construction to decide whether to install the keypress
/// channel and whether to run `postprocess`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub key_event: bool,
}

/// What a tick handler asks the event loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop,
}

/// One command's lifecycle: `initialize` → `preprocess` → repeated
/// `timer_event`/`key_event` → `postprocess`.
pub trait Command {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn initialize(&mut self, _status: &mut StatusRecord) -> Result<(), MiltonError> {
        Ok(())
    }

    fn preprocess(&mut self, _status: &mut StatusRecord) -> Result<(), MiltonError> {
        Ok(())
    }

    fn timer_event(&mut self, status: &mut StatusRecord) -> Result<TickOutcome, MiltonError>;

    fn key_event(&mut self, _status: &mut StatusRecord) -> Result<TickOutcome, MiltonError> {
        Ok(TickOutcome::Continue)
    }

    fn postprocess(&mut self, _history: &RunHistory) -> Result<(), MiltonError> {
        Ok(())
    }
}

/// Drives a reflow [`Profile`] through a [`HybridPi`] controller: the
/// built-in command every `milton run --profile <file>` invocation uses.
pub struct ReflowCommand {
    profile: Profile,
    controller: HybridPi,
    anticipate_steps: Option<u32>,
}

impl ReflowCommand {
    pub fn new(profile: Profile, controller: HybridPi, anticipate_steps: Option<u32>) -> Self {
        Self {
            profile,
            controller,
            anticipate_steps,
        }
    }
}

impl Command for ReflowCommand {
    fn name(&self) -> &str {
        "reflow"
    }

    fn timer_event(&mut self, status: &mut StatusRecord) -> Result<TickOutcome, MiltonError> {
        self.controller.get_temperature(status)?;
        self.controller.get_ambient(status);

        self.profile.tick(status, self.anticipate_steps);
        self.controller.predictor_mut().predict_temperature(status);

        if let Some(attrs) = self.profile.attributes_at(status.now) {
            if attrs.disable_limits {
                status.set_extra("stage-disable-limits", 1.0);
            }
            if attrs.disable_cutoff {
                status.set_extra("stage-disable-cutoff", 1.0);
            }
            if let Some(fan) = attrs.fan {
                status.set_extra("stage-fan", fan);
            }
        }

        let required = self.controller.get_required_power(status)?;
        let limited = self.controller.get_power_limited(status, required)?;
        status.set_power = Some(limited);

        if self.profile.is_terminal(status.now, status.period) {
            Ok(TickOutcome::Stop)
        } else {
            Ok(TickOutcome::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milton_thermal::{CalibrationTable, Event, PassThrough, Stage};

    fn controller() -> HybridPi {
        let rtd = CalibrationTable::from_points([(1.0, 0.0), (6.0, 100.0), (11.0, 200.0)]);
        HybridPi::new(2.47, 0.1, 0.0, 120.0, rtd, Box::new(PassThrough))
    }

    #[test]
    fn terminal_stage_stops_the_loop() {
        let profile = Profile::new(vec![Stage::new("bake", 2.0, 150.0)]);
        let mut cmd = ReflowCommand::new(profile, controller(), None);

        let mut status = StatusRecord::new(Event::TimerEvent, 0.0, 1.0);
        status.voltage = 6.0;
        status.current = 1.0;
        assert_eq!(cmd.timer_event(&mut status).unwrap(), TickOutcome::Continue);

        let mut status = StatusRecord::new(Event::TimerEvent, 3.0, 1.0);
        status.voltage = 6.0;
        status.current = 1.0;
        assert_eq!(cmd.timer_event(&mut status).unwrap(), TickOutcome::Stop);
    }

    #[test]
    fn stage_attributes_propagate_to_status_extras() {
        let mut preheat = Stage::new("preheat", 10.0, 150.0);
        preheat.fan = Some(0.5);
        preheat.disable_cutoff = true;
        let profile = Profile::new(vec![preheat]);
        let mut cmd = ReflowCommand::new(profile, controller(), None);

        let mut status = StatusRecord::new(Event::TimerEvent, 1.0, 1.0);
        status.voltage = 6.0;
        status.current = 1.0;
        cmd.timer_event(&mut status).unwrap();

        assert_eq!(status.field("stage-fan"), Some(0.5));
        assert_eq!(status.field("stage-disable-cutoff"), Some(1.0));
    }
}
