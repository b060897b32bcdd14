//! The per-sample status record: the carrier passed by reference through
//! poll → controller → command → interface and appended to the run history.
//!
//! The hot fields used by the control loop are named struct fields (typed,
//! no lookup cost) in a mixed-type status map, while an
//! extension map carries logger/extension columns. Both are addressable by
//! the same short string keys so a CSV column accessor can be built once
//! against either.

use std::collections::HashMap;

/// Which lifecycle event produced this status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Preprocess,
    TimerEvent,
    KeyEvent,
    Postprocess,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Preprocess => "preprocess",
            Event::TimerEvent => "timerEvent",
            Event::KeyEvent => "keyEvent",
            Event::Postprocess => "postprocess",
        }
    }
}

/// The per-sample carrier threaded through a tick.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub event: Event,
    /// Seconds since run start.
    pub now: f64,
    /// Tick period, seconds.
    pub period: f64,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    /// Heating-element resistance; absent when `current` is ~0.
    pub resistance: Option<f64>,
    /// Heating-element temperature, from the RTD inversion.
    pub temperature: f64,
    /// Resolved ambient temperature (see `Controller::get_ambient`).
    pub ambient: Option<f64>,
    pub device_temperature: Option<f64>,
    pub device_ambient: Option<f64>,
    pub predict_temperature: Option<f64>,
    pub then_temperature: Option<f64>,
    pub now_temperature: Option<f64>,
    pub anticipate_temperature: Option<f64>,
    pub anticipate_period: Option<f64>,
    pub set_power: Option<f64>,
    pub stage_name: Option<String>,
    /// The key pressed, for `Event::KeyEvent` records.
    pub key: Option<char>,
    extra: HashMap<String, f64>,
}

impl StatusRecord {
    /// Creates a bare record for the given event, with all optional fields
    /// unset. `temperature`/`voltage`/`current`/`power` default to zero and
    /// should be filled in by `Interface::poll` and `Controller::get_temperature`.
    pub fn new(event: Event, now: f64, period: f64) -> Self {
        Self {
            event,
            now,
            period,
            voltage: 0.0,
            current: 0.0,
            power: 0.0,
            resistance: None,
            temperature: 0.0,
            ambient: None,
            device_temperature: None,
            device_ambient: None,
            predict_temperature: None,
            then_temperature: None,
            now_temperature: None,
            anticipate_temperature: None,
            anticipate_period: None,
            set_power: None,
            stage_name: None,
            key: None,
            extra: HashMap::new(),
        }
    }

    /// Sets an extension column not covered by a named field.
    pub fn set_extra(&mut self, key: impl Into<String>, value: f64) {
        self.extra.insert(key.into(), value);
    }

    /// Reads a named field or extension column by its short string key.
    /// `event` and `key` are not numeric and are excluded; use
    /// [`StatusRecord::event`]/[`StatusRecord::key`] directly for those.
    pub fn field(&self, key: &str) -> Option<f64> {
        match key {
            "now" => Some(self.now),
            "period" => Some(self.period),
            "voltage" => Some(self.voltage),
            "current" => Some(self.current),
            "power" => Some(self.power),
            "resistance" => self.resistance,
            "temperature" => Some(self.temperature),
            "ambient" => self.ambient,
            "device-temperature" => self.device_temperature,
            "device-ambient" => self.device_ambient,
            "predict-temperature" => self.predict_temperature,
            "then-temperature" => self.then_temperature,
            "now-temperature" => self.now_temperature,
            "anticipate-temperature" => self.anticipate_temperature,
            "anticipate-period" => self.anticipate_period,
            "set-power" => self.set_power,
            _ => self.extra.get(key).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_reads_named_and_extra_columns() {
        let mut s = StatusRecord::new(Event::TimerEvent, 1.0, 0.5);
        s.temperature = 123.0;
        s.set_extra("stage-fan", 1.0);
        assert_eq!(s.field("temperature"), Some(123.0));
        assert_eq!(s.field("stage-fan"), Some(1.0));
        assert_eq!(s.field("resistance"), None);
        assert_eq!(s.field("nonexistent"), None);
    }
}
