//! The single-threaded cooperative event loop: `Init → Preprocess → Ticking
//! ↔ KeyInput → Postprocess → Shutdown`, multiplexed with
//! `crossbeam_channel::select!` over a periodic tick, an optional keypress
//! channel and a signal channel — so a periodic timer, keyboard input and
//! POSIX termination signals are all multiplexed by the same loop, the same
//! way `birkenfeld-secop-rs` multiplexes a `crossbeam-channel::select!` fed
//! by a `signal-hook` delivery thread.

use std::io::Read as _;
use std::time::Duration;

use crossbeam_channel::{bounded, never, select, tick, Receiver};
use milton_thermal::{Event, RunHistory, RunawayMonitor, StatusRecord, ThermalState};
use signal_hook::consts::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{info, warn};

use crate::command::{Command, TickOutcome};
use crate::error::MiltonError;
use crate::interface::PowerSupplyInterface;

/// Consecutive per-tick transport failures tolerated before escalating to
/// shutdown.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

pub struct EventLoop {
    interface: PowerSupplyInterface,
    command: Box<dyn Command>,
    history: RunHistory,
    period: f64,
    safety: Option<RunawayMonitor>,
}

impl EventLoop {
    pub fn new(interface: PowerSupplyInterface, command: Box<dyn Command>, period: f64) -> Self {
        Self {
            interface,
            command,
            history: RunHistory::new(),
            period,
            safety: None,
        }
    }

    /// Installs a thermal-runaway watchdog, checked once per tick alongside
    /// the consecutive-transport-failure escalation.
    pub fn with_safety_monitor(mut self, monitor: RunawayMonitor) -> Self {
        self.safety = Some(monitor);
        self
    }

    /// Runs the full lifecycle to completion (or interruption). Returns the
    /// recorded history so the caller (`main`) can hand it to the data
    /// logger and/or `postprocess`'s caller has already seen it.
    pub fn run(mut self) -> Result<RunHistory, MiltonError> {
        self.interface.connect()?;

        let mut preprocess_status = StatusRecord::new(Event::Preprocess, 0.0, self.period);
        self.interface.poll(&mut preprocess_status)?;
        self.command.preprocess(&mut preprocess_status)?;

        let signal_rx = spawn_signal_thread();
        let key_rx = if self.command.capabilities().key_event {
            Some(spawn_keypress_thread())
        } else {
            None
        };

        let ticker = tick(Duration::from_secs_f64(self.period));
        let key_source: Receiver<char> = key_rx.unwrap_or_else(never);

        let mut now = 0.0;
        let mut consecutive_failures = 0u32;
        let mut interrupted = false;

        'ticking: loop {
            select! {
                recv(ticker) -> _ => {
                    now += self.period;
                    let outcome = self.run_tick(now, &mut consecutive_failures);
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        warn!("too many consecutive transport failures, shutting down");
                        break 'ticking;
                    }
                    if outcome == TickOutcome::Stop {
                        break 'ticking;
                    }
                }
                recv(key_source) -> key => {
                    let Ok(key) = key else { continue };
                    let mut status = StatusRecord::new(Event::KeyEvent, now, self.period);
                    status.key = Some(key);
                    match self.command.key_event(&mut status) {
                        Ok(TickOutcome::Stop) => {
                            self.history.push(status);
                            break 'ticking;
                        }
                        Ok(TickOutcome::Continue) => self.history.push(status),
                        Err(e) => warn!("key_event failed: {e}"),
                    }
                }
                recv(signal_rx) -> _ => {
                    info!("termination signal received, shutting down");
                    interrupted = true;
                    break 'ticking;
                }
            }
        }

        if !interrupted {
            let mut status = StatusRecord::new(Event::Postprocess, now, self.period);
            if let Err(e) = self.interface.poll(&mut status) {
                warn!("final poll before postprocess failed: {e}");
            }
            self.command.postprocess(&self.history)?;
        }

        self.interface.shutdown();

        if interrupted {
            Err(MiltonError::Interrupted)
        } else {
            Ok(self.history)
        }
    }

    /// Runs exactly one timer tick: poll → command.timer_event →
    /// interface.set_power → history.push. Never propagates a transport
    /// error out of the tick itself; instead it logs and counts toward the
    /// escalation threshold.
    fn run_tick(&mut self, now: f64, consecutive_failures: &mut u32) -> TickOutcome {
        let mut status = StatusRecord::new(Event::TimerEvent, now, self.period);

        if let Err(e) = self.interface.poll(&mut status) {
            warn!("poll failed: {e}");
            *consecutive_failures += 1;
            self.history.push(status);
            return TickOutcome::Continue;
        }

        let outcome = match self.command.timer_event(&mut status) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("timer_event failed: {e}");
                self.history.push(status);
                return TickOutcome::Continue;
            }
        };

        if let Some(power) = status.set_power {
            if let Err(e) = self.interface.set_power(power, status.resistance) {
                warn!("set_power failed: {e}");
                *consecutive_failures += 1;
            } else {
                *consecutive_failures = 0;
            }
        }

        let powered = status.set_power.unwrap_or(0.0) > 0.0;
        let setpoint = status.now_temperature.unwrap_or(status.temperature);
        if let Some(monitor) = &mut self.safety {
            if monitor.update(now, status.temperature, setpoint, powered) == ThermalState::Shutdown {
                warn!("thermal runaway monitor tripped, shutting down");
                self.history.push(status);
                return TickOutcome::Stop;
            }
        }

        self.history.push(status);
        outcome
    }
}

/// Spawns the delivery thread that blocks on `Signals::forever()` and
/// forwards one message per received SIGINT/SIGTERM/SIGQUIT. Pure I/O
/// plumbing, not application logic — the same division of labor
/// `birkenfeld-secop-rs` uses for its own signal handling.
fn spawn_signal_thread() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    match Signals::new([SIGINT, SIGTERM, SIGQUIT]) {
        Ok(mut signals) => {
            std::thread::spawn(move || {
                for _ in signals.forever() {
                    let _ = tx.send(());
                    break;
                }
            });
        }
        Err(e) => {
            warn!("failed to register signal handler: {e}");
        }
    }
    rx
}

/// Spawns the terminal-reader thread: blocking byte-at-a-time reads from
/// stdin, forwarded as `char`s. Only installed when the active command's
/// capability struct declares `key_event`.
fn spawn_keypress_thread() -> Receiver<char> {
    let (tx, rx) = bounded(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for byte in stdin.lock().bytes() {
            let Ok(byte) = byte else { break };
            if tx.send(byte as char).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use milton_thermal::ChannelCalibration;

    use crate::command::Capabilities;
    use crate::interface::ElectricalLimits;
    use milton_thermal::{SupplyBackend, TransportError};

    struct StubBackend;
    impl SupplyBackend for StubBackend {
        fn connect(&mut self) -> Result<(f64, f64, bool, f64, f64), TransportError> {
            Ok((0.0, 0.0, true, 6.0, 1.0))
        }
        fn disconnect(&mut self) {}
        fn poll(&mut self) -> Result<(f64, f64, Option<bool>), TransportError> {
            Ok((6.0, 1.0, Some(true)))
        }
        fn set_voltage(&mut self, _v: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
            Ok((true, None, None))
        }
        fn set_current(&mut self, _i: f64) -> Result<(bool, Option<bool>, Option<f64>), TransportError> {
            Ok((true, None, None))
        }
        fn set_on(&mut self, _flag: bool) -> Result<bool, TransportError> {
            Ok(true)
        }
    }

    struct OneShotCommand;
    impl Command for OneShotCommand {
        fn name(&self) -> &str {
            "one-shot"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }
        fn timer_event(&mut self, status: &mut StatusRecord) -> Result<TickOutcome, MiltonError> {
            status.set_power = Some(10.0);
            Ok(TickOutcome::Stop)
        }
    }

    fn interface() -> PowerSupplyInterface {
        PowerSupplyInterface::new(
            Box::new(StubBackend),
            ChannelCalibration::default(),
            ChannelCalibration::default(),
            ElectricalLimits { vmin: 0.0, vmax: 30.0, imin: 0.0, imax: 10.0, pmax: 150.0 },
        )
    }

    #[test]
    fn run_stops_after_a_single_tick_and_completes_postprocess() {
        let event_loop = EventLoop::new(interface(), Box::new(OneShotCommand), 0.01);
        let history = event_loop.run().unwrap();
        assert_eq!(history.len(), 1);
    }

    struct StalledCommand;
    impl Command for StalledCommand {
        fn name(&self) -> &str {
            "stalled"
        }
        fn timer_event(&mut self, status: &mut StatusRecord) -> Result<TickOutcome, MiltonError> {
            status.set_power = Some(10.0);
            Ok(TickOutcome::Continue)
        }
    }

    #[test]
    fn runaway_monitor_escalates_to_shutdown_on_a_stalled_element() {
        let limits = milton_thermal::SafetyLimits {
            max_temperature: 1000.0,
            min_heat_gain: 1.0,
            min_heat_gain_seconds: 0.0,
            max_deviation: 1000.0,
        };
        let event_loop = EventLoop::new(interface(), Box::new(StalledCommand), 0.01)
            .with_safety_monitor(RunawayMonitor::new(limits));
        let history = event_loop.run().unwrap();
        assert_eq!(history.len(), 2);
    }
}
