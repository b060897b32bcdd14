//! Drives the simulated backend through a short reflow profile with a real
//! `HybridPi` controller, exercising the same tick sequence `milton-host`'s
//! event loop uses (poll → predict → profile.tick → get_required_power →
//! get_power_limited → set_power), without needing the host crate.

use milton_sim::{HotplateModel, SimulatedBackend};
use milton_thermal::{
    CalibrationTable, Controller, Event, HybridPi, PassThrough, Profile, Stage, StatusRecord,
    SupplyBackend,
};

#[test]
fn closed_loop_tracks_a_single_stage_setpoint() {
    let model = HotplateModel::new(25.0, 6.0);
    let mut backend = SimulatedBackend::new(model, 1.0);
    backend.connect().unwrap();
    backend.set_on(true).unwrap();

    let profile = Profile::new(vec![Stage::new("bake", 120.0, 150.0)]);
    let mut controller = HybridPi::new(
        4.0,
        0.2,
        0.0,
        100.0,
        CalibrationTable::default(),
        Box::new(PassThrough),
    );

    let period = 1.0;
    let mut now = 0.0;

    for _ in 0..600 {
        now += period;
        let (v, i, _on) = backend.poll().unwrap();
        let mut status = StatusRecord::new(Event::TimerEvent, now, period);
        status.voltage = v;
        status.current = i;
        // No RTD table in this scenario (PassThrough predictor); feed the
        // model's element temperature directly, as `get_temperature` would
        // have after inverting a real calibration curve.
        status.temperature = backend.temperature();

        controller.get_ambient(&mut status);
        profile.tick(&mut status, None);
        controller.predictor_mut().predict_temperature(&mut status);

        let power = controller.get_required_power(&status).unwrap();
        let limited = controller.get_power_limited(&mut status, power).unwrap();

        // Constant-voltage bias: v = sqrt(p*r).
        let v = (limited * 6.0).sqrt();
        backend.set_voltage(v).unwrap();
    }

    assert!((backend.temperature() - 150.0).abs() < 10.0, "temperature = {}", backend.temperature());
}
