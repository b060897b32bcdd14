use criterion::{criterion_group, criterion_main, Criterion};

use milton_thermal::{
    CalibrationTable, Controller, DoubleLpf, Event, HybridPi, PassThrough, Predictor, StatusRecord,
};

fn tick_with_hybrid_pi(controller: &mut HybridPi, now: f64) -> f64 {
    let mut status = StatusRecord::new(Event::TimerEvent, now, 1.0);
    status.voltage = 12.0;
    status.current = 2.0;
    status.now_temperature = Some(100.0);

    controller.get_temperature(&mut status).unwrap();
    controller.get_ambient(&mut status);
    controller.predictor_mut().predict_temperature(&mut status);
    let power = controller.get_required_power(&status).unwrap();
    controller.get_power_limited(&mut status, power).unwrap()
}

fn bench_control_tick(c: &mut Criterion) {
    let rtd = CalibrationTable::from_points([(1.0, 0.0), (6.0, 100.0), (11.0, 200.0)]);
    let predictor = Box::new(DoubleLpf::new(20.0, 300.0, 0.0));
    let mut controller = HybridPi::new(2.47, 0.1, 0.0, 120.0, rtd, predictor);

    c.bench_function("hybrid_pi_tick", |b| {
        b.iter(|| tick_with_hybrid_pi(&mut controller, 1.0));
    });
}

fn bench_pass_through_tick(c: &mut Criterion) {
    let rtd = CalibrationTable::default();
    let mut controller = HybridPi::new(1.0, 0.0, 0.0, 100.0, rtd, Box::new(PassThrough));

    c.bench_function("pass_through_tick", |b| {
        b.iter(|| tick_with_hybrid_pi(&mut controller, 1.0));
    });
}

criterion_group!(benches, bench_control_tick, bench_pass_through_tick);
criterion_main!(benches);
