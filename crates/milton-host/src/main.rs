//! `milton`: a soft-realtime reflow-hotplate controller. CLI shape and
//! startup sequence follow `klipper-host::main` (`clap` derive, leading
//! subcommand, `tracing_subscriber::fmt::init()`), adapted to Milton's
//! synchronous event loop — no `#[tokio::main]`, no global allocator
//! override.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;

mod command;
mod config;
mod debug_cfg;
mod error;
mod event_loop;
mod interface;
mod logger;
mod settings;

use command::ReflowCommand;
use config::ConfigContext;
use error::MiltonError;
use event_loop::EventLoop;
use interface::{ElectricalLimits, PowerSupplyInterface};
use logger::Logger;
use settings::MiltonConfig;
use milton_sim::{HotplateModel, SimulatedBackend};
use milton_thermal::{Axis, MinimumSearch, Tuner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Closed-loop reflow-hotplate controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a (simulated, absent real supply hardware) power supply through a reflow profile.
    Run(RunArgs),
    /// Fit predictor/controller parameters offline against a recorded CSV history.
    Tune(TuneArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the main configuration document.
    #[arg(long)]
    config: PathBuf,

    /// Overlay document, optionally scoped to a dotted path: `[path:]file`. Repeatable.
    #[arg(long = "override")]
    overrides: Vec<String>,

    /// Additional include search directory, prepended in argument order. Repeatable.
    #[arg(long)]
    library: Vec<PathBuf>,

    /// Transport device identifier (ignored: the wire-level supply dialect is out of scope).
    #[arg(long)]
    device: Option<String>,

    /// Logged column, as `key[:printf-format]`. Repeatable.
    #[arg(long = "log")]
    log: Vec<String>,

    /// CSV filename template (`%c`/`%d` expand to command name / run timestamp).
    #[arg(long)]
    logger: Option<String>,

    /// Ambient temperature override, degrees C.
    #[arg(long)]
    ambient: Option<f64>,

    /// A reflow profile document, merged beneath the `profile` key.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Discard calibration tables, running with identity transforms.
    #[arg(long)]
    reset: bool,

    /// Nominal heating-element resistance as `R[:T]` (R>500 taken as milliohms).
    #[arg(long)]
    r0: Option<String>,

    /// Hard cutoff temperature, degrees C.
    #[arg(long)]
    cutoff: Option<i64>,

    /// An extra power-limit point as `T:P`, replacing the configured curve.
    #[arg(long)]
    limit: Option<String>,
}

#[derive(Parser, Debug)]
struct TuneArgs {
    /// CSV history file previously written by `run --log`.
    #[arg(long)]
    history: PathBuf,

    /// Configuration document providing the predictor's starting parameters.
    #[arg(long)]
    config: PathBuf,

    #[arg(long)]
    library: Vec<PathBuf>,

    /// Only fit against samples with `now <= cutoff`.
    #[arg(long)]
    time_cutoff: Option<f64>,

    /// Only fit against samples with `temperature <= cutoff`.
    #[arg(long)]
    temperature_cutoff: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ctx = build_context(match &cli.command {
        Commands::Run(args) => &args.library,
        Commands::Tune(args) => &args.library,
    });
    init_tracing(&ctx);

    match cli.command {
        Commands::Run(args) => run(args, ctx),
        Commands::Tune(args) => tune(args, ctx),
    }
}

fn build_context(library: &[PathBuf]) -> ConfigContext {
    let mut ctx = ConfigContext::from_env();
    for dir in library {
        ctx = ctx.with_library(dir.clone());
    }
    ctx
}

/// Installs a `Targets`-filtered `fmt` layer, loading `milton-debug.cfg` from
/// the first search directory that has one.
fn init_tracing(ctx: &ConfigContext) {
    let debug_file = ctx
        .search_dirs
        .iter()
        .map(|dir| dir.join("milton-debug.cfg"))
        .find(|path| path.exists());

    let targets = match debug_file {
        Some(path) => debug_cfg::load(&path),
        None => debug_cfg::load(std::path::Path::new("milton-debug.cfg")),
    };

    tracing_subscriber::registry()
        .with(targets)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run(args: RunArgs, ctx: ConfigContext) -> anyhow::Result<()> {
    let mut overrides: Vec<(Option<String>, PathBuf)> =
        args.overrides.iter().map(|spec| parse_override(spec)).collect();
    if let Some(profile_path) = &args.profile {
        overrides.push((Some("profile".to_string()), profile_path.clone()));
    }

    let config: MiltonConfig = config::load_with_overrides(&args.config, &overrides, &ctx)
        .context("failed to load configuration")?;

    if let Some(device) = &args.device {
        tracing::debug!(%device, "ignoring --device: this build only drives the in-process simulated supply");
    }

    let (voltage_cal, current_cal) = config.build_calibration();
    let limits: ElectricalLimits = config.limits.clone().into();

    let mut controller = config.build_controller();
    if let Some(ambient) = args.ambient {
        controller.ambient_default = ambient;
    }
    if let Some(cutoff) = args.cutoff {
        controller.set_cutoff_temperature(Some(cutoff as f64));
    }
    if let Some(spec) = &args.limit {
        let (t, p) = parse_limit(spec)?;
        controller.set_power_limit(Some(milton_thermal::PowerLimitCurve::new(
            milton_thermal::PiecewiseLinear::from_points([(t, p)]),
        )));
    }

    let profile = config.build_profile();

    let (resistance, _r0_temperature) = match &args.r0 {
        Some(spec) => parse_r0(spec)?,
        None => (6.0, None),
    };
    let ambient = config.ambient.unwrap_or(25.0);
    let model = HotplateModel::new(ambient, resistance);
    let backend = Box::new(SimulatedBackend::new(model, config.period));

    let mut interface = PowerSupplyInterface::new(backend, voltage_cal, current_cal, limits);
    if args.reset {
        interface.reset_calibration();
    }

    let command = ReflowCommand::new(profile, controller, config.anticipate_steps);
    let mut event_loop = EventLoop::new(interface, Box::new(command), config.period);
    if let Some(monitor) = config.build_safety_monitor() {
        event_loop = event_loop.with_safety_monitor(monitor);
    }

    info!("starting reflow run, period={}s", config.period);
    let history = match event_loop.run() {
        Ok(history) => history,
        Err(MiltonError::Interrupted) => {
            tracing::warn!("run interrupted");
            return Err(MiltonError::Interrupted.into());
        }
        Err(e) => return Err(e.into()),
    };

    write_log(&args, &history)?;
    info!("run complete: {} ticks recorded", history.len());
    Ok(())
}

fn write_log(args: &RunArgs, history: &milton_thermal::RunHistory) -> anyhow::Result<()> {
    let columns: Vec<(String, Option<String>)> = if args.log.is_empty() {
        ["now", "temperature", "voltage", "current", "power", "set-power"]
            .iter()
            .map(|k| (k.to_string(), None))
            .collect()
    } else {
        args.log.iter().map(|spec| parse_log_column(spec)).collect()
    };

    let template = args.logger.as_deref().unwrap_or("%c-%d.csv");
    let timestamp = run_timestamp();
    let filename = logger::expand_filename(template, "reflow", &timestamp);

    let mut log = Logger::create(&PathBuf::from(filename), &columns).context("failed to create CSV log")?;
    for status in history {
        log.write(status).context("failed to write CSV row")?;
    }
    Ok(())
}

fn run_timestamp() -> String {
    let now = time::OffsetDateTime::now_utc();
    let format = time::macros::format_description!("[year][month][day]-[hour][minute][second]");
    now.format(&format).unwrap_or_else(|_| "00000000-000000".to_string())
}

fn tune(args: TuneArgs, ctx: ConfigContext) -> anyhow::Result<()> {
    let config: MiltonConfig = config::load(&args.config, &ctx).context("failed to load configuration")?;
    let history = logger::read_history(&args.history).context("failed to read history CSV")?;

    let mut tuner = Tuner::new(&history);
    if let Some(cutoff) = args.time_cutoff {
        tuner = tuner.with_time_cutoff(cutoff);
    }
    if let Some(cutoff) = args.temperature_cutoff {
        tuner = tuner.with_temperature_cutoff(cutoff);
    }

    // Fits the DoubleLPF-style cascade {tau_inner, outer_offset, outer_gradient}
    // against the recorded element-temperature-to-predicted-temperature
    // relationship, independent of which predictor variant the config names —
    // a useful starting point the operator can then wire back into the
    // config's `predictor` section.
    let search = MinimumSearch::default();
    let axes = vec![
        Axis::new(0.1, 120.0),
        Axis::new(0.0, 60.0),
        Axis::new(0.0, 5.0),
    ];

    let result = tuner
        .with_search(search)
        .tune(
            axes,
            "double_lpf",
            |params, sample| {
                let alpha_inner = sample.period / (sample.period + params[0]);
                let intermediate = alpha_inner * sample.temperature;
                let tau_outer = (params[2] * intermediate + params[1]).max(sample.period);
                let alpha_outer = sample.period / (sample.period + tau_outer);
                alpha_outer * config.ambient.unwrap_or(25.0) + (1.0 - alpha_outer) * intermediate
            },
            |sample| sample.temperature,
        )
        .context("tuning search failed")?;

    info!(
        "fit {}: tau_inner={:.3} outer_offset={:.3} outer_gradient={:.4} sse={:.3}",
        result.package, result.parameters[0], result.parameters[1], result.parameters[2], result.sse
    );
    println!(
        "predictor:\n  kind: double_lpf\n  tau_inner: {:.3}\n  outer_offset: {:.3}\n  outer_gradient: {:.4}",
        result.parameters[0], result.parameters[1], result.parameters[2]
    );

    Ok(())
}

fn parse_override(spec: &str) -> (Option<String>, PathBuf) {
    match spec.split_once(':') {
        Some((path, file)) => (Some(path.to_string()), PathBuf::from(file)),
        None => (None, PathBuf::from(spec)),
    }
}

fn parse_log_column(spec: &str) -> (String, Option<String>) {
    match spec.split_once(':') {
        Some((key, format)) => (key.to_string(), Some(format.to_string())),
        None => (spec.to_string(), None),
    }
}

fn parse_r0(spec: &str) -> anyhow::Result<(f64, Option<f64>)> {
    let (r_str, t_str) = match spec.split_once(':') {
        Some((r, t)) => (r, Some(t)),
        None => (spec, None),
    };
    let mut resistance: f64 = r_str.parse().context("--r0 resistance must be a number")?;
    if resistance > 500.0 {
        resistance /= 1000.0;
    }
    let temperature = t_str
        .map(|s| s.parse::<f64>())
        .transpose()
        .context("--r0 temperature must be a number")?;
    Ok((resistance, temperature))
}

fn parse_limit(spec: &str) -> anyhow::Result<(f64, f64)> {
    let (t, p) = spec
        .split_once(':')
        .context("--limit expects T:P")?;
    Ok((t.parse().context("--limit temperature must be a number")?, p
        .parse()
        .context("--limit power must be a number")?))
}
