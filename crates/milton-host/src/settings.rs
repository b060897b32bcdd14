//! Typed configuration schema: the `serde::Deserialize` shape loaded by
//! [`crate::config::load`] and assembled into the runtime objects
//! (`Profile`, `HybridPi`, `ChannelCalibration`, `ElectricalLimits`) the
//! `run`/`tune` commands construct.

use serde::Deserialize;

use milton_thermal::{
    CalibrationTable, ChannelCalibration, DoubleLpf, DoubleLpfPower, HybridPi, PassThrough,
    PiecewiseLinear, PowerLimitCurve, Predictor, Profile, RunawayMonitor, SafetyLimits, Stage,
};

use crate::interface::ElectricalLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig(Vec<(f64, f64)>);

impl TableConfig {
    pub fn into_piecewise(self) -> PiecewiseLinear {
        PiecewiseLinear::from_points(self.0)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub requested: Option<TableConfig>,
    #[serde(default)]
    pub output: Option<TableConfig>,
    #[serde(default)]
    pub setpoint: Option<TableConfig>,
}

impl ChannelConfig {
    pub fn into_calibration(self) -> ChannelCalibration {
        let mut ch = ChannelCalibration::identity();
        if let Some(t) = self.requested {
            ch.set_requested(t.into_piecewise());
        }
        if let Some(t) = self.output {
            ch.set_output(t.into_piecewise());
        }
        if let Some(t) = self.setpoint {
            ch.set_setpoint(t.into_piecewise());
        }
        ch
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub voltage: ChannelConfig,
    #[serde(default)]
    pub current: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub vmin: f64,
    pub vmax: f64,
    pub imin: f64,
    pub imax: f64,
    pub pmax: f64,
}

impl From<LimitsConfig> for ElectricalLimits {
    fn from(c: LimitsConfig) -> Self {
        ElectricalLimits {
            vmin: c.vmin,
            vmax: c.vmax,
            imin: c.imin,
            imax: c.imax,
            pmax: c.pmax,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    pub kp: f64,
    pub ki: f64,
    #[serde(default)]
    pub kaw: Option<f64>,
    pub pmin: f64,
    pub pmax: f64,
    #[serde(default)]
    pub ambient_default: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictorConfig {
    PassThrough,
    DoubleLpf {
        tau_inner: f64,
        outer_offset: f64,
        outer_gradient: f64,
    },
    DoubleLpfPower {
        tau_inner: f64,
        outer_offset: f64,
        outer_gradient: f64,
        tau_power: TableConfig,
        gain: TableConfig,
    },
}

impl PredictorConfig {
    pub fn into_predictor(self) -> Box<dyn Predictor> {
        match self {
            PredictorConfig::PassThrough => Box::new(PassThrough),
            PredictorConfig::DoubleLpf {
                tau_inner,
                outer_offset,
                outer_gradient,
            } => Box::new(DoubleLpf::new(tau_inner, outer_offset, outer_gradient)),
            PredictorConfig::DoubleLpfPower {
                tau_inner,
                outer_offset,
                outer_gradient,
                tau_power,
                gain,
            } => Box::new(DoubleLpfPower::new(
                DoubleLpf::new(tau_inner, outer_offset, outer_gradient),
                tau_power.into_piecewise(),
                gain.into_piecewise(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub seconds: f64,
    pub temperature: f64,
    #[serde(default)]
    pub fan: Option<f64>,
    #[serde(default)]
    pub disable_limits: bool,
    #[serde(default)]
    pub disable_cutoff: bool,
}

impl From<StageConfig> for Stage {
    fn from(c: StageConfig) -> Self {
        let mut s = Stage::new(c.name, c.seconds, c.temperature);
        s.fan = c.fan;
        s.disable_limits = c.disable_limits;
        s.disable_cutoff = c.disable_cutoff;
        s
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    pub max_temperature: f64,
    pub min_heat_gain: f64,
    pub min_heat_gain_seconds: f64,
    pub max_deviation: f64,
}

impl From<SafetyConfig> for SafetyLimits {
    fn from(c: SafetyConfig) -> Self {
        SafetyLimits {
            max_temperature: c.max_temperature,
            min_heat_gain: c.min_heat_gain,
            min_heat_gain_seconds: c.min_heat_gain_seconds,
            max_deviation: c.max_deviation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiltonConfig {
    pub period: f64,
    #[serde(default)]
    pub ambient: Option<f64>,
    #[serde(default)]
    pub rtd: Option<TableConfig>,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    pub limits: LimitsConfig,
    pub controller: ControllerConfig,
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub power_limit: Option<TableConfig>,
    #[serde(default)]
    pub cutoff: Option<f64>,
    #[serde(default)]
    pub anticipate_steps: Option<u32>,
    #[serde(default)]
    pub safety: Option<SafetyConfig>,
    pub profile: Vec<StageConfig>,
}

impl MiltonConfig {
    pub fn rtd_table(&self) -> CalibrationTable {
        match &self.rtd {
            Some(t) => CalibrationTable::from_points(t.0.clone()),
            None => CalibrationTable::default(),
        }
    }

    pub fn build_profile(&self) -> Profile {
        Profile::new(self.profile.iter().cloned().map(Stage::from).collect())
    }

    /// Builds the `(voltage, current)` channel calibrations for
    /// `PowerSupplyInterface`.
    pub fn build_calibration(&self) -> (ChannelCalibration, ChannelCalibration) {
        (
            self.calibration.voltage.clone().into_calibration(),
            self.calibration.current.clone().into_calibration(),
        )
    }

    pub fn build_controller(&self) -> HybridPi {
        let mut controller = HybridPi::new(
            self.controller.kp,
            self.controller.ki,
            self.controller.pmin,
            self.controller.pmax,
            self.rtd_table(),
            self.predictor.clone().into_predictor(),
        );
        controller.kaw = self.controller.kaw;
        if let Some(ambient) = self.controller.ambient_default.or(self.ambient) {
            controller.ambient_default = ambient;
        }
        if let Some(table) = &self.power_limit {
            controller.set_power_limit(Some(PowerLimitCurve::new(table.clone().into_piecewise())));
        }
        controller.set_cutoff_temperature(self.cutoff);
        controller
    }

    /// Builds the thermal-runaway watchdog, when a `safety` section is
    /// configured. Absent a section, no window is monitored beyond the
    /// cutoff/power-limit policy already in `HybridPi`.
    pub fn build_safety_monitor(&self) -> Option<RunawayMonitor> {
        self.safety.clone().map(|c| RunawayMonitor::new(c.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
period: 1.0
ambient: 25.0
rtd:
  - [100.0, 0.0]
  - [138.5, 100.0]
limits:
  vmin: 0.0
  vmax: 30.0
  imin: 0.0
  imax: 10.0
  pmax: 150.0
controller:
  kp: 2.47
  ki: 0.1
  pmin: 0.0
  pmax: 120.0
predictor:
  kind: pass_through
profile:
  - name: preheat
    seconds: 90.0
    temperature: 150.0
  - name: soak
    seconds: 60.0
    temperature: 180.0
"#
    }

    #[test]
    fn deserializes_a_minimal_config_and_builds_a_controller() {
        let config: MiltonConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.period, 1.0);
        assert_eq!(config.profile.len(), 2);

        let controller = config.build_controller();
        assert_eq!(controller.pmax, 120.0);

        let profile = config.build_profile();
        assert_eq!(profile.stage_at(0.0), Some("preheat"));
    }

    #[test]
    fn predictor_kind_tag_selects_the_right_variant() {
        let yaml = r#"
kind: double_lpf
tau_inner: 5.0
outer_offset: 10.0
outer_gradient: 0.5
"#;
        let predictor: PredictorConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(predictor, PredictorConfig::DoubleLpf { .. }));
    }
}
