//! Scenario fixtures.
//!
//! A scenario is a JSON document: a partial [`LinkConfig`] override, a tick
//! budget, a list of input phases applied at fixed ticks, and the
//! expectations checked once the run ends. The five reference scenarios ship
//! under `tests/scenarios/` at the workspace root and are compiled in as
//! built-ins.

use std::path::Path;

use lanewarden_core::{
    ConfigError, LaneSample, LinkConfig, LinkState, LinkTimeouts, PriorityMode, SignalingMode,
    TickInputs,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scenario document version understood by this harness.
pub const SCENARIO_SCHEMA_VERSION: u32 = 1;

/// Built-in scenarios as `(short name, document)`.
pub const BUILTINS: [(&str, &str); 5] = [
    ("a", include_str!("../../../tests/scenarios/a_all_good.json")),
    ("b", include_str!("../../../tests/scenarios/b_spare_remap.json")),
    ("c", include_str!("../../../tests/scenarios/c_degrade.json")),
    (
        "d",
        include_str!("../../../tests/scenarios/d_thermal_critical.json"),
    ),
    ("e", include_str!("../../../tests/scenarios/e_proactive.json")),
];

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid link config: {0}")]
    Config(#[from] ConfigError),
    #[error("unsupported scenario schema_version {found}")]
    SchemaVersion { found: u32 },
    #[error("phase at tick {at} names lane {lane}, but the link has {lanes} lanes")]
    LaneOutOfRange { at: u64, lane: usize, lanes: usize },
    #[error("unknown link state name '{0}'")]
    UnknownState(String),
    #[error("unknown builtin scenario '{0}' (expected one of a, b, c, d, e)")]
    UnknownBuiltin(String),
}

/// Optional overrides for [`LinkTimeouts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutOverrides {
    pub mapping_settle: Option<u32>,
    pub training: Option<u32>,
    pub training_timeout: Option<u32>,
    pub repair: Option<u32>,
    pub coordination: Option<u32>,
    pub verify_settle: Option<u32>,
    pub degrade_settle: Option<u32>,
    pub error_cooldown: Option<u32>,
}

impl TimeoutOverrides {
    fn apply(&self, mut t: LinkTimeouts) -> LinkTimeouts {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { t.$field = v; })*
            };
        }
        take!(
            mapping_settle,
            training,
            training_timeout,
            repair,
            coordination,
            verify_settle,
            degrade_settle,
            error_cooldown
        );
        t
    }
}

/// Partial link configuration. Absent fields keep [`LinkConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub num_lanes: Option<usize>,
    pub requested_width: Option<usize>,
    pub min_width: Option<usize>,
    pub base_threshold: Option<u16>,
    pub health_update_period: Option<u32>,
    pub tuning_period: Option<u32>,
    pub prediction_period: Option<u32>,
    pub prediction_threshold: Option<u8>,
    pub thermal_warm: Option<u8>,
    pub thermal_elevated: Option<u8>,
    pub thermal_critical: Option<u8>,
    pub power_nominal: Option<u8>,
    pub power_high: Option<u8>,
    /// `nrz` or `pam4`.
    pub signaling: Option<String>,
    /// `bandwidth`, `reliability`, `power` or `balanced`.
    pub priority: Option<String>,
    pub repair_enable: Option<bool>,
    pub advanced_repair: Option<bool>,
    pub adaptive_tuning: Option<bool>,
    pub prediction: Option<bool>,
    pub coordination_required: Option<bool>,
    pub timeouts: Option<TimeoutOverrides>,
}

impl ConfigOverrides {
    /// Overlay onto `base`. Does not validate.
    #[must_use]
    pub fn apply(&self, mut c: LinkConfig) -> LinkConfig {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { c.$field = v; })*
            };
        }
        take!(
            num_lanes,
            requested_width,
            min_width,
            base_threshold,
            health_update_period,
            tuning_period,
            prediction_period,
            prediction_threshold,
            thermal_warm,
            thermal_elevated,
            thermal_critical,
            power_nominal,
            power_high,
            repair_enable,
            advanced_repair,
            adaptive_tuning,
            prediction,
            coordination_required
        );
        if let Some(raw) = &self.signaling {
            c.signaling = SignalingMode::from_str_loose(raw);
        }
        if let Some(raw) = &self.priority {
            c.priority = PriorityMode::from_str_loose(raw);
        }
        if let Some(t) = &self.timeouts {
            c.timeouts = t.apply(c.timeouts);
        }
        c
    }
}

/// One sample applied to a set of lanes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaneSetting {
    pub lanes: Vec<usize>,
    #[serde(default)]
    pub error_rate: u16,
    #[serde(default)]
    pub hard_error: bool,
    #[serde(default)]
    pub power_draw: u8,
}

impl LaneSetting {
    #[must_use]
    pub fn sample(&self) -> LaneSample {
        LaneSample {
            error_rate: self.error_rate,
            hard_error: self.hard_error,
            power_draw: self.power_draw,
        }
    }
}

/// Input changes taking effect at tick `at` and holding until changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Phase {
    pub at: u64,
    /// Reset every lane to a clean sample before applying `lanes`.
    #[serde(default)]
    pub clear_lanes: bool,
    #[serde(default)]
    pub lanes: Vec<LaneSetting>,
    #[serde(default)]
    pub thermal: Option<u8>,
    #[serde(default)]
    pub reversal: Option<bool>,
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub repair_enable: Option<bool>,
    #[serde(default)]
    pub coordinator_ack: Option<bool>,
}

impl Phase {
    fn apply(&self, inputs: &mut TickInputs) {
        if self.clear_lanes {
            inputs.lanes.fill(LaneSample::CLEAN);
        }
        for setting in &self.lanes {
            let sample = setting.sample();
            for &lane in &setting.lanes {
                if let Some(slot) = inputs.lanes.get_mut(lane) {
                    *slot = sample;
                }
            }
        }
        if let Some(v) = self.thermal {
            inputs.thermal = v;
        }
        if let Some(v) = self.reversal {
            inputs.reversal_detected = v;
        }
        if let Some(v) = self.enable {
            inputs.enable = v;
        }
        if let Some(v) = self.repair_enable {
            inputs.repair_enable = v;
        }
        if let Some(v) = self.coordinator_ack {
            inputs.coordinator_ack = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingExpectation {
    pub physical: usize,
    pub logical: usize,
}

/// End-of-run checks. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectations {
    pub final_state: Option<String>,
    pub current_width: Option<usize>,
    pub target_width: Option<usize>,
    /// Lanes whose published `active` flag is set.
    pub active_lanes: Option<usize>,
    pub degradation_needed: Option<bool>,
    pub successful_repairs: Option<u32>,
    pub min_successful_repairs: Option<u32>,
    pub thermal_throttled: Option<bool>,
    /// Every lane's adaptive threshold.
    pub adaptive_threshold: Option<u16>,
    /// States that must be entered at some point.
    pub visits: Vec<String>,
    /// States that must never be entered.
    pub avoids: Vec<String>,
    pub mapping: Vec<MappingExpectation>,
    /// Lanes parked at the end of the run.
    pub parked: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub schema_version: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigOverrides,
    pub ticks: u64,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub expect: Expectations,
}

impl Scenario {
    /// Parse and check a scenario document.
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.check()?;
        Ok(scenario)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Look up a built-in by short name (`a`..`e`) or full scenario name.
    pub fn builtin(name: &str) -> Result<Self, ScenarioError> {
        for (short, json) in BUILTINS {
            let scenario = Self::from_json(json)?;
            if short == name || scenario.name == name {
                return Ok(scenario);
            }
        }
        Err(ScenarioError::UnknownBuiltin(name.to_string()))
    }

    /// Validated link configuration.
    pub fn link_config(&self) -> Result<LinkConfig, ScenarioError> {
        let config = self.config.apply(LinkConfig::default());
        config.validate()?;
        Ok(config)
    }

    /// Input stream for this scenario.
    pub fn inputs(&self) -> Result<ScenarioInputs<'_>, ScenarioError> {
        let lanes = self.link_config()?.num_lanes;
        let mut phases: Vec<&Phase> = self.phases.iter().collect();
        phases.sort_by_key(|p| p.at);
        Ok(ScenarioInputs {
            phases,
            next_phase: 0,
            tick: 0,
            current: TickInputs::clean(lanes),
        })
    }

    fn check(&self) -> Result<(), ScenarioError> {
        if self.schema_version != SCENARIO_SCHEMA_VERSION {
            return Err(ScenarioError::SchemaVersion {
                found: self.schema_version,
            });
        }
        let lanes = self.link_config()?.num_lanes;
        for phase in &self.phases {
            for setting in &phase.lanes {
                if let Some(&lane) = setting.lanes.iter().find(|&&l| l >= lanes) {
                    return Err(ScenarioError::LaneOutOfRange {
                        at: phase.at,
                        lane,
                        lanes,
                    });
                }
            }
        }
        for name in self.expect.visits.iter().chain(&self.expect.avoids) {
            state_from_name(name)?;
        }
        if let Some(name) = &self.expect.final_state {
            state_from_name(name)?;
        }
        Ok(())
    }
}

/// Yields the inputs for each successive tick. Phases take effect at the
/// first tick `>= at` in ascending order; ties keep file order.
#[derive(Debug, Clone)]
pub struct ScenarioInputs<'a> {
    phases: Vec<&'a Phase>,
    next_phase: usize,
    tick: u64,
    current: TickInputs,
}

impl ScenarioInputs<'_> {
    /// Inputs for the next tick.
    pub fn advance(&mut self) -> &TickInputs {
        while let Some(phase) = self.phases.get(self.next_phase) {
            if phase.at > self.tick {
                break;
            }
            phase.apply(&mut self.current);
            self.next_phase += 1;
        }
        self.tick += 1;
        &self.current
    }
}

/// Parse a lifecycle state by its log name.
pub fn state_from_name(name: &str) -> Result<LinkState, ScenarioError> {
    (0..16u8)
        .filter_map(LinkState::from_code)
        .find(|s| s.as_str() == name)
        .ok_or_else(|| ScenarioError::UnknownState(name.to_string()))
}
