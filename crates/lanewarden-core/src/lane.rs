//! Per-lane records.
//!
//! One [`LaneRecord`] exists per physical lane for the controller lifetime.
//! Mapping indices live in the remap engine; everything else about a lane
//! (its sample, threshold, classification and scores) lives here.

/// Number of health samples retained per lane.
pub const HEALTH_HISTORY_LEN: usize = 8;

/// Health score of a lane with no observed degradation.
pub const HEALTH_MAX: u8 = 255;

/// Mutually exclusive lane classification, derived every tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LaneStatus {
    #[default]
    Good = 0,
    Marginal = 1,
    Failed = 2,
}

impl LaneStatus {
    /// Good or Marginal: the lane can carry traffic.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        !matches!(self, Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Marginal => "marginal",
            Self::Failed => "failed",
        }
    }
}

/// Raw per-lane sample supplied by the physical layer each tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LaneSample {
    /// Opaque error-rate magnitude.
    pub error_rate: u16,
    pub hard_error: bool,
    /// Per-lane power draw.
    pub power_draw: u8,
}

impl LaneSample {
    /// A sample with no errors at nominal power.
    pub const CLEAN: Self = Self {
        error_rate: 0,
        hard_error: false,
        power_draw: 0,
    };

    #[must_use]
    pub const fn with_error_rate(error_rate: u16) -> Self {
        Self {
            error_rate,
            hard_error: false,
            power_draw: 0,
        }
    }

    #[must_use]
    pub const fn hard_failure() -> Self {
        Self {
            error_rate: u16::MAX,
            hard_error: true,
            power_draw: 0,
        }
    }
}

/// Fixed ring of the last [`HEALTH_HISTORY_LEN`] health scores.
///
/// Starts saturated at [`HEALTH_MAX`] so a fresh lane shows a flat trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HealthHistory {
    samples: [u8; HEALTH_HISTORY_LEN],
    /// Index the next push overwrites (the oldest sample).
    write_idx: usize,
}

impl Default for HealthHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthHistory {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: [HEALTH_MAX; HEALTH_HISTORY_LEN],
            write_idx: 0,
        }
    }

    /// Overwrite the oldest sample.
    pub fn push(&mut self, score: u8) {
        self.samples[self.write_idx] = score;
        self.write_idx = (self.write_idx + 1) % HEALTH_HISTORY_LEN;
    }

    /// Samples ordered oldest first.
    #[must_use]
    pub fn chronological(&self) -> [u8; HEALTH_HISTORY_LEN] {
        let mut out = [0u8; HEALTH_HISTORY_LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.samples[(self.write_idx + i) % HEALTH_HISTORY_LEN];
        }
        out
    }

    /// Most recently pushed sample.
    #[must_use]
    pub fn latest(&self) -> u8 {
        self.samples[(self.write_idx + HEALTH_HISTORY_LEN - 1) % HEALTH_HISTORY_LEN]
    }

    /// Mean of the four newest samples.
    #[must_use]
    pub fn recent_avg(&self) -> u8 {
        let ordered = self.chronological();
        mean4(&ordered[HEALTH_HISTORY_LEN / 2..])
    }

    /// Mean of the four oldest samples.
    #[must_use]
    pub fn old_avg(&self) -> u8 {
        let ordered = self.chronological();
        mean4(&ordered[..HEALTH_HISTORY_LEN / 2])
    }
}

fn mean4(samples: &[u8]) -> u8 {
    let sum: u32 = samples.iter().map(|&s| u32::from(s)).sum();
    (sum / samples.len().max(1) as u32) as u8
}

/// Registered state of one physical lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaneRecord {
    pub physical_index: usize,
    /// Last error-rate sample.
    pub error_rate: u16,
    /// Current alarm threshold, bounded to `[base/4, base*2]`.
    pub adaptive_threshold: u16,
    pub status: LaneStatus,
    pub under_repair: bool,
    /// Disabled after an unrepairable failure; see [`crate::LinkState::Degrade`].
    pub parked: bool,
    pub health_score: u8,
    pub health_history: HealthHistory,
    pub predicted_failure_score: u16,
    pub reliability_score: u8,
    pub prediction_confidence: u8,
    pub predicted_failure: bool,
    /// Rolling predictor memory: low byte of each error sample shifted in.
    pub error_trend: u16,
    pub thermal_throttled: bool,
}

impl LaneRecord {
    /// Fresh record at the base threshold.
    #[must_use]
    pub const fn new(physical_index: usize, base_threshold: u16) -> Self {
        Self {
            physical_index,
            error_rate: 0,
            adaptive_threshold: base_threshold,
            status: LaneStatus::Good,
            under_repair: false,
            parked: false,
            health_score: HEALTH_MAX,
            health_history: HealthHistory::new(),
            predicted_failure_score: 0,
            reliability_score: HEALTH_MAX,
            prediction_confidence: crate::predictor::INITIAL_CONFIDENCE,
            predicted_failure: false,
            error_trend: 0,
            thermal_throttled: false,
        }
    }

    #[must_use]
    pub const fn is_good(&self) -> bool {
        matches!(self.status, LaneStatus::Good)
    }

    #[must_use]
    pub const fn is_marginal(&self) -> bool {
        matches!(self.status, LaneStatus::Marginal)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, LaneStatus::Failed)
    }
}

/// Per-lane output flags published every tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LaneFlags {
    /// Not parked.
    pub enabled: bool,
    /// Enabled and mapped inside the current width.
    pub active: bool,
    pub good: bool,
    pub marginal: bool,
    pub failed: bool,
    pub under_repair: bool,
    pub predicted_failure: bool,
    pub thermal_throttled: bool,
    /// Currently available in the spare pool.
    pub spare: bool,
}
