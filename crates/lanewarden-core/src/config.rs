//! Link controller configuration.
//!
//! All tunables live in an explicit [`LinkConfig`] handed to
//! [`crate::LinkController::new`]. Nothing is read from ambient state during a
//! tick. Two knobs may be overridden from the environment before construction:
//!
//! - `LANEWARDEN_PRIORITY`: repair priority policy
//!   (`bandwidth`, `reliability`, `power`, `balanced`).
//! - `LANEWARDEN_SIGNALING`: lane signaling mode (`nrz`, `pam4`).
//!
//! Unknown values never fail; they fall back to the defaults, the same way the
//! runtime-mode parser treats unrecognised strings.

use thiserror::Error;

/// Largest lane count a controller accepts.
pub const MAX_LANES: usize = 1024;

/// Environment variable selecting the repair priority policy.
pub const PRIORITY_ENV: &str = "LANEWARDEN_PRIORITY";

/// Environment variable selecting the signaling mode.
pub const SIGNALING_ENV: &str = "LANEWARDEN_SIGNALING";

/// Policy steering repair tier/strategy selection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityMode {
    /// Keep the requested width at (almost) any cost.
    Bandwidth,
    /// Act early on predicted failures.
    Reliability,
    /// Prefer cheap, thermally aware repairs.
    Power,
    /// Severity-weighted mix of the above.
    #[default]
    Balanced,
}

impl PriorityMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "bandwidth" | "bw" | "throughput" => Self::Bandwidth,
            "reliability" | "rel" | "ras" => Self::Reliability,
            "power" | "pwr" | "thermal" => Self::Power,
            _ => Self::Balanced,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bandwidth => "bandwidth",
            Self::Reliability => "reliability",
            Self::Power => "power",
            Self::Balanced => "balanced",
        }
    }
}

/// Lane signaling mode. PAM4 carries an extra failure-prediction penalty.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalingMode {
    #[default]
    Nrz,
    Pam4,
}

impl SignalingMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pam4" | "pam-4" | "pam" => Self::Pam4,
            _ => Self::Nrz,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nrz => "nrz",
            Self::Pam4 => "pam4",
        }
    }
}

/// Configuration rejected by [`LinkConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("lane count must be nonzero")]
    ZeroLanes,
    #[error("lane count {lanes} exceeds the supported maximum {max}")]
    TooManyLanes { lanes: usize, max: usize },
    #[error("requested width {requested} must be in 1..={lanes}")]
    RequestedWidthOutOfRange { requested: usize, lanes: usize },
    #[error("minimum width {min} must be in 1..={requested}")]
    MinWidthOutOfRange { min: usize, requested: usize },
    #[error("base error threshold must be nonzero")]
    ZeroBaseThreshold,
    #[error("{name} period must be nonzero")]
    ZeroPeriod { name: &'static str },
    #[error("{name} timeout must be nonzero")]
    ZeroTimeout { name: &'static str },
    #[error("thermal limits must satisfy warm <= elevated <= critical (got {warm}/{elevated}/{critical})")]
    ThermalLimitsOutOfOrder { warm: u8, elevated: u8, critical: u8 },
    #[error("power limits must satisfy nominal <= high (got {nominal}/{high})")]
    PowerLimitsOutOfOrder { nominal: u8, high: u8 },
}

/// Timeouts and settle times, in ticks. Every bound is hard: reaching it always
/// forces a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimeouts {
    /// Mapping -> Training settle time.
    pub mapping_settle: u32,
    /// Minimum dwell in Training before going Active.
    pub training: u32,
    /// Training -> Error bound.
    pub training_timeout: u32,
    /// Upper bound on every repair sub-state.
    pub repair: u32,
    /// Coordinator acknowledgment window in RepairRequest.
    pub coordination: u32,
    /// Dwell in RepairVerify before judging the episode.
    pub verify_settle: u32,
    /// Dwell in Degrade before deciding Active or Error.
    pub degrade_settle: u32,
    /// Error cooldown before an automatic retry from Init.
    pub error_cooldown: u32,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            mapping_settle: 16,
            training: 64,
            training_timeout: 4_096,
            repair: 256,
            coordination: 128,
            verify_settle: 4,
            degrade_settle: 16,
            error_cooldown: 1_000_000,
        }
    }
}

/// Full controller configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Physical lane count N (fixed for the controller lifetime).
    pub num_lanes: usize,
    /// Requested link width (logical lanes carrying traffic).
    pub requested_width: usize,
    /// Narrowest width the link may degrade to.
    pub min_width: usize,
    /// Base error-rate alarm threshold; adaptive thresholds move around it.
    pub base_threshold: u16,
    /// Ticks between health-history pushes.
    pub health_update_period: u32,
    /// Ticks between adaptive threshold passes.
    pub tuning_period: u32,
    /// Ticks between failure-prediction passes.
    pub prediction_period: u32,
    /// High byte of the predicted failure score above which a lane is
    /// flagged as predicted to fail.
    pub prediction_threshold: u8,
    /// Die thermal reading at/above which the die counts as warm.
    pub thermal_warm: u8,
    /// High-thermal limit: thresholds are forced to 50% of base.
    pub thermal_elevated: u8,
    /// Critical limit: thresholds are forced to 25% of base.
    pub thermal_critical: u8,
    /// Per-lane power draw at/above which a lane counts as loaded.
    pub power_nominal: u8,
    /// Per-lane power draw at/above which a lane counts as stressed.
    pub power_high: u8,
    pub signaling: SignalingMode,
    pub priority: PriorityMode,
    /// Master repair enable. When off the link only monitors.
    pub repair_enable: bool,
    /// Route repairs through the strategy-specific sub-states.
    pub advanced_repair: bool,
    pub adaptive_tuning: bool,
    pub prediction: bool,
    /// Repairs wait for a coordinator acknowledgment before remapping.
    pub coordination_required: bool,
    pub timeouts: LinkTimeouts,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            num_lanes: 72,
            requested_width: 64,
            min_width: 16,
            base_threshold: 0x0800,
            health_update_period: 10_000,
            tuning_period: 50_000,
            prediction_period: 1_000,
            prediction_threshold: 0x40,
            thermal_warm: 85,
            thermal_elevated: 100,
            thermal_critical: 115,
            power_nominal: 128,
            power_high: 200,
            signaling: SignalingMode::Nrz,
            priority: PriorityMode::Balanced,
            repair_enable: true,
            advanced_repair: true,
            adaptive_tuning: true,
            prediction: true,
            coordination_required: false,
            timeouts: LinkTimeouts::default(),
        }
    }
}

impl LinkConfig {
    /// Default configuration with the given lane geometry.
    #[must_use]
    pub fn with_lanes(num_lanes: usize, requested_width: usize, min_width: usize) -> Self {
        Self {
            num_lanes,
            requested_width,
            min_width,
            ..Self::default()
        }
    }

    /// Number of lanes beyond the requested width.
    #[must_use]
    pub const fn spare_lanes(&self) -> usize {
        self.num_lanes.saturating_sub(self.requested_width)
    }

    /// Apply `LANEWARDEN_PRIORITY` / `LANEWARDEN_SIGNALING` if set.
    #[must_use]
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(
            std::env::var(PRIORITY_ENV).ok().as_deref(),
            std::env::var(SIGNALING_ENV).ok().as_deref(),
        )
    }

    fn apply_overrides(mut self, priority: Option<&str>, signaling: Option<&str>) -> Self {
        if let Some(raw) = priority {
            self.priority = PriorityMode::from_str_loose(raw);
        }
        if let Some(raw) = signaling {
            self.signaling = SignalingMode::from_str_loose(raw);
        }
        self
    }

    /// Check geometry, periods, limits and timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_lanes == 0 {
            return Err(ConfigError::ZeroLanes);
        }
        if self.num_lanes > MAX_LANES {
            return Err(ConfigError::TooManyLanes {
                lanes: self.num_lanes,
                max: MAX_LANES,
            });
        }
        if self.requested_width == 0 || self.requested_width > self.num_lanes {
            return Err(ConfigError::RequestedWidthOutOfRange {
                requested: self.requested_width,
                lanes: self.num_lanes,
            });
        }
        if self.min_width == 0 || self.min_width > self.requested_width {
            return Err(ConfigError::MinWidthOutOfRange {
                min: self.min_width,
                requested: self.requested_width,
            });
        }
        if self.base_threshold == 0 {
            return Err(ConfigError::ZeroBaseThreshold);
        }
        for (name, period) in [
            ("health update", self.health_update_period),
            ("tuning", self.tuning_period),
            ("prediction", self.prediction_period),
        ] {
            if period == 0 {
                return Err(ConfigError::ZeroPeriod { name });
            }
        }
        if !(self.thermal_warm <= self.thermal_elevated
            && self.thermal_elevated <= self.thermal_critical)
        {
            return Err(ConfigError::ThermalLimitsOutOfOrder {
                warm: self.thermal_warm,
                elevated: self.thermal_elevated,
                critical: self.thermal_critical,
            });
        }
        if self.power_nominal > self.power_high {
            return Err(ConfigError::PowerLimitsOutOfOrder {
                nominal: self.power_nominal,
                high: self.power_high,
            });
        }
        let t = &self.timeouts;
        for (name, value) in [
            ("training", t.training_timeout),
            ("repair", t.repair),
            ("coordination", t.coordination),
            ("error cooldown", t.error_cooldown),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout { name });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_priority_modes() {
        assert_eq!(PriorityMode::from_str_loose("bandwidth"), PriorityMode::Bandwidth);
        assert_eq!(PriorityMode::from_str_loose("BW"), PriorityMode::Bandwidth);
        assert_eq!(PriorityMode::from_str_loose("reliability"), PriorityMode::Reliability);
        assert_eq!(PriorityMode::from_str_loose(" Power "), PriorityMode::Power);
        assert_eq!(PriorityMode::from_str_loose("balanced"), PriorityMode::Balanced);
        assert_eq!(PriorityMode::from_str_loose("bogus"), PriorityMode::Balanced);
    }

    #[test]
    fn parse_signaling_modes() {
        assert_eq!(SignalingMode::from_str_loose("pam4"), SignalingMode::Pam4);
        assert_eq!(SignalingMode::from_str_loose("PAM-4"), SignalingMode::Pam4);
        assert_eq!(SignalingMode::from_str_loose("nrz"), SignalingMode::Nrz);
        assert_eq!(SignalingMode::from_str_loose(""), SignalingMode::Nrz);
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.spare_lanes(), 8);
        assert_eq!(cfg.health_update_period, 10_000);
        assert_eq!(cfg.tuning_period, 50_000);
        assert_eq!(cfg.prediction_period, 1_000);
    }

    #[test]
    fn rejects_bad_geometry() {
        assert_eq!(
            LinkConfig::with_lanes(0, 0, 0).validate(),
            Err(ConfigError::ZeroLanes)
        );
        assert_eq!(
            LinkConfig::with_lanes(8, 9, 1).validate(),
            Err(ConfigError::RequestedWidthOutOfRange {
                requested: 9,
                lanes: 8
            })
        );
        assert_eq!(
            LinkConfig::with_lanes(8, 4, 5).validate(),
            Err(ConfigError::MinWidthOutOfRange {
                min: 5,
                requested: 4
            })
        );
        assert!(matches!(
            LinkConfig::with_lanes(MAX_LANES + 1, 8, 1).validate(),
            Err(ConfigError::TooManyLanes { .. })
        ));
    }

    #[test]
    fn rejects_zero_periods_and_disordered_limits() {
        let cfg = LinkConfig {
            tuning_period: 0,
            ..LinkConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroPeriod { name: "tuning" })
        );

        let cfg = LinkConfig {
            thermal_elevated: 120,
            ..LinkConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ThermalLimitsOutOfOrder { .. })
        ));

        let mut cfg = LinkConfig::default();
        cfg.timeouts.repair = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout { name: "repair" }));
    }

    #[test]
    fn overrides_only_touch_present_values() {
        let cfg = LinkConfig::default().apply_overrides(Some("power"), None);
        assert_eq!(cfg.priority, PriorityMode::Power);
        assert_eq!(cfg.signaling, SignalingMode::Nrz);

        let cfg = LinkConfig::default().apply_overrides(None, Some("pam4"));
        assert_eq!(cfg.priority, PriorityMode::Balanced);
        assert_eq!(cfg.signaling, SignalingMode::Pam4);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let msg = ConfigError::MinWidthOutOfRange {
            min: 5,
            requested: 4,
        }
        .to_string();
        assert!(msg.contains("minimum width 5"));
    }
}
