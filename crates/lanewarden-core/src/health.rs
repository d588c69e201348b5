//! # Health Monitor
//!
//! Classifies each lane every tick and maintains its weighted health score.
//!
//! ## Classification
//!
//! ```text
//! alarm   = error_rate > threshold
//! warning = error_rate > threshold/2  and not alarm
//! status  = Failed   if alarm or hard_error
//!           Marginal if warning
//!           Good     otherwise
//! ```
//!
//! ## Health score
//!
//! A weighted composite of four banded components, normalised back to
//! `0..=255` (weights sum to 8):
//!
//! ```text
//! score = (4*ber + 2*error + thermal + power) / 8
//! ```
//!
//! The monitor never fails; every input produces a classification and a score.

use crate::config::LinkConfig;
use crate::lane::{HEALTH_MAX, LaneSample, LaneStatus};

/// Die thermal condition derived from the raw thermal reading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ThermalBand {
    #[default]
    Nominal = 0,
    Warm = 1,
    /// Above the high-thermal limit.
    Elevated = 2,
    Critical = 3,
}

impl ThermalBand {
    /// Band for a raw die thermal reading.
    #[must_use]
    pub fn from_reading(reading: u8, config: &LinkConfig) -> Self {
        if reading >= config.thermal_critical {
            Self::Critical
        } else if reading >= config.thermal_elevated {
            Self::Elevated
        } else if reading >= config.thermal_warm {
            Self::Warm
        } else {
            Self::Nominal
        }
    }

    /// Thermal override applies (thresholds forced down, lanes throttled).
    #[must_use]
    pub const fn throttles(self) -> bool {
        matches!(self, Self::Elevated | Self::Critical)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Warm => "warm",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
        }
    }
}

/// Alarm/warning flags and resulting status for one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub alarm: bool,
    pub warning: bool,
    pub status: LaneStatus,
}

/// Classify one sample against a lane's adaptive threshold.
#[must_use]
pub fn classify(sample: &LaneSample, threshold: u16) -> Classification {
    let alarm = sample.error_rate > threshold;
    let warning = !alarm && sample.error_rate > threshold / 2;
    let status = if alarm || sample.hard_error {
        LaneStatus::Failed
    } else if warning {
        LaneStatus::Marginal
    } else {
        LaneStatus::Good
    };
    Classification {
        alarm,
        warning,
        status,
    }
}

fn ber_component(error_rate: u16, threshold: u16) -> u32 {
    if error_rate <= threshold / 2 {
        255
    } else if error_rate <= threshold {
        128
    } else {
        64
    }
}

fn error_component(sample: &LaneSample, threshold: u16) -> u32 {
    if sample.hard_error {
        0
    } else if sample.error_rate == 0 {
        255
    } else if sample.error_rate <= threshold / 4 {
        192
    } else {
        96
    }
}

fn thermal_component(band: ThermalBand) -> u32 {
    match band {
        ThermalBand::Nominal => 255,
        ThermalBand::Warm => 192,
        ThermalBand::Elevated => 128,
        ThermalBand::Critical => 32,
    }
}

fn power_component(power_draw: u8, config: &LinkConfig) -> u32 {
    if power_draw < config.power_nominal {
        255
    } else if power_draw < config.power_high {
        160
    } else {
        64
    }
}

/// Weighted composite health score, clamped to `0..=255`.
#[must_use]
pub fn health_score(
    sample: &LaneSample,
    threshold: u16,
    band: ThermalBand,
    config: &LinkConfig,
) -> u8 {
    let weighted = 4 * ber_component(sample.error_rate, threshold)
        + 2 * error_component(sample, threshold)
        + thermal_component(band)
        + power_component(sample.power_draw, config);
    (weighted / 8).min(u32::from(HEALTH_MAX)) as u8
}

/// Whether this tick lands on the health-history cadence.
#[must_use]
pub const fn is_history_tick(tick: u64, period: u32) -> bool {
    period != 0 && tick % period as u64 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TH: u16 = 1000;

    #[test]
    fn clean_lane_is_good() {
        let c = classify(&LaneSample::CLEAN, TH);
        assert_eq!(c.status, LaneStatus::Good);
        assert!(!c.alarm && !c.warning);
    }

    #[test]
    fn warning_band_is_marginal() {
        let c = classify(&LaneSample::with_error_rate(501), TH);
        assert!(c.warning && !c.alarm);
        assert_eq!(c.status, LaneStatus::Marginal);

        // Exactly half the threshold is not a warning.
        let c = classify(&LaneSample::with_error_rate(500), TH);
        assert_eq!(c.status, LaneStatus::Good);
    }

    #[test]
    fn alarm_is_failed_and_not_warning() {
        let c = classify(&LaneSample::with_error_rate(1001), TH);
        assert!(c.alarm);
        assert!(!c.warning);
        assert_eq!(c.status, LaneStatus::Failed);
    }

    #[test]
    fn hard_error_fails_regardless_of_rate() {
        let sample = LaneSample {
            error_rate: 0,
            hard_error: true,
            power_draw: 0,
        };
        assert_eq!(classify(&sample, TH).status, LaneStatus::Failed);
    }

    #[test]
    fn classification_is_exclusive_over_sweep() {
        for rate in (0..=3000u16).step_by(7) {
            for hard in [false, true] {
                let sample = LaneSample {
                    error_rate: rate,
                    hard_error: hard,
                    power_draw: 0,
                };
                let c = classify(&sample, TH);
                assert!(!(c.alarm && c.warning));
                let flags = [
                    c.status == LaneStatus::Good,
                    c.status == LaneStatus::Marginal,
                    c.status == LaneStatus::Failed,
                ];
                assert_eq!(flags.iter().filter(|f| **f).count(), 1);
            }
        }
    }

    #[test]
    fn perfect_lane_scores_max() {
        let cfg = LinkConfig::default();
        assert_eq!(
            health_score(&LaneSample::CLEAN, TH, ThermalBand::Nominal, &cfg),
            255
        );
    }

    #[test]
    fn score_degrades_with_errors_heat_and_power() {
        let cfg = LinkConfig::default();
        let clean = health_score(&LaneSample::CLEAN, TH, ThermalBand::Nominal, &cfg);
        let noisy = health_score(&LaneSample::with_error_rate(900), TH, ThermalBand::Nominal, &cfg);
        let hot = health_score(&LaneSample::CLEAN, TH, ThermalBand::Critical, &cfg);
        let loaded = health_score(
            &LaneSample {
                error_rate: 0,
                hard_error: false,
                power_draw: 250,
            },
            TH,
            ThermalBand::Nominal,
            &cfg,
        );
        assert!(noisy < clean);
        assert!(hot < clean);
        assert!(loaded < clean);

        let worst = health_score(&LaneSample::hard_failure(), TH, ThermalBand::Critical, &cfg);
        // (4*64 + 0 + 32 + 255) / 8
        assert_eq!(worst, 67);
    }

    #[test]
    fn thermal_bands_follow_limits() {
        let cfg = LinkConfig::default();
        assert_eq!(ThermalBand::from_reading(20, &cfg), ThermalBand::Nominal);
        assert_eq!(ThermalBand::from_reading(cfg.thermal_warm, &cfg), ThermalBand::Warm);
        assert_eq!(
            ThermalBand::from_reading(cfg.thermal_elevated, &cfg),
            ThermalBand::Elevated
        );
        assert_eq!(ThermalBand::from_reading(255, &cfg), ThermalBand::Critical);
        assert!(ThermalBand::Elevated.throttles());
        assert!(!ThermalBand::Warm.throttles());
    }

    #[test]
    fn history_cadence() {
        assert!(is_history_tick(0, 10));
        assert!(!is_history_tick(5, 10));
        assert!(is_history_tick(20, 10));
        assert!(!is_history_tick(20, 0));
    }
}
