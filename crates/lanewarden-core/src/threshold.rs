//! # Adaptive Threshold Tuner
//!
//! Runs once per tuning period and nudges each lane's alarm threshold:
//!
//! - improving trend (`recent_avg > old_avg`): relax by 1/16 (6.25%), capped
//!   at `2 * base`;
//! - degrading trend: tighten by 1/16, floored at `base / 2`;
//! - flat trend: unchanged.
//!
//! A hot die overrides the trend in the same pass: `Elevated` forces the
//! threshold to `base / 2`, `Critical` to `base / 4`, and marks the lane
//! thermally throttled. When the die cools the threshold returns to base.
//!
//! Every result is clamped to `[base / 4, base * 2]`.

use crate::health::ThermalBand;
use crate::lane::HealthHistory;

/// Result of tuning one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdUpdate {
    pub threshold: u16,
    pub thermal_throttled: bool,
}

/// Trend direction of a health history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTrend {
    Improving,
    Flat,
    Degrading,
}

impl HealthTrend {
    #[must_use]
    pub fn of(history: &HealthHistory) -> Self {
        let recent = history.recent_avg();
        let old = history.old_avg();
        match recent.cmp(&old) {
            std::cmp::Ordering::Greater => Self::Improving,
            std::cmp::Ordering::Equal => Self::Flat,
            std::cmp::Ordering::Less => Self::Degrading,
        }
    }
}

/// Lowest threshold a lane may hold.
#[must_use]
pub const fn floor(base: u16) -> u16 {
    base / 4
}

/// Highest threshold a lane may hold.
#[must_use]
pub const fn ceiling(base: u16) -> u16 {
    base.saturating_mul(2)
}

/// Forced threshold for a hot die, if any.
#[must_use]
pub const fn thermal_override(band: ThermalBand, base: u16) -> Option<u16> {
    match band {
        ThermalBand::Critical => Some(base / 4),
        ThermalBand::Elevated => Some(base / 2),
        ThermalBand::Nominal | ThermalBand::Warm => None,
    }
}

fn step(current: u16) -> u16 {
    (current / 16).max(1)
}

/// One tuning pass for one lane.
#[must_use]
pub fn tune(
    current: u16,
    base: u16,
    history: &HealthHistory,
    band: ThermalBand,
    was_throttled: bool,
) -> ThresholdUpdate {
    if let Some(forced) = thermal_override(band, base) {
        return ThresholdUpdate {
            threshold: forced.clamp(floor(base), ceiling(base)),
            thermal_throttled: true,
        };
    }
    if was_throttled {
        return ThresholdUpdate {
            threshold: base,
            thermal_throttled: false,
        };
    }

    let next = match HealthTrend::of(history) {
        HealthTrend::Improving => current.saturating_add(step(current)).min(ceiling(base)),
        HealthTrend::Degrading => {
            let lower = current.min(base / 2);
            current.saturating_sub(step(current)).max(lower)
        }
        HealthTrend::Flat => current,
    };
    ThresholdUpdate {
        threshold: next.clamp(floor(base), ceiling(base)),
        thermal_throttled: false,
    }
}

/// Whether this tick lands on the tuning cadence.
#[must_use]
pub const fn is_tuning_tick(tick: u64, period: u32) -> bool {
    period != 0 && tick % period as u64 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u16 = 1600;

    fn history(old: u8, recent: u8) -> HealthHistory {
        let mut h = HealthHistory::new();
        for _ in 0..4 {
            h.push(old);
        }
        for _ in 0..4 {
            h.push(recent);
        }
        h
    }

    #[test]
    fn improving_trend_relaxes_by_a_sixteenth() {
        let up = tune(BASE, BASE, &history(100, 200), ThermalBand::Nominal, false);
        assert_eq!(up.threshold, BASE + BASE / 16);
        assert!(!up.thermal_throttled);
    }

    #[test]
    fn degrading_trend_tightens_by_a_sixteenth() {
        let down = tune(BASE, BASE, &history(200, 100), ThermalBand::Nominal, false);
        assert_eq!(down.threshold, BASE - BASE / 16);
    }

    #[test]
    fn flat_trend_holds() {
        let same = tune(1234, BASE, &history(150, 150), ThermalBand::Warm, false);
        assert_eq!(same.threshold, 1234);
    }

    #[test]
    fn relax_is_capped_at_twice_base() {
        let mut th = BASE;
        for _ in 0..100 {
            th = tune(th, BASE, &history(10, 250), ThermalBand::Nominal, false).threshold;
        }
        assert_eq!(th, BASE * 2);
    }

    #[test]
    fn tighten_is_floored_at_half_base() {
        let mut th = BASE;
        for _ in 0..100 {
            th = tune(th, BASE, &history(250, 10), ThermalBand::Nominal, false).threshold;
        }
        assert_eq!(th, BASE / 2);
    }

    #[test]
    fn critical_thermal_forces_quarter_base_over_trend() {
        // Improving trend would relax, but the die is critical.
        let r = tune(BASE * 2, BASE, &history(10, 250), ThermalBand::Critical, false);
        assert_eq!(r.threshold, BASE / 4);
        assert!(r.thermal_throttled);
    }

    #[test]
    fn elevated_thermal_forces_half_base() {
        let r = tune(BASE, BASE, &history(250, 10), ThermalBand::Elevated, false);
        assert_eq!(r.threshold, BASE / 2);
        assert!(r.thermal_throttled);
    }

    #[test]
    fn cooling_restores_base() {
        let r = tune(BASE / 4, BASE, &history(10, 250), ThermalBand::Nominal, true);
        assert_eq!(r.threshold, BASE);
        assert!(!r.thermal_throttled);
    }

    #[test]
    fn tightening_from_below_half_never_raises() {
        let r = tune(BASE / 4, BASE, &history(250, 10), ThermalBand::Nominal, false);
        assert_eq!(r.threshold, BASE / 4);
    }

    #[test]
    fn trend_classification() {
        assert_eq!(HealthTrend::of(&history(1, 2)), HealthTrend::Improving);
        assert_eq!(HealthTrend::of(&history(2, 2)), HealthTrend::Flat);
        assert_eq!(HealthTrend::of(&history(2, 1)), HealthTrend::Degrading);
    }
}
