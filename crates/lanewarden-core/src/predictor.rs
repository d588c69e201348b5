//! # Failure Predictor
//!
//! Advisory, periodic per-lane failure scoring. Runs every prediction period
//! when enabled and never blocks the alarm/hard-error repair path.
//!
//! ## Score
//!
//! ```text
//! predicted_failure_score = error_rate
//!                         + thermal_penalty
//!                         + power_penalty
//!                         + history_penalty
//!                         + signaling_penalty      (saturating u16)
//! reliability_score       = 255 - (score >> 8)
//! predicted_failure       = (score >> 8) > prediction_threshold
//! ```
//!
//! ## Memory
//!
//! Each lane keeps a 16-bit shift register; every pass shifts in the low byte
//! of the error sample. The register's upper byte doubles as the accuracy
//! indicator: high values step the confidence up toward
//! [`CONFIDENCE_CEILING`], low values step it down toward zero. Penalty and
//! accuracy read the register as committed by the previous pass.

use crate::config::{LinkConfig, SignalingMode};
use crate::health::ThermalBand;
use crate::lane::{HEALTH_MAX, LaneSample};

/// Confidence of a lane that has never been scored.
pub const INITIAL_CONFIDENCE: u8 = 128;

/// Upper bound on prediction confidence.
pub const CONFIDENCE_CEILING: u8 = 240;

/// Confidence change per pass.
pub const CONFIDENCE_STEP: u8 = 8;

/// Accuracy indicator at/above which confidence rises.
pub const ACCURACY_HIGH: u8 = 0x80;

/// Extra score for PAM4 signaling.
pub const PAM4_PENALTY: u16 = 0x0200;

/// Output of one prediction pass for one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub score: u16,
    pub reliability: u8,
    pub confidence: u8,
    pub error_trend: u16,
    pub predicted_failure: bool,
}

/// Penalty for the die thermal condition.
#[must_use]
pub const fn thermal_penalty(band: ThermalBand) -> u16 {
    match band {
        ThermalBand::Nominal => 0,
        ThermalBand::Warm => 0x0400,
        ThermalBand::Elevated => 0x1000,
        ThermalBand::Critical => 0x4000,
    }
}

/// Penalty for per-lane power stress.
#[must_use]
pub const fn power_penalty(power_draw: u8, config: &LinkConfig) -> u16 {
    if power_draw >= config.power_high {
        0x1000
    } else if power_draw >= config.power_nominal {
        0x0400
    } else {
        0
    }
}

/// Penalty from the rolling error memory.
#[must_use]
pub const fn history_penalty(error_trend: u16) -> u16 {
    (error_trend >> 8) * 16
}

#[must_use]
pub const fn signaling_penalty(mode: SignalingMode) -> u16 {
    match mode {
        SignalingMode::Nrz => 0,
        SignalingMode::Pam4 => PAM4_PENALTY,
    }
}

fn next_confidence(confidence: u8, error_trend: u16) -> u8 {
    let accuracy = (error_trend >> 8) as u8;
    if accuracy >= ACCURACY_HIGH {
        confidence.saturating_add(CONFIDENCE_STEP).min(CONFIDENCE_CEILING)
    } else {
        confidence.saturating_sub(CONFIDENCE_STEP)
    }
}

/// Score one lane.
///
/// `error_trend` and `confidence` are the lane's registers from the previous
/// pass.
#[must_use]
pub fn predict(
    sample: &LaneSample,
    error_trend: u16,
    confidence: u8,
    band: ThermalBand,
    config: &LinkConfig,
) -> Prediction {
    let score = sample
        .error_rate
        .saturating_add(thermal_penalty(band))
        .saturating_add(power_penalty(sample.power_draw, config))
        .saturating_add(history_penalty(error_trend))
        .saturating_add(signaling_penalty(config.signaling));
    let high = (score >> 8) as u8;
    Prediction {
        score,
        reliability: HEALTH_MAX - high,
        confidence: next_confidence(confidence, error_trend),
        error_trend: (error_trend << 8) | (sample.error_rate & 0x00ff),
        predicted_failure: high > config.prediction_threshold,
    }
}

/// Whether this tick lands on the prediction cadence.
#[must_use]
pub const fn is_prediction_tick(tick: u64, period: u32) -> bool {
    period != 0 && tick % period as u64 == 0
}
