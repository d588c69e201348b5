//! # Statistics and Status Word
//!
//! `LinkStatistics` holds wide saturating counters. `StatusWord` packs the
//! externally visible summary into 32 bits:
//!
//! ```text
//!  bit  0..=4   state code
//!  bit  5..=6   repair tier
//!  bit  7..=9   repair strategy
//!  bit 10..=13  failed lanes            (saturates at 15)
//!  bit 14..=17  lanes needing repair    (saturates at 15)
//!  bit 18..=21  successful repairs      (saturates at 15)
//!  bit 22..=25  failed repairs          (saturates at 15)
//!  bit 26       width degradation
//!  bit 27       repair active
//!  bit 28       ML repair triggered
//!  bit 29       reversal corrected
//!  bit 30       any lane thermally throttled
//! ```

use crate::lifecycle::LinkState;
use crate::strategy::{RepairContext, RepairStrategy, RepairTier};

/// Aggregate counters, all saturating at `u32::MAX`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkStatistics {
    pub ticks: u32,
    /// Lanes remapped in episodes that verified.
    pub successful_repairs: u32,
    /// Verify failures.
    pub failed_repairs: u32,
    /// Remaps committed.
    pub repair_attempts: u32,
    pub escalations: u32,
    pub degrade_entries: u32,
    pub error_entries: u32,
    pub coordination_timeouts: u32,
    pub reversal_corrections: u32,
    pub prediction_runs: u32,
    pub tuning_runs: u32,
    pub events_dropped: u32,
}

impl LinkStatistics {
    /// Counters in declaration order.
    #[must_use]
    pub const fn as_array(&self) -> [u32; 12] {
        [
            self.ticks,
            self.successful_repairs,
            self.failed_repairs,
            self.repair_attempts,
            self.escalations,
            self.degrade_entries,
            self.error_entries,
            self.coordination_timeouts,
            self.reversal_corrections,
            self.prediction_runs,
            self.tuning_runs,
            self.events_dropped,
        ]
    }
}

pub(crate) fn bump(counter: &mut u32, by: u32) {
    *counter = counter.saturating_add(by);
}

const NIBBLE: u32 = 0xf;

fn nibble(value: u32) -> u32 {
    value.min(NIBBLE)
}

fn nibble_usize(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX).min(NIBBLE)
}

const STATE_SHIFT: u32 = 0;
const TIER_SHIFT: u32 = 5;
const STRATEGY_SHIFT: u32 = 7;
const FAILED_SHIFT: u32 = 10;
const NEEDING_SHIFT: u32 = 14;
const SUCCESS_SHIFT: u32 = 18;
const FAILED_REPAIRS_SHIFT: u32 = 22;
const DEGRADED_BIT: u32 = 1 << 26;
const REPAIR_ACTIVE_BIT: u32 = 1 << 27;
const ML_TRIGGERED_BIT: u32 = 1 << 28;
const REVERSAL_BIT: u32 = 1 << 29;
const THERMAL_BIT: u32 = 1 << 30;

/// Packed 32-bit status summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord(pub u32);

impl StatusWord {
    #[must_use]
    pub fn pack(summary: &LinkSummary) -> Self {
        let mut word = u32::from(summary.state.code()) << STATE_SHIFT;
        word |= (summary.context.tier as u32) << TIER_SHIFT;
        word |= summary.context.strategy.index() << STRATEGY_SHIFT;
        word |= nibble_usize(summary.failed_lanes) << FAILED_SHIFT;
        word |= nibble_usize(summary.needing_repair) << NEEDING_SHIFT;
        word |= nibble(summary.stats.successful_repairs) << SUCCESS_SHIFT;
        word |= nibble(summary.stats.failed_repairs) << FAILED_REPAIRS_SHIFT;
        for (set, bit) in [
            (summary.degradation_needed, DEGRADED_BIT),
            (summary.repair_active, REPAIR_ACTIVE_BIT),
            (summary.ml_repair_triggered, ML_TRIGGERED_BIT),
            (summary.reversal_corrected, REVERSAL_BIT),
            (summary.thermal_throttled, THERMAL_BIT),
        ] {
            if set {
                word |= bit;
            }
        }
        Self(word)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn state(self) -> Option<LinkState> {
        LinkState::from_code((self.0 & 0x1f) as u8)
    }

    #[must_use]
    pub const fn tier(self) -> RepairTier {
        match (self.0 >> TIER_SHIFT) & 0x3 {
            0 => RepairTier::Preventive,
            1 => RepairTier::Corrective,
            2 => RepairTier::Aggressive,
            _ => RepairTier::Emergency,
        }
    }

    #[must_use]
    pub fn strategy(self) -> Option<RepairStrategy> {
        let idx = ((self.0 >> STRATEGY_SHIFT) & 0x7) as usize;
        RepairStrategy::ALL.get(idx).copied()
    }

    #[must_use]
    pub const fn failed_lanes(self) -> u32 {
        (self.0 >> FAILED_SHIFT) & NIBBLE
    }

    #[must_use]
    pub const fn needing_repair(self) -> u32 {
        (self.0 >> NEEDING_SHIFT) & NIBBLE
    }

    #[must_use]
    pub const fn successful_repairs(self) -> u32 {
        (self.0 >> SUCCESS_SHIFT) & NIBBLE
    }

    #[must_use]
    pub const fn failed_repairs(self) -> u32 {
        (self.0 >> FAILED_REPAIRS_SHIFT) & NIBBLE
    }

    #[must_use]
    pub const fn degradation_needed(self) -> bool {
        self.0 & DEGRADED_BIT != 0
    }

    #[must_use]
    pub const fn repair_active(self) -> bool {
        self.0 & REPAIR_ACTIVE_BIT != 0
    }

    #[must_use]
    pub const fn ml_repair_triggered(self) -> bool {
        self.0 & ML_TRIGGERED_BIT != 0
    }

    #[must_use]
    pub const fn reversal_corrected(self) -> bool {
        self.0 & REVERSAL_BIT != 0
    }

    #[must_use]
    pub const fn thermal_throttled(self) -> bool {
        self.0 & THERMAL_BIT != 0
    }
}

/// Link-level outputs of one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkSummary {
    pub tick: u64,
    pub state: LinkState,
    /// Tier and strategy in force: the episode's while repairing, otherwise
    /// the selector's recommendation.
    pub context: RepairContext,
    pub failed_lanes: usize,
    pub needing_repair: usize,
    pub available_lanes: usize,
    pub free_spares: usize,
    pub target_width: usize,
    pub current_width: usize,
    pub degradation_needed: bool,
    pub repair_active: bool,
    pub ml_repair_triggered: bool,
    pub reversal_corrected: bool,
    pub thermal_throttled: bool,
    pub stats: LinkStatistics,
}

impl LinkSummary {
    #[must_use]
    pub fn status_word(&self) -> StatusWord {
        StatusWord::pack(self)
    }
}
