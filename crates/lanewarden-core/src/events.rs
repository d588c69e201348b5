//! Bounded per-tick event feed.
//!
//! The core crate does no I/O; callers drain [`LinkEvent`]s after each tick
//! and log them however they like. When the feed is full the oldest event is
//! dropped and counted.

use std::collections::VecDeque;

use crate::lifecycle::LinkState;
use crate::strategy::{RepairStrategy, RepairTier};

/// Events retained between drains.
pub const EVENT_CAPACITY: usize = 256;

/// Something the controller committed on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEventKind {
    StateChanged {
        from: LinkState,
        to: LinkState,
    },
    EpisodeStarted {
        tier: RepairTier,
        strategy: RepairStrategy,
    },
    TierEscalated {
        from: RepairTier,
        to: RepairTier,
        strategy: RepairStrategy,
    },
    EpisodeSucceeded {
        remapped: u32,
    },
    VerifyFailed {
        tier: RepairTier,
    },
    CoordinationTimeout,
    LaneRemapped {
        failing: usize,
        spare: usize,
        logical: usize,
    },
    LaneParked {
        lane: usize,
    },
    LaneUnparked {
        lane: usize,
    },
    /// A parked lane gave its slot inside the width to a live lane.
    LaneCompacted {
        parked: usize,
        replacement: usize,
        logical: usize,
    },
    ReversalCorrected,
    WidthChanged {
        from: usize,
        to: usize,
        degraded: bool,
    },
    ThermalThrottle {
        lane: usize,
        engaged: bool,
    },
    PredictedFailure {
        lane: usize,
        score: u16,
    },
}

impl LinkEventKind {
    /// Stable snake_case name for structured logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::EpisodeStarted { .. } => "episode_started",
            Self::TierEscalated { .. } => "tier_escalated",
            Self::EpisodeSucceeded { .. } => "episode_succeeded",
            Self::VerifyFailed { .. } => "verify_failed",
            Self::CoordinationTimeout => "coordination_timeout",
            Self::LaneRemapped { .. } => "lane_remapped",
            Self::LaneParked { .. } => "lane_parked",
            Self::LaneUnparked { .. } => "lane_unparked",
            Self::LaneCompacted { .. } => "lane_compacted",
            Self::ReversalCorrected => "reversal_corrected",
            Self::WidthChanged { .. } => "width_changed",
            Self::ThermalThrottle { .. } => "thermal_throttle",
            Self::PredictedFailure { .. } => "predicted_failure",
        }
    }

    /// Lane the event is about, if any.
    #[must_use]
    pub const fn lane(&self) -> Option<usize> {
        match self {
            Self::LaneRemapped { failing, .. } => Some(*failing),
            Self::LaneCompacted { parked, .. } => Some(*parked),
            Self::LaneParked { lane }
            | Self::LaneUnparked { lane }
            | Self::ThermalThrottle { lane, .. }
            | Self::PredictedFailure { lane, .. } => Some(*lane),
            _ => None,
        }
    }
}

/// Event stamped with the tick that committed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEvent {
    pub tick: u64,
    pub kind: LinkEventKind,
}

/// Ring of pending events.
#[derive(Debug, Clone, Default)]
pub struct EventFeed {
    pending: VecDeque<LinkEvent>,
    dropped: u32,
}

impl EventFeed {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::with_capacity(EVENT_CAPACITY),
            dropped: 0,
        }
    }

    pub fn push(&mut self, tick: u64, kind: LinkEventKind) {
        if self.pending.len() == EVENT_CAPACITY {
            self.pending.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.pending.push_back(LinkEvent { tick, kind });
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<LinkEvent> {
        self.pending.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Events lost to overflow since construction.
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}
