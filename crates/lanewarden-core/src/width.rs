//! # Width Manager
//!
//! Derives the achievable link width from the usable lane count:
//!
//! ```text
//! available >= requested  ->  target = requested,                degraded = false
//! otherwise               ->  target = max(available, min_width), degraded = true
//! ```
//!
//! `current_width` follows `target_width` only while the link is Active or
//! Monitoring; it is held through training and repair so the width does not
//! flap mid-repair.

/// Width bookkeeping for one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidthState {
    pub requested_width: usize,
    pub min_width: usize,
    /// Good + Marginal lanes.
    pub available_lanes: usize,
    pub target_width: usize,
    pub current_width: usize,
    pub degradation_needed: bool,
}

/// Target width and degradation flag for a usable lane count.
#[must_use]
pub fn target_width(available: usize, requested: usize, min_width: usize) -> (usize, bool) {
    if available >= requested {
        (requested, false)
    } else {
        (available.max(min_width), true)
    }
}

impl WidthState {
    /// All lanes assumed usable; nothing committed to the link yet.
    #[must_use]
    pub const fn new(num_lanes: usize, requested_width: usize, min_width: usize) -> Self {
        Self {
            requested_width,
            min_width,
            available_lanes: num_lanes,
            target_width: requested_width,
            current_width: 0,
            degradation_needed: false,
        }
    }

    /// Next width state for this tick's usable lane count.
    ///
    /// `track` is true when the lifecycle state allows `current_width` to move.
    #[must_use]
    pub fn advance(&self, available: usize, track: bool) -> Self {
        let (target, degraded) = target_width(available, self.requested_width, self.min_width);
        Self {
            requested_width: self.requested_width,
            min_width: self.min_width,
            available_lanes: available,
            target_width: target,
            current_width: if track { target } else { self.current_width },
            degradation_needed: degraded,
        }
    }

    /// Width the link can actually carry with its usable lanes.
    #[must_use]
    pub fn achievable(&self) -> usize {
        self.available_lanes.min(self.requested_width)
    }
}
