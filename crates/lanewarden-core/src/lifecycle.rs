//! # Lifecycle State Machine
//!
//! Top-level link states and the pure next-state function.
//!
//! ```text
//! Init -> Mapping -> Training -> Active <-> Monitoring
//!                        |          |
//!                        v          +--> RepairRequest -> RepairActive --+
//!                      Error        +--> MlPrediction / AdaptiveTune /   |
//!                        ^          |    HierarchicalRepair /            |
//!                        |          |    ThermalRepair / ProactiveRepair |
//!                        |          |    SelfHealing --------------------+
//!                        |          |                                    v
//!                        +------ Degrade <--- (top tier exhausted) -- RepairVerify
//!                                   ^                                    |
//!                                   +------ (no spares) Active           +--> Active
//! ```
//!
//! [`next_state`] reads only a [`DecisionView`] built from the previous
//! tick's committed state and this tick's inputs; it never mutates anything.
//! Every timed state has a hard bound that always forces a transition.

use crate::config::LinkTimeouts;
use crate::strategy::{RepairContext, RepairStrategy, RepairTier};

/// Lifecycle state of the link.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    #[default]
    Init = 0,
    Mapping = 1,
    Training = 2,
    Active = 3,
    Monitoring = 4,
    RepairRequest = 5,
    RepairActive = 6,
    MlPrediction = 7,
    AdaptiveTune = 8,
    HierarchicalRepair = 9,
    ThermalRepair = 10,
    ProactiveRepair = 11,
    SelfHealing = 12,
    RepairVerify = 13,
    Degrade = 14,
    Error = 15,
}

/// Which lanes a repair sub-state remaps, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairScope {
    /// No remapping.
    None,
    Failed,
    FailedThenPredicted,
    PredictedThenFailed,
    FailedThenMarginal,
    /// No remapping; failing lanes get their base threshold back and the
    /// state waits for them to recover.
    AwaitRecovery,
}

impl LinkState {
    /// Numeric code used by the packed status word.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`LinkState::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Init,
            1 => Self::Mapping,
            2 => Self::Training,
            3 => Self::Active,
            4 => Self::Monitoring,
            5 => Self::RepairRequest,
            6 => Self::RepairActive,
            7 => Self::MlPrediction,
            8 => Self::AdaptiveTune,
            9 => Self::HierarchicalRepair,
            10 => Self::ThermalRepair,
            11 => Self::ProactiveRepair,
            12 => Self::SelfHealing,
            13 => Self::RepairVerify,
            14 => Self::Degrade,
            15 => Self::Error,
            _ => return None,
        })
    }

    /// States that carry traffic at the committed width.
    #[must_use]
    pub const fn is_operational(self) -> bool {
        matches!(self, Self::Active | Self::Monitoring)
    }

    /// Part of a repair episode (request, sub-states, verify).
    #[must_use]
    pub const fn is_repair(self) -> bool {
        matches!(
            self,
            Self::RepairRequest
                | Self::RepairActive
                | Self::MlPrediction
                | Self::AdaptiveTune
                | Self::HierarchicalRepair
                | Self::ThermalRepair
                | Self::ProactiveRepair
                | Self::SelfHealing
                | Self::RepairVerify
        )
    }

    /// A repair sub-state that works on lanes (excludes request and verify).
    #[must_use]
    pub const fn is_repair_worker(self) -> bool {
        self.is_repair() && !matches!(self, Self::RepairRequest | Self::RepairVerify)
    }

    #[must_use]
    pub const fn scope(self) -> RepairScope {
        match self {
            Self::RepairActive | Self::AdaptiveTune | Self::ThermalRepair => RepairScope::Failed,
            Self::MlPrediction => RepairScope::FailedThenPredicted,
            Self::ProactiveRepair => RepairScope::PredictedThenFailed,
            Self::HierarchicalRepair => RepairScope::FailedThenMarginal,
            Self::SelfHealing => RepairScope::AwaitRecovery,
            _ => RepairScope::None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Mapping => "mapping",
            Self::Training => "training",
            Self::Active => "active",
            Self::Monitoring => "monitoring",
            Self::RepairRequest => "repair_request",
            Self::RepairActive => "repair_active",
            Self::MlPrediction => "ml_prediction",
            Self::AdaptiveTune => "adaptive_tune",
            Self::HierarchicalRepair => "hierarchical_repair",
            Self::ThermalRepair => "thermal_repair",
            Self::ProactiveRepair => "proactive_repair",
            Self::SelfHealing => "self_healing",
            Self::RepairVerify => "repair_verify",
            Self::Degrade => "degrade",
            Self::Error => "error",
        }
    }
}

/// Repair sub-state that carries out a strategy.
#[must_use]
pub const fn repair_state_for(strategy: RepairStrategy) -> LinkState {
    match strategy {
        RepairStrategy::BasicRemap => LinkState::RepairRequest,
        RepairStrategy::Adaptive => LinkState::AdaptiveTune,
        RepairStrategy::Predictive => LinkState::MlPrediction,
        RepairStrategy::Hierarchical => LinkState::HierarchicalRepair,
        RepairStrategy::Thermal => LinkState::ThermalRepair,
        RepairStrategy::Proactive => LinkState::ProactiveRepair,
        RepairStrategy::SelfHealing => LinkState::SelfHealing,
    }
}

/// Everything [`next_state`] may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionView {
    pub enable: bool,
    pub repair_enable: bool,
    pub advanced_repair: bool,
    pub prediction_enabled: bool,
    pub coordination_required: bool,
    pub coordinator_ack: bool,
    /// Ticks already spent in the current state.
    pub timer: u32,
    /// Failed lanes in the active range, not under repair, not parked.
    pub needing_repair: usize,
    /// Predicted-failure lanes in the active range that are still usable.
    pub predicted_candidates: usize,
    /// Free spares available this tick.
    pub free_spares: usize,
    /// Lanes the current repair sub-state still has to service after this
    /// tick's remaps. Predicted and marginal lanes count only while free
    /// spares remain.
    pub scope_remaining: usize,
    pub available_lanes: usize,
    pub requested_width: usize,
    /// Width the link carried going into this tick.
    pub committed_width: usize,
    pub min_width: usize,
    /// Selector output for this tick.
    pub recommendation: RepairContext,
    /// Tier of the running episode.
    pub episode_tier: RepairTier,
}

impl DecisionView {
    /// Every lane needing repair can get a spare.
    #[must_use]
    pub const fn repair_possible(&self) -> bool {
        self.needing_repair <= self.free_spares
    }

    /// `min(requested, available)`.
    #[must_use]
    pub const fn achievable_width(&self) -> usize {
        if self.available_lanes < self.requested_width {
            self.available_lanes
        } else {
            self.requested_width
        }
    }

    const fn proactive_serviceable(&self) -> bool {
        self.advanced_repair
            && self.prediction_enabled
            && self.predicted_candidates > 0
            && self.free_spares > 0
    }

    const fn wants_repair(&self) -> bool {
        self.repair_enable && (self.needing_repair > 0 || self.proactive_serviceable())
    }
}

/// Side effect a transition asks the controller to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeEffect {
    None,
    /// Init -> Mapping: identity mapping and fresh lane records.
    ResetLink,
    BeginEpisode(RepairContext),
    Escalate(RepairContext),
    EpisodeSucceeded,
    /// Top tier verify failed; falling through to Degrade.
    EpisodeExhausted,
    /// Coordinator never acknowledged; handled like a tier timeout.
    CoordinationTimeout,
    /// Degrade settled back to Active; tier returns to Preventive.
    DegradeResolved,
}

/// Next state plus the effect to commit with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub next: LinkState,
    pub effect: EpisodeEffect,
}

impl Decision {
    const fn stay(state: LinkState) -> Self {
        Self {
            next: state,
            effect: EpisodeEffect::None,
        }
    }

    const fn go(next: LinkState) -> Self {
        Self {
            next,
            effect: EpisodeEffect::None,
        }
    }

    const fn with(next: LinkState, effect: EpisodeEffect) -> Self {
        Self { next, effect }
    }
}

const fn elapsed(timer: u32, bound: u32) -> bool {
    timer.saturating_add(1) >= bound
}

fn entry_state(ctx: &RepairContext, advanced: bool) -> LinkState {
    if advanced {
        repair_state_for(ctx.strategy)
    } else {
        LinkState::RepairRequest
    }
}

/// Decide the next state for one tick.
#[must_use]
pub fn next_state(state: LinkState, view: &DecisionView, timeouts: &LinkTimeouts) -> Decision {
    if !view.enable {
        return if state == LinkState::Init {
            Decision::stay(state)
        } else {
            Decision::go(LinkState::Init)
        };
    }

    match state {
        LinkState::Init => Decision::with(LinkState::Mapping, EpisodeEffect::ResetLink),
        LinkState::Mapping => {
            if elapsed(view.timer, timeouts.mapping_settle) {
                Decision::go(LinkState::Training)
            } else {
                Decision::stay(state)
            }
        }
        LinkState::Training => {
            if elapsed(view.timer, timeouts.training) && view.achievable_width() > 0 {
                Decision::go(LinkState::Active)
            } else if elapsed(view.timer, timeouts.training_timeout) {
                Decision::go(LinkState::Error)
            } else {
                Decision::stay(state)
            }
        }
        LinkState::Active => {
            if view.repair_enable && view.needing_repair > 0 {
                if !view.repair_possible() {
                    return Decision::go(LinkState::Degrade);
                }
                let ctx = view.recommendation;
                Decision::with(
                    entry_state(&ctx, view.advanced_repair),
                    EpisodeEffect::BeginEpisode(ctx),
                )
            } else if view.repair_enable && view.proactive_serviceable() {
                let ctx = RepairContext::new(view.recommendation.tier, RepairStrategy::Proactive);
                Decision::with(
                    LinkState::ProactiveRepair,
                    EpisodeEffect::BeginEpisode(ctx),
                )
            } else {
                Decision::go(LinkState::Monitoring)
            }
        }
        LinkState::Monitoring => {
            if view.wants_repair() {
                Decision::go(LinkState::Active)
            } else {
                Decision::stay(state)
            }
        }
        LinkState::RepairRequest => {
            if !view.coordination_required || view.coordinator_ack {
                Decision::go(LinkState::RepairActive)
            } else if elapsed(view.timer, timeouts.coordination) {
                Decision::with(LinkState::RepairVerify, EpisodeEffect::CoordinationTimeout)
            } else {
                Decision::stay(state)
            }
        }
        LinkState::RepairActive
        | LinkState::MlPrediction
        | LinkState::AdaptiveTune
        | LinkState::HierarchicalRepair
        | LinkState::ThermalRepair
        | LinkState::ProactiveRepair
        | LinkState::SelfHealing => {
            if view.scope_remaining == 0 || elapsed(view.timer, timeouts.repair) {
                Decision::go(LinkState::RepairVerify)
            } else {
                Decision::stay(state)
            }
        }
        LinkState::RepairVerify => {
            if !elapsed(view.timer, timeouts.verify_settle) {
                return Decision::stay(state);
            }
            if view.needing_repair == 0 && view.achievable_width() >= view.committed_width {
                return Decision::with(LinkState::Active, EpisodeEffect::EpisodeSucceeded);
            }
            match view.episode_tier.escalate() {
                Some(tier) => {
                    let ctx = RepairContext::new(tier, tier.balanced_strategy());
                    Decision::with(
                        entry_state(&ctx, view.advanced_repair),
                        EpisodeEffect::Escalate(ctx),
                    )
                }
                None => Decision::with(LinkState::Degrade, EpisodeEffect::EpisodeExhausted),
            }
        }
        LinkState::Degrade => {
            if !elapsed(view.timer, timeouts.degrade_settle) {
                Decision::stay(state)
            } else if view.achievable_width() >= view.min_width {
                Decision::with(LinkState::Active, EpisodeEffect::DegradeResolved)
            } else {
                Decision::go(LinkState::Error)
            }
        }
        LinkState::Error => {
            if elapsed(view.timer, timeouts.error_cooldown) {
                Decision::go(LinkState::Init)
            } else {
                Decision::stay(state)
            }
        }
    }
}
