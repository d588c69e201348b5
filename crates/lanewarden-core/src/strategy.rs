//! # Repair Strategy Selector
//!
//! Pure mapping from lane-quality aggregates and the priority policy to a
//! repair `(tier, strategy)` recommendation, evaluated every tick.
//!
//! | priority    | condition                    | tier / strategy           |
//! |-------------|------------------------------|---------------------------|
//! | Bandwidth   | failed > 2                   | Emergency / Hierarchical  |
//! |             | needing repair > 1           | Aggressive / Adaptive     |
//! |             | otherwise                    | Preventive / Predictive   |
//! | Reliability | any predicted failure        | Preventive / Predictive   |
//! |             | any lane needing repair      | Corrective / Adaptive     |
//! |             | otherwise                    | Preventive / Proactive    |
//! | Power       | thermal repair active        | Corrective / Thermal      |
//! |             | any proactive candidate      | Preventive / Proactive    |
//! |             | otherwise                    | Preventive / SelfHealing  |
//! | Balanced    | severity >= 6 / >= 3 / >= 1  | Emergency / Aggressive / Corrective |
//! |             | severity 0                   | Preventive                |
//!
//! Balanced severity is `failed + needing_repair + predicted? + thermal?`.
//! The cost estimate is diagnostic only and never feeds a decision.

use crate::config::PriorityMode;

/// Repair escalation level. Ordered: `Preventive < ... < Emergency`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum RepairTier {
    #[default]
    Preventive = 0,
    Corrective = 1,
    Aggressive = 2,
    Emergency = 3,
}

impl RepairTier {
    /// Next tier up, or `None` at the top.
    #[must_use]
    pub const fn escalate(self) -> Option<Self> {
        match self {
            Self::Preventive => Some(Self::Corrective),
            Self::Corrective => Some(Self::Aggressive),
            Self::Aggressive => Some(Self::Emergency),
            Self::Emergency => None,
        }
    }

    /// Reporting base cost in tick-units; grows by 10x per tier.
    #[must_use]
    pub const fn base_cost(self) -> u32 {
        match self {
            Self::Preventive => 1_000,
            Self::Corrective => 10_000,
            Self::Aggressive => 100_000,
            Self::Emergency => 1_000_000,
        }
    }

    /// Strategy paired with this tier under the Balanced policy.
    #[must_use]
    pub const fn balanced_strategy(self) -> RepairStrategy {
        match self {
            Self::Preventive => RepairStrategy::Proactive,
            Self::Corrective => RepairStrategy::BasicRemap,
            Self::Aggressive => RepairStrategy::Adaptive,
            Self::Emergency => RepairStrategy::Hierarchical,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preventive => "preventive",
            Self::Corrective => "corrective",
            Self::Aggressive => "aggressive",
            Self::Emergency => "emergency",
        }
    }
}

/// Named repair technique.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RepairStrategy {
    #[default]
    BasicRemap = 0,
    Adaptive = 1,
    Predictive = 2,
    Hierarchical = 3,
    Thermal = 4,
    Proactive = 5,
    SelfHealing = 6,
}

impl RepairStrategy {
    pub const ALL: [Self; 7] = [
        Self::BasicRemap,
        Self::Adaptive,
        Self::Predictive,
        Self::Hierarchical,
        Self::Thermal,
        Self::Proactive,
        Self::SelfHealing,
    ];

    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BasicRemap => "basic_remap",
            Self::Adaptive => "adaptive",
            Self::Predictive => "predictive",
            Self::Hierarchical => "hierarchical",
            Self::Thermal => "thermal",
            Self::Proactive => "proactive",
            Self::SelfHealing => "self_healing",
        }
    }
}

/// Per-strategy cost increment on top of the tier base cost.
pub const STRATEGY_COST_INCREMENT: u32 = 100;

/// Lane-quality aggregates the selector reads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairAggregates {
    /// Failed lanes inside the active range that still need a remap.
    pub needing_repair: usize,
    /// All failed lanes.
    pub failed: usize,
    pub any_predicted: bool,
    pub thermal_repair_active: bool,
    /// Marginal or predicted lanes that could be serviced early.
    pub proactive_candidates: usize,
}

impl RepairAggregates {
    /// Balanced-policy severity.
    #[must_use]
    pub fn severity(&self) -> usize {
        self.failed
            + self.needing_repair
            + usize::from(self.any_predicted)
            + usize::from(self.thermal_repair_active)
    }
}

/// Current repair recommendation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairContext {
    pub tier: RepairTier,
    pub strategy: RepairStrategy,
    pub cost_estimate: u32,
}

impl RepairContext {
    #[must_use]
    pub const fn new(tier: RepairTier, strategy: RepairStrategy) -> Self {
        Self {
            tier,
            strategy,
            cost_estimate: cost_estimate(tier, strategy),
        }
    }

    /// Same strategy choice, with the tier raised to at least `floor`.
    #[must_use]
    pub fn with_tier_floor(self, floor: RepairTier) -> Self {
        if self.tier >= floor {
            self
        } else {
            Self::new(floor, self.strategy)
        }
    }
}

/// Diagnostic cost of a recommendation.
#[must_use]
pub const fn cost_estimate(tier: RepairTier, strategy: RepairStrategy) -> u32 {
    tier.base_cost() + strategy.index() * STRATEGY_COST_INCREMENT
}

/// Select the repair tier and strategy for the current aggregates.
#[must_use]
pub fn select(priority: PriorityMode, agg: &RepairAggregates) -> RepairContext {
    use RepairStrategy as S;
    use RepairTier as T;

    let (tier, strategy) = match priority {
        PriorityMode::Bandwidth => {
            if agg.failed > 2 {
                (T::Emergency, S::Hierarchical)
            } else if agg.needing_repair > 1 {
                (T::Aggressive, S::Adaptive)
            } else {
                (T::Preventive, S::Predictive)
            }
        }
        PriorityMode::Reliability => {
            if agg.any_predicted {
                (T::Preventive, S::Predictive)
            } else if agg.needing_repair > 0 {
                (T::Corrective, S::Adaptive)
            } else {
                (T::Preventive, S::Proactive)
            }
        }
        PriorityMode::Power => {
            if agg.thermal_repair_active {
                (T::Corrective, S::Thermal)
            } else if agg.proactive_candidates > 0 {
                (T::Preventive, S::Proactive)
            } else {
                (T::Preventive, S::SelfHealing)
            }
        }
        PriorityMode::Balanced => {
            let severity = agg.severity();
            let tier = if severity >= 6 {
                T::Emergency
            } else if severity >= 3 {
                T::Aggressive
            } else if severity >= 1 {
                T::Corrective
            } else {
                T::Preventive
            };
            (tier, tier.balanced_strategy())
        }
    };
    RepairContext::new(tier, strategy)
}
