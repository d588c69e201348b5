//! Per-tick invariant checks over a running controller.
//!
//! [`InvariantMonitor::observe`] is called after every tick with the summary
//! the tick returned. Each invariant keeps a check count, a violation count
//! and the first few failure messages for the report.

use std::collections::BTreeMap;

use lanewarden_core::{LinkController, LinkState, LinkSummary, LinkTimeouts, RepairTier};
use serde::Serialize;

/// Failure messages kept per invariant.
const MAX_RECORDED_FAILURES: usize = 8;

pub const INVARIANT_IDS: [&str; 11] = [
    "mapping_bijection",
    "lane_status_exclusive",
    "spare_never_active",
    "width_bounds",
    "degradation_flag",
    "current_width_bounded",
    "active_lanes_match_width",
    "episode_tier_monotonic",
    "state_timer_bounded",
    "repair_counters_consistent",
    "status_word_consistent",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantCheckResult {
    pub invariant_id: String,
    pub ok: bool,
    pub checks: u64,
    pub violations: u64,
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    checks: u64,
    violations: u64,
    failures: Vec<String>,
}

/// Longest a timed state may hold before its bound forces a transition.
#[must_use]
pub fn timed_bound(state: LinkState, t: &LinkTimeouts) -> Option<u32> {
    match state {
        LinkState::Init | LinkState::Monitoring => None,
        LinkState::Active => Some(1),
        LinkState::Mapping => Some(t.mapping_settle),
        LinkState::Training => Some(t.training_timeout),
        LinkState::RepairRequest => Some(t.coordination.max(1)),
        LinkState::RepairVerify => Some(t.verify_settle.max(1)),
        LinkState::Degrade => Some(t.degrade_settle.max(1)),
        LinkState::Error => Some(t.error_cooldown),
        _ => Some(t.repair),
    }
}

#[derive(Debug, Clone)]
pub struct InvariantMonitor {
    tallies: BTreeMap<&'static str, Tally>,
    last_episode_tier: Option<RepairTier>,
    observed: u64,
}

impl Default for InvariantMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tallies: INVARIANT_IDS
                .iter()
                .map(|&id| (id, Tally::default()))
                .collect(),
            last_episode_tier: None,
            observed: 0,
        }
    }

    fn check(&mut self, id: &'static str, ok: bool, message: impl FnOnce() -> String) {
        let tally = self.tallies.entry(id).or_default();
        tally.checks += 1;
        if !ok {
            tally.violations += 1;
            if tally.failures.len() < MAX_RECORDED_FAILURES {
                tally.failures.push(message());
            }
        }
    }

    /// Check every invariant against the state committed by the last tick.
    pub fn observe(&mut self, c: &LinkController, summary: &LinkSummary) {
        self.observed += 1;
        let cfg = c.config();
        let tick = summary.tick;
        let state = c.state();

        self.check("mapping_bijection", c.map().is_bijection(), || {
            format!("tick {tick}: physical/logical maps are not inverse permutations")
        });

        let flags = c.all_lane_flags();
        let exclusive = flags
            .iter()
            .position(|f| usize::from(f.good) + usize::from(f.marginal) + usize::from(f.failed) != 1);
        self.check("lane_status_exclusive", exclusive.is_none(), || {
            format!("tick {tick}: lane {exclusive:?} has no single status")
        });
        let overlap = flags.iter().position(|f| f.spare && f.active);
        self.check("spare_never_active", overlap.is_none(), || {
            format!("tick {tick}: lane {overlap:?} is both spare and active")
        });

        let (min, req) = (cfg.min_width, cfg.requested_width);
        let width_ok = if summary.available_lanes >= min {
            (min..=req).contains(&summary.target_width)
        } else {
            summary.target_width == min && summary.degradation_needed
        };
        self.check("width_bounds", width_ok, || {
            format!(
                "tick {tick}: target {} with {} available (min {min}, requested {req})",
                summary.target_width, summary.available_lanes
            )
        });
        let expect_degraded = summary.target_width < req || summary.available_lanes < req;
        self.check(
            "degradation_flag",
            summary.degradation_needed == expect_degraded,
            || format!("tick {tick}: degradation_needed={}", summary.degradation_needed),
        );
        self.check("current_width_bounded", summary.current_width <= req, || {
            format!("tick {tick}: current width {} > {req}", summary.current_width)
        });

        if summary.available_lanes >= summary.current_width {
            let active = flags.iter().filter(|f| f.active).count();
            self.check("active_lanes_match_width", active == summary.current_width, || {
                format!(
                    "tick {tick}: {active} active lanes at width {}",
                    summary.current_width
                )
            });
        }

        let tier = c.episode_tier();
        if let (Some(before), Some(now)) = (self.last_episode_tier, tier) {
            self.check("episode_tier_monotonic", now >= before, || {
                format!("tick {tick}: tier fell {} -> {}", before.as_str(), now.as_str())
            });
        }
        self.last_episode_tier = tier;

        if let Some(bound) = timed_bound(state, &cfg.timeouts) {
            let timer = c.timer();
            self.check("state_timer_bounded", timer < bound, || {
                format!("tick {tick}: {} timer {timer} >= {bound}", state.as_str())
            });
        }

        let stats = c.stats();
        let observed = self.observed;
        self.check(
            "repair_counters_consistent",
            stats.successful_repairs <= stats.repair_attempts && u64::from(stats.ticks) == observed,
            || {
                format!(
                    "tick {tick}: successes {} attempts {} ticks {}",
                    stats.successful_repairs, stats.repair_attempts, stats.ticks
                )
            },
        );
        self.check(
            "status_word_consistent",
            summary.status_word() == c.status_word() && summary.status_word().state() == Some(state),
            || format!("tick {tick}: status word {:#010x}", c.status_word().raw()),
        );
    }

    /// Ticks observed so far.
    #[must_use]
    pub fn observed(&self) -> u64 {
        self.observed
    }

    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.tallies.values().all(|t| t.violations == 0)
    }

    /// Results in [`INVARIANT_IDS`] order.
    #[must_use]
    pub fn results(&self) -> Vec<InvariantCheckResult> {
        INVARIANT_IDS
            .iter()
            .map(|&id| {
                let tally = self.tallies.get(id).cloned().unwrap_or_default();
                InvariantCheckResult {
                    invariant_id: id.to_string(),
                    ok: tally.violations == 0,
                    checks: tally.checks,
                    violations: tally.violations,
                    failures: tally.failures,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanewarden_core::{LaneSample, LinkConfig, TickInputs};

    #[test]
    fn clean_run_holds_every_invariant() {
        let mut c = LinkController::new(LinkConfig::with_lanes(12, 8, 2)).unwrap();
        let mut monitor = InvariantMonitor::new();
        let mut inputs = TickInputs::clean(12);
        for tick in 0..400 {
            if tick == 100 {
                inputs.lanes[3] = LaneSample::hard_failure();
            }
            let summary = c.tick(&inputs);
            monitor.observe(&c, &summary);
        }
        assert!(monitor.all_ok(), "{:#?}", monitor.results());
        assert_eq!(monitor.observed(), 400);
        let results = monitor.results();
        assert_eq!(results.len(), INVARIANT_IDS.len());
        assert!(results[0].checks == 400);
    }

    #[test]
    fn parked_lanes_hand_their_slots_to_live_lanes() {
        let mut c = LinkController::new(LinkConfig::with_lanes(12, 8, 2)).unwrap();
        let mut monitor = InvariantMonitor::new();
        let mut inputs = TickInputs::clean(12);
        for tick in 0..600 {
            if tick == 100 {
                for lane in 0..6 {
                    inputs.lanes[lane] = LaneSample::hard_failure();
                }
            }
            let summary = c.tick(&inputs);
            monitor.observe(&c, &summary);
        }
        assert!(monitor.all_ok(), "{:#?}", monitor.results());
        assert_eq!(c.summary().current_width, 6);
        let active = c.all_lane_flags().iter().filter(|f| f.active).count();
        assert_eq!(active, 6);
        let compacted = c
            .drain_events()
            .iter()
            .filter(|e| e.kind.name() == "lane_compacted")
            .count();
        assert!(compacted > 0);
    }

    #[test]
    fn violations_are_recorded_and_capped() {
        let mut monitor = InvariantMonitor::new();
        for i in 0..20 {
            monitor.check("width_bounds", false, || format!("bad {i}"));
        }
        assert!(!monitor.all_ok());
        let width = monitor
            .results()
            .into_iter()
            .find(|r| r.invariant_id == "width_bounds")
            .unwrap();
        assert_eq!(width.violations, 20);
        assert_eq!(width.failures.len(), MAX_RECORDED_FAILURES);
        assert_eq!(width.failures[0], "bad 0");
    }

    #[test]
    fn monitoring_and_init_are_untimed() {
        let t = LinkTimeouts::default();
        assert_eq!(timed_bound(LinkState::Monitoring, &t), None);
        assert_eq!(timed_bound(LinkState::Init, &t), None);
        assert_eq!(timed_bound(LinkState::HierarchicalRepair, &t), Some(t.repair));
    }
}
