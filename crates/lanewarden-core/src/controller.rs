//! # Link Controller
//!
//! Owns every per-lane register, the remap engine, the width state and the
//! lifecycle state, and advances them one tick at a time.
//!
//! ## Tick discipline
//!
//! ```text
//! tick(inputs):
//!   next  <- scratch buffer
//!   plan  <- evaluate(&self, inputs, &mut next)   // reads committed state only
//!   commit(plan, next)                             // the only writer
//! ```
//!
//! `evaluate` classifies lanes, runs the predictor and tuner passes that are
//! due, aggregates, asks the strategy selector, plans remaps and decides the
//! next lifecycle state, all from one snapshot. `commit` swaps in the new lane
//! records and applies the plan. The two lane buffers swap roles every tick
//! and are reused; the per-tick work lists are sized by the failing lanes.
//!
//! The last step of `commit` compacts the width: a parked lane inside the
//! committed width hands its slot to the lowest live lane beyond it.

use std::mem;

use crate::config::{ConfigError, LinkConfig, PriorityMode};
use crate::events::{EventFeed, LinkEvent, LinkEventKind};
use crate::health::{ThermalBand, classify, health_score, is_history_tick};
use crate::lane::{LaneFlags, LaneRecord, LaneSample, LaneStatus};
use crate::lifecycle::{Decision, DecisionView, EpisodeEffect, LinkState, RepairScope, next_state};
use crate::predictor::{is_prediction_tick, predict};
use crate::remap::{LaneMap, RemapEngine, RemapOp};
use crate::status::{LinkStatistics, LinkSummary, StatusWord, bump};
use crate::strategy::{RepairAggregates, RepairContext, RepairTier, select};
use crate::threshold::{ceiling, floor, is_tuning_tick, thermal_override, tune};
use crate::width::WidthState;

/// Inputs sampled once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInputs {
    /// Per-lane samples by physical index. Missing lanes read as clean;
    /// extra entries are ignored.
    pub lanes: Vec<LaneSample>,
    /// Die thermal reading.
    pub thermal: u8,
    pub reversal_detected: bool,
    pub enable: bool,
    /// Gated together with [`LinkConfig::repair_enable`].
    pub repair_enable: bool,
    pub coordinator_ack: bool,
}

impl TickInputs {
    /// Enabled link, clean lanes, cool die.
    #[must_use]
    pub fn clean(num_lanes: usize) -> Self {
        Self {
            lanes: vec![LaneSample::CLEAN; num_lanes],
            thermal: 0,
            reversal_detected: false,
            enable: true,
            repair_enable: true,
            coordinator_ack: false,
        }
    }

    #[must_use]
    pub fn sample(&self, physical: usize) -> LaneSample {
        self.lanes.get(physical).copied().unwrap_or(LaneSample::CLEAN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Episode {
    context: RepairContext,
    /// Lanes remapped so far in this episode.
    remapped: u32,
}

/// Which per-lane passes run this tick.
#[derive(Debug, Clone, Copy)]
struct LanePass {
    band: ThermalBand,
    push_history: bool,
    tune: bool,
    thermal_override: bool,
    predict: bool,
    self_heal: bool,
}

/// Everything `commit` applies.
#[derive(Debug)]
struct PendingCommit {
    decision: Decision,
    ops: Vec<RemapOp>,
    park: Vec<usize>,
    /// `None` while in Init, where the reversal input is ignored.
    reversal_input: Option<bool>,
    width: WidthState,
    recommendation: RepairContext,
    episode_context: Option<RepairContext>,
    ran_tuning: bool,
    ran_prediction: bool,
}

/// Lane-management control loop for one link.
#[derive(Debug, Clone)]
pub struct LinkController {
    config: LinkConfig,
    tick: u64,
    state: LinkState,
    /// Ticks spent in `state` before the current tick.
    timer: u32,
    lanes: Vec<LaneRecord>,
    scratch: Vec<LaneRecord>,
    remap: RemapEngine,
    width: WidthState,
    recommendation: RepairContext,
    episode: Option<Episode>,
    stats: LinkStatistics,
    events: EventFeed,
    summary: LinkSummary,
}

fn fresh_lanes(config: &LinkConfig) -> Vec<LaneRecord> {
    (0..config.num_lanes)
        .map(|p| LaneRecord::new(p, config.base_threshold))
        .collect()
}

/// A lane the remap engine may hand out as a spare.
fn spare_candidate(lane: &LaneRecord) -> bool {
    lane.status.is_usable() && !lane.parked && !lane.under_repair && !lane.predicted_failure
}

fn carries_traffic(lane: &LaneRecord) -> bool {
    lane.status.is_usable() && !lane.parked
}

impl LinkController {
    /// Validate `config` and build a controller in [`LinkState::Init`].
    pub fn new(config: LinkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let lanes = fresh_lanes(&config);
        let mut controller = Self {
            scratch: Vec::with_capacity(lanes.len()),
            lanes,
            remap: RemapEngine::new(config.num_lanes),
            width: WidthState::new(config.num_lanes, config.requested_width, config.min_width),
            tick: 0,
            state: LinkState::Init,
            timer: 0,
            recommendation: RepairContext::default(),
            episode: None,
            stats: LinkStatistics::default(),
            events: EventFeed::new(),
            summary: LinkSummary::default(),
            config,
        };
        controller.summary = controller.summarize();
        Ok(controller)
    }

    /// Advance one tick and return the committed summary.
    pub fn tick(&mut self, inputs: &TickInputs) -> LinkSummary {
        let mut next = mem::take(&mut self.scratch);
        let pending = self.evaluate(inputs, &mut next);
        self.commit(pending, next);
        self.summary
    }

    /// Drop back to [`LinkState::Init`] with a full reset of lanes and mapping.
    /// Statistics and the remap ledger survive.
    pub fn reset(&mut self) {
        if self.state != LinkState::Init {
            self.events.push(
                self.tick,
                LinkEventKind::StateChanged {
                    from: self.state,
                    to: LinkState::Init,
                },
            );
        }
        self.state = LinkState::Init;
        self.timer = 0;
        self.reset_link();
        self.summary = self.summarize();
    }

    /// Change the priority policy; takes effect on the next tick.
    pub fn set_priority(&mut self, priority: PriorityMode) {
        self.config.priority = priority;
    }

    fn reset_link(&mut self) {
        self.lanes = fresh_lanes(&self.config);
        self.scratch.clear();
        self.remap.reset();
        self.width = WidthState::new(
            self.config.num_lanes,
            self.config.requested_width,
            self.config.min_width,
        );
        self.episode = None;
    }

    fn evolve_lane(&self, prev: &LaneRecord, sample: LaneSample, pass: LanePass) -> LaneRecord {
        let cfg = &self.config;
        let base = cfg.base_threshold;
        let mut lane = *prev;

        let class = classify(&sample, prev.adaptive_threshold);
        lane.error_rate = sample.error_rate;
        lane.status = class.status;
        lane.health_score = health_score(&sample, prev.adaptive_threshold, pass.band, cfg);
        if pass.push_history {
            lane.health_history.push(lane.health_score);
        }

        if pass.tune {
            let update = tune(
                prev.adaptive_threshold,
                base,
                &prev.health_history,
                pass.band,
                prev.thermal_throttled,
            );
            lane.adaptive_threshold = update.threshold;
            lane.thermal_throttled = update.thermal_throttled;
        } else if pass.thermal_override {
            if let Some(forced) = thermal_override(pass.band, base) {
                lane.adaptive_threshold = forced.clamp(floor(base), ceiling(base));
                lane.thermal_throttled = true;
            }
        }
        if pass.self_heal && lane.is_failed() {
            lane.adaptive_threshold = base;
            lane.thermal_throttled = false;
        }

        if pass.predict {
            let p = predict(
                &sample,
                prev.error_trend,
                prev.prediction_confidence,
                pass.band,
                cfg,
            );
            lane.predicted_failure_score = p.score;
            lane.reliability_score = p.reliability;
            lane.prediction_confidence = p.confidence;
            lane.error_trend = p.error_trend;
            lane.predicted_failure = p.predicted_failure;
        }

        if prev.parked && lane.status.is_usable() {
            lane.parked = false;
        }
        lane
    }

    fn evaluate(&self, inputs: &TickInputs, next: &mut Vec<LaneRecord>) -> PendingCommit {
        let cfg = &self.config;
        let state = self.state;
        let entering = self.timer == 0;
        let ran_tuning = cfg.adaptive_tuning && is_tuning_tick(self.tick, cfg.tuning_period);
        let ran_prediction = cfg.prediction && is_prediction_tick(self.tick, cfg.prediction_period);
        let pass = LanePass {
            band: ThermalBand::from_reading(inputs.thermal, cfg),
            push_history: is_history_tick(self.tick, cfg.health_update_period),
            tune: ran_tuning
                || (cfg.adaptive_tuning && entering && state == LinkState::AdaptiveTune),
            thermal_override: entering && state == LinkState::ThermalRepair,
            predict: ran_prediction,
            self_heal: state == LinkState::SelfHealing,
        };

        next.clear();
        next.extend(
            self.lanes
                .iter()
                .map(|prev| self.evolve_lane(prev, inputs.sample(prev.physical_index), pass)),
        );
        let lanes: &[LaneRecord] = next;

        let map = self.remap.map();
        let requested = cfg.requested_width;
        let in_range = |lane: &LaneRecord| {
            map.logical_of(lane.physical_index) < requested && !lane.parked && !lane.under_repair
        };
        let needing: Vec<usize> = lanes
            .iter()
            .filter(|&l| l.is_failed() && in_range(l))
            .map(|l| l.physical_index)
            .collect();
        let predicted: Vec<usize> = lanes
            .iter()
            .filter(|&l| l.predicted_failure && l.status.is_usable() && in_range(l))
            .map(|l| l.physical_index)
            .collect();
        let marginal: Vec<usize> = lanes
            .iter()
            .filter(|&l| l.is_marginal() && !l.predicted_failure && in_range(l))
            .map(|l| l.physical_index)
            .collect();
        let failed = lanes.iter().filter(|l| l.is_failed() && !l.parked).count();
        let available = lanes.iter().filter(|&l| carries_traffic(l)).count();
        let spare_ok = |p: usize| spare_candidate(&lanes[p]);
        let free_spares = self.remap.free_spares(requested, spare_ok);

        let aggregates = RepairAggregates {
            needing_repair: needing.len(),
            failed,
            any_predicted: lanes.iter().any(|l| l.predicted_failure && !l.parked),
            thermal_repair_active: pass.band.throttles() || state == LinkState::ThermalRepair,
            proactive_candidates: predicted.len() + marginal.len(),
        };
        let recommendation = select(cfg.priority, &aggregates);
        let episode_context = self
            .episode
            .map(|e| e.context.with_tier_floor(recommendation.tier));

        let reversal_input = (state != LinkState::Init).then_some(inputs.reversal_detected);
        let reversing = reversal_input.is_some_and(|d| self.remap.reversal_pending(d));
        let repair_enable = cfg.repair_enable && inputs.repair_enable;

        let secondary: &[usize] = match state.scope() {
            RepairScope::FailedThenPredicted | RepairScope::PredictedThenFailed => {
                predicted.as_slice()
            }
            RepairScope::FailedThenMarginal => marginal.as_slice(),
            RepairScope::None | RepairScope::Failed | RepairScope::AwaitRecovery => &[],
        };
        let ops = if state.is_repair_worker() && repair_enable && !reversing {
            let order: Vec<usize> = match state.scope() {
                RepairScope::PredictedThenFailed => {
                    secondary.iter().chain(&needing).copied().collect()
                }
                RepairScope::Failed
                | RepairScope::FailedThenPredicted
                | RepairScope::FailedThenMarginal => {
                    needing.iter().chain(secondary).copied().collect()
                }
                RepairScope::None | RepairScope::AwaitRecovery => Vec::new(),
            };
            self.remap.plan(order, requested, spare_ok)
        } else {
            Vec::new()
        };
        let planned = |p: &usize| ops.iter().any(|op| op.failing == *p);
        let unplanned: Vec<usize> = needing.iter().copied().filter(|p| !planned(p)).collect();
        // Predicted and marginal lanes stay in scope only while spares remain.
        let secondary_left = if free_spares > ops.len() {
            secondary.iter().filter(|&p| !planned(p)).count()
        } else {
            0
        };

        let view = DecisionView {
            enable: inputs.enable,
            repair_enable,
            advanced_repair: cfg.advanced_repair,
            prediction_enabled: cfg.prediction,
            coordination_required: cfg.coordination_required,
            coordinator_ack: inputs.coordinator_ack,
            timer: self.timer,
            needing_repair: needing.len(),
            predicted_candidates: predicted.len(),
            free_spares,
            scope_remaining: unplanned.len() + secondary_left,
            available_lanes: available,
            requested_width: requested,
            committed_width: self.width.current_width,
            min_width: cfg.min_width,
            recommendation,
            episode_tier: episode_context.map_or(recommendation.tier, |c| c.tier),
        };
        let decision = next_state(state, &view, &cfg.timeouts);

        let park = if decision.next == LinkState::Degrade && state != LinkState::Degrade {
            unplanned
        } else {
            Vec::new()
        };

        PendingCommit {
            decision,
            ops,
            park,
            reversal_input,
            width: self.width.advance(available, state.is_operational()),
            recommendation,
            episode_context,
            ran_tuning,
            ran_prediction,
        }
    }

    fn commit(&mut self, pending: PendingCommit, next: Vec<LaneRecord>) {
        let tick = self.tick;
        let from = self.state;
        let to = pending.decision.next;

        self.scratch = mem::replace(&mut self.lanes, next);
        for (prev, lane) in self.scratch.iter().zip(&self.lanes) {
            let p = lane.physical_index;
            if prev.thermal_throttled != lane.thermal_throttled {
                self.events.push(
                    tick,
                    LinkEventKind::ThermalThrottle {
                        lane: p,
                        engaged: lane.thermal_throttled,
                    },
                );
            }
            if lane.predicted_failure && !prev.predicted_failure {
                self.events.push(
                    tick,
                    LinkEventKind::PredictedFailure {
                        lane: p,
                        score: lane.predicted_failure_score,
                    },
                );
            }
            if prev.parked && !lane.parked {
                self.events.push(tick, LinkEventKind::LaneUnparked { lane: p });
            }
        }

        if let Some(detected) = pending.reversal_input {
            if self.remap.apply_reversal_input(detected) {
                bump(&mut self.stats.reversal_corrections, 1);
                self.events.push(tick, LinkEventKind::ReversalCorrected);
            }
        }

        if let (Some(episode), Some(ctx)) = (self.episode.as_mut(), pending.episode_context) {
            episode.context = ctx;
        }
        if !pending.ops.is_empty() {
            self.remap.commit(&pending.ops, tick);
            for op in &pending.ops {
                self.lanes[op.failing].under_repair = true;
                self.events.push(
                    tick,
                    LinkEventKind::LaneRemapped {
                        failing: op.failing,
                        spare: op.spare,
                        logical: op.logical,
                    },
                );
            }
            let count = u32::try_from(pending.ops.len()).unwrap_or(u32::MAX);
            bump(&mut self.stats.repair_attempts, count);
            if let Some(episode) = self.episode.as_mut() {
                bump(&mut episode.remapped, count);
            }
        }

        for &p in &pending.park {
            self.lanes[p].parked = true;
            self.events.push(tick, LinkEventKind::LaneParked { lane: p });
        }

        let prev_width = self.width;
        self.width = pending.width;
        self.recommendation = pending.recommendation;
        self.apply_effect(pending.decision.effect, tick);

        if to != from {
            self.events
                .push(tick, LinkEventKind::StateChanged { from, to });
            match to {
                LinkState::Degrade => {
                    bump(&mut self.stats.degrade_entries, 1);
                    self.episode = None;
                }
                LinkState::Error => {
                    bump(&mut self.stats.error_entries, 1);
                    self.episode = None;
                }
                LinkState::Init => self.episode = None,
                _ => {}
            }
        }
        if self.width.current_width != prev_width.current_width {
            self.events.push(
                tick,
                LinkEventKind::WidthChanged {
                    from: prev_width.current_width,
                    to: self.width.current_width,
                    degraded: self.width.degradation_needed,
                },
            );
        }

        if self.lanes.iter().any(|l| l.parked) {
            self.compact_width(tick);
        }

        self.timer = if to == from {
            self.timer.saturating_add(1)
        } else {
            0
        };
        self.state = to;
        self.tick += 1;
        bump(&mut self.stats.ticks, 1);
        if pending.ran_tuning {
            bump(&mut self.stats.tuning_runs, 1);
        }
        if pending.ran_prediction {
            bump(&mut self.stats.prediction_runs, 1);
        }
        self.stats.events_dropped = self.events.dropped();
        self.summary = self.summarize();
    }

    fn compact_width(&mut self, tick: u64) {
        let lanes = &self.lanes;
        let moves = self.remap.compact(
            self.width.current_width,
            |p| lanes[p].parked,
            |p| carries_traffic(&lanes[p]),
            tick,
        );
        for op in moves {
            self.events.push(
                tick,
                LinkEventKind::LaneCompacted {
                    parked: op.failing,
                    replacement: op.spare,
                    logical: op.logical,
                },
            );
        }
    }

    fn apply_effect(&mut self, effect: EpisodeEffect, tick: u64) {
        match effect {
            EpisodeEffect::None => {}
            EpisodeEffect::ResetLink => self.reset_link(),
            EpisodeEffect::BeginEpisode(context) => {
                self.episode = Some(Episode {
                    context,
                    remapped: 0,
                });
                self.events.push(
                    tick,
                    LinkEventKind::EpisodeStarted {
                        tier: context.tier,
                        strategy: context.strategy,
                    },
                );
            }
            EpisodeEffect::Escalate(context) => {
                let from = self.episode.map_or(RepairTier::Preventive, |e| e.context.tier);
                bump(&mut self.stats.failed_repairs, 1);
                bump(&mut self.stats.escalations, 1);
                self.events
                    .push(tick, LinkEventKind::VerifyFailed { tier: from });
                self.events.push(
                    tick,
                    LinkEventKind::TierEscalated {
                        from,
                        to: context.tier,
                        strategy: context.strategy,
                    },
                );
                let remapped = self.episode.map_or(0, |e| e.remapped);
                self.episode = Some(Episode { context, remapped });
            }
            EpisodeEffect::EpisodeSucceeded => {
                let remapped = self.episode.map_or(0, |e| e.remapped);
                bump(&mut self.stats.successful_repairs, remapped);
                self.events
                    .push(tick, LinkEventKind::EpisodeSucceeded { remapped });
                self.finish_repairs();
            }
            EpisodeEffect::EpisodeExhausted => {
                let tier = self.episode.map_or(RepairTier::Emergency, |e| e.context.tier);
                bump(&mut self.stats.failed_repairs, 1);
                self.events.push(tick, LinkEventKind::VerifyFailed { tier });
                self.episode = None;
            }
            EpisodeEffect::CoordinationTimeout => {
                bump(&mut self.stats.coordination_timeouts, 1);
                self.events.push(tick, LinkEventKind::CoordinationTimeout);
            }
            EpisodeEffect::DegradeResolved => self.finish_repairs(),
        }
    }

    /// Back to fully active: release claims and clear repair marks.
    fn finish_repairs(&mut self) {
        self.remap.release_claims();
        for lane in &mut self.lanes {
            lane.under_repair = false;
        }
        self.episode = None;
    }

    fn summarize(&self) -> LinkSummary {
        let requested = self.config.requested_width;
        let map = self.remap.map();
        let needing_repair = self
            .lanes
            .iter()
            .filter(|l| {
                l.is_failed()
                    && !l.parked
                    && !l.under_repair
                    && map.logical_of(l.physical_index) < requested
            })
            .count();
        LinkSummary {
            tick: self.tick,
            state: self.state,
            context: self.context(),
            failed_lanes: self.lanes.iter().filter(|l| l.is_failed() && !l.parked).count(),
            needing_repair,
            available_lanes: self.lanes.iter().filter(|&l| carries_traffic(l)).count(),
            free_spares: self
                .remap
                .free_spares(requested, |p| spare_candidate(&self.lanes[p])),
            target_width: self.width.target_width,
            current_width: self.width.current_width,
            degradation_needed: self.width.degradation_needed,
            repair_active: self.state.is_repair(),
            ml_repair_triggered: self
                .lanes
                .iter()
                .any(|l| l.predicted_failure && !l.parked),
            reversal_corrected: self.remap.reversal_corrected(),
            thermal_throttled: self.lanes.iter().any(|l| l.thermal_throttled),
            stats: self.stats,
        }
    }

    /// Tier and strategy in force.
    #[must_use]
    pub fn context(&self) -> RepairContext {
        self.episode.map_or(self.recommendation, |e| e.context)
    }

    #[must_use]
    pub const fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Ticks committed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Ticks spent in the current state.
    #[must_use]
    pub const fn timer(&self) -> u32 {
        self.timer
    }

    #[must_use]
    pub fn lanes(&self) -> &[LaneRecord] {
        &self.lanes
    }

    #[must_use]
    pub fn lane(&self, physical: usize) -> Option<&LaneRecord> {
        self.lanes.get(physical)
    }

    #[must_use]
    pub fn map(&self) -> &LaneMap {
        self.remap.map()
    }

    #[must_use]
    pub const fn remap(&self) -> &RemapEngine {
        &self.remap
    }

    #[must_use]
    pub const fn width(&self) -> &WidthState {
        &self.width
    }

    /// Selector output from the last tick.
    #[must_use]
    pub const fn recommendation(&self) -> RepairContext {
        self.recommendation
    }

    /// Tier of the running repair episode.
    #[must_use]
    pub fn episode_tier(&self) -> Option<RepairTier> {
        self.episode.map(|e| e.context.tier)
    }

    #[must_use]
    pub const fn stats(&self) -> &LinkStatistics {
        &self.stats
    }

    #[must_use]
    pub const fn summary(&self) -> &LinkSummary {
        &self.summary
    }

    #[must_use]
    pub fn status_word(&self) -> StatusWord {
        self.summary.status_word()
    }

    /// Published flags for one physical lane.
    #[must_use]
    pub fn lane_flags(&self, physical: usize) -> Option<LaneFlags> {
        let lane = self.lanes.get(physical)?;
        let map = self.remap.map();
        let enabled = !lane.parked;
        Some(LaneFlags {
            enabled,
            active: enabled && map.logical_of(physical) < self.width.current_width,
            good: lane.status == LaneStatus::Good,
            marginal: lane.status == LaneStatus::Marginal,
            failed: lane.status == LaneStatus::Failed,
            under_repair: lane.under_repair,
            predicted_failure: lane.predicted_failure,
            thermal_throttled: lane.thermal_throttled,
            spare: self.remap.is_free_spare(
                physical,
                self.config.requested_width,
                spare_candidate(lane),
            ),
        })
    }

    #[must_use]
    pub fn all_lane_flags(&self) -> Vec<LaneFlags> {
        (0..self.lanes.len())
            .filter_map(|p| self.lane_flags(p))
            .collect()
    }

    /// Take every event committed since the last drain.
    pub fn drain_events(&mut self) -> Vec<LinkEvent> {
        self.events.drain()
    }

    /// BLAKE3 digest of the committed state.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut h = blake3::Hasher::new();
        h.update(&self.tick.to_le_bytes());
        h.update(&[self.state.code()]);
        h.update(&self.timer.to_le_bytes());
        for &logical in self.remap.map().physical_to_logical() {
            h.update(&(logical as u64).to_le_bytes());
        }
        for lane in &self.lanes {
            let flags = u8::from(lane.under_repair)
                | u8::from(lane.parked) << 1
                | u8::from(lane.predicted_failure) << 2
                | u8::from(lane.thermal_throttled) << 3
                | u8::from(self.remap.is_claimed(lane.physical_index)) << 4;
            h.update(&lane.error_rate.to_le_bytes());
            h.update(&lane.adaptive_threshold.to_le_bytes());
            h.update(&[lane.status as u8, flags, lane.health_score]);
            h.update(&lane.health_history.chronological());
            h.update(&lane.predicted_failure_score.to_le_bytes());
            h.update(&[lane.reliability_score, lane.prediction_confidence]);
            h.update(&lane.error_trend.to_le_bytes());
        }
        let ctx = self.context();
        h.update(&[ctx.tier as u8, ctx.strategy as u8]);
        h.update(&self.episode.map_or(0, |e| e.remapped).to_le_bytes());
        h.update(&(self.width.current_width as u64).to_le_bytes());
        for counter in self.stats.as_array() {
            h.update(&counter.to_le_bytes());
        }
        *h.finalize().as_bytes()
    }

    /// Lowercase hex of [`LinkController::fingerprint`].
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        blake3::Hash::from(self.fingerprint()).to_hex().to_string()
    }
}
