use lanewarden_core::{
    LaneSample, LaneStatus, LinkConfig, LinkController, LinkEventKind, LinkState, LinkTimeouts,
    PriorityMode, RepairTier, TickInputs,
};

fn fast_timeouts() -> LinkTimeouts {
    LinkTimeouts {
        mapping_settle: 4,
        training: 4,
        training_timeout: 64,
        repair: 16,
        coordination: 8,
        verify_settle: 2,
        degrade_settle: 4,
        error_cooldown: 64,
    }
}

fn config(lanes: usize, requested: usize, min: usize) -> LinkConfig {
    LinkConfig {
        timeouts: fast_timeouts(),
        health_update_period: 8,
        tuning_period: 32,
        prediction_period: 4,
        ..LinkConfig::with_lanes(lanes, requested, min)
    }
}

/// Tick until `done` holds, returning every state visited on the way.
fn run_until<F>(c: &mut LinkController, inputs: &TickInputs, max: usize, done: F) -> Vec<LinkState>
where
    F: Fn(&LinkController) -> bool,
{
    let mut visited = vec![c.state()];
    for _ in 0..max {
        c.tick(inputs);
        if visited.last() != Some(&c.state()) {
            visited.push(c.state());
        }
        if done(c) {
            return visited;
        }
    }
    panic!("condition not reached in {max} ticks; visited {visited:?}");
}

fn bring_up(c: &mut LinkController) {
    let inputs = TickInputs::clean(c.config().num_lanes);
    run_until(c, &inputs, 100, |c| c.state() == LinkState::Monitoring);
    c.drain_events();
}

/// Tick with `inputs` until the next tick index is `phase` modulo `period`.
fn align_to(c: &mut LinkController, inputs: &TickInputs, period: u64, phase: u64) {
    while c.ticks() % period != phase {
        c.tick(inputs);
    }
}

fn active_lanes(c: &LinkController) -> usize {
    c.all_lane_flags().iter().filter(|f| f.active).count()
}

/// Scenario C geometry driven to a settled 62-lane link, lanes 0..10 parked.
fn degraded_to_62(cfg: LinkConfig) -> (LinkController, TickInputs) {
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);
    let mut inputs = TickInputs::clean(72);
    for lane in 0..10 {
        inputs.lanes[lane] = LaneSample::hard_failure();
    }
    run_until(&mut c, &inputs, 50, |c| c.state() == LinkState::Degrade);
    run_until(&mut c, &inputs, 50, |c| c.state() == LinkState::Monitoring);
    (c, inputs)
}

#[test]
fn scenario_a_all_good_lanes_never_repair() {
    let mut c = LinkController::new(config(64, 64, 16)).unwrap();
    let inputs = TickInputs::clean(64);
    for _ in 0..500 {
        c.tick(&inputs);
        assert!(!c.state().is_repair(), "entered {:?}", c.state());
    }
    let s = c.summary();
    assert_eq!(c.state(), LinkState::Monitoring);
    assert_eq!(s.target_width, 64);
    assert_eq!(s.current_width, 64);
    assert!(!s.degradation_needed);
    assert_eq!(s.stats.repair_attempts, 0);
    assert_eq!(s.free_spares, 0);
}

#[test]
fn scenario_b_three_failures_take_the_three_lowest_spares() {
    let mut c = LinkController::new(config(72, 64, 16)).unwrap();
    bring_up(&mut c);

    let mut inputs = TickInputs::clean(72);
    for lane in [5, 20, 40] {
        inputs.lanes[lane] = LaneSample::hard_failure();
    }
    run_until(&mut c, &inputs, 200, |c| {
        c.state() == LinkState::Monitoring && c.stats().successful_repairs > 0
    });

    let map = c.map();
    assert_eq!(map.logical_of(64), 5);
    assert_eq!(map.logical_of(65), 20);
    assert_eq!(map.logical_of(66), 40);
    assert!(map.is_bijection());

    let stats = c.stats();
    assert_eq!(stats.successful_repairs, 3);
    assert_eq!(stats.repair_attempts, 3);
    assert_eq!(stats.escalations, 0);
    assert_eq!(stats.failed_repairs, 0);

    let episodes = c
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e.kind, LinkEventKind::EpisodeStarted { .. }))
        .count();
    assert_eq!(episodes, 1);

    let s = c.summary();
    assert_eq!(s.current_width, 64);
    assert!(!s.degradation_needed);
    assert_eq!(s.needing_repair, 0);
    assert_eq!(s.status_word().successful_repairs(), 3);
}

#[test]
fn scenario_c_more_failures_than_spares_degrades() {
    let mut c = LinkController::new(config(72, 64, 16)).unwrap();
    bring_up(&mut c);

    let mut inputs = TickInputs::clean(72);
    for lane in 0..10 {
        inputs.lanes[lane] = LaneSample::hard_failure();
    }
    let visited = run_until(&mut c, &inputs, 50, |c| c.state() == LinkState::Degrade);
    assert!(!visited.iter().any(|s| s.is_repair_worker()));

    let s = *c.summary();
    assert_eq!(s.available_lanes, 62);
    assert_eq!(s.target_width, 62);
    assert!(s.degradation_needed);
    assert_eq!(c.stats().degrade_entries, 1);
    assert!((0..10).all(|p| c.lane(p).is_some_and(|l| l.parked)));

    run_until(&mut c, &inputs, 50, |c| c.state() == LinkState::Monitoring);
    for _ in 0..200 {
        c.tick(&inputs);
    }
    assert_eq!(c.state(), LinkState::Monitoring);
    assert_eq!(c.stats().degrade_entries, 1);
    assert_eq!(c.summary().current_width, 62);
    assert_eq!(c.summary().free_spares, 0);
    let flags = c.all_lane_flags();
    assert!(!flags[0].enabled && !flags[0].active);
    assert!(flags[10].enabled && flags[10].active);
    assert!(flags[62].enabled && flags[62].active);
    assert_eq!(active_lanes(&c), 62);
    // Each parked lane handed its slot to the lowest live lane beyond the width.
    for p in 0..10 {
        assert_eq!(c.map().logical_of(p), 62 + p);
        assert_eq!(c.map().logical_of(62 + p), p);
    }
    let compacted = c
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e.kind, LinkEventKind::LaneCompacted { .. }))
        .count();
    assert_eq!(compacted, 10);
    assert_eq!(c.stats().repair_attempts, 0);
}

#[test]
fn degraded_link_loses_another_lane_without_failed_repairs() {
    let (mut c, mut inputs) = degraded_to_62(config(72, 64, 16));
    inputs.lanes[20] = LaneSample::hard_failure();
    run_until(&mut c, &inputs, 50, |c| c.state() == LinkState::Degrade);
    run_until(&mut c, &inputs, 50, |c| c.state() == LinkState::Monitoring);

    let stats = c.stats();
    assert_eq!(stats.degrade_entries, 2);
    assert_eq!(stats.failed_repairs, 0);
    assert_eq!(stats.escalations, 0);
    assert_eq!(stats.repair_attempts, 0);
    assert_eq!(c.summary().current_width, 61);
    assert_eq!(active_lanes(&c), 61);
    assert!(c.lane(20).is_some_and(|l| l.parked));
    assert_eq!(c.map().logical_of(61), 20);
    assert_eq!(c.map().logical_of(20), 61);
}

#[test]
fn degraded_link_repairs_against_its_committed_width() {
    let cfg = LinkConfig {
        prediction: false,
        ..config(72, 64, 16)
    };
    let (mut c, mut inputs) = degraded_to_62(cfg);
    assert_eq!(c.stats().successful_repairs, 0);

    // Two parked lanes heal in the same tick a working lane fails.
    inputs.lanes[8] = LaneSample::CLEAN;
    inputs.lanes[9] = LaneSample::CLEAN;
    inputs.lanes[20] = LaneSample::hard_failure();
    let visited = run_until(&mut c, &inputs, 100, |c| {
        c.state() == LinkState::Monitoring && c.stats().successful_repairs > 0
    });

    assert!(visited.contains(&LinkState::RepairVerify), "{visited:?}");
    assert!(!visited.contains(&LinkState::Degrade), "{visited:?}");
    let stats = c.stats();
    assert_eq!(stats.successful_repairs, 1);
    assert_eq!(stats.failed_repairs, 0);
    assert_eq!(stats.escalations, 0);
    assert_eq!(stats.degrade_entries, 1);
    assert_eq!(c.map().logical_of(9), 20);
    assert_eq!(c.map().logical_of(8), 62);
    assert_eq!(c.summary().current_width, 63);
    assert_eq!(active_lanes(&c), 63);
}

#[test]
fn scenario_c_width_recovers_when_parked_lanes_heal() {
    let mut c = LinkController::new(config(72, 64, 16)).unwrap();
    bring_up(&mut c);
    let mut inputs = TickInputs::clean(72);
    for lane in 0..10 {
        inputs.lanes[lane] = LaneSample::hard_failure();
    }
    run_until(&mut c, &inputs, 100, |c| c.state() == LinkState::Monitoring);

    let clean = TickInputs::clean(72);
    for _ in 0..20 {
        c.tick(&clean);
    }
    assert!(c.lanes().iter().all(|l| !l.parked));
    assert_eq!(c.summary().current_width, 64);
    assert!(!c.summary().degradation_needed);
}

#[test]
fn scenario_d_critical_heat_forces_quarter_thresholds() {
    let cfg = config(72, 64, 16);
    let base = cfg.base_threshold;
    let period = cfg.tuning_period as usize;
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);

    // Half the lanes drift into a degrading trend first.
    let mut inputs = TickInputs::clean(72);
    for lane in 0..36 {
        inputs.lanes[lane] = LaneSample::with_error_rate(base / 4);
    }
    for _ in 0..64 {
        c.tick(&inputs);
    }

    let hot = TickInputs {
        thermal: 255,
        ..TickInputs::clean(72)
    };
    for _ in 0..period {
        c.tick(&hot);
    }
    for lane in c.lanes() {
        assert_eq!(lane.adaptive_threshold, base / 4, "lane {}", lane.physical_index);
        assert!(lane.thermal_throttled);
    }
    assert!(c.summary().thermal_throttled);
    assert!(c.status_word().thermal_throttled());
}

#[test]
fn thermal_release_restores_base_threshold() {
    let cfg = config(16, 12, 4);
    let base = cfg.base_threshold;
    let period = cfg.tuning_period as usize;
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);
    let hot = TickInputs {
        thermal: 105,
        ..TickInputs::clean(16)
    };
    for _ in 0..period {
        c.tick(&hot);
    }
    assert!(c.lanes().iter().all(|l| l.adaptive_threshold == base / 2));
    for _ in 0..period {
        c.tick(&TickInputs::clean(16));
    }
    assert!(c.lanes().iter().all(|l| l.adaptive_threshold == base && !l.thermal_throttled));
}

#[test]
fn scenario_e_predicted_lane_takes_proactive_path() {
    let cfg = LinkConfig {
        prediction_threshold: 0x02,
        ..config(72, 64, 16)
    };
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);

    let mut inputs = TickInputs::clean(72);
    inputs.lanes[7] = LaneSample::with_error_rate(0x0300);
    let visited = run_until(&mut c, &inputs, 100, |c| c.stats().successful_repairs > 0);

    assert!(visited.contains(&LinkState::ProactiveRepair), "{visited:?}");
    assert!(!visited.contains(&LinkState::RepairRequest));
    assert!(!visited.contains(&LinkState::RepairActive));
    let lane = c.lane(7).unwrap();
    assert!(lane.predicted_failure);
    assert!(lane.status.is_usable());
    assert_eq!(c.map().logical_of(64), 7);
    assert!(c.summary().ml_repair_triggered);
}

#[test]
fn failed_repair_escalates_then_degrades() {
    // Only one spare and coordination that never acks: every tier times out.
    let cfg = LinkConfig {
        coordination_required: true,
        advanced_repair: false,
        ..config(9, 8, 2)
    };
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);

    let mut inputs = TickInputs::clean(9);
    inputs.lanes[2] = LaneSample::hard_failure();
    let mut tiers = Vec::new();
    let visited = run_until(&mut c, &inputs, 400, |c| {
        c.state() == LinkState::Degrade
    });
    for e in c.drain_events() {
        if let LinkEventKind::TierEscalated { to, .. } = e.kind {
            tiers.push(to);
        }
    }
    assert!(visited.contains(&LinkState::RepairVerify));
    assert_eq!(tiers.last(), Some(&RepairTier::Emergency));
    assert!(tiers.windows(2).all(|w| w[0] < w[1]));
    assert!(c.stats().coordination_timeouts >= 1);
    assert_eq!(c.stats().repair_attempts, 0);
    assert!(c.lane(2).is_some_and(|l| l.parked));
}

#[test]
fn coordinator_ack_lets_basic_repair_proceed() {
    let cfg = LinkConfig {
        coordination_required: true,
        advanced_repair: false,
        ..config(12, 8, 2)
    };
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);
    let mut inputs = TickInputs::clean(12);
    inputs.coordinator_ack = true;
    inputs.lanes[1] = LaneSample::hard_failure();
    let visited = run_until(&mut c, &inputs, 100, |c| c.stats().successful_repairs > 0);
    assert!(visited.contains(&LinkState::RepairRequest));
    assert!(visited.contains(&LinkState::RepairActive));
    assert_eq!(c.stats().coordination_timeouts, 0);
    assert_eq!(c.map().logical_of(8), 1);
}

#[test]
fn training_without_lanes_errors_then_retries() {
    let mut c = LinkController::new(config(8, 8, 2)).unwrap();
    let mut dead = TickInputs::clean(8);
    dead.lanes.fill(LaneSample::hard_failure());
    run_until(&mut c, &dead, 200, |c| c.state() == LinkState::Error);
    assert_eq!(c.stats().error_entries, 1);
    // Sticky until the cooldown elapses.
    for _ in 0..10 {
        c.tick(&dead);
        assert_eq!(c.state(), LinkState::Error);
    }
    run_until(&mut c, &dead, 100, |c| c.state() == LinkState::Init);
}

#[test]
fn dropping_enable_leaves_error_immediately() {
    let mut c = LinkController::new(config(8, 8, 2)).unwrap();
    let mut dead = TickInputs::clean(8);
    dead.lanes.fill(LaneSample::hard_failure());
    run_until(&mut c, &dead, 200, |c| c.state() == LinkState::Error);
    let off = TickInputs {
        enable: false,
        ..TickInputs::clean(8)
    };
    c.tick(&off);
    assert_eq!(c.state(), LinkState::Init);
    run_until(&mut c, &TickInputs::clean(8), 100, |c| {
        c.state() == LinkState::Monitoring
    });
}

#[test]
fn reversal_held_high_applies_once() {
    let mut c = LinkController::new(config(16, 12, 4)).unwrap();
    bring_up(&mut c);
    let held = TickInputs {
        reversal_detected: true,
        ..TickInputs::clean(16)
    };
    c.tick(&held);
    let once = c.map().clone();
    for _ in 0..10 {
        c.tick(&held);
        assert_eq!(c.map(), &once);
    }
    assert_eq!(c.stats().reversal_corrections, 1);
    assert!(c.status_word().reversal_corrected());
    let events = c.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.kind == LinkEventKind::ReversalCorrected)
            .count(),
        1
    );
}

#[test]
fn hierarchical_repair_takes_failed_lanes_before_marginal_ones() {
    let cfg = LinkConfig {
        priority: PriorityMode::Bandwidth,
        prediction: false,
        ..config(72, 64, 16)
    };
    let base = cfg.base_threshold;
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);

    let mut inputs = TickInputs::clean(72);
    for lane in [3, 4, 5] {
        inputs.lanes[lane] = LaneSample::hard_failure();
    }
    inputs.lanes[10] = LaneSample::with_error_rate(base / 4 * 3);
    let visited = run_until(&mut c, &inputs, 100, |c| c.stats().successful_repairs > 0);

    assert!(visited.contains(&LinkState::HierarchicalRepair), "{visited:?}");
    let map = c.map();
    assert_eq!(map.logical_of(64), 3);
    assert_eq!(map.logical_of(65), 4);
    assert_eq!(map.logical_of(66), 5);
    assert_eq!(map.logical_of(67), 10);
    assert_eq!(c.stats().successful_repairs, 4);
    assert_eq!(c.lane(10).map(|l| l.status), Some(LaneStatus::Marginal));
}

#[test]
fn self_healing_restores_base_threshold_without_remapping() {
    let cfg = LinkConfig {
        priority: PriorityMode::Power,
        prediction: false,
        ..config(72, 64, 16)
    };
    let base = cfg.base_threshold;
    let period = u64::from(cfg.tuning_period);
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);

    // A marginal lane with a falling health trend gets a tighter threshold.
    let mut inputs = TickInputs::clean(72);
    inputs.lanes[6] = LaneSample::with_error_rate(1500);
    run_until(&mut c, &inputs, 200, |c| {
        c.lane(6).is_some_and(|l| l.adaptive_threshold < base)
    });
    align_to(&mut c, &inputs, period, 1);
    let tightened = c.lane(6).unwrap().adaptive_threshold;
    assert!(tightened < base);

    // Just over the tightened threshold but inside base: failed until healed.
    inputs.lanes[6] = LaneSample::with_error_rate(tightened + 1);
    c.drain_events();
    let visited = run_until(&mut c, &inputs, 20, |c| c.state() == LinkState::Monitoring);

    assert!(visited.contains(&LinkState::SelfHealing), "{visited:?}");
    assert!(!visited.contains(&LinkState::RepairActive), "{visited:?}");
    assert!(!visited.contains(&LinkState::RepairRequest), "{visited:?}");
    let lane = c.lane(6).unwrap();
    assert_eq!(lane.adaptive_threshold, base);
    assert_eq!(lane.status, LaneStatus::Marginal);
    assert!(!lane.under_repair);
    assert_eq!(c.map().logical_of(6), 6);
    let stats = c.stats();
    assert_eq!(stats.repair_attempts, 0);
    assert_eq!(stats.escalations, 0);
    assert!(c.drain_events().iter().any(|e| matches!(
        e.kind,
        LinkEventKind::EpisodeSucceeded { remapped: 0 }
    )));
}

#[test]
fn self_healing_escalates_to_remap_when_the_lane_stays_dead() {
    let cfg = LinkConfig {
        priority: PriorityMode::Power,
        prediction: false,
        ..config(72, 64, 16)
    };
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);

    let mut inputs = TickInputs::clean(72);
    inputs.lanes[3] = LaneSample::hard_failure();
    let visited = run_until(&mut c, &inputs, 100, |c| c.stats().successful_repairs > 0);

    let healing = visited.iter().position(|s| *s == LinkState::SelfHealing);
    let remapping = visited.iter().position(|s| *s == LinkState::RepairActive);
    assert!(healing.is_some() && remapping.is_some(), "{visited:?}");
    assert!(healing < remapping, "{visited:?}");
    assert_eq!(c.map().logical_of(64), 3);
    let stats = c.stats();
    assert_eq!(stats.escalations, 1);
    assert_eq!(stats.repair_attempts, 1);
    assert_eq!(stats.successful_repairs, 1);
}

#[test]
fn adaptive_tune_runs_a_tuning_pass_on_entry() {
    let cfg = LinkConfig {
        priority: PriorityMode::Reliability,
        prediction: false,
        ..config(72, 64, 16)
    };
    let base = cfg.base_threshold;
    let period = u64::from(cfg.tuning_period);
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);
    align_to(&mut c, &TickInputs::clean(72), period, 3);

    let mut hot = TickInputs {
        thermal: 105,
        ..TickInputs::clean(72)
    };
    hot.lanes[3] = LaneSample::hard_failure();
    run_until(&mut c, &hot, 4, |c| c.state() == LinkState::AdaptiveTune);
    assert_ne!(c.ticks() % period, 0);
    assert!(c.lanes().iter().all(|l| l.adaptive_threshold == base && !l.thermal_throttled));
    let tuning_runs = c.stats().tuning_runs;

    c.tick(&hot);
    for lane in c.lanes() {
        assert_eq!(lane.adaptive_threshold, base / 2, "lane {}", lane.physical_index);
        assert!(lane.thermal_throttled);
    }
    assert_eq!(c.stats().tuning_runs, tuning_runs);

    run_until(&mut c, &hot, 50, |c| c.stats().successful_repairs > 0);
    assert_eq!(c.map().logical_of(64), 3);
}

#[test]
fn thermal_repair_forces_thresholds_on_entry() {
    let cfg = LinkConfig {
        priority: PriorityMode::Power,
        prediction: false,
        ..config(72, 64, 16)
    };
    let base = cfg.base_threshold;
    let period = u64::from(cfg.tuning_period);
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);
    align_to(&mut c, &TickInputs::clean(72), period, 3);

    let mut hot = TickInputs {
        thermal: 255,
        ..TickInputs::clean(72)
    };
    hot.lanes[3] = LaneSample::hard_failure();
    run_until(&mut c, &hot, 4, |c| c.state() == LinkState::ThermalRepair);
    assert!(c.lanes().iter().all(|l| l.adaptive_threshold == base));

    c.tick(&hot);
    assert!(c.lanes().iter().all(|l| l.adaptive_threshold == base / 4 && l.thermal_throttled));
    assert!(c.summary().thermal_throttled);

    run_until(&mut c, &hot, 50, |c| c.stats().successful_repairs > 0);
    assert_eq!(c.map().logical_of(64), 3);
}

#[test]
fn ml_prediction_spends_the_last_spare_on_the_failed_lane() {
    let cfg = LinkConfig {
        priority: PriorityMode::Reliability,
        prediction_threshold: 0x02,
        ..config(65, 64, 16)
    };
    let period = u64::from(cfg.prediction_period);
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);
    align_to(&mut c, &TickInputs::clean(65), period, 0);

    let mut inputs = TickInputs::clean(65);
    inputs.lanes[7] = LaneSample::with_error_rate(0x0300);
    inputs.lanes[40] = LaneSample::hard_failure();
    let visited = run_until(&mut c, &inputs, 50, |c| {
        c.state() == LinkState::Monitoring && c.stats().successful_repairs > 0
    });

    assert!(visited.contains(&LinkState::MlPrediction), "{visited:?}");
    assert_eq!(c.map().logical_of(64), 40);
    assert_eq!(c.map().logical_of(7), 7);
    let lane = c.lane(7).unwrap();
    assert!(lane.predicted_failure);
    assert!(!lane.under_repair);
    assert_eq!(c.stats().successful_repairs, 1);
    assert_eq!(c.stats().escalations, 0);
}

#[test]
fn proactive_repair_waits_out_a_repair_hold() {
    let cfg = LinkConfig {
        prediction_threshold: 0x02,
        ..config(72, 64, 16)
    };
    let mut c = LinkController::new(cfg).unwrap();
    bring_up(&mut c);

    let mut inputs = TickInputs::clean(72);
    inputs.lanes[7] = LaneSample::with_error_rate(0x0300);
    run_until(&mut c, &inputs, 100, |c| c.state() == LinkState::ProactiveRepair);

    let held = TickInputs {
        repair_enable: false,
        ..inputs.clone()
    };
    for _ in 0..3 {
        c.tick(&held);
        assert_eq!(c.state(), LinkState::ProactiveRepair);
        assert_eq!(c.map().logical_of(7), 7);
    }

    run_until(&mut c, &inputs, 50, |c| c.stats().successful_repairs > 0);
    assert_eq!(c.map().logical_of(64), 7);
    assert_eq!(c.stats().successful_repairs, 1);
    assert_eq!(c.stats().escalations, 0);
}
