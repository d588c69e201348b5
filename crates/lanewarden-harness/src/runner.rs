//! Scenario runner.
//!
//! Drives one controller through a [`Scenario`], logs every drained event as
//! JSONL, checks invariants each tick and expectations at the end, and
//! produces a [`ScenarioReport`].

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use lanewarden_core::{LinkController, LinkState, LinkStatistics, LinkSummary, RemapRecord};
use serde::Serialize;

use crate::invariants::{InvariantCheckResult, InvariantMonitor};
use crate::scenario::{Expectations, Scenario, ScenarioError, state_from_name};
use crate::structured_log::{ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, now_utc};

pub const REPORT_SCHEMA_VERSION: &str = "v1";

/// Counters from [`LinkStatistics`] in report form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatisticsReport {
    pub ticks: u32,
    pub successful_repairs: u32,
    pub failed_repairs: u32,
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

impl From<&LinkStatistics> for StatisticsReport {
    fn from(s: &LinkStatistics) -> Self {
        Self {
            ticks: s.ticks,
            successful_repairs: s.successful_repairs,
            failed_repairs: s.failed_repairs,
            repair_attempts: s.repair_attempts,
            escalations: s.escalations,
            degrade_entries: s.degrade_entries,
            error_entries: s.error_entries,
            coordination_timeouts: s.coordination_timeouts,
            reversal_corrections: s.reversal_corrections,
            prediction_runs: s.prediction_runs,
            tuning_runs: s.tuning_runs,
            events_dropped: s.events_dropped,
        }
    }
}

/// One retained remap ledger record. Compactions of parked lanes appear
/// here too, with the parked lane as `failing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub seqno: u64,
    pub tick: u64,
    pub failing: usize,
    pub spare: usize,
    pub logical: usize,
}

impl From<RemapRecord> for LedgerEntry {
    fn from(r: RemapRecord) -> Self {
        Self {
            seqno: r.seqno,
            tick: r.tick,
            failing: r.failing,
            spare: r.spare,
            logical: r.logical,
        }
    }
}

/// Final link summary in report form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalSummary {
    pub state: String,
    pub tier: String,
    pub strategy: String,
    pub failed_lanes: usize,
    pub needing_repair: usize,
    pub available_lanes: usize,
    pub free_spares: usize,
    pub target_width: usize,
    pub current_width: usize,
    /// Lanes whose published `active` flag is set.
    pub active_lanes: usize,
    pub degradation_needed: bool,
    pub ml_repair_triggered: bool,
    pub reversal_corrected: bool,
    pub thermal_throttled: bool,
    pub status_word: String,
    pub fingerprint: String,
}

impl FinalSummary {
    fn new(c: &LinkController, s: &LinkSummary) -> Self {
        Self {
            state: s.state.as_str().to_string(),
            tier: s.context.tier.as_str().to_string(),
            strategy: s.context.strategy.as_str().to_string(),
            failed_lanes: s.failed_lanes,
            needing_repair: s.needing_repair,
            available_lanes: s.available_lanes,
            free_spares: s.free_spares,
            target_width: s.target_width,
            current_width: s.current_width,
            active_lanes: active_lanes(c),
            degradation_needed: s.degradation_needed,
            ml_repair_triggered: s.ml_repair_triggered,
            reversal_corrected: s.reversal_corrected,
            thermal_throttled: s.thermal_throttled,
            status_word: format!("{:#010x}", s.status_word().raw()),
            fingerprint: c.fingerprint_hex(),
        }
    }
}

fn active_lanes(c: &LinkController) -> usize {
    c.all_lane_flags().iter().filter(|f| f.active).count()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectationResult {
    pub check: String,
    pub ok: bool,
    pub expected: serde_json::Value,
    pub actual: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub schema_version: &'static str,
    pub scenario: String,
    pub description: String,
    pub generated_at: String,
    pub ticks: u64,
    pub ok: bool,
    pub visited_states: Vec<String>,
    pub event_counts: BTreeMap<String, u64>,
    pub summary: FinalSummary,
    pub statistics: StatisticsReport,
    pub invariants: Vec<InvariantCheckResult>,
    pub expectations: Vec<ExpectationResult>,
    /// Retained remap ledger, oldest first.
    pub remap_ledger: Vec<LedgerEntry>,
}

impl ScenarioReport {
    /// Names of failed invariants and expectations.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.invariants
            .iter()
            .filter(|r| !r.ok)
            .map(|r| format!("invariant {}", r.invariant_id))
            .chain(
                self.expectations
                    .iter()
                    .filter(|e| !e.ok)
                    .map(|e| format!("expectation {}", e.check)),
            )
            .collect()
    }
}

struct ExpectationChecker {
    results: Vec<ExpectationResult>,
}

impl ExpectationChecker {
    fn push<T: Serialize + PartialEq>(&mut self, check: &str, expected: T, actual: T) {
        self.results.push(ExpectationResult {
            check: check.to_string(),
            ok: expected == actual,
            expected: serde_json::json!(expected),
            actual: serde_json::json!(actual),
        });
    }

    fn push_if<T: Serialize + PartialEq>(&mut self, check: &str, expected: Option<T>, actual: T) {
        if let Some(expected) = expected {
            self.push(check, expected, actual);
        }
    }
}

fn check_expectations(
    expect: &Expectations,
    c: &LinkController,
    visited: &HashSet<LinkState>,
) -> Result<Vec<ExpectationResult>, ScenarioError> {
    let s = c.summary();
    let mut checker = ExpectationChecker {
        results: Vec::new(),
    };

    if let Some(name) = &expect.final_state {
        checker.push("final_state", name.as_str(), s.state.as_str());
    }
    checker.push_if("current_width", expect.current_width, s.current_width);
    checker.push_if("target_width", expect.target_width, s.target_width);
    checker.push_if("active_lanes", expect.active_lanes, active_lanes(c));
    checker.push_if(
        "degradation_needed",
        expect.degradation_needed,
        s.degradation_needed,
    );
    checker.push_if(
        "successful_repairs",
        expect.successful_repairs,
        s.stats.successful_repairs,
    );
    if let Some(min) = expect.min_successful_repairs {
        checker.results.push(ExpectationResult {
            check: "min_successful_repairs".to_string(),
            ok: s.stats.successful_repairs >= min,
            expected: serde_json::json!(min),
            actual: serde_json::json!(s.stats.successful_repairs),
        });
    }
    checker.push_if(
        "thermal_throttled",
        expect.thermal_throttled,
        s.thermal_throttled,
    );
    if let Some(threshold) = expect.adaptive_threshold {
        let off: Vec<usize> = c
            .lanes()
            .iter()
            .filter(|l| l.adaptive_threshold != threshold)
            .map(|l| l.physical_index)
            .collect();
        checker.push("adaptive_threshold.lanes_off", Vec::new(), off);
    }
    for name in &expect.visits {
        let state = state_from_name(name)?;
        checker.push(&format!("visits.{name}"), true, visited.contains(&state));
    }
    for name in &expect.avoids {
        let state = state_from_name(name)?;
        checker.push(&format!("avoids.{name}"), false, visited.contains(&state));
    }
    for m in &expect.mapping {
        checker.push(
            &format!("mapping.physical_{}", m.physical),
            m.logical,
            c.map().logical_of(m.physical),
        );
    }
    if !expect.parked.is_empty() {
        let parked: Vec<usize> = c
            .lanes()
            .iter()
            .filter(|l| l.parked)
            .map(|l| l.physical_index)
            .collect();
        checker.push("parked", expect.parked.clone(), parked);
    }
    Ok(checker.results)
}

/// Run `scenario` to completion, logging through `emitter`.
pub fn run_scenario(
    scenario: &Scenario,
    emitter: &mut LogEmitter,
) -> Result<ScenarioReport, ScenarioError> {
    let config = scenario.link_config()?;
    let mut controller = LinkController::new(config)?;
    let mut inputs = scenario.inputs()?;
    let mut monitor = InvariantMonitor::new();
    let mut visited = HashSet::from([controller.state()]);
    let mut visit_order = vec![controller.state()];
    let mut event_counts: BTreeMap<String, u64> = BTreeMap::new();

    emitter.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_start")
            .with_link_state(controller.state())
            .with_details(serde_json::json!({
                "num_lanes": config.num_lanes,
                "requested_width": config.requested_width,
                "min_width": config.min_width,
                "priority": config.priority.as_str(),
                "signaling": config.signaling.as_str(),
                "ticks": scenario.ticks,
            })),
    )?;

    for _ in 0..scenario.ticks {
        let summary = controller.tick(inputs.advance());
        monitor.observe(&controller, &summary);
        visited.insert(summary.state);
        if visit_order.last() != Some(&summary.state) {
            visit_order.push(summary.state);
        }
        for event in controller.drain_events() {
            *event_counts.entry(event.kind.name().to_string()).or_default() += 1;
            emitter.emit_entry(LogEntry::from_link_event(&event))?;
        }
    }

    let expectations = check_expectations(&scenario.expect, &controller, &visited)?;
    let summary = *controller.summary();
    let ok = monitor.all_ok() && expectations.iter().all(|e| e.ok);

    emitter.emit_entry(
        LogEntry::new("", if ok { LogLevel::Info } else { LogLevel::Error }, "scenario_end")
            .with_tick(summary.tick)
            .with_link_state(summary.state)
            .with_repair(summary.context.tier, summary.context.strategy)
            .with_outcome(if ok { Outcome::Pass } else { Outcome::Fail })
            .with_details(serde_json::json!({
                "fingerprint": controller.fingerprint_hex(),
                "successful_repairs": summary.stats.successful_repairs,
                "current_width": summary.current_width,
            })),
    )?;
    emitter.flush()?;

    Ok(ScenarioReport {
        schema_version: REPORT_SCHEMA_VERSION,
        scenario: scenario.name.clone(),
        description: scenario.description.clone(),
        generated_at: now_utc(),
        ticks: scenario.ticks,
        ok,
        visited_states: visit_order.iter().map(|s| s.as_str().to_string()).collect(),
        event_counts,
        summary: FinalSummary::new(&controller, &summary),
        statistics: StatisticsReport::from(&summary.stats),
        invariants: monitor.results(),
        expectations,
        remap_ledger: controller
            .remap()
            .ledger()
            .into_iter()
            .map(LedgerEntry::from)
            .collect(),
    })
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Run a scenario, writing the JSONL log, the JSON report and, when
/// `index_path` is given, an artifact index over both.
pub fn run_and_write(
    scenario: &Scenario,
    run_id: &str,
    log_path: &Path,
    report_path: &Path,
    index_path: Option<&Path>,
) -> Result<ScenarioReport, ScenarioError> {
    ensure_parent(log_path)?;
    ensure_parent(report_path)?;

    let mut emitter = LogEmitter::to_file(log_path, &scenario.name, run_id)?;
    let report = run_scenario(scenario, &mut emitter)?;
    std::fs::write(report_path, serde_json::to_string_pretty(&report)?)?;

    if let Some(index_path) = index_path {
        ensure_parent(index_path)?;
        let mut index = ArtifactIndex::new(run_id, &scenario.name);
        index.add_file(log_path, "log", "structured JSONL event log")?;
        index.add_file(report_path, "report", "scenario report with invariant results")?;
        std::fs::write(index_path, index.to_json()?)?;
    }
    Ok(report)
}
