//! Determinism proof for the tick loop.
//!
//! Two fresh controllers are driven with the same scenario inputs and must
//! agree bit-for-bit at every tick: same BLAKE3 state fingerprint, same
//! summary, same drained events. A third controller then replays the
//! scenario on its own and must land on the same final fingerprint.

use std::path::Path;

use lanewarden_core::{LinkController, LinkEvent};
use serde::Serialize;

use crate::scenario::{Scenario, ScenarioError};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, now_utc};

const RUN_ID: &str = "determinism";
const MAX_RECORDED_FAILURES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofCheck {
    pub check_id: String,
    pub ok: bool,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeterminismSummary {
    pub checks: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeterminismReport {
    pub schema_version: &'static str,
    pub scenario: String,
    pub generated_at: String,
    pub ticks: u64,
    pub events_compared: usize,
    pub first_divergence_tick: Option<u64>,
    pub final_fingerprint: String,
    pub summary: DeterminismSummary,
    pub checks: Vec<ProofCheck>,
}

impl DeterminismReport {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.summary.failed == 0
    }
}

fn hex(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

struct Lockstep {
    fingerprint_failures: Vec<String>,
    summary_failures: Vec<String>,
    event_failures: Vec<String>,
    first_divergence: Option<u64>,
    events_compared: usize,
}

impl Lockstep {
    fn note(list: &mut Vec<String>, first: &mut Option<u64>, tick: u64, msg: String) {
        first.get_or_insert(tick);
        if list.len() < MAX_RECORDED_FAILURES {
            list.push(msg);
        }
    }
}

/// Drive `a` and `b` in lockstep over the scenario.
fn lockstep(
    scenario: &Scenario,
    a: &mut LinkController,
    b: &mut LinkController,
) -> Result<Lockstep, ScenarioError> {
    let mut inputs = scenario.inputs()?;
    let mut out = Lockstep {
        fingerprint_failures: Vec::new(),
        summary_failures: Vec::new(),
        event_failures: Vec::new(),
        first_divergence: None,
        events_compared: 0,
    };
    for tick in 0..scenario.ticks {
        let frame = inputs.advance();
        let sa = a.tick(frame);
        let sb = b.tick(frame);
        if a.fingerprint() != b.fingerprint() {
            Lockstep::note(
                &mut out.fingerprint_failures,
                &mut out.first_divergence,
                tick,
                format!("tick {tick}: {} != {}", a.fingerprint_hex(), b.fingerprint_hex()),
            );
        }
        if sa != sb {
            Lockstep::note(
                &mut out.summary_failures,
                &mut out.first_divergence,
                tick,
                format!("tick {tick}: summaries differ ({:?} vs {:?})", sa.state, sb.state),
            );
        }
        let ea: Vec<LinkEvent> = a.drain_events();
        let eb: Vec<LinkEvent> = b.drain_events();
        out.events_compared += ea.len();
        if ea != eb {
            Lockstep::note(
                &mut out.event_failures,
                &mut out.first_divergence,
                tick,
                format!("tick {tick}: {} vs {} events", ea.len(), eb.len()),
            );
        }
    }
    Ok(out)
}

fn check(
    id: &str,
    before: serde_json::Value,
    after: serde_json::Value,
    failures: Vec<String>,
) -> ProofCheck {
    ProofCheck {
        check_id: id.to_string(),
        ok: failures.is_empty(),
        before,
        after,
        failures,
    }
}

/// Run the proof for `scenario`, logging each check through `emitter`.
pub fn prove(
    scenario: &Scenario,
    emitter: &mut LogEmitter,
) -> Result<DeterminismReport, ScenarioError> {
    let config = scenario.link_config()?;
    let mut a = LinkController::new(config)?;
    let mut b = LinkController::new(config)?;
    let initial = a.fingerprint();

    let mut checks = Vec::new();
    let initial_failures = if initial == b.fingerprint() {
        Vec::new()
    } else {
        vec!["fresh controllers differ".to_string()]
    };
    checks.push(check(
        "initial_fingerprint_equal",
        serde_json::json!(hex(&initial)),
        serde_json::json!(b.fingerprint_hex()),
        initial_failures,
    ));

    let run = lockstep(scenario, &mut a, &mut b)?;
    let final_a = a.fingerprint();
    checks.push(check(
        "fingerprint_lockstep",
        serde_json::json!(hex(&initial)),
        serde_json::json!(hex(&final_a)),
        run.fingerprint_failures,
    ));
    checks.push(check(
        "summary_lockstep",
        serde_json::json!(scenario.ticks),
        serde_json::json!(a.ticks()),
        run.summary_failures,
    ));
    checks.push(check(
        "event_stream_identical",
        serde_json::json!(0),
        serde_json::json!(run.events_compared),
        run.event_failures,
    ));

    let mut replay = LinkController::new(config)?;
    let mut inputs = scenario.inputs()?;
    for _ in 0..scenario.ticks {
        replay.tick(inputs.advance());
    }
    let replay_failures = if replay.fingerprint() == final_a {
        Vec::new()
    } else {
        vec![format!(
            "standalone replay ended at {} instead of {}",
            replay.fingerprint_hex(),
            hex(&final_a)
        )]
    };
    checks.push(check(
        "standalone_replay_identical",
        serde_json::json!(hex(&final_a)),
        serde_json::json!(replay.fingerprint_hex()),
        replay_failures,
    ));

    for c in &checks {
        let (level, outcome) = if c.ok {
            (LogLevel::Info, Outcome::Pass)
        } else {
            (LogLevel::Error, Outcome::Fail)
        };
        emitter.emit_entry(
            LogEntry::new("", level, "determinism_check")
                .with_outcome(outcome)
                .with_details(serde_json::json!({
                    "check_id": c.check_id,
                    "failures": c.failures.len(),
                })),
        )?;
    }
    emitter.flush()?;

    let passed = checks.iter().filter(|c| c.ok).count();
    Ok(DeterminismReport {
        schema_version: "v1",
        scenario: scenario.name.clone(),
        generated_at: now_utc(),
        ticks: scenario.ticks,
        events_compared: run.events_compared,
        first_divergence_tick: run.first_divergence,
        final_fingerprint: hex(&final_a),
        summary: DeterminismSummary {
            checks: checks.len(),
            passed,
            failed: checks.len() - passed,
        },
        checks,
    })
}

/// Run the proof and write the JSONL log and JSON report.
pub fn run_and_write(
    scenario: &Scenario,
    log_path: &Path,
    report_path: &Path,
) -> Result<DeterminismReport, ScenarioError> {
    for path in [log_path, report_path] {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut emitter = LogEmitter::to_file(log_path, &scenario.name, RUN_ID)?;
    let report = prove(scenario, &mut emitter)?;
    std::fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
    Ok(report)
}
