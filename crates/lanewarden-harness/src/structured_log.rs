//! Structured JSONL logging for scenario runs and proofs.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL log record with required + optional fields.
//! - [`ArtifactIndex`]: links logs to reports with SHA-256 integrity.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//! - [`validate_log_file`]: validates an entire JSONL file.

use std::io::Write;
use std::path::Path;

use lanewarden_core::{LinkEvent, LinkEventKind, LinkState, RepairStrategy, RepairTier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Severity level for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Error,
    Timeout,
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "fatal"];
const OUTCOMES: [&str; 5] = ["pass", "fail", "skip", "error", "timeout"];
const TIERS: [RepairTier; 4] = [
    RepairTier::Preventive,
    RepairTier::Corrective,
    RepairTier::Aggressive,
    RepairTier::Emergency,
];
const STRATEGIES: [RepairStrategy; 7] = [
    RepairStrategy::BasicRemap,
    RepairStrategy::Adaptive,
    RepairStrategy::Predictive,
    RepairStrategy::Hierarchical,
    RepairStrategy::Thermal,
    RepairStrategy::Proactive,
    RepairStrategy::SelfHealing,
];

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Controller tick the entry describes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    /// Lifecycle state name (`monitoring`, `repair_verify`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Physical lane index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_refs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            scenario: None,
            tick: None,
            link_state: None,
            tier: None,
            strategy: None,
            lane: None,
            outcome: None,
            artifact_refs: None,
            details: None,
        }
    }

    /// Translate a drained controller event. The trace id is left empty for
    /// the emitter to fill.
    #[must_use]
    pub fn from_link_event(event: &LinkEvent) -> Self {
        let level = match event.kind {
            LinkEventKind::VerifyFailed { .. } | LinkEventKind::CoordinationTimeout => {
                LogLevel::Warn
            }
            LinkEventKind::StateChanged {
                to: LinkState::Error,
                ..
            } => LogLevel::Error,
            LinkEventKind::LaneParked { .. } | LinkEventKind::WidthChanged { degraded: true, .. } => {
                LogLevel::Warn
            }
            _ => LogLevel::Info,
        };
        let mut entry = Self::new("", level, event.kind.name()).with_tick(event.tick);
        if let Some(lane) = event.kind.lane() {
            entry = entry.with_lane(lane);
        }
        match event.kind {
            LinkEventKind::StateChanged { from, to } => entry
                .with_link_state(to)
                .with_details(serde_json::json!({ "from": from.as_str() })),
            LinkEventKind::EpisodeStarted { tier, strategy } => {
                entry.with_repair(tier, strategy)
            }
            LinkEventKind::TierEscalated { from, to, strategy } => entry
                .with_repair(to, strategy)
                .with_details(serde_json::json!({ "from_tier": from.as_str() })),
            LinkEventKind::EpisodeSucceeded { remapped } => entry
                .with_outcome(Outcome::Pass)
                .with_details(serde_json::json!({ "remapped": remapped })),
            LinkEventKind::VerifyFailed { tier } => {
                entry.with_outcome(Outcome::Fail).with_tier(tier)
            }
            LinkEventKind::CoordinationTimeout => entry.with_outcome(Outcome::Timeout),
            LinkEventKind::LaneRemapped { spare, logical, .. } => {
                entry.with_details(serde_json::json!({ "spare": spare, "logical": logical }))
            }
            LinkEventKind::LaneCompacted {
                replacement,
                logical,
                ..
            } => entry.with_details(
                serde_json::json!({ "replacement": replacement, "logical": logical }),
            ),
            LinkEventKind::WidthChanged { from, to, degraded } => entry.with_details(
                serde_json::json!({ "from": from, "to": to, "degraded": degraded }),
            ),
            LinkEventKind::ThermalThrottle { engaged, .. } => {
                entry.with_details(serde_json::json!({ "engaged": engaged }))
            }
            LinkEventKind::PredictedFailure { score, .. } => {
                entry.with_details(serde_json::json!({ "score": score }))
            }
            LinkEventKind::LaneParked { .. }
            | LinkEventKind::LaneUnparked { .. }
            | LinkEventKind::ReversalCorrected => entry,
        }
    }

    #[must_use]
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    #[must_use]
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    #[must_use]
    pub fn with_link_state(mut self, state: LinkState) -> Self {
        self.link_state = Some(state.as_str().to_string());
        self
    }

    #[must_use]
    pub fn with_tier(mut self, tier: RepairTier) -> Self {
        self.tier = Some(tier.as_str().to_string());
        self
    }

    /// Set tier and strategy together.
    #[must_use]
    pub fn with_repair(mut self, tier: RepairTier, strategy: RepairStrategy) -> Self {
        self.tier = Some(tier.as_str().to_string());
        self.strategy = Some(strategy.as_str().to_string());
        self
    }

    #[must_use]
    pub fn with_lane(mut self, lane: usize) -> Self {
        self.lane = Some(lane);
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Add artifact references.
    #[must_use]
    pub fn with_artifacts(mut self, refs: Vec<String>) -> Self {
        self.artifact_refs = Some(refs);
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Artifact index
// ---------------------------------------------------------------------------

/// A single artifact entry in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Artifact index linking a run's log to its report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub scenario: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>, scenario: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            scenario: scenario.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Add an artifact entry with a precomputed digest.
    pub fn add(
        &mut self,
        path: impl Into<String>,
        kind: impl Into<String>,
        sha256: impl Into<String>,
    ) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            path: path.into(),
            kind: kind.into(),
            sha256: sha256.into(),
            size_bytes: None,
            description: None,
        });
        self
    }

    /// Hash a file on disk and add it.
    pub fn add_file(
        &mut self,
        path: &Path,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> std::io::Result<&mut Self> {
        let bytes = std::fs::read(path)?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&bytes),
            size_bytes: Some(bytes.len() as u64),
            description: Some(description.into()),
        });
        Ok(self)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Log emitter
// ---------------------------------------------------------------------------

/// Writes structured JSONL log entries to a file or buffer.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    lines: u64,
    scenario: String,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, scenario: &str, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self {
            writer: Box::new(std::io::BufWriter::new(file)),
            seq: 0,
            lines: 0,
            scenario: scenario.to_string(),
            run_id: run_id.to_string(),
        })
    }

    /// Create an emitter that discards its output (for tests and benches).
    #[must_use]
    pub fn to_buffer(scenario: &str, run_id: &str) -> Self {
        Self {
            writer: Box::new(Vec::new()),
            seq: 0,
            lines: 0,
            scenario: scenario.to_string(),
            run_id: run_id.to_string(),
        }
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.lines
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{}::{:03}", self.scenario, self.run_id, self.seq)
    }

    /// Emit a log entry with auto-generated trace_id and scenario.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(&trace_id, level, event).with_scenario(&self.scenario);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Emit a fully-populated log entry.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        if entry.scenario.is_none() {
            entry.scenario = Some(self.scenario.clone());
        }
        self.write_line(&entry)
    }

    fn write_line(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        self.lines += 1;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validation error for a log line.
#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}: field '{}': {}",
            self.line_number, self.field, self.message
        )
    }
}

fn check_vocab(
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &str,
    allowed: &[&str],
    line_number: usize,
    errors: &mut Vec<LogValidationError>,
) {
    if let Some(value) = obj.get(field).and_then(|v| v.as_str())
        && !allowed.contains(&value)
    {
        errors.push(LogValidationError {
            line_number,
            field: field.to_string(),
            message: format!("invalid {field}: '{value}'"),
        });
    }
}

/// Validate a single JSONL line against the schema.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut errors = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<json>".to_string(),
                message: format!("invalid JSON: {e}"),
            });
            return Err(errors);
        }
    };

    let Some(obj) = value.as_object() else {
        errors.push(LogValidationError {
            line_number,
            field: "<root>".to_string(),
            message: "expected JSON object".to_string(),
        });
        return Err(errors);
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            errors.push(LogValidationError {
                line_number,
                field: field.to_string(),
                message: "required field missing".to_string(),
            });
        }
    }

    let states: Vec<&str> = (0..16u8)
        .filter_map(LinkState::from_code)
        .map(LinkState::as_str)
        .collect();
    let tiers: Vec<&str> = TIERS.iter().map(|t| t.as_str()).collect();
    let strategies: Vec<&str> = STRATEGIES.iter().map(|s| s.as_str()).collect();

    check_vocab(obj, "level", &LEVELS, line_number, &mut errors);
    check_vocab(obj, "outcome", &OUTCOMES, line_number, &mut errors);
    check_vocab(obj, "link_state", &states, line_number, &mut errors);
    check_vocab(obj, "tier", &tiers, line_number, &mut errors);
    check_vocab(obj, "strategy", &strategies, line_number, &mut errors);

    if let Some(trace_id) = obj.get("trace_id").and_then(|v| v.as_str())
        && !trace_id.contains("::")
    {
        errors.push(LogValidationError {
            line_number,
            field: "trace_id".to_string(),
            message: format!(
                "trace_id should follow <scenario>::<run_id>::<seq> format, got: '{trace_id}'"
            ),
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    match serde_json::from_value::<LogEntry>(value) {
        Ok(entry) => Ok(entry),
        Err(e) => {
            errors.push(LogValidationError {
                line_number,
                field: "<deserialization>".to_string(),
                message: format!("failed to deserialize: {e}"),
            });
            Err(errors)
        }
    }
}

/// Validate an entire JSONL file.
///
/// Returns the non-empty line count and any validation errors found.
pub fn validate_log_file(path: &Path) -> Result<(usize, Vec<LogValidationError>), std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    let mut all_errors = Vec::new();
    let mut line_count = 0;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        line_count += 1;
        if let Err(errs) = validate_log_line(line, i + 1) {
            all_errors.extend(errs);
        }
    }

    Ok((line_count, all_errors))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current wall-clock time as an RFC 3339 UTC string with milliseconds.
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let (year, month, day) = civil_from_days(secs / 86_400);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60,
        duration.subsec_millis(),
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_required_fields() {
        let entry = LogEntry::new("b::run-1::001", LogLevel::Info, "scenario_start");
        let json = entry.to_jsonl().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["timestamp"].is_string());
        assert_eq!(parsed["trace_id"], "b::run-1::001");
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "scenario_start");
        assert!(parsed.get("scenario").is_none());
        assert!(parsed.get("tick").is_none());
        assert!(parsed.get("lane").is_none());
    }

    #[test]
    fn link_event_maps_to_entry_fields() {
        let event = LinkEvent {
            tick: 42,
            kind: LinkEventKind::TierEscalated {
                from: RepairTier::Corrective,
                to: RepairTier::Aggressive,
                strategy: RepairStrategy::Adaptive,
            },
        };
        let entry = LogEntry::from_link_event(&event);
        assert_eq!(entry.event, "tier_escalated");
        assert_eq!(entry.tick, Some(42));
        assert_eq!(entry.tier.as_deref(), Some("aggressive"));
        assert_eq!(entry.strategy.as_deref(), Some("adaptive"));
        assert_eq!(entry.details.unwrap()["from_tier"], "corrective");
        assert!(entry.trace_id.is_empty());
    }

    #[test]
    fn remap_event_carries_the_failing_lane() {
        let event = LinkEvent {
            tick: 7,
            kind: LinkEventKind::LaneRemapped {
                failing: 5,
                spare: 64,
                logical: 5,
            },
        };
        let entry = LogEntry::from_link_event(&event);
        assert_eq!(entry.lane, Some(5));
        assert_eq!(entry.details.unwrap()["spare"], 64);
    }

    #[test]
    fn emitter_fills_trace_ids_in_sequence() {
        let mut emitter = LogEmitter::to_buffer("b", "run-7");
        let first = emitter.emit(LogLevel::Info, "scenario_start").unwrap();
        assert_eq!(first.trace_id, "b::run-7::001");
        assert_eq!(first.scenario.as_deref(), Some("b"));
        emitter
            .emit_entry(LogEntry::new("", LogLevel::Info, "state_changed"))
            .unwrap();
        assert_eq!(emitter.emitted(), 2);
    }

    #[test]
    fn validate_accepts_emitted_lines() {
        let entry = LogEntry::new("a::r::001", LogLevel::Warn, "verify_failed")
            .with_link_state(LinkState::RepairVerify)
            .with_tier(RepairTier::Emergency)
            .with_outcome(Outcome::Fail);
        let line = entry.to_jsonl().unwrap();
        let parsed = validate_log_line(&line, 1).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn validate_rejects_missing_and_unknown_fields() {
        let errs = validate_log_line(r#"{"trace_id":"x","level":"loud"}"#, 3).unwrap_err();
        let fields: Vec<&str> = errs.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"timestamp"));
        assert!(fields.contains(&"event"));
        assert!(fields.contains(&"level"));
        assert!(fields.contains(&"trace_id"));
        assert!(errs.iter().all(|e| e.line_number == 3));
    }

    #[test]
    fn validate_rejects_unknown_link_state() {
        let line = r#"{"timestamp":"t","trace_id":"a::b::1","level":"info","event":"e","link_state":"napping"}"#;
        let errs = validate_log_line(line, 1).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "link_state");
    }

    #[test]
    fn validate_rejects_non_object() {
        let errs = validate_log_line("[1,2]", 1).unwrap_err();
        assert_eq!(errs[0].field, "<root>");
        let errs = validate_log_line("{nope", 2).unwrap_err();
        assert_eq!(errs[0].field, "<json>");
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn civil_dates() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
    }

    #[test]
    fn timestamp_shape() {
        let ts = now_utc();
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
    }
}
