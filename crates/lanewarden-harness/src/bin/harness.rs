//! CLI entrypoint for the lanewarden scenario harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lanewarden_harness::scenario::{BUILTINS, Scenario};
use lanewarden_harness::structured_log::validate_log_file;
use lanewarden_harness::{ScenarioReport, determinism, runner};

/// Scenario tooling for lanewarden.
#[derive(Debug, Parser)]
#[command(name = "lanewarden-harness")]
#[command(about = "Scenario runner and determinism proofs for lanewarden")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario file.
    Run {
        /// Scenario JSON path.
        #[arg(long)]
        scenario: PathBuf,
        /// Override the scenario's priority mode (bandwidth, reliability, power, balanced).
        #[arg(long)]
        priority: Option<String>,
        /// Run identifier used in trace ids.
        #[arg(long, default_value = "local")]
        run_id: String,
        /// Output JSONL log path.
        #[arg(long, default_value = "target/lanewarden/scenario.log.jsonl")]
        log: PathBuf,
        /// Output JSON report path.
        #[arg(long, default_value = "target/lanewarden/scenario.report.json")]
        report: PathBuf,
        /// Output artifact index path.
        #[arg(long, default_value = "target/lanewarden/scenario.artifacts.json")]
        index: PathBuf,
    },
    /// Run one of the built-in reference scenarios (a..e), or all of them.
    Builtin {
        /// Short name (`a`..`e`), full scenario name, or `all`.
        #[arg(long, default_value = "all")]
        name: String,
        #[arg(long, default_value = "local")]
        run_id: String,
        /// Directory for logs, reports and artifact indexes.
        #[arg(long, default_value = "target/lanewarden/builtin")]
        out_dir: PathBuf,
    },
    /// Prove that a scenario runs bit-for-bit deterministically.
    Determinism {
        /// Scenario JSON path; defaults to built-in scenario `b`.
        #[arg(long)]
        scenario: Option<PathBuf>,
        #[arg(long, default_value = "target/lanewarden/determinism.log.jsonl")]
        log: PathBuf,
        #[arg(long, default_value = "target/lanewarden/determinism.report.json")]
        report: PathBuf,
    },
    /// Validate a JSONL log against the structured log schema.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
    /// List the built-in scenarios.
    List,
}

fn print_outcome(report: &ScenarioReport, report_path: &Path) {
    let verdict = if report.ok { "PASS" } else { "FAIL" };
    eprintln!(
        "{verdict}: {} after {} ticks in {} (width {}/{}, repairs {}; report: {})",
        report.scenario,
        report.ticks,
        report.summary.state,
        report.summary.current_width,
        report.summary.target_width,
        report.statistics.successful_repairs,
        report_path.display()
    );
    for failure in report.failures() {
        eprintln!("  - {failure}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            scenario,
            priority,
            run_id,
            log,
            report,
            index,
        } => {
            let mut s = Scenario::from_file(&scenario)?;
            if priority.is_some() {
                s.config.priority = priority;
            }
            let rep = runner::run_and_write(&s, &run_id, &log, &report, Some(&index))?;
            print_outcome(&rep, &report);
            if !rep.ok {
                return Err(format!("scenario {} failed", rep.scenario).into());
            }
        }
        Command::Builtin {
            name,
            run_id,
            out_dir,
        } => {
            let scenarios = if name == "all" {
                BUILTINS
                    .iter()
                    .map(|(short, _)| Scenario::builtin(short))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                vec![Scenario::builtin(&name)?]
            };
            let mut failed = Vec::new();
            for s in &scenarios {
                let log = out_dir.join(format!("{}.log.jsonl", s.name));
                let report = out_dir.join(format!("{}.report.json", s.name));
                let index = out_dir.join(format!("{}.artifacts.json", s.name));
                let rep = runner::run_and_write(s, &run_id, &log, &report, Some(&index))?;
                print_outcome(&rep, &report);
                if !rep.ok {
                    failed.push(rep.scenario);
                }
            }
            if !failed.is_empty() {
                return Err(format!("built-in scenarios failed: {}", failed.join(", ")).into());
            }
        }
        Command::Determinism {
            scenario,
            log,
            report,
        } => {
            let s = match scenario {
                Some(path) => Scenario::from_file(&path)?,
                None => Scenario::builtin("b")?,
            };
            let rep = determinism::run_and_write(&s, &log, &report)?;
            if !rep.ok() {
                return Err(std::io::Error::other(format!(
                    "determinism proof FAILED for {}: {} check(s) failed, first divergence at {:?} (report: {})",
                    rep.scenario,
                    rep.summary.failed,
                    rep.first_divergence_tick,
                    report.display()
                ))
                .into());
            }
            eprintln!(
                "OK: {} is deterministic over {} ticks, {} events compared (log: {}, report: {})",
                rep.scenario,
                rep.ticks,
                rep.events_compared,
                log.display(),
                report.display()
            );
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(format!(
                    "{} schema violation(s) in {} line(s) of {}",
                    errors.len(),
                    lines,
                    log.display()
                )
                .into());
            }
            eprintln!("OK: {lines} line(s) in {} match the log schema", log.display());
        }
        Command::List => {
            for (short, _) in BUILTINS {
                let s = Scenario::builtin(short)?;
                println!("{short}  {:<20} {}", s.name, s.description);
            }
        }
    }

    Ok(())
}
