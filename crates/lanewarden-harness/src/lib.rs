//! Scenario and proof tooling for lanewarden.
//!
//! This crate provides:
//! - Scenario fixtures: JSON link configurations, input phases and expectations
//! - Scenario runner: drives a controller, checks invariants every tick
//! - Structured logging: JSONL event logs plus a SHA-256 artifact index
//! - Determinism proofs: lockstep fingerprint comparison of independent runs

#![forbid(unsafe_code)]

pub mod determinism;
pub mod invariants;
pub mod runner;
pub mod scenario;
pub mod structured_log;

pub use invariants::{InvariantCheckResult, InvariantMonitor};
pub use runner::{ScenarioReport, run_scenario};
pub use scenario::{Scenario, ScenarioError};
