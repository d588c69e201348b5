//! Lane health and repair control for multi-lane links.
//!
//! This crate judges per-lane signal quality every tick, decides when and how
//! to repair a degrading link, and re-allocates physical lanes onto spares to
//! keep the requested width. It performs no I/O and never panics on inputs.
//!
//! # Architecture
//!
//! - **Health monitor** (`health`): alarm/warning classification and the
//!   weighted health score
//! - **Threshold tuner** (`threshold`): trend and thermal driven adaptive thresholds
//! - **Failure predictor** (`predictor`): advisory per-lane failure scoring
//! - **Strategy selector** (`strategy`): priority policy to repair tier and strategy
//! - **Remap engine** (`remap`): physical/logical mapping, spares, reversal
//! - **Width manager** (`width`): achievable width and degradation flag
//! - **Lifecycle** (`lifecycle`): link states and the pure next-state function
//! - **Controller** (`controller`): read-then-commit tick loop driving all of the above
//! - **Status** (`status`, `events`, `board`): statistics, packed status word,
//!   event feed and the shared status board
//! - **Configuration** (`config`): explicit link configuration

#![forbid(unsafe_code)]

pub mod board;
pub mod config;
pub mod controller;
pub mod events;
pub mod health;
pub mod lane;
pub mod lifecycle;
pub mod predictor;
pub mod remap;
pub mod status;
pub mod strategy;
pub mod threshold;
pub mod width;

pub use board::StatusBoard;
pub use config::{ConfigError, LinkConfig, LinkTimeouts, PriorityMode, SignalingMode};
pub use controller::{LinkController, TickInputs};
pub use events::{LinkEvent, LinkEventKind};
pub use health::ThermalBand;
pub use lane::{LaneFlags, LaneRecord, LaneSample, LaneStatus};
pub use lifecycle::LinkState;
pub use remap::{LaneMap, RemapRecord};
pub use status::{LinkStatistics, LinkSummary, StatusWord};
pub use strategy::{RepairContext, RepairStrategy, RepairTier};
pub use width::WidthState;
