//! Shared setup for the lanewarden benchmarks.

use lanewarden_core::{LinkConfig, LinkController, LinkState, TickInputs};

/// `(num_lanes, requested_width)` pairs benchmarked across groups.
pub const GEOMETRIES: &[(usize, usize)] = &[(9, 8), (20, 16), (72, 64), (144, 128), (1024, 960)];

/// Bench config: min width a quarter of requested, slower periodic passes.
#[must_use]
pub fn bench_config(lanes: usize, width: usize) -> LinkConfig {
    LinkConfig {
        health_update_period: 64,
        tuning_period: 256,
        prediction_period: 16,
        ..LinkConfig::with_lanes(lanes, width, (width / 4).max(1))
    }
}

/// A controller that has trained on a clean link and reached Monitoring.
///
/// # Panics
///
/// Panics if `lanes`/`width` do not form a valid geometry.
#[must_use]
pub fn settled(lanes: usize, width: usize) -> LinkController {
    let mut c = match LinkController::new(bench_config(lanes, width)) {
        Ok(c) => c,
        Err(e) => panic!("bench geometry {lanes}x{width}: {e}"),
    };
    let inputs = TickInputs::clean(lanes);
    for _ in 0..10_000 {
        c.tick(&inputs);
        if c.state() == LinkState::Monitoring {
            break;
        }
    }
    c.drain_events();
    c
}
