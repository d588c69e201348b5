#![no_main]
use libfuzzer_sys::fuzz_target;

use lanewarden_core::{LinkConfig, LinkController, PriorityMode, SignalingMode, TickInputs};

// Arbitrary geometry, limits and mode strings must either be rejected by
// validation or produce a controller that ticks without panicking.
fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let word = |i: usize| usize::from(u16::from_le_bytes([data[i], data[i + 1]]));
    let text = String::from_utf8_lossy(&data[12..]);
    let config = LinkConfig {
        num_lanes: word(0),
        requested_width: word(2),
        min_width: word(4),
        base_threshold: u16::from_le_bytes([data[6], data[7]]),
        thermal_warm: data[8],
        thermal_elevated: data[9],
        thermal_critical: data[10],
        power_nominal: data[11],
        priority: PriorityMode::from_str_loose(&text),
        signaling: SignalingMode::from_str_loose(&text),
        ..LinkConfig::default()
    };
    if config.validate().is_err() {
        assert!(LinkController::new(config).is_err());
        return;
    }
    let Ok(mut ctl) = LinkController::new(config) else {
        panic!("validated config rejected");
    };
    let inputs = TickInputs::clean(config.num_lanes / 2);
    for _ in 0..32 {
        ctl.tick(&inputs);
    }
});
