#![no_main]
use libfuzzer_sys::fuzz_target;

use lanewarden_core::{LaneSample, LinkConfig, LinkController, LinkTimeouts, TickInputs};

// Layout: [lanes, width, min, flags] then 4-byte tick records
// [lane, error_hi, control, thermal].
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let lanes = usize::from(data[0] % 32) + 1;
    let width = usize::from(data[1]) % lanes + 1;
    let min = usize::from(data[2]) % width + 1;
    let flags = data[3];

    let config = LinkConfig {
        advanced_repair: flags & 1 != 0,
        coordination_required: flags & 2 != 0,
        prediction: flags & 4 != 0,
        adaptive_tuning: flags & 8 != 0,
        health_update_period: 4,
        tuning_period: 16,
        prediction_period: 3,
        prediction_threshold: 0x08,
        timeouts: LinkTimeouts {
            mapping_settle: 2,
            training: 2,
            training_timeout: 20,
            repair: 8,
            coordination: 4,
            verify_settle: 2,
            degrade_settle: 2,
            error_cooldown: 20,
        },
        ..LinkConfig::with_lanes(lanes, width, min)
    };
    let Ok(mut ctl) = LinkController::new(config) else {
        return;
    };
    let mut inputs = TickInputs::clean(lanes);

    for rec in data[4..].chunks_exact(4) {
        let lane = usize::from(rec[0]) % lanes;
        let control = rec[2];
        inputs.lanes[lane] = if control & 0x80 != 0 {
            LaneSample::hard_failure()
        } else {
            LaneSample {
                error_rate: u16::from(rec[1]) << 8,
                hard_error: false,
                power_draw: control << 1,
            }
        };
        inputs.thermal = rec[3];
        inputs.reversal_detected = control & 0x01 != 0;
        inputs.coordinator_ack = control & 0x02 != 0;
        inputs.enable = control & 0x7c != 0x7c;

        let summary = ctl.tick(&inputs);

        assert!(ctl.map().is_bijection());
        assert!(summary.current_width <= width);
        if summary.available_lanes >= min {
            assert!((min..=width).contains(&summary.target_width));
        } else {
            assert!(summary.degradation_needed);
        }
        let all_flags = ctl.all_lane_flags();
        for flags in &all_flags {
            assert_eq!(
                u8::from(flags.good) + u8::from(flags.marginal) + u8::from(flags.failed),
                1
            );
            assert!(!(flags.spare && flags.active));
        }
        if summary.available_lanes >= summary.current_width {
            assert_eq!(
                all_flags.iter().filter(|f| f.active).count(),
                summary.current_width
            );
        }
        assert_eq!(summary.status_word(), ctl.status_word());
    }
    let _ = ctl.drain_events();
});
