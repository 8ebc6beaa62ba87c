mod common;

use approx::assert_abs_diff_eq;
use common::Rig;
use mountcal_core::calibration::{
    CALIBRATION_RATE_UNCALIBRATED, EAST_RETRACE_ADVISORY, MAX_CALIBRATION_STEPS,
    SOUTH_RETRACE_LITTLE_ADVISORY, SOUTH_RETRACE_NONE_ADVISORY,
};
use mountcal_core::geometry::orthogonality_error_deg;
use mountcal_core::{
    CalibrationError, CalibrationState, CalibrationStatus, DecGuideMode, FailedPhase, GuideLimits,
};
use mountcal_hardware::SkyParams;
use mountcal_hardware::error::HwError;
use mountcal_traits::{
    AlertKind, GuideDirection, GuideParity, HwResult, MoveScheduler, Point, SettingsStore,
    SkyCoords,
};
use rstest::rstest;

fn downcast(err: &eyre::Report) -> &CalibrationError {
    err.downcast_ref::<CalibrationError>()
        .unwrap_or_else(|| panic!("expected CalibrationError, got {err:?}"))
}

#[test]
fn full_calibration_recovers_simulated_axes() {
    let mut rig = Rig::new(SkyParams::default());
    assert_eq!(rig.run(500).unwrap(), CalibrationStatus::Complete);

    let m = &rig.mount;
    assert_eq!(m.calibration_state(), CalibrationState::Complete);
    assert!(m.is_calibrated());
    assert!(!m.is_calibrating());

    let cal = m.calibration();
    assert_abs_diff_eq!(cal.x_angle.to_degrees(), 15.0, epsilon = 1e-6);
    assert_abs_diff_eq!(cal.x_rate, 0.0047, epsilon = 1e-9);
    // Dec angle is measured back towards the start, opposite of North travel
    assert_abs_diff_eq!(cal.y_angle.to_degrees(), -75.0, epsilon = 1e-6);
    assert_abs_diff_eq!(cal.y_rate, 0.005, epsilon = 1e-9);
    assert!(cal.is_valid);
    assert!(cal.timestamp.is_some());

    let d = m.calibration_details();
    assert_eq!(d.ra_step_count, 8);
    assert_eq!(d.dec_step_count, 7);
    assert_abs_diff_eq!(d.ortho_error, 0.0, epsilon = 1e-6);
    assert_eq!(d.ra_guide_speed, -1.0);
    assert!(d.is_valid());
    assert!(m.pending_review().is_none());

    assert_eq!(rig.events.count("event:complete"), 1);
    assert_eq!(rig.events.count("log:complete"), 1);
    assert_eq!(rig.events.count("log:axis:"), 2);
    assert!(rig.alerts.borrow().alerts.is_empty());
    assert!(rig.sky.star().distance_to(&Point::new(400.0, 300.0)) < 1e-6);
}

#[test]
fn backlash_is_cleared_and_star_nudged_home() {
    let mut rig = Rig::new(SkyParams {
        dec_backlash_ms: 1500,
        ..SkyParams::default()
    });
    assert_eq!(rig.run(500).unwrap(), CalibrationStatus::Complete);

    // Dec rate is measured after backlash is taken up
    assert_abs_diff_eq!(rig.mount.calibration().y_rate, 0.005, epsilon = 1e-9);
    let pulses = rig.sky.pulses();
    let last_south = pulses
        .iter()
        .rev()
        .take_while(|(d, _)| *d == GuideDirection::South)
        .count();
    assert!(last_south >= 4, "expected nudges after recenter: {pulses:?}");
    assert!(rig.sky.star().distance_to(&Point::new(400.0, 300.0)) <= 2.0);
}

#[rstest]
#[case(0.002, 17)]
#[case(0.0047, 8)]
#[case(0.01, 4)]
fn west_rate_is_distance_over_pulse_time(#[case] rate: f64, #[case] steps: u32) {
    let mut rig = Rig::new(SkyParams {
        ra_rate: rate,
        ..SkyParams::default()
    });
    rig.run(500).unwrap();
    let d = rig.mount.calibration_details();
    assert_eq!(d.ra_step_count, steps);
    let dist = rate * 750.0 * f64::from(steps);
    assert_abs_diff_eq!(
        rig.mount.calibration().x_rate,
        dist / (f64::from(steps) * 750.0),
        epsilon = 1e-12
    );
}

#[test]
fn stuck_star_fails_after_step_cap_and_notifies_once() {
    let mut rig = Rig::new(SkyParams {
        ra_rate: 0.0,
        ..SkyParams::default()
    });
    let err = rig.run(500).unwrap_err();
    assert_eq!(
        downcast(&err),
        &CalibrationError::PhaseFailed(FailedPhase::Ra)
    );

    assert_eq!(rig.mount.calibration_state(), CalibrationState::Cleared);
    assert!(!rig.mount.is_calibrated());
    let west = rig
        .sky
        .pulses()
        .iter()
        .filter(|(d, _)| *d == GuideDirection::West)
        .count();
    assert_eq!(west, MAX_CALIBRATION_STEPS as usize + 1);

    let alerts = rig.alerts.borrow();
    assert_eq!(alerts.count(AlertKind::CalibrationFailed), 1);
    assert_eq!(
        alerts.alerts[0].message,
        "RA calibration failed: star did not move enough"
    );
    assert_eq!(rig.events.count("event:failed"), 1);
    assert_eq!(rig.events.count("log:failed"), 1);
}

#[test]
fn stuck_dec_fails_in_backlash_phase() {
    let mut rig = Rig::new(SkyParams {
        dec_rate: 0.0,
        ..SkyParams::default()
    });
    let err = rig.run(500).unwrap_err();
    assert_eq!(
        downcast(&err),
        &CalibrationError::PhaseFailed(FailedPhase::Backlash)
    );
    assert_eq!(rig.events.count("event:failed:Backlash"), 1);
}

#[test]
fn dec_that_stalls_after_backlash_fails_in_north_phase() {
    // One North pulse clears the backlash threshold, then the axis jams
    let mut rig = Rig::new(SkyParams {
        jam_after: Some((GuideDirection::North, 750)),
        ..SkyParams::default()
    });
    let err = rig.run(500).unwrap_err();
    assert_eq!(
        downcast(&err),
        &CalibrationError::PhaseFailed(FailedPhase::Dec)
    );

    assert_eq!(rig.mount.calibration_state(), CalibrationState::Cleared);
    assert!(!rig.mount.is_calibrated());
    let north = rig
        .sky
        .pulses()
        .iter()
        .filter(|(d, _)| *d == GuideDirection::North)
        .count();
    // the backlash pulse plus the capped north steps
    assert_eq!(north, MAX_CALIBRATION_STEPS as usize + 2);

    let alerts = rig.alerts.borrow();
    assert_eq!(alerts.count(AlertKind::CalibrationFailed), 1);
    assert_eq!(
        alerts.alerts[0].message,
        "Dec calibration failed: star did not move enough"
    );
    assert_eq!(rig.events.count("event:failed"), 1);
    assert_eq!(rig.events.count("log:failed"), 1);
    assert_eq!(rig.events.count("log:axis:RA"), 1);
    assert_eq!(rig.events.count("log:axis:Dec"), 0);
}

const START_COORDS: SkyCoords = SkyCoords {
    ra_hours: 6.5,
    dec_deg: 20.0,
};

#[rstest]
#[case::normal(false, false, GuideParity::Even, GuideParity::Even)]
#[case::ra_reversed(true, false, GuideParity::Odd, GuideParity::Even)]
#[case::dec_reversed(false, true, GuideParity::Even, GuideParity::Odd)]
fn parity_follows_reported_coordinates(
    #[case] ra_reversed: bool,
    #[case] dec_reversed: bool,
    #[case] ra: GuideParity,
    #[case] dec: GuideParity,
) {
    let mut rig = Rig::new(SkyParams {
        coordinates: Some(START_COORDS),
        ra_reversed,
        dec_reversed,
        ..SkyParams::default()
    });
    assert_eq!(rig.run(500).unwrap(), CalibrationStatus::Complete);
    let cal = rig.mount.calibration();
    assert_eq!(cal.ra_guide_parity, ra);
    assert_eq!(cal.dec_guide_parity, dec);
    assert_eq!(rig.events.count(&format!("log:axis:RA:{}", ra.name())), 1);
    assert_eq!(rig.events.count(&format!("log:axis:Dec:{}", dec.name())), 1);
}

#[test]
fn parity_across_zero_hours_of_ra() {
    let mut rig = Rig::new(SkyParams {
        // West pulses carry RA below 0h and wrap it to 24h
        coordinates: Some(SkyCoords {
            ra_hours: 0.0,
            dec_deg: 0.0,
        }),
        ..SkyParams::default()
    });
    rig.run(500).unwrap();
    assert_eq!(rig.mount.calibration().ra_guide_parity, GuideParity::Even);
}

#[test]
fn parity_unknown_without_coordinates() {
    let mut rig = Rig::new(SkyParams::default());
    rig.run(500).unwrap();
    let cal = rig.mount.calibration();
    assert_eq!(cal.ra_guide_parity, GuideParity::Unknown);
    assert_eq!(cal.dec_guide_parity, GuideParity::Unknown);
}

#[test]
fn dec_parity_unknown_when_dec_is_skipped() {
    let mut rig = Rig::with(
        SkyParams {
            coordinates: Some(START_COORDS),
            ..SkyParams::default()
        },
        |b| {
            b.with_limits(GuideLimits {
                dec_mode: DecGuideMode::Off,
                ..GuideLimits::default()
            })
        },
    );
    rig.run(500).unwrap();
    let cal = rig.mount.calibration();
    assert_eq!(cal.ra_guide_parity, GuideParity::Even);
    assert_eq!(cal.dec_guide_parity, GuideParity::Unknown);
}

#[test]
fn east_pulses_that_do_not_move_raise_an_advisory() {
    let mut rig = Rig::new(SkyParams {
        jam_after: Some((GuideDirection::East, 0)),
        ..SkyParams::default()
    });
    assert_eq!(rig.run(500).unwrap(), CalibrationStatus::Complete);

    let alerts = rig.alerts.borrow();
    assert_eq!(alerts.count(AlertKind::MovementAdvisory), 1);
    let a = &alerts.alerts[0];
    assert_eq!(a.message, EAST_RETRACE_ADVISORY);
    assert!(a.suppress_key.is_none());
}

#[rstest]
#[case::little(4500, SOUTH_RETRACE_LITTLE_ADVISORY)]
#[case::little_or_none(5000, SOUTH_RETRACE_NONE_ADVISORY)]
fn dec_backlash_eating_the_south_return_raises_an_advisory(
    #[case] backlash_ms: u32,
    #[case] message: &str,
) {
    let mut rig = Rig::new(SkyParams {
        dec_backlash_ms: backlash_ms,
        ..SkyParams::default()
    });
    assert_eq!(rig.run(500).unwrap(), CalibrationStatus::Complete);

    let alerts = rig.alerts.borrow();
    assert_eq!(alerts.count(AlertKind::MovementAdvisory), 1);
    let a = &alerts.alerts[0];
    assert_eq!(a.message, message);
    assert_eq!(
        a.suppress_key.as_deref(),
        Some("/Confirm/0/DecBacklashWarningEnabled")
    );
}

#[test]
fn suppressed_south_advisory_is_not_shown() {
    let mut rig = Rig::new(SkyParams {
        dec_backlash_ms: 5000,
        ..SkyParams::default()
    });
    rig.mount.suppress_dec_backlash_alert();
    let enabled = rig.settings.borrow().get_bool("/Confirm/0/DecBacklashWarningEnabled", true);
    assert!(!enabled);
    assert_eq!(rig.run(500).unwrap(), CalibrationStatus::Complete);
    assert_eq!(rig.alerts.borrow().count(AlertKind::MovementAdvisory), 0);
}

#[test]
fn one_movement_advisory_per_run() {
    let mut rig = Rig::new(SkyParams {
        jam_after: Some((GuideDirection::East, 0)),
        dec_backlash_ms: 5000,
        ..SkyParams::default()
    });
    rig.run(500).unwrap();
    let alerts = rig.alerts.borrow();
    assert_eq!(alerts.count(AlertKind::MovementAdvisory), 1);
    assert_eq!(alerts.alerts[0].message, EAST_RETRACE_ADVISORY);
}

#[test]
fn normal_return_trips_raise_no_advisory() {
    let mut rig = Rig::new(SkyParams {
        dec_backlash_ms: 1500,
        jitter_px: 0.3,
        ..SkyParams::default()
    });
    rig.run(500).unwrap();
    assert_eq!(rig.alerts.borrow().count(AlertKind::MovementAdvisory), 0);
}

#[test]
fn dec_off_completes_after_ra_without_dec_moves() {
    let mut rig = Rig::with(SkyParams::default(), |b| {
        b.with_limits(GuideLimits {
            dec_mode: DecGuideMode::Off,
            ..GuideLimits::default()
        })
    });
    assert_eq!(rig.run(500).unwrap(), CalibrationStatus::Complete);

    let cal = rig.mount.calibration();
    assert_eq!(cal.y_rate, CALIBRATION_RATE_UNCALIBRATED);
    assert!(!cal.is_dec_calibrated());
    assert_abs_diff_eq!(orthogonality_error_deg(cal.x_angle, cal.y_angle), 0.0, epsilon = 1e-9);
    assert_eq!(rig.mount.calibration_details().dec_step_count, 0);
    assert!(rig.mount.is_calibrated());
    assert!(
        rig.sky
            .pulses()
            .iter()
            .all(|(d, _)| matches!(d, GuideDirection::East | GuideDirection::West))
    );

    // Turning Dec guiding back on needs a Dec calibration
    rig.mount.set_dec_guide_mode(DecGuideMode::Auto);
    assert!(!rig.mount.is_calibrated());
}

#[test]
fn assume_orthogonal_snaps_dec_axis() {
    let mut rig = Rig::with(
        SkyParams {
            // 8 degrees off perpendicular
            dec_angle: 113f64.to_radians(),
            ..SkyParams::default()
        },
        |b| {
            b.with_calibration_cfg(mountcal_core::CalibrationCfg {
                assume_orthogonal: true,
                ..Default::default()
            })
        },
    );
    rig.run(500).unwrap();
    let cal = rig.mount.calibration();
    assert_abs_diff_eq!(cal.y_angle.to_degrees(), -75.0, epsilon = 1e-6);
    assert_abs_diff_eq!(orthogonality_error_deg(cal.x_angle, cal.y_angle), 0.0, epsilon = 1e-6);
    // projected distance is shorter than the true travel
    assert!(cal.y_rate < 0.005);
}

#[test]
fn step_while_cleared_is_rejected() {
    let mut rig = Rig::new(SkyParams::default());
    let err = rig.mount.step(Point::new(1.0, 1.0)).unwrap_err();
    assert_eq!(downcast(&err), &CalibrationError::NotCalibrating);
    assert_eq!(rig.mount.calibration_state(), CalibrationState::Cleared);
}

#[test]
fn step_after_complete_is_a_noop() {
    let mut rig = Rig::new(SkyParams::default());
    rig.run(500).unwrap();
    let pulses = rig.sky.pulses().len();
    for _ in 0..3 {
        assert_eq!(
            rig.mount.step(Point::new(10.0, 10.0)).unwrap(),
            CalibrationStatus::Complete
        );
    }
    assert!(rig.queue.is_empty());
    assert_eq!(rig.sky.pulses().len(), pulses);
    assert_eq!(rig.events.count("event:complete"), 1);
}

#[test]
fn rejected_begin_keeps_existing_calibration() {
    let mut rig = Rig::new(SkyParams::default());
    rig.run(500).unwrap();

    let err = rig.mount.begin_calibration(Point::INVALID).unwrap_err();
    assert_eq!(downcast(&err), &CalibrationError::InvalidLocation);
    assert!(rig.mount.is_calibrated());
    assert_eq!(rig.mount.calibration_state(), CalibrationState::Complete);

    rig.sky.set_connected(false);
    let err = rig.mount.begin_calibration(Point::new(1.0, 2.0)).unwrap_err();
    assert_eq!(downcast(&err), &CalibrationError::NotConnected);
    assert_eq!(rig.mount.calibration_state(), CalibrationState::Complete);
}

#[test]
fn invalid_location_mid_run_clears() {
    let mut rig = Rig::new(SkyParams::default());
    rig.mount.begin_calibration(Point::new(400.0, 300.0)).unwrap();
    rig.mount.step(Point::new(400.0, 300.0)).unwrap();
    assert_eq!(rig.mount.calibration_state(), CalibrationState::GoWest);

    let err = rig.mount.step(Point::INVALID).unwrap_err();
    assert_eq!(downcast(&err), &CalibrationError::InvalidLocation);
    assert_eq!(rig.mount.calibration_state(), CalibrationState::Cleared);
    assert!(!rig.mount.is_calibrating());
}

struct RefusingScheduler;

impl MoveScheduler for RefusingScheduler {
    fn schedule_move(&mut self, _direction: GuideDirection, _duration_ms: u32) -> HwResult<()> {
        Err(Box::new(HwError::Disconnected))
    }
}

#[test]
fn scheduler_failure_maps_to_typed_error_and_clears() {
    let sky = mountcal_hardware::SimulatedSky::new(SkyParams::default());
    let mut mount = mountcal_core::Mount::builder()
        .with_guider(sky.guider())
        .with_scheduler(RefusingScheduler)
        .build()
        .unwrap();
    mount.begin_calibration(Point::new(5.0, 5.0)).unwrap();
    let err = mount.step(Point::new(5.0, 5.0)).unwrap_err();
    assert_eq!(downcast(&err), &CalibrationError::NotConnected);
    assert!(format!("{err:#}").contains("scheduling West calibration move"));
    assert_eq!(mount.calibration_state(), CalibrationState::Cleared);
}

#[test]
fn recalibration_keeps_previous_for_comparison() {
    let mut rig = Rig::new(SkyParams::default());
    rig.run(500).unwrap();
    let first = rig.mount.calibration().clone();
    rig.run(500).unwrap();

    let prev = rig.mount.previous_calibration().expect("previous kept");
    assert_eq!(prev.calibration, first);
    assert!(rig.mount.pending_review().is_none());
}

#[test]
fn step_vectors_are_relative_to_phase_start() {
    let mut rig = Rig::new(SkyParams {
        ra_angle: 0.0,
        ra_rate: 0.01,
        ..SkyParams::default()
    });
    rig.run(500).unwrap();
    let steps = &rig.mount.calibration_details().ra_steps;
    assert_eq!(steps[0], (0.0, 0.0));
    assert_abs_diff_eq!(steps[1].0, 7.5, epsilon = 1e-9);
    assert_abs_diff_eq!(steps[4].0, 30.0, epsilon = 1e-9);
    assert!(steps.len() > 5, "return trip frames recorded too");
}
