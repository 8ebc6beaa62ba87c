use mountcal_hardware::{MoveQueue, SimulatedSky, SkyParams};
use mountcal_traits::{GuideDirection, MoveScheduler};
use rstest::rstest;

#[test]
fn queue_is_fifo_and_shared_between_clones() {
    let q = MoveQueue::new();
    let mut producer = q.clone();
    producer.schedule_move(GuideDirection::West, 750).unwrap();
    producer.schedule_move(GuideDirection::East, 1200).unwrap();
    assert_eq!(q.len(), 2);
    assert_eq!(q.pop(), Some((GuideDirection::West, 750)));
    assert_eq!(q.pop(), Some((GuideDirection::East, 1200)));
    assert!(q.is_empty());
    assert_eq!(q.pop(), None);
}

#[rstest]
#[case(GuideDirection::West, 1.0, 0.0)]
#[case(GuideDirection::East, -1.0, 0.0)]
#[case(GuideDirection::North, 0.0, 1.0)]
#[case(GuideDirection::South, 0.0, -1.0)]
fn pulse_direction_follows_axis(#[case] dir: GuideDirection, #[case] ex: f64, #[case] ey: f64) {
    use mountcal_traits::PulseGuider;
    let sky = SimulatedSky::new(SkyParams {
        ra_angle: 0.0,
        dec_angle: std::f64::consts::FRAC_PI_2,
        ra_rate: 0.01,
        dec_rate: 0.01,
        ..SkyParams::default()
    });
    let before = sky.star();
    sky.guider().guide(dir, 100).unwrap();
    let after = sky.star();
    assert!((after.x - before.x - ex).abs() < 1e-9);
    assert!((after.y - before.y - ey).abs() < 1e-9);
}
