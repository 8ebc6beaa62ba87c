#![no_main]
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mountcal_traits::Point;

#[derive(Debug, Arbitrary)]
struct Input {
    dx: f64,
    dy: f64,
    x_angle: f64,
    y_angle: f64,
}

fuzz_target!(|input: Input| {
    let all_finite = [input.dx, input.dy, input.x_angle, input.y_angle]
        .iter()
        .all(|v| v.is_finite() && v.abs() < 1e6);
    if !all_finite {
        return;
    }
    let camera = Point::new(input.dx, input.dy);
    let mount = mountcal_core::mount_coords(camera, input.x_angle, input.y_angle);
    // RA component never exceeds the vector length
    assert!(mount.x.abs() <= camera.length() * (1.0 + 1e-9) + 1e-9);
    let _ = mountcal_core::camera_coords(mount, input.x_angle, input.y_angle);
});
