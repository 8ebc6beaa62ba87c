//! Camera-frame / mount-frame coordinate transforms.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use mountcal_traits::Point;

/// Map an angle into (-π, π].
pub fn norm_angle(a: f64) -> f64 {
    let r = a.rem_euclid(TAU);
    if r > PI { r - TAU } else { r }
}

/// Camera displacement to mount (RA, Dec) displacement, given the fitted
/// camera-frame axis angles.
///
/// The Dec reference is rotated by the axis non-orthogonality, so vectors
/// along the fitted axes map exactly onto the mount axes only when the two
/// angles are 90° apart (either handedness).
pub fn mount_coords(camera: Point, x_angle: f64, y_angle: f64) -> Point {
    let hyp = camera.length();
    let theta = camera.angle();
    let y_angle_error = norm_angle(x_angle - y_angle + FRAC_PI_2);
    Point::new(
        hyp * (theta - x_angle).cos(),
        hyp * (theta - (x_angle + y_angle_error)).sin(),
    )
}

/// Inverse of [`mount_coords`]: mount (RA, Dec) displacement to camera pixels.
///
/// A Dec axis more than 90° away from `x_angle + 90°` means the image is
/// mirrored, so the Dec sign flips.
pub fn camera_coords(mount: Point, x_angle: f64, y_angle: f64) -> Point {
    let hyp = mount.length();
    let mut theta = mount.angle();
    let y_angle_error = norm_angle(x_angle - y_angle + FRAC_PI_2);
    if y_angle_error.abs() > FRAC_PI_2 {
        theta = -theta;
    }
    let a = theta + x_angle;
    Point::new(hyp * a.cos(), hyp * a.sin())
}

/// Degrees by which the RA/Dec angle difference deviates from 90°.
pub fn orthogonality_error_deg(x_angle: f64, y_angle: f64) -> f64 {
    (norm_angle(x_angle - y_angle).abs() - FRAC_PI_2)
        .abs()
        .to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn norm_angle_range() {
        assert_abs_diff_eq!(norm_angle(PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_angle(-PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_angle(3.0 * PI / 2.0), -FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_angle(-7.0 * TAU + 0.25), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn ortho_error_of_perpendicular_axes_is_zero() {
        assert_abs_diff_eq!(orthogonality_error_deg(0.3, 0.3 + FRAC_PI_2), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(orthogonality_error_deg(0.3, 0.3 - FRAC_PI_2), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            orthogonality_error_deg(0.0, 70f64.to_radians()),
            20.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn axis_aligned_camera_maps_identity() {
        let m = mount_coords(Point::new(3.0, 4.0), 0.0, FRAC_PI_2);
        assert_abs_diff_eq!(m.x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.y, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn mirrored_optics_flip_dec() {
        let m = mount_coords(Point::new(3.0, 4.0), 0.0, -FRAC_PI_2);
        assert_abs_diff_eq!(m.x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.y, -4.0, epsilon = 1e-12);
        let back = camera_coords(m, 0.0, -FRAC_PI_2);
        assert_abs_diff_eq!(back.x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(back.y, 4.0, epsilon = 1e-12);
    }
}
