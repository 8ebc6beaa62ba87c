//! Plausibility checks for a freshly completed calibration.
//!
//! Checks run in a fixed order and the first match wins:
//! too few steps, non-orthogonal axes, RA/Dec rate mismatch, and finally a
//! comparison against the previous calibration.

use crate::calibration::{
    AXIS_RATES_TOLERANCE, CAL_ALERT_MIN_STEPS, CalibrationIssue, CalibrationRecord,
    DEC_COMP_LIMIT_RAD, DEC_RATE_DIFFERENCE, ORTHOGONALITY_TOLERANCE_DEG,
};
use crate::geometry::{norm_angle, orthogonality_error_deg};

/// Result of [`check_calibration`]. `detail` is empty when no issue was found.
#[derive(Debug, Clone, PartialEq)]
pub struct SanityReport {
    pub issue: CalibrationIssue,
    pub detail: String,
}

impl SanityReport {
    fn pass() -> Self {
        Self {
            issue: CalibrationIssue::None,
            detail: String::new(),
        }
    }

    fn flag(issue: CalibrationIssue, detail: String) -> Self {
        Self { issue, detail }
    }
}

pub fn check_calibration(
    new: &CalibrationRecord,
    previous: Option<&CalibrationRecord>,
) -> SanityReport {
    let cal = &new.calibration;
    let details = &new.details;
    let x_steps = details.ra_step_count;
    let y_steps = details.dec_step_count;

    // Dec guiding may be disabled, so zero Dec steps is fine
    if x_steps < CAL_ALERT_MIN_STEPS || (y_steps > 0 && y_steps < CAL_ALERT_MIN_STEPS) {
        return SanityReport::flag(
            CalibrationIssue::TooFewSteps,
            format!("Actual RA calibration steps = {x_steps}, Dec calibration steps = {y_steps}"),
        );
    }

    let non_ortho = orthogonality_error_deg(cal.x_angle, cal.y_angle);
    if non_ortho > ORTHOGONALITY_TOLERANCE_DEG {
        return SanityReport::flag(
            CalibrationIssue::NonOrthogonalAxes,
            format!("Non-orthogonality = {non_ortho:.3}"),
        );
    }

    if let Some(dec) = cal.declination
        && cal.is_dec_calibrated()
        && dec.abs() <= DEC_COMP_LIMIT_RAD
    {
        let expected = dec.cos();
        let speed_ratio = if details.ra_guide_speed > 0.0 {
            details.dec_guide_speed / details.ra_guide_speed
        } else {
            1.0
        };
        let actual = cal.x_rate * speed_ratio / cal.y_rate;
        if (expected - actual).abs() > AXIS_RATES_TOLERANCE {
            return SanityReport::flag(
                CalibrationIssue::RateMismatch,
                format!(
                    "Expected ratio at dec={:.1} is {expected:.3}, actual is {actual:.3}",
                    dec.to_degrees()
                ),
            );
        }
    }

    // Only compare against a previous result taken with a similar setup
    if let Some(prev) = previous
        && (prev.details.image_scale - details.image_scale).abs() < 0.1
        && norm_angle(prev.calibration.x_angle - cal.x_angle)
            .to_degrees()
            .abs()
            < 5.0
    {
        match (dec_rate(new), dec_rate(prev)) {
            (Some(new_y), Some(old_y)) => {
                let ratio = old_y / new_y;
                if (1.0 - ratio).abs() > DEC_RATE_DIFFERENCE {
                    return SanityReport::flag(
                        CalibrationIssue::DifferentFromPrevious,
                        format!("Current/previous Dec rate ratio is {ratio:.3}"),
                    );
                }
            }
            (None, Some(old_y)) => {
                return SanityReport::flag(
                    CalibrationIssue::DifferentFromPrevious,
                    format!("Dec was not calibrated, previous Dec rate was {old_y:.6}"),
                );
            }
            // No previous Dec rate to compare against
            (_, None) => {}
        }
    }

    SanityReport::pass()
}

fn dec_rate(r: &CalibrationRecord) -> Option<f64> {
    (r.calibration.is_dec_calibrated() && r.calibration.y_rate > 0.0)
        .then_some(r.calibration.y_rate)
}
