//! Calibration records, tuning constants and the two-slot history.

use std::time::Duration;

use chrono::{DateTime, Utc};
use mountcal_traits::{GuideParity, PierSide};

pub const DEFAULT_CALIBRATION_DURATION_MS: u32 = 750;
pub const DEFAULT_MAX_DURATION_MS: u32 = 2500;
pub const MAX_DURATION_MIN_MS: u32 = 50;
pub const MAX_DURATION_MAX_MS: u32 = 5000;

/// Distance (px) the star must move north before Dec backlash counts as cleared.
pub const DEC_BACKLASH_DISTANCE: f64 = 3.0;
pub const MAX_CALIBRATION_STEPS: u32 = 60;
pub const MAX_CALIBRATION_DISTANCE: f64 = 25.0;

pub const CAL_ALERT_MIN_STEPS: u32 = 4;
pub const ORTHOGONALITY_TOLERANCE_DEG: f64 = 12.5;
pub const DEC_RATE_DIFFERENCE: f64 = 0.20;
pub const AXIS_RATES_TOLERANCE: f64 = 0.20;
/// Above this |declination| cos(dec) is too unreliable for the rate check.
pub const DEC_COMP_LIMIT_RAD: f64 = std::f64::consts::FRAC_PI_3;

pub const LIMIT_REACHED_WARN_COUNT: u32 = 5;
pub const ALERT_THROTTLE: Duration = Duration::from_secs(30);

/// A return trip shorter than this fraction of its measurement phase did not
/// retrace it.
pub const RETRACE_MIN_FRACTION: f64 = 0.25;
/// Below this fraction the south return counts as no movement at all.
pub const RETRACE_NONE_FRACTION: f64 = 0.10;
pub const RETRACE_ANGLE_TOLERANCE_DEG: f64 = 30.0;
pub const EAST_RETRACE_ADVISORY: &str = "Advisory: Little or no east movement was measured, so guiding will probably be impaired. Check the guide cable and confirm basic operation of the mount with manual guide moves.";
pub const SOUTH_RETRACE_NONE_ADVISORY: &str = "Advisory: Calibration successful but little or no south movement was measured, so guiding will probably be impaired. This is usually caused by a faulty guide cable or very large Dec backlash.";
pub const SOUTH_RETRACE_LITTLE_ADVISORY: &str = "Advisory: Calibration successful but little south movement was measured, so guiding may be impaired. This is usually caused by very large Dec backlash or other problems with the mount mechanics.";
/// Reported RA or Dec change needed to decide the guide parity.
pub const PARITY_THRESHOLD_ARCSEC: f64 = 1.0;

pub const MAX_NUDGES: u32 = 3;
pub const NUDGE_TOLERANCE: f64 = 2.0;

/// y_rate of a calibration whose Dec axis was deliberately not measured.
pub const CALIBRATION_RATE_UNCALIBRATED: f64 = 123e4;
/// Stored guide speed when the mount could not report one.
pub const GUIDE_SPEED_UNKNOWN: f64 = -1.0;

/// Star travel required in each measurement phase: 5% of the sensor height,
/// capped at [`MAX_CALIBRATION_DISTANCE`].
pub fn calibration_distance(sensor_height_px: u32) -> f64 {
    (f64::from(sensor_height_px) * 0.05).min(MAX_CALIBRATION_DISTANCE)
}

/// Camera-to-mount mapping measured by a calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Displacement (px) per millisecond of RA pulse.
    pub x_rate: f64,
    /// Displacement (px) per millisecond of Dec pulse, or
    /// [`CALIBRATION_RATE_UNCALIBRATED`].
    pub y_rate: f64,
    /// Camera-frame direction of the RA axis, radians.
    pub x_angle: f64,
    /// Camera-frame direction of the Dec axis, radians.
    pub y_angle: f64,
    /// Radians.
    pub declination: Option<f64>,
    /// Degrees.
    pub rotator_angle: Option<f64>,
    pub binning: u16,
    pub pier_side: PierSide,
    pub ra_guide_parity: GuideParity,
    pub dec_guide_parity: GuideParity,
    pub is_valid: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            x_rate: 0.0,
            y_rate: CALIBRATION_RATE_UNCALIBRATED,
            x_angle: 0.0,
            y_angle: 0.0,
            declination: None,
            rotator_angle: None,
            binning: 1,
            pier_side: PierSide::Unknown,
            ra_guide_parity: GuideParity::Unknown,
            dec_guide_parity: GuideParity::Unknown,
            is_valid: false,
            timestamp: None,
        }
    }
}

impl Calibration {
    pub fn is_dec_calibrated(&self) -> bool {
        self.y_rate != CALIBRATION_RATE_UNCALIBRATED
    }
}

/// Sanity-check outcome; at most one per calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationIssue {
    #[default]
    None,
    TooFewSteps,
    NonOrthogonalAxes,
    DifferentFromPrevious,
    RateMismatch,
}

impl CalibrationIssue {
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::TooFewSteps => "Steps",
            Self::NonOrthogonalAxes => "Orthogonality",
            Self::DifferentFromPrevious => "Difference",
            Self::RateMismatch => "Rates",
        }
    }

    /// Category suffix of the per-profile suppression key.
    pub const fn suppress_category(self) -> &'static str {
        match self {
            Self::None => "Bogus",
            Self::TooFewSteps => "Steps",
            Self::NonOrthogonalAxes => "Angle",
            Self::DifferentFromPrevious => "Diff",
            Self::RateMismatch => "Rates",
        }
    }

    pub const fn alert_message(self) -> &'static str {
        match self {
            Self::None => "",
            Self::TooFewSteps => {
                "Calibration is based on very few steps, so accuracy is questionable"
            }
            Self::NonOrthogonalAxes => {
                "Calibration computed RA/Dec axis angles that are questionable"
            }
            Self::DifferentFromPrevious => {
                "This calibration is substantially different from the previous one - have you changed configurations?"
            }
            Self::RateMismatch => "The RA and Dec rates vary by an unexpected amount",
        }
    }
}

/// Context and diagnostics captured alongside a [`Calibration`].
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationDetails {
    pub focal_length: f64,
    /// Arc-seconds per pixel.
    pub image_scale: f64,
    pub ra_guide_speed: f64,
    pub dec_guide_speed: f64,
    /// Degrees.
    pub ortho_error: f64,
    pub orig_binning: u16,
    /// (dx, dy) of every RA frame relative to its phase start, including
    /// the return trip.
    pub ra_steps: Vec<(f64, f64)>,
    pub dec_steps: Vec<(f64, f64)>,
    /// Steps actually used for the RA fit.
    pub ra_step_count: u32,
    pub dec_step_count: u32,
    pub last_issue: CalibrationIssue,
    pub orig_timestamp: Option<DateTime<Utc>>,
    pub orig_pier_side: PierSide,
}

impl Default for CalibrationDetails {
    fn default() -> Self {
        Self {
            focal_length: 0.0,
            image_scale: 0.0,
            ra_guide_speed: GUIDE_SPEED_UNKNOWN,
            dec_guide_speed: GUIDE_SPEED_UNKNOWN,
            ortho_error: 0.0,
            orig_binning: 1,
            ra_steps: Vec::new(),
            dec_steps: Vec::new(),
            ra_step_count: 0,
            dec_step_count: 0,
            last_issue: CalibrationIssue::None,
            orig_timestamp: None,
            orig_pier_side: PierSide::Unknown,
        }
    }
}

impl CalibrationDetails {
    pub fn is_valid(&self) -> bool {
        self.ra_step_count > 0
    }
}

/// A calibration together with its details.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationRecord {
    pub calibration: Calibration,
    pub details: CalibrationDetails,
}

/// Current and previous calibration records.
///
/// The previous slot feeds the sanity comparison and the user's "restore
/// previous calibration" decision.
#[derive(Debug, Clone, Default)]
pub struct CalibrationHistory {
    current: CalibrationRecord,
    previous: Option<CalibrationRecord>,
}

impl CalibrationHistory {
    pub fn current(&self) -> &CalibrationRecord {
        &self.current
    }

    /// The superseded record, if it ever held a committed calibration.
    pub fn previous(&self) -> Option<&CalibrationRecord> {
        self.previous.as_ref().filter(|r| r.calibration.is_valid)
    }

    /// Install a freshly completed record; the old one moves to the previous slot.
    pub fn commit(&mut self, record: CalibrationRecord) {
        self.previous = Some(std::mem::replace(&mut self.current, record));
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.current.calibration = calibration;
    }

    pub fn set_details(&mut self, details: CalibrationDetails) {
        self.current.details = details;
    }

    /// Swap current and previous. Returns false when there is nothing valid
    /// to restore.
    pub fn restore_previous(&mut self) -> bool {
        match self.previous.as_mut() {
            Some(prev) if prev.calibration.is_valid => {
                std::mem::swap(&mut self.current, prev);
                true
            }
            _ => false,
        }
    }
}
