//! Runtime configuration for the calibration engine.
//!
//! These are separate from the TOML-deserialized config in `mountcal_config`;
//! see `conversions` for the mapping.

use mountcal_traits::GuideDirection;

use crate::calibration::{DEFAULT_CALIBRATION_DURATION_MS, DEFAULT_MAX_DURATION_MS};

/// Which Dec directions normal guide moves may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecGuideMode {
    Off,
    #[default]
    Auto,
    North,
    South,
}

impl DecGuideMode {
    /// Whether a normal move in `direction` is allowed under this mode.
    /// RA directions are always allowed.
    pub const fn allows(self, direction: GuideDirection) -> bool {
        match (self, direction) {
            (_, GuideDirection::East | GuideDirection::West) => true,
            (Self::Off, _) => false,
            (Self::North, GuideDirection::South) | (Self::South, GuideDirection::North) => false,
            _ => true,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Auto => "Auto",
            Self::North => "North",
            Self::South => "South",
        }
    }
}

/// Calibration run parameters.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Duration of one calibration pulse (ms). Must be > 0.
    pub step_ms: u32,
    /// Snap the Dec axis to the perpendicular of the RA axis closest to the
    /// measured direction.
    pub assume_orthogonal: bool,
    /// Recenter with the largest pulses that keep the star in the search region.
    pub fast_recenter: bool,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            step_ms: DEFAULT_CALIBRATION_DURATION_MS,
            assume_orthogonal: false,
            fast_recenter: true,
        }
    }
}

/// Limits applied to normal guide moves.
#[derive(Debug, Clone)]
pub struct GuideLimits {
    pub max_ra_ms: u32,
    pub max_dec_ms: u32,
    pub dec_mode: DecGuideMode,
    pub guiding_enabled: bool,
}

impl Default for GuideLimits {
    fn default() -> Self {
        Self {
            max_ra_ms: DEFAULT_MAX_DURATION_MS,
            max_dec_ms: DEFAULT_MAX_DURATION_MS,
            dec_mode: DecGuideMode::Auto,
            guiding_enabled: true,
        }
    }
}
