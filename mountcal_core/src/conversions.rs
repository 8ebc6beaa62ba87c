//! `From` implementations bridging `mountcal_config` types to `mountcal_core` types.

use mountcal_traits::{GuideRates, PierSide, SkyCoords};

use crate::config::{CalibrationCfg, DecGuideMode, GuideLimits};
use crate::mocks::{FixedImaging, FixedPointing};

// ── DecGuideMode ─────────────────────────────────────────────────────────────

impl From<mountcal_config::DecMode> for DecGuideMode {
    fn from(m: mountcal_config::DecMode) -> Self {
        match m {
            mountcal_config::DecMode::Off => Self::Off,
            mountcal_config::DecMode::Auto => Self::Auto,
            mountcal_config::DecMode::North => Self::North,
            mountcal_config::DecMode::South => Self::South,
        }
    }
}

impl From<DecGuideMode> for mountcal_config::DecMode {
    fn from(m: DecGuideMode) -> Self {
        match m {
            DecGuideMode::Off => Self::Off,
            DecGuideMode::Auto => Self::Auto,
            DecGuideMode::North => Self::North,
            DecGuideMode::South => Self::South,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&mountcal_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &mountcal_config::CalibrationCfg) -> Self {
        Self {
            step_ms: c.step_ms,
            assume_orthogonal: c.assume_orthogonal,
            fast_recenter: c.fast_recenter,
        }
    }
}

// ── GuideLimits ──────────────────────────────────────────────────────────────

impl From<&mountcal_config::GuideCfg> for GuideLimits {
    fn from(c: &mountcal_config::GuideCfg) -> Self {
        Self {
            max_ra_ms: c.max_ra_ms,
            max_dec_ms: c.max_dec_ms,
            dec_mode: c.dec_mode.into(),
            guiding_enabled: c.enabled,
        }
    }
}

// ── Collaborators ────────────────────────────────────────────────────────────

impl From<&mountcal_config::PointingCfg> for FixedPointing {
    fn from(c: &mountcal_config::PointingCfg) -> Self {
        let rates = match (c.ra_guide_speed, c.dec_guide_speed) {
            (Some(ra), Some(dec)) => Some(GuideRates { ra, dec }),
            _ => None,
        };
        Self {
            declination: c.declination_deg.map(f64::to_radians),
            pier_side: match c.pier_side {
                mountcal_config::PierSideCfg::East => PierSide::East,
                mountcal_config::PierSideCfg::West => PierSide::West,
                mountcal_config::PierSideCfg::Unknown => PierSide::Unknown,
            },
            rates,
            coordinates: c.ra_hours.zip(c.declination_deg).map(|(ra_hours, dec_deg)| SkyCoords {
                ra_hours,
                dec_deg,
            }),
        }
    }
}

impl From<&mountcal_config::CameraCfg> for FixedImaging {
    fn from(c: &mountcal_config::CameraCfg) -> Self {
        Self {
            sensor_height_px: c.sensor_height_px,
            pixel_scale: c.pixel_scale(),
            focal_length_mm: c.focal_length_mm,
            binning: c.binning,
            max_move_px: c.max_move_px,
            rotator_angle: c.rotator_angle_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointing_requires_both_guide_speeds() {
        let cfg = mountcal_config::load_toml(
            "[pointing]\ndeclination_deg = 30.0\nra_guide_speed = 0.5\npier_side = \"east\"",
        )
        .unwrap();
        let p = FixedPointing::from(&cfg.pointing);
        assert!(p.rates.is_none());
        assert_eq!(p.pier_side, PierSide::East);
        let dec = p.declination.unwrap();
        assert!((dec - 30f64.to_radians()).abs() < 1e-12);
        assert!(p.coordinates.is_none(), "no RA configured");
    }

    #[test]
    fn pointing_coordinates_need_ra_and_dec() {
        let cfg =
            mountcal_config::load_toml("[pointing]
ra_hours = 6.5
declination_deg = -12.0")
                .unwrap();
        let c = FixedPointing::from(&cfg.pointing).coordinates.unwrap();
        assert_eq!(c.ra_hours, 6.5);
        assert_eq!(c.dec_deg, -12.0);
    }

    #[test]
    fn guide_section_maps_dec_mode() {
        let cfg = mountcal_config::load_toml("[guide]\ndec_mode = \"south\"\nenabled = false")
            .unwrap();
        let l = GuideLimits::from(&cfg.guide);
        assert_eq!(l.dec_mode, DecGuideMode::South);
        assert!(!l.guiding_enabled);
    }
}
