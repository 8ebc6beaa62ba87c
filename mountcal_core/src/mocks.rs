//! Fixed-value collaborators for tests, simulations and mounts without
//! live pointing data.

use mountcal_traits::{GuideRates, ImagingContext, PierSide, PointingSource, SkyCoords};

/// Pointing source that always reports the same values.
#[derive(Debug, Clone, Default)]
pub struct FixedPointing {
    /// Radians.
    pub declination: Option<f64>,
    pub pier_side: PierSide,
    pub rates: Option<GuideRates>,
    pub coordinates: Option<SkyCoords>,
}

impl PointingSource for FixedPointing {
    fn declination(&self) -> Option<f64> {
        self.declination
    }
    fn pier_side(&self) -> PierSide {
        self.pier_side
    }
    fn guide_rates(&self) -> Option<GuideRates> {
        self.rates
    }
    fn coordinates(&self) -> Option<SkyCoords> {
        self.coordinates
    }
}

/// Camera geometry that never changes.
#[derive(Debug, Clone)]
pub struct FixedImaging {
    pub sensor_height_px: u32,
    pub pixel_scale: f64,
    pub focal_length_mm: f64,
    pub binning: u16,
    pub max_move_px: f64,
    pub rotator_angle: Option<f64>,
}

impl Default for FixedImaging {
    fn default() -> Self {
        Self {
            sensor_height_px: 1024,
            pixel_scale: 2.0,
            focal_length_mm: 400.0,
            binning: 1,
            max_move_px: 7.0,
            rotator_angle: None,
        }
    }
}

impl ImagingContext for FixedImaging {
    fn sensor_height_px(&self) -> u32 {
        self.sensor_height_px
    }
    fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }
    fn focal_length_mm(&self) -> f64 {
        self.focal_length_mm
    }
    fn binning(&self) -> u16 {
        self.binning
    }
    fn max_move_px(&self) -> f64 {
        self.max_move_px
    }
    fn rotator_angle(&self) -> Option<f64> {
        self.rotator_angle
    }
}
