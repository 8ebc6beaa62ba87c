//! Collaborator seams for the mount calibration core.
//!
//! Everything the calibration engine needs from the outside world (pulse
//! hardware, the move scheduler, pointing data, camera geometry, persisted
//! settings, the alert surface) is reached through the traits below. Errors at
//! these boundaries are boxed; `mountcal_core::hw_error` maps them to typed
//! errors.

use std::cell::RefCell;
use std::rc::Rc;

pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use types::{
    Alert, AlertAction, AlertKind, GuideAxis, GuideDirection, GuideParity, GuideRates, PierSide,
    Point, SkyCoords,
};

/// Result type used at trait boundaries.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Synchronous low-level pulse executor.
pub trait PulseGuider {
    fn is_connected(&self) -> bool;
    fn guide(&mut self, direction: GuideDirection, duration_ms: u32) -> HwResult<()>;
}

/// Hands a calibration pulse to the asynchronous move worker. Completion of
/// the move is followed by a new star measurement delivered to the mount.
pub trait MoveScheduler {
    fn schedule_move(&mut self, direction: GuideDirection, duration_ms: u32) -> HwResult<()>;
}

/// Mount pointing state, queried when a calibration is committed.
pub trait PointingSource {
    /// Declination in radians, `None` when the mount cannot report it.
    fn declination(&self) -> Option<f64>;
    fn pier_side(&self) -> PierSide;
    fn guide_rates(&self) -> Option<GuideRates>;
    /// Current RA/Dec, sampled around the measurement phases to find the
    /// guide parity.
    fn coordinates(&self) -> Option<SkyCoords> {
        None
    }
}

/// Camera and guider geometry.
pub trait ImagingContext {
    fn sensor_height_px(&self) -> u32;
    /// Arc-seconds per (binned) pixel.
    fn pixel_scale(&self) -> f64;
    fn focal_length_mm(&self) -> f64;
    fn binning(&self) -> u16;
    /// Largest star displacement the guider can track between two frames.
    fn max_move_px(&self) -> f64;
    /// Rotator position angle in degrees, `None` without a rotator.
    fn rotator_angle(&self) -> Option<f64>;
}

/// Per-profile settings persistence.
pub trait SettingsStore {
    fn profile_id(&self) -> i32;
    fn get_bool(&self, key: &str, default: bool) -> bool;
    fn set_bool(&mut self, key: &str, value: bool);
    fn get_int(&self, key: &str, default: i64) -> i64;
    fn set_int(&mut self, key: &str, value: i64);
}

/// User-facing alert bar.
pub trait AlertSurface {
    fn show(&mut self, alert: &Alert);
}

// Shared handles, so a caller can keep inspecting a collaborator it lent to
// the mount.

impl<T: PulseGuider + ?Sized> PulseGuider for Rc<RefCell<T>> {
    fn is_connected(&self) -> bool {
        self.borrow().is_connected()
    }
    fn guide(&mut self, direction: GuideDirection, duration_ms: u32) -> HwResult<()> {
        self.borrow_mut().guide(direction, duration_ms)
    }
}

impl<T: MoveScheduler + ?Sized> MoveScheduler for Rc<RefCell<T>> {
    fn schedule_move(&mut self, direction: GuideDirection, duration_ms: u32) -> HwResult<()> {
        self.borrow_mut().schedule_move(direction, duration_ms)
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for Rc<RefCell<T>> {
    fn profile_id(&self) -> i32 {
        self.borrow().profile_id()
    }
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.borrow().get_bool(key, default)
    }
    fn set_bool(&mut self, key: &str, value: bool) {
        self.borrow_mut().set_bool(key, value);
    }
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.borrow().get_int(key, default)
    }
    fn set_int(&mut self, key: &str, value: i64) {
        self.borrow_mut().set_int(key, value);
    }
}

impl<T: AlertSurface + ?Sized> AlertSurface for Rc<RefCell<T>> {
    fn show(&mut self, alert: &Alert) {
        self.borrow_mut().show(alert);
    }
}
