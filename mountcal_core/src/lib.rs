#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Guide calibration core for telescope mounts (hardware-agnostic).
//!
//! A calibration run moves the guide star along each mount axis with fixed
//! pulses and measures how the star moves on the camera. The result maps
//! camera-pixel displacements to mount RA/Dec displacements. All hardware goes
//! through the `mountcal_traits` seams.
//!
//! ## Architecture
//!
//! - **Geometry**: camera <-> mount frame transforms (`geometry`)
//! - **Calibration state machine**: `Mount::begin_calibration` / `Mount::step`
//!   (`calibrator`)
//! - **Limiter**: per-axis clamping and limit-reached alerts (`limiter`)
//! - **Sanity checks**: plausibility of a committed calibration (`sanity`)
//! - **Records**: `Calibration`, `CalibrationDetails` and the two-slot history
//!   (`calibration`)
//!
//! Angles are radians and rates are pixels per millisecond unless a field says
//! otherwise.

pub mod builder;
pub mod calibration;
pub mod calibrator;
pub mod config;
pub mod conversions;
pub mod error;
pub mod geometry;
pub mod hw_error;
pub mod limiter;
pub mod mocks;
pub mod mount;
pub mod notify;
pub mod sanity;
pub mod status;

pub use builder::{Missing, MountBuilder, Set};
pub use calibration::{
    Calibration, CalibrationDetails, CalibrationHistory, CalibrationIssue, CalibrationRecord,
};
pub use calibrator::CalibrationState;
pub use config::{CalibrationCfg, DecGuideMode, GuideLimits};
pub use error::{BuildError, CalibrationError, FailedPhase, Result};
pub use geometry::{camera_coords, mount_coords};
pub use limiter::{LimitAlertGate, LimitCounter, MoveResult};
pub use mount::{Mount, ReviewDecision, SanityReview};
pub use notify::{CalibrationEvents, CalibrationLog, CalibrationStep};
pub use sanity::{SanityReport, check_calibration};
pub use status::CalibrationStatus;
