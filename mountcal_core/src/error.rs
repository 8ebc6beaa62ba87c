use mountcal_traits::GuideDirection;
use thiserror::Error;

/// Measurement phases that can run out of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedPhase {
    Ra,
    Backlash,
    Dec,
}

impl FailedPhase {
    /// Fixed user-facing message for the failure.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Ra => "RA calibration failed: star did not move enough",
            Self::Backlash => "Backlash clearing failed: star did not move enough",
            Self::Dec => "Dec calibration failed: star did not move enough",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("mount is not connected")]
    NotConnected,
    #[error("star location is invalid")]
    InvalidLocation,
    #[error("no calibration in progress")]
    NotCalibrating,
    #[error("{}", .0.message())]
    PhaseFailed(FailedPhase),
    #[error("{direction} move failed: {reason}")]
    MoveFailed {
        direction: GuideDirection,
        /// The requested duration had been clamped before the pulse failed.
        limited: bool,
        reason: String,
    },
    #[error("guiding disabled")]
    GuidingDisabled,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("invalid setting: {0}")]
    InvalidSetting(&'static str),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pulse guider")]
    MissingGuider,
    #[error("missing move scheduler")]
    MissingScheduler,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
