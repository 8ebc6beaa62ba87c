//! Status returned from each calibration step.

/// Outcome of feeding one measurement to [`crate::Mount::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStatus {
    /// A move was scheduled; deliver the next measurement when it completes.
    Pending,
    /// Calibration committed.
    Complete,
}
