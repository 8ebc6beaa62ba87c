//! Maps `Box<dyn Error>` from trait boundaries to typed `CalibrationError`.
//!
//! The traits in `mountcal_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `mountcal_hardware::HwError` downcasting.

use crate::error::CalibrationError;

/// Map a trait-boundary error to a typed `CalibrationError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CalibrationError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<mountcal_hardware::error::HwError>() {
            return match hw {
                mountcal_hardware::error::HwError::Disconnected => CalibrationError::NotConnected,
                other => CalibrationError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("not connected") || lower.contains("disconnected") {
        CalibrationError::NotConnected
    } else {
        CalibrationError::Hardware(s)
    }
}
