//! Human-readable error descriptions, exit codes and structured JSON errors.

use mountcal_core::error::{BuildError, CalibrationError};

/// Exit code for configuration problems (EX_CONFIG).
pub const EXIT_CONFIG: i32 = 78;
/// Exit code when the mount cannot be reached (EX_UNAVAILABLE).
pub const EXIT_UNAVAILABLE: i32 = 69;
/// Exit code for a calibration that did not produce a result.
pub const EXIT_CALIBRATION: i32 = 64;

/// Context attached to every config loading failure.
pub const CONFIG_CONTEXT: &str = "invalid configuration";

fn is_config_error(err: &eyre::Report) -> bool {
    matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ) || err.chain().any(|e| e.to_string() == CONFIG_CONTEXT)
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingGuider | BuildError::MissingScheduler => format!(
                "What happened: The mount could not be assembled ({be}).\nLikely causes: A hardware backend failed to initialize.\nHow to fix: Re-run with --log-level=debug to see which component is missing."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or the saved profile settings.\nHow to fix: Edit the config or settings file, then rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::PhaseFailed(phase) => format!(
                "What happened: {}.\nLikely causes: Guide pulses are not reaching the mount, the mount is parked, or the calibration step is too short.\nHow to fix: Check the guide cable and mount, or increase calibration.step_ms.",
                phase.message()
            ),
            CalibrationError::NotConnected => "What happened: The mount is not connected.\nLikely causes: Cable unplugged or driver not running.\nHow to fix: Connect the mount and try again.".to_string(),
            CalibrationError::InvalidLocation => "What happened: The guide star was lost.\nLikely causes: Clouds, a star too faint, or a search region that is too small.\nHow to fix: Pick a brighter star or raise camera.max_move_px.".to_string(),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if is_config_error(err) {
        let cause = err
            .chain()
            .skip(1)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ");
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Missing file, TOML syntax error, or an out-of-range value.\nHow to fix: Edit the TOML config and run `mountcal self-check`."
        );
    }

    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if is_config_error(err) {
        return EXIT_CONFIG;
    }
    match err.downcast_ref::<CalibrationError>() {
        Some(CalibrationError::NotConnected | CalibrationError::Hardware(_)) => EXIT_UNAVAILABLE,
        Some(
            CalibrationError::PhaseFailed(_)
            | CalibrationError::InvalidLocation
            | CalibrationError::MoveFailed { .. }
            | CalibrationError::State(_),
        ) => EXIT_CALIBRATION,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if is_config_error(err) {
        return "Config";
    }
    match err.downcast_ref::<CalibrationError>() {
        Some(CalibrationError::PhaseFailed(_)) => "CalibrationFailed",
        Some(CalibrationError::NotConnected) => "NotConnected",
        Some(CalibrationError::Hardware(_)) => "Hardware",
        Some(CalibrationError::InvalidLocation) => "StarLost",
        Some(CalibrationError::MoveFailed { .. }) => "MoveFailed",
        Some(_) => "Calibration",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(CalibrationError::PhaseFailed(phase)) = err.downcast_ref::<CalibrationError>() {
        obj["details"] = json!({ "phase": format!("{phase:?}") });
    }
    obj.to_string()
}
