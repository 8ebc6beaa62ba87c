//! Telemetry sinks: the calibration log, the event bus and the default
//! alert surface.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use mountcal_traits::{Alert, AlertSurface, GuideAxis, GuideParity, Point};

use crate::calibration::{Calibration, CalibrationDetails};

/// One measurement frame of a calibration phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStep {
    pub phase: &'static str,
    pub index: u32,
    pub dx: f64,
    pub dy: f64,
    pub location: Point,
    pub dist: f64,
}

/// Receives one record per calibration step plus the terminal events.
pub trait CalibrationLog {
    fn step(&mut self, step: &CalibrationStep);
    /// An axis finished its measurement phase. Angle in radians, rate in px/ms.
    fn direct_complete(&mut self, axis: GuideAxis, angle: f64, rate: f64, parity: GuideParity);
    fn complete(&mut self, calibration: &Calibration, details: &CalibrationDetails);
    fn failed(&mut self, message: &str);
}

/// Notifications for external subscribers.
pub trait CalibrationEvents {
    fn calibration_complete(&mut self, calibration: &Calibration);
    fn calibration_failed(&mut self, message: &str);
}

/// Emits calibration records as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCalibrationLog;

impl CalibrationLog for TracingCalibrationLog {
    fn step(&mut self, s: &CalibrationStep) {
        tracing::debug!(
            phase = s.phase,
            step = s.index,
            dx = s.dx,
            dy = s.dy,
            x = s.location.x,
            y = s.location.y,
            dist = s.dist,
            "calibration step"
        );
    }

    fn direct_complete(&mut self, axis: GuideAxis, angle: f64, rate: f64, parity: GuideParity) {
        tracing::info!(
            axis = axis.name(),
            angle_deg = angle.to_degrees(),
            rate_px_per_s = rate * 1000.0,
            parity = parity.name(),
            "axis calibration complete"
        );
    }

    fn complete(&mut self, cal: &Calibration, details: &CalibrationDetails) {
        tracing::info!(
            x_angle_deg = cal.x_angle.to_degrees(),
            y_angle_deg = cal.y_angle.to_degrees(),
            x_rate = cal.x_rate,
            y_rate = cal.y_rate,
            ra_steps = details.ra_step_count,
            dec_steps = details.dec_step_count,
            ortho_error = details.ortho_error,
            "calibration complete"
        );
    }

    fn failed(&mut self, message: &str) {
        tracing::error!(reason = message, "calibration failed");
    }
}

/// Appends one line per record to a file. Write errors are dropped; the log
/// is diagnostic only.
pub struct FileCalibrationLog {
    path: PathBuf,
}

impl FileCalibrationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn line(&self, message: &str) {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(file, "{message}");
        }
    }
}

impl CalibrationLog for FileCalibrationLog {
    fn step(&mut self, s: &CalibrationStep) {
        self.line(&format!(
            "{},{},{:.3},{:.3},{:.3},{:.3},{:.3}",
            s.phase, s.index, s.dx, s.dy, s.location.x, s.location.y, s.dist
        ));
    }

    fn direct_complete(&mut self, axis: GuideAxis, angle: f64, rate: f64, parity: GuideParity) {
        self.line(&format!(
            "{} calibration complete. Angle = {:.1} deg, Rate = {:.3} px/sec, Parity = {}",
            axis.name(),
            angle.to_degrees(),
            rate * 1000.0,
            parity.name()
        ));
    }

    fn complete(&mut self, cal: &Calibration, details: &CalibrationDetails) {
        self.line(&format!(
            "Calibration complete, xAngle = {:.1}, yAngle = {:.1}, xRate = {:.3}, yRate = {:.3}, RA steps = {}, Dec steps = {}",
            cal.x_angle.to_degrees(),
            cal.y_angle.to_degrees(),
            cal.x_rate * 1000.0,
            cal.y_rate * 1000.0,
            details.ra_step_count,
            details.dec_step_count
        ));
    }

    fn failed(&mut self, message: &str) {
        self.line(&format!("Calibration failed: {message}"));
    }
}

/// Event bus with no subscribers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl CalibrationEvents for NoopEvents {
    fn calibration_complete(&mut self, _calibration: &Calibration) {}
    fn calibration_failed(&mut self, _message: &str) {}
}

/// Alert surface that writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlerts;

impl AlertSurface for TracingAlerts {
    fn show(&mut self, alert: &Alert) {
        tracing::warn!(kind = ?alert.kind, suppress_key = ?alert.suppress_key, "{}", alert.message);
    }
}
