//! The mount: calibration state, guide limits and their persisted settings.

use std::fmt;
use std::sync::Arc;

use mountcal_config::keys;
use mountcal_traits::{
    Alert, AlertAction, AlertKind, AlertSurface, Clock, GuideAxis, ImagingContext, MoveScheduler,
    PointingSource, PulseGuider, SettingsStore,
};

use crate::builder::{MountBuilder, Missing};
use crate::calibration::{
    Calibration, CalibrationDetails, CalibrationHistory, CalibrationIssue, CalibrationRecord,
    MAX_DURATION_MAX_MS, MAX_DURATION_MIN_MS, calibration_distance,
};
use crate::calibrator::CalibrationRun;
use crate::config::{CalibrationCfg, DecGuideMode, GuideLimits};
use crate::error::{CalibrationError, Result};
use crate::limiter::{LimitAlertGate, LimitCounter};
use crate::notify::{CalibrationEvents, CalibrationLog};
use crate::sanity::SanityReport;

/// A sanity issue awaiting the user's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct SanityReview {
    pub issue: CalibrationIssue,
    pub detail: String,
    /// The calibration this run replaced, if it was valid.
    pub previous: Option<CalibrationRecord>,
}

/// What the user chose after a sanity alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    /// Drop the new calibration; the next session recalibrates.
    Discard,
    RestorePrevious,
}

pub struct Mount {
    pub(crate) guider: Box<dyn PulseGuider>,
    pub(crate) scheduler: Box<dyn MoveScheduler>,
    pub(crate) pointing: Box<dyn PointingSource>,
    pub(crate) imaging: Box<dyn ImagingContext>,
    pub(crate) settings: Box<dyn SettingsStore>,
    pub(crate) alerts: Box<dyn AlertSurface>,
    pub(crate) log: Box<dyn CalibrationLog>,
    pub(crate) events: Box<dyn CalibrationEvents>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) limit_gate: Arc<LimitAlertGate>,

    pub(crate) cal_cfg: CalibrationCfg,
    pub(crate) limits: GuideLimits,
    /// Dec mode to restore when a drift ends.
    pub(crate) saved_dec_mode: Option<DecGuideMode>,
    pub(crate) ra_limit: LimitCounter,
    pub(crate) dec_limit: LimitCounter,

    pub(crate) history: CalibrationHistory,
    pub(crate) calibrated: bool,
    pub(crate) run: CalibrationRun,
    pub(crate) pending_review: Option<SanityReview>,
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("cal_cfg", &self.cal_cfg)
            .field("limits", &self.limits)
            .field("saved_dec_mode", &self.saved_dec_mode)
            .field("calibrated", &self.calibrated)
            .field("state", &self.calibration_state())
            .field("ra_limit", &self.ra_limit)
            .field("dec_limit", &self.dec_limit)
            .finish_non_exhaustive()
    }
}

impl Mount {
    pub fn builder() -> MountBuilder<Missing, Missing> {
        MountBuilder::default()
    }

    pub fn is_connected(&self) -> bool {
        self.guider.is_connected()
    }

    /// Usable for guiding: connected, calibrated, and with a Dec rate unless
    /// Dec guiding is off.
    pub fn is_calibrated(&self) -> bool {
        self.is_connected()
            && self.calibrated
            && (self.limits.dec_mode == DecGuideMode::Off
                || self.history.current().calibration.is_dec_calibrated())
    }

    pub fn calibration(&self) -> &Calibration {
        &self.history.current().calibration
    }

    pub fn calibration_details(&self) -> &CalibrationDetails {
        &self.history.current().details
    }

    pub fn previous_calibration(&self) -> Option<&CalibrationRecord> {
        self.history.previous()
    }

    /// Install an externally supplied calibration (e.g. loaded from disk).
    pub fn set_calibration(&mut self, mut calibration: Calibration) {
        calibration.is_valid = true;
        tracing::info!(
            x_angle_deg = calibration.x_angle.to_degrees(),
            y_angle_deg = calibration.y_angle.to_degrees(),
            "calibration set"
        );
        self.history.set_calibration(calibration);
        self.calibrated = true;
    }

    pub fn set_calibration_details(&mut self, details: CalibrationDetails) {
        self.history.set_details(details);
    }

    /// Forget calibrated status and abandon any run in progress. The stored
    /// record stays available for comparison with the next calibration.
    pub fn clear_calibration(&mut self) {
        if self.calibrated || self.is_calibrating() {
            tracing::info!("calibration cleared");
        }
        self.calibrated = false;
        self.run = CalibrationRun::default();
    }

    pub const fn calibration_cfg(&self) -> &CalibrationCfg {
        &self.cal_cfg
    }

    pub const fn guide_limits(&self) -> &GuideLimits {
        &self.limits
    }

    /// Star travel required per measurement phase, from the current sensor.
    pub fn calibration_distance(&self) -> f64 {
        calibration_distance(self.imaging.sensor_height_px())
    }

    // ── Settings ─────────────────────────────────────────────────────────────

    pub fn set_calibration_duration(&mut self, ms: u32) -> Result<()> {
        if ms == 0 {
            return Err(eyre::Report::new(CalibrationError::InvalidSetting(
                "calibration duration must be > 0",
            )));
        }
        self.cal_cfg.step_ms = ms;
        self.settings.set_int(keys::CALIBRATION_DURATION, i64::from(ms));
        Ok(())
    }

    pub fn set_max_ra_duration(&mut self, ms: u32) -> Result<()> {
        check_max_duration(ms, "max RA duration must be in [50, 5000] ms")?;
        if self.limits.max_ra_ms != ms {
            tracing::info!(max_ra_ms = ms, "RA max duration changed");
        }
        self.limits.max_ra_ms = ms;
        self.settings.set_int(keys::MAX_RA_DURATION, i64::from(ms));
        Ok(())
    }

    pub fn set_max_dec_duration(&mut self, ms: u32) -> Result<()> {
        check_max_duration(ms, "max Dec duration must be in [50, 5000] ms")?;
        if self.limits.max_dec_ms != ms {
            tracing::info!(max_dec_ms = ms, "Dec max duration changed");
        }
        self.limits.max_dec_ms = ms;
        self.settings.set_int(keys::MAX_DEC_DURATION, i64::from(ms));
        Ok(())
    }

    pub fn set_dec_guide_mode(&mut self, mode: DecGuideMode) {
        if self.limits.dec_mode != mode {
            tracing::info!(mode = mode.name(), "Dec guide mode changed");
        }
        self.limits.dec_mode = mode;
        self.settings.set_int(
            keys::DEC_GUIDE_MODE,
            mountcal_config::DecMode::from(mode).code(),
        );
    }

    pub fn set_assume_orthogonal(&mut self, value: bool) {
        self.cal_cfg.assume_orthogonal = value;
        self.settings.set_bool(keys::ASSUME_ORTHOGONAL, value);
    }

    pub fn set_guiding_enabled(&mut self, enabled: bool) {
        if self.limits.guiding_enabled != enabled {
            tracing::info!(enabled, "guiding enable changed");
        }
        self.limits.guiding_enabled = enabled;
    }

    /// Suspend Dec guiding for a drift measurement.
    pub fn start_dec_drift(&mut self) {
        if self.saved_dec_mode.is_none() {
            self.saved_dec_mode = Some(self.limits.dec_mode);
        }
        self.limits.dec_mode = DecGuideMode::Off;
    }

    pub fn end_dec_drift(&mut self) {
        if let Some(mode) = self.saved_dec_mode.take() {
            self.limits.dec_mode = mode;
        }
    }

    pub fn settings_summary(&self) -> String {
        format!(
            "Calibration step = {} ms, distance = {:.1} px, assume orthogonal axes = {}\n\
             Max RA duration = {} ms, max Dec duration = {} ms, Dec guide mode = {}",
            self.cal_cfg.step_ms,
            self.calibration_distance(),
            if self.cal_cfg.assume_orthogonal { "yes" } else { "no" },
            self.limits.max_ra_ms,
            self.limits.max_dec_ms,
            self.limits.dec_mode.name(),
        )
    }

    // ── Sanity review ────────────────────────────────────────────────────────

    pub const fn pending_review(&self) -> Option<&SanityReview> {
        self.pending_review.as_ref()
    }

    pub fn apply_review(&mut self, decision: ReviewDecision) -> Result<()> {
        match decision {
            ReviewDecision::Accept => {}
            ReviewDecision::Discard => {
                tracing::info!("calibration discarded after review");
                self.clear_calibration();
            }
            ReviewDecision::RestorePrevious => {
                if !self.history.restore_previous() {
                    return Err(eyre::Report::new(CalibrationError::State(
                        "no previous calibration to restore".into(),
                    )));
                }
                tracing::info!("previous calibration restored");
                self.calibrated = true;
            }
        }
        self.pending_review = None;
        Ok(())
    }

    /// Stop showing alerts for `issue` on this profile.
    pub fn suppress_issue_alert(&mut self, issue: CalibrationIssue) {
        let key = keys::cal_warning(self.settings.profile_id(), issue.suppress_category());
        self.settings.set_bool(&key, false);
    }

    /// Stop showing the little-south-movement alert on this profile.
    pub fn suppress_dec_backlash_alert(&mut self) {
        let key = keys::dec_backlash_warning(self.settings.profile_id());
        self.settings.set_bool(&key, false);
    }

    /// Stop showing limit-reached alerts for `axis` on this profile.
    pub fn suppress_limit_alert(&mut self, axis: GuideAxis) {
        let key = keys::limit_warning(self.settings.profile_id(), axis.name());
        self.settings.set_bool(&key, false);
    }

    pub(crate) fn report_sanity(
        &mut self,
        report: SanityReport,
        previous: Option<CalibrationRecord>,
    ) {
        if report.issue == CalibrationIssue::None {
            tracing::info!("Calibration passed sanity checks");
            self.pending_review = None;
            return;
        }

        tracing::warn!(
            issue = report.issue.name(),
            detail = %report.detail,
            "calibration sanity check"
        );
        let key = keys::cal_warning(self.settings.profile_id(), report.issue.suppress_category());
        if self.settings.get_bool(&key, true) {
            self.alerts.show(&Alert {
                kind: AlertKind::CalibrationAdvisory,
                message: report.issue.alert_message().to_string(),
                suppress_key: Some(key),
                action: Some(AlertAction::ShowCalibrationDetails),
            });
        }
        self.pending_review = Some(SanityReview {
            issue: report.issue,
            detail: report.detail,
            previous,
        });
    }
}

fn check_max_duration(ms: u32, msg: &'static str) -> Result<()> {
    if (MAX_DURATION_MIN_MS..=MAX_DURATION_MAX_MS).contains(&ms) {
        Ok(())
    } else {
        Err(eyre::Report::new(CalibrationError::InvalidSetting(msg)))
    }
}
