//! Type-state builder for [`Mount`].
//!
//! The guider and the move scheduler are mandatory; `build()` only exists once
//! both are set. `try_build()` is available in any state and reports what is
//! missing. Values persisted in the settings store override the configured
//! ones.

use std::marker::PhantomData;
use std::sync::Arc;

use mountcal_config::{ProfileSettings, keys};
use mountcal_traits::{
    AlertSurface, Clock, ImagingContext, MonotonicClock, MoveScheduler, PointingSource,
    PulseGuider, SettingsStore,
};

use crate::calibration::{CalibrationHistory, MAX_DURATION_MAX_MS, MAX_DURATION_MIN_MS};
use crate::calibrator::CalibrationRun;
use crate::config::{CalibrationCfg, DecGuideMode, GuideLimits};
use crate::error::{BuildError, Result};
use crate::limiter::{LimitAlertGate, LimitCounter};
use crate::mocks::{FixedImaging, FixedPointing};
use crate::mount::Mount;
use crate::notify::{
    CalibrationEvents, CalibrationLog, NoopEvents, TracingAlerts, TracingCalibrationLog,
};

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

pub struct MountBuilder<G, S> {
    guider: Option<Box<dyn PulseGuider>>,
    scheduler: Option<Box<dyn MoveScheduler>>,
    pointing: Option<Box<dyn PointingSource>>,
    imaging: Option<Box<dyn ImagingContext>>,
    settings: Option<Box<dyn SettingsStore>>,
    alerts: Option<Box<dyn AlertSurface>>,
    log: Option<Box<dyn CalibrationLog>>,
    events: Option<Box<dyn CalibrationEvents>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    limit_gate: Option<Arc<LimitAlertGate>>,
    calibration: Option<CalibrationCfg>,
    limits: Option<GuideLimits>,
    _g: PhantomData<G>,
    _s: PhantomData<S>,
}

impl Default for MountBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            guider: None,
            scheduler: None,
            pointing: None,
            imaging: None,
            settings: None,
            alerts: None,
            log: None,
            events: None,
            clock: None,
            limit_gate: None,
            calibration: None,
            limits: None,
            _g: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<G, S> MountBuilder<G, S> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<Mount> {
        let guider = self
            .guider
            .ok_or_else(|| eyre::Report::new(BuildError::MissingGuider))?;
        let scheduler = self
            .scheduler
            .ok_or_else(|| eyre::Report::new(BuildError::MissingScheduler))?;

        let settings = self
            .settings
            .unwrap_or_else(|| Box::new(ProfileSettings::new(0)));
        let (cal_cfg, limits) = apply_settings(
            &*settings,
            self.calibration.unwrap_or_default(),
            self.limits.unwrap_or_default(),
        );

        if cal_cfg.step_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "calibration step_ms must be > 0",
            )));
        }
        let range = MAX_DURATION_MIN_MS..=MAX_DURATION_MAX_MS;
        if !range.contains(&limits.max_ra_ms) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_ra_ms must be in [50, 5000]",
            )));
        }
        if !range.contains(&limits.max_dec_ms) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_dec_ms must be in [50, 5000]",
            )));
        }

        let imaging = self
            .imaging
            .unwrap_or_else(|| Box::new(FixedImaging::default()));
        if imaging.sensor_height_px() == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensor height must be > 0",
            )));
        }
        if imaging.max_move_px().is_nan() || imaging.max_move_px() <= 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max move must be > 0",
            )));
        }

        tracing::debug!(
            step_ms = cal_cfg.step_ms,
            max_ra_ms = limits.max_ra_ms,
            max_dec_ms = limits.max_dec_ms,
            dec_mode = limits.dec_mode.name(),
            profile = settings.profile_id(),
            "mount built"
        );

        Ok(Mount {
            guider,
            scheduler,
            pointing: self
                .pointing
                .unwrap_or_else(|| Box::new(FixedPointing::default())),
            imaging,
            settings,
            alerts: self.alerts.unwrap_or_else(|| Box::new(TracingAlerts)),
            log: self.log.unwrap_or_else(|| Box::new(TracingCalibrationLog)),
            events: self.events.unwrap_or_else(|| Box::new(NoopEvents)),
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            limit_gate: self.limit_gate.unwrap_or_default(),
            cal_cfg,
            limits,
            saved_dec_mode: None,
            ra_limit: LimitCounter::default(),
            dec_limit: LimitCounter::default(),
            history: CalibrationHistory::default(),
            calibrated: false,
            run: CalibrationRun::default(),
            pending_review: None,
        })
    }

    pub fn with_pointing(mut self, pointing: impl PointingSource + 'static) -> Self {
        self.pointing = Some(Box::new(pointing));
        self
    }
    pub fn with_imaging(mut self, imaging: impl ImagingContext + 'static) -> Self {
        self.imaging = Some(Box::new(imaging));
        self
    }
    pub fn with_settings(mut self, settings: impl SettingsStore + 'static) -> Self {
        self.settings = Some(Box::new(settings));
        self
    }
    pub fn with_alerts(mut self, alerts: impl AlertSurface + 'static) -> Self {
        self.alerts = Some(Box::new(alerts));
        self
    }
    pub fn with_log(mut self, log: impl CalibrationLog + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }
    pub fn with_events(mut self, events: impl CalibrationEvents + 'static) -> Self {
        self.events = Some(Box::new(events));
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Share the limit-alert throttle with other mounts.
    pub fn with_limit_gate(mut self, gate: Arc<LimitAlertGate>) -> Self {
        self.limit_gate = Some(gate);
        self
    }
    pub fn with_calibration_cfg(mut self, cfg: CalibrationCfg) -> Self {
        self.calibration = Some(cfg);
        self
    }
    pub fn with_limits(mut self, limits: GuideLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    fn retype<G2, S2>(self) -> MountBuilder<G2, S2> {
        MountBuilder {
            guider: self.guider,
            scheduler: self.scheduler,
            pointing: self.pointing,
            imaging: self.imaging,
            settings: self.settings,
            alerts: self.alerts,
            log: self.log,
            events: self.events,
            clock: self.clock,
            limit_gate: self.limit_gate,
            calibration: self.calibration,
            limits: self.limits,
            _g: PhantomData,
            _s: PhantomData,
        }
    }
}

// Setters that advance type-state when providing mandatory components
impl<S> MountBuilder<Missing, S> {
    pub fn with_guider(mut self, guider: impl PulseGuider + 'static) -> MountBuilder<Set, S> {
        self.guider = Some(Box::new(guider));
        self.retype()
    }
}

impl<G> MountBuilder<G, Missing> {
    pub fn with_scheduler(
        mut self,
        scheduler: impl MoveScheduler + 'static,
    ) -> MountBuilder<G, Set> {
        self.scheduler = Some(Box::new(scheduler));
        self.retype()
    }
}

impl MountBuilder<Set, Set> {
    /// Validate and build the mount. Only available when the guider and
    /// scheduler are set.
    pub fn build(self) -> Result<Mount> {
        self.try_build()
    }
}

/// Overlay persisted profile values onto the configured ones. Out-of-range
/// integers are kept as-is so validation reports them.
fn apply_settings(
    settings: &dyn SettingsStore,
    mut cal: CalibrationCfg,
    mut limits: GuideLimits,
) -> (CalibrationCfg, GuideLimits) {
    let int = |key: &str, current: u32| {
        u32::try_from(settings.get_int(key, i64::from(current))).unwrap_or(0)
    };
    cal.step_ms = int(keys::CALIBRATION_DURATION, cal.step_ms);
    cal.assume_orthogonal = settings.get_bool(keys::ASSUME_ORTHOGONAL, cal.assume_orthogonal);
    limits.max_ra_ms = int(keys::MAX_RA_DURATION, limits.max_ra_ms);
    limits.max_dec_ms = int(keys::MAX_DEC_DURATION, limits.max_dec_ms);

    let current = mountcal_config::DecMode::from(limits.dec_mode).code();
    let code = settings.get_int(keys::DEC_GUIDE_MODE, current);
    match mountcal_config::DecMode::from_code(code) {
        Some(mode) => limits.dec_mode = DecGuideMode::from(mode),
        None => tracing::warn!(code, "ignoring unknown stored Dec guide mode"),
    }
    (cal, limits)
}
