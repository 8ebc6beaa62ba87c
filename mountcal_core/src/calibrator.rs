//! The calibration state machine.
//!
//! `Mount::step` is called once per star measurement. Each call runs phases
//! until one schedules a move (and must wait for the next measurement) or the
//! run completes. A phase that finishes without moving falls straight into
//! the next one within the same call.

use std::f64::consts::{FRAC_PI_2, PI};

use eyre::WrapErr;
use mountcal_config::keys;
use mountcal_traits::{Alert, AlertKind, GuideAxis, GuideDirection, GuideParity, Point, SkyCoords};

use crate::calibration::{
    CALIBRATION_RATE_UNCALIBRATED, CalibrationRecord, DEC_BACKLASH_DISTANCE,
    EAST_RETRACE_ADVISORY, GUIDE_SPEED_UNKNOWN, MAX_CALIBRATION_DISTANCE, MAX_CALIBRATION_STEPS,
    MAX_NUDGES, NUDGE_TOLERANCE, PARITY_THRESHOLD_ARCSEC, RETRACE_ANGLE_TOLERANCE_DEG,
    RETRACE_MIN_FRACTION, RETRACE_NONE_FRACTION, SOUTH_RETRACE_LITTLE_ADVISORY,
    SOUTH_RETRACE_NONE_ADVISORY, calibration_distance,
};
use crate::config::DecGuideMode;
use crate::error::{CalibrationError, FailedPhase, Result};
use crate::geometry::{mount_coords, norm_angle, orthogonality_error_deg};
use crate::hw_error::map_hw_error;
use crate::mount::Mount;
use crate::notify::CalibrationStep;
use crate::sanity::check_calibration;
use crate::status::CalibrationStatus;

/// Observable phase of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Cleared,
    GoWest,
    GoEast,
    ClearBacklash,
    GoNorth,
    GoSouth,
    NudgeSouth,
    Complete,
}

/// Return-trip budget: total pulse time left and the size of each pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Recenter {
    remaining_ms: u32,
    pulse_ms: u32,
}

impl Recenter {
    fn steps(self) -> u32 {
        self.remaining_ms.div_ceil(self.pulse_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Phase {
    Cleared,
    GoWest,
    GoEast(Recenter),
    ClearBacklash,
    GoNorth,
    GoSouth(Recenter),
    /// `south_amount` is the signed Dec travel of the south recenter moves.
    NudgeSouth { south_amount: f64 },
    Complete,
}

impl Phase {
    const fn state(self) -> CalibrationState {
        match self {
            Self::Cleared => CalibrationState::Cleared,
            Self::GoWest => CalibrationState::GoWest,
            Self::GoEast(_) => CalibrationState::GoEast,
            Self::ClearBacklash => CalibrationState::ClearBacklash,
            Self::GoNorth => CalibrationState::GoNorth,
            Self::GoSouth(_) => CalibrationState::GoSouth,
            Self::NudgeSouth { .. } => CalibrationState::NudgeSouth,
            Self::Complete => CalibrationState::Complete,
        }
    }
}

/// Per-run state. Replaced wholesale by `begin_calibration` and
/// `clear_calibration`.
#[derive(Debug, Clone)]
pub(crate) struct CalibrationRun {
    pub(crate) phase: Phase,
    /// Step counter of the current phase.
    pub(crate) steps: u32,
    /// Star position when the run began; nudging returns here.
    pub(crate) initial: Point,
    /// Phase reference position, set by the first measurement.
    pub(crate) start: Option<Point>,
    /// Where the current return trip (East or South) began.
    pub(crate) return_start: Point,
    /// Mount coordinates when the current measurement phase began.
    pub(crate) start_coords: Option<SkyCoords>,
    pub(crate) movement_alert_shown: bool,
    pub(crate) ra_steps: u32,
    pub(crate) dec_steps: u32,
    pub(crate) working: CalibrationRecord,
}

impl Default for CalibrationRun {
    fn default() -> Self {
        Self {
            phase: Phase::Cleared,
            steps: 0,
            initial: Point::INVALID,
            start: None,
            return_start: Point::INVALID,
            start_coords: None,
            movement_alert_shown: false,
            ra_steps: 0,
            dec_steps: 0,
            working: CalibrationRecord::default(),
        }
    }
}

/// What the driving loop does after a phase handler returns.
enum Flow {
    /// A move was scheduled; wait for the next measurement.
    Wait,
    /// The phase changed without moving; evaluate the new phase now.
    Next,
    /// All phases done; commit the result.
    Finished,
}

struct Measurement {
    location: Point,
    start: Point,
    dx: f64,
    dy: f64,
    dist: f64,
}

impl Measurement {
    fn new(start: Point, location: Point) -> Self {
        let d = location - start;
        Self {
            location,
            start,
            dx: d.x,
            dy: d.y,
            dist: start.distance_to(&location),
        }
    }
}

impl Mount {
    pub fn calibration_state(&self) -> CalibrationState {
        self.run.phase.state()
    }

    pub fn is_calibrating(&self) -> bool {
        !matches!(self.run.phase, Phase::Cleared | Phase::Complete)
    }

    /// Start a new calibration from `location`.
    ///
    /// Rejected without any state change when the mount is disconnected or
    /// the location is invalid. Otherwise any existing calibration is cleared.
    pub fn begin_calibration(&mut self, location: Point) -> Result<()> {
        if !self.is_connected() {
            return Err(eyre::Report::new(CalibrationError::NotConnected))
                .wrap_err("begin calibration");
        }
        if !location.is_valid() {
            return Err(eyre::Report::new(CalibrationError::InvalidLocation))
                .wrap_err("begin calibration");
        }

        self.clear_calibration();
        self.run = CalibrationRun {
            phase: Phase::GoWest,
            initial: location,
            start_coords: self.pointing.coordinates(),
            ..CalibrationRun::default()
        };
        tracing::info!(x = location.x, y = location.y, "calibration begins");
        tracing::debug!(settings = %self.settings_summary(), "calibration settings");
        Ok(())
    }

    /// Feed one star measurement into the running calibration.
    ///
    /// A no-op returning `Complete` once the run has finished. Any error
    /// clears the calibration before it is returned.
    pub fn step(&mut self, location: Point) -> Result<CalibrationStatus> {
        match self.run.phase {
            Phase::Cleared => {
                return Err(eyre::Report::new(CalibrationError::NotCalibrating));
            }
            Phase::Complete => return Ok(CalibrationStatus::Complete),
            _ => {}
        }

        let res = self.advance(location);
        if res.is_err() {
            self.clear_calibration();
        }
        res
    }

    fn advance(&mut self, location: Point) -> Result<CalibrationStatus> {
        if !location.is_valid() {
            return Err(eyre::Report::new(CalibrationError::InvalidLocation))
                .wrap_err("calibration step");
        }
        let dist_crit = calibration_distance(self.imaging.sensor_height_px());
        let first = *self.run.start.get_or_insert(location);
        tracing::trace!(x = first.x, y = first.y, dist_crit, "phase reference");

        loop {
            let start = self.run.start.unwrap_or(location);
            let m = Measurement::new(start, location);
            let flow = match self.run.phase {
                Phase::GoWest => self.go_west(&m, dist_crit)?,
                Phase::GoEast(rc) => self.go_east(&m, rc)?,
                Phase::ClearBacklash => self.clear_backlash(&m)?,
                Phase::GoNorth => self.go_north(&m, dist_crit)?,
                Phase::GoSouth(rc) => self.go_south(&m, rc)?,
                Phase::NudgeSouth { south_amount } => self.nudge_south(&m, south_amount)?,
                p @ (Phase::Cleared | Phase::Complete) => {
                    return Err(eyre::Report::new(CalibrationError::State(format!(
                        "calibration entered {:?} while stepping",
                        p.state()
                    ))));
                }
            };
            match flow {
                Flow::Wait => return Ok(CalibrationStatus::Pending),
                Flow::Next => {}
                Flow::Finished => {
                    self.commit_calibration();
                    return Ok(CalibrationStatus::Complete);
                }
            }
        }
    }

    // ── Phases ───────────────────────────────────────────────────────────────

    fn go_west(&mut self, m: &Measurement, dist_crit: f64) -> Result<Flow> {
        self.log_step("West", m);
        self.run.working.details.ra_steps.push((m.dx, m.dy));

        if m.dist < dist_crit {
            if self.run.steps > MAX_CALIBRATION_STEPS {
                return Err(self.phase_failed(FailedPhase::Ra));
            }
            self.run.steps += 1;
            self.schedule(GuideDirection::West, self.cal_cfg.step_ms)?;
            return Ok(Flow::Wait);
        }

        let pulse_time = self.pulse_time_ms();
        let parity = self.guide_parity(GuideAxis::Ra);
        let cal = &mut self.run.working.calibration;
        cal.x_angle = m.start.angle_to(&m.location);
        cal.x_rate = m.dist / pulse_time;
        cal.ra_guide_parity = parity;
        let (x_angle, x_rate) = (cal.x_angle, cal.x_rate);
        self.run.ra_steps = self.run.steps;
        self.log.direct_complete(GuideAxis::Ra, x_angle, x_rate, parity);

        let rc = self.recenter_budget(x_rate, self.limits.max_ra_ms);
        self.run.steps = rc.steps();
        self.run.return_start = m.location;
        self.run.phase = Phase::GoEast(rc);
        Ok(Flow::Next)
    }

    fn go_east(&mut self, m: &Measurement, rc: Recenter) -> Result<Flow> {
        self.log_step("East", m);
        self.run.working.details.ra_steps.push((m.dx, m.dy));

        if rc.remaining_ms > 0 {
            let pulse = rc.pulse_ms.min(rc.remaining_ms);
            self.run.phase = Phase::GoEast(Recenter {
                remaining_ms: rc.remaining_ms - pulse,
                ..rc
            });
            self.run.steps = self.run.steps.saturating_sub(1);
            self.schedule(GuideDirection::East, pulse)?;
            return Ok(Flow::Wait);
        }

        let back_angle = self.run.working.calibration.x_angle + PI;
        if let Some(fraction) =
            retrace_shortfall(m.start, self.run.return_start, m.location, back_angle)
        {
            tracing::warn!(fraction, "little or no east movement during calibration");
            self.alerts.show(&Alert {
                kind: AlertKind::MovementAdvisory,
                message: EAST_RETRACE_ADVISORY.to_string(),
                suppress_key: None,
                action: None,
            });
            self.run.movement_alert_shown = true;
        }

        self.run.steps = 0;
        self.run.start = Some(m.location);

        if self.limits.dec_mode == DecGuideMode::Off {
            let cal = &mut self.run.working.calibration;
            cal.y_angle = norm_angle(cal.x_angle + FRAC_PI_2);
            cal.y_rate = CALIBRATION_RATE_UNCALIBRATED;
            tracing::info!("Dec guiding off, skipping Dec calibration");
            return Ok(Flow::Finished);
        }

        self.run.start_coords = self.pointing.coordinates();
        self.run.phase = Phase::ClearBacklash;
        Ok(Flow::Next)
    }

    fn clear_backlash(&mut self, m: &Measurement) -> Result<Flow> {
        self.log_step("Backlash", m);

        if m.dist < DEC_BACKLASH_DISTANCE {
            if self.run.steps > MAX_CALIBRATION_STEPS {
                return Err(self.phase_failed(FailedPhase::Backlash));
            }
            self.run.steps += 1;
            self.schedule(GuideDirection::North, self.cal_cfg.step_ms)?;
            return Ok(Flow::Wait);
        }

        self.run.steps = 0;
        self.run.start = Some(m.location);
        self.run.phase = Phase::GoNorth;
        Ok(Flow::Next)
    }

    fn go_north(&mut self, m: &Measurement, dist_crit: f64) -> Result<Flow> {
        self.log_step("North", m);
        self.run.working.details.dec_steps.push((m.dx, m.dy));

        if m.dist < dist_crit {
            if self.run.steps > MAX_CALIBRATION_STEPS {
                return Err(self.phase_failed(FailedPhase::Dec));
            }
            self.run.steps += 1;
            self.schedule(GuideDirection::North, self.cal_cfg.step_ms)?;
            return Ok(Flow::Wait);
        }

        // Measured from the end point back to the start, so the angle is
        // relative to south just as the RA angle is relative to west.
        let measured = m.location.angle_to(&m.start);
        let pulse_time = self.pulse_time_ms();
        let assume_orthogonal = self.cal_cfg.assume_orthogonal;
        let parity = self.guide_parity(GuideAxis::Dec);
        let cal = &mut self.run.working.calibration;
        cal.dec_guide_parity = parity;
        if assume_orthogonal {
            let a1 = norm_angle(cal.x_angle + FRAC_PI_2);
            let a2 = norm_angle(cal.x_angle - FRAC_PI_2);
            cal.y_angle = if norm_angle(a1 - measured).abs() < norm_angle(a2 - measured).abs() {
                a1
            } else {
                a2
            };
            let dec_dist = m.dist * (measured - cal.y_angle).cos();
            cal.y_rate = dec_dist / pulse_time;
            tracing::debug!(
                measured_deg = measured.to_degrees(),
                chosen_deg = cal.y_angle.to_degrees(),
                dist = m.dist,
                dec_dist,
                "assuming orthogonal axes"
            );
        } else {
            cal.y_angle = measured;
            cal.y_rate = m.dist / pulse_time;
        }
        let (y_angle, y_rate) = (cal.y_angle, cal.y_rate);
        self.run.dec_steps = self.run.steps;
        self.log.direct_complete(GuideAxis::Dec, y_angle, y_rate, parity);

        let rc = self.recenter_budget(y_rate, self.limits.max_dec_ms);
        self.run.steps = rc.steps();
        self.run.return_start = m.location;
        self.run.phase = Phase::GoSouth(rc);
        Ok(Flow::Next)
    }

    fn go_south(&mut self, m: &Measurement, rc: Recenter) -> Result<Flow> {
        self.log_step("South", m);
        self.run.working.details.dec_steps.push((m.dx, m.dy));

        if rc.remaining_ms > 0 {
            let pulse = rc.pulse_ms.min(rc.remaining_ms);
            self.run.phase = Phase::GoSouth(Recenter {
                remaining_ms: rc.remaining_ms - pulse,
                ..rc
            });
            self.run.steps = self.run.steps.saturating_sub(1);
            self.schedule(GuideDirection::South, pulse)?;
            return Ok(Flow::Wait);
        }

        self.check_south_retrace(m);
        let cal = &self.run.working.calibration;
        let south_amount =
            mount_coords(self.run.return_start - m.location, cal.x_angle, cal.y_angle).y;
        self.run.steps = 0;
        self.run.phase = Phase::NudgeSouth { south_amount };
        Ok(Flow::Next)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn nudge_south(&mut self, m: &Measurement, south_amount: f64) -> Result<Flow> {
        let initial = self.run.initial;
        let nudge_amt = m.location.distance_to(&initial);

        if self.run.steps < MAX_NUDGES
            && nudge_amt > NUDGE_TOLERANCE
            && nudge_amt < MAX_CALIBRATION_DISTANCE
        {
            let cal = &self.run.working.calibration;
            let dec_amt = mount_coords(m.location - initial, cal.x_angle, cal.y_angle).y;
            // Same sign as the south recenter travel: still north of the start
            if dec_amt * south_amount > 0.0 {
                let px = dec_amt.abs().min(self.imaging.max_move_px());
                let pulse = (px / cal.y_rate)
                    .floor()
                    .min(f64::from(self.cal_cfg.step_ms)) as u32;
                self.run.steps += 1;
                tracing::debug!(nudge = self.run.steps, dec_amt, pulse, "south nudge");
                self.schedule(GuideDirection::South, pulse)?;
                return Ok(Flow::Wait);
            }
        }

        tracing::debug!(
            x = m.location.x,
            y = m.location.y,
            target_x = initial.x,
            target_y = initial.y,
            "final south nudging status"
        );
        Ok(Flow::Finished)
    }

    // ── Commit ───────────────────────────────────────────────────────────────

    fn commit_calibration(&mut self) {
        let previous = self.history.current().clone();
        let mut record = std::mem::take(&mut self.run.working);

        let cal = &mut record.calibration;
        cal.declination = self.pointing.declination();
        cal.pier_side = self.pointing.pier_side();
        cal.rotator_angle = self.imaging.rotator_angle();
        cal.binning = self.imaging.binning();
        cal.timestamp = Some(self.clock.wall_time());
        cal.is_valid = true;

        let rates = self.pointing.guide_rates();
        let d = &mut record.details;
        d.ra_step_count = self.run.ra_steps;
        d.dec_step_count = self.run.dec_steps;
        d.ra_guide_speed = rates.map_or(GUIDE_SPEED_UNKNOWN, |r| r.ra);
        d.dec_guide_speed = rates.map_or(GUIDE_SPEED_UNKNOWN, |r| r.dec);
        d.focal_length = self.imaging.focal_length_mm();
        d.image_scale = self.imaging.pixel_scale();
        d.ortho_error = orthogonality_error_deg(cal.x_angle, cal.y_angle);
        d.orig_binning = cal.binning;
        d.orig_timestamp = cal.timestamp;
        d.orig_pier_side = cal.pier_side;

        let previous = previous.calibration.is_valid.then_some(previous);
        let report = check_calibration(&record, previous.as_ref());
        record.details.last_issue = report.issue;

        self.history.commit(record);
        self.calibrated = true;
        self.run.phase = Phase::Complete;

        self.report_sanity(report, previous);
        let current = self.history.current();
        self.log.complete(&current.calibration, &current.details);
        self.events.calibration_complete(&current.calibration);
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    /// Total pulse time of the current phase, never zero.
    fn pulse_time_ms(&self) -> f64 {
        f64::from(self.run.steps.max(1)) * f64::from(self.cal_cfg.step_ms)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn recenter_budget(&self, rate: f64, axis_max_ms: u32) -> Recenter {
        let step_ms = self.cal_cfg.step_ms;
        let remaining_ms = self.run.steps.saturating_mul(step_ms);
        let pulse_ms = if self.cal_cfg.fast_recenter && rate > 0.0 {
            let ideal = (self.imaging.max_move_px() / rate).floor();
            ideal.min(f64::from(axis_max_ms)).max(f64::from(step_ms)) as u32
        } else {
            step_ms
        };
        Recenter {
            remaining_ms,
            pulse_ms,
        }
    }

    /// Parity of `axis` from the mount coordinates reported at the start and
    /// end of its measurement phase.
    fn guide_parity(&self, axis: GuideAxis) -> GuideParity {
        let (Some(start), Some(end)) = (self.run.start_coords, self.pointing.coordinates()) else {
            return GuideParity::Unknown;
        };
        // West lowers RA and North raises Dec on a mount that guides as commanded
        let moved_arcsec = match axis {
            GuideAxis::Ra => {
                let mut dra = start.ra_hours - end.ra_hours;
                if dra > 12.0 {
                    dra -= 24.0;
                } else if dra < -12.0 {
                    dra += 24.0;
                }
                dra * 54_000.0
            }
            GuideAxis::Dec => (end.dec_deg - start.dec_deg) * 3600.0,
        };
        if moved_arcsec > PARITY_THRESHOLD_ARCSEC {
            GuideParity::Even
        } else if moved_arcsec < -PARITY_THRESHOLD_ARCSEC {
            GuideParity::Odd
        } else {
            GuideParity::Unknown
        }
    }

    /// The south recenter should take the star most of the way back along
    /// the north vector. Large Dec backlash shows up here.
    fn check_south_retrace(&mut self, m: &Measurement) {
        let y_angle = self.run.working.calibration.y_angle;
        let Some(fraction) = retrace_shortfall(m.start, self.run.return_start, m.location, y_angle)
        else {
            return;
        };
        let message = if fraction < RETRACE_NONE_FRACTION {
            SOUTH_RETRACE_NONE_ADVISORY
        } else {
            SOUTH_RETRACE_LITTLE_ADVISORY
        };
        tracing::warn!(fraction, "little south movement during calibration");

        let key = keys::dec_backlash_warning(self.settings.profile_id());
        if self.run.movement_alert_shown || !self.settings.get_bool(&key, true) {
            tracing::debug!(message, "south movement alert not shown");
            return;
        }
        self.alerts.show(&Alert {
            kind: AlertKind::MovementAdvisory,
            message: message.to_string(),
            suppress_key: Some(key),
            action: None,
        });
        self.run.movement_alert_shown = true;
    }

    fn schedule(&mut self, direction: GuideDirection, duration_ms: u32) -> Result<()> {
        self.scheduler
            .schedule_move(direction, duration_ms)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("scheduling {direction} calibration move"))
    }

    fn log_step(&mut self, phase: &'static str, m: &Measurement) {
        self.log.step(&CalibrationStep {
            phase,
            index: self.run.steps,
            dx: m.dx,
            dy: m.dy,
            location: m.location,
            dist: m.dist,
        });
    }

    fn phase_failed(&mut self, phase: FailedPhase) -> eyre::Report {
        let msg = phase.message();
        self.alerts.show(&Alert {
            kind: AlertKind::CalibrationFailed,
            message: msg.to_string(),
            suppress_key: None,
            action: None,
        });
        self.log.failed(msg);
        self.events.calibration_failed(msg);
        eyre::Report::new(CalibrationError::PhaseFailed(phase))
    }
}

/// Fraction of the outbound travel a return trip covered, when the return fell
/// short of [`RETRACE_MIN_FRACTION`] or strayed more than
/// [`RETRACE_ANGLE_TOLERANCE_DEG`] from `back_angle`.
fn retrace_shortfall(
    outbound_start: Point,
    turn: Point,
    end: Point,
    back_angle: f64,
) -> Option<f64> {
    let outbound = outbound_start.distance_to(&turn);
    let back = turn.distance_to(&end);
    let fraction = if outbound > 0.0 { back / outbound } else { 1.0 };
    let off_axis = norm_angle(turn.angle_to(&end) - back_angle).abs();
    (fraction < RETRACE_MIN_FRACTION || off_axis > RETRACE_ANGLE_TOLERANCE_DEG.to_radians())
        .then_some(fraction)
}
