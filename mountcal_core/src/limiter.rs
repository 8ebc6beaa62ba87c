//! Guide-duration limiter.
//!
//! Normal guide moves are clamped to the per-axis maximum and filtered by the
//! Dec guide mode. Repeated clamping in one direction raises a throttled
//! alert. Calibration moves skip all of this.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use eyre::WrapErr;
use mountcal_config::keys;
use mountcal_traits::{Alert, AlertKind, GuideAxis, GuideDirection};

use crate::calibration::{ALERT_THROTTLE, LIMIT_REACHED_WARN_COUNT, MAX_DURATION_MAX_MS};
use crate::error::{CalibrationError, Result};
use crate::hw_error::map_hw_error;
use crate::mount::Mount;

/// Duration actually applied, and whether the request was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveResult {
    pub amount_ms: u32,
    pub limited: bool,
}

/// Run length of consecutive clamped moves in the same direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitCounter {
    count: u32,
    last_direction: Option<GuideDirection>,
}

impl LimitCounter {
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Record one move. Returns true once the run has reached the warning
    /// threshold.
    pub fn record(&mut self, direction: GuideDirection, limited: bool) -> bool {
        let fire = if limited && self.last_direction == Some(direction) {
            self.count = self.count.saturating_add(1);
            self.count >= LIMIT_REACHED_WARN_COUNT
        } else {
            self.count = 0;
            false
        };
        self.last_direction = limited.then_some(direction);
        fire
    }
}

/// Process-wide throttle for limit-reached alerts.
///
/// Share one gate (behind an `Arc`) between every mount of the process.
#[derive(Debug, Default)]
pub struct LimitAlertGate {
    last: Mutex<Option<Instant>>,
}

impl LimitAlertGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the alert slot at `now`. Fails while the previous alert is
    /// younger than the throttle window.
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let allowed = last.is_none_or(|t| now.saturating_duration_since(t) > ALERT_THROTTLE);
        if allowed {
            *last = Some(now);
        }
        allowed
    }

    /// When the last alert was let through. Throttled attempts do not count.
    pub fn last_alert(&self) -> Option<Instant> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Alert text for an axis whose corrections keep hitting `duration_ms`.
pub fn limit_alert_message(axis: GuideAxis, duration_ms: u32) -> String {
    if duration_ms < MAX_DURATION_MAX_MS {
        let setting = match axis {
            GuideAxis::Ra => "Max RA Duration setting",
            GuideAxis::Dec => "Max Dec Duration setting",
        };
        format!(
            "Your {setting} is preventing the guider from making adequate corrections to keep the \
             star centered. Increasing the {setting} will allow the guider to make the needed corrections."
        )
    } else {
        format!(
            "Even using the maximum moves, the guider can't properly correct for the large guide star \
             movements in {}. Guiding will be impaired until you can eliminate the source of these problems.",
            axis.name()
        )
    }
}

impl Mount {
    /// Issue a guide pulse.
    ///
    /// `normal` moves (guide-algorithm output) are filtered by the Dec guide
    /// mode and clamped to the axis maximum; other moves pass through
    /// unchanged. On pulse failure the performed amount is 0 and
    /// `CalibrationError::MoveFailed` is returned.
    pub fn move_axis(
        &mut self,
        direction: GuideDirection,
        duration_ms: u32,
        normal: bool,
    ) -> Result<MoveResult> {
        if normal && !self.limits.guiding_enabled {
            return Err(eyre::Report::new(CalibrationError::GuidingDisabled));
        }

        let mut duration = duration_ms;
        let mut limited = false;
        if normal {
            let axis = direction.axis();
            let max = match axis {
                GuideAxis::Ra => self.limits.max_ra_ms,
                GuideAxis::Dec => self.limits.max_dec_ms,
            };
            if axis == GuideAxis::Dec && !self.limits.dec_mode.allows(direction) {
                tracing::debug!(
                    %direction,
                    mode = self.limits.dec_mode.name(),
                    "duration set to 0 by Dec guide mode"
                );
                duration = 0;
            }
            if duration > max {
                tracing::debug!(%direction, requested = duration, max, "duration clamped");
                duration = max;
                limited = true;
            }
            let counter = match axis {
                GuideAxis::Ra => &mut self.ra_limit,
                GuideAxis::Dec => &mut self.dec_limit,
            };
            if counter.record(direction, limited) {
                self.alert_limit_reached(duration, axis);
            }
        }

        if duration > 0
            && let Err(e) = self.guider.guide(direction, duration)
        {
            let reason = map_hw_error(&*e).to_string();
            tracing::warn!(%direction, duration, reason = %reason, "guide pulse failed");
            return Err(eyre::Report::new(CalibrationError::MoveFailed {
                direction,
                limited,
                reason,
            }))
            .wrap_err_with(|| format!("move {direction} {duration} ms"));
        }

        tracing::trace!(%direction, amount_ms = duration, limited, "move done");
        Ok(MoveResult {
            amount_ms: duration,
            limited,
        })
    }

    /// Issue a calibration pulse, bypassing guide mode and duration limits.
    pub fn calibration_move(
        &mut self,
        direction: GuideDirection,
        duration_ms: u32,
    ) -> Result<MoveResult> {
        self.move_axis(direction, duration_ms, false)
    }

    fn alert_limit_reached(&mut self, duration_ms: u32, axis: GuideAxis) {
        let key = keys::limit_warning(self.settings.profile_id(), axis.name());
        if !self.settings.get_bool(&key, true) {
            return;
        }
        if !self.limit_gate.try_acquire(self.clock.now()) {
            let since_last_ms = self.limit_gate.last_alert().map(|t| self.clock.ms_since(t));
            tracing::debug!(axis = axis.name(), since_last_ms, "limit alert throttled");
            return;
        }
        let message = limit_alert_message(axis, duration_ms);
        tracing::warn!(axis = axis.name(), duration_ms, "guide limit reached repeatedly");
        self.alerts.show(&Alert {
            kind: AlertKind::LimitReached,
            message,
            suppress_key: Some(key),
            action: None,
        });
    }

    /// Limit-reached run counters, RA first.
    pub const fn limit_counters(&self) -> (LimitCounter, LimitCounter) {
        (self.ra_limit, self.dec_limit)
    }
}
