//! Simulated sky and mount.
//!
//! One `SimulatedSky` is shared by the guider (which moves the star) and the
//! camera (which reports it). Axis directions and rates are known up front so
//! tests can compare a calibration against the truth.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use mountcal_traits::{
    GuideAxis, GuideDirection, GuideRates, HwResult, MoveScheduler, PierSide, Point,
    PointingSource, PulseGuider, SkyCoords,
};

use crate::error::HwError;

const SIDEREAL_ARCSEC_PER_S: f64 = 15.0411;
/// Guide speed used for coordinate reports when none is configured.
const DEFAULT_GUIDE_SPEED: f64 = 0.5;

/// Ground truth for a simulated session.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyParams {
    pub start: Point,
    /// Camera-frame direction the star moves on a West pulse, radians.
    pub ra_angle: f64,
    /// Camera-frame direction the star moves on a North pulse, radians.
    pub dec_angle: f64,
    /// px per ms of pulse.
    pub ra_rate: f64,
    pub dec_rate: f64,
    /// Pulse time swallowed whenever Dec starts moving or reverses.
    pub dec_backlash_ms: u32,
    /// Number of upcoming pulses that fail.
    pub fail_pulses: u32,
    /// Amplitude of the deterministic centroid noise, px.
    pub jitter_px: f64,
    /// Reported by the pointing source, radians.
    pub declination: Option<f64>,
    pub pier_side: PierSide,
    pub guide_rates: Option<GuideRates>,
    /// Reported RA/Dec at the start; `None` when the mount cannot report them.
    pub coordinates: Option<SkyCoords>,
    /// Reported RA rises on West pulses instead of falling.
    pub ra_reversed: bool,
    /// Reported Dec falls on North pulses instead of rising.
    pub dec_reversed: bool,
    /// Pulse time one direction moves before it jams; later pulses that way
    /// move nothing.
    pub jam_after: Option<(GuideDirection, u32)>,
}

impl Default for SkyParams {
    fn default() -> Self {
        Self {
            start: Point::new(400.0, 300.0),
            ra_angle: 15f64.to_radians(),
            dec_angle: 105f64.to_radians(),
            ra_rate: 0.0047,
            dec_rate: 0.005,
            dec_backlash_ms: 0,
            fail_pulses: 0,
            jitter_px: 0.0,
            declination: None,
            pier_side: PierSide::Unknown,
            guide_rates: None,
            coordinates: None,
            ra_reversed: false,
            dec_reversed: false,
            jam_after: None,
        }
    }
}

#[derive(Debug)]
struct SkyState {
    params: SkyParams,
    star: Point,
    connected: bool,
    fail_pulses: u32,
    last_dec: Option<GuideDirection>,
    backlash_left_ms: u32,
    jam_moved_ms: u32,
    coords: Option<SkyCoords>,
    frames: u64,
    pulses: Vec<(GuideDirection, u32)>,
}

impl SkyState {
    fn apply(&mut self, direction: GuideDirection, duration_ms: u32) {
        self.pulses.push((direction, duration_ms));
        let p = &self.params;
        let (angle, rate, sign) = match direction {
            GuideDirection::West => (p.ra_angle, p.ra_rate, 1.0),
            GuideDirection::East => (p.ra_angle, p.ra_rate, -1.0),
            GuideDirection::North => (p.dec_angle, p.dec_rate, 1.0),
            GuideDirection::South => (p.dec_angle, p.dec_rate, -1.0),
        };

        let mut effective = duration_ms;
        if direction.axis() == GuideAxis::Dec {
            if self.last_dec != Some(direction) {
                self.backlash_left_ms = p.dec_backlash_ms;
                self.last_dec = Some(direction);
            }
            let absorbed = self.backlash_left_ms.min(effective);
            self.backlash_left_ms -= absorbed;
            effective -= absorbed;
        }
        if let Some((jammed, limit)) = p.jam_after
            && jammed == direction
        {
            effective = effective.min(limit.saturating_sub(self.jam_moved_ms));
            self.jam_moved_ms += effective;
        }

        let d = sign * rate * f64::from(effective);
        self.star = Point::new(
            self.star.x + d * angle.cos(),
            self.star.y + d * angle.sin(),
        );

        if let Some(c) = self.coords.as_mut() {
            let rates = p.guide_rates.unwrap_or(GuideRates {
                ra: DEFAULT_GUIDE_SPEED,
                dec: DEFAULT_GUIDE_SPEED,
            });
            let (speed, reversed) = match direction.axis() {
                GuideAxis::Ra => (rates.ra, p.ra_reversed),
                GuideAxis::Dec => (rates.dec, p.dec_reversed),
            };
            let arcsec = SIDEREAL_ARCSEC_PER_S * speed * f64::from(effective) / 1000.0;
            let arcsec = if reversed { -arcsec } else { arcsec };
            match direction.axis() {
                // West moves the mount towards lower RA
                GuideAxis::Ra => {
                    c.ra_hours = (c.ra_hours - sign * arcsec / 54_000.0).rem_euclid(24.0);
                }
                GuideAxis::Dec => c.dec_deg += sign * arcsec / 3600.0,
            }
        }
    }
}

/// Shared handle to the simulated sky.
#[derive(Debug, Clone)]
pub struct SimulatedSky {
    state: Rc<RefCell<SkyState>>,
}

impl SimulatedSky {
    pub fn new(params: SkyParams) -> Self {
        let state = SkyState {
            star: params.start,
            connected: true,
            fail_pulses: params.fail_pulses,
            last_dec: None,
            backlash_left_ms: 0,
            jam_moved_ms: 0,
            coords: params.coordinates,
            frames: 0,
            pulses: Vec::new(),
            params,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn guider(&self) -> SimulatedGuider {
        SimulatedGuider { sky: self.clone() }
    }

    pub fn camera(&self) -> SimulatedCamera {
        SimulatedCamera { sky: self.clone() }
    }

    pub fn pointing(&self) -> SimulatedPointing {
        SimulatedPointing { sky: self.clone() }
    }

    /// True star position, without jitter.
    pub fn star(&self) -> Point {
        self.state.borrow().star
    }

    pub fn params(&self) -> SkyParams {
        self.state.borrow().params.clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    /// Make the next `n` pulses fail.
    pub fn fail_next_pulses(&self, n: u32) {
        self.state.borrow_mut().fail_pulses = n;
    }

    /// Every pulse applied so far.
    pub fn pulses(&self) -> Vec<(GuideDirection, u32)> {
        self.state.borrow().pulses.clone()
    }

    pub fn frames(&self) -> u64 {
        self.state.borrow().frames
    }
}

/// Pulse output of the simulated mount.
#[derive(Debug, Clone)]
pub struct SimulatedGuider {
    sky: SimulatedSky,
}

impl PulseGuider for SimulatedGuider {
    fn is_connected(&self) -> bool {
        self.sky.state.borrow().connected
    }

    fn guide(&mut self, direction: GuideDirection, duration_ms: u32) -> HwResult<()> {
        let mut st = self.sky.state.borrow_mut();
        if !st.connected {
            return Err(Box::new(HwError::Disconnected));
        }
        if st.fail_pulses > 0 {
            st.fail_pulses -= 1;
            tracing::debug!(%direction, duration_ms, "simulated pulse failure");
            return Err(Box::new(HwError::PulseRejected("injected failure".into())));
        }
        tracing::trace!(%direction, duration_ms, "simulated pulse");
        st.apply(direction, duration_ms);
        Ok(())
    }
}

/// Star locator of the simulated camera.
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    sky: SimulatedSky,
}

impl SimulatedCamera {
    /// Centroid of the star in the next frame.
    pub fn locate(&mut self) -> Point {
        let mut st = self.sky.state.borrow_mut();
        st.frames += 1;
        let amp = st.params.jitter_px;
        if amp == 0.0 {
            return st.star;
        }
        // Deterministic so failures reproduce
        #[allow(clippy::cast_precision_loss)]
        let n = st.frames as f64;
        Point::new(
            st.star.x + amp * (n * 1.7).sin(),
            st.star.y + amp * (n * 2.3).cos(),
        )
    }
}

/// Mount position report of the simulated mount.
#[derive(Debug, Clone)]
pub struct SimulatedPointing {
    sky: SimulatedSky,
}

impl PointingSource for SimulatedPointing {
    fn declination(&self) -> Option<f64> {
        self.sky.state.borrow().params.declination
    }
    fn pier_side(&self) -> PierSide {
        self.sky.state.borrow().params.pier_side
    }
    fn guide_rates(&self) -> Option<GuideRates> {
        self.sky.state.borrow().params.guide_rates
    }
    fn coordinates(&self) -> Option<SkyCoords> {
        self.sky.state.borrow().coords
    }
}

/// Move scheduler that queues pulses for the driving loop to execute.
#[derive(Debug, Clone, Default)]
pub struct MoveQueue {
    inner: Rc<RefCell<VecDeque<(GuideDirection, u32)>>>,
}

impl MoveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<(GuideDirection, u32)> {
        self.inner.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl MoveScheduler for MoveQueue {
    fn schedule_move(&mut self, direction: GuideDirection, duration_ms: u32) -> HwResult<()> {
        self.inner.borrow_mut().push_back((direction, duration_ms));
        Ok(())
    }
}
