//! Calibration driver: config mapping, simulated mount assembly and the
//! frame loop.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use mountcal_config::{Config, ProfileSettings, export_steps_csv};
use mountcal_core::mocks::{FixedImaging, FixedPointing};
use mountcal_core::notify::FileCalibrationLog;
use mountcal_core::{
    CalibrationError, CalibrationIssue, CalibrationStatus, Mount, MountBuilder, ReviewDecision,
    Set,
};
use mountcal_hardware::{MoveQueue, SimulatedSky, SkyParams};
use mountcal_traits::{GuideParity, Point};

/// Options of the `calibrate` subcommand.
#[derive(Debug, Default)]
pub struct CalibrateOpts {
    pub export_steps: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub max_frames: Option<u32>,
    pub guide_log: Option<PathBuf>,
}

/// Result of a finished calibration, in display units.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSummary {
    pub x_angle_deg: f64,
    pub y_angle_deg: f64,
    /// px per second.
    pub x_rate: f64,
    /// px per second; `None` when Dec was not calibrated.
    pub y_rate: Option<f64>,
    pub ra_steps: u32,
    pub dec_steps: u32,
    pub ortho_error_deg: f64,
    pub ra_parity: GuideParity,
    pub dec_parity: GuideParity,
    pub issue: CalibrationIssue,
    pub frames: u32,
    pub settings: String,
}

impl CalibrationSummary {
    fn from_mount(mount: &Mount, frames: u32) -> Self {
        let cal = mount.calibration();
        let details = mount.calibration_details();
        Self {
            x_angle_deg: cal.x_angle.to_degrees(),
            y_angle_deg: cal.y_angle.to_degrees(),
            x_rate: cal.x_rate * 1000.0,
            y_rate: cal.is_dec_calibrated().then(|| cal.y_rate * 1000.0),
            ra_steps: details.ra_step_count,
            dec_steps: details.dec_step_count,
            ortho_error_deg: details.ortho_error,
            ra_parity: cal.ra_guide_parity,
            dec_parity: cal.dec_guide_parity,
            issue: details.last_issue,
            frames,
            settings: mount.settings_summary(),
        }
    }

    pub fn to_text(&self) -> String {
        let y_rate = self
            .y_rate
            .map_or_else(|| "uncalibrated".to_string(), |r| format!("{r:.3} px/s"));
        format!(
            "{}\ncalibration complete\n  RA:  angle = {:.1} deg, rate = {:.3} px/s, steps = {}, parity = {}\n  Dec: angle = {:.1} deg, rate = {}, steps = {}, parity = {}\n  orthogonality error = {:.1} deg, issue = {}, frames = {}",
            self.settings,
            self.x_angle_deg,
            self.x_rate,
            self.ra_steps,
            self.ra_parity.name(),
            self.y_angle_deg,
            y_rate,
            self.dec_steps,
            self.dec_parity.name(),
            self.ortho_error_deg,
            self.issue.name(),
            self.frames
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "status": "complete",
            "x_angle_deg": self.x_angle_deg,
            "y_angle_deg": self.y_angle_deg,
            "x_rate_px_per_s": self.x_rate,
            "y_rate_px_per_s": self.y_rate,
            "ra_steps": self.ra_steps,
            "dec_steps": self.dec_steps,
            "ortho_error_deg": self.ortho_error_deg,
            "ra_parity": self.ra_parity.name(),
            "dec_parity": self.dec_parity.name(),
            "issue": self.issue.name(),
            "frames": self.frames,
            "settings": self.settings,
        })
        .to_string()
    }
}

/// Simulated sky for `cfg`; the pointing section feeds the simulated
/// mount's position report.
pub fn sky_params(cfg: &Config) -> SkyParams {
    let sim = &cfg.simulation;
    let pointing = FixedPointing::from(&cfg.pointing);
    SkyParams {
        start: Point::new(sim.start_x, sim.start_y),
        ra_angle: sim.ra_angle_deg.to_radians(),
        dec_angle: sim.dec_angle_deg.to_radians(),
        ra_rate: sim.ra_rate_px_per_ms,
        dec_rate: sim.dec_rate_px_per_ms,
        dec_backlash_ms: sim.dec_backlash_ms,
        fail_pulses: sim.fail_pulses,
        jitter_px: sim.jitter_px,
        declination: pointing.declination,
        pier_side: pointing.pier_side,
        guide_rates: pointing.rates,
        coordinates: pointing.coordinates,
        ..SkyParams::default()
    }
}

fn load_settings(cfg: &Config, path: Option<&Path>) -> eyre::Result<ProfileSettings> {
    let mut settings = ProfileSettings::from_config(cfg);
    if let Some(p) = path {
        let saved = ProfileSettings::load(p, cfg.alerts.profile_id)?;
        settings.merge_from(&saved);
    }
    Ok(settings)
}

fn assemble(
    cfg: &Config,
    sky: &SimulatedSky,
    queue: &MoveQueue,
    settings: &Rc<RefCell<ProfileSettings>>,
    guide_log: Option<&Path>,
) -> eyre::Result<Mount> {
    let mut builder: MountBuilder<Set, Set> = Mount::builder()
        .with_guider(sky.guider())
        .with_scheduler(queue.clone())
        .with_pointing(sky.pointing())
        .with_imaging(FixedImaging::from(&cfg.camera))
        .with_settings(Rc::clone(settings))
        .with_calibration_cfg((&cfg.calibration).into())
        .with_limits((&cfg.guide).into());
    if let Some(p) = guide_log {
        builder = builder.with_log(FileCalibrationLog::new(p));
    }
    builder.build()
}

/// Run one calibration against the simulated mount described by `cfg`.
pub fn run_calibration(
    cfg: &Config,
    opts: &CalibrateOpts,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<CalibrationSummary> {
    let settings = Rc::new(RefCell::new(load_settings(cfg, opts.settings.as_deref())?));
    let sky = SimulatedSky::new(sky_params(cfg));
    let queue = MoveQueue::new();
    let mut mount = assemble(cfg, &sky, &queue, &settings, opts.guide_log.as_deref())
        .wrap_err("assemble mount")?;
    let max_frames = opts.max_frames.unwrap_or(cfg.simulation.max_frames);

    let mut camera = sky.camera();
    mount.begin_calibration(camera.locate())?;
    tracing::info!(max_frames, "calibration start");

    let mut frames = 0;
    let mut complete = false;
    while frames < max_frames {
        if shutdown.load(Ordering::Relaxed) {
            mount.clear_calibration();
            eyre::bail!("calibration interrupted");
        }
        frames += 1;
        if mount.step(camera.locate())? == CalibrationStatus::Complete {
            complete = true;
            break;
        }
        while let Some((direction, ms)) = queue.pop() {
            if let Err(e) = mount.calibration_move(direction, ms) {
                if !mount.is_connected() {
                    return Err(eyre::Report::new(CalibrationError::NotConnected))
                        .wrap_err("calibration move");
                }
                tracing::warn!(error = %e, "calibration move failed; continuing");
            }
        }
    }
    if !complete {
        mount.clear_calibration();
        return Err(eyre::Report::new(CalibrationError::State(format!(
            "calibration did not complete within {max_frames} frames"
        ))));
    }

    if let Some(review) = mount.pending_review() {
        tracing::info!(issue = review.issue.name(), "accepting calibration with advisory");
        mount.apply_review(ReviewDecision::Accept)?;
    }

    if let Some(p) = &opts.settings {
        settings.borrow().save(p)?;
    }
    if let Some(p) = &opts.export_steps {
        let details = mount.calibration_details();
        export_steps_csv(p, &details.ra_steps, &details.dec_steps)?;
        tracing::info!(path = %p.display(), "exported calibration steps");
    }

    let summary = CalibrationSummary::from_mount(&mount, frames);
    tracing::info!(
        x_angle_deg = summary.x_angle_deg,
        y_angle_deg = summary.y_angle_deg,
        ra_steps = summary.ra_steps,
        dec_steps = summary.dec_steps,
        issue = summary.issue.name(),
        "calibration complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn default_simulation_calibrates() {
        let cfg = Config::default();
        let s = run_calibration(&cfg, &CalibrateOpts::default(), &quiet()).unwrap();
        assert!(s.to_text().contains("Calibration step = 750 ms"));
        assert!((s.x_angle_deg - 15.0).abs() < 1.0);
        assert!(s.y_rate.is_some());
        assert!(s.ra_steps > 0 && s.dec_steps > 0);
    }

    #[test]
    fn pointing_section_reaches_the_sky() {
        let mut cfg = Config::default();
        cfg.pointing.declination_deg = Some(30.0);
        cfg.pointing.pier_side = mountcal_config::PierSideCfg::West;
        let p = sky_params(&cfg);
        assert!((p.declination.unwrap() - 30f64.to_radians()).abs() < 1e-12);
        assert_eq!(p.pier_side, mountcal_traits::PierSide::West);
        assert!((p.ra_angle - 15f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn reported_coordinates_give_parity() {
        let mut cfg = Config::default();
        cfg.pointing.ra_hours = Some(6.5);
        cfg.pointing.declination_deg = Some(20.0);
        let s = run_calibration(&cfg, &CalibrateOpts::default(), &quiet()).unwrap();
        assert_eq!(s.ra_parity, GuideParity::Even);
        assert_eq!(s.dec_parity, GuideParity::Even);

        let s = run_calibration(&Config::default(), &CalibrateOpts::default(), &quiet()).unwrap();
        assert_eq!(s.ra_parity, GuideParity::Unknown);
        assert!(s.to_text().contains("parity = Unknown"));
    }

    #[test]
    fn shutdown_flag_interrupts() {
        let cfg = Config::default();
        let flag = Arc::new(AtomicBool::new(true));
        let err = run_calibration(&cfg, &CalibrateOpts::default(), &flag).unwrap_err();
        assert!(err.to_string().contains("interrupted"));
    }

    #[test]
    fn frame_budget_exhaustion_is_a_state_error() {
        let cfg = Config::default();
        let opts = CalibrateOpts {
            max_frames: Some(3),
            ..CalibrateOpts::default()
        };
        let err = run_calibration(&cfg, &opts, &quiet()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalibrationError>(),
            Some(CalibrationError::State(_))
        ));
    }
}
