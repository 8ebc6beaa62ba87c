#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, per-profile settings and step export for mount calibration.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `ProfileSettings` is the persisted key/value store the calibration core
//!   reads and writes through `mountcal_traits::SettingsStore`.
//! - Calibration step vectors can be exported to CSV for plotting.
use serde::{Deserialize, Serialize};

pub mod atomic;
pub mod settings;
pub mod steps;

pub use settings::{ProfileSettings, keys};
pub use steps::{StepAxis, StepRow, export_steps_csv, load_steps_csv};

/// Dec guide mode as written in the config file.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecMode {
    Off,
    #[default]
    Auto,
    North,
    South,
}

impl DecMode {
    /// Integer code stored under `/scope/DecGuideMode`.
    pub const fn code(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Auto => 1,
            Self::North => 2,
            Self::South => 3,
        }
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::Auto),
            2 => Some(Self::North),
            3 => Some(Self::South),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PierSideCfg {
    East,
    West,
    #[default]
    Unknown,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Duration of one calibration pulse (ms).
    pub step_ms: u32,
    /// Force the Dec axis to be perpendicular to RA.
    pub assume_orthogonal: bool,
    /// Return to the start position with larger pulses.
    pub fast_recenter: bool,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            step_ms: 750,
            assume_orthogonal: false,
            fast_recenter: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GuideCfg {
    pub max_ra_ms: u32,
    pub max_dec_ms: u32,
    pub dec_mode: DecMode,
    /// Master switch for normal (non-calibration) guide moves.
    pub enabled: bool,
}

impl Default for GuideCfg {
    fn default() -> Self {
        Self {
            max_ra_ms: 2500,
            max_dec_ms: 2500,
            dec_mode: DecMode::Auto,
            enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CameraCfg {
    pub sensor_height_px: u32,
    pub pixel_size_um: f64,
    pub focal_length_mm: f64,
    pub binning: u16,
    /// Largest star displacement the guider tracks between frames (px).
    pub max_move_px: f64,
    pub rotator_angle_deg: Option<f64>,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self {
            sensor_height_px: 1024,
            pixel_size_um: 5.2,
            focal_length_mm: 400.0,
            binning: 1,
            max_move_px: 7.0,
            rotator_angle_deg: None,
        }
    }
}

impl CameraCfg {
    /// Image scale in arc-seconds per binned pixel.
    pub fn pixel_scale(&self) -> f64 {
        206.265 * self.pixel_size_um * f64::from(self.binning) / self.focal_length_mm
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PointingCfg {
    /// Reported coordinates need both `ra_hours` and `declination_deg`.
    pub ra_hours: Option<f64>,
    pub declination_deg: Option<f64>,
    pub pier_side: PierSideCfg,
    /// Guide speeds as a multiple of sidereal; both must be present to be used.
    pub ra_guide_speed: Option<f64>,
    pub dec_guide_speed: Option<f64>,
}

/// Alert toggles. `true` means the warning is shown.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertsCfg {
    pub profile_id: i32,
    pub steps: bool,
    pub angle: bool,
    pub difference: bool,
    pub rates: bool,
    pub max_ra_limit: bool,
    pub max_dec_limit: bool,
}

impl Default for AlertsCfg {
    fn default() -> Self {
        Self {
            profile_id: 0,
            steps: true,
            angle: true,
            difference: true,
            rates: true,
            max_ra_limit: true,
            max_dec_limit: true,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

/// Parameters of the simulated sky used by the CLI.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationCfg {
    pub start_x: f64,
    pub start_y: f64,
    /// Camera-frame direction of a west move (deg).
    pub ra_angle_deg: f64,
    /// Camera-frame direction of a north move (deg).
    pub dec_angle_deg: f64,
    pub ra_rate_px_per_ms: f64,
    pub dec_rate_px_per_ms: f64,
    /// Pulse time swallowed by Dec gear slack after a direction reversal.
    pub dec_backlash_ms: u32,
    /// Number of pulses rejected by the simulated mount before it recovers.
    pub fail_pulses: u32,
    /// Peak deterministic centroid noise (px).
    pub jitter_px: f64,
    /// Upper bound on frames processed by one calibration run.
    pub max_frames: u32,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            start_x: 400.0,
            start_y: 300.0,
            ra_angle_deg: 15.0,
            dec_angle_deg: 105.0,
            ra_rate_px_per_ms: 0.0047,
            dec_rate_px_per_ms: 0.005,
            dec_backlash_ms: 1500,
            fail_pulses: 0,
            jitter_px: 0.0,
            max_frames: 500,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationCfg,
    pub guide: GuideCfg,
    pub camera: CameraCfg,
    pub pointing: PointingCfg,
    pub alerts: AlertsCfg,
    pub logging: Logging,
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Calibration
        if self.calibration.step_ms == 0 {
            eyre::bail!("calibration.step_ms must be > 0");
        }
        if self.calibration.step_ms > 10_000 {
            eyre::bail!("calibration.step_ms is unreasonably large (>10s)");
        }

        // Guide
        if !(50..=5000).contains(&self.guide.max_ra_ms) {
            eyre::bail!("guide.max_ra_ms must be in [50, 5000]");
        }
        if !(50..=5000).contains(&self.guide.max_dec_ms) {
            eyre::bail!("guide.max_dec_ms must be in [50, 5000]");
        }

        // Camera
        if self.camera.sensor_height_px == 0 {
            eyre::bail!("camera.sensor_height_px must be > 0");
        }
        if !(self.camera.pixel_size_um.is_finite() && self.camera.pixel_size_um > 0.0) {
            eyre::bail!("camera.pixel_size_um must be > 0");
        }
        if !(self.camera.focal_length_mm.is_finite() && self.camera.focal_length_mm > 0.0) {
            eyre::bail!("camera.focal_length_mm must be > 0");
        }
        if self.camera.binning == 0 {
            eyre::bail!("camera.binning must be >= 1");
        }
        if !(self.camera.max_move_px.is_finite() && self.camera.max_move_px > 0.0) {
            eyre::bail!("camera.max_move_px must be > 0");
        }
        if let Some(a) = self.camera.rotator_angle_deg
            && !(0.0..360.0).contains(&a)
        {
            eyre::bail!("camera.rotator_angle_deg must be in [0, 360)");
        }

        // Pointing
        if let Some(dec) = self.pointing.declination_deg
            && !(-90.0..=90.0).contains(&dec)
        {
            eyre::bail!("pointing.declination_deg must be in [-90, 90]");
        }
        if let Some(ra) = self.pointing.ra_hours
            && !(0.0..24.0).contains(&ra)
        {
            eyre::bail!("pointing.ra_hours must be in [0, 24)");
        }
        for (name, v) in [
            ("ra_guide_speed", self.pointing.ra_guide_speed),
            ("dec_guide_speed", self.pointing.dec_guide_speed),
        ] {
            if let Some(s) = v
                && !(s.is_finite() && s > 0.0)
            {
                eyre::bail!("pointing.{name} must be > 0");
            }
        }

        // Simulation
        let sim = &self.simulation;
        for (name, v) in [
            ("start_x", sim.start_x),
            ("start_y", sim.start_y),
            ("ra_angle_deg", sim.ra_angle_deg),
            ("dec_angle_deg", sim.dec_angle_deg),
            ("jitter_px", sim.jitter_px),
        ] {
            if !v.is_finite() {
                eyre::bail!("simulation.{name} must be finite");
            }
        }
        if !(sim.ra_rate_px_per_ms.is_finite() && sim.ra_rate_px_per_ms >= 0.0) {
            eyre::bail!("simulation.ra_rate_px_per_ms must be >= 0");
        }
        if !(sim.dec_rate_px_per_ms.is_finite() && sim.dec_rate_px_per_ms >= 0.0) {
            eyre::bail!("simulation.dec_rate_px_per_ms must be >= 0");
        }
        if sim.jitter_px < 0.0 {
            eyre::bail!("simulation.jitter_px must be >= 0");
        }
        if sim.max_frames == 0 {
            eyre::bail!("simulation.max_frames must be >= 1");
        }

        Ok(())
    }
}
