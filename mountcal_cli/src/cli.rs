//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "mountcal", version, about = "Mount guide calibration")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/mountcal.toml")]
    pub config: PathBuf,

    /// Log and print results as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Append calibration step records to this file
    #[arg(long = "guide-log", value_name = "FILE")]
    pub guide_log: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full calibration against the simulated mount
    Calibrate {
        /// Write the RA/Dec step vectors to this CSV file
        #[arg(long, value_name = "CSV")]
        export_steps: Option<PathBuf>,
        /// Profile settings file; loaded before and saved after the run
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,
        /// Override simulation.max_frames
        #[arg(long, value_name = "N")]
        max_frames: Option<u32>,
    },
    /// Validate the configuration
    SelfCheck,
    /// Convert a camera-frame displacement to mount RA/Dec
    #[command(allow_negative_numbers = true)]
    Transform {
        /// RA axis angle in the camera frame (degrees)
        #[arg(long)]
        x_angle: f64,
        /// Dec axis angle in the camera frame (degrees)
        #[arg(long)]
        y_angle: f64,
        /// Camera-frame x displacement (px)
        dx: f64,
        /// Camera-frame y displacement (px)
        dy: f64,
    },
}
