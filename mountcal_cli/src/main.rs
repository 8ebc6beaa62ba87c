use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod calibrate;
mod cli;
mod error_fmt;

use calibrate::{CalibrateOpts, run_calibration};
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{CONFIG_CONTEXT, exit_code_for_error, format_error_json, humanize};
use mountcal_traits::Point;

fn load_config(path: &Path) -> eyre::Result<mountcal_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))
        .wrap_err(CONFIG_CONTEXT)?;
    let cfg = mountcal_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))
        .wrap_err(CONFIG_CONTEXT)?;
    cfg.validate().wrap_err(CONFIG_CONTEXT)?;
    Ok(cfg)
}

fn init_tracing(json: bool, level: &str, file: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (text_layer, json_layer) = if json {
        (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        )
    };

    let file_layer = file.map(|p| {
        let path = Path::new(p);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "mountcal.log".into(), |n| n.to_string_lossy().into_owned());
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init();
}

fn run(cli: Cli, shutdown: &Arc<AtomicBool>) -> eyre::Result<()> {
    match cli.cmd {
        Commands::Transform {
            x_angle,
            y_angle,
            dx,
            dy,
        } => {
            let mount = mountcal_core::mount_coords(
                Point::new(dx, dy),
                x_angle.to_radians(),
                y_angle.to_radians(),
            );
            if cli.json {
                println!("{}", serde_json::json!({ "ra": mount.x, "dec": mount.y }));
            } else {
                println!("ra = {:.3}, dec = {:.3}", mount.x, mount.y);
            }
            Ok(())
        }
        Commands::SelfCheck => {
            load_config(&cli.config)?;
            println!("OK");
            Ok(())
        }
        Commands::Calibrate {
            export_steps,
            settings,
            max_frames,
        } => {
            let cfg = load_config(&cli.config)?;
            let level = cli
                .log_level
                .as_deref()
                .or(cfg.logging.level.as_deref())
                .unwrap_or("info");
            init_tracing(cli.json, level, cfg.logging.file.as_deref());

            let opts = CalibrateOpts {
                export_steps,
                settings,
                max_frames,
                guide_log: cli.guide_log,
            };
            let summary = run_calibration(&cfg, &opts, shutdown)?;
            if cli.json {
                println!("{}", summary.to_json());
            } else {
                println!("{}", summary.to_text());
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            eprintln!("warning: could not install Ctrl-C handler: {e}");
        }
    }

    if let Err(e) = run(cli, &shutdown) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}
