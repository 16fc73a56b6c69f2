mod cli;
mod error_fmt;
mod hw;
mod rt;
mod sense;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use rcsense_config::{Config, Logging};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::sense::Ctx;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let _ = color_eyre::install();

    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let rig = hw::open(&cfg)?;
    let ctx = Ctx {
        cfg: &cfg,
        json: cli.json,
        shutdown,
    };

    match cli.cmd {
        Commands::Read { mode, count } => sense::read(&ctx, rig, mode, count),
        Commands::Calibrate { batches, mode, out } => {
            sense::calibrate(&ctx, rig, batches, mode, &out)
        }
        Commands::Line {
            white,
            count,
            calibration,
            mode,
        } => sense::line(&ctx, rig, white, count, calibration.as_deref(), mode),
        Commands::Watch {
            white,
            count,
            calibration,
            rt,
            rt_prio,
        } => sense::watch(&ctx, rig, white, count, calibration.as_deref(), (rt, rt_prio)),
        Commands::Bump { count } => sense::bump(&ctx, rig, count),
        Commands::SelfCheck => sense::self_check(&ctx, rig),
    }
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = rcsense_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))?;
    cfg.validate()
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout carries only command output.
fn init_tracing(json: bool, level: &str, logging: &Logging) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid --log-level '{level}'"))?;
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
                .wrap_err("invalid logging.level")?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
