//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use rcsense_core::ReadMode;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rcsense", version, about = "RC reflectance and bump sensor CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/rcsense.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Emitter handling for a read; defaults to the config's `line.mode`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    /// Emitters on for the read
    On,
    /// Emitters off (ambient light only)
    Off,
    /// Emitters left as they are
    Manual,
}

impl From<ModeArg> for ReadMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::On => Self::On,
            ModeArg::Off => Self::Off,
            ModeArg::Manual => Self::Manual,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print raw discharge times for the line array
    Read {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Number of reads to print
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Learn per-channel bounds and write them to a CSV file
    Calibrate {
        /// Calibration batches to run (overrides line.calibration_batches)
        #[arg(long)]
        batches: Option<u32>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Output CSV (mode,channel,minimum,maximum); other modes in an existing file are kept
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Print line positions using stored calibration
    Line {
        /// Track a light line on a dark surface
        #[arg(long, action = ArgAction::SetTrue)]
        white: bool,
        /// Number of positions to print
        #[arg(long, default_value_t = 10)]
        count: u32,
        /// Calibration CSV (falls back to the config's [calibration] table)
        #[arg(long, value_name = "FILE")]
        calibration: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Stream line positions from a background sampler until Ctrl-C
    Watch {
        /// Track a light line on a dark surface
        #[arg(long, action = ArgAction::SetTrue)]
        white: bool,
        /// Stop after this many samples
        #[arg(long)]
        count: Option<u32>,
        /// Calibration CSV (falls back to the config's [calibration] table)
        #[arg(long, value_name = "FILE")]
        calibration: Option<PathBuf>,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and calls mlockall(MCL_CURRENT|MCL_FUTURE) so pulse timing is not disturbed by preemption or page faults. May require CAP_SYS_NICE / CAP_IPC_LOCK or root. Ignored with a warning on other OSes."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (1..=max)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
    },
    /// Calibrate the bump sensors, then print pressed bits
    Bump {
        /// Number of reads to print
        #[arg(long, default_value_t = 10)]
        count: u32,
    },
    /// Quick health check (one raw pass on each array)
    SelfCheck,
}
