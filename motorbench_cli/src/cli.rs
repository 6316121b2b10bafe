//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Capture parameters of the current run (for JSON error details).
pub static LAST_CAPTURE: OnceLock<CaptureContext> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct CaptureContext {
    pub path: PathBuf,
    pub step: Option<u8>,
}

#[derive(Parser, Debug)]
#[command(name = "motorbench", version, about = "DC motor characterization bench")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/motorbench.toml")]
    pub config: PathBuf,

    /// Log and print operator output as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

/// Options shared by the commands that drive the motor.
#[derive(Args, Debug, Clone)]
pub struct LoopOpts {
    /// Capture record path (overrides [capture] path)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
    /// Reject unusable or out-of-range command arguments instead of clamping
    #[arg(long, action = ArgAction::SetTrue)]
    pub strict: bool,
    /// Print control loop stats on exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub stats: bool,
    /// Enable real-time mode (SCHED_FIFO, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and locks the process address space into RAM with mlockall. This keeps the sampling loop on time but may require CAP_SYS_NICE / CAP_IPC_LOCK or root. Ignored on other platforms."
    )]
    pub rt: bool,
    /// SCHED_FIFO priority when --rt is enabled (clamped to the system range)
    #[arg(long, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt
    #[arg(long, value_enum, value_name = "MODE", default_value = "current")]
    pub rt_lock: RtLock,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive bench: read START/PWM commands from stdin until EOF
    Run {
        #[command(flatten)]
        opts: LoopOpts,
    },
    /// Run one unattended capture sweep and exit
    Capture {
        /// Duty increment per profile step (percent)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        step: u8,
        #[command(flatten)]
        opts: LoopOpts,
    },
    /// Summarize a capture record as a speed-versus-duty curve
    Inspect {
        /// Capture record to read
        file: PathBuf,
    },
    /// Quick health check: drive the motor briefly and expect encoder edges
    SelfCheck,
}
