//! Runtime configuration for the controller.
//!
//! These are the structs the controller consumes. They are separate from the
//! TOML-deserialized config in `motorbench_config`; see `conversions` for the
//! bridge. Defaults are the reference rig's values.

pub use crate::command::ParseMode;
pub use crate::recorder::{RecordFormat, RecordMode};

/// Periodic activity intervals, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingCfg {
    /// Sampling tick period (250 Hz at 4 ms).
    pub sample_interval_ms: u32,
    /// Time spent on each duty plateau during a capture.
    pub step_interval_ms: u32,
    /// Manual-mode report throttle.
    pub report_interval_ms: u32,
    /// Samples are not recorded for this long after a duty change.
    pub settle_ms: u32,
    /// Also open a settling window when a capture starts.
    pub settle_on_start: bool,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            sample_interval_ms: 4,
            step_interval_ms: 2000,
            report_interval_ms: 500,
            settle_ms: 100,
            settle_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderCfg {
    pub pulses_per_revolution: u32,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            pulses_per_revolution: 20,
        }
    }
}

/// Capture record layout and persistence strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCfg {
    pub format: RecordFormat,
    pub mode: RecordMode,
    /// Buffered mode only: samples beyond this are dropped.
    pub max_samples: usize,
}

impl Default for RecordCfg {
    fn default() -> Self {
        Self {
            format: RecordFormat::Semicolon,
            mode: RecordMode::Streaming,
            max_samples: 10_000,
        }
    }
}
