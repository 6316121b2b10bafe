//! `From` implementations bridging `motorbench_config` types to controller types.

use crate::command::ParseMode;
use crate::config::{EncoderCfg, RecordCfg, RecordFormat, RecordMode, TimingCfg};

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&motorbench_config::TimingCfg> for TimingCfg {
    fn from(c: &motorbench_config::TimingCfg) -> Self {
        Self {
            sample_interval_ms: c.sample_interval_ms,
            step_interval_ms: c.step_interval_ms,
            report_interval_ms: c.report_interval_ms,
            settle_ms: c.settle_ms,
            settle_on_start: c.settle_on_start,
        }
    }
}

// ── EncoderCfg ───────────────────────────────────────────────────────────────

impl From<&motorbench_config::EncoderCfg> for EncoderCfg {
    fn from(c: &motorbench_config::EncoderCfg) -> Self {
        Self {
            pulses_per_revolution: c.pulses_per_revolution,
        }
    }
}

// ── RecordCfg ────────────────────────────────────────────────────────────────

impl From<motorbench_config::RecordFormat> for RecordFormat {
    fn from(f: motorbench_config::RecordFormat) -> Self {
        match f {
            motorbench_config::RecordFormat::Semicolon => RecordFormat::Semicolon,
            motorbench_config::RecordFormat::Comma => RecordFormat::Comma,
        }
    }
}

impl From<motorbench_config::RecordMode> for RecordMode {
    fn from(m: motorbench_config::RecordMode) -> Self {
        match m {
            motorbench_config::RecordMode::Streaming => RecordMode::Streaming,
            motorbench_config::RecordMode::Buffered => RecordMode::Buffered,
        }
    }
}

impl From<&motorbench_config::CaptureCfg> for RecordCfg {
    fn from(c: &motorbench_config::CaptureCfg) -> Self {
        Self {
            format: c.format.into(),
            mode: c.mode.into(),
            max_samples: c.max_samples,
        }
    }
}

// ── ParseMode ────────────────────────────────────────────────────────────────

impl From<&motorbench_config::CommandsCfg> for ParseMode {
    fn from(c: &motorbench_config::CommandsCfg) -> Self {
        if c.strict {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        }
    }
}
