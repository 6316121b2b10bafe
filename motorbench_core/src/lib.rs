#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core motor characterization logic (hardware-agnostic).
//!
//! This crate provides the controller that sweeps a DC motor through a duty
//! profile while measuring its speed. All hardware interactions go through the
//! `motorbench_traits` seams: `DutyActuator`, `RecordSink`, `Operator`,
//! `CommandSource`, and `EdgeHandler` for the encoder interrupt.
//!
//! ## Architecture
//!
//! - **Pulses**: lock-free edge counter shared with the interrupt (`pulse`)
//! - **Speed**: pulse count over a measured interval to RPM (`speed`)
//! - **Duty**: saturating actuator wrapper (`duty`)
//! - **Profile**: ramp-up/ramp-down duty sequence (`profile`)
//! - **Commands**: `START <step>` / `PWM <duty>` line parser (`command`)
//! - **Recording**: capture session and record encoding (`recorder`)
//! - **Control**: the `Idle`/`Manual`/`Capturing` state machine (`controller`)
//!
//! ## Timing
//!
//! Every periodic decision compares 32-bit millisecond ticks with wrapping
//! subtraction, so the controller keeps its cadence across counter rollover.

pub mod builder;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod duty;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod profile;
pub mod pulse;
pub mod recorder;
pub mod runner;
pub mod speed;
pub mod status;
pub mod transport;

pub use builder::{BoxedController, ControllerBuilder, Missing};
pub use command::{Command, ParseMode, parse, parse_with};
pub use config::{EncoderCfg, RecordCfg, TimingCfg};
pub use controller::{Controller, ControllerMode};
pub use duty::{DutyCycleDriver, MAX_DUTY, clamp_percent, to_native};
pub use error::{BenchError, BuildError, Report, Result};
pub use profile::{Direction, ProfileStep, StepProfile};
pub use pulse::PulseCounter;
pub use recorder::{
    CaptureRecorder, CaptureSession, CaptureSummary, RecordFormat, RecordMode, Sample,
};
pub use runner::{RunParams, RunSummary, run};
pub use speed::{SpeedEstimator, estimate_rpm};
pub use status::{Reading, SessionEnd, TickOutcome};
pub use transport::{ChannelCommands, spawn_line_reader};
