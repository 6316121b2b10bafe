#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and capture-record parsing for the motor test bench.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The capture-record loader accepts either record layout the controller
//!   writes and reduces it to a per-plateau speed curve.
use serde::{Deserialize, Serialize};

/// Capture record row.
///
/// Accepted layouts:
/// delta;pwm;rpm
/// timestamp,PWM,RPM
///
/// Example:
/// delta;pwm;rpm
/// 4;0;0
/// 2100;20;1380
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRow {
    pub elapsed_ms: u32,
    pub duty_percent: u8,
    pub rpm: u32,
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// PWM output driving the H-bridge enable input.
    pub pwm: u8,
    /// H-bridge direction inputs; held at forward (in1 high, in2 low).
    pub in1: u8,
    pub in2: u8,
    /// Encoder input; rising edges are counted.
    pub encoder: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    pub sample_interval_ms: u32,
    pub step_interval_ms: u32,
    pub report_interval_ms: u32,
    pub settle_ms: u32,
    /// Also suppress samples right after START
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PwmCfg {
    pub frequency_hz: u32,
    /// Native value for 100% duty (65535 for a 16-bit register).
    pub full_scale: u32,
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            frequency_hz: 1000,
            full_scale: 65535,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Semicolon,
    Comma,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    #[default]
    Streaming,
    Buffered,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureCfg {
    pub path: String,
    pub format: RecordFormat,
    pub mode: RecordMode,
    /// Buffered mode capacity
    pub max_samples: usize,
}

impl Default for CaptureCfg {
    fn default() -> Self {
        Self {
            path: "curvita.csv".into(),
            format: RecordFormat::Semicolon,
            mode: RecordMode::Streaming,
            max_samples: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CommandsCfg {
    /// Reject unusable or out-of-range arguments instead of defaulting/clamping
    pub strict: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Sleep between control-loop passes (µs)
    pub idle_sleep_us: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self { idle_sleep_us: 500 }
    }
}

/// Motor model used when no hardware backend is compiled in.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    /// Steady-state speed at 100% duty
    pub max_rpm: u32,
    /// First-order lag time constant
    pub time_constant_ms: u32,
    /// Duty below which the shaft does not turn
    pub deadband_percent: u8,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            max_rpm: 3000,
            time_constant_ms: 150,
            deadband_percent: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub encoder: EncoderCfg,
    #[serde(default)]
    pub timing: TimingCfg,
    #[serde(default)]
    pub pwm: PwmCfg,
    #[serde(default)]
    pub capture: CaptureCfg,
    #[serde(default)]
    pub commands: CommandsCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let p = &self.pins;
        let all = [p.pwm, p.in1, p.in2, p.encoder];
        for (i, a) in all.iter().enumerate() {
            if all[i + 1..].contains(a) {
                eyre::bail!("pins must be distinct (gpio {a} assigned twice)");
            }
        }

        // Encoder
        if self.encoder.pulses_per_revolution == 0 {
            eyre::bail!("encoder.pulses_per_revolution must be > 0");
        }

        // Timing
        let t = &self.timing;
        if t.sample_interval_ms == 0 {
            eyre::bail!("timing.sample_interval_ms must be > 0");
        }
        if t.step_interval_ms == 0 {
            eyre::bail!("timing.step_interval_ms must be > 0");
        }
        if t.report_interval_ms == 0 {
            eyre::bail!("timing.report_interval_ms must be > 0");
        }
        if t.settle_ms >= t.step_interval_ms {
            eyre::bail!("timing.settle_ms must be < timing.step_interval_ms");
        }
        if t.step_interval_ms < t.sample_interval_ms {
            eyre::bail!("timing.step_interval_ms must be >= timing.sample_interval_ms");
        }

        // PWM
        if self.pwm.frequency_hz == 0 {
            eyre::bail!("pwm.frequency_hz must be > 0");
        }
        if self.pwm.full_scale == 0 {
            eyre::bail!("pwm.full_scale must be > 0");
        }

        // Capture
        if self.capture.path.trim().is_empty() {
            eyre::bail!("capture.path must not be empty");
        }
        if self.capture.mode == RecordMode::Buffered && self.capture.max_samples == 0 {
            eyre::bail!("capture.max_samples must be >= 1 in buffered mode");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        // Runner
        if self.runner.idle_sleep_us >= u64::from(t.sample_interval_ms) * 1000 {
            eyre::bail!("runner.idle_sleep_us must be shorter than timing.sample_interval_ms");
        }

        // Simulation
        if self.simulation.max_rpm == 0 {
            eyre::bail!("simulation.max_rpm must be > 0");
        }
        if self.simulation.time_constant_ms == 0 {
            eyre::bail!("simulation.time_constant_ms must be >= 1");
        }
        if self.simulation.deadband_percent > 100 {
            eyre::bail!("simulation.deadband_percent must be in [0, 100]");
        }

        Ok(())
    }
}

/// Which of the two record layouts a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    Semicolon,
    Comma,
}

impl RecordLayout {
    fn from_header(line: &str) -> Option<Self> {
        match line.trim_end_matches(['\r', '\n']) {
            "delta;pwm;rpm" => Some(RecordLayout::Semicolon),
            "timestamp,PWM,RPM" => Some(RecordLayout::Comma),
            _ => None,
        }
    }

    fn delimiter(self) -> u8 {
        match self {
            RecordLayout::Semicolon => b';',
            RecordLayout::Comma => b',',
        }
    }
}

/// A loaded capture record.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub layout: RecordLayout,
    pub rows: Vec<CaptureRow>,
}

pub fn load_capture_csv(path: &std::path::Path) -> eyre::Result<CaptureRecord> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("open capture CSV {:?}: {}", path, e))?;
    parse_capture_csv(&text).map_err(|e| e.wrap_err(format!("capture CSV {path:?}")))
}

/// Parse capture-record text. The header line selects the layout.
pub fn parse_capture_csv(text: &str) -> eyre::Result<CaptureRecord> {
    let header = text.lines().next().unwrap_or_default();
    let Some(layout) = RecordLayout::from_header(header) else {
        eyre::bail!(
            "capture CSV must have headers 'delta;pwm;rpm' or 'timestamp,PWM,RPM', got: {}",
            header
        );
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(layout.delimiter())
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<(u32, u8, u32)>().enumerate() {
        match rec {
            Ok((elapsed_ms, duty_percent, rpm)) => {
                if duty_percent > 100 {
                    eyre::bail!("invalid CSV row {}: duty {} > 100", idx + 2, duty_percent);
                }
                rows.push(CaptureRow {
                    elapsed_ms,
                    duty_percent,
                    rpm,
                });
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(CaptureRecord { layout, rows })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ramp {
    Up,
    Down,
}

/// Mean speed over one duty plateau.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub duty_percent: u8,
    pub ramp: Ramp,
    pub samples: usize,
    pub mean_rpm: f64,
    pub min_rpm: u32,
    pub max_rpm: u32,
}

/// Speed-versus-duty curve reduced from a capture record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DutyCurve {
    pub points: Vec<CurvePoint>,
}

impl DutyCurve {
    /// Group consecutive rows with the same duty into plateaus. A plateau is
    /// on the way down when its duty is below the previous plateau's.
    pub fn from_rows(rows: &[CaptureRow]) -> Self {
        let mut points: Vec<CurvePoint> = Vec::new();
        let mut sum: u64 = 0;
        for row in rows {
            let prev_duty = points.last().map(|p| p.duty_percent);
            if let Some(p) = points.last_mut()
                && prev_duty == Some(row.duty_percent)
            {
                p.samples += 1;
                p.min_rpm = p.min_rpm.min(row.rpm);
                p.max_rpm = p.max_rpm.max(row.rpm);
                sum += u64::from(row.rpm);
                p.mean_rpm = sum as f64 / p.samples as f64;
                continue;
            }
            let ramp = match prev_duty {
                Some(d) if row.duty_percent < d => Ramp::Down,
                _ => Ramp::Up,
            };
            sum = u64::from(row.rpm);
            points.push(CurvePoint {
                duty_percent: row.duty_percent,
                ramp,
                samples: 1,
                mean_rpm: f64::from(row.rpm),
                min_rpm: row.rpm,
                max_rpm: row.rpm,
            });
        }
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl TryFrom<&CaptureRecord> for DutyCurve {
    type Error = eyre::Report;
    fn try_from(rec: &CaptureRecord) -> Result<Self, Self::Error> {
        if rec.rows.is_empty() {
            eyre::bail!("capture record has no rows");
        }
        Ok(Self::from_rows(&rec.rows))
    }
}
