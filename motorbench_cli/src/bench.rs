//! Bench sessions: config mapping, rig assembly and loop execution.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use motorbench_config::{Config, DutyCurve, Ramp, load_capture_csv};
use motorbench_core::hw_error::map_hw_error;
use motorbench_core::{
    BenchError, Command, Controller, ControllerBuilder, ParseMode, PulseCounter, RunParams,
    RunSummary, SessionEnd, estimate_rpm, run, spawn_line_reader,
};
use motorbench_hardware::FileSink;
use motorbench_traits::{CommandSource, DutyActuator, EdgeHandler};

use crate::cli::{CaptureContext, LAST_CAPTURE, LoopOpts};
use crate::console::ConsoleOperator;
use crate::rt::setup_rt_once;

pub type BenchController = Controller<Box<dyn DutyActuator + Send>, FileSink, ConsoleOperator>;

/// Duty used by `self-check` to spin the motor.
const SELF_CHECK_DUTY: u8 = 50;
const SELF_CHECK_WINDOW: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
#[error("interrupted before the capture finished")]
pub struct Interrupted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Commands from stdin until end of input.
    Interactive,
    /// One sweep with the given step, then exit.
    Capture { step: u8 },
}

/// Where encoder edges come from. Must outlive the controller.
pub enum EdgeSource {
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    Simulated(motorbench_hardware::SimulatedEncoder),
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    #[allow(dead_code)] // held to keep the interrupt armed
    Gpio(motorbench_hardware::EncoderInput),
}

impl EdgeSource {
    /// Model speed, when the edges are simulated.
    pub fn true_rpm(&self) -> Option<u32> {
        match self {
            #[cfg(not(all(feature = "hardware", target_os = "linux")))]
            EdgeSource::Simulated(enc) => Some(enc.true_rpm()),
            #[cfg(all(feature = "hardware", target_os = "linux"))]
            EdgeSource::Gpio(_) => None,
        }
    }
}

pub struct Rig {
    pub actuator: Box<dyn DutyActuator + Send>,
    pub pulses: Arc<PulseCounter>,
    pub edges: EdgeSource,
}

/// Open the motor drive and encoder described by `cfg`.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn assemble_rig(cfg: &Config) -> eyre::Result<Rig> {
    use motorbench_hardware::{EncoderInput, HBridgeMotor};

    let p = &cfg.pins;
    let pulses = Arc::new(PulseCounter::new());
    let motor = HBridgeMotor::new(p.pwm, p.in1, p.in2, cfg.pwm.frequency_hz, cfg.pwm.full_scale)
        .wrap_err("open motor pins")?;
    let handler: Arc<dyn EdgeHandler> = pulses.clone();
    let input = EncoderInput::attach(p.encoder, handler).wrap_err("open encoder pin")?;
    Ok(Rig {
        actuator: Box::new(motor),
        pulses,
        edges: EdgeSource::Gpio(input),
    })
}

/// Simulated rig driven by the `[simulation]` motor model.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn assemble_rig(cfg: &Config) -> eyre::Result<Rig> {
    use motorbench_hardware::{MotorModel, simulated_rig};

    let sim = &cfg.simulation;
    let model = MotorModel {
        max_rpm: f64::from(sim.max_rpm),
        time_constant: Duration::from_millis(u64::from(sim.time_constant_ms)),
        deadband_percent: sim.deadband_percent,
        pulses_per_revolution: cfg.encoder.pulses_per_revolution,
    };
    let pulses = Arc::new(PulseCounter::new());
    let handler: Arc<dyn EdgeHandler> = pulses.clone();
    let (motor, encoder) = simulated_rig(model, handler).wrap_err("start simulated encoder")?;
    tracing::info!(max_rpm = sim.max_rpm, "using simulated motor");
    Ok(Rig {
        actuator: Box::new(motor),
        pulses,
        edges: EdgeSource::Simulated(encoder),
    })
}

/// Map the typed config onto a controller wired to `actuator`.
pub fn build_controller(
    cfg: &Config,
    opts: &LoopOpts,
    actuator: Box<dyn DutyActuator + Send>,
    pulses: Arc<PulseCounter>,
    record_path: &Path,
    json: bool,
) -> eyre::Result<BenchController> {
    let parse_mode = if opts.strict {
        ParseMode::Strict
    } else {
        (&cfg.commands).into()
    };
    ControllerBuilder::new()
        .with_timing((&cfg.timing).into())
        .with_encoder((&cfg.encoder).into())
        .with_record_cfg((&cfg.capture).into())
        .with_parse_mode(parse_mode)
        .with_pulse_counter(pulses)
        .with_actuator(actuator)
        .with_record_sink(FileSink::new(record_path))
        .with_operator(ConsoleOperator::new(json))
        .build()
}

/// Source for unattended captures: nothing to read, already at end of input.
struct Unattended;

impl CommandSource for Unattended {
    fn poll_line(&mut self) -> Option<String> {
        None
    }

    fn is_closed(&self) -> bool {
        true
    }
}

/// Run a bench session until it ends, the input closes, or `shutdown` is raised.
pub fn run_bench(
    cfg: &Config,
    kind: SessionKind,
    opts: &LoopOpts,
    json: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<(RunSummary, PathBuf)> {
    setup_rt_once(opts.rt, opts.rt_prio, opts.rt_lock);

    let path = opts
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.capture.path));
    let _ = LAST_CAPTURE.set(CaptureContext {
        path: path.clone(),
        step: match kind {
            SessionKind::Capture { step } => Some(step),
            SessionKind::Interactive => None,
        },
    });

    let Rig {
        actuator,
        pulses,
        edges: _edges,
    } = assemble_rig(cfg)?;
    let mut controller = build_controller(cfg, opts, actuator, pulses, &path, json)?;

    let params = RunParams {
        idle_sleep: Duration::from_micros(cfg.runner.idle_sleep_us),
        stop_after_capture: matches!(kind, SessionKind::Capture { .. }),
        stop_on_eof: true,
        stats: opts.stats,
    };

    let summary = match kind {
        SessionKind::Interactive => {
            tracing::info!(path = %path.display(), "bench ready; waiting for commands");
            let (mut source, _reader) = spawn_line_reader(BufReader::new(std::io::stdin()))
                .wrap_err("start command reader")?;
            run(&mut controller, &mut source, shutdown, params)?
        }
        SessionKind::Capture { step } => {
            tracing::info!(step, path = %path.display(), "unattended capture");
            controller.handle(Command::StartCapture(step))?;
            if !controller.is_capturing() {
                controller.shutdown()?;
                return Err(BenchError::StorageWrite(format!(
                    "cannot open capture record {}",
                    path.display()
                ))
                .into());
            }
            let summary = run(&mut controller, &mut Unattended, shutdown, params)?;
            match &summary.last_session {
                Some(SessionEnd::Completed(_)) => {}
                Some(SessionEnd::Aborted(err)) => return Err(err.clone().into()),
                None => return Err(Interrupted.into()),
            }
            summary
        }
    };

    if opts.stats {
        print_stats(&summary, cfg.timing.sample_interval_ms);
    }
    Ok((summary, path))
}

/// Print loop statistics to stderr.
fn print_stats(summary: &RunSummary, sample_interval_ms: u32) {
    eprintln!("\n--- Bench Stats ---");
    eprintln!("Passes: {}", summary.passes);
    eprintln!("Samples: {} (recorded {})", summary.samples, summary.recorded);
    eprintln!("Period (ms): {sample_interval_ms}");
    eprintln!("Max pass latency (us): {}", summary.max_latency_us);
    eprintln!("Missed deadlines: {}", summary.missed_deadlines);
    eprintln!("-------------------\n");
}

/// Load a capture record and print its speed-versus-duty curve.
pub fn inspect(path: &Path, json: bool) -> eyre::Result<()> {
    let record = load_capture_csv(path)?;
    let curve = DutyCurve::try_from(&record)?;
    if json {
        println!("{}", serde_json::to_string(&curve)?);
        return Ok(());
    }
    println!(
        "{:>4} {:>5} {:>8} {:>9} {:>6} {:>6}",
        "pwm", "ramp", "samples", "mean_rpm", "min", "max"
    );
    for p in &curve.points {
        let ramp = match p.ramp {
            Ramp::Up => "up",
            Ramp::Down => "down",
        };
        println!(
            "{:>4} {:>5} {:>8} {:>9.1} {:>6} {:>6}",
            p.duty_percent, ramp, p.samples, p.mean_rpm, p.min_rpm, p.max_rpm
        );
    }
    Ok(())
}

/// Spin the motor briefly and expect encoder edges back. Returns the
/// measured speed.
pub fn self_check(cfg: &Config) -> eyre::Result<u32> {
    if let Some(dir) = Path::new(&cfg.capture.path).parent()
        && !dir.as_os_str().is_empty()
        && !dir.is_dir()
    {
        return Err(BenchError::Config(format!(
            "capture directory {} does not exist",
            dir.display()
        ))
        .into());
    }

    let Rig {
        mut actuator,
        pulses,
        edges,
    } = assemble_rig(cfg)?;
    actuator
        .set_duty(SELF_CHECK_DUTY)
        .map_err(|e| map_hw_error(&*e))?;
    pulses.consume_and_reset();
    std::thread::sleep(SELF_CHECK_WINDOW);
    let count = pulses.consume_and_reset();
    let stopped = actuator.set_duty(0).map_err(|e| map_hw_error(&*e));

    let rpm = estimate_rpm(
        count,
        SELF_CHECK_WINDOW.as_secs_f64(),
        cfg.encoder.pulses_per_revolution,
    );
    tracing::info!(count, rpm, model_rpm = ?edges.true_rpm(), "self-check sample");
    stopped?;
    if count == 0 {
        return Err(BenchError::HardwareFault(format!(
            "no encoder edges at {SELF_CHECK_DUTY}% duty"
        ))
        .into());
    }
    Ok(rpm)
}
