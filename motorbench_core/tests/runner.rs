use std::sync::atomic::AtomicBool;
use std::time::Duration;

use motorbench_core::mocks::{CollectingOperator, MemorySink, RecordingActuator, ScriptedCommands};
use motorbench_core::{
    Controller, ControllerBuilder, ControllerMode, RunParams, SessionEnd, run,
};
use motorbench_traits::ManualClock;

type Rig = Controller<RecordingActuator, MemorySink, CollectingOperator>;

fn rig(clock: &ManualClock) -> Rig {
    ControllerBuilder::new()
        .with_actuator(RecordingActuator::default())
        .with_record_sink(MemorySink::default())
        .with_operator(CollectingOperator::default())
        .with_clock(Box::new(clock.clone()))
        .build()
        .unwrap()
}

fn params() -> RunParams {
    RunParams {
        idle_sleep: Duration::from_millis(1),
        stop_after_capture: false,
        stop_on_eof: true,
        stats: true,
    }
}

#[test]
fn unattended_capture_runs_to_completion() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    let mut script = ScriptedCommands::new(["start 20"]);
    let stop = AtomicBool::new(false);

    let summary = run(&mut c, &mut script, &stop, RunParams {
        stop_after_capture: true,
        ..params()
    })
    .unwrap();

    assert_eq!(summary.recorded, 4784);
    assert_eq!(summary.samples, 5000);
    assert_eq!(summary.missed_deadlines, 0);
    assert_eq!(summary.passes, 20_001);
    match summary.last_session {
        Some(SessionEnd::Completed(s)) => assert_eq!(s.rows, 4784),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(c.mode(), ControllerMode::Idle);
    assert_eq!(c.duty(), 0);
}

#[test]
fn end_of_input_stops_after_capture_finishes() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    let mut script = ScriptedCommands::new(["start 100"]);
    let stop = AtomicBool::new(false);

    let summary = run(&mut c, &mut script, &stop, params()).unwrap();
    assert!(matches!(summary.last_session, Some(SessionEnd::Completed(_))));
    assert_eq!(c.actuator().history(), &[0, 100, 0, 0]);
}

#[test]
fn end_of_input_in_manual_mode_stops_motor() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    let mut script = ScriptedCommands::new(["pwm 30"]);
    let stop = AtomicBool::new(false);

    let summary = run(&mut c, &mut script, &stop, params()).unwrap();
    assert_eq!(summary.passes, 1);
    assert_eq!(c.actuator().history(), &[30, 0]);
    assert_eq!(c.mode(), ControllerMode::Idle);
}

#[test]
fn raised_shutdown_flag_skips_loop() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    let mut script = ScriptedCommands::new(["pwm 30"]);
    let stop = AtomicBool::new(true);

    let summary = run(&mut c, &mut script, &stop, params()).unwrap();
    assert_eq!(summary.passes, 0);
    assert!(!script.is_empty());
    assert_eq!(c.actuator().history(), &[0]);
}

#[test]
fn late_passes_count_missed_deadlines() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    let mut script = ScriptedCommands::new(["start 100"]);
    let stop = AtomicBool::new(false);

    // Passes every 12 ms against a 4 ms sampling interval: two ticks folded
    // into each sample.
    let summary = run(&mut c, &mut script, &stop, RunParams {
        idle_sleep: Duration::from_millis(12),
        stop_after_capture: true,
        ..params()
    })
    .unwrap();
    assert_eq!(summary.samples, 334);
    assert_eq!(summary.missed_deadlines, 2 * summary.samples);
    // 8 samples fall inside the settling window after the single step.
    assert_eq!(summary.recorded, 334 - 8);
}

#[test]
fn actuator_failure_ends_run_with_motor_stopped() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.actuator_mut().fail_next("driver fault");
    let mut script = ScriptedCommands::new(["pwm 30"]);
    let stop = AtomicBool::new(false);

    let err = run(&mut c, &mut script, &stop, params()).unwrap_err();
    assert!(format!("{err:#}").contains("driver fault"));
    assert_eq!(c.actuator().history(), &[0]);
}
