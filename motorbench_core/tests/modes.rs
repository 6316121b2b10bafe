//! Mode transitions driven by operator commands.

use motorbench_core::mocks::{CollectingOperator, MemorySink, RecordingActuator};
use motorbench_core::{
    BenchError, Command, Controller, ControllerBuilder, ControllerMode, ParseMode, TimingCfg,
};
use motorbench_traits::ManualClock;
use rstest::rstest;

type Rig = Controller<RecordingActuator, MemorySink, CollectingOperator>;

fn rig_with(clock: &ManualClock, timing: TimingCfg, mode: ParseMode) -> Rig {
    ControllerBuilder::new()
        .with_actuator(RecordingActuator::default())
        .with_record_sink(MemorySink::default())
        .with_operator(CollectingOperator::default())
        .with_clock(Box::new(clock.clone()))
        .with_timing(timing)
        .with_parse_mode(mode)
        .build()
        .unwrap()
}

fn rig(clock: &ManualClock) -> Rig {
    rig_with(clock, TimingCfg::default(), ParseMode::Lenient)
}

fn spin(c: &mut Rig, clock: &ManualClock, ms: u64, edges_per_tick: u32) {
    let pulses = c.pulse_counter();
    for _ in 0..ms / 4 {
        clock.advance_ms(4);
        for _ in 0..edges_per_tick {
            pulses.on_edge();
        }
        c.tick().unwrap();
    }
}

#[test]
fn starts_idle_and_silent() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    spin(&mut c, &clock, 2000, 2);
    assert_eq!(c.mode(), ControllerMode::Idle);
    assert!(c.operator().reports.is_empty());
    assert!(c.actuator().history().is_empty());
    assert_eq!(c.record_sink().text(), "");
    // Pulses are still consumed every tick.
    assert_eq!(c.pulse_counter().pending(), 0);
    assert_eq!(c.last_rpm(), 1500);
}

#[test]
fn manual_mode_reports_at_report_interval() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("PWM 40").unwrap();
    assert_eq!(c.mode(), ControllerMode::Manual);
    assert_eq!(c.duty(), 40);
    assert_eq!(c.operator().notices, vec!["manual mode enabled".to_string()]);

    spin(&mut c, &clock, 1000, 2);
    assert_eq!(c.operator().reports, vec![(40, 1500), (40, 1500)]);
    assert_eq!(c.record_sink().text(), "");
}

#[test]
fn report_interval_is_configurable() {
    let clock = ManualClock::new();
    let timing = TimingCfg {
        report_interval_ms: 1000,
        ..TimingCfg::default()
    };
    let mut c = rig_with(&clock, timing, ParseMode::Lenient);
    c.submit_line("pwm 10").unwrap();
    spin(&mut c, &clock, 3000, 1);
    assert_eq!(c.operator().reports.len(), 3);
    assert!(c.operator().reports.iter().all(|&(d, r)| d == 10 && r == 750));
}

#[test]
fn manual_duty_change_is_immediate() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("pwm 30").unwrap();
    c.submit_line("pwm 500").unwrap();
    c.submit_line("pwm -4").unwrap();
    assert_eq!(c.actuator().history(), &[30, 100, 0]);
    assert_eq!(c.mode(), ControllerMode::Manual);
}

#[rstest]
#[case("foo")]
#[case("")]
#[case("STOP now")]
fn malformed_command_changes_nothing(#[case] line: &str) {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("start 20").unwrap();
    spin(&mut c, &clock, 100, 2);
    let text_before = c.record_sink().text();

    c.submit_line(line).unwrap();
    assert_eq!(c.mode(), ControllerMode::Capturing);
    assert_eq!(c.duty(), 0);
    assert_eq!(c.record_sink().text(), text_before);
    let diag = c.operator().diagnostics.last().cloned().unwrap_or_default();
    assert!(diag.starts_with("unrecognized command"), "{diag}");
}

#[test]
fn only_command_errors_are_absorbed() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("pwm 30").unwrap();

    c.handle(Command::Malformed("spin".into())).unwrap();
    assert_eq!(
        c.operator().diagnostics,
        vec![BenchError::MalformedCommand("spin".into()).to_string()]
    );
    assert_eq!(c.operator().diagnostics[0], "unrecognized command: \"spin\"");

    let err = c
        .handle(Command::Rejected(BenchError::Config("bad".into())))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BenchError>(),
        Some(BenchError::Config(_))
    ));
    assert_eq!(c.mode(), ControllerMode::Manual);
    assert_eq!(c.duty(), 30);
    assert_eq!(c.operator().diagnostics.len(), 1);
}

#[rstest]
#[case("pwm 500")]
#[case("start 0")]
fn strict_mode_rejects_out_of_range(#[case] line: &str) {
    let clock = ManualClock::new();
    let mut c = rig_with(&clock, TimingCfg::default(), ParseMode::Strict);
    c.submit_line("pwm 25").unwrap();

    c.submit_line(line).unwrap();
    assert_eq!(c.mode(), ControllerMode::Manual);
    assert_eq!(c.duty(), 25);
    let diag = c.operator().diagnostics.last().cloned().unwrap_or_default();
    assert!(diag.starts_with("rejected: invalid parameter"), "{diag}");
}

#[test]
fn strict_mode_treats_missing_argument_as_malformed() {
    let clock = ManualClock::new();
    let mut c = rig_with(&clock, TimingCfg::default(), ParseMode::Strict);
    c.submit_line("start").unwrap();
    assert_eq!(c.mode(), ControllerMode::Idle);
    assert_eq!(c.operator().diagnostics.len(), 1);
}

#[test]
fn start_interrupts_running_capture() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("start 20").unwrap();
    spin(&mut c, &clock, 4400, 2);
    assert_eq!(c.duty(), 40);

    c.submit_line("start 50").unwrap();
    assert_eq!(c.mode(), ControllerMode::Capturing);
    assert_eq!(c.duty(), 0);
    assert_eq!(c.record_sink().truncations(), 2);
    assert_eq!(c.record_sink().text(), "delta;pwm;rpm\n");

    spin(&mut c, &clock, 8, 2);
    assert_eq!(
        c.record_sink().text(),
        "delta;pwm;rpm\n4;0;1500\n8;0;1500\n"
    );
    spin(&mut c, &clock, 1992, 2);
    assert_eq!(c.duty(), 50);
}

#[test]
fn pwm_ends_running_capture_and_keeps_its_rows() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("start 20").unwrap();
    spin(&mut c, &clock, 40, 0);
    let before = c.record_sink().text();
    assert_eq!(before.lines().count(), 11);

    c.submit_line("pwm 50").unwrap();
    assert_eq!(c.mode(), ControllerMode::Manual);
    assert_eq!(c.duty(), 50);
    assert!(c.profile().is_none());
    assert_eq!(c.record_sink().text(), before);
    assert_eq!(c.record_sink().truncations(), 1);
    assert!(c.record_sink().closed());

    // The old profile no longer steps the duty and nothing more is recorded.
    spin(&mut c, &clock, 4000, 2);
    assert_eq!(c.duty(), 50);
    assert_eq!(c.record_sink().text(), before);
}

#[test]
fn first_manual_report_is_not_delayed_by_pwm() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    spin(&mut c, &clock, 2000, 2);

    c.submit_line("pwm 40").unwrap();
    spin(&mut c, &clock, 4, 2);
    assert_eq!(c.operator().reports, vec![(40, 1500)]);

    // A duty change inside a report period keeps the existing cadence.
    spin(&mut c, &clock, 200, 2);
    c.submit_line("pwm 60").unwrap();
    spin(&mut c, &clock, 300, 2);
    assert_eq!(c.operator().reports, vec![(40, 1500), (60, 1500)]);
}

#[test]
fn actuator_failure_propagates_and_idles() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("pwm 20").unwrap();
    c.actuator_mut().fail_next("h-bridge overcurrent");
    let err = c.handle(Command::SetDuty(60)).unwrap_err();
    assert!(format!("{err:#}").contains("h-bridge overcurrent"));
    assert_eq!(c.mode(), ControllerMode::Idle);
    assert_eq!(c.duty(), 20);
}

#[test]
fn shutdown_stops_motor_and_closes_capture() {
    let clock = ManualClock::new();
    let mut c = rig(&clock);
    c.submit_line("start 20").unwrap();
    spin(&mut c, &clock, 2400, 2);
    assert_eq!(c.duty(), 20);
    let written = c.record_sink().text();

    c.shutdown().unwrap();
    assert_eq!(c.mode(), ControllerMode::Idle);
    assert_eq!(c.duty(), 0);
    assert_eq!(c.record_sink().text(), written);
    assert!(c.record_sink().closed());
}
