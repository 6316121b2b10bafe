use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use assert_cmd::Command;
use tempfile::tempdir;

// Short intervals so a full sweep finishes in well under a second on the
// simulated rig.
fn write_fast_config(dir: &Path, capture: &Path) -> PathBuf {
    let toml = format!(
        r#"
[pins]
# pins are unused by the simulated backend but must be present
pwm = 18
in1 = 23
in2 = 24
encoder = 17

[timing]
sample_interval_ms = 4
step_interval_ms = 60
report_interval_ms = 20
settle_ms = 10

[runner]
idle_sleep_us = 500

[capture]
path = '{}'
"#,
        capture.display()
    );
    let path = dir.join("bench.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn bin() -> Command {
    Command::cargo_bin("motorbench").unwrap()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["capture", "--step", "0"], 2, "1..=100", "stderr")]
#[case(&["capture"], 2, "required", "stderr")]
#[case(&["self-check"], 0, "self-check OK", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(dir.path(), &dir.path().join("curve.csv"));

    let mut cmd = bin();
    cmd.arg("--config").arg(&cfg).args(args);
    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn unattended_capture_writes_full_sweep() {
    let dir = tempdir().unwrap();
    let record = dir.path().join("curve.csv");
    let cfg = write_fast_config(dir.path(), &record);

    bin()
        .arg("--config")
        .arg(&cfg)
        .args(["capture", "--step", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("capture started (step 50)"))
        .stdout(predicate::str::contains("Capture written to"));

    let text = fs::read_to_string(&record).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("delta;pwm;rpm"));
    let duties: Vec<u8> = lines
        .map(|l| l.split(';').nth(1).unwrap().parse().unwrap())
        .collect();
    assert!(duties.contains(&0));
    assert!(duties.contains(&50));
    assert!(duties.contains(&100));
    assert!(duties.iter().all(|&d| d == 0 || d == 50 || d == 100));
}

#[test]
fn out_flag_overrides_config_path() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(dir.path(), &dir.path().join("unused.csv"));
    let out = dir.path().join("other.csv");

    bin()
        .arg("--config")
        .arg(&cfg)
        .args(["capture", "--step", "100", "--out"])
        .arg(&out)
        .assert()
        .success();
    assert!(out.exists());
    assert!(!dir.path().join("unused.csv").exists());
}

#[test]
fn unwritable_record_is_storage_failure() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(dir.path(), &dir.path().join("curve.csv"));

    bin()
        .arg("--config")
        .arg(&cfg)
        .args(["capture", "--step", "20", "--out"])
        .arg(dir.path().join("missing").join("curve.csv"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("cannot open capture record"))
        .stderr(predicate::str::contains("could not be written"));
}

#[test]
fn interactive_capture_runs_to_completion_after_eof() {
    let dir = tempdir().unwrap();
    let record = dir.path().join("curve.csv");
    let cfg = write_fast_config(dir.path(), &record);

    bin()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .write_stdin("hello\nstart 100\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("unrecognized command: \"hello\""))
        .stdout(predicate::str::contains("capture complete"));
    assert!(fs::read_to_string(&record).unwrap().starts_with("delta;pwm;rpm\n"));
}

#[test]
fn manual_mode_is_announced() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(dir.path(), &dir.path().join("curve.csv"));

    bin()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .write_stdin("PWM 40\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("manual mode enabled"));
}

#[test]
fn missing_config_is_reported() {
    let dir = tempdir().unwrap();
    bin()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("config file could not be loaded"));
}

#[test]
fn duplicate_pins_are_rejected() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[pins]\npwm = 18\nin1 = 18\nin2 = 24\nencoder = 17\n").unwrap();
    bin()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gpio 18 assigned twice"));
}

#[test]
fn inspect_prints_curve() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("curve.csv");
    fs::write(
        &csv,
        "delta;pwm;rpm\n4;0;0\n8;0;0\n2104;20;600\n2108;20;620\n4104;0;30\n",
    )
    .unwrap();

    bin()
        .arg("inspect")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("mean_rpm"))
        .stdout(predicate::str::contains("610.0"))
        .stdout(predicate::str::contains("down"));
}

#[test]
fn inspect_reports_bad_header() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("curve.csv");
    fs::write(&csv, "time;duty;speed\n4;0;0\n").unwrap();

    bin()
        .arg("inspect")
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers in capture CSV"));
}
