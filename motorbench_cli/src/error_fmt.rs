//! Human-readable error descriptions and structured JSON error formatting.

use crate::bench::Interrupted;
use crate::cli::LAST_CAPTURE;

/// Stable name for the error class, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    use motorbench_core::{BenchError, BuildError};

    if err.downcast_ref::<Interrupted>().is_some() {
        return "Interrupted";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<BenchError>() {
        Some(BenchError::StorageWrite(_)) => "StorageWrite",
        Some(BenchError::Hardware(_) | BenchError::HardwareFault(_)) => "Hardware",
        Some(BenchError::Config(_)) => "Config",
        Some(BenchError::MalformedCommand(_) | BenchError::InvalidParameter(_)) => "Command",
        None => "Error",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use motorbench_core::{BenchError, BuildError};

    if err.downcast_ref::<Interrupted>().is_some() {
        return "What happened: The capture was interrupted before the profile finished.\nLikely causes: Ctrl-C or a termination signal.\nHow to fix: Nothing to fix; the record holds only the rows written so far. Start a new capture.".to_string();
    }

    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the [timing], [encoder] or [capture] tables.\nHow to fix: Edit the config file, then rerun."
        );
    }

    if let Some(be) = err.downcast_ref::<BenchError>() {
        return match be {
            BenchError::StorageWrite(msg) => format!(
                "What happened: The capture record could not be written ({msg}).\nLikely causes: Missing directory, read-only filesystem, or full storage.\nHow to fix: Check [capture] path (or --out) and free space, then start a new capture."
            ),
            BenchError::Hardware(msg) | BenchError::HardwareFault(msg) => format!(
                "What happened: The motor drive or encoder failed ({msg}).\nLikely causes: Wrong [pins] values, wiring or power issues, or missing GPIO permissions.\nHow to fix: Verify the H-bridge and encoder wiring and the [pins] table; rerun `motorbench self-check`."
            ),
            BenchError::Config(msg) => format!(
                "What happened: Configuration problem ({msg}).\nLikely causes: A path or value in the TOML does not match this machine.\nHow to fix: Edit the config file, then rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open motor pins") || lower.contains("open encoder pin") {
        return "What happened: Failed to initialize GPIO pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: The config file could not be loaded ({cause}).\nLikely causes: Wrong --config path or a TOML syntax error.\nHow to fix: Pass --config <FILE> pointing to a valid TOML file."
        );
    }

    if lower.contains("invalid configuration") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Missing or duplicated [pins], or inconsistent [timing] values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("capture csv") {
        let cause = err.root_cause();
        if cause.to_string().contains("must have headers") {
            return "Invalid headers in capture CSV. Expected 'delta;pwm;rpm' or 'timestamp,PWM,RPM'.".to_string();
        }
        return format!("Capture CSV could not be read: {cause}");
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error class; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Interrupted" => 2,
        "StorageWrite" => 3,
        "Hardware" => 4,
        "Config" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = reason_name(err);
    let msg = humanize(err);
    let details = match reason {
        "StorageWrite" | "Interrupted" => LAST_CAPTURE.get().map(|c| {
            json!({ "path": c.path.display().to_string(), "step": c.step })
        }),
        _ => None,
    };
    match details {
        Some(d) => json!({ "reason": reason, "details": d, "message": msg }).to_string(),
        None => json!({ "reason": reason, "message": msg }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motorbench_core::BenchError;
    use rstest::rstest;

    #[rstest]
    #[case(BenchError::StorageWrite("disk full".into()), 3, "StorageWrite")]
    #[case(BenchError::HardwareFault("overcurrent".into()), 4, "Hardware")]
    #[case(BenchError::Config("nope".into()), 5, "Config")]
    #[case(BenchError::InvalidParameter("x".into()), 1, "Command")]
    fn typed_errors_map_to_codes(#[case] e: BenchError, #[case] code: i32, #[case] name: &str) {
        let report = eyre::Report::new(e);
        assert_eq!(exit_code_for_error(&report), code);
        assert_eq!(reason_name(&report), name);
    }

    #[test]
    fn interrupted_is_code_two() {
        let report = eyre::Report::new(Interrupted);
        assert_eq!(exit_code_for_error(&report), 2);
        assert!(humanize(&report).contains("interrupted"));
    }

    #[test]
    fn wrapped_storage_error_still_classified() {
        use eyre::WrapErr;
        let r: eyre::Result<()> = Err(BenchError::StorageWrite("disk full".into())).wrap_err("capture");
        let report = r.unwrap_err();
        assert_eq!(exit_code_for_error(&report), 3);
    }

    #[test]
    fn json_error_is_one_object() {
        let report = eyre::Report::new(BenchError::HardwareFault("stall".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(v["reason"], "Hardware");
        assert!(v["message"].as_str().unwrap().contains("stall"));
    }
}
