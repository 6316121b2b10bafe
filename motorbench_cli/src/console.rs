//! Terminal operator: reports and notices to stdout, diagnostics to stderr.

use std::io::Write;

use motorbench_traits::Operator;
use serde_json::json;

pub struct ConsoleOperator {
    json: bool,
}

impl ConsoleOperator {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit(&self, kind: &str, text: &str, to_stderr: bool) {
        let line = if self.json {
            json!({ "type": kind, "message": text }).to_string()
        } else {
            text.to_string()
        };
        let result = if to_stderr {
            writeln!(std::io::stderr().lock(), "{line}")
        } else {
            writeln!(std::io::stdout().lock(), "{line}")
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "operator output dropped");
        }
    }
}

impl Operator for ConsoleOperator {
    fn report(&mut self, duty_percent: u8, rpm: u32) {
        let mut out = std::io::stdout().lock();
        let result = if self.json {
            writeln!(
                out,
                "{}",
                json!({ "type": "report", "pwm": duty_percent, "rpm": rpm })
            )
        } else {
            writeln!(out, "PWM: {duty_percent}% | RPM: {rpm}")
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "report dropped");
        }
    }

    fn notice(&mut self, message: &str) {
        self.emit("notice", message, false);
    }

    fn diagnostic(&mut self, message: &str) {
        self.emit("diagnostic", message, true);
    }
}
