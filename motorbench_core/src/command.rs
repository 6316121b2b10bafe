//! Operator command parsing.
//!
//! One line of text in, one typed [`Command`] out. Verbs are matched
//! case-insensitively on the first whitespace-separated token:
//!
//! - `START <step>`: begin a capture sweep with the given duty step
//! - `PWM <duty>`: switch to manual mode at the given duty
//!
//! In lenient mode (the default) a missing or unparsable argument falls back to
//! its default and out-of-range values saturate. Strict mode refuses both.

use std::num::IntErrorKind;

use crate::duty::MAX_DUTY;
use crate::error::BenchError;
use crate::profile::{MAX_STEP, MIN_STEP};

/// Step size used when `START` has no usable argument.
pub const DEFAULT_STEP: u8 = 20;
/// Duty used when `PWM` has no usable argument.
pub const DEFAULT_DUTY: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Lenient,
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetDuty(u8),
    StartCapture(u8),
    /// Unrecognized verb or unusable argument; carries the trimmed line.
    Malformed(String),
    /// Explicit argument outside its range (strict mode only).
    Rejected(BenchError),
}

impl Command {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Command::Malformed(_))
    }
}

/// Parse with the lenient rules.
pub fn parse(line: &str) -> Command {
    parse_with(line, ParseMode::Lenient)
}

pub fn parse_with(line: &str, mode: ParseMode) -> Command {
    let trimmed = line.trim();
    let mut tokens = trimmed.split_whitespace();
    let Some(verb) = tokens.next() else {
        return Command::Malformed(String::new());
    };
    let arg = tokens.next();
    if mode == ParseMode::Strict && tokens.next().is_some() {
        return Command::Malformed(trimmed.to_string());
    }

    if verb.eq_ignore_ascii_case("START") {
        match bounded_arg(arg, mode, DEFAULT_STEP, MIN_STEP, MAX_STEP) {
            Ok(step) => Command::StartCapture(step),
            Err(ArgError::Unusable) => Command::Malformed(trimmed.to_string()),
            Err(ArgError::OutOfRange(v)) => Command::Rejected(BenchError::InvalidParameter(
                format!("START step {v} outside {MIN_STEP}..={MAX_STEP}"),
            )),
        }
    } else if verb.eq_ignore_ascii_case("PWM") {
        match bounded_arg(arg, mode, DEFAULT_DUTY, 0, MAX_DUTY) {
            Ok(duty) => Command::SetDuty(duty),
            Err(ArgError::Unusable) => Command::Malformed(trimmed.to_string()),
            Err(ArgError::OutOfRange(v)) => Command::Rejected(BenchError::InvalidParameter(
                format!("PWM duty {v} outside 0..={MAX_DUTY}"),
            )),
        }
    } else {
        Command::Malformed(trimmed.to_string())
    }
}

enum ArgError {
    Unusable,
    OutOfRange(i64),
}

fn bounded_arg(
    arg: Option<&str>,
    mode: ParseMode,
    default: u8,
    min: u8,
    max: u8,
) -> Result<u8, ArgError> {
    let parsed = arg.and_then(parse_integer);
    match (mode, parsed) {
        (ParseMode::Lenient, None) => Ok(default),
        (ParseMode::Lenient, Some(v)) => Ok(v.clamp(i64::from(min), i64::from(max)) as u8),
        (ParseMode::Strict, None) => Err(ArgError::Unusable),
        (ParseMode::Strict, Some(v)) if (i64::from(min)..=i64::from(max)).contains(&v) => {
            Ok(v as u8)
        }
        (ParseMode::Strict, Some(v)) => Err(ArgError::OutOfRange(v)),
    }
}

/// Decimal integer; digit strings too long for i64 saturate rather than fail.
fn parse_integer(s: &str) -> Option<i64> {
    match s.parse::<i64>() {
        Ok(v) => Some(v),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("start 15", Command::StartCapture(15))]
    #[case("START 15", Command::StartCapture(15))]
    #[case("  StArT   42  ", Command::StartCapture(42))]
    #[case("start", Command::StartCapture(20))]
    #[case("start abc", Command::StartCapture(20))]
    #[case("start 0", Command::StartCapture(1))]
    #[case("start -7", Command::StartCapture(1))]
    #[case("start 250", Command::StartCapture(100))]
    #[case("start 99999999999999999999999", Command::StartCapture(100))]
    #[case("start 10 extra", Command::StartCapture(10))]
    #[case("PWM 500", Command::SetDuty(100))]
    #[case("pwm 35", Command::SetDuty(35))]
    #[case("pwm +35", Command::SetDuty(35))]
    #[case("pwm -3", Command::SetDuty(0))]
    #[case("pwm", Command::SetDuty(0))]
    #[case("pwm x", Command::SetDuty(0))]
    #[case("foo", Command::Malformed("foo".into()))]
    #[case("", Command::Malformed(String::new()))]
    #[case("   ", Command::Malformed(String::new()))]
    #[case("startx 10", Command::Malformed("startx 10".into()))]
    fn lenient_table(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(parse(line), expected);
    }

    #[rstest]
    #[case("start 15", Command::StartCapture(15))]
    #[case("pwm 0", Command::SetDuty(0))]
    #[case("pwm 100", Command::SetDuty(100))]
    #[case("start", Command::Malformed("start".into()))]
    #[case("pwm abc", Command::Malformed("pwm abc".into()))]
    #[case("start 5 6", Command::Malformed("start 5 6".into()))]
    fn strict_table(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(parse_with(line, ParseMode::Strict), expected);
    }

    #[rstest]
    #[case("start 0")]
    #[case("start 101")]
    #[case("pwm 500")]
    #[case("pwm -1")]
    fn strict_rejects_out_of_range(#[case] line: &str) {
        match parse_with(line, ParseMode::Strict) {
            Command::Rejected(BenchError::InvalidParameter(msg)) => {
                assert!(msg.contains("outside"), "{msg}");
            }
            other => panic!("expected rejection for {line:?}, got {other:?}"),
        }
    }
}
