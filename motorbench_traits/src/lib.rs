pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock, ticks_diff};

/// Error type carried across collaborator boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver of encoder rising-edge notifications.
///
/// Implementations must tolerate being called from an interrupt callback or a
/// foreign thread at any moment, so the method takes `&self`.
pub trait EdgeHandler: Send + Sync {
    fn on_edge(&self);
}

/// Map a duty percentage onto a native full-scale value (e.g. 65535 for a
/// 16-bit duty register, or the PWM wrap value). Truncates; above 100 saturates.
#[inline]
pub fn to_native(percent: u8, full_scale: u32) -> u32 {
    let p = u64::from(percent.min(100));
    (u64::from(full_scale) * p / 100) as u32
}

/// Motor drive output. `percent` is already clamped to 0..=100.
pub trait DutyActuator {
    fn set_duty(&mut self, percent: u8) -> Result<(), BoxError>;
}

/// Storage medium receiving a capture record.
pub trait RecordSink {
    /// Discard any previous record and start a fresh one.
    fn truncate(&mut self) -> Result<(), BoxError>;
    /// Append raw bytes to the current record.
    fn append(&mut self, bytes: &[u8]) -> Result<(), BoxError>;
    /// Flush and close the current record.
    fn close(&mut self) -> Result<(), BoxError>;
}

/// Operator-facing channel (serial console, terminal, test buffer).
pub trait Operator {
    /// Periodic (duty, rpm) report while in manual mode.
    fn report(&mut self, duty_percent: u8, rpm: u32);
    /// Informational notice such as "capture started" or the completion marker.
    fn notice(&mut self, message: &str);
    /// One-line diagnostic for rejected input or aborted sessions.
    fn diagnostic(&mut self, message: &str);
}

/// Non-blocking source of command lines.
pub trait CommandSource {
    /// Return the next complete line if one is available, without waiting.
    fn poll_line(&mut self) -> Option<String>;

    /// True once no further lines can ever arrive (end of input).
    fn is_closed(&self) -> bool {
        false
    }
}

impl<T: EdgeHandler + ?Sized> EdgeHandler for std::sync::Arc<T> {
    fn on_edge(&self) {
        (**self).on_edge();
    }
}

impl<T: DutyActuator + ?Sized> DutyActuator for Box<T> {
    fn set_duty(&mut self, percent: u8) -> Result<(), BoxError> {
        (**self).set_duty(percent)
    }
}

impl<T: RecordSink + ?Sized> RecordSink for Box<T> {
    fn truncate(&mut self) -> Result<(), BoxError> {
        (**self).truncate()
    }
    fn append(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        (**self).append(bytes)
    }
    fn close(&mut self) -> Result<(), BoxError> {
        (**self).close()
    }
}

impl<T: Operator + ?Sized> Operator for Box<T> {
    fn report(&mut self, duty_percent: u8, rpm: u32) {
        (**self).report(duty_percent, rpm);
    }
    fn notice(&mut self, message: &str) {
        (**self).notice(message);
    }
    fn diagnostic(&mut self, message: &str) {
        (**self).diagnostic(message);
    }
}

impl<T: CommandSource + ?Sized> CommandSource for Box<T> {
    fn poll_line(&mut self) -> Option<String> {
        (**self).poll_line()
    }
    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
