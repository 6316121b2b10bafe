//! Maps `Box<dyn Error>` from trait boundaries to typed `BenchError`.
//!
//! The traits in `motorbench_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `motorbench_hardware::HwError`.

use crate::error::BenchError;

/// Map an actuator-side error to a typed `BenchError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to a plain hardware error carrying the message.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> BenchError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<motorbench_hardware::error::HwError>() {
            return match hw {
                motorbench_hardware::error::HwError::Io(io) => {
                    BenchError::StorageWrite(io.to_string())
                }
                other => BenchError::HardwareFault(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return BenchError::Hardware(format!("io: {io}"));
    }
    BenchError::Hardware(e.to_string())
}

/// Map a record-sink error. Every sink failure is a storage failure,
/// whatever its concrete type.
pub fn map_storage_error(e: &(dyn std::error::Error + 'static)) -> BenchError {
    match map_hw_error(e) {
        BenchError::StorageWrite(msg)
        | BenchError::Hardware(msg)
        | BenchError::HardwareFault(msg) => BenchError::StorageWrite(msg),
        other => BenchError::StorageWrite(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_become_hardware() {
        let e: Box<dyn std::error::Error + Send + Sync> = "pwm channel busy".into();
        assert_eq!(
            map_hw_error(&*e),
            BenchError::Hardware("pwm channel busy".into())
        );
    }

    #[test]
    fn sink_errors_are_always_storage_failures() {
        let e: Box<dyn std::error::Error + Send + Sync> = "disk full".into();
        match map_storage_error(&*e) {
            BenchError::StorageWrite(msg) => assert!(msg.contains("disk full")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
