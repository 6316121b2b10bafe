//! Raspberry Pi backend: H-bridge drive through software PWM and an encoder
//! counted from GPIO interrupts.

use std::sync::Arc;

use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};

use motorbench_traits::{BoxError, DutyActuator, EdgeHandler, to_native};

use crate::error::{HwError, Result};

/// PWM output plus the two direction inputs of an L298-style bridge.
pub struct HBridgeMotor {
    pwm: OutputPin,
    // Held for the lifetime of the driver so the direction stays latched.
    _in1: OutputPin,
    _in2: OutputPin,
    frequency_hz: f64,
    full_scale: u32,
}

impl HBridgeMotor {
    /// Claim the pins, latch forward direction and start at 0% duty.
    pub fn new(pwm_pin: u8, in1_pin: u8, in2_pin: u8, frequency_hz: u32, full_scale: u32) -> Result<Self> {
        if full_scale == 0 {
            return Err(HwError::Pwm("full scale must be > 0".into()));
        }
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let claim = |pin: u8| -> Result<OutputPin> {
            gpio.get(pin)
                .map(|p| p.into_output_low())
                .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))
        };

        let mut in1 = claim(in1_pin)?;
        let mut in2 = claim(in2_pin)?;
        in1.set_high();
        in2.set_low();

        let mut motor = Self {
            pwm: claim(pwm_pin)?,
            _in1: in1,
            _in2: in2,
            frequency_hz: f64::from(frequency_hz),
            full_scale,
        };
        motor.apply(0)?;
        tracing::info!(pwm_pin, in1_pin, in2_pin, frequency_hz, "h-bridge ready");
        Ok(motor)
    }

    /// Quantize `percent` onto the native resolution and program the output.
    fn apply(&mut self, percent: u8) -> Result<()> {
        let native = to_native(percent, self.full_scale);
        let fraction = f64::from(native) / f64::from(self.full_scale);
        self.pwm
            .set_pwm_frequency(self.frequency_hz, fraction)
            .map_err(|e| HwError::Pwm(e.to_string()))
    }
}

impl DutyActuator for HBridgeMotor {
    fn set_duty(&mut self, percent: u8) -> std::result::Result<(), BoxError> {
        self.apply(percent)?;
        tracing::trace!(percent, "duty applied");
        Ok(())
    }
}

impl Drop for HBridgeMotor {
    fn drop(&mut self) {
        if let Err(e) = self.pwm.clear_pwm() {
            tracing::warn!(error = %e, "failed to stop pwm on drop");
        }
        self.pwm.set_low();
    }
}

/// Encoder input; every rising edge is forwarded to the handler from the
/// interrupt thread rppal runs for the pin.
pub struct EncoderInput {
    pin: InputPin,
}

impl EncoderInput {
    pub fn attach(pin: u8, handler: Arc<dyn EdgeHandler>) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut input = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("pin {pin}: {e}")))?
            .into_input_pullup();
        input
            .set_async_interrupt(Trigger::RisingEdge, None, move |_event| handler.on_edge())
            .map_err(|e| HwError::Gpio(e.to_string()))?;
        tracing::info!(pin, "encoder interrupt armed");
        Ok(Self { pin: input })
    }
}

impl Drop for EncoderInput {
    fn drop(&mut self) {
        if let Err(e) = self.pin.clear_async_interrupt() {
            tracing::warn!(error = %e, "failed to disarm encoder interrupt");
        }
    }
}
