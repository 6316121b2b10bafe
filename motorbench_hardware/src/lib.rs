pub mod error;
pub mod file_sink;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;

pub use error::HwError;
pub use file_sink::FileSink;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{EncoderInput, HBridgeMotor};
pub use sim::{EdgeSynth, MotorModel, SimulatedEncoder, SimulatedMotor, simulated_rig};
