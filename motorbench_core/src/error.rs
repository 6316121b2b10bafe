use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BenchError {
    #[error("unrecognized command: {0:?}")]
    MalformedCommand(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("storage write failed: {0}")]
    StorageWrite(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl BenchError {
    /// True for errors the controller absorbs without leaving its current mode.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BenchError::MalformedCommand(_) | BenchError::InvalidParameter(_)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
