use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("no TrueRNG device found")]
    DeviceNotFound,
    #[error("failed to open {port}: {source}")]
    DeviceOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("read timed out: expected {expected} bytes, received {received}")]
    ReadTimeout { expected: usize, received: usize },
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
