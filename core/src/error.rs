use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Source exhausted before the start marker was found")]
    NoStartMarkerFound,

    #[error("Source exhausted before the end marker ({} bytes decoded)", decoded.len())]
    TruncatedFrame { decoded: Vec<u8> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid block size: expected {expected} samples, got {actual}")]
    InvalidBlockSize { expected: usize, actual: usize },

    #[error("Failed to open audio device: {0}")]
    DeviceOpen(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModemError>;
