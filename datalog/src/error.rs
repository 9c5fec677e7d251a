use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Fatal conditions only. Recoverable conditions (timeouts, undecodable
/// bytes, malformed data lines) are modeled as enum variants on the read
/// and classify paths and never surface here.
#[derive(Debug)]
pub enum LogError {
    /// The serial port could not be opened or enumerated.
    Connection(String),
    /// The output file could not be created, written, or flushed.
    Storage(io::Error),
    /// An unrecoverable I/O failure on an already-open device.
    Device(io::Error),
    /// Catch-all for process-level setup failures.
    Other(String),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::Connection(s) => write!(f, "Connection error: {}", s),
            LogError::Storage(e) => write!(f, "Storage error: {}", e),
            LogError::Device(e) => write!(f, "Device error: {}", e),
            LogError::Other(s) => write!(f, "Error: {}", s),
        }
    }
}

impl StdError for LogError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            LogError::Connection(_) | LogError::Other(_) => None,
            LogError::Storage(e) | LogError::Device(e) => Some(e),
        }
    }
}

impl From<serialport::Error> for LogError {
    fn from(e: serialport::Error) -> Self {
        LogError::Connection(e.to_string())
    }
}

impl From<csv::Error> for LogError {
    fn from(e: csv::Error) -> Self {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => LogError::Storage(io),
            other => LogError::Storage(io::Error::new(
                io::ErrorKind::Other,
                format!("CSV error: {:?}", other),
            )),
        }
    }
}
