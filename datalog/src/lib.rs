//! Host-side capture of line-oriented sensor streams from a serial device
//! into timestamped files. Two binaries ship with the crate: `collect_ppg`
//! parses heart-rate/SpO2 readings into CSV rows, `collect_imu` logs raw
//! IMU lines verbatim.

pub mod classify;
pub mod error;
pub mod port;
pub mod session;
pub mod sink;

pub use classify::{classify, Classified, PpgRecord};
pub use error::LogError;
pub use port::{suggest_port, DevicePort, LineRead};
pub use session::{
    Ingested, LineSource, Pipeline, PpgPipeline, RawPipeline, Session, SessionSummary,
};
pub use sink::{CsvSink, RawSink, SinkReport};
