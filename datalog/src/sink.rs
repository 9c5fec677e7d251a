use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::classify::PpgRecord;
use crate::error::LogError;

/// Column header written once when the CSV file is created.
pub const CSV_HEADER: [&str; 4] = [
    "Timestamp",
    "Arduino_Time_s",
    "HeartRate_BPM",
    "SpO2_Percent",
];

/// Capture-timestamp format, millisecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Final state of a closed sink.
#[derive(Debug, Clone)]
pub struct SinkReport {
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Serialize)]
struct PpgRow<'a> {
    timestamp: &'a str,
    elapsed_seconds: f64,
    heart_rate_bpm: f64,
    spo2_percent: f64,
}

/// Structured CSV output for the PPG variant. One file per session, header
/// written at create time, every row flushed before `append` returns.
pub struct CsvSink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvSink {
    /// Creates `dir` if absent and opens `dir/ppg_data_<YYYYMMDD_HHMM>.csv`.
    pub fn create(dir: &Path) -> Result<Self, LogError> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(LogError::Storage)?;
            info!(dir = %dir.display(), "created output directory");
        }
        let name = Local::now().format("ppg_data_%Y%m%d_%H%M.csv").to_string();
        Self::create_at(dir.join(name))
    }

    fn create_at(path: PathBuf) -> Result<Self, LogError> {
        let file = File::create(&path).map_err(LogError::Storage)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer.flush().map_err(LogError::Storage)?;
        Ok(CsvSink { writer, path })
    }

    /// Appends one row and flushes it to the OS before returning, so rows
    /// already written survive a kill at any later point.
    pub fn append(&mut self, captured_at: DateTime<Local>, record: &PpgRecord) -> Result<(), LogError> {
        let timestamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
        self.writer.serialize(PpgRow {
            timestamp: &timestamp,
            elapsed_seconds: record.elapsed_seconds,
            heart_rate_bpm: record.heart_rate_bpm,
            spo2_percent: record.spo2_percent,
        })?;
        self.writer.flush().map_err(LogError::Storage)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(mut self) -> Result<SinkReport, LogError> {
        self.writer.flush().map_err(LogError::Storage)?;
        report(self.path)
    }
}

/// Verbatim line output for the raw IMU variant. The `.csv` extension is
/// kept for compatibility with downstream tooling even though the content
/// is plain newline-terminated text.
pub struct RawSink {
    file: File,
    path: PathBuf,
}

impl RawSink {
    /// Opens `dir/IMU_Data_<YYYYMMDD_HHMMSS>.csv`.
    pub fn create(dir: &Path) -> Result<Self, LogError> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(LogError::Storage)?;
            info!(dir = %dir.display(), "created output directory");
        }
        let name = Local::now().format("IMU_Data_%Y%m%d_%H%M%S.csv").to_string();
        let path = dir.join(name);
        let file = File::create(&path).map_err(LogError::Storage)?;
        Ok(RawSink { file, path })
    }

    pub fn append(&mut self, line: &str) -> Result<(), LogError> {
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.write_all(b"\n"))
            .and_then(|_| self.file.flush())
            .map_err(LogError::Storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(mut self) -> Result<SinkReport, LogError> {
        self.file.flush().map_err(LogError::Storage)?;
        report(self.path)
    }
}

fn report(path: PathBuf) -> Result<SinkReport, LogError> {
    let bytes = fs::metadata(&path).map_err(LogError::Storage)?.len();
    Ok(SinkReport { path, bytes })
}
