use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::classify::{classify, Classified};
use crate::error::LogError;
use crate::port::{DevicePort, LineRead};
use crate::sink::{CsvSink, RawSink, SinkReport};

/// Startup banner lines consumed before steady-state reading begins.
const STARTUP_LINE_LIMIT: usize = 10;

/// Banner lines that signal the device is done booting; seeing one ends
/// the banner skip early.
const READY_MARKERS: &[&str] = &["Place finger", "Time(s)"];

/// Anything that can hand the session one line at a time.
pub trait LineSource {
    fn next_line(&mut self) -> Result<LineRead, LogError>;
}

impl LineSource for DevicePort {
    fn next_line(&mut self) -> Result<LineRead, LogError> {
        self.read_line()
    }
}

/// What one ingested line amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// A row was appended and flushed.
    Stored,
    /// The sensor-absent notice; narrated, nothing written.
    SensorAbsent,
    /// Banner echo, malformed data, or otherwise not persistable.
    Skipped,
}

/// The variant-specific half of the loop: what to do with a line once the
/// session has read it.
pub trait Pipeline {
    fn ingest(&mut self, line: &str) -> Result<Ingested, LogError>;
    fn finish(self) -> Result<SinkReport, LogError>;
}

/// Classify-then-append for the PPG variant. The capture timestamp is
/// taken at write time, when the host observed the line.
pub struct PpgPipeline {
    sink: CsvSink,
}

impl PpgPipeline {
    pub fn new(sink: CsvSink) -> Self {
        PpgPipeline { sink }
    }
}

impl Pipeline for PpgPipeline {
    fn ingest(&mut self, line: &str) -> Result<Ingested, LogError> {
        match classify(line) {
            Classified::Record(record) => {
                self.sink.append(Local::now(), &record)?;
                Ok(Ingested::Stored)
            }
            Classified::Absent => Ok(Ingested::SensorAbsent),
            Classified::Ignored => Ok(Ingested::Skipped),
        }
    }

    fn finish(self) -> Result<SinkReport, LogError> {
        self.sink.finish()
    }
}

/// Verbatim persistence for the raw IMU variant.
pub struct RawPipeline {
    sink: RawSink,
}

impl RawPipeline {
    pub fn new(sink: RawSink) -> Self {
        RawPipeline { sink }
    }
}

impl Pipeline for RawPipeline {
    fn ingest(&mut self, line: &str) -> Result<Ingested, LogError> {
        if line.is_empty() {
            return Ok(Ingested::Skipped);
        }
        self.sink.append(line)?;
        Ok(Ingested::Stored)
    }

    fn finish(self) -> Result<SinkReport, LogError> {
        self.sink.finish()
    }
}

/// What a finished session reports to the operator.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub accepted: u64,
    pub report: SinkReport,
}

/// One run from device-open to interrupt or fatal error. Owns the line
/// source and the pipeline for its whole lifetime; dropping the session
/// releases both handles.
pub struct Session<S: LineSource, P: Pipeline> {
    source: S,
    pipeline: P,
    shutdown: Arc<AtomicBool>,
    banner_limit: usize,
}

impl<S: LineSource, P: Pipeline> Session<S, P> {
    pub fn new(source: S, pipeline: P, shutdown: Arc<AtomicBool>) -> Self {
        Session {
            source,
            pipeline,
            shutdown,
            banner_limit: 0,
        }
    }

    /// Consume up to `STARTUP_LINE_LIMIT` leading banner lines before
    /// steady-state reading, stopping early on a ready marker.
    pub fn with_startup_skip(mut self) -> Self {
        self.banner_limit = STARTUP_LINE_LIMIT;
        self
    }

    /// Runs to interrupt or fatal error. The pipeline is closed on every
    /// exit path, so rows flushed before a fault are never lost.
    pub fn run(mut self) -> Result<SessionSummary, LogError> {
        let outcome = self.drive();
        let Session { pipeline, .. } = self;
        let report = pipeline.finish();
        let accepted = outcome?;
        let report = report?;
        info!(
            rows = accepted,
            file = %report.path.display(),
            bytes = report.bytes,
            "session closed"
        );
        Ok(SessionSummary { accepted, report })
    }

    fn drive(&mut self) -> Result<u64, LogError> {
        self.skip_banner()?;

        let mut accepted = 0u64;
        while !self.shutdown.load(Ordering::Relaxed) {
            let line = match self.source.next_line()? {
                LineRead::Line(line) if !line.is_empty() => line,
                LineRead::Line(_) | LineRead::Empty => continue,
                LineRead::Binary => {
                    warn!("dropped undecodable line");
                    continue;
                }
            };

            debug!(%line, "received");
            match self.pipeline.ingest(&line)? {
                Ingested::Stored => {
                    accepted += 1;
                    debug!(count = accepted, "stored reading");
                }
                Ingested::SensorAbsent => info!("waiting for sensor contact"),
                Ingested::Skipped => {}
            }
        }
        Ok(accepted)
    }

    fn skip_banner(&mut self) -> Result<(), LogError> {
        let mut seen = 0usize;
        while seen < self.banner_limit && !self.shutdown.load(Ordering::Relaxed) {
            match self.source.next_line()? {
                LineRead::Line(line) if !line.is_empty() => {
                    info!(%line, "device");
                    seen += 1;
                    if READY_MARKERS.iter().any(|m| line.contains(m)) {
                        break;
                    }
                }
                LineRead::Line(_) | LineRead::Binary | LineRead::Empty => continue,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CsvSink;
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::tempdir;

    /// Replays a fixed script, then flips the shutdown flag so the loop
    /// exits at the next iteration boundary, the way an interrupt would.
    struct ScriptedSource {
        lines: VecDeque<LineRead>,
        shutdown: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn new(lines: &[&str], shutdown: Arc<AtomicBool>) -> Self {
            ScriptedSource {
                lines: lines
                    .iter()
                    .map(|l| LineRead::Line(l.to_string()))
                    .collect(),
                shutdown,
            }
        }
    }

    impl LineSource for ScriptedSource {
        fn next_line(&mut self) -> Result<LineRead, LogError> {
            match self.lines.pop_front() {
                Some(line) => Ok(line),
                None => {
                    self.shutdown.store(true, Ordering::Relaxed);
                    Ok(LineRead::Empty)
                }
            }
        }
    }

    #[test]
    fn mixed_stream_stores_only_data_rows_in_order() {
        let dir = tempdir().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new(
            &[
                "Time(s),HR,SpO2",
                "No finger detected",
                "1.0,70.5,97.2",
                "garbage",
                "2.0,71.0,97.5",
            ],
            Arc::clone(&shutdown),
        );
        let sink = CsvSink::create(dir.path()).unwrap();

        let summary = Session::new(source, PpgPipeline::new(sink), shutdown)
            .run()
            .unwrap();

        assert_eq!(summary.accepted, 2);
        let content = fs::read_to_string(&summary.report.path).unwrap();
        let rows: Vec<&str> = content.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].ends_with(",1.0,70.5,97.2"));
        assert!(rows[2].ends_with(",2.0,71.0,97.5"));
    }

    #[test]
    fn startup_skip_stops_at_ready_marker_and_keeps_later_data() {
        let dir = tempdir().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new(
            &[
                "MAX30102 initialising",
                "Place finger on sensor",
                "3.0,64.0,99.0",
            ],
            Arc::clone(&shutdown),
        );
        let sink = CsvSink::create(dir.path()).unwrap();

        let summary = Session::new(source, PpgPipeline::new(sink), shutdown)
            .with_startup_skip()
            .run()
            .unwrap();

        assert_eq!(summary.accepted, 1);
    }

    #[test]
    fn banner_lines_are_consumed_even_when_they_look_like_data() {
        // Numeric lines inside the banner window are discarded, not stored.
        let dir = tempdir().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new(
            &["9.0,60.0,95.0", "Time(s),HR,SpO2", "10.0,61.0,95.5"],
            Arc::clone(&shutdown),
        );
        let sink = CsvSink::create(dir.path()).unwrap();

        let summary = Session::new(source, PpgPipeline::new(sink), shutdown)
            .with_startup_skip()
            .run()
            .unwrap();

        assert_eq!(summary.accepted, 1);
        let content = fs::read_to_string(&summary.report.path).unwrap();
        assert!(content.contains("10.0,61.0,95.5"));
        assert!(!content.contains("9.0,60.0,95.0"));
    }

    #[test]
    fn preset_shutdown_writes_header_but_no_rows() {
        let dir = tempdir().unwrap();
        let shutdown = Arc::new(AtomicBool::new(true));
        let source = ScriptedSource::new(&["1.0,70.5,97.2"], Arc::clone(&shutdown));
        let sink = CsvSink::create(dir.path()).unwrap();

        let summary = Session::new(source, PpgPipeline::new(sink), shutdown)
            .run()
            .unwrap();

        assert_eq!(summary.accepted, 0);
        let content = fs::read_to_string(&summary.report.path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert_eq!(summary.report.bytes, content.len() as u64);
    }

    #[test]
    fn raw_pipeline_keeps_every_nonempty_line_verbatim() {
        let dir = tempdir().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource::new(
            &["0.01,0.02,9.81", "", "status: ok"],
            Arc::clone(&shutdown),
        );
        let sink = RawSink::create(dir.path()).unwrap();

        let summary = Session::new(source, RawPipeline::new(sink), shutdown)
            .run()
            .unwrap();

        assert_eq!(summary.accepted, 2);
        let content = fs::read_to_string(&summary.report.path).unwrap();
        assert_eq!(content, "0.01,0.02,9.81\nstatus: ok\n");
    }

    #[test]
    fn undecodable_lines_are_dropped_without_aborting() {
        let dir = tempdir().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut source = ScriptedSource::new(&["4.0,75.0,98.0"], Arc::clone(&shutdown));
        source.lines.push_front(LineRead::Binary);
        let sink = CsvSink::create(dir.path()).unwrap();

        let summary = Session::new(source, PpgPipeline::new(sink), shutdown)
            .run()
            .unwrap();

        assert_eq!(summary.accepted, 1);
    }
}
