/// Marker the firmware prints while the sensor has no valid contact.
pub const SENSOR_ABSENT_MARKER: &str = "No finger";

/// First token of the column-name line the firmware echoes at startup.
pub const HEADER_TOKEN: &str = "Time";

/// One accepted physiological reading. `elapsed_seconds` is the device's
/// own clock; the host capture timestamp is attached at write time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PpgRecord {
    pub elapsed_seconds: f64,
    pub heart_rate_bpm: f64,
    pub spo2_percent: f64,
}

/// Result of classifying one raw line.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// A well-formed data line.
    Record(PpgRecord),
    /// The sensor-absent notice. Expected, narrated, never persisted.
    Absent,
    /// Header echo, blank line, or anything that failed to parse.
    Ignored,
}

/// Maps a raw line to a record or a non-data state. Pure; parse failures
/// classify as `Ignored` and never escape.
pub fn classify(line: &str) -> Classified {
    if line.is_empty() {
        return Classified::Ignored;
    }
    if line.contains(SENSOR_ABSENT_MARKER) {
        return Classified::Absent;
    }
    if line.starts_with(HEADER_TOKEN) {
        return Classified::Ignored;
    }

    let mut fields = line.split(',');
    let parsed = (|| {
        let elapsed_seconds: f64 = fields.next()?.trim().parse().ok()?;
        let heart_rate_bpm: f64 = fields.next()?.trim().parse().ok()?;
        let spo2_percent: f64 = fields.next()?.trim().parse().ok()?;
        Some(PpgRecord {
            elapsed_seconds,
            heart_rate_bpm,
            spo2_percent,
        })
    })();

    match parsed {
        Some(record) => Classified::Record(record),
        None => Classified::Ignored,
    }
}
